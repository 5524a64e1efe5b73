use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{
    ApplicantId, ApplicantSnapshot, CompetitionEntry, IngestViolation, Profile, ProfileDraft,
    ProfileViolation, RatingObservation, RatingPosition, UserId,
};
use super::recommendations::{
    filter_recommendations, rerank, DirectionChoice, LabeledRecommendation,
    RecommendationCandidate,
};
use super::repository::{
    AdmissionClassifier, ApplicantRepository, PredictionRequest, ProfileRepository,
    RatingRepository, RecommendationSource, RepositoryError, ServiceError,
};
use super::status::{RatingStatus, StatusEngine, StatusError};
use super::trajectory::{analyze, TrajectoryAnalysis, TrajectoryError};

pub const MIN_TOP_N: usize = 1;
pub const MAX_TOP_N: usize = 20;

/// Storage collaborators shared by the service facade and the broadcast orchestrator.
#[derive(Clone)]
pub struct AdmissionStores {
    pub applicants: Arc<dyn ApplicantRepository>,
    pub ratings: Arc<dyn RatingRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
}

/// Result of one competition-list ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub applicants: usize,
    pub observed_on: NaiveDate,
}

/// Rank history of one enrollment together with its derived signals and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingHistoryView {
    pub applicant_id: ApplicantId,
    pub direction: String,
    pub last_change: i64,
    pub status: RatingStatus,
    pub trajectory: TrajectoryAnalysis,
    pub ratings: Vec<RatingPosition>,
}

/// Everyone competing in one direction, as seen from the requesting user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitionList {
    pub applicant_id: ApplicantId,
    pub institute: String,
    pub direction: String,
    pub applicants: Vec<ApplicantSnapshot>,
}

#[derive(Debug, thiserror::Error)]
pub enum AdmissionServiceError {
    #[error(transparent)]
    Invalid(#[from] IngestViolation),
    #[error(transparent)]
    InvalidProfile(#[from] ProfileViolation),
    #[error("applicant {applicant_id} is already linked to another profile")]
    ApplicantTaken { applicant_id: ApplicantId },
    #[error("top_n must be between {min} and {max}, got {requested}")]
    InvalidTopN {
        requested: usize,
        min: usize,
        max: usize,
    },
    #[error(transparent)]
    Status(#[from] StatusError),
    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Use-case facade composing storage, the external microservices and the status engine.
pub struct AdmissionService {
    stores: AdmissionStores,
    classifier: Arc<dyn AdmissionClassifier>,
    recommender: Arc<dyn RecommendationSource>,
    engine: Arc<StatusEngine>,
}

impl AdmissionService {
    pub fn new(
        stores: AdmissionStores,
        classifier: Arc<dyn AdmissionClassifier>,
        recommender: Arc<dyn RecommendationSource>,
        engine: Arc<StatusEngine>,
    ) -> Self {
        Self {
            stores,
            classifier,
            recommender,
            engine,
        }
    }

    /// Score a fresh competition list and record it as the snapshot for `observed_on`.
    pub async fn ingest_competition_list(
        &self,
        entries: Vec<CompetitionEntry>,
        observed_on: NaiveDate,
    ) -> Result<IngestReport, AdmissionServiceError> {
        for entry in &entries {
            entry.validate()?;
        }

        if entries.is_empty() {
            return Ok(IngestReport {
                applicants: 0,
                observed_on,
            });
        }

        let requests: Vec<PredictionRequest> = entries
            .iter()
            .map(|entry| PredictionRequest {
                points: entry.points,
                direction: entry.direction.clone(),
            })
            .collect();
        let probabilities = self.predict(requests).await?;

        let observations: Vec<RatingObservation> = entries
            .iter()
            .map(|entry| RatingObservation {
                direction: entry.direction.clone(),
                position: RatingPosition {
                    applicant_id: entry.applicant_id,
                    rank: entry.rank,
                    date: observed_on,
                },
            })
            .collect();
        let snapshots = entries
            .into_iter()
            .zip(probabilities)
            .map(|(entry, probability)| entry.into_snapshot(probability))
            .collect::<Vec<_>>();
        let applicants = snapshots.len();

        self.stores.applicants.upsert_batch(snapshots)?;
        self.stores.ratings.upsert_batch(observations)?;

        info!(applicants, %observed_on, "competition list ingested");
        Ok(IngestReport {
            applicants,
            observed_on,
        })
    }

    pub fn create_profile(&self, profile: Profile) -> Result<Profile, AdmissionServiceError> {
        profile.validate()?;
        self.ensure_applicant_free(&profile)?;
        self.stores.profiles.create(profile.clone())?;

        info!(user_id = %profile.user_id, applicant_id = %profile.applicant_id, "profile created");
        Ok(profile)
    }

    pub fn profile(&self, user_id: &UserId) -> Result<Option<Profile>, AdmissionServiceError> {
        Ok(self.stores.profiles.fetch(user_id)?)
    }

    /// Replace an existing profile; `None` when the user has none.
    pub fn update_profile(
        &self,
        user_id: &UserId,
        draft: ProfileDraft,
    ) -> Result<Option<Profile>, AdmissionServiceError> {
        let profile = draft.into_profile(*user_id);
        profile.validate()?;
        if self.stores.profiles.fetch(user_id)?.is_none() {
            return Ok(None);
        }
        self.ensure_applicant_free(&profile)?;

        match self.stores.profiles.update(profile.clone()) {
            Ok(()) => Ok(Some(profile)),
            Err(RepositoryError::NotFound) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// `false` when there was nothing to delete.
    pub fn delete_profile(&self, user_id: &UserId) -> Result<bool, AdmissionServiceError> {
        match self.stores.profiles.delete(user_id) {
            Ok(()) => {
                info!(%user_id, "profile deleted");
                Ok(true)
            }
            Err(RepositoryError::NotFound) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Current enrollments of the user's applicant; `None` when there are none.
    pub fn profile_applicants(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Vec<ApplicantSnapshot>>, AdmissionServiceError> {
        let Some(profile) = self.stores.profiles.fetch(user_id)? else {
            return Ok(None);
        };

        let enrollments = self
            .stores
            .applicants
            .list_for_applicant(profile.applicant_id)?;
        Ok((!enrollments.is_empty()).then_some(enrollments))
    }

    /// Full competition list of a direction; `None` when the profile or the list is missing.
    pub fn competition_list(
        &self,
        user_id: &UserId,
        direction: &str,
    ) -> Result<Option<CompetitionList>, AdmissionServiceError> {
        let Some(profile) = self.stores.profiles.fetch(user_id)? else {
            return Ok(None);
        };

        let applicants = self.stores.applicants.list_by_direction(direction)?;
        let Some(first) = applicants.first() else {
            return Ok(None);
        };

        Ok(Some(CompetitionList {
            applicant_id: profile.applicant_id,
            institute: first.institute.clone(),
            direction: direction.to_string(),
            applicants,
        }))
    }

    /// Rank history for one of the user's directions; `None` when anything is missing.
    pub fn rating_history(
        &self,
        user_id: &UserId,
        direction: &str,
    ) -> Result<Option<RatingHistoryView>, AdmissionServiceError> {
        let Some(profile) = self.stores.profiles.fetch(user_id)? else {
            return Ok(None);
        };

        let history = self.stores.ratings.read(profile.applicant_id, direction)?;
        if history.is_empty() {
            return Ok(None);
        }

        let Some(snapshot) = self
            .stores
            .applicants
            .fetch(profile.applicant_id, direction)?
        else {
            return Ok(None);
        };

        let trajectory = analyze(&history)?;
        let assessment = self.engine.assess(&snapshot, &history)?;

        Ok(Some(RatingHistoryView {
            applicant_id: profile.applicant_id,
            direction: direction.to_string(),
            last_change: trajectory.latest_velocity() as i64,
            status: assessment.status,
            trajectory,
            ratings: history.into(),
        }))
    }

    /// Current enrollments reordered so the most probable direction comes first.
    pub fn rerank_priorities(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Vec<DirectionChoice>>, AdmissionServiceError> {
        let Some(profile) = self.stores.profiles.fetch(user_id)? else {
            return Ok(None);
        };

        let choices = self.current_choices(profile.applicant_id)?;
        Ok(Some(rerank(choices)))
    }

    /// Alternative directions no less promising than the user's current choices.
    pub async fn recommend_directions(
        &self,
        user_id: &UserId,
        top_n: usize,
    ) -> Result<Option<Vec<LabeledRecommendation>>, AdmissionServiceError> {
        if !(MIN_TOP_N..=MAX_TOP_N).contains(&top_n) {
            return Err(AdmissionServiceError::InvalidTopN {
                requested: top_n,
                min: MIN_TOP_N,
                max: MAX_TOP_N,
            });
        }

        let Some(profile) = self.stores.profiles.fetch(user_id)? else {
            return Ok(None);
        };
        let points = profile.total_points();

        let directions = self.recommender.recommend(&profile, points, top_n).await?;
        debug!(
            applicant_id = %profile.applicant_id,
            recommended = directions.len(),
            "recommendations received"
        );

        let requests = directions
            .iter()
            .map(|direction| PredictionRequest {
                points,
                direction: direction.direction.clone(),
            })
            .collect();
        let probabilities = self.predict(requests).await?;

        let candidates = directions
            .into_iter()
            .zip(probabilities)
            .map(|(direction, probability)| RecommendationCandidate {
                direction_id: direction.direction_id,
                direction: direction.direction,
                probability,
            })
            .collect();

        let choices = self.current_choices(profile.applicant_id)?;
        Ok(Some(filter_recommendations(candidates, &choices)))
    }

    fn ensure_applicant_free(&self, profile: &Profile) -> Result<(), AdmissionServiceError> {
        match self
            .stores
            .profiles
            .get_by_applicant_id(profile.applicant_id)?
        {
            Some(owner) if owner.user_id != profile.user_id => {
                Err(AdmissionServiceError::ApplicantTaken {
                    applicant_id: profile.applicant_id,
                })
            }
            _ => Ok(()),
        }
    }

    fn current_choices(
        &self,
        applicant_id: ApplicantId,
    ) -> Result<Vec<DirectionChoice>, AdmissionServiceError> {
        let enrollments = self.stores.applicants.list_for_applicant(applicant_id)?;
        Ok(enrollments.iter().map(DirectionChoice::from).collect())
    }

    async fn predict(&self, requests: Vec<PredictionRequest>) -> Result<Vec<f64>, ServiceError> {
        const SERVICE: &str = "classifier";

        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let expected = requests.len();
        let probabilities = self.classifier.predict_batch(requests).await?;

        if probabilities.len() != expected {
            return Err(ServiceError::LengthMismatch {
                service: SERVICE,
                expected,
                actual: probabilities.len(),
            });
        }
        if let Some(value) = probabilities
            .iter()
            .copied()
            .find(|probability| !(0.0..=1.0).contains(probability))
        {
            return Err(ServiceError::InvalidProbability {
                service: SERVICE,
                value,
            });
        }

        Ok(probabilities)
    }
}
