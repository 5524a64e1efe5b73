use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{Duration, NaiveDate};
use serde_json::Value;
use uuid::Uuid;

use crate::admission::capacity::BudgetCapacity;
use crate::admission::domain::{
    ApplicantId, ApplicantSnapshot, CompetitionEntry, Exam, Gender, Profile, RatingHistory,
    RatingObservation, RatingPosition, UserId,
};
use crate::admission::notification::{Notification, NotificationFactory};
use crate::admission::recommendations::RecommendedDirection;
use crate::admission::repository::{
    AdmissionClassifier, ApplicantRepository, NotificationPublisher, PredictionRequest,
    ProfileRepository, PublishError, RatingRepository, RecommendationSource, RepositoryError,
    ServiceError,
};
use crate::admission::service::{AdmissionService, AdmissionStores};
use crate::admission::status::{StatusEngine, StatusThresholds};

pub(super) const INFORMATICS: &str = "09.03.01 Informatics";
pub(super) const PHYSICS: &str = "03.03.02 Physics";
pub(super) const CHEMISTRY: &str = "04.03.01 Chemistry";
pub(super) const UNFUNDED: &str = "38.03.01 Economics";

pub(super) fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 1).expect("valid date") + Duration::days(offset)
}

pub(super) fn capacity() -> BudgetCapacity {
    BudgetCapacity::new()
        .with_direction(INFORMATICS, 10)
        .with_direction(PHYSICS, 20)
        .with_direction(CHEMISTRY, 15)
}

pub(super) fn engine() -> StatusEngine {
    StatusEngine::new(StatusThresholds::default(), Arc::new(capacity()))
}

/// Daily history starting on 2025-07-01.
pub(super) fn history(applicant_id: i64, ranks: &[u32]) -> RatingHistory {
    RatingHistory::new(
        ranks
            .iter()
            .enumerate()
            .map(|(offset, rank)| RatingPosition {
                applicant_id: ApplicantId(applicant_id),
                rank: *rank,
                date: day(offset as i64),
            })
            .collect(),
    )
}

pub(super) fn snapshot(
    applicant_id: i64,
    direction: &str,
    probability: f64,
    rank: u32,
) -> ApplicantSnapshot {
    ApplicantSnapshot {
        applicant_id: ApplicantId(applicant_id),
        institute: "Institute of Natural Sciences".to_string(),
        direction: direction.to_string(),
        points: 241,
        bonus_points: 2,
        priority: 1,
        probability,
        rank,
        original: true,
    }
}

pub(super) fn entry(applicant_id: i64, direction: &str, rank: u32, priority: u8) -> CompetitionEntry {
    CompetitionEntry {
        applicant_id: ApplicantId(applicant_id),
        rank,
        institute: "Institute of Natural Sciences".to_string(),
        direction: direction.to_string(),
        priority,
        points: 230,
        bonus_points: 0,
        original: false,
    }
}

pub(super) fn user_id(seed: u128) -> UserId {
    UserId(Uuid::from_u128(seed))
}

pub(super) fn profile(seed: u128, applicant_id: i64) -> Profile {
    Profile {
        user_id: user_id(seed),
        applicant_id: ApplicantId(applicant_id),
        gender: Gender::Female,
        gpa: 4.6,
        exams: vec![
            Exam {
                subject: "math".to_string(),
                points: 82,
            },
            Exam {
                subject: "russian".to_string(),
                points: 91,
            },
            Exam {
                subject: "informatics".to_string(),
                points: 77,
            },
        ],
    }
}

pub(super) fn recommended(direction_id: i64, direction: &str) -> RecommendedDirection {
    RecommendedDirection {
        direction_id,
        direction: direction.to_string(),
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryProfiles {
    profiles: Arc<Mutex<Vec<Profile>>>,
}

impl MemoryProfiles {
    pub(super) fn with(profiles: Vec<Profile>) -> Self {
        Self {
            profiles: Arc::new(Mutex::new(profiles)),
        }
    }
}

impl ProfileRepository for MemoryProfiles {
    fn fetch(&self, user_id: &UserId) -> Result<Option<Profile>, RepositoryError> {
        let guard = self.profiles.lock().expect("profile mutex poisoned");
        Ok(guard.iter().find(|p| &p.user_id == user_id).cloned())
    }

    fn get_by_applicant_id(
        &self,
        applicant_id: ApplicantId,
    ) -> Result<Option<Profile>, RepositoryError> {
        let guard = self.profiles.lock().expect("profile mutex poisoned");
        Ok(guard.iter().find(|p| p.applicant_id == applicant_id).cloned())
    }

    fn create(&self, profile: Profile) -> Result<(), RepositoryError> {
        let mut guard = self.profiles.lock().expect("profile mutex poisoned");
        if guard.iter().any(|p| p.user_id == profile.user_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(profile);
        Ok(())
    }

    fn update(&self, profile: Profile) -> Result<(), RepositoryError> {
        let mut guard = self.profiles.lock().expect("profile mutex poisoned");
        let stored = guard
            .iter_mut()
            .find(|p| p.user_id == profile.user_id)
            .ok_or(RepositoryError::NotFound)?;
        *stored = profile;
        Ok(())
    }

    fn delete(&self, user_id: &UserId) -> Result<(), RepositoryError> {
        let mut guard = self.profiles.lock().expect("profile mutex poisoned");
        let before = guard.len();
        guard.retain(|p| &p.user_id != user_id);
        if guard.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryApplicants {
    snapshots: Arc<Mutex<BTreeMap<(ApplicantId, String), ApplicantSnapshot>>>,
}

impl MemoryApplicants {
    pub(super) fn with(snapshots: Vec<ApplicantSnapshot>) -> Self {
        let repository = Self::default();
        repository
            .upsert_batch(snapshots)
            .expect("memory upsert succeeds");
        repository
    }
}

impl ApplicantRepository for MemoryApplicants {
    fn upsert_batch(&self, snapshots: Vec<ApplicantSnapshot>) -> Result<(), RepositoryError> {
        let mut guard = self.snapshots.lock().expect("applicant mutex poisoned");
        for snapshot in snapshots {
            guard.insert(
                (snapshot.applicant_id, snapshot.direction.clone()),
                snapshot,
            );
        }
        Ok(())
    }

    fn fetch(
        &self,
        applicant_id: ApplicantId,
        direction: &str,
    ) -> Result<Option<ApplicantSnapshot>, RepositoryError> {
        let guard = self.snapshots.lock().expect("applicant mutex poisoned");
        Ok(guard.get(&(applicant_id, direction.to_string())).cloned())
    }

    fn list_for_applicant(
        &self,
        applicant_id: ApplicantId,
    ) -> Result<Vec<ApplicantSnapshot>, RepositoryError> {
        let guard = self.snapshots.lock().expect("applicant mutex poisoned");
        let mut snapshots: Vec<ApplicantSnapshot> = guard
            .values()
            .filter(|s| s.applicant_id == applicant_id)
            .cloned()
            .collect();
        snapshots.sort_by_key(|s| s.priority);
        Ok(snapshots)
    }

    fn list_by_direction(&self, direction: &str) -> Result<Vec<ApplicantSnapshot>, RepositoryError> {
        let guard = self.snapshots.lock().expect("applicant mutex poisoned");
        let mut snapshots: Vec<ApplicantSnapshot> = guard
            .values()
            .filter(|s| s.direction == direction)
            .cloned()
            .collect();
        snapshots.sort_by_key(|s| s.rank);
        Ok(snapshots)
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.snapshots.lock().expect("applicant mutex poisoned").len())
    }

    fn paginate(
        &self,
        page: usize,
        limit: usize,
    ) -> Result<Vec<ApplicantSnapshot>, RepositoryError> {
        let guard = self.snapshots.lock().expect("applicant mutex poisoned");
        Ok(guard
            .values()
            .skip(page.saturating_sub(1) * limit)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRatings {
    histories: Arc<Mutex<HashMap<(ApplicantId, String), Vec<RatingPosition>>>>,
}

impl MemoryRatings {
    pub(super) fn insert(&self, direction: &str, history: RatingHistory) {
        let observations = Vec::from(history)
            .into_iter()
            .map(|position| RatingObservation {
                direction: direction.to_string(),
                position,
            })
            .collect();
        self.upsert_batch(observations)
            .expect("memory upsert succeeds");
    }
}

impl RatingRepository for MemoryRatings {
    fn upsert_batch(&self, observations: Vec<RatingObservation>) -> Result<(), RepositoryError> {
        let mut guard = self.histories.lock().expect("rating mutex poisoned");
        for observation in observations {
            let positions = guard
                .entry((observation.position.applicant_id, observation.direction))
                .or_default();
            positions.retain(|p| p.date != observation.position.date);
            positions.push(observation.position);
        }
        Ok(())
    }

    fn read(
        &self,
        applicant_id: ApplicantId,
        direction: &str,
    ) -> Result<RatingHistory, RepositoryError> {
        let guard = self.histories.lock().expect("rating mutex poisoned");
        let positions = guard
            .get(&(applicant_id, direction.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(RatingHistory::new(positions))
    }
}

/// Rating source that fails for a fixed set of applicants.
pub(super) struct FlakyRatings {
    pub(super) inner: MemoryRatings,
    pub(super) failing: HashSet<ApplicantId>,
}

impl RatingRepository for FlakyRatings {
    fn upsert_batch(&self, observations: Vec<RatingObservation>) -> Result<(), RepositoryError> {
        self.inner.upsert_batch(observations)
    }

    fn read(
        &self,
        applicant_id: ApplicantId,
        direction: &str,
    ) -> Result<RatingHistory, RepositoryError> {
        if self.failing.contains(&applicant_id) {
            return Err(RepositoryError::Unavailable("replica lagging".to_string()));
        }
        self.inner.read(applicant_id, direction)
    }
}

pub(super) struct UnavailableApplicants;

impl ApplicantRepository for UnavailableApplicants {
    fn upsert_batch(&self, _snapshots: Vec<ApplicantSnapshot>) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(
        &self,
        _applicant_id: ApplicantId,
        _direction: &str,
    ) -> Result<Option<ApplicantSnapshot>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_for_applicant(
        &self,
        _applicant_id: ApplicantId,
    ) -> Result<Vec<ApplicantSnapshot>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_by_direction(
        &self,
        _direction: &str,
    ) -> Result<Vec<ApplicantSnapshot>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn paginate(
        &self,
        _page: usize,
        _limit: usize,
    ) -> Result<Vec<ApplicantSnapshot>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryPublisher {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryPublisher {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("publisher mutex poisoned").clone()
    }
}

impl NotificationPublisher for MemoryPublisher {
    fn publish(&self, notification: Notification) -> Result<(), PublishError> {
        self.sent
            .lock()
            .expect("publisher mutex poisoned")
            .push(notification);
        Ok(())
    }
}

/// Classifier answering with a fixed probability per direction.
#[derive(Default, Clone)]
pub(super) struct StubClassifier {
    probabilities: HashMap<String, f64>,
    fallback: f64,
    requests: Arc<Mutex<Vec<PredictionRequest>>>,
}

impl StubClassifier {
    pub(super) fn new(fallback: f64) -> Self {
        Self {
            fallback,
            ..Self::default()
        }
    }

    pub(super) fn with_direction(mut self, direction: &str, probability: f64) -> Self {
        self.probabilities
            .insert(direction.to_string(), probability);
        self
    }

    pub(super) fn requests(&self) -> Vec<PredictionRequest> {
        self.requests.lock().expect("classifier mutex poisoned").clone()
    }
}

#[async_trait]
impl AdmissionClassifier for StubClassifier {
    async fn predict_batch(
        &self,
        requests: Vec<PredictionRequest>,
    ) -> Result<Vec<f64>, ServiceError> {
        let probabilities = requests
            .iter()
            .map(|request| {
                self.probabilities
                    .get(&request.direction)
                    .copied()
                    .unwrap_or(self.fallback)
            })
            .collect();
        self.requests
            .lock()
            .expect("classifier mutex poisoned")
            .extend(requests);
        Ok(probabilities)
    }
}

/// Classifier that drops the last prediction of every batch.
pub(super) struct TruncatingClassifier;

#[async_trait]
impl AdmissionClassifier for TruncatingClassifier {
    async fn predict_batch(
        &self,
        requests: Vec<PredictionRequest>,
    ) -> Result<Vec<f64>, ServiceError> {
        Ok(vec![0.5; requests.len().saturating_sub(1)])
    }
}

pub(super) struct OfflineClassifier;

#[async_trait]
impl AdmissionClassifier for OfflineClassifier {
    async fn predict_batch(
        &self,
        _requests: Vec<PredictionRequest>,
    ) -> Result<Vec<f64>, ServiceError> {
        Err(ServiceError::Transport {
            service: "classifier",
            message: "connection refused".to_string(),
        })
    }
}

#[derive(Default, Clone)]
pub(super) struct StubRecommender {
    directions: Vec<RecommendedDirection>,
    points: Arc<Mutex<Vec<u16>>>,
}

impl StubRecommender {
    pub(super) fn new(directions: Vec<RecommendedDirection>) -> Self {
        Self {
            directions,
            points: Arc::default(),
        }
    }

    pub(super) fn points_seen(&self) -> Vec<u16> {
        self.points.lock().expect("recommender mutex poisoned").clone()
    }
}

#[async_trait]
impl RecommendationSource for StubRecommender {
    async fn recommend(
        &self,
        _profile: &Profile,
        points: u16,
        top_n: usize,
    ) -> Result<Vec<RecommendedDirection>, ServiceError> {
        self.points
            .lock()
            .expect("recommender mutex poisoned")
            .push(points);
        Ok(self.directions.iter().take(top_n).cloned().collect())
    }
}

/// Service wired to in-memory stores, returning the stores for inspection.
pub(super) struct Harness {
    pub(super) service: AdmissionService,
    pub(super) applicants: MemoryApplicants,
    pub(super) ratings: MemoryRatings,
    pub(super) classifier: StubClassifier,
    pub(super) recommender: StubRecommender,
}

pub(super) fn harness(
    profiles: Vec<Profile>,
    classifier: StubClassifier,
    recommender: StubRecommender,
) -> Harness {
    let applicants = MemoryApplicants::default();
    let ratings = MemoryRatings::default();
    let stores = AdmissionStores {
        applicants: Arc::new(applicants.clone()),
        ratings: Arc::new(ratings.clone()),
        profiles: Arc::new(MemoryProfiles::with(profiles)),
    };
    let service = AdmissionService::new(
        stores,
        Arc::new(classifier.clone()),
        Arc::new(recommender.clone()),
        Arc::new(engine()),
    );

    Harness {
        service,
        applicants,
        ratings,
        classifier,
        recommender,
    }
}

pub(super) fn factory(profiles: Vec<Profile>) -> NotificationFactory {
    NotificationFactory::new(Arc::new(MemoryProfiles::with(profiles)), Arc::new(engine()))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
