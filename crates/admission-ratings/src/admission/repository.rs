use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicantId, ApplicantSnapshot, Profile, RatingHistory, RatingObservation, UserId,
};
use super::notification::Notification;
use super::recommendations::RecommendedDirection;

/// Registered profiles, keyed by user and by applicant.
pub trait ProfileRepository: Send + Sync {
    fn fetch(&self, user_id: &UserId) -> Result<Option<Profile>, RepositoryError>;
    fn get_by_applicant_id(
        &self,
        applicant_id: ApplicantId,
    ) -> Result<Option<Profile>, RepositoryError>;
    /// Fails with `Conflict` when the user already has a profile.
    fn create(&self, profile: Profile) -> Result<(), RepositoryError>;
    /// Replaces the stored profile of `profile.user_id`; `NotFound` when there is none.
    fn update(&self, profile: Profile) -> Result<(), RepositoryError>;
    fn delete(&self, user_id: &UserId) -> Result<(), RepositoryError>;
}

/// Current applicant snapshots, one per (applicant, direction).
pub trait ApplicantRepository: Send + Sync {
    /// Insert or replace snapshots keyed by applicant and direction.
    fn upsert_batch(&self, snapshots: Vec<ApplicantSnapshot>) -> Result<(), RepositoryError>;
    fn fetch(
        &self,
        applicant_id: ApplicantId,
        direction: &str,
    ) -> Result<Option<ApplicantSnapshot>, RepositoryError>;
    /// All enrollments of one applicant, ordered by declared priority.
    fn list_for_applicant(
        &self,
        applicant_id: ApplicantId,
    ) -> Result<Vec<ApplicantSnapshot>, RepositoryError>;
    /// Every enrollment in one direction, ordered by rank.
    fn list_by_direction(&self, direction: &str)
        -> Result<Vec<ApplicantSnapshot>, RepositoryError>;
    fn count(&self) -> Result<usize, RepositoryError>;
    /// One-based page of snapshots in a stable order.
    fn paginate(&self, page: usize, limit: usize)
        -> Result<Vec<ApplicantSnapshot>, RepositoryError>;
}

/// Append-only rank history with one observation per applicant, direction and date.
pub trait RatingRepository: Send + Sync {
    fn upsert_batch(&self, observations: Vec<RatingObservation>) -> Result<(), RepositoryError>;
    fn read(&self, applicant_id: ApplicantId, direction: &str)
        -> Result<RatingHistory, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound delivery channel for notifications (message broker, push, e-mail).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Input row for the external admission-probability classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub points: u16,
    pub direction: String,
}

/// Binary classifier estimating the probability of a budget seat.
#[async_trait]
pub trait AdmissionClassifier: Send + Sync {
    /// Probabilities in the same order as `requests`.
    async fn predict_batch(&self, requests: Vec<PredictionRequest>)
        -> Result<Vec<f64>, ServiceError>;
}

/// External recommender suggesting alternative directions for a profile.
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    async fn recommend(
        &self,
        profile: &Profile,
        points: u16,
        top_n: usize,
    ) -> Result<Vec<RecommendedDirection>, ServiceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },
    #[error("{service} returned {actual} results for {expected} inputs")]
    LengthMismatch {
        service: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{service} returned probability {value} outside [0, 1]")]
    InvalidProbability { service: &'static str, value: f64 },
}
