//! Applicant rank tracking, status classification, and notification fan-out.
//!
//! Ranks are observed once per day per (applicant, direction). The trajectory module
//! turns those observations into kinematic signals, the status engine combines them
//! with the admission probability and the direction's budget seats, and the broadcast
//! orchestrator turns the resulting status into notifications for registered users.

pub mod broadcast;
pub mod capacity;
pub mod domain;
pub mod notification;
pub mod recommendations;
pub mod repository;
pub mod router;
pub mod service;
pub mod status;
pub mod trajectory;

#[cfg(test)]
mod tests;

pub use broadcast::{
    page_count, BroadcastError, BroadcastOrchestrator, BroadcastSettings, BroadcastSummary,
    MissingCapacityPolicy,
};
pub use capacity::{BudgetCapacity, CapacityError};
pub use domain::{
    ApplicantId, ApplicantSnapshot, CompetitionEntry, Exam, Gender, IngestViolation, Profile,
    ProfileDraft, ProfileViolation, RatingHistory, RatingObservation, RatingPosition, UserId,
};
pub use notification::{
    make_notification, Notification, NotificationError, NotificationFactory, NotificationLevel,
};
pub use recommendations::{
    filter_recommendations, rerank, DirectionChoice, LabeledRecommendation,
    RecommendationCandidate, RecommendationStatus, RecommendedDirection,
};
pub use repository::{
    AdmissionClassifier, ApplicantRepository, NotificationPublisher, PredictionRequest,
    ProfileRepository, PublishError, RatingRepository, RecommendationSource, RepositoryError,
    ServiceError,
};
pub use router::admission_router;
pub use service::{
    AdmissionService, AdmissionServiceError, AdmissionStores, CompetitionList, IngestReport,
    RatingHistoryView,
};
pub use status::{
    RatingStatus, StatusAssessment, StatusEngine, StatusError, StatusSignals, StatusThresholds,
};
pub use trajectory::{
    analyze, is_rating_stable, SparseWindow, TrajectoryAnalysis, TrajectoryError,
};
