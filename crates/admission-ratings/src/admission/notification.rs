use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{ApplicantSnapshot, Profile, RatingHistory, UserId};
use super::repository::{ProfileRepository, RepositoryError};
use super::status::{RatingStatus, StatusAssessment, StatusEngine, StatusError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationLevel {
    Positive,
    Warning,
    Critical,
}

impl NotificationLevel {
    /// Level for a status; the neutral status carries no notification.
    pub fn for_status(status: RatingStatus) -> Option<Self> {
        match status {
            RatingStatus::Positive => Some(Self::Positive),
            RatingStatus::Warning => Some(Self::Warning),
            RatingStatus::Critical => Some(Self::Critical),
            RatingStatus::Ok => None,
        }
    }
}

/// Value object handed to the delivery channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub user_id: UserId,
    pub text: String,
    /// Base64-encoded image attachment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error(transparent)]
    Status(#[from] StatusError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Build the notification for an applicant whose profile is already known.
///
/// Returns `Ok(None)` when there is no profile or the status is neutral.
pub fn make_notification(
    engine: &StatusEngine,
    snapshot: &ApplicantSnapshot,
    history: &RatingHistory,
    profile: Option<&Profile>,
) -> Result<Option<Notification>, StatusError> {
    let Some(profile) = profile else {
        return Ok(None);
    };

    let assessment = engine.assess(snapshot, history)?;
    Ok(compose(profile, snapshot, &assessment))
}

fn compose(
    profile: &Profile,
    snapshot: &ApplicantSnapshot,
    assessment: &StatusAssessment,
) -> Option<Notification> {
    let level = NotificationLevel::for_status(assessment.status)?;
    let probability = format_probability(snapshot.probability);

    let text = match level {
        NotificationLevel::Positive => format!(
            "Great news! Your chances of a budget seat in \"{}\" are {}. Keep it up!",
            snapshot.direction, probability
        ),
        NotificationLevel::Warning => format!(
            "Heads up: your position in \"{}\" needs attention. Admission probability {}, \
             current rank {}, latest change {:+} places.",
            snapshot.direction, probability, snapshot.rank, assessment.signals.latest_velocity as i64
        ),
        NotificationLevel::Critical => format!(
            "Your chances of a budget seat in \"{}\" have dropped to {}. \
             Take a look at the recommended directions to keep your options open.",
            snapshot.direction, probability
        ),
    };

    Some(Notification {
        level,
        user_id: profile.user_id,
        text,
        photo: None,
    })
}

fn format_probability(probability: f64) -> String {
    format!("{:.0}%", (probability * 100.0).clamp(0.0, 100.0))
}

/// Looks up the applicant's profile before deciding on a notification.
pub struct NotificationFactory {
    profiles: Arc<dyn ProfileRepository>,
    engine: Arc<StatusEngine>,
}

impl NotificationFactory {
    pub fn new(profiles: Arc<dyn ProfileRepository>, engine: Arc<StatusEngine>) -> Self {
        Self { profiles, engine }
    }

    pub fn notification_for(
        &self,
        snapshot: &ApplicantSnapshot,
        history: &RatingHistory,
    ) -> Result<Option<Notification>, NotificationError> {
        let profile = self.profiles.get_by_applicant_id(snapshot.applicant_id)?;
        if profile.is_none() {
            debug!(
                applicant_id = %snapshot.applicant_id,
                "no registered profile; skipping notification"
            );
        }

        Ok(make_notification(
            &self.engine,
            snapshot,
            history,
            profile.as_ref(),
        )?)
    }
}
