mod config;
mod policy;
mod rules;

pub use config::StatusThresholds;
pub use policy::RatingStatus;
pub use rules::StatusSignals;

use std::sync::Arc;

use super::capacity::BudgetCapacity;
use super::domain::{ApplicantSnapshot, RatingHistory};
use super::trajectory::velocity;
use policy::decide_status;
use rules::collect_signals;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("budget seats unknown for direction '{direction}'")]
    MissingCapacity { direction: String },
    #[error("rating history is empty; status cannot be derived")]
    InsufficientHistory,
}

/// Status together with the signals that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusAssessment {
    pub status: RatingStatus,
    pub signals: StatusSignals,
}

/// Stateless classifier binding thresholds to a budget capacity table.
#[derive(Debug, Clone)]
pub struct StatusEngine {
    thresholds: StatusThresholds,
    capacity: Arc<BudgetCapacity>,
}

impl StatusEngine {
    pub fn new(thresholds: StatusThresholds, capacity: Arc<BudgetCapacity>) -> Self {
        Self {
            thresholds,
            capacity,
        }
    }

    pub fn assess(
        &self,
        snapshot: &ApplicantSnapshot,
        history: &RatingHistory,
    ) -> Result<StatusAssessment, StatusError> {
        assess(snapshot, history, &self.capacity, &self.thresholds)
    }

    pub fn classify(
        &self,
        snapshot: &ApplicantSnapshot,
        history: &RatingHistory,
    ) -> Result<RatingStatus, StatusError> {
        self.assess(snapshot, history)
            .map(|assessment| assessment.status)
    }
}

pub fn assess(
    snapshot: &ApplicantSnapshot,
    history: &RatingHistory,
    capacity: &BudgetCapacity,
    thresholds: &StatusThresholds,
) -> Result<StatusAssessment, StatusError> {
    let budget_seats = capacity.budget_seats(&snapshot.direction).ok_or_else(|| {
        StatusError::MissingCapacity {
            direction: snapshot.direction.clone(),
        }
    })?;
    let latest_velocity = velocity(history)
        .map_err(|_| StatusError::InsufficientHistory)?
        .last()
        .copied()
        .ok_or(StatusError::InsufficientHistory)?;

    let signals = collect_signals(snapshot, history, budget_seats, latest_velocity, thresholds);
    let status = decide_status(&signals);

    Ok(StatusAssessment { status, signals })
}

/// Classify an applicant's standing; first matching rule of POSITIVE, WARNING, CRITICAL wins.
pub fn classify(
    snapshot: &ApplicantSnapshot,
    history: &RatingHistory,
    capacity: &BudgetCapacity,
    thresholds: &StatusThresholds,
) -> Result<RatingStatus, StatusError> {
    assess(snapshot, history, capacity, thresholds).map(|assessment| assessment.status)
}
