use serde::{Deserialize, Serialize};

use super::rules::StatusSignals;

/// Competitive standing of an applicant for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RatingStatus {
    Positive,
    Warning,
    Critical,
    Ok,
}

struct StatusRule {
    status: RatingStatus,
    applies: fn(&StatusSignals) -> bool,
}

fn is_positive(signals: &StatusSignals) -> bool {
    signals.high_probability || signals.stable_top_rank
}

fn is_warning(signals: &StatusSignals) -> bool {
    signals.fast_rank_drop || signals.in_warning_zone
}

fn is_critical(signals: &StatusSignals) -> bool {
    signals.low_probability || signals.outside_budget
}

/// Evaluated top to bottom; the first matching rule decides the status.
const RULES: [StatusRule; 3] = [
    StatusRule {
        status: RatingStatus::Positive,
        applies: is_positive,
    },
    StatusRule {
        status: RatingStatus::Warning,
        applies: is_warning,
    },
    StatusRule {
        status: RatingStatus::Critical,
        applies: is_critical,
    },
];

pub(crate) fn decide_status(signals: &StatusSignals) -> RatingStatus {
    RULES
        .iter()
        .find(|rule| (rule.applies)(signals))
        .map(|rule| rule.status)
        .unwrap_or(RatingStatus::Ok)
}
