use serde::{Deserialize, Serialize};

use super::super::domain::{ApplicantSnapshot, RatingHistory};
use super::super::trajectory::is_rating_stable_with;
use super::config::StatusThresholds;

/// Boolean facts about an applicant that the status policy chooses between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSignals {
    pub budget_seats: u32,
    pub latest_velocity: f64,
    /// High probability and comfortably inside the budget cutoff.
    pub high_probability: bool,
    /// Rank held steady over the lookback window near the top of the list.
    pub stable_top_rank: bool,
    pub fast_rank_drop: bool,
    pub in_warning_zone: bool,
    pub low_probability: bool,
    pub outside_budget: bool,
}

pub(crate) fn collect_signals(
    snapshot: &ApplicantSnapshot,
    history: &RatingHistory,
    budget_seats: u32,
    latest_velocity: f64,
    thresholds: &StatusThresholds,
) -> StatusSignals {
    let rank = i64::from(snapshot.rank);
    let seats = i64::from(budget_seats);
    let margin = i64::from(thresholds.warning_zone_margin);

    let high_probability =
        snapshot.probability >= thresholds.positive_threshold_probability && rank < seats - margin;

    let stable_top_rank = is_rating_stable_with(
        history,
        thresholds.days_count,
        thresholds.max_change,
        thresholds.sparse_window,
    ) && snapshot.rank <= thresholds.top_rating_cutoff;

    StatusSignals {
        budget_seats,
        latest_velocity,
        high_probability,
        stable_top_rank,
        fast_rank_drop: latest_velocity <= thresholds.velocity_drop_threshold,
        in_warning_zone: seats - rank > margin,
        low_probability: snapshot.probability <= thresholds.critical_threshold_probability,
        outside_budget: rank > seats,
    }
}
