//! Kinematic signals derived from an applicant's rank history.
//!
//! Velocity is the day-over-day improvement in rank (positive when the applicant
//! moves toward first place), acceleration is the change in that improvement, and
//! stability is the sample standard deviation of the raw ranks.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::domain::RatingHistory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TrajectoryError {
    #[error("rating history is empty")]
    InsufficientHistory,
}

/// How to treat a lookback window holding fewer than two observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SparseWindow {
    #[default]
    Stable,
    Unstable,
}

/// Full set of derived signals for a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryAnalysis {
    pub velocity: Vec<f64>,
    pub mean_velocity: f64,
    pub acceleration: Vec<f64>,
    /// `None` when the history holds a single observation.
    pub stability: Option<f64>,
}

impl TrajectoryAnalysis {
    pub fn latest_velocity(&self) -> f64 {
        self.velocity.last().copied().unwrap_or(0.0)
    }
}

pub fn analyze(history: &RatingHistory) -> Result<TrajectoryAnalysis, TrajectoryError> {
    Ok(TrajectoryAnalysis {
        velocity: velocity(history)?,
        mean_velocity: mean_velocity(history)?,
        acceleration: acceleration(history)?,
        stability: stability(history)?,
    })
}

/// Signed rank changes `rank[i] - rank[i-1]`, zero for the first observation.
fn rank_changes(history: &RatingHistory) -> Result<Vec<i64>, TrajectoryError> {
    if history.is_empty() {
        return Err(TrajectoryError::InsufficientHistory);
    }

    let mut changes = Vec::with_capacity(history.len());
    let mut previous: Option<i64> = None;
    for rank in history.ranks() {
        let rank = i64::from(rank);
        changes.push(previous.map_or(0, |prev| rank - prev));
        previous = Some(rank);
    }
    Ok(changes)
}

pub fn velocity(history: &RatingHistory) -> Result<Vec<f64>, TrajectoryError> {
    let changes = rank_changes(history)?;
    Ok(changes.into_iter().map(|change| (-change) as f64).collect())
}

pub fn mean_velocity(history: &RatingHistory) -> Result<f64, TrajectoryError> {
    let velocity = velocity(history)?;
    Ok(velocity.iter().sum::<f64>() / velocity.len() as f64)
}

/// Negated first difference of the rank changes; the first entry has no prior and is zero.
pub fn acceleration(history: &RatingHistory) -> Result<Vec<f64>, TrajectoryError> {
    let changes = rank_changes(history)?;
    let mut acceleration = Vec::with_capacity(changes.len());
    acceleration.push(0.0);
    acceleration.extend(
        changes
            .windows(2)
            .map(|pair| (pair[0] - pair[1]) as f64),
    );
    Ok(acceleration)
}

/// Sample standard deviation of the raw ranks.
pub fn stability(history: &RatingHistory) -> Result<Option<f64>, TrajectoryError> {
    if history.is_empty() {
        return Err(TrajectoryError::InsufficientHistory);
    }
    if history.len() < 2 {
        return Ok(None);
    }

    let count = history.len() as f64;
    let mean = history.ranks().map(f64::from).sum::<f64>() / count;
    let variance = history
        .ranks()
        .map(|rank| (f64::from(rank) - mean).powi(2))
        .sum::<f64>()
        / (count - 1.0);
    Ok(Some(variance.sqrt()))
}

/// `true` when no consecutive rank change inside the last `days_count` days exceeds `max_change`.
///
/// A window with fewer than two observations counts as stable; an empty history never does.
pub fn is_rating_stable(history: &RatingHistory, days_count: u32, max_change: u32) -> bool {
    is_rating_stable_with(history, days_count, max_change, SparseWindow::Stable)
}

pub fn is_rating_stable_with(
    history: &RatingHistory,
    days_count: u32,
    max_change: u32,
    sparse: SparseWindow,
) -> bool {
    let Some(latest) = history.latest() else {
        return false;
    };
    let window_start = latest.date - Duration::days(i64::from(days_count));

    let window: Vec<u32> = history
        .positions()
        .iter()
        .filter(|position| position.date >= window_start)
        .map(|position| position.rank)
        .collect();

    if window.len() < 2 {
        return sparse == SparseWindow::Stable;
    }

    window
        .windows(2)
        .map(|pair| pair[0].abs_diff(pair[1]))
        .max()
        .is_some_and(|largest| largest <= max_change)
}
