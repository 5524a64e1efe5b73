use serde::{Deserialize, Serialize};

use super::super::trajectory::SparseWindow;

/// Thresholds driving the status rules; injected rather than read from globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusThresholds {
    pub positive_threshold_probability: f64,
    pub critical_threshold_probability: f64,
    /// Latest single-day velocity at or below this value counts as a fast fall.
    pub velocity_drop_threshold: f64,
    pub warning_zone_margin: u32,
    pub days_count: u32,
    pub max_change: u32,
    pub top_rating_cutoff: u32,
    pub sparse_window: SparseWindow,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            positive_threshold_probability: 0.75,
            critical_threshold_probability: 0.15,
            velocity_drop_threshold: -10.0,
            warning_zone_margin: 5,
            days_count: 3,
            max_change: 2,
            top_rating_cutoff: 10,
            sparse_window: SparseWindow::Stable,
        }
    }
}
