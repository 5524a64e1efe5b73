//! Rating trajectory analytics and notification decisions for budget-seat admission tracking.

pub mod admission;
pub mod config;
pub mod error;
pub mod telemetry;
