use crate::admission::broadcast::BroadcastError;
use crate::admission::capacity::CapacityError;
use crate::admission::repository::RepositoryError;
use crate::admission::status::StatusError;
use crate::admission::trajectory::TrajectoryError;
use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Capacity(CapacityError),
    Csv(csv::Error),
    Repository(RepositoryError),
    Trajectory(TrajectoryError),
    Status(StatusError),
    Broadcast(BroadcastError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Capacity(err) => write!(f, "budget capacity error: {}", err),
            AppError::Csv(err) => write!(f, "csv error: {}", err),
            AppError::Repository(err) => write!(f, "repository error: {}", err),
            AppError::Trajectory(err) => write!(f, "trajectory error: {}", err),
            AppError::Status(err) => write!(f, "status error: {}", err),
            AppError::Broadcast(err) => write!(f, "broadcast error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Capacity(err) => Some(err),
            AppError::Csv(err) => Some(err),
            AppError::Repository(err) => Some(err),
            AppError::Trajectory(err) => Some(err),
            AppError::Status(err) => Some(err),
            AppError::Broadcast(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Csv(_) => StatusCode::BAD_REQUEST,
            AppError::Trajectory(_) | AppError::Status(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Capacity(_)
            | AppError::Repository(_)
            | AppError::Broadcast(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<CapacityError> for AppError {
    fn from(value: CapacityError) -> Self {
        Self::Capacity(value)
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Repository(value)
    }
}

impl From<StatusError> for AppError {
    fn from(value: StatusError) -> Self {
        Self::Status(value)
    }
}

impl From<TrajectoryError> for AppError {
    fn from(value: TrajectoryError) -> Self {
        Self::Trajectory(value)
    }
}

impl From<BroadcastError> for AppError {
    fn from(value: BroadcastError) -> Self {
        Self::Broadcast(value)
    }
}
