use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use super::domain::{CompetitionEntry, Profile, ProfileDraft, RatingHistory, UserId};
use super::repository::RepositoryError;
use super::service::{AdmissionService, AdmissionServiceError};
use super::trajectory::analyze;

/// Router builder exposing rating analytics and recommendation use cases.
pub fn admission_router(service: Arc<AdmissionService>) -> Router {
    Router::new()
        .route(
            "/api/v1/rating-history/:user_id",
            get(rating_history_handler),
        )
        .route(
            "/api/v1/applicants/:user_id/rerank-priorities",
            get(rerank_handler),
        )
        .route(
            "/api/v1/applicants/:user_id/recommend-directions",
            get(recommend_handler),
        )
        .route("/api/v1/profiles", post(create_profile_handler))
        .route(
            "/api/v1/profiles/:user_id",
            get(get_profile_handler)
                .put(update_profile_handler)
                .delete(delete_profile_handler),
        )
        .route(
            "/api/v1/profiles/:user_id/applicants",
            get(profile_applicants_handler),
        )
        .route("/api/v1/competition-lists", post(ingest_handler))
        .route(
            "/api/v1/competition-lists/:user_id",
            get(competition_list_handler),
        )
        .route("/api/v1/trajectory/analyze", post(analyze_handler))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct DirectionQuery {
    pub(crate) direction: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopNQuery {
    pub(crate) top_n: usize,
}

/// Competition list upload; `observed_on` defaults to today's UTC date.
#[derive(Debug, Deserialize)]
pub(crate) struct CompetitionListUpload {
    #[serde(default)]
    pub(crate) observed_on: Option<NaiveDate>,
    pub(crate) applicants: Vec<CompetitionEntry>,
}

pub(crate) async fn create_profile_handler(
    State(service): State<Arc<AdmissionService>>,
    axum::Json(profile): axum::Json<Profile>,
) -> Response {
    match service.create_profile(profile) {
        Ok(profile) => (StatusCode::CREATED, axum::Json(profile)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_profile_handler(
    State(service): State<Arc<AdmissionService>>,
    Path(user_id): Path<Uuid>,
) -> Response {
    match service.profile(&UserId(user_id)) {
        Ok(Some(profile)) => (StatusCode::OK, axum::Json(profile)).into_response(),
        Ok(None) => not_found("profile not found"),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_profile_handler(
    State(service): State<Arc<AdmissionService>>,
    Path(user_id): Path<Uuid>,
    axum::Json(draft): axum::Json<ProfileDraft>,
) -> Response {
    match service.update_profile(&UserId(user_id), draft) {
        Ok(Some(profile)) => (StatusCode::OK, axum::Json(profile)).into_response(),
        Ok(None) => not_found("profile not found"),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_profile_handler(
    State(service): State<Arc<AdmissionService>>,
    Path(user_id): Path<Uuid>,
) -> Response {
    match service.delete_profile(&UserId(user_id)) {
        Ok(true) => (
            StatusCode::ACCEPTED,
            axum::Json(json!({ "user_id": user_id })),
        )
            .into_response(),
        Ok(false) => not_found("profile not found"),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn profile_applicants_handler(
    State(service): State<Arc<AdmissionService>>,
    Path(user_id): Path<Uuid>,
) -> Response {
    match service.profile_applicants(&UserId(user_id)) {
        Ok(Some(enrollments)) => (StatusCode::OK, axum::Json(enrollments)).into_response(),
        Ok(None) => not_found("applicants not found"),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn competition_list_handler(
    State(service): State<Arc<AdmissionService>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<DirectionQuery>,
) -> Response {
    match service.competition_list(&UserId(user_id), &query.direction) {
        Ok(Some(list)) => (StatusCode::OK, axum::Json(list)).into_response(),
        Ok(None) => not_found("competition list not found"),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn rating_history_handler(
    State(service): State<Arc<AdmissionService>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<DirectionQuery>,
) -> Response {
    match service.rating_history(&UserId(user_id), &query.direction) {
        Ok(Some(view)) => (StatusCode::OK, axum::Json(view)).into_response(),
        Ok(None) => not_found("rating history not found"),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn rerank_handler(
    State(service): State<Arc<AdmissionService>>,
    Path(user_id): Path<Uuid>,
) -> Response {
    match service.rerank_priorities(&UserId(user_id)) {
        Ok(Some(choices)) => (StatusCode::OK, axum::Json(choices)).into_response(),
        Ok(None) => not_found("profile not found"),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn recommend_handler(
    State(service): State<Arc<AdmissionService>>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<TopNQuery>,
) -> Response {
    match service
        .recommend_directions(&UserId(user_id), query.top_n)
        .await
    {
        Ok(Some(recommendations)) => (StatusCode::OK, axum::Json(recommendations)).into_response(),
        Ok(None) => not_found("profile not found"),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn ingest_handler(
    State(service): State<Arc<AdmissionService>>,
    axum::Json(upload): axum::Json<CompetitionListUpload>,
) -> Response {
    let observed_on = upload
        .observed_on
        .unwrap_or_else(|| Utc::now().date_naive());

    match service
        .ingest_competition_list(upload.applicants, observed_on)
        .await
    {
        Ok(report) => (StatusCode::ACCEPTED, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn analyze_handler(axum::Json(history): axum::Json<RatingHistory>) -> Response {
    match analyze(&history) {
        Ok(analysis) => (StatusCode::OK, axum::Json(analysis)).into_response(),
        Err(error) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
    }
}

fn not_found(message: &str) -> Response {
    let payload = json!({
        "error": message,
    });
    (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
}

fn error_response(error: AdmissionServiceError) -> Response {
    let status = match &error {
        AdmissionServiceError::Invalid(_)
        | AdmissionServiceError::InvalidProfile(_)
        | AdmissionServiceError::InvalidTopN { .. }
        | AdmissionServiceError::Trajectory(_)
        | AdmissionServiceError::Status(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AdmissionServiceError::ApplicantTaken { .. }
        | AdmissionServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        AdmissionServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        AdmissionServiceError::Service(_) => StatusCode::BAD_GATEWAY,
        AdmissionServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        warn!(error = %error, status = status.as_u16(), "admission request failed");
    }

    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
