use super::common::*;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use crate::admission::repository::ApplicantRepository;
use crate::admission::router::admission_router;
use crate::admission::service::{AdmissionService, AdmissionStores};

fn get(uri: String) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("valid request")
}

fn post_json(uri: &str, payload: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("valid request")
}

fn warning_harness() -> Harness {
    let h = harness(
        vec![profile(81, 81)],
        StubClassifier::new(0.5),
        StubRecommender::new(vec![recommended(1, "Law")]),
    );
    h.applicants
        .upsert_batch(vec![snapshot(81, INFORMATICS, 0.5, 20)])
        .expect("upsert succeeds");
    h.ratings.insert(INFORMATICS, history(81, &[8, 20]));
    h
}

#[tokio::test]
async fn analyze_route_returns_trajectory() {
    let router = admission_router(Arc::new(warning_harness().service));

    let response = router
        .oneshot(post_json(
            "/api/v1/trajectory/analyze",
            json!([
                {"applicant_id": 1, "rank": 50, "date": "2025-07-01"},
                {"applicant_id": 1, "rank": 40, "date": "2025-07-02"},
                {"applicant_id": 1, "rank": 60, "date": "2025-07-03"}
            ]),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["velocity"], json!([0.0, 10.0, -20.0]));
    assert_eq!(payload["acceleration"], json!([0.0, 10.0, -30.0]));
    assert_eq!(payload["stability"], json!(10.0));
}

#[tokio::test]
async fn analyze_route_rejects_empty_history() {
    let router = admission_router(Arc::new(warning_harness().service));

    let response = router
        .oneshot(post_json("/api/v1/trajectory/analyze", json!([])))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .unwrap_or_default()
        .contains("empty"));
}

#[tokio::test]
async fn rating_history_route_returns_status_and_last_change() {
    let router = admission_router(Arc::new(warning_harness().service));

    let response = router
        .oneshot(get(format!(
            "/api/v1/rating-history/{}?direction=09.03.01%20Informatics",
            user_id(81)
        )))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], json!("WARNING"));
    assert_eq!(payload["last_change"], json!(-12));
    assert_eq!(payload["ratings"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn rating_history_route_maps_absence_to_not_found() {
    let router = admission_router(Arc::new(warning_harness().service));

    let response = router
        .oneshot(get(format!(
            "/api/v1/rating-history/{}?direction=03.03.02%20Physics",
            user_id(81)
        )))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rerank_route_returns_reordered_choices() {
    let h = warning_harness();
    let mut chemistry = snapshot(81, CHEMISTRY, 0.7, 3);
    chemistry.priority = 2;
    h.applicants
        .upsert_batch(vec![chemistry])
        .expect("upsert succeeds");
    let router = admission_router(Arc::new(h.service));

    let response = router
        .oneshot(get(format!(
            "/api/v1/applicants/{}/rerank-priorities",
            user_id(81)
        )))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload[0]["direction"], json!(CHEMISTRY));
    assert_eq!(payload[0]["priority"], json!(1));
    assert_eq!(payload[1]["direction"], json!(INFORMATICS));
}

#[tokio::test]
async fn recommend_route_validates_top_n() {
    let router = admission_router(Arc::new(warning_harness().service));

    let response = router
        .oneshot(get(format!(
            "/api/v1/applicants/{}/recommend-directions?top_n=0",
            user_id(81)
        )))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn recommend_route_reports_upstream_failure_as_bad_gateway() {
    let service = AdmissionService::new(
        AdmissionStores {
            applicants: Arc::new(MemoryApplicants::default()),
            ratings: Arc::new(MemoryRatings::default()),
            profiles: Arc::new(MemoryProfiles::with(vec![profile(82, 82)])),
        },
        Arc::new(OfflineClassifier),
        Arc::new(StubRecommender::new(vec![recommended(1, "Law")])),
        Arc::new(engine()),
    );
    let router = admission_router(Arc::new(service));

    let response = router
        .oneshot(get(format!(
            "/api/v1/applicants/{}/recommend-directions?top_n=5",
            user_id(82)
        )))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn repository_failure_maps_to_internal_error() {
    let service = AdmissionService::new(
        AdmissionStores {
            applicants: Arc::new(UnavailableApplicants),
            ratings: Arc::new(MemoryRatings::default()),
            profiles: Arc::new(MemoryProfiles::with(vec![profile(83, 83)])),
        },
        Arc::new(StubClassifier::new(0.5)),
        Arc::new(StubRecommender::default()),
        Arc::new(engine()),
    );
    let router = admission_router(Arc::new(service));

    let response = router
        .oneshot(get(format!(
            "/api/v1/applicants/{}/rerank-priorities",
            user_id(83)
        )))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn competition_list_route_accepts_uploads() {
    let h = harness(
        Vec::new(),
        StubClassifier::new(0.64),
        StubRecommender::default(),
    );
    let applicants = h.applicants.clone();
    let router = admission_router(Arc::new(h.service));

    let response = router
        .oneshot(post_json(
            "/api/v1/competition-lists",
            json!({
                "observed_on": "2025-07-05",
                "applicants": [
                    serde_json::to_value(entry(91, INFORMATICS, 3, 1)).expect("serializable"),
                    serde_json::to_value(entry(92, INFORMATICS, 4, 1)).expect("serializable")
                ]
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["applicants"], json!(2));
    assert_eq!(payload["observed_on"], json!("2025-07-05"));
    assert_eq!(applicants.count().expect("count succeeds"), 2);
}

#[tokio::test]
async fn competition_list_route_rejects_invalid_rows() {
    let router = admission_router(Arc::new(warning_harness().service));
    let mut invalid = entry(93, INFORMATICS, 0, 1);
    invalid.points = 120;

    let response = router
        .oneshot(post_json(
            "/api/v1/competition-lists",
            json!({
                "applicants": [serde_json::to_value(invalid).expect("serializable")]
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

fn json_request(method: &str, uri: &str, payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("valid request")
}

#[tokio::test]
async fn profile_routes_cover_create_read_update_delete() {
    let service = Arc::new(
        harness(
            Vec::new(),
            StubClassifier::new(0.5),
            StubRecommender::default(),
        )
        .service,
    );
    let uri = format!("/api/v1/profiles/{}", user_id(85));
    let body = json!({
        "user_id": user_id(85),
        "applicant_id": 85,
        "gender": "female",
        "gpa": 4.4,
        "exams": [{"name": "math", "points": 90}, {"subject": "physics", "points": 71}]
    });

    let created = admission_router(Arc::clone(&service))
        .oneshot(post_json("/api/v1/profiles", body.clone()))
        .await
        .expect("route executes");
    assert_eq!(created.status(), StatusCode::CREATED);
    assert_eq!(read_json_body(created).await["exams"][0]["subject"], json!("math"));

    let duplicate = admission_router(Arc::clone(&service))
        .oneshot(post_json("/api/v1/profiles", body))
        .await
        .expect("route executes");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let updated = admission_router(Arc::clone(&service))
        .oneshot(json_request(
            "PUT",
            &uri,
            json!({"applicant_id": 85, "gender": "female", "gpa": 3.8, "exams": []}),
        ))
        .await
        .expect("route executes");
    assert_eq!(updated.status(), StatusCode::OK);

    let fetched = admission_router(Arc::clone(&service))
        .oneshot(get(uri.clone()))
        .await
        .expect("route executes");
    assert_eq!(fetched.status(), StatusCode::OK);
    let payload = read_json_body(fetched).await;
    assert_eq!(payload["exams"], json!([]));
    assert!((payload["gpa"].as_f64().unwrap_or_default() - 3.8).abs() < 1e-6);

    let deleted = admission_router(Arc::clone(&service))
        .oneshot(
            Request::delete(uri.as_str())
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
        .expect("route executes");
    assert_eq!(deleted.status(), StatusCode::ACCEPTED);

    let gone = admission_router(service)
        .oneshot(get(uri))
        .await
        .expect("route executes");
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_routes_reject_out_of_range_values() {
    let router = admission_router(Arc::new(warning_harness().service));

    let response = router
        .oneshot(post_json(
            "/api/v1/profiles",
            json!({
                "user_id": user_id(86),
                "applicant_id": 86,
                "gender": "male",
                "gpa": 4.0,
                "exams": [{"subject": "math", "points": 120}]
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn update_of_unknown_profile_is_not_found() {
    let router = admission_router(Arc::new(warning_harness().service));

    let response = router
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/profiles/{}", user_id(404)),
            json!({"applicant_id": 404, "gender": "male", "gpa": 4.0}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_applicants_and_competition_list_routes() {
    let h = warning_harness();
    h.applicants
        .upsert_batch(vec![snapshot(87, INFORMATICS, 0.7, 3)])
        .expect("upsert succeeds");
    let service = Arc::new(h.service);

    let enrollments = admission_router(Arc::clone(&service))
        .oneshot(get(format!("/api/v1/profiles/{}/applicants", user_id(81))))
        .await
        .expect("route executes");
    assert_eq!(enrollments.status(), StatusCode::OK);
    let payload = read_json_body(enrollments).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));
    assert_eq!(payload[0]["direction"], json!(INFORMATICS));

    let list = admission_router(Arc::clone(&service))
        .oneshot(get(format!(
            "/api/v1/competition-lists/{}?direction=09.03.01%20Informatics",
            user_id(81)
        )))
        .await
        .expect("route executes");
    assert_eq!(list.status(), StatusCode::OK);
    let payload = read_json_body(list).await;
    assert_eq!(payload["applicant_id"], json!(81));
    assert_eq!(payload["direction"], json!(INFORMATICS));
    let ranks: Vec<u64> = payload["applicants"]
        .as_array()
        .map(|applicants| {
            applicants
                .iter()
                .filter_map(|applicant| applicant["rank"].as_u64())
                .collect()
        })
        .unwrap_or_default();
    assert_eq!(ranks, vec![3, 20]);

    let unknown_direction = admission_router(service)
        .oneshot(get(format!(
            "/api/v1/competition-lists/{}?direction=03.03.02%20Physics",
            user_id(81)
        )))
        .await
        .expect("route executes");
    assert_eq!(unknown_direction.status(), StatusCode::NOT_FOUND);
}
