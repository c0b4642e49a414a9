use super::common::*;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use crate::matching::directory::InMemoryDirectory;
use crate::matching::router::{self, matching_router};
use crate::matching::service::MatchingService;

fn router_for(harness: Harness) -> axum::Router {
    matching_router(Arc::new(harness.service))
}

#[tokio::test]
async fn enroll_route_creates_entry() {
    let router = router_for(harness());

    let response = router
        .oneshot(request(
            Method::POST,
            "/api/v1/enroll",
            Some(ANA),
            Some(json!(cardiology_request())),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "awaiting_draw");
    assert_eq!(payload["status_label"], "Awaiting draw");
    assert_eq!(payload["enrolled_at"], "2025-03-01T09:00:00");
    assert_eq!(payload["expires_at"], "2025-03-31T09:00:00");
}

#[tokio::test]
async fn duplicate_enrollment_returns_conflict() {
    let harness = harness();
    harness.service.enroll(&ANA, &cardiology_request()).unwrap();
    let router = router_for(harness);

    let response = router
        .oneshot(request(
            Method::POST,
            "/api/v1/enroll",
            Some(ANA),
            Some(json!(cardiology_request())),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .unwrap_or_default()
        .contains("already exists"));
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let router = router_for(harness());

    let response = router
        .oneshot(request(Method::GET, "/api/v1/enroll", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json_body(response).await;
    assert!(payload.get("error").is_some());
}

#[tokio::test]
async fn wrong_role_is_forbidden() {
    let router = router_for(harness());

    let response = router
        .oneshot(request(Method::GET, "/api/v1/draw", Some(ANA), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn draw_route_returns_patient_and_engagement() {
    let harness = harness();
    harness.service.enroll(&ANA, &cardiology_request()).unwrap();
    let router = router_for(harness);

    let response = router
        .oneshot(request(Method::GET, "/api/v1/draw", Some(DR_JOAO), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["patient"]["name"], "Ana Souza");
    assert_eq!(
        payload["patient"]["description"],
        cardiology_request().description
    );
    assert_eq!(payload["engagement"]["status"], "active");
    assert_eq!(payload["engagement"]["started_at"], "2025-03-01T09:00:00");
}

#[tokio::test]
async fn empty_pool_draw_is_not_found() {
    let service = Arc::new(harness().service);

    let response = router::draw_handler(State(service), DR_JOAO).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn short_justification_is_a_bad_request() {
    let harness = harness();
    harness.service.enroll(&ANA, &cardiology_request()).unwrap();
    let outcome = harness.service.draw(&DR_JOAO).unwrap();
    let router = router_for(harness);

    let response = router
        .oneshot(request(
            Method::PUT,
            &format!("/api/v1/engagement/{}/cancel", outcome.engagement.id),
            Some(DR_JOAO),
            Some(json!({ "justification": "a".repeat(19) })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn professional_cancel_route_reports_requeued_enrollment() {
    let harness = harness();
    let original = harness.service.enroll(&ANA, &cardiology_request()).unwrap();
    let outcome = harness.service.draw(&DR_JOAO).unwrap();
    let router = router_for(harness);

    let response = router
        .oneshot(request(
            Method::PUT,
            &format!("/api/v1/engagement/{}/cancel", outcome.engagement.id),
            Some(DR_JOAO),
            Some(json!({ "justification": JUSTIFICATION })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["engagement"]["status"], "cancelled_by_professional");
    assert_eq!(
        payload["requeued_enrollment"]["origin_enrollment_id"],
        original.id.0
    );
}

#[tokio::test]
async fn confirm_twice_names_current_status() {
    let harness = harness();
    harness.service.enroll(&ANA, &cardiology_request()).unwrap();
    let outcome = harness.service.draw(&DR_JOAO).unwrap();
    harness
        .service
        .complete_engagement(&DR_JOAO, outcome.engagement.id)
        .unwrap();
    let router = router_for(harness);
    let uri = format!("/api/v1/engagement/{}/confirm", outcome.engagement.id);

    let first = router
        .clone()
        .oneshot(request(Method::POST, &uri, Some(ANA), None))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(read_json_body(first).await["status"], "confirmed_by_patient");

    let second = router
        .oneshot(request(Method::POST, &uri, Some(ANA), None))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(second).await;
    assert!(payload["error"]
        .as_str()
        .unwrap_or_default()
        .contains("confirmed_by_patient"));
}

#[tokio::test]
async fn engagement_detail_includes_frozen_description() {
    let harness = harness();
    harness.service.enroll(&ANA, &cardiology_request()).unwrap();
    let outcome = harness.service.draw(&DR_JOAO).unwrap();
    let router = router_for(harness);
    let uri = format!("/api/v1/engagement/{}", outcome.engagement.id);

    let response = router
        .clone()
        .oneshot(request(Method::GET, &uri, Some(DR_JOAO), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["description"], cardiology_request().description);
    assert_eq!(payload["patient"]["email"], "ana@example.com");
    assert_eq!(payload["professional"], "Dr. João Silva");
    assert_eq!(payload["municipality"], "São Paulo");

    let response = router
        .oneshot(request(Method::GET, &uri, Some(CARLOS), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sweep_route_is_admin_only() {
    let router = router_for(harness());

    let response = router
        .clone()
        .oneshot(request(Method::POST, "/api/v1/admin/sweep", Some(DR_JOAO), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .oneshot(request(Method::POST, "/api/v1/admin/sweep", Some(ADMIN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["closed"], json!([]));
}

#[tokio::test]
async fn store_outage_hides_details() {
    let service = Arc::new(MatchingService::new(
        Arc::new(UnavailableStore),
        Arc::new(InMemoryDirectory::sample()),
        Arc::new(RecordingNotifier::default()),
        policy(),
        templates(),
    ));

    let response = router::awaiting_handler(State(service), ANA).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "internal server error");
}
