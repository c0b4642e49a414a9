use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::directory::IdentityDirectory;
use super::domain::{Actor, EngagementId, EnrollmentId, EnrollmentRequest};
use super::error::MatchingError;
use super::notify::Notifier;
use super::repository::MatchStore;
use super::service::MatchingService;
use super::views::{
    CancellationView, DrawView, EngagementDetailView, EngagementSummaryView, EnrollmentView,
};

type SharedService<S, D, N> = Arc<MatchingService<S, D, N>>;

/// Body of an engagement cancellation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancellationRequest {
    #[serde(default)]
    pub justification: String,
}

/// Router builder exposing the enrollment, draw, and engagement endpoints.
pub fn matching_router<S, D, N>(service: SharedService<S, D, N>) -> Router
where
    S: MatchStore + 'static,
    D: IdentityDirectory + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/enroll",
            post(enroll_handler::<S, D, N>).get(awaiting_handler::<S, D, N>),
        )
        .route("/api/v1/enroll/:id", get(enrollment_handler::<S, D, N>))
        .route("/api/v1/enroll/:id/renew", put(renew_handler::<S, D, N>))
        .route(
            "/api/v1/enroll/:id/cancel",
            put(withdraw_handler::<S, D, N>),
        )
        .route("/api/v1/draw", get(draw_handler::<S, D, N>))
        .route("/api/v1/engagement", get(engagements_handler::<S, D, N>))
        .route(
            "/api/v1/engagement/:id",
            get(engagement_handler::<S, D, N>),
        )
        .route(
            "/api/v1/engagement/:id/cancel",
            put(cancel_engagement_handler::<S, D, N>),
        )
        .route(
            "/api/v1/engagement/:id/complete",
            put(complete_engagement_handler::<S, D, N>),
        )
        .route(
            "/api/v1/engagement/:id/confirm",
            post(confirm_engagement_handler::<S, D, N>),
        )
        .route("/api/v1/admin/sweep", post(sweep_handler::<S, D, N>))
        .with_state(service)
}

fn failure(error: MatchingError) -> Response {
    let payload = json!({
        "error": error.public_message(),
    });
    (error.status_code(), Json(payload)).into_response()
}

pub(crate) async fn enroll_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    actor: Actor,
    Json(request): Json<EnrollmentRequest>,
) -> Response
where
    S: MatchStore + 'static,
    D: IdentityDirectory + 'static,
    N: Notifier + 'static,
{
    match service.enroll(&actor, &request) {
        Ok(enrollment) => {
            let view = EnrollmentView::new(&enrollment, service.labels());
            (StatusCode::CREATED, Json(view)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn awaiting_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    actor: Actor,
) -> Response
where
    S: MatchStore + 'static,
    D: IdentityDirectory + 'static,
    N: Notifier + 'static,
{
    match service.awaiting_enrollments(&actor) {
        Ok(enrollments) => {
            let views: Vec<EnrollmentView> = enrollments
                .iter()
                .map(|enrollment| EnrollmentView::new(enrollment, service.labels()))
                .collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn enrollment_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response
where
    S: MatchStore + 'static,
    D: IdentityDirectory + 'static,
    N: Notifier + 'static,
{
    match service.enrollment(&actor, EnrollmentId(id)) {
        Ok(enrollment) => {
            let view = EnrollmentView::new(&enrollment, service.labels());
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn renew_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response
where
    S: MatchStore + 'static,
    D: IdentityDirectory + 'static,
    N: Notifier + 'static,
{
    match service.renew_enrollment(&actor, EnrollmentId(id)) {
        Ok(enrollment) => {
            let view = EnrollmentView::new(&enrollment, service.labels());
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn withdraw_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response
where
    S: MatchStore + 'static,
    D: IdentityDirectory + 'static,
    N: Notifier + 'static,
{
    match service.withdraw_enrollment(&actor, EnrollmentId(id)) {
        Ok(enrollment) => {
            let view = EnrollmentView::new(&enrollment, service.labels());
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn draw_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    actor: Actor,
) -> Response
where
    S: MatchStore + 'static,
    D: IdentityDirectory + 'static,
    N: Notifier + 'static,
{
    match service.draw(&actor) {
        Ok(outcome) => {
            let view = DrawView::new(&outcome, service.labels());
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn engagements_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    actor: Actor,
) -> Response
where
    S: MatchStore + 'static,
    D: IdentityDirectory + 'static,
    N: Notifier + 'static,
{
    match service.engagements(&actor) {
        Ok(summaries) => {
            let views: Vec<EngagementSummaryView> = summaries
                .iter()
                .map(|summary| EngagementSummaryView::new(summary, service.labels()))
                .collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn engagement_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response
where
    S: MatchStore + 'static,
    D: IdentityDirectory + 'static,
    N: Notifier + 'static,
{
    match service.engagement(&actor, EngagementId(id)) {
        Ok(detail) => {
            let view = EngagementDetailView::new(&detail, service.labels());
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn cancel_engagement_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    actor: Actor,
    Path(id): Path<u64>,
    Json(request): Json<CancellationRequest>,
) -> Response
where
    S: MatchStore + 'static,
    D: IdentityDirectory + 'static,
    N: Notifier + 'static,
{
    match service.cancel_engagement(&actor, EngagementId(id), &request.justification) {
        Ok(outcome) => {
            let view = CancellationView::new(&outcome, service.labels());
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn complete_engagement_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response
where
    S: MatchStore + 'static,
    D: IdentityDirectory + 'static,
    N: Notifier + 'static,
{
    match service.complete_engagement(&actor, EngagementId(id)) {
        Ok(engagement) => {
            let view = EngagementSummaryView::bare(&engagement, service.labels());
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn confirm_engagement_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response
where
    S: MatchStore + 'static,
    D: IdentityDirectory + 'static,
    N: Notifier + 'static,
{
    match service.confirm_engagement(&actor, EngagementId(id)) {
        Ok(engagement) => {
            let view = EngagementSummaryView::bare(&engagement, service.labels());
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => failure(error),
    }
}

pub(crate) async fn sweep_handler<S, D, N>(
    State(service): State<SharedService<S, D, N>>,
    actor: Actor,
) -> Response
where
    S: MatchStore + 'static,
    D: IdentityDirectory + 'static,
    N: Notifier + 'static,
{
    match service.sweep_unconfirmed(&actor) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => failure(error),
    }
}
