use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::MatchingPolicy;
use crate::matching::clock::ManualClock;
use crate::matching::directory::{InMemoryDirectory, ProfessionalProfile};
use crate::matching::domain::{Actor, EnrollmentRequest, UserId};
use crate::matching::draw::CandidatePicker;
use crate::matching::identity::{USER_ID_HEADER, USER_ROLE_HEADER};
use crate::matching::notify::{Notification, NotificationTemplates, Notifier, NotifyError};
use crate::matching::repository::{InMemoryMatchStore, Ledger, MatchStore, RepositoryError};
use crate::matching::service::MatchingService;

pub(super) const ANA: Actor = Actor::patient(3);
pub(super) const CARLOS: Actor = Actor::patient(4);
pub(super) const BEATRIZ: Actor = Actor::patient(5);
pub(super) const DR_JOAO: Actor = Actor::professional(1);
pub(super) const DRA_MARIA: Actor = Actor::professional(2);
pub(super) const ADMIN: Actor = Actor::admin(99);

pub(super) const JUSTIFICATION: &str = "patient moved to another city";

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

pub(super) fn policy() -> MatchingPolicy {
    MatchingPolicy::default()
}

pub(super) fn templates() -> NotificationTemplates {
    NotificationTemplates::new("https://care.example.org", 30)
}

pub(super) fn cardiology_request() -> EnrollmentRequest {
    EnrollmentRequest {
        state: "SP".to_string(),
        municipality: "São Paulo".to_string(),
        specialty: "Cardiology".to_string(),
        description: "shortness of breath when climbing stairs".to_string(),
    }
}

pub(super) fn dr_joao() -> ProfessionalProfile {
    ProfessionalProfile {
        id: UserId(1),
        name: "Dr. João Silva".to_string(),
        email: "dr.joao@example.com".to_string(),
        phone: None,
        specialty: "Cardiology".to_string(),
        state: "SP".to_string(),
        municipality: "São Paulo".to_string(),
        practice_location: None,
    }
}

#[derive(Default, Clone)]
pub(super) struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification.clone());
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp connection refused".to_string()))
    }
}

pub(super) struct UnavailableStore;

impl MatchStore for UnavailableStore {
    fn transact<T, E, F>(&self, _op: F) -> Result<T, E>
    where
        F: FnOnce(&mut Ledger) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        Err(E::from(RepositoryError::Unavailable(
            "database offline".to_string(),
        )))
    }

    fn read<T, F>(&self, _op: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&Ledger) -> T,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Always picks the same position, clamped by the draw engine.
pub(super) struct FixedPicker(pub(super) usize);

impl CandidatePicker for FixedPicker {
    fn pick(&self, _candidates: usize) -> usize {
        self.0
    }
}

pub(super) type TestService =
    MatchingService<InMemoryMatchStore, InMemoryDirectory, RecordingNotifier>;

pub(super) struct Harness {
    pub(super) service: TestService,
    pub(super) store: Arc<InMemoryMatchStore>,
    pub(super) notifier: Arc<RecordingNotifier>,
    pub(super) clock: Arc<ManualClock>,
}

pub(super) fn harness() -> Harness {
    harness_with_policy(policy())
}

pub(super) fn harness_with_policy(policy: MatchingPolicy) -> Harness {
    let store = Arc::new(InMemoryMatchStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = Arc::new(ManualClock::new(start()));
    let service = MatchingService::new(
        store.clone(),
        Arc::new(InMemoryDirectory::sample()),
        notifier.clone(),
        policy,
        templates(),
    )
    .with_picker(Arc::new(FixedPicker(0)))
    .with_clock(clock.clone());
    Harness {
        service,
        store,
        notifier,
        clock,
    }
}

pub(super) fn request(
    method: Method,
    uri: &str,
    actor: Option<Actor>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder
            .header(USER_ID_HEADER, actor.id.0.to_string())
            .header(USER_ROLE_HEADER, actor.role.label());
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
