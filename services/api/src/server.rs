use crate::cli::ServeArgs;
use crate::infra::{load_directory, AppState, TracingNotifier};
use crate::routes::with_matching_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use care_lottery::config::AppConfig;
use care_lottery::error::AppError;
use care_lottery::matching::{InMemoryMatchStore, MatchingService, NotificationTemplates};
use care_lottery::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let directory = Arc::new(load_directory(&config.directory)?);
    let store = Arc::new(InMemoryMatchStore::default());
    let notifier = Arc::new(TracingNotifier::new(config.notifications.sender.clone()));
    let templates = NotificationTemplates::new(
        config.notifications.public_base_url.clone(),
        config.matching.confirmation_grace_days,
    )
    .with_signature(config.notifications.signature.clone());
    let matching_service = Arc::new(MatchingService::new(
        store,
        directory,
        notifier,
        config.matching.clone(),
        templates,
    ));

    let app = with_matching_routes(matching_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        exclude_repeat_patients = config.matching.exclude_repeat_patients,
        "care lottery ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
