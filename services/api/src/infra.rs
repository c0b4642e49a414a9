use care_lottery::config::DirectoryConfig;
use care_lottery::error::AppError;
use care_lottery::matching::{InMemoryDirectory, Notification, Notifier, NotifyError};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Writes outgoing patient e-mail to the log instead of a mail relay.
#[derive(Debug, Clone)]
pub(crate) struct TracingNotifier {
    sender: String,
}

impl TracingNotifier {
    pub(crate) fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }
}

impl Notifier for TracingNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.sender.trim().is_empty() {
            return Err(NotifyError::NotConfigured);
        }
        info!(
            from = %self.sender,
            to = %notification.destination,
            subject = %notification.subject,
            body = %notification.body,
            "outgoing e-mail"
        );
        Ok(())
    }
}

/// Seed file from `APP_DIRECTORY_SEED`, or the built-in sample directory.
pub(crate) fn load_directory(config: &DirectoryConfig) -> Result<InMemoryDirectory, AppError> {
    match &config.seed_path {
        Some(path) => {
            let file = File::open(path)?;
            let directory = InMemoryDirectory::from_reader(BufReader::new(file))?;
            info!(path = %path.display(), "identity directory loaded from seed file");
            Ok(directory)
        }
        None => {
            info!("identity directory seeded with sample profiles");
            Ok(InMemoryDirectory::sample())
        }
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
