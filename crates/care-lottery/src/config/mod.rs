use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use chrono::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub matching: MatchingPolicy,
    pub notifications: NotificationConfig,
    pub directory: DirectoryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = MatchingPolicy::default();
        let matching = MatchingPolicy {
            enrollment_ttl_days: days_var(
                "MATCH_ENROLLMENT_TTL_DAYS",
                defaults.enrollment_ttl_days,
            )?,
            engagement_ceiling_days: days_var(
                "MATCH_ENGAGEMENT_CEILING_DAYS",
                defaults.engagement_ceiling_days,
            )?,
            confirmation_grace_days: days_var(
                "MATCH_CONFIRMATION_GRACE_DAYS",
                defaults.confirmation_grace_days,
            )?,
            min_justification_chars: match env::var("MATCH_MIN_JUSTIFICATION_CHARS") {
                Ok(raw) => raw.trim().parse::<usize>().map_err(|_| ConfigError::InvalidNumber {
                    key: "MATCH_MIN_JUSTIFICATION_CHARS",
                })?,
                Err(_) => defaults.min_justification_chars,
            },
            exclude_repeat_patients: flag_var(
                "MATCH_EXCLUDE_REPEAT_PATIENTS",
                defaults.exclude_repeat_patients,
            )?,
        };

        let notifications = NotificationConfig {
            public_base_url: env::var("APP_PUBLIC_URL")
                .unwrap_or_else(|_| format!("http://{host}:{port}")),
            sender: env::var("APP_MAIL_SENDER")
                .unwrap_or_else(|_| "no-reply@atendimento-solidario.org".to_string()),
            signature: env::var("APP_MAIL_SIGNATURE")
                .unwrap_or_else(|_| "Atendimento Solidário team".to_string()),
        };

        let directory = DirectoryConfig {
            seed_path: env::var("APP_DIRECTORY_SEED").ok().map(PathBuf::from),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            matching,
            notifications,
            directory,
        })
    }
}

fn days_var(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<i64>() {
            Ok(days) if days > 0 => Ok(days),
            _ => Err(ConfigError::InvalidNumber { key }),
        },
        Err(_) => Ok(default),
    }
}

fn flag_var(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key }),
        },
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Business windows and gates of the lottery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingPolicy {
    /// Lifetime of a pool entry from enrollment or renewal.
    pub enrollment_ttl_days: i64,
    /// Planned end of a freshly drawn engagement.
    pub engagement_ceiling_days: i64,
    /// Age after which an unconfirmed completion is closed by the sweep.
    pub confirmation_grace_days: i64,
    pub min_justification_chars: usize,
    /// Skip patients this professional has drawn before.
    pub exclude_repeat_patients: bool,
}

impl MatchingPolicy {
    pub fn enrollment_ttl(&self) -> Duration {
        Duration::days(self.enrollment_ttl_days)
    }

    pub fn engagement_ceiling(&self) -> Duration {
        Duration::days(self.engagement_ceiling_days)
    }

    pub fn confirmation_grace(&self) -> Duration {
        Duration::days(self.confirmation_grace_days)
    }
}

impl Default for MatchingPolicy {
    fn default() -> Self {
        Self {
            enrollment_ttl_days: 30,
            engagement_ceiling_days: 30,
            confirmation_grace_days: 30,
            min_justification_chars: 20,
            exclude_repeat_patients: false,
        }
    }
}

/// Where confirmation links point and who signs outbound mail.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub public_base_url: String,
    pub sender: String,
    pub signature: String,
}

/// Source of patient and professional records.
#[derive(Debug, Clone, Default)]
pub struct DirectoryConfig {
    pub seed_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    InvalidFlag { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a positive integer")
            }
            ConfigError::InvalidFlag { key } => {
                write!(f, "{key} must be one of true/false/1/0/yes/no/on/off")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidFlag { .. } => None,
        }
    }
}
