use axum::http::StatusCode;

use super::directory::DirectoryError;
use super::domain::StateAction;
use super::repository::RepositoryError;

/// Failure of a matching or lifecycle operation, recovered at the request boundary.
#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("an active enrollment already exists for {specialty} in {municipality}/{state}")]
    DuplicateActiveEnrollment {
        specialty: String,
        state: String,
        municipality: String,
    },
    #[error("no professionals registered for '{specialty}' in {municipality}/{state}")]
    NoProviderAvailable {
        specialty: String,
        state: String,
        municipality: String,
    },
    #[error("no eligible patients for {specialty} in {municipality}/{state}")]
    NoEligibleCandidates {
        specialty: String,
        state: String,
        municipality: String,
    },
    #[error("cannot {action} while status is {status}")]
    InvalidStateTransition {
        action: StateAction,
        status: &'static str,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl MatchingError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            MatchingError::Validation(_)
            | MatchingError::NoProviderAvailable { .. }
            | MatchingError::InvalidStateTransition { .. } => StatusCode::BAD_REQUEST,
            MatchingError::NotFound(_) | MatchingError::NoEligibleCandidates { .. } => {
                StatusCode::NOT_FOUND
            }
            MatchingError::Forbidden(_) => StatusCode::FORBIDDEN,
            MatchingError::DuplicateActiveEnrollment { .. } => StatusCode::CONFLICT,
            MatchingError::Repository(_) | MatchingError::Directory(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to return to callers. Infrastructure details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            MatchingError::Repository(_) | MatchingError::Directory(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}
