use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::store::StoreError;
use crate::ErrorResponse;

/// Every failure a core operation can surface to the presentation layer.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    NotEligible(String),

    #[error("{0}")]
    Authorization(String),

    #[error("position {0} is complete and locked; no further modifications are allowed")]
    Locked(uuid::Uuid),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthenticated(String),

    /// The record changed between read and write. Retrying re-reads the latest state.
    #[error("{0}")]
    Conflict(String),

    /// The document store could not be reached. Safe to retry.
    #[error("document store unavailable: {0}")]
    CollaboratorUnavailable(String),
}

impl CoreError {
    /// Stable name used in the `error` field of the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "ValidationError",
            CoreError::InvalidTransition(_) => "InvalidTransitionError",
            CoreError::NotEligible(_) => "NotEligibleError",
            CoreError::Authorization(_) => "AuthorizationError",
            CoreError::Locked(_) => "LockedError",
            CoreError::NotFound(_) => "NotFound",
            CoreError::Unauthenticated(_) => "Unauthorized",
            CoreError::Conflict(_) => "ConflictError",
            CoreError::CollaboratorUnavailable(_) => "CollaboratorUnavailableError",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::Conflict(_) | CoreError::CollaboratorUnavailable(_)
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        CoreError::InvalidTransition(message.into())
    }

    pub fn not_eligible(message: impl Into<String>) -> Self {
        CoreError::NotEligible(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        CoreError::Authorization(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        CoreError::NotFound(message.into())
    }
}

impl From<StoreError> for CoreError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => CoreError::Conflict(msg),
            other => CoreError::CollaboratorUnavailable(other.to_string()),
        }
    }
}

impl ResponseError for CoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::InvalidTransition(_) | CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::NotEligible(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::Authorization(_) => StatusCode::FORBIDDEN,
            CoreError::Locked(_) => StatusCode::LOCKED,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            CoreError::CollaboratorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let CoreError::CollaboratorUnavailable(msg) = self {
            log::error!("document store failure: {}", msg);
        }
        HttpResponse::build(self.status_code())
            .json(ErrorResponse::new(self.kind(), &self.to_string()))
    }
}
