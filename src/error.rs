//! Typed errors and HTTP classification.
//!
//! Handlers return [`AppError`]: either a classified [`HttpError`] carrying
//! status, message, cause and the operational flag, or an unclassified
//! internal failure that the error responder renders as a 500.

use axum::http::StatusCode;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A classified HTTP failure. Immutable once built; consumed by the responder.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
    cause: Option<BoxError>,
    operational: bool,
}

impl HttpError {
    /// New error with the canonical reason phrase as message.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            message: status.canonical_reason().unwrap_or("Unknown Error").to_string(),
            cause: None,
            operational: false,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        if !message.is_empty() {
            self.message = message;
        }
        self
    }

    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Marks the failure as an expected outcome: rendered, never logged.
    pub fn operational(mut self) -> Self {
        self.operational = true;
        self
    }

    /// Validation failure: 400, operational.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST).with_message(message).operational()
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND).with_message(message).operational()
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED).operational()
    }

    pub fn unsupported_media_type() -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE).operational()
    }

    pub fn internal(cause: impl Into<BoxError>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR).with_cause(cause)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Error returned by request handlers.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("{0}")]
    Internal(BoxError),
}

impl AppError {
    pub fn internal(err: impl Into<BoxError>) -> Self {
        AppError::Internal(err.into())
    }

    /// Resolves the error to its classified form; unclassified errors become a 500.
    pub fn into_http(self) -> HttpError {
        match self {
            AppError::Http(e) => e,
            AppError::Internal(cause) => HttpError::internal(cause),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::internal(e)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::internal(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::internal(e)
    }
}

impl From<axum::Error> for AppError {
    fn from(e: axum::Error) -> Self {
        AppError::internal(e)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },
    #[error("duplicate route: {method} {pattern}")]
    DuplicateRoute { method: String, pattern: String },
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("store unreachable after {attempts} attempts in {elapsed:?}: {last}")]
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        last: BoxError,
    },
    #[error("connection attempts cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("server io: {0}")]
    Io(#[from] std::io::Error),
    #[error("shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),
}
