use thiserror::Error;

use huddle_types::events::ErrorKind;
use huddle_types::store::StoreError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: String },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("external service unavailable: {0}")]
    ExternalServiceUnavailable(String),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(StoreError),

    #[error("coordinator stopped")]
    CoordinatorStopped,
}

impl GatewayError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// How the error is reported to the originating connection.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            _ => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { what, id } => Self::NotFound { what, id },
            other => Self::Store(other),
        }
    }
}
