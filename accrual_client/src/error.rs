use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AccrualApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The accrual service is rate limiting requests. Retry after {}s", retry_after.as_secs_f64())]
    RateLimited { retry_after: Duration },
    #[error("The accrual service failed. Error {status}. {message}")]
    ServerError { status: u16, message: String },
    #[error("Could not reach the accrual service: {0}")]
    Transport(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Unexpected response from the accrual service. Error {status}. {message}")]
    UnexpectedStatus { status: u16, message: String },
}

impl AccrualApiError {
    /// The wait requested by the service, if this error is a rate-limit signal.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Transient failures leave the order's state unknown, and the same request may succeed later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServerError { .. } | Self::Transport(_) | Self::JsonError(_))
    }
}
