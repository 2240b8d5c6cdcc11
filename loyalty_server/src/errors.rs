use std::time::Duration;

use actix_web::{
    error::ResponseError,
    http::{
        header::{ContentType, RETRY_AFTER},
        StatusCode,
    },
    HttpResponse,
};
use log::error;
use loyalty_common::Points;
use loyalty_engine::{AuthApiError, BalanceApiError, FanoutError, OrderRegistryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    InvalidOrderNumber(String),
    #[error("Order {0} was already uploaded by another user")]
    OrderOwnedByAnotherUser(String),
    #[error("Login {0} is already taken")]
    LoginTaken(String),
    #[error("Insufficient funds. Requested {requested}, but only {available} is available")]
    InsufficientFunds { available: Points, requested: Points },
    #[error("The accrual service is unavailable. {0}")]
    AccrualUnavailable(String, Duration),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidOrderNumber(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::OrderOwnedByAnotherUser(_) => StatusCode::CONFLICT,
            Self::LoginTaken(_) => StatusCode::CONFLICT,
            Self::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::AccrualUnavailable(..) => StatusCode::SERVICE_UNAVAILABLE,
            Self::AuthenticationError(e) => match e {
                AuthError::CouldNotIssueToken(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::UNAUTHORIZED,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        response.insert_header(ContentType::json());
        if let Self::AccrualUnavailable(_, retry_after) = self {
            response.insert_header((RETRY_AFTER, retry_after.as_secs().max(1).to_string()));
        }
        response.body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Access token has expired.")]
    TokenExpired,
    #[error("Invalid login or password.")]
    InvalidCredentials,
    #[error("Could not issue an access token. {0}")]
    CouldNotIssueToken(String),
}

impl From<AuthApiError> for ServerError {
    fn from(e: AuthApiError) -> Self {
        match e {
            AuthApiError::EmptyCredentials => Self::InvalidRequestBody(e.to_string()),
            AuthApiError::LoginTaken(login) => Self::LoginTaken(login),
            AuthApiError::InvalidCredentials => Self::AuthenticationError(AuthError::InvalidCredentials),
            AuthApiError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            AuthApiError::HashingError(e) => {
                error!("🔑️ Password hashing failed. {e}");
                Self::BackendError(format!("Could not process credentials. {e}"))
            },
        }
    }
}

impl From<OrderRegistryError> for ServerError {
    fn from(e: OrderRegistryError) -> Self {
        match e {
            OrderRegistryError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
        }
    }
}

impl From<FanoutError> for ServerError {
    fn from(e: FanoutError) -> Self {
        match e {
            FanoutError::DeadlineExceeded(deadline) => Self::AccrualUnavailable(e.to_string(), deadline),
        }
    }
}

impl From<BalanceApiError> for ServerError {
    fn from(e: BalanceApiError) -> Self {
        match e {
            BalanceApiError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
            BalanceApiError::AccrualUnavailable(e) => e.into(),
            BalanceApiError::UnresolvedOrder(e) => Self::BackendError(e.to_string()),
            BalanceApiError::Overflow(_) => Self::BackendError(e.to_string()),
            BalanceApiError::InvalidAmount(_) | BalanceApiError::MissingOrderTag => {
                Self::ValidationError(e.to_string())
            },
        }
    }
}
