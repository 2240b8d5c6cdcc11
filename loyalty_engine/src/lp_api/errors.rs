use std::time::Duration;

use loyalty_common::Points;
use thiserror::Error;

use crate::{
    db::traits::{LedgerManagementError, OrderManagementError, UserManagementError},
    lp_api::accrual_fanout::UnresolvedOrder,
};

#[derive(Debug, Clone, Error)]
pub enum FanoutError {
    #[error("The accrual service did not answer within {}s", .0.as_secs_f64())]
    DeadlineExceeded(Duration),
}

#[derive(Debug, Clone, Error)]
pub enum OrderRegistryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<OrderManagementError> for OrderRegistryError {
    fn from(e: OrderManagementError) -> Self {
        OrderRegistryError::DatabaseError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum BalanceApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("{0}")]
    AccrualUnavailable(#[from] FanoutError),
    #[error("{0}")]
    UnresolvedOrder(#[from] UnresolvedOrder),
    #[error("Withdrawal amount must be positive, got {0}")]
    InvalidAmount(Points),
    #[error("A withdrawal must name an order")]
    MissingOrderTag,
    #[error("The {0} is too large to represent")]
    Overflow(&'static str),
}

impl From<OrderManagementError> for BalanceApiError {
    fn from(e: OrderManagementError) -> Self {
        BalanceApiError::DatabaseError(e.to_string())
    }
}

impl From<LedgerManagementError> for BalanceApiError {
    fn from(e: LedgerManagementError) -> Self {
        match e {
            LedgerManagementError::NonPositiveAmount(amount) => BalanceApiError::InvalidAmount(amount),
            e => BalanceApiError::DatabaseError(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthApiError {
    #[error("Login and password must not be empty")]
    EmptyCredentials,
    #[error("Login {0} is already taken")]
    LoginTaken(String),
    #[error("Invalid login or password")]
    InvalidCredentials,
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Password hashing failed: {0}")]
    HashingError(String),
}

impl From<UserManagementError> for AuthApiError {
    fn from(e: UserManagementError) -> Self {
        AuthApiError::DatabaseError(e.to_string())
    }
}

impl From<bcrypt::BcryptError> for AuthApiError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AuthApiError::HashingError(e.to_string())
    }
}
