use loyalty_common::Points;
use thiserror::Error;

use crate::db_types::{NewWithdrawal, Withdrawal};

#[derive(Debug, Clone, Error)]
pub enum LedgerManagementError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Withdrawal amounts must be positive, got {0}")]
    NonPositiveAmount(Points),
}

impl From<sqlx::Error> for LedgerManagementError {
    fn from(e: sqlx::Error) -> Self {
        LedgerManagementError::DatabaseError(e.to_string())
    }
}

/// The `LedgerManagement` trait defines the append-only withdrawal ledger. Entries are never updated or deleted.
#[allow(async_fn_in_trait)]
pub trait LedgerManagement {
    /// Appends a withdrawal to the ledger. Balance checks are the caller's responsibility; the backend only rejects
    /// non-positive amounts.
    async fn insert_withdrawal(&self, withdrawal: NewWithdrawal) -> Result<Withdrawal, LedgerManagementError>;

    /// Fetches every withdrawal made by `user_id`, oldest first.
    async fn fetch_withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, LedgerManagementError>;

    /// The sum of all withdrawals made by `user_id`. Zero if there are none.
    async fn total_withdrawn(&self, user_id: i64) -> Result<Points, LedgerManagementError>;
}
