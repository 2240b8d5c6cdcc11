use thiserror::Error;

use crate::db_types::UserAccount;

#[derive(Debug, Clone, Error)]
pub enum UserManagementError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for UserManagementError {
    fn from(e: sqlx::Error) -> Self {
        UserManagementError::DatabaseError(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait UserManagement {
    /// Creates a new user. Returns `None` if the login is already taken.
    async fn insert_user(&self, login: &str, password_hash: &str) -> Result<Option<UserAccount>, UserManagementError>;

    async fn fetch_user_by_login(&self, login: &str) -> Result<Option<UserAccount>, UserManagementError>;

    async fn fetch_user(&self, user_id: i64) -> Result<Option<UserAccount>, UserManagementError>;
}
