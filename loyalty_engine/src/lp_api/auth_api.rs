use std::fmt::Debug;

use log::*;
use tokio::sync::OnceCell;

use crate::{db::traits::UserManagement, db_types::UserAccount, lp_api::errors::AuthApiError};

/// `AuthApi` registers users and checks their passwords. Passwords are stored as bcrypt hashes, computed on the
/// blocking thread pool.
pub struct AuthApi<B> {
    db: B,
    cost: u32,
    /// Checked against when the login is unknown, so both failure paths pay for one bcrypt verification.
    dummy_hash: OnceCell<String>,
}

impl<B> Debug for AuthApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthApi (cost {})", self.cost)
    }
}

impl<B> AuthApi<B> {
    pub fn new(db: B) -> Self {
        Self { db, cost: bcrypt::DEFAULT_COST, dummy_hash: OnceCell::new() }
    }

    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self.dummy_hash = OnceCell::new();
        self
    }

    async fn dummy_hash(&self) -> Result<&str, AuthApiError> {
        let hash = self.dummy_hash.get_or_try_init(|| hash_password("not the password".into(), self.cost)).await?;
        Ok(hash.as_str())
    }
}

impl<B> AuthApi<B>
where B: UserManagement
{
    pub async fn register(&self, login: &str, password: &str) -> Result<UserAccount, AuthApiError> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(AuthApiError::EmptyCredentials);
        }
        if self.db.fetch_user_by_login(login).await?.is_some() {
            return Err(AuthApiError::LoginTaken(login.to_string()));
        }
        let hash = hash_password(password.to_string(), self.cost).await?;
        // A concurrent registration may still take the login between the check above and this insert.
        let user = self.db.insert_user(login, &hash).await?.ok_or_else(|| AuthApiError::LoginTaken(login.to_string()))?;
        info!("🔑️ New user #{} registered as {login}", user.id);
        Ok(user)
    }

    /// Unknown logins and wrong passwords produce the same error.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<UserAccount, AuthApiError> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(AuthApiError::EmptyCredentials);
        }
        let user = match self.db.fetch_user_by_login(login).await? {
            Some(user) => user,
            None => {
                debug!("🔑️ Login attempt for unknown user {login}");
                let dummy = self.dummy_hash().await?.to_string();
                verify_password(password.to_string(), dummy).await?;
                return Err(AuthApiError::InvalidCredentials);
            },
        };
        if verify_password(password.to_string(), user.password_hash.clone()).await? {
            debug!("🔑️ User #{} authenticated", user.id);
            Ok(user)
        } else {
            debug!("🔑️ Wrong password for user #{}", user.id);
            Err(AuthApiError::InvalidCredentials)
        }
    }
}

async fn hash_password(password: String, cost: u32) -> Result<String, AuthApiError> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AuthApiError::HashingError(e.to_string()))??;
    Ok(hash)
}

async fn verify_password(password: String, hash: String) -> Result<bool, AuthApiError> {
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthApiError::HashingError(e.to_string()))??;
    Ok(valid)
}
