use std::fmt::Debug;

use log::*;
use loyalty_common::Points;
use sqlx::SqlitePool;

use super::{new_pool, orders, users, withdrawals, SqliteDatabaseError};
use crate::{
    db::traits::{
        InsertOrderResult,
        LedgerManagement,
        LedgerManagementError,
        OrderManagement,
        OrderManagementError,
        UserManagement,
        UserManagementError,
    },
    db_types::{NewWithdrawal, Order, OrderNumber, UserAccount, Withdrawal},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date using the migrations embedded in the binary.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order_if_absent(
        &self,
        number: &OrderNumber,
        user_id: i64,
    ) -> Result<InsertOrderResult, OrderManagementError> {
        let mut tx = self.pool.begin().await?;
        let result = match orders::insert_if_absent(number, user_id, &mut tx).await? {
            Some(order) => {
                debug!("🗃️ Order {number} recorded for user #{user_id}");
                InsertOrderResult::Inserted(order)
            },
            None => {
                let existing = orders::fetch_order(number, &mut tx)
                    .await?
                    .ok_or_else(|| OrderManagementError::OrderVanished(number.to_string()))?;
                trace!("🗃️ Order {number} already exists. It belongs to user #{}", existing.user_id);
                InsertOrderResult::AlreadyExists(existing)
            },
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_order(&self, number: &OrderNumber) -> Result<Option<Order>, OrderManagementError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(number, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderManagementError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_user(user_id, &mut conn).await?;
        Ok(orders)
    }
}

impl LedgerManagement for SqliteDatabase {
    async fn insert_withdrawal(&self, withdrawal: NewWithdrawal) -> Result<Withdrawal, LedgerManagementError> {
        if !withdrawal.amount.is_positive() {
            return Err(LedgerManagementError::NonPositiveAmount(withdrawal.amount));
        }
        let mut conn = self.pool.acquire().await?;
        let result = withdrawals::insert_withdrawal(withdrawal, &mut conn).await?;
        debug!("🗃️ Withdrawal #{} of {} recorded for user #{}", result.id, result.amount, result.user_id);
        Ok(result)
    }

    async fn fetch_withdrawals_for_user(&self, user_id: i64) -> Result<Vec<Withdrawal>, LedgerManagementError> {
        let mut conn = self.pool.acquire().await?;
        let result = withdrawals::fetch_withdrawals_for_user(user_id, &mut conn).await?;
        Ok(result)
    }

    async fn total_withdrawn(&self, user_id: i64) -> Result<Points, LedgerManagementError> {
        let mut conn = self.pool.acquire().await?;
        let total = withdrawals::total_withdrawn(user_id, &mut conn).await?;
        Ok(total)
    }
}

impl UserManagement for SqliteDatabase {
    async fn insert_user(&self, login: &str, password_hash: &str) -> Result<Option<UserAccount>, UserManagementError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::insert_user(login, password_hash, &mut conn).await?;
        match &user {
            Some(u) => debug!("🗃️ Created user account #{} for {login}", u.id),
            None => debug!("🗃️ Login {login} is already taken"),
        }
        Ok(user)
    }

    async fn fetch_user_by_login(&self, login: &str) -> Result<Option<UserAccount>, UserManagementError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user_by_login(login, &mut conn).await?;
        Ok(user)
    }

    async fn fetch_user(&self, user_id: i64) -> Result<Option<UserAccount>, UserManagementError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user(user_id, &mut conn).await?;
        Ok(user)
    }
}
