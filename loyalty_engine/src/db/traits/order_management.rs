use thiserror::Error;

use crate::{
    db::traits::InsertOrderResult,
    db_types::{Order, OrderNumber},
};

#[derive(Debug, Clone, Error)]
pub enum OrderManagementError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} vanished after a conflicting insert")]
    OrderVanished(String),
}

impl From<sqlx::Error> for OrderManagementError {
    fn from(e: sqlx::Error) -> Self {
        OrderManagementError::DatabaseError(e.to_string())
    }
}

/// The `OrderManagement` trait defines the behaviour for recording and querying order ownership in the database
/// backend.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Atomically inserts the order for `user_id` if no order with this number exists yet. If a row already exists,
    /// it is left untouched and returned as [`InsertOrderResult::AlreadyExists`], whoever owns it.
    ///
    /// Two racing inserts of the same number both succeed at the query level; exactly one of them sees `Inserted`.
    async fn insert_order_if_absent(
        &self,
        number: &OrderNumber,
        user_id: i64,
    ) -> Result<InsertOrderResult, OrderManagementError>;

    async fn fetch_order(&self, number: &OrderNumber) -> Result<Option<Order>, OrderManagementError>;

    /// Fetches all orders owned by `user_id`, oldest first.
    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderManagementError>;
}
