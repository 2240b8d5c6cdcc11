use std::{fmt::Debug, str::FromStr};

use log::*;

use crate::{
    db::traits::{InsertOrderResult, OrderManagement},
    db_types::{Order, OrderNumber},
    lp_api::errors::OrderRegistryError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationResult {
    /// The order is new and now belongs to the caller.
    Accepted(Order),
    /// The caller registered this order before. Nothing changed.
    AlreadyOwnedBySelf(Order),
    /// Another user owns the order.
    ConflictOtherOwner,
    /// The number failed the checksum. Carries the rejected input.
    Invalid(String),
}

/// `OrderRegistryApi` records order ownership. An order number is registered at most once, and never changes hands.
pub struct OrderRegistryApi<B> {
    db: B,
}

impl<B> Debug for OrderRegistryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderRegistryApi")
    }
}

impl<B> OrderRegistryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> OrderRegistryApi<B>
where B: OrderManagement
{
    /// Registers `number` to `owner`.
    ///
    /// Numbers that fail the Luhn check are rejected before storage is touched. Otherwise the order is inserted if
    /// absent, and the existing owner (if any) decides the result. A lost insert race resolves the same way as a
    /// sequential duplicate.
    pub async fn register(&self, number: &str, owner: i64) -> Result<RegistrationResult, OrderRegistryError> {
        let number = match OrderNumber::from_str(number) {
            Ok(n) => n,
            Err(e) => {
                debug!("📦️ Rejected order registration by user #{owner}. {e}");
                return Ok(RegistrationResult::Invalid(e.0));
            },
        };
        let result = match self.db.insert_order_if_absent(&number, owner).await? {
            InsertOrderResult::Inserted(order) => {
                info!("📦️ Order {number} registered to user #{owner}");
                RegistrationResult::Accepted(order)
            },
            InsertOrderResult::AlreadyExists(order) if order.user_id == owner => {
                debug!("📦️ User #{owner} already registered order {number}");
                RegistrationResult::AlreadyOwnedBySelf(order)
            },
            InsertOrderResult::AlreadyExists(order) => {
                info!("📦️ User #{owner} tried to register order {number}, which belongs to user #{}", order.user_id);
                RegistrationResult::ConflictOtherOwner
            },
        };
        Ok(result)
    }

    /// The owner's orders, oldest first.
    pub async fn orders_for_user(&self, owner: i64) -> Result<Vec<Order>, OrderRegistryError> {
        let orders = self.db.fetch_orders_for_user(owner).await?;
        Ok(orders)
    }

    pub async fn fetch_order(&self, number: &OrderNumber) -> Result<Option<Order>, OrderRegistryError> {
        let order = self.db.fetch_order(number).await?;
        Ok(order)
    }
}
