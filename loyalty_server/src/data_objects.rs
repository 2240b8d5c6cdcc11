use std::fmt::{Debug, Display};

use accrual_client::AccrualStatus;
use chrono::{DateTime, Utc};
use loyalty_common::Points;
use loyalty_engine::{db_types::Withdrawal, OrderStatusEntry};
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credentials {{ login: {}, password: **** }}", self.login)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: Points,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub number: String,
    pub status: AccrualStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Points>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<OrderStatusEntry> for OrderResponse {
    fn from(entry: OrderStatusEntry) -> Self {
        let OrderStatusEntry { order, outcome } = entry;
        let outcome = outcome.normalized();
        Self {
            number: order.number.to_string(),
            status: outcome.status,
            accrual: outcome.accrual,
            uploaded_at: order.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalResponse {
    pub order: String,
    pub sum: Points,
    pub processed_at: DateTime<Utc>,
}

impl From<Withdrawal> for WithdrawalResponse {
    fn from(w: Withdrawal) -> Self {
        Self { order: w.order_tag, sum: w.amount, processed_at: w.created_at }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}
