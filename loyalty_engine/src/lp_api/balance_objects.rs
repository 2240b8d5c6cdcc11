use accrual_client::AccrualOutcome;
use loyalty_common::Points;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, Withdrawal},
    lp_api::errors::BalanceApiError,
};

/// A user's spendable balance. `current` is everything awarded by processed orders, less `withdrawn`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub current: Points,
    pub withdrawn: Points,
}

impl Balance {
    pub fn new(awarded: Points, withdrawn: Points) -> Result<Self, BalanceApiError> {
        let current = awarded.checked_sub(withdrawn).ok_or(BalanceApiError::Overflow("current balance"))?;
        Ok(Self { current, withdrawn })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawalResult {
    Authorized(Withdrawal),
    /// Nothing was written.
    InsufficientFunds { available: Points, requested: Points },
}

/// An order together with its freshly resolved accrual state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderStatusEntry {
    pub order: Order,
    pub outcome: AccrualOutcome,
}
