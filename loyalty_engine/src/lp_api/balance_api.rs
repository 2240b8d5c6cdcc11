use std::{fmt::Debug, sync::Arc};

use accrual_client::AccrualLookup;
use dashmap::DashMap;
use log::*;
use loyalty_common::Points;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    db::traits::{LedgerManagement, OrderManagement},
    db_types::{NewWithdrawal, Withdrawal},
    lp_api::{
        accrual_fanout::AccrualFanout,
        balance_objects::{Balance, OrderStatusEntry, WithdrawalResult},
        errors::BalanceApiError,
    },
};

//--------------------------------------      OwnerLocks       ---------------------------------------------------------
/// One async mutex per user. Clones share the same registry, so a single `OwnerLocks` created at startup serializes
/// withdrawals across every worker.
///
/// The registry only holds entries for users whose lock is taken or awaited. The last guard out removes the entry.
#[derive(Debug, Clone, Default)]
pub struct OwnerLocks(Arc<DashMap<i64, Arc<Mutex<()>>>>);

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for, and takes, the lock for `owner`. The lock is released when the guard is dropped.
    pub async fn lock(&self, owner: i64) -> OwnerGuard {
        let mutex = Arc::clone(self.0.entry(owner).or_default().value());
        let guard = mutex.lock_owned().await;
        OwnerGuard { owner, guard: Some(guard), locks: self.clone() }
    }

    /// The number of users whose lock is currently held or awaited.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct OwnerGuard {
    owner: i64,
    guard: Option<OwnedMutexGuard<()>>,
    locks: OwnerLocks,
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The registry's own reference is the only one left when nobody else holds or waits for this lock
        self.locks.0.remove_if(&self.owner, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

//--------------------------------------      BalanceApi       ---------------------------------------------------------
/// `BalanceApi` derives balances from processed accruals and the withdrawal ledger, and authorizes withdrawals against
/// them.
///
/// Balances are never cached. Every call lists the user's orders, resolves them through the [`AccrualFanout`] and sums
/// the ledger. If any order cannot be resolved, the whole computation fails rather than counting that order as zero.
pub struct BalanceApi<B, L> {
    db: B,
    fanout: AccrualFanout<L>,
    locks: OwnerLocks,
}

impl<B, L> Debug for BalanceApi<B, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BalanceApi")
    }
}

impl<B, L> BalanceApi<B, L> {
    pub fn new(db: B, fanout: AccrualFanout<L>) -> Self {
        Self::with_locks(db, fanout, OwnerLocks::new())
    }

    pub fn with_locks(db: B, fanout: AccrualFanout<L>, locks: OwnerLocks) -> Self {
        Self { db, fanout, locks }
    }
}

impl<B, L> BalanceApi<B, L>
where
    B: OrderManagement + LedgerManagement,
    L: AccrualLookup,
{
    pub async fn compute_balance(&self, owner: i64) -> Result<Balance, BalanceApiError> {
        let orders = self.db.fetch_orders_for_user(owner).await?;
        let numbers = orders.iter().map(|o| &o.number).collect::<Vec<_>>();
        let snapshot = self.fanout.resolve(&numbers).await?;
        let awarded = snapshot.total_awarded()?;
        let withdrawn = self.db.total_withdrawn(owner).await?;
        let balance = Balance::new(awarded, withdrawn)?;
        trace!("💰️ User #{owner} has {} orders. Balance: {} (withdrawn {})", orders.len(), balance.current, withdrawn);
        Ok(balance)
    }

    /// Withdraws `amount` from the user's balance, recording it against `order_tag`.
    ///
    /// The balance check and the ledger append run under the user's lock, so concurrent withdrawals by the same user
    /// cannot jointly overdraw.
    pub async fn withdraw(
        &self,
        owner: i64,
        order_tag: &str,
        amount: Points,
    ) -> Result<WithdrawalResult, BalanceApiError> {
        if !amount.is_positive() {
            return Err(BalanceApiError::InvalidAmount(amount));
        }
        let order_tag = order_tag.trim();
        if order_tag.is_empty() {
            return Err(BalanceApiError::MissingOrderTag);
        }
        let _guard = self.locks.lock(owner).await;
        let balance = self.compute_balance(owner).await?;
        if amount > balance.current {
            info!("💰️ User #{owner} tried to withdraw {amount} but only has {}", balance.current);
            return Ok(WithdrawalResult::InsufficientFunds { available: balance.current, requested: amount });
        }
        let withdrawal = self.db.insert_withdrawal(NewWithdrawal::new(owner, order_tag, amount)).await?;
        info!("💰️ User #{owner} withdrew {amount} for order {order_tag}");
        Ok(WithdrawalResult::Authorized(withdrawal))
    }

    /// The user's withdrawals, oldest first.
    pub async fn withdrawals(&self, owner: i64) -> Result<Vec<Withdrawal>, BalanceApiError> {
        let withdrawals = self.db.fetch_withdrawals_for_user(owner).await?;
        Ok(withdrawals)
    }

    /// The user's orders, oldest first, each with its current accrual state.
    pub async fn order_statuses(&self, owner: i64) -> Result<Vec<OrderStatusEntry>, BalanceApiError> {
        let orders = self.db.fetch_orders_for_user(owner).await?;
        let numbers = orders.iter().map(|o| &o.number).collect::<Vec<_>>();
        let snapshot = self.fanout.resolve(&numbers).await?;
        let entries = orders
            .into_iter()
            .map(|order| -> Result<OrderStatusEntry, BalanceApiError> {
                let outcome = snapshot.outcome(order.number.as_str())?.clone();
                Ok(OrderStatusEntry { order, outcome })
            })
            .collect::<Result<Vec<_>, BalanceApiError>>()?;
        Ok(entries)
    }
}
