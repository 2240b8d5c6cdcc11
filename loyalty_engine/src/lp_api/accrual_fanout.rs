//! Concurrent resolution of order accrual states.
//!
//! [`AccrualFanout::resolve`] issues one lookup per distinct order number and joins them. The accrual service is
//! rate limited; when it answers `429`, the [`CooldownGate`] is closed for the requested period and *every* lookup in
//! the process, including those of other concurrent `resolve` calls, waits for it to reopen before being issued.
//! Rate-limited lookups are then re-issued without consuming a retry attempt. Transient failures are retried per order
//! with exponential backoff. Anything else fails that order only.
//!
//! The fan-out never writes to storage.
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use accrual_client::{AccrualApiError, AccrualLookup, AccrualOutcome};
use futures_util::future::join_all;
use log::*;
use loyalty_common::Points;
use thiserror::Error;
use tokio::time::{sleep, sleep_until, timeout, Instant};

use crate::lp_api::errors::{BalanceApiError, FanoutError};

//--------------------------------------     FanoutPolicy      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutPolicy {
    /// Total attempts per order for transient failures. Rate-limit waits do not count.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound on a whole `resolve` call.
    pub deadline: Duration,
}

impl Default for FanoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            deadline: Duration::from_secs(10),
        }
    }
}

impl FanoutPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }
}

//--------------------------------------     CooldownGate      ---------------------------------------------------------
/// A process-wide pause on accrual lookups. Clones share the same gate.
#[derive(Debug, Clone, Default)]
pub struct CooldownGate {
    reopens_at: Arc<Mutex<Option<Instant>>>,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the gate for at least `wait` from now. An existing, later reopening time is kept.
    pub fn pause_for(&self, wait: Duration) {
        let until = Instant::now() + wait;
        let mut reopens_at = self.lock();
        match *reopens_at {
            Some(t) if t >= until => {},
            _ => *reopens_at = Some(until),
        }
    }

    /// The time the gate reopens, if it is currently closed.
    pub fn reopens_at(&self) -> Option<Instant> {
        let reopens_at = *self.lock();
        reopens_at.filter(|t| *t > Instant::now())
    }

    /// Resolves once the gate is open. If the gate is closed again while waiting, waits for the new time too.
    pub async fn wait(&self) {
        while let Some(t) = self.reopens_at() {
            sleep_until(t).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Instant>> {
        // The guarded value is a plain timestamp, so a poisoned lock still holds usable data.
        self.reopens_at.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//--------------------------------------      Resolution       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(AccrualOutcome),
    /// The order's state could not be learnt. Carries the last error.
    Failed(String),
}

impl Resolution {
    pub fn outcome(&self) -> Option<&AccrualOutcome> {
        match self {
            Resolution::Resolved(outcome) => Some(outcome),
            Resolution::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("The accrual state of order {order} could not be determined: {reason}")]
pub struct UnresolvedOrder {
    pub order: String,
    pub reason: String,
}

/// The result of one [`AccrualFanout::resolve`] call. There is an entry for every distinct order number requested.
#[derive(Debug, Clone, Default)]
pub struct AccrualSnapshot {
    entries: HashMap<String, Resolution>,
}

impl AccrualSnapshot {
    pub fn get(&self, order: &str) -> Option<&Resolution> {
        self.entries.get(order)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Resolution)> {
        self.entries.iter()
    }

    /// The outcome for `order`. Orders that failed to resolve, or were not part of the request, are errors.
    pub fn outcome(&self, order: &str) -> Result<&AccrualOutcome, UnresolvedOrder> {
        match self.entries.get(order) {
            Some(Resolution::Resolved(outcome)) => Ok(outcome),
            Some(Resolution::Failed(reason)) => {
                Err(UnresolvedOrder { order: order.to_string(), reason: reason.clone() })
            },
            None => Err(UnresolvedOrder { order: order.to_string(), reason: "order was not looked up".into() }),
        }
    }

    /// Sums the awards of all processed orders. A single unresolved order, or a sum too large to hold, fails the
    /// whole sum.
    pub fn total_awarded(&self) -> Result<Points, BalanceApiError> {
        self.entries.iter().try_fold(Points::default(), |total, (order, resolution)| match resolution {
            Resolution::Resolved(outcome) => total
                .checked_add(outcome.awarded())
                .ok_or(BalanceApiError::Overflow("total award")),
            Resolution::Failed(reason) => {
                Err(UnresolvedOrder { order: order.clone(), reason: reason.clone() }.into())
            },
        })
    }
}

//--------------------------------------     AccrualFanout     ---------------------------------------------------------
pub struct AccrualFanout<L> {
    lookup: Arc<L>,
    gate: CooldownGate,
    policy: FanoutPolicy,
}

impl<L> Clone for AccrualFanout<L> {
    fn clone(&self) -> Self {
        Self { lookup: Arc::clone(&self.lookup), gate: self.gate.clone(), policy: self.policy }
    }
}

impl<L> std::fmt::Debug for AccrualFanout<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccrualFanout({:?})", self.policy)
    }
}

impl<L> AccrualFanout<L> {
    /// Creates a fan-out with its own cool-down gate.
    pub fn new(lookup: L, policy: FanoutPolicy) -> Self {
        Self::with_gate(lookup, policy, CooldownGate::new())
    }

    /// Creates a fan-out that shares `gate` with every other fan-out built from the same gate.
    pub fn with_gate(lookup: L, policy: FanoutPolicy, gate: CooldownGate) -> Self {
        Self { lookup: Arc::new(lookup), gate, policy }
    }

    pub fn policy(&self) -> &FanoutPolicy {
        &self.policy
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }
}

impl<L> AccrualFanout<L>
where L: AccrualLookup
{
    /// Resolves the accrual state of every distinct order in `numbers` concurrently.
    ///
    /// Individual failures are reported per order as [`Resolution::Failed`]. The only error is running out of time,
    /// in which case no partial result is returned.
    pub async fn resolve<S: AsRef<str>>(&self, numbers: &[S]) -> Result<AccrualSnapshot, FanoutError> {
        let mut seen = HashSet::with_capacity(numbers.len());
        let distinct = numbers
            .iter()
            .map(|n| n.as_ref().to_string())
            .filter(|n| seen.insert(n.clone()))
            .collect::<Vec<String>>();
        if distinct.is_empty() {
            return Ok(AccrualSnapshot::default());
        }
        trace!("🔄️ Resolving accrual state for {} orders", distinct.len());
        let lookups = distinct.iter().map(|n| self.resolve_one(n));
        let results = timeout(self.policy.deadline, join_all(lookups)).await.map_err(|_| {
            warn!(
                "🔄️ Accrual fan-out over {} orders did not finish within {:?}. Giving up.",
                distinct.len(),
                self.policy.deadline
            );
            FanoutError::DeadlineExceeded(self.policy.deadline)
        })?;
        let entries = distinct.into_iter().zip(results).collect::<HashMap<String, Resolution>>();
        Ok(AccrualSnapshot { entries })
    }

    async fn resolve_one(&self, number: &str) -> Resolution {
        let mut failures = 0u32;
        let mut backoff = self.policy.initial_backoff;
        loop {
            self.gate.wait().await;
            match self.lookup.lookup(number).await {
                Ok(outcome) => {
                    trace!("🔄️ Order {number} is {}", outcome.status);
                    return Resolution::Resolved(outcome);
                },
                Err(AccrualApiError::RateLimited { retry_after }) => {
                    info!("🔄️ Accrual service is rate limiting. Pausing all lookups for {retry_after:?}");
                    self.gate.pause_for(retry_after);
                },
                Err(e) if e.is_transient() => {
                    failures += 1;
                    if failures >= self.policy.max_attempts {
                        warn!("🔄️ Giving up on order {number} after {failures} attempts. Last error: {e}");
                        return Resolution::Failed(e.to_string());
                    }
                    debug!("🔄️ Lookup of order {number} failed ({e}). Retrying in {backoff:?}");
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(self.policy.max_backoff);
                },
                Err(e) => {
                    warn!("🔄️ Lookup of order {number} failed and will not be retried. {e}");
                    return Resolution::Failed(e.to_string());
                },
            }
        }
    }
}
