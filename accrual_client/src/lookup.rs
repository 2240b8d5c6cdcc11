use crate::{AccrualApiError, AccrualOutcome};

/// A source of accrual outcomes for single orders.
///
/// Implementations perform one lookup per call and classify the result. They must not retry; callers decide what to
/// do with [`AccrualApiError::RateLimited`] and transient failures.
#[allow(async_fn_in_trait)]
pub trait AccrualLookup {
    async fn lookup(&self, order_number: &str) -> Result<AccrualOutcome, AccrualApiError>;
}
