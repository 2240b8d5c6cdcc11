//! Loyalty Engine
//!
//! The loyalty engine holds the core logic of the loyalty points backend. Users register orders by number, the engine
//! learns each order's accrual from the external accrual service, and derives a spendable balance that users can
//! withdraw from.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. The storage contracts are
//!    defined as traits, so the public APIs can be driven by any backend (or a mock) that implements them. The data
//!    types stored in the database are defined in the `db_types` module and are public.
//! 2. The public API ([`mod@lp_api`]):
//!    * [`OrderRegistryApi`] records order ownership, exactly once per order number.
//!    * [`AccrualFanout`] resolves the accrual state of many orders concurrently against the rate-limited accrual
//!      service.
//!    * [`BalanceApi`] computes balances from resolved accruals and the withdrawal ledger, and authorizes withdrawals.
//!    * [`AuthApi`] registers users and checks their credentials.
mod db;

pub mod db_types;
pub mod helpers;
pub mod lp_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(test)]
mod api_tests;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    InsertOrderResult,
    LedgerManagement,
    LedgerManagementError,
    LoyaltyDatabase,
    OrderManagement,
    OrderManagementError,
    UserManagement,
    UserManagementError,
};
pub use lp_api::{
    accrual_fanout::{AccrualFanout, AccrualSnapshot, CooldownGate, FanoutPolicy, Resolution, UnresolvedOrder},
    auth_api::AuthApi,
    balance_api::{BalanceApi, OwnerGuard, OwnerLocks},
    balance_objects::{Balance, OrderStatusEntry, WithdrawalResult},
    errors::{AuthApiError, BalanceApiError, FanoutError, OrderRegistryError},
    order_registry_api::{OrderRegistryApi, RegistrationResult},
};
