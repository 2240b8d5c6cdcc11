//! # Loyalty engine public API
//!
//! The `lp_api` module exposes the programmatic API of the loyalty engine. Each API is a small struct that wraps a
//! storage backend (and, where needed, the accrual fan-out), so callers only pull in what they use.
//!
//! * [`order_registry_api`] records which user owns which order number.
//! * [`accrual_fanout`] resolves the accrual state of a batch of orders against the accrual service, with shared
//!   rate-limit cool-down and per-order retry.
//! * [`balance_api`] derives balances and authorizes withdrawals.
//! * [`auth_api`] registers users and verifies their passwords.
//!
//! # API usage
//!
//! ```rust,ignore
//! use loyalty_engine::{AccrualFanout, BalanceApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/loyalty.db", 25).await?;
//! let fanout = AccrualFanout::new(accrual_client, FanoutPolicy::default());
//! let api = BalanceApi::new(db, fanout);
//! let balance = api.compute_balance(user_id).await?;
//! ```
pub mod accrual_fanout;
pub mod auth_api;
pub mod balance_api;
pub mod balance_objects;
pub mod errors;
pub mod order_registry_api;
