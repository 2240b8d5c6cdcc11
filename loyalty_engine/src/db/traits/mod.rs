//! #  Database management and control.
//!
//! This module defines the interface contracts of the loyalty engine database *backends*.
//!
//! * [`OrderManagement`] records order ownership. An order number is owned by at most one user, forever, so the only
//!   write it offers is an atomic insert-if-absent.
//! * [`LedgerManagement`] is the append-only withdrawal ledger.
//! * [`UserManagement`] stores user accounts and their password hashes.
//! * [`LoyaltyDatabase`] is a convenience trait for backends that provide all of the above.
//!
//! Accrual outcomes are never stored. They are fetched from the accrual service on demand.
mod data_objects;
mod ledger_management;
mod order_management;
mod user_management;

pub use data_objects::InsertOrderResult;
pub use ledger_management::{LedgerManagement, LedgerManagementError};
pub use order_management::{OrderManagement, OrderManagementError};
pub use user_management::{UserManagement, UserManagementError};

/// A backend that supports every storage contract the loyalty engine needs.
pub trait LoyaltyDatabase: OrderManagement + LedgerManagement + UserManagement + Clone {}

impl<T> LoyaltyDatabase for T where T: OrderManagement + LedgerManagement + UserManagement + Clone {}
