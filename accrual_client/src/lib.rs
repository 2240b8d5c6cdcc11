//! # Accrual service client
//!
//! A thin client for the external accrual calculation service. The service exposes a single operation,
//! `GET /api/orders/{number}`, which reports the processing state of an order and, once processed, the number of
//! points awarded for it.
//!
//! [`AccrualApi`] issues exactly one request per call and classifies the response into either an
//! [`AccrualOutcome`] or an [`AccrualApiError`]. It does not retry. Retry, rate-limit handling and fan-out across many
//! orders live in the engine, which consumes the client through the [`AccrualLookup`] trait.
mod api;
mod config;
mod data_objects;
mod error;
mod lookup;

pub use api::AccrualApi;
pub use config::AccrualConfig;
pub use data_objects::{AccrualOutcome, AccrualStatus};
pub use error::AccrualApiError;
pub use lookup::AccrualLookup;
