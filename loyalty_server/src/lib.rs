//! # Loyalty points server
//! This crate hosts the HTTP server for the loyalty points backend. It is responsible for:
//! * Registering and authenticating users, and issuing bearer tokens.
//! * Accepting order numbers from authenticated users.
//! * Reporting order accrual states, balances and withdrawal history.
//! * Authorizing withdrawals against the user's balance.
//!
//! The business logic lives in `loyalty_engine`. This crate is plumbing: configuration, routing, authentication and
//! error mapping.
//!
//! ## Configuration
//! The server is configured via environment variables and a few command-line flags. See [config](config/index.html)
//! for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/user/register`, `/api/user/login`: Credential routes. Successful calls return a bearer token in the
//!   `Authorization` header.
//! * `/api/user/orders`, `/api/user/balance`, `/api/user/balance/withdraw`, `/api/user/withdrawals`: Authenticated
//!   user routes.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod middleware;
pub mod routes;
pub mod server;
