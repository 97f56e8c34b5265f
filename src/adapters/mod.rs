//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `postgres` - sqlx repositories and migrations
//! - `memory` - in-process repositories for tests and local runs
//! - `stripe` - payment provider API client
//! - `http` - axum REST surface

pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
