//! # ews-store
//!
//! Durable history for sensor readings.
//!
//! - **[`connection`]**: `r2d2` pool with WAL and busy-timeout pragmas applied
//!   to every connection.
//! - **[`migrations`]**: version-tracked schema, embedded at compile time.
//! - **[`repo`]**: stateless [`ReadingRepo`] (every method takes `&Connection`).
//! - **[`store`]**: the [`ReadingStore`] seam the ingestion path persists
//!   through, and its pooled `SQLite` implementation.

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repo;
pub mod store;

pub use connection::{ConnectionConfig, ConnectionPool};
pub use errors::{Result, StoreError};
pub use repo::ReadingRepo;
pub use store::{ReadingStore, SqliteStore};
