//! # Mig postgres backend
//!
//! Runs `mig_core` migrations against PostgreSQL through a sqlx [`PgPool`].
//! Migration runs are serialized with a session-level advisory lock.
//!
//! ```rust,ignore
//! use mig_core::{Migrator, Registry};
//! use mig_pg::PgDatabase;
//!
//! let db = PgDatabase::new(pool);
//! let mut registry = Registry::new();
//! registry.register(["create table numbers(num int)"]);
//! Migrator::new(db, registry).run().await?;
//! ```
//!
//! [`PgPool`]: sqlx::PgPool

#![deny(missing_docs)]

/// The database handle and its transactions
pub mod database;

/// Advisory locks used for cross-process mutual exclusion
pub mod lock;

pub use database::{DEFAULT_POLL_INTERVAL, PgDatabase, PgTransaction};
pub use lock::PgLock;
