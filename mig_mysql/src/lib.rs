//! # Mig mysql backend
//!
//! Runs `mig_core` migrations against MySQL or MariaDB through a sqlx
//! [`MySqlPool`]. Migration runs are serialized with `GET_LOCK`.
//!
//! MySQL commits DDL statements implicitly, so a step that changes the schema
//! is not rolled back together with its audit row when the latter fails to
//! insert. Data-only steps keep the all-or-nothing guarantee.
//!
//! [`MySqlPool`]: sqlx::MySqlPool

#![deny(missing_docs)]

/// The database handle and its transactions
pub mod database;

/// Named locks used for cross-process mutual exclusion
pub mod lock;

pub use database::{DEFAULT_POLL_INTERVAL, MySqlDatabase, MySqlTransaction};
pub use lock::MySqlLock;
