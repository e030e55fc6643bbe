//! The database capabilities the engine consumes.
//!
//! Backends (`mig_pg`, `mig_mysql`) implement [`Database`] and [`Transaction`]
//! on top of their driver. The engine never talks to a driver directly.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::dialect::Dialect;
use crate::error::LockError;

/// Boxed error used at the backend seam.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A value bound to a positional placeholder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Param<'a> {
    /// A text value.
    Text(&'a str),
    /// A point in time.
    Timestamp(DateTime<Utc>),
}

/// A row of the applied-migration table.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMigration {
    /// Content hash (or procedure label) of the step.
    pub hash: String,
    /// The step text as it was sent to the database.
    pub sql_text: String,
    /// Where the step was registered.
    pub file: String,
    /// The package that registered the step.
    pub pkg: String,
    /// When the step was committed.
    pub applied_at: DateTime<Utc>,
}

/// An open database transaction.
///
/// Dropping a transaction without calling [`Transaction::commit`] must roll it
/// back.
#[async_trait]
pub trait Transaction: Send {
    /// Executes `sql` inside the transaction and returns the affected rows.
    ///
    /// With no `params` the text may hold several `;` separated statements.
    async fn execute(&mut self, sql: &str, params: &[Param<'_>]) -> Result<u64, BoxError>;

    /// Commits the transaction.
    async fn commit(self) -> Result<(), BoxError>;

    /// Rolls the transaction back.
    async fn rollback(self) -> Result<(), BoxError>;
}

/// A handle to the database being migrated.
#[async_trait]
pub trait Database: Send + Sync {
    /// The transaction type handed to procedural steps.
    type Transaction: Transaction;

    /// A held cross-process lock.
    ///
    /// Dropping it without [`Database::release_lock`] must still free the lock,
    /// typically by closing the session that owns it.
    type Lock: Send;

    /// The SQL dialect of this handle.
    fn dialect(&self) -> Dialect;

    /// Executes `sql` outside of any transaction.
    async fn execute(&self, sql: &str, params: &[Param<'_>]) -> Result<u64, BoxError>;

    /// Opens a transaction.
    async fn begin(&self) -> Result<Self::Transaction, BoxError>;

    /// True when `table` exists in the current schema. Must not write.
    async fn table_exists(&self, table: &str) -> Result<bool, BoxError>;

    /// Runs `select_sql` and decodes its rows as
    /// `(hash, sql_text, file, pkg, time)` tuples.
    async fn fetch_applied(&self, select_sql: &str) -> Result<Vec<AppliedMigration>, BoxError>;

    /// Waits up to `timeout` for the exclusive lock called `name`.
    async fn acquire_lock(&self, name: &str, timeout: Duration) -> Result<Self::Lock, LockError>;

    /// Releases a lock obtained from [`Database::acquire_lock`].
    async fn release_lock(&self, lock: Self::Lock) -> Result<(), LockError>;
}
