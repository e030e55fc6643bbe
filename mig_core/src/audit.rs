//! The applied-migration table.
//!
//! One row per applied step, keyed by its hash. Rows are inserted in the same
//! transaction as the step itself and are never updated or deleted.

use std::collections::HashSet;

use chrono::Utc;
use log::debug;

use crate::backend::{AppliedMigration, Database, Param, Transaction};
use crate::dialect::Dialect;
use crate::error::MigrationError;
use crate::step::Step;

/// Name of the applied-migration table.
pub const TABLE: &str = "mig_recorded_migrations";

/// Longest hash, in characters, the applied-migration table can store.
///
/// Content hashes are far shorter; only procedure labels can exceed it.
pub const MAX_HASH_LEN: usize = 255;

pub(crate) fn create_table_sql(dialect: Dialect) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {TABLE} (
            sql_text TEXT NOT NULL,
            file TEXT NOT NULL,
            hash VARCHAR({MAX_HASH_LEN}) NOT NULL UNIQUE,
            pkg TEXT NOT NULL,
            time {} NOT NULL
        )",
        dialect.timestamp_type()
    )
}

pub(crate) fn insert_sql(dialect: Dialect) -> String {
    format!(
        "INSERT INTO {TABLE} (sql_text, file, hash, pkg, time) VALUES ({})",
        dialect.placeholders(5)
    )
}

pub(crate) fn select_sql() -> String {
    format!("SELECT hash, sql_text, file, pkg, time FROM {TABLE} ORDER BY time ASC")
}

/// Creates the applied-migration table if it does not exist yet.
pub(crate) async fn bootstrap<D: Database>(db: &D) -> Result<(), MigrationError> {
    db.execute(&create_table_sql(db.dialect()), &[])
        .await
        .map_err(MigrationError::Bootstrap)?;
    Ok(())
}

/// Reads every applied-migration row.
pub(crate) async fn load<D: Database>(db: &D) -> Result<Vec<AppliedMigration>, MigrationError> {
    db.fetch_applied(&select_sql())
        .await
        .map_err(MigrationError::Database)
}

/// Reads every applied-migration row without creating the table.
///
/// A missing table is an empty history, so readers that do not hold the lock
/// never race the lock holder's bootstrap.
pub(crate) async fn load_existing<D: Database>(
    db: &D,
) -> Result<Vec<AppliedMigration>, MigrationError> {
    if !db.table_exists(TABLE).await.map_err(MigrationError::Database)? {
        debug!("{} does not exist yet", TABLE);
        return Ok(Vec::new());
    }
    load(db).await
}

/// The hashes of every applied step.
pub(crate) async fn load_hashes<D: Database>(db: &D) -> Result<HashSet<String>, MigrationError> {
    let hashes: HashSet<String> = load(db).await?.into_iter().map(|row| row.hash).collect();
    debug!("{} migrations already applied", hashes.len());
    Ok(hashes)
}

/// Inserts the audit row for `step` inside `tx`.
pub(crate) async fn record<D: Database>(
    dialect: Dialect,
    tx: &mut D::Transaction,
    step: &Step<D>,
) -> Result<(), crate::backend::BoxError> {
    tx.execute(
        &insert_sql(dialect),
        &[
            Param::Text(step.text()),
            Param::Text(step.file()),
            Param::Text(step.hash()),
            Param::Text(step.pkg()),
            Param::Timestamp(Utc::now()),
        ],
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_uses_dialect_placeholders() {
        assert_eq!(
            insert_sql(Dialect::Postgres),
            "INSERT INTO mig_recorded_migrations (sql_text, file, hash, pkg, time) \
             VALUES ($1, $2, $3, $4, $5)"
        );
        assert!(insert_sql(Dialect::MySql).ends_with("VALUES (?, ?, ?, ?, ?)"));
    }

    #[test]
    fn table_ddl_is_idempotent_and_hash_unique() {
        let ddl = create_table_sql(Dialect::Postgres);
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS mig_recorded_migrations"));
        assert!(ddl.contains("hash VARCHAR(255) NOT NULL UNIQUE"));
        assert!(ddl.contains("TIMESTAMPTZ"));
        assert!(create_table_sql(Dialect::MySql).contains("DATETIME(6)"));
    }
}
