//! Runs registered migrations against a database.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mig::{Migrator, Registry, Step};
//! use mig::pg::PgDatabase;
//!
//! let db = PgDatabase::new(pool);
//! let mut registry = Registry::new();
//! registry.register(["create table accounts(id bigint primary key)"]);
//! registry.register([
//!     Step::prereq("select 1 from accounts"),
//!     Step::sql("alter table accounts add column closed_at timestamptz"),
//! ]);
//!
//! let applied = Migrator::new(db, registry).run().await?;
//! log::info!("applied {} migrations", applied);
//! ```

use std::collections::HashSet;

use log::info;

use crate::audit;
use crate::backend::{AppliedMigration, Database};
use crate::config::MigratorConfig;
use crate::error::MigrationError;
use crate::lock::with_named_lock;
use crate::registry::Registry;
use crate::scheduler::run_to_fixed_point;
use crate::step::Step;

/// Runs `registry` against `db` with the default [`MigratorConfig`].
///
/// Returns the number of steps applied.
pub async fn run_migrations<D: Database>(
    db: &D,
    registry: &Registry<D>,
) -> Result<usize, MigrationError> {
    run(db, registry, &MigratorConfig::default()).await
}

async fn run<D: Database>(
    db: &D,
    registry: &Registry<D>,
    config: &MigratorConfig,
) -> Result<usize, MigrationError> {
    check_hash_lengths(registry)?;
    with_named_lock(db, &config.lock_name, config.lock_timeout, move || async move {
        audit::bootstrap(db).await?;
        // Loaded under the lock so that steps applied by the previous holder are seen.
        let mut applied = audit::load_hashes(db).await?;
        let count = run_to_fixed_point(db, registry, &mut applied).await?;
        info!("migrations complete, {} applied", count);
        Ok(count)
    })
    .await
}

fn check_hash_lengths<D: Database>(registry: &Registry<D>) -> Result<(), MigrationError> {
    match registry
        .steps()
        .find(|step| step.hash().chars().count() > audit::MAX_HASH_LEN)
    {
        Some(step) => Err(MigrationError::HashTooLong {
            hash: step.hash().to_string(),
            file: step.file().to_string(),
            max: audit::MAX_HASH_LEN,
        }),
        None => Ok(()),
    }
}

/// Owns a database handle and the registered series.
///
/// Any number of processes may call [`Migrator::run`] against the same
/// database at once: runs are serialized by a database lock, and every step is
/// applied at most once.
pub struct Migrator<D: Database> {
    db: D,
    registry: Registry<D>,
    config: MigratorConfig,
}

impl<D: Database> Migrator<D> {
    /// Creates a migrator with the default configuration.
    pub fn new(db: D, registry: Registry<D>) -> Self {
        Self::with_config(db, registry, MigratorConfig::default())
    }

    /// Creates a migrator with an explicit configuration.
    pub fn with_config(db: D, registry: Registry<D>, config: MigratorConfig) -> Self {
        Self {
            db,
            registry,
            config,
        }
    }

    /// The database handle.
    pub fn db(&self) -> &D {
        &self.db
    }

    /// The registered series.
    pub fn registry(&self) -> &Registry<D> {
        &self.registry
    }

    /// Mutable access to the registered series, e.g. to add more.
    pub fn registry_mut(&mut self) -> &mut Registry<D> {
        &mut self.registry
    }

    /// The configuration in use.
    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Applies every registered step not yet recorded.
    ///
    /// Returns the number of steps applied; `0` when the database is up to date.
    pub async fn run(&self) -> Result<usize, MigrationError> {
        run(&self.db, &self.registry, &self.config).await
    }

    /// Returns every recorded migration, oldest first.
    ///
    /// This read does not take the lock; a concurrent run may be adding rows.
    /// It never creates the applied-migration table: before the first run the
    /// history is empty.
    pub async fn applied(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        audit::load_existing(&self.db).await
    }

    /// Returns the registered steps that are not recorded yet.
    ///
    /// Prerequisite checks are never recorded and are not listed. Like
    /// [`Migrator::applied`] this is advisory only.
    pub async fn pending(&self) -> Result<Vec<&Step<D>>, MigrationError> {
        let applied: HashSet<String> = audit::load_existing(&self.db)
            .await?
            .into_iter()
            .map(|row| row.hash)
            .collect();
        Ok(self
            .registry
            .steps()
            .filter(|step| !step.is_prereq() && !applied.contains(step.hash()))
            .collect())
    }
}
