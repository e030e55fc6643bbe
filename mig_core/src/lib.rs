//! # Mig core
//!
//! A schema migration engine that applies each registered step exactly once.
//!
//! Steps are grouped in series. Each series is applied in order, and series
//! depend on each other only through prerequisite checks: a series whose
//! prerequisite fails simply waits while the others progress, and is retried
//! on the next pass. Applied steps are tracked by the hash of their
//! whitespace-normalized text in the `mig_recorded_migrations` table, each
//! step committing together with its audit row. Runs from concurrent processes
//! are serialized through a database lock.
//!
//! Drivers plug in through [`Database`]; see `mig_pg` and `mig_mysql`.

#![deny(missing_docs)]

mod apply;
mod audit;
mod backend;
mod config;
mod dialect;
mod error;
pub mod hash;
mod lock;
mod migrator;
mod registry;
mod scheduler;
mod series;
mod step;

#[cfg(test)]
mod fake;

pub use audit::{MAX_HASH_LEN, TABLE};
pub use backend::{AppliedMigration, BoxError, Database, Param, Transaction};
pub use config::MigratorConfig;
pub use dialect::{Dialect, DialectError};
pub use error::{LockError, MigrationError, StalledSeries};
pub use lock::{DEFAULT_LOCK_NAME, with_lock, with_named_lock};
pub use migrator::{Migrator, run_migrations};
pub use registry::Registry;
pub use step::{Procedure, Step, StepKind};

pub mod prelude {
    //! The prelude module for the `mig_core` crate.
    pub use super::{
        Database, Migrator, MigratorConfig, MigrationError, Registry, Step, Transaction,
        run_migrations, with_lock,
    };
}
