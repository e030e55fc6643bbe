use std::fmt;
use std::time::Duration;

use crate::backend::BoxError;

/// Errors that can occur while acquiring or releasing a cross-process lock.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The lock was not acquired within the allotted time.
    #[error("timed out after {timeout:?} waiting for lock `{name}`")]
    Timeout {
        /// Name of the lock.
        name: String,
        /// How long acquisition was attempted.
        timeout: Duration,
    },

    /// The database failed while taking or releasing the lock.
    #[error("lock `{name}` database error: {source}")]
    Database {
        /// Name of the lock.
        name: String,
        /// The backend error.
        #[source]
        source: BoxError,
    },
}

impl LockError {
    /// True when the error is a [`LockError::Timeout`]; retrying later is safe.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LockError::Timeout { .. })
    }
}

/// A series that could not progress in the final scheduler pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledSeries {
    /// Registration order of the series.
    pub index: usize,
    /// Position of the blocking step within the series.
    pub step: usize,
    /// First line of the blocking step.
    pub text: String,
    /// Where the blocking step was registered.
    pub file: String,
}

impl fmt::Display for StalledSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "series {} step {} `{}` ({})",
            self.index, self.step, self.text, self.file
        )
    }
}

fn list_stalled(stalled: &[StalledSeries]) -> String {
    stalled
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur during a migration run.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// The applied-migration table could not be created.
    #[error("couldn't create the applied-migration table: {0}")]
    Bootstrap(#[source] BoxError),

    /// Reading the applied-migration table failed.
    #[error("couldn't read the applied-migration table: {0}")]
    Database(#[source] BoxError),

    /// A transaction could not be opened.
    #[error("couldn't begin a transaction for `{hash}`: {source}")]
    Begin {
        /// Hash of the step about to run.
        hash: String,
        /// The backend error.
        #[source]
        source: BoxError,
    },

    /// A step failed to execute and was rolled back.
    #[error("couldn't execute migration: {source}\nfile: {file}\nhash: `{hash}`\nsql: `{sql}`")]
    Execution {
        /// Where the step was registered.
        file: String,
        /// Hash of the step.
        hash: String,
        /// Text (or procedure label) of the step.
        sql: String,
        /// The backend error.
        #[source]
        source: BoxError,
    },

    /// The audit row of a step could not be inserted; the step was rolled back.
    #[error("couldn't record migration: {source}\nfile: {file}\nhash: `{hash}`\nsql: `{sql}`")]
    Record {
        /// Where the step was registered.
        file: String,
        /// Hash of the step.
        hash: String,
        /// Text (or procedure label) of the step.
        sql: String,
        /// The backend error.
        #[source]
        source: BoxError,
    },

    /// Committing a step failed.
    #[error("couldn't commit migration: {source}\nfile: {file}\nhash: `{hash}`\nsql: `{sql}`")]
    Commit {
        /// Where the step was registered.
        file: String,
        /// Hash of the step.
        hash: String,
        /// Text (or procedure label) of the step.
        sql: String,
        /// The backend error.
        #[source]
        source: BoxError,
    },

    /// A step's hash does not fit the applied-migration table. Only procedure
    /// labels can be this long; the run is refused before anything executes.
    #[error("migration hash is longer than {max} characters (file: {file}): `{hash}`")]
    HashTooLong {
        /// The offending hash (a procedure label).
        hash: String,
        /// Where the step was registered.
        file: String,
        /// The longest hash the table stores.
        max: usize,
    },

    /// A full pass made no progress while some series were unfinished.
    #[error("migration deadlock, no prerequisite can be satisfied: {}", list_stalled(.stalled))]
    Deadlock {
        /// The unfinished series.
        stalled: Vec<StalledSeries>,
    },

    /// The cross-process lock could not be taken.
    #[error(transparent)]
    Lock(#[from] LockError),
}

impl MigrationError {
    /// True for [`MigrationError::Deadlock`].
    pub fn is_deadlock(&self) -> bool {
        matches!(self, MigrationError::Deadlock { .. })
    }
}
