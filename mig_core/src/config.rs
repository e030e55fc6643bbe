//! Configuration of migration runs.

use std::time::Duration;

use crate::lock::DEFAULT_LOCK_NAME;

/// Settings for [`Migrator`](crate::Migrator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratorConfig {
    /// Name of the database lock serializing migration runs.
    ///
    /// Every process migrating the same database must use the same name.
    /// Default: [`DEFAULT_LOCK_NAME`]
    pub lock_name: String,

    /// How long a run waits for another process to finish migrating before
    /// giving up with a lock timeout.
    ///
    /// Default: 10 minutes
    pub lock_timeout: Duration,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            lock_name: DEFAULT_LOCK_NAME.to_string(),
            lock_timeout: Duration::from_secs(600),
        }
    }
}

impl MigratorConfig {
    /// Sets [`MigratorConfig::lock_name`].
    pub fn with_lock_name(mut self, name: impl Into<String>) -> Self {
        self.lock_name = name.into();
        self
    }

    /// Sets [`MigratorConfig::lock_timeout`].
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}
