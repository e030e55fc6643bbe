//! Cross-process mutual exclusion backed by the database.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};

use crate::backend::Database;
use crate::error::LockError;

/// Lock name used by [`with_lock`] and, by default, by migration runs.
pub const DEFAULT_LOCK_NAME: &str = "mig_recorded_migrations_lock";

/// Runs `work` while holding the database lock [`DEFAULT_LOCK_NAME`].
///
/// See [`with_named_lock`].
pub async fn with_lock<D, F, Fut, T, E>(db: &D, timeout: Duration, work: F) -> Result<T, E>
where
    D: Database,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<LockError>,
{
    with_named_lock(db, DEFAULT_LOCK_NAME, timeout, work).await
}

/// Runs `work` while holding the database lock `name`.
///
/// If the lock cannot be taken within `timeout`, `work` is never invoked and a
/// [`LockError::Timeout`] is returned. The lock is released once `work` has
/// finished, whatever its result. Should `work` panic, dropping the held lock
/// ends the session that owns it, which frees it in the database.
pub async fn with_named_lock<D, F, Fut, T, E>(
    db: &D,
    name: &str,
    timeout: Duration,
    work: F,
) -> Result<T, E>
where
    D: Database,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<LockError>,
{
    let lock = db.acquire_lock(name, timeout).await?;
    debug!("acquired lock `{}`", name);

    let result = work().await;

    match db.release_lock(lock).await {
        Ok(()) => debug!("released lock `{}`", name),
        Err(err) => warn!("couldn't release lock `{}` cleanly: {}", name, err),
    }
    result
}
