//! Session-scoped advisory locks.
//!
//! Lock names are mapped onto postgres' two-int4 advisory lock key space with
//! an MD5 of the name, so any string can serve as a lock name. Advisory locks
//! belong to the session that took them, which is why a held lock pins its
//! pool connection until it is released.

use std::time::Duration;

use mig_core::LockError;
use sqlx::Postgres;
use sqlx::pool::PoolConnection;
use tokio::time::Instant;

use crate::database::PgDatabase;

const TRY_LOCK_SQL: &str = r#"
    SELECT pg_try_advisory_lock(
        ('x' || substr(md5($1), 1, 8))::bit(32)::int,
        ('x' || substr(md5($1), 9, 8))::bit(32)::int
    )
"#;

const UNLOCK_SQL: &str = r#"
    SELECT pg_advisory_unlock(
        ('x' || substr(md5($1), 1, 8))::bit(32)::int,
        ('x' || substr(md5($1), 9, 8))::bit(32)::int
    )
"#;

/// A held advisory lock.
///
/// Dropping it without [`PgLock::release`] detaches its connection from the
/// pool and closes it; ending the session frees the lock.
pub struct PgLock {
    name: String,
    conn: Option<PoolConnection<Postgres>>,
}

impl PgLock {
    /// Polls `pg_try_advisory_lock` until it succeeds or `timeout` elapses.
    ///
    /// The connection goes back to the pool between attempts, so waiters do
    /// not starve the lock holder of connections.
    pub(crate) async fn acquire(
        db: &PgDatabase,
        name: &str,
        timeout: Duration,
    ) -> Result<Self, LockError> {
        let deadline = Instant::now() + timeout;
        let timed_out = || LockError::Timeout {
            name: name.to_string(),
            timeout,
        };
        let database_error = |source: sqlx::Error| LockError::Database {
            name: name.to_string(),
            source: source.into(),
        };

        loop {
            let mut conn = tokio::time::timeout_at(deadline, db.pool.acquire())
                .await
                .map_err(|_| timed_out())?
                .map_err(database_error)?;

            let (acquired,): (bool,) = sqlx::query_as(TRY_LOCK_SQL)
                .bind(name)
                .fetch_one(&mut *conn)
                .await
                .map_err(database_error)?;

            if acquired {
                log::info!("Acquired advisory lock '{}'", name);
                return Ok(Self {
                    name: name.to_string(),
                    conn: Some(conn),
                });
            }
            drop(conn);

            let now = Instant::now();
            if now >= deadline {
                return Err(timed_out());
            }
            log::debug!("Advisory lock '{}' is busy, retrying", name);
            tokio::time::sleep_until((now + db.poll_interval).min(deadline)).await;
        }
    }

    /// Unlocks and returns the connection to the pool.
    pub async fn release(mut self) -> Result<(), LockError> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        let unlocked: Result<(bool,), sqlx::Error> = sqlx::query_as(UNLOCK_SQL)
            .bind(self.name.as_str())
            .fetch_one(&mut *conn)
            .await;

        match unlocked {
            Ok((true,)) => {
                log::info!("Released advisory lock '{}'", self.name);
                Ok(())
            }
            Ok((false,)) => {
                drop(conn.detach());
                log::warn!("Advisory lock '{}' was not held by its session", self.name);
                Ok(())
            }
            Err(source) => {
                drop(conn.detach());
                Err(LockError::Database {
                    name: self.name.clone(),
                    source: source.into(),
                })
            }
        }
    }

    /// The name the lock was taken under.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for PgLock {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            log::warn!(
                "Advisory lock '{}' dropped while held, closing its connection",
                self.name
            );
            drop(conn.detach());
        }
    }
}
