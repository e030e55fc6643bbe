//! Session-scoped named locks.
//!
//! `GET_LOCK` is polled with a zero wait so that waiters hand their connection
//! back to the pool between attempts. A held lock pins its connection until it
//! is released.

use std::time::Duration;

use mig_core::LockError;
use sqlx::MySql;
use sqlx::pool::PoolConnection;
use tokio::time::Instant;

use crate::database::MySqlDatabase;

/// A held named lock.
///
/// Dropping it without [`MySqlLock::release`] detaches its connection from the
/// pool and closes it; ending the session frees the lock.
pub struct MySqlLock {
    name: String,
    conn: Option<PoolConnection<MySql>>,
}

impl MySqlLock {
    pub(crate) async fn acquire(
        db: &MySqlDatabase,
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

            let (status,): (Option<i64>,) = sqlx::query_as("SELECT GET_LOCK(?, 0)")
                .bind(name)
                .fetch_one(&mut *conn)
                .await
                .map_err(database_error)?;

            match status {
                Some(1) => {
                    log::info!("Acquired named lock '{}'", name);
                    return Ok(Self {
                        name: name.to_string(),
                        conn: Some(conn),
                    });
                }
                Some(_) => drop(conn),
                None => {
                    return Err(LockError::Database {
                        name: name.to_string(),
                        source: "GET_LOCK returned NULL".into(),
                    });
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(timed_out());
            }
            log::debug!("Named lock '{}' is busy, retrying", name);
            tokio::time::sleep_until((now + db.poll_interval).min(deadline)).await;
        }
    }

    /// Unlocks and returns the connection to the pool.
    pub async fn release(mut self) -> Result<(), LockError> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        let released: Result<(Option<i64>,), sqlx::Error> = sqlx::query_as("SELECT RELEASE_LOCK(?)")
            .bind(self.name.as_str())
            .fetch_one(&mut *conn)
            .await;

        match released {
            Ok((Some(1),)) => {
                log::info!("Released named lock '{}'", self.name);
                Ok(())
            }
            Ok(_) => {
                drop(conn.detach());
                log::warn!("Named lock '{}' was not held by its session", self.name);
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

impl Drop for MySqlLock {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            log::warn!(
                "Named lock '{}' dropped while held, closing its connection",
                self.name
            );
            drop(conn.detach());
        }
    }
}
