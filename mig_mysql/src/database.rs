use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mig_core::{AppliedMigration, BoxError, Database, Dialect, LockError, Param, Transaction};
use sqlx::mysql::{MySqlArguments, MySqlConnection};
use sqlx::query::Query;
use sqlx::{MySql, MySqlPool};

use crate::lock::MySqlLock;

/// Delay between two attempts at a busy named lock.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A [`Database`] backed by a mysql connection pool.
///
/// The pool needs at least two connections: the named lock pins one for the
/// duration of a run while steps execute on another.
#[derive(Clone, Debug)]
pub struct MySqlDatabase {
    pub(crate) pool: MySqlPool,
    pub(crate) poll_interval: Duration,
}

impl MySqlDatabase {
    /// Creates a new `MySqlDatabase`.
    pub fn new(pool: MySqlPool) -> Self {
        log::debug!("Creating a new MySqlDatabase");
        Self {
            pool,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets how often a busy named lock is retried.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Exposes the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn bind<'q>(sql: &'q str, params: &[Param<'q>]) -> Query<'q, MySql, MySqlArguments> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| match *param {
            Param::Text(value) => query.bind(value),
            Param::Timestamp(at) => query.bind(at),
        })
}

/// Wrapper for a sqlx transaction, handed to procedural steps.
///
/// Dereferences to the transaction's connection, so it can be used as a sqlx
/// executor with `&mut **tx`.
pub struct MySqlTransaction(sqlx::Transaction<'static, MySql>);

impl MySqlTransaction {
    /// Unwraps the sqlx transaction.
    pub fn into_inner(self) -> sqlx::Transaction<'static, MySql> {
        self.0
    }
}

impl std::ops::Deref for MySqlTransaction {
    type Target = MySqlConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for MySqlTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[async_trait]
impl Transaction for MySqlTransaction {
    async fn execute(&mut self, sql: &str, params: &[Param<'_>]) -> Result<u64, BoxError> {
        let conn: &mut MySqlConnection = &mut self.0;
        let result = if params.is_empty() {
            sqlx::Executor::execute(conn, sqlx::raw_sql(sql)).await?
        } else {
            sqlx::Executor::execute(conn, bind(sql, params)).await?
        };
        Ok(result.rows_affected())
    }

    async fn commit(self) -> Result<(), BoxError> {
        self.0.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), BoxError> {
        self.0.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Database for MySqlDatabase {
    type Transaction = MySqlTransaction;
    type Lock = MySqlLock;

    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn execute(&self, sql: &str, params: &[Param<'_>]) -> Result<u64, BoxError> {
        let result = if params.is_empty() {
            sqlx::raw_sql(sql).execute(&self.pool).await?
        } else {
            bind(sql, params).execute(&self.pool).await?
        };
        Ok(result.rows_affected())
    }

    async fn begin(&self) -> Result<Self::Transaction, BoxError> {
        Ok(MySqlTransaction(self.pool.begin().await?))
    }

    async fn table_exists(&self, table: &str) -> Result<bool, BoxError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn fetch_applied(&self, select_sql: &str) -> Result<Vec<AppliedMigration>, BoxError> {
        let rows: Vec<(String, String, String, String, DateTime<Utc>)> =
            sqlx::query_as(select_sql).fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(hash, sql_text, file, pkg, applied_at)| AppliedMigration {
                hash,
                sql_text,
                file,
                pkg,
                applied_at,
            })
            .collect())
    }

    async fn acquire_lock(&self, name: &str, timeout: Duration) -> Result<MySqlLock, LockError> {
        MySqlLock::acquire(self, name, timeout).await
    }

    async fn release_lock(&self, lock: MySqlLock) -> Result<(), LockError> {
        lock.release().await
    }
}
