//! A scripted in-memory backend for unit tests.
//!
//! It understands just enough SQL to exercise the engine: `create table X`,
//! `alter table X ...` and `select 1 from X` check the set of known tables,
//! statements starting with `fail` always error, and the applied-migration
//! table is kept as a list of rows. Transactions buffer their effects until
//! commit.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use crate::audit::TABLE;
use crate::backend::{AppliedMigration, BoxError, Database, Param, Transaction};
use crate::dialect::Dialect;
use crate::error::LockError;

#[derive(Debug, Default, Clone)]
struct State {
    bootstrapped: bool,
    tables: BTreeSet<String>,
    audit: Vec<AppliedMigration>,
    executed: Vec<String>,
}

#[derive(Debug, Default)]
struct Faults {
    bootstrap: bool,
    audit_insert: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    faults: Mutex<Faults>,
    lock: Arc<tokio::sync::Mutex<()>>,
    releases: Mutex<usize>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeDatabase {
    shared: Arc<Shared>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn table_after<'a>(sql: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = sql.strip_prefix(keyword)?.trim_start();
    rest.split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .filter(|name| !name.is_empty())
}

impl FakeDatabase {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_bootstrap(&self) {
        guard(&self.shared.faults).bootstrap = true;
    }

    pub(crate) fn fail_audit_inserts(&self) {
        guard(&self.shared.faults).audit_insert = true;
    }

    pub(crate) fn has_table(&self, name: &str) -> bool {
        guard(&self.shared.state).tables.contains(name)
    }

    pub(crate) fn is_bootstrapped(&self) -> bool {
        guard(&self.shared.state).bootstrapped
    }

    pub(crate) fn create_table(&self, name: &str) {
        guard(&self.shared.state).tables.insert(name.to_string());
    }

    pub(crate) fn audit_rows(&self) -> Vec<AppliedMigration> {
        guard(&self.shared.state).audit.clone()
    }

    /// Committed statements, excluding bootstrap and audit bookkeeping.
    pub(crate) fn executed(&self) -> Vec<String> {
        guard(&self.shared.state).executed.clone()
    }

    pub(crate) fn lock_releases(&self) -> usize {
        *guard(&self.shared.releases)
    }

    /// Applies `sql` to `state`, as seen from `committed` plus `state`.
    fn apply(
        &self,
        state: &mut State,
        committed: Option<&State>,
        sql: &str,
        params: &[Param<'_>],
    ) -> Result<u64, BoxError> {
        let normalized = sql.trim().to_ascii_lowercase();
        let exists = |state: &State, name: &str| {
            state.tables.contains(name) || committed.is_some_and(|c| c.tables.contains(name))
        };

        if normalized.starts_with("create table if not exists") && normalized.contains(TABLE) {
            if guard(&self.shared.faults).bootstrap {
                return Err("permission denied for schema public".into());
            }
            state.bootstrapped = true;
            return Ok(0);
        }

        if normalized.starts_with(&format!("insert into {TABLE}")) {
            if guard(&self.shared.faults).audit_insert {
                return Err("audit insert rejected".into());
            }
            let text = |i: usize| match params.get(i) {
                Some(Param::Text(value)) => Ok(value.to_string()),
                _ => Err(BoxError::from(format!("expected text parameter {}", i + 1))),
            };
            let applied_at = match params.get(4) {
                Some(Param::Timestamp(at)) => *at,
                _ => return Err("expected timestamp parameter 5".into()),
            };
            let hash = text(2)?;
            let duplicate = |rows: &[AppliedMigration]| rows.iter().any(|row| row.hash == hash);
            if duplicate(&state.audit) || committed.is_some_and(|c| duplicate(&c.audit)) {
                return Err(format!("duplicate hash `{hash}`").into());
            }
            state.audit.push(AppliedMigration {
                sql_text: text(0)?,
                file: text(1)?,
                hash,
                pkg: text(3)?,
                applied_at,
            });
            return Ok(1);
        }

        if normalized.starts_with("fail") {
            return Err(format!("syntax error at or near `{}`", sql.trim()).into());
        }

        if let Some(name) = table_after(&normalized, "create table") {
            if exists(&*state, name) {
                return Err(format!("relation \"{name}\" already exists").into());
            }
            state.tables.insert(name.to_string());
        } else if let Some(name) = table_after(&normalized, "select 1 from")
            .or_else(|| table_after(&normalized, "alter table"))
        {
            if !exists(&*state, name) {
                return Err(format!("relation \"{name}\" does not exist").into());
            }
        }

        state.executed.push(sql.trim().to_string());
        Ok(0)
    }
}

pub(crate) struct FakeTransaction {
    db: FakeDatabase,
    pending: State,
}

#[async_trait]
impl Transaction for FakeTransaction {
    async fn execute(&mut self, sql: &str, params: &[Param<'_>]) -> Result<u64, BoxError> {
        let committed = guard(&self.db.shared.state).clone();
        self.db.apply(&mut self.pending, Some(&committed), sql, params)
    }

    async fn commit(self) -> Result<(), BoxError> {
        let mut state = guard(&self.db.shared.state);
        state.bootstrapped |= self.pending.bootstrapped;
        state.tables.extend(self.pending.tables);
        state.audit.extend(self.pending.audit);
        state.executed.extend(self.pending.executed);
        Ok(())
    }

    async fn rollback(self) -> Result<(), BoxError> {
        Ok(())
    }
}

#[async_trait]
impl Database for FakeDatabase {
    type Transaction = FakeTransaction;
    type Lock = OwnedMutexGuard<()>;

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, sql: &str, params: &[Param<'_>]) -> Result<u64, BoxError> {
        let mut state = guard(&self.shared.state);
        self.apply(&mut state, None, sql, params)
    }

    async fn begin(&self) -> Result<Self::Transaction, BoxError> {
        Ok(FakeTransaction {
            db: self.clone(),
            pending: State::default(),
        })
    }

    async fn table_exists(&self, table: &str) -> Result<bool, BoxError> {
        let state = guard(&self.shared.state);
        Ok(if table == TABLE {
            state.bootstrapped
        } else {
            state.tables.contains(table)
        })
    }

    async fn fetch_applied(&self, _select_sql: &str) -> Result<Vec<AppliedMigration>, BoxError> {
        let state = guard(&self.shared.state);
        if !state.bootstrapped {
            return Err(format!("relation \"{TABLE}\" does not exist").into());
        }
        Ok(state.audit.clone())
    }

    async fn acquire_lock(&self, name: &str, timeout: Duration) -> Result<Self::Lock, LockError> {
        let lock = Arc::clone(&self.shared.lock);
        tokio::time::timeout(timeout, lock.lock_owned())
            .await
            .map_err(|_| LockError::Timeout {
                name: name.to_string(),
                timeout,
            })
    }

    async fn release_lock(&self, lock: Self::Lock) -> Result<(), LockError> {
        drop(lock);
        *guard(&self.shared.releases) += 1;
        Ok(())
    }
}
