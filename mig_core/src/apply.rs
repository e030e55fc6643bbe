//! Applies one step and its audit row as a single transaction.

use std::time::Instant;

use log::{info, warn};

use crate::audit;
use crate::backend::{BoxError, Database, Transaction};
use crate::error::MigrationError;
use crate::hash::first_line;
use crate::step::{Step, StepKind};

async fn abort<T: Transaction>(tx: T, step_hash: &str) {
    if let Err(err) = tx.rollback().await {
        warn!("Rollback of migration `{}` failed: {}", step_hash, err);
    }
}

/// Runs the effect of `step` and records it, committing both or neither.
///
/// Must not be called for prerequisite steps.
pub(crate) async fn apply_step<D: Database>(db: &D, step: &Step<D>) -> Result<(), MigrationError> {
    let mut tx = db.begin().await.map_err(|source| MigrationError::Begin {
        hash: step.hash().to_string(),
        source,
    })?;

    let start = Instant::now();
    info!("starting: {}", first_line(step.text()));
    let outcome: Result<(), BoxError> = match step.kind() {
        StepKind::Sql(text) => tx.execute(text, &[]).await.map(|_| ()),
        StepKind::Function { procedure, .. } => (**procedure)(&mut tx).await,
        StepKind::Prereq(_) => Err("prerequisite checks are never recorded".into()),
    };
    info!(
        "finished: {} ({:?})",
        first_line(step.text()),
        start.elapsed()
    );

    if let Err(source) = outcome {
        abort(tx, step.hash()).await;
        return Err(MigrationError::Execution {
            file: step.file().to_string(),
            hash: step.hash().to_string(),
            sql: step.text().to_string(),
            source,
        });
    }

    if let Err(source) = audit::record(db.dialect(), &mut tx, step).await {
        abort(tx, step.hash()).await;
        return Err(MigrationError::Record {
            file: step.file().to_string(),
            hash: step.hash().to_string(),
            sql: step.text().to_string(),
            source,
        });
    }

    tx.commit().await.map_err(|source| MigrationError::Commit {
        file: step.file().to_string(),
        hash: step.hash().to_string(),
        sql: step.text().to_string(),
        source,
    })
}
