//! Migration steps.
//!
//! A [`Step`] is one unit of change. Text steps are identified by the hash of
//! their normalized text, procedural steps by the label given at construction.
//!
//! Procedural steps cannot be content-hashed: two procedures registered under
//! the same label are treated as the same step, whatever they do. Once a label
//! has been applied to a database, changing the procedure behind it has no
//! effect there; register the new behavior under a new label instead.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::backend::{BoxError, Database};
use crate::hash::content_hash;

/// A programmatic change run inside the step's transaction.
pub type Procedure<D> = Arc<
    dyn for<'t> Fn(
            &'t mut <D as Database>::Transaction,
        ) -> BoxFuture<'t, Result<(), BoxError>>
        + Send
        + Sync,
>;

/// What a step does when it runs.
pub enum StepKind<D: Database> {
    /// Declarative change text, applied and recorded in one transaction.
    Sql(String),
    /// A labelled procedure, applied and recorded in one transaction.
    Function {
        /// Stable identifier, used verbatim as the step hash.
        label: String,
        /// The change itself.
        procedure: Procedure<D>,
    },
    /// A read-only check gating the rest of its series. Never recorded.
    Prereq(String),
}

impl<D: Database> Clone for StepKind<D> {
    fn clone(&self) -> Self {
        match self {
            StepKind::Sql(text) => StepKind::Sql(text.clone()),
            StepKind::Function { label, procedure } => StepKind::Function {
                label: label.clone(),
                procedure: Arc::clone(procedure),
            },
            StepKind::Prereq(text) => StepKind::Prereq(text.clone()),
        }
    }
}

/// One migration unit.
pub struct Step<D: Database> {
    kind: StepKind<D>,
    hash: String,
    file: String,
    pkg: String,
}

impl<D: Database> Step<D> {
    fn new(kind: StepKind<D>) -> Self {
        let hash = match &kind {
            StepKind::Sql(text) | StepKind::Prereq(text) => content_hash(text),
            StepKind::Function { label, .. } => label.clone(),
        };
        Self {
            kind,
            hash,
            file: String::new(),
            pkg: String::new(),
        }
    }

    /// A step applying `text`.
    pub fn sql(text: impl Into<String>) -> Self {
        Self::new(StepKind::Sql(text.into()))
    }

    /// A prerequisite check. If `text` fails to execute, the remaining steps
    /// of the series wait for a later pass.
    pub fn prereq(text: impl Into<String>) -> Self {
        Self::new(StepKind::Prereq(text.into()))
    }

    /// A procedural step identified by `label`.
    ///
    /// The label is stored verbatim as the step hash, so it may be at most
    /// [`MAX_HASH_LEN`](crate::MAX_HASH_LEN) characters; a run with a
    /// longer label fails with [`MigrationError::HashTooLong`] before anything
    /// executes.
    ///
    /// [`MigrationError::HashTooLong`]: crate::MigrationError::HashTooLong
    ///
    /// ```rust,ignore
    /// Step::function("double all rows", |tx| {
    ///     Box::pin(async move {
    ///         sqlx::query("insert into numbers(num) select num from numbers")
    ///             .execute(&mut **tx)
    ///             .await?;
    ///         Ok(())
    ///     })
    /// })
    /// ```
    pub fn function<F>(label: impl Into<String>, procedure: F) -> Self
    where
        F: for<'t> Fn(&'t mut D::Transaction) -> BoxFuture<'t, Result<(), BoxError>>
            + Send
            + Sync
            + 'static,
    {
        Self::new(StepKind::Function {
            label: label.into(),
            procedure: Arc::new(procedure),
        })
    }

    /// Overrides the provenance recorded for this step.
    pub fn with_origin(mut self, file: impl Into<String>, pkg: impl Into<String>) -> Self {
        self.file = file.into();
        self.pkg = pkg.into();
        self
    }

    pub(crate) fn set_default_origin(&mut self, file: &str, pkg: &str) {
        if self.file.is_empty() {
            self.file = file.to_string();
        }
        if self.pkg.is_empty() {
            self.pkg = pkg.to_string();
        }
    }

    /// The payload of the step.
    pub fn kind(&self) -> &StepKind<D> {
        &self.kind
    }

    /// The identity of the step in the applied-migration table.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// The step text, or the label of a procedural step.
    pub fn text(&self) -> &str {
        match &self.kind {
            StepKind::Sql(text) | StepKind::Prereq(text) => text,
            StepKind::Function { label, .. } => label,
        }
    }

    /// True for prerequisite checks.
    pub fn is_prereq(&self) -> bool {
        matches!(self.kind, StepKind::Prereq(_))
    }

    /// Where the step was registered (`file:line`).
    pub fn file(&self) -> &str {
        &self.file
    }

    /// The package that registered the step.
    pub fn pkg(&self) -> &str {
        &self.pkg
    }
}

impl<D: Database> Clone for Step<D> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            hash: self.hash.clone(),
            file: self.file.clone(),
            pkg: self.pkg.clone(),
        }
    }
}

impl<D: Database> fmt::Debug for Step<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            StepKind::Sql(_) => "sql",
            StepKind::Function { .. } => "function",
            StepKind::Prereq(_) => "prereq",
        };
        f.debug_struct("Step")
            .field("kind", &kind)
            .field("text", &self.text())
            .field("hash", &self.hash)
            .field("file", &self.file)
            .field("pkg", &self.pkg)
            .finish()
    }
}

impl<D: Database> From<&str> for Step<D> {
    fn from(text: &str) -> Self {
        Step::sql(text)
    }
}

impl<D: Database> From<String> for Step<D> {
    fn from(text: String) -> Self {
        Step::sql(text)
    }
}
