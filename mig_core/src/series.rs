//! Progression of a single series.

use std::collections::HashSet;

use log::{debug, info, warn};

use crate::apply::apply_step;
use crate::backend::Database;
use crate::error::{MigrationError, StalledSeries};
use crate::hash::first_line;
use crate::step::Step;

/// Result of one [`Series::try_progress`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Progress {
    /// The cursor moved.
    pub advanced: bool,
    /// Steps applied and recorded during the call.
    pub applied: usize,
}

/// An ordered list of steps with a cursor over them.
///
/// Every step before the cursor is either recorded in the applied-set or was
/// applied during this run. The cursor never moves backwards.
pub(crate) struct Series<'r, D: Database> {
    index: usize,
    steps: &'r [Step<D>],
    cursor: usize,
}

impl<'r, D: Database> Series<'r, D> {
    pub(crate) fn new(index: usize, steps: &'r [Step<D>]) -> Self {
        Self {
            index,
            steps,
            cursor: 0,
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.cursor >= self.steps.len()
    }

    /// Describes the step the series is waiting on, if any.
    pub(crate) fn stalled(&self) -> Option<StalledSeries> {
        let step = self.steps.get(self.cursor)?;
        Some(StalledSeries {
            index: self.index,
            step: self.cursor,
            text: first_line(step.text()),
            file: step.file().to_string(),
        })
    }

    /// Moves the cursor as far as it will go.
    ///
    /// Already applied steps are skipped. A failing prerequisite ends the call
    /// without error, leaving the cursor on the prerequisite so a later pass
    /// retries it. Any other failure is fatal.
    pub(crate) async fn try_progress(
        &mut self,
        db: &D,
        applied: &mut HashSet<String>,
    ) -> Result<Progress, MigrationError> {
        let mut progress = Progress::default();

        while let Some(step) = self.steps.get(self.cursor) {
            if applied.contains(step.hash()) {
                debug!("skipping applied migration `{}`", first_line(step.text()));
            } else if step.is_prereq() {
                info!("checking prerequisite: `{}`", first_line(step.text()));
                if let Err(err) = db.execute(step.text(), &[]).await {
                    warn!(
                        "prerequisite `{}` failed, trying next series: {}",
                        first_line(step.text()),
                        err
                    );
                    return Ok(progress);
                }
            } else {
                apply_step(db, step).await?;
                applied.insert(step.hash().to_string());
                progress.applied += 1;
            }

            self.cursor += 1;
            progress.advanced = true;
        }

        Ok(progress)
    }
}
