//! Drives every registered series to a fixed point.

use std::collections::HashSet;

use log::debug;

use crate::backend::Database;
use crate::error::MigrationError;
use crate::registry::Registry;
use crate::series::Series;

/// Gives each unfinished series a turn, pass after pass, until all are done.
///
/// A pass in which no cursor moves while some series are unfinished means no
/// remaining prerequisite can ever pass, which is reported as
/// [`MigrationError::Deadlock`]. Each productive pass advances at least one
/// cursor, so the loop terminates. Returns the number of applied steps.
pub(crate) async fn run_to_fixed_point<D: Database>(
    db: &D,
    registry: &Registry<D>,
    applied: &mut HashSet<String>,
) -> Result<usize, MigrationError> {
    let mut series: Vec<Series<'_, D>> = registry
        .series()
        .enumerate()
        .map(|(index, steps)| Series::new(index, steps))
        .collect();
    let mut total = 0;
    let mut pass = 0;

    loop {
        pass += 1;
        let mut advanced = false;
        for s in series.iter_mut().filter(|s| !s.is_done()) {
            let progress = s.try_progress(db, applied).await?;
            advanced |= progress.advanced;
            total += progress.applied;
        }

        let remaining = series.iter().filter(|s| !s.is_done()).count();
        debug!("migration pass {pass}: {total} applied, {remaining} series unfinished");

        if remaining == 0 {
            return Ok(total);
        }
        if !advanced {
            return Err(MigrationError::Deadlock {
                stalled: series.iter().filter_map(Series::stalled).collect(),
            });
        }
    }
}
