//! Accumulates series of steps from independent call sites.

use std::panic::Location;

use log::debug;

use crate::backend::Database;
use crate::step::Step;

/// The registered series, in registration order.
///
/// Each call to [`Registry::register`] adds one series. Series are progressed
/// independently: steps within a series apply in order, series relate to each
/// other only through prerequisite checks.
pub struct Registry<D: Database> {
    series: Vec<Vec<Step<D>>>,
}

impl<D: Database> Registry<D> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { series: Vec::new() }
    }

    /// Registers `steps` as a new series.
    ///
    /// Steps without an explicit origin are attributed to the caller's
    /// `file:line`.
    #[track_caller]
    pub fn register<I, S>(&mut self, steps: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Step<D>>,
    {
        let caller = Location::caller();
        self.push(steps, &format!("{}:{}", caller.file(), caller.line()), "")
    }

    /// Registers `steps` as a new series attributed to package `pkg`.
    ///
    /// The [`register!`](crate::register) macro calls this with the invoking
    /// module path.
    #[track_caller]
    pub fn register_in<I, S>(&mut self, pkg: &str, steps: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Step<D>>,
    {
        let caller = Location::caller();
        self.push(steps, &format!("{}:{}", caller.file(), caller.line()), pkg)
    }

    fn push<I, S>(&mut self, steps: I, file: &str, pkg: &str) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Step<D>>,
    {
        let steps: Vec<Step<D>> = steps
            .into_iter()
            .map(|step| {
                let mut step = step.into();
                step.set_default_origin(file, pkg);
                step
            })
            .collect();

        if steps.is_empty() {
            debug!("Ignoring empty migration series registered at {}", file);
        } else {
            self.series.push(steps);
        }
        self
    }

    /// Forgets every registered series.
    pub fn clear(&mut self) {
        self.series.clear();
    }

    /// Number of registered series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// True when nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// The registered series, in registration order.
    pub fn series(&self) -> impl Iterator<Item = &[Step<D>]> {
        self.series.iter().map(Vec::as_slice)
    }

    /// Every registered step, series by series.
    pub fn steps(&self) -> impl Iterator<Item = &Step<D>> {
        self.series.iter().flatten()
    }
}

impl<D: Database> Default for Registry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Database> Clone for Registry<D> {
    fn clone(&self) -> Self {
        Self {
            series: self.series.clone(),
        }
    }
}

/// Registers a series attributed to the invoking module.
///
/// ```rust,ignore
/// mig::register!(registry,
///     Step::prereq("select 1 from accounts"),
///     "alter table accounts add column closed_at timestamptz",
/// );
/// ```
#[macro_export]
macro_rules! register {
    ($registry:expr, $($step:expr),+ $(,)?) => {
        $registry.register_in(module_path!(), [$($crate::Step::from($step)),+])
    };
}
