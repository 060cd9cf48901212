//! Administrative control over priority levels.
//!
//! A `Controller` can switch whole levels off and park individual jobs on
//! [`Priority::InternalSuppress`]. The scheduler consults it on every
//! scheduling call and every drain pass; after changing a controller's
//! settings call `BrowserBackedScheduler::resume` so the host timer reflects
//! them.

use crate::priority::Priority;
use crate::task::{JobKey, Schedulable};
use rustc_hash::FxHashSet;
use std::cell::{Cell, RefCell};

pub trait Controller {
    /// Whether jobs at `priority` may run. Disabled levels are skipped.
    fn is_runnable(&self, _priority: Priority) -> bool {
        true
    }

    /// Whether `job` should be parked instead of queued at `priority`.
    fn is_suppressed(&self, _priority: Priority, _job: &Schedulable) -> bool {
        false
    }

    /// A job entered the ready queue for `priority`.
    fn job_added(&self, _priority: Priority, _job: &Schedulable) {}

    /// A job left the ready queue for `priority`.
    fn job_removed(&self, _priority: Priority, _job: &Schedulable) {}
}

/// Runs everything, suppresses nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopController;

impl Controller for NoopController {}

/// Switchboard controller with per-level enable flags, per-job suppression
/// and live ready-queue counts.
#[derive(Debug, Default)]
pub struct Knobs {
    disabled: Cell<[bool; Priority::COUNT]>,
    suppressed: RefCell<FxHashSet<JobKey>>,
    counts: Cell<[usize; Priority::COUNT]>,
}

impl Knobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&self, priority: Priority, enabled: bool) {
        let mut disabled = self.disabled.get();
        disabled[priority.index()] = !enabled;
        self.disabled.set(disabled);
        tracing::debug!(%priority, enabled, "priority level toggled");
    }

    pub fn is_enabled(&self, priority: Priority) -> bool {
        !self.disabled.get()[priority.index()]
    }

    /// Parks `job` the next time it is scheduled.
    pub fn suppress(&self, job: &Schedulable) {
        self.suppressed.borrow_mut().insert(job.key());
    }

    pub fn unsuppress(&self, job: &Schedulable) {
        self.suppressed.borrow_mut().remove(&job.key());
    }

    /// Number of jobs currently waiting in the ready queue for `priority`.
    pub fn job_count(&self, priority: Priority) -> usize {
        self.counts.get()[priority.index()]
    }
}

impl Controller for Knobs {
    /// Parked jobs never run; they wait to be rescheduled after `unsuppress`.
    fn is_runnable(&self, priority: Priority) -> bool {
        priority != Priority::InternalSuppress && self.is_enabled(priority)
    }

    fn is_suppressed(&self, _priority: Priority, job: &Schedulable) -> bool {
        self.suppressed.borrow().contains(&job.key())
    }

    fn job_added(&self, priority: Priority, _job: &Schedulable) {
        let mut counts = self.counts.get();
        counts[priority.index()] += 1;
        self.counts.set(counts);
    }

    fn job_removed(&self, priority: Priority, _job: &Schedulable) {
        let mut counts = self.counts.get();
        counts[priority.index()] = counts[priority.index()].saturating_sub(1);
        self.counts.set(counts);
    }
}
