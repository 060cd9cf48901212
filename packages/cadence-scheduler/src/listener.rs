//! Diagnostics hooks fired after every executed job.
//!
//! Listeners observe; they never influence scheduling decisions.

use crate::task::Schedulable;
use crate::timer::Millis;
use std::cell::{Cell, RefCell};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    /// Handle returned by `add_listener`, used to remove the listener again.
    pub struct ListenerId;
}

pub trait Listener {
    fn on_job_executed(&self, job: &Schedulable, time_spent: Millis);
}

impl<F> Listener for F
where
    F: Fn(&Schedulable, Millis),
{
    fn on_job_executed(&self, job: &Schedulable, time_spent: Millis) {
        self(job, time_spent)
    }
}

/// Warns about jobs that hold the thread longer than a threshold.
#[derive(Debug, Clone, Copy)]
pub struct SlowJobLogger {
    threshold: Millis,
}

impl SlowJobLogger {
    pub fn new(threshold: Millis) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Millis {
        self.threshold
    }
}

impl Listener for SlowJobLogger {
    fn on_job_executed(&self, job: &Schedulable, time_spent: Millis) {
        if time_spent > self.threshold {
            tracing::warn!(
                ?job,
                time_spent,
                threshold = self.threshold,
                "job took too long"
            );
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SchedulerMetrics {
    pub total_jobs_executed: u64,
    pub total_time_ms: Millis,
    pub average_latency_ms: f64,
    pub slowest_job_ms: Millis,
}

/// Running counters over every job the scheduler reports.
#[derive(Debug, Default)]
pub struct ExecutionStats {
    executed: Cell<u64>,
    total_time: Cell<Millis>,
    slowest: Cell<Millis>,
    last_slowest: RefCell<Option<String>>,
}

impl ExecutionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SchedulerMetrics {
        let executed = self.executed.get();
        let total = self.total_time.get();
        SchedulerMetrics {
            total_jobs_executed: executed,
            total_time_ms: total,
            average_latency_ms: if executed == 0 {
                0.0
            } else {
                total as f64 / executed as f64
            },
            slowest_job_ms: self.slowest.get(),
        }
    }

    /// Debug description of the slowest job seen so far.
    pub fn slowest_job(&self) -> Option<String> {
        self.last_slowest.borrow().clone()
    }

    pub fn reset(&self) {
        self.executed.set(0);
        self.total_time.set(0);
        self.slowest.set(0);
        self.last_slowest.borrow_mut().take();
    }

    #[cfg(feature = "serialize")]
    pub fn export(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_default()
    }
}

impl Listener for ExecutionStats {
    fn on_job_executed(&self, job: &Schedulable, time_spent: Millis) {
        self.executed.set(self.executed.get() + 1);
        self.total_time
            .set(self.total_time.get().saturating_add(time_spent));
        if time_spent >= self.slowest.get() {
            self.slowest.set(time_spent);
            *self.last_slowest.borrow_mut() = Some(format!("{:?}", job));
        }
    }
}
