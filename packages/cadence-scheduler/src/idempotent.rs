//! Wrappers that coalesce repeated "schedule me" calls into a single pending
//! registration.

use crate::error::{Result, SchedulerError};
use crate::task::{IncrementalTask, JobResult, Schedulable, Task};
use crate::timer::Millis;
use crate::timer_service::TimerService;
use std::cell::Cell;
use std::rc::{Rc, Weak};

/// Keeps at most one repeating registration of a task on a `TimerService`.
///
/// The wrapper itself is the scheduled object, so its identity is what the
/// service sees in `is_scheduled` and `cancel`.
pub struct IdempotentScheduler {
    me: Weak<IdempotentScheduler>,
    timer: Rc<dyn TimerService>,
    task: Rc<dyn IncrementalTask>,
    delay: Cell<Millis>,
}

impl IdempotentScheduler {
    pub fn new(
        timer: Rc<dyn TimerService>,
        task: Rc<dyn IncrementalTask>,
        delay: Millis,
    ) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            timer,
            task,
            delay: Cell::new(delay),
        })
    }

    fn as_job(&self) -> Result<Rc<dyn IncrementalTask>> {
        let me = self
            .me
            .upgrade()
            .ok_or(SchedulerError::InvalidState("idempotent scheduler is being dropped"))?;
        Ok(me)
    }

    /// Registers with the service unless a registration is already pending.
    pub fn schedule(&self) -> Result<()> {
        let job = self.as_job()?;
        if self.timer.is_scheduled(&Schedulable::Incremental(job.clone())) {
            return Ok(());
        }
        let delay = self.delay.get();
        self.timer.schedule_repeating(job, delay, delay)
    }

    pub fn cancel(&self) {
        if let Ok(job) = self.as_job() {
            let job = Schedulable::Incremental(job);
            if self.timer.is_scheduled(&job) {
                self.timer.cancel(&job);
            }
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.as_job()
            .map(|job| self.timer.is_scheduled(&Schedulable::Incremental(job)))
            .unwrap_or(false)
    }

    /// Takes effect on the next fresh registration.
    pub fn set_delay(&self, delay: Millis) {
        self.delay.set(delay);
    }

    pub fn delay(&self) -> Millis {
        self.delay.get()
    }
}

impl IncrementalTask for IdempotentScheduler {
    fn execute(&self) -> JobResult<bool> {
        self.task.execute()
    }
}

/// Host primitive that runs a command once, after the current unit of work.
pub trait FinallyHost {
    fn schedule_finally(&self, command: Box<dyn FnOnce()>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinallyState {
    Idle,
    Pending,
}

/// A one-shot command bound to a `FinallyHost`.
///
/// `schedule` moves `Idle -> Pending` and `execute` moves it back before the
/// action runs. `cancel` returns to `Idle` without running anything; the
/// host registration stays outstanding and is skipped when it fires.
pub struct IdempotentFinally {
    me: Weak<IdempotentFinally>,
    host: Rc<dyn FinallyHost>,
    action: Rc<dyn Task>,
    state: Cell<FinallyState>,
    registered: Cell<bool>,
}

impl IdempotentFinally {
    pub fn new(host: Rc<dyn FinallyHost>, action: Rc<dyn Task>) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            host,
            action,
            state: Cell::new(FinallyState::Idle),
            registered: Cell::new(false),
        })
    }

    pub fn state(&self) -> FinallyState {
        self.state.get()
    }

    pub fn schedule(&self) {
        if self.state.get() == FinallyState::Pending {
            return;
        }
        self.state.set(FinallyState::Pending);

        // A cancelled registration that has not fired yet is reused.
        if self.registered.replace(true) {
            return;
        }
        let me = self.me.clone();
        self.host.schedule_finally(Box::new(move || {
            if let Some(this) = me.upgrade() {
                this.fire();
            }
        }));
    }

    pub fn cancel(&self) {
        self.state.set(FinallyState::Idle);
    }

    /// Runs the action. Only valid while pending.
    pub fn execute(&self) -> Result<()> {
        if self.state.get() != FinallyState::Pending {
            return Err(SchedulerError::InvalidState(
                "finally command executed without a pending schedule",
            ));
        }
        self.state.set(FinallyState::Idle);
        self.action.execute().map_err(SchedulerError::Job)
    }

    fn fire(&self) {
        self.registered.set(false);
        if self.state.get() != FinallyState::Pending {
            tracing::trace!("finally command was cancelled, skipping");
            return;
        }
        if let Err(err) = self.execute() {
            tracing::error!(error = %err, "finally command failed");
        }
    }
}
