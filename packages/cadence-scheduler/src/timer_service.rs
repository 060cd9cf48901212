use crate::Scheduler;
use crate::error::{Result, SchedulerError};
use crate::priority::Priority;
use crate::task::{IncrementalTask, Schedulable};
use crate::timer::Millis;
use std::rc::Rc;

/// A scheduler seen through a single priority level, plus a clock.
pub trait TimerService {
    fn schedule(&self, job: Schedulable) -> Result<()>;

    fn schedule_delayed(&self, job: Schedulable, delay: Millis) -> Result<()>;

    fn schedule_repeating(
        &self,
        task: Rc<dyn IncrementalTask>,
        first_delay: Millis,
        interval: Millis,
    ) -> Result<()>;

    fn cancel(&self, job: &Schedulable);

    fn is_scheduled(&self, job: &Schedulable) -> bool;

    /// Time since the service was created.
    fn elapsed_millis(&self) -> Millis;

    fn current_time_millis(&self) -> Millis;
}

/// Binds a `Scheduler` to one fixed priority.
pub struct SchedulerTimerService<S: Scheduler + ?Sized> {
    scheduler: Rc<S>,
    priority: Priority,
    created_at: Millis,
}

impl<S: Scheduler + ?Sized> SchedulerTimerService<S> {
    pub fn new(scheduler: Rc<S>, priority: Priority) -> Result<Self> {
        if !priority.is_usable() {
            return Err(SchedulerError::ReservedPriority(priority));
        }
        let created_at = scheduler.now();
        Ok(Self {
            scheduler,
            priority,
            created_at,
        })
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn scheduler(&self) -> &Rc<S> {
        &self.scheduler
    }
}

impl<S: Scheduler + ?Sized> TimerService for SchedulerTimerService<S> {
    fn schedule(&self, job: Schedulable) -> Result<()> {
        self.scheduler.schedule(self.priority, job)
    }

    fn schedule_delayed(&self, job: Schedulable, delay: Millis) -> Result<()> {
        self.scheduler.schedule_delayed(self.priority, job, delay)
    }

    fn schedule_repeating(
        &self,
        task: Rc<dyn IncrementalTask>,
        first_delay: Millis,
        interval: Millis,
    ) -> Result<()> {
        self.scheduler
            .schedule_repeating(self.priority, task, first_delay, interval)
    }

    fn cancel(&self, job: &Schedulable) {
        self.scheduler.cancel(job)
    }

    fn is_scheduled(&self, job: &Schedulable) -> bool {
        self.scheduler.is_scheduled(job)
    }

    fn elapsed_millis(&self) -> Millis {
        self.scheduler.now().saturating_sub(self.created_at)
    }

    fn current_time_millis(&self) -> Millis {
        self.scheduler.now()
    }
}
