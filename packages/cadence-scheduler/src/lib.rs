pub mod config;
pub mod controller;
pub mod delayed;
pub mod error;
pub mod idempotent;
pub mod listener;
pub mod priority;
pub mod queue;
pub mod scheduler;
pub mod task;
pub mod task_info;
pub mod testing;
pub mod timer;
pub mod timer_service;

use std::rc::Rc;

/// The public scheduling API.
///
/// All methods take `&self`: jobs call back into the scheduler from inside
/// their own `execute`, so implementations keep their state behind interior
/// mutability and never hold a borrow across a job.
pub trait Scheduler {
    /// Queue `job` at the tail of `priority`. Re-scheduling a live job moves
    /// it to the new level; the same level is a no-op.
    fn schedule(&self, priority: Priority, job: Schedulable) -> Result<()>;

    /// Run `job` once, no earlier than `delay` from now. Calling again on a
    /// pending job restarts the delay from the new call.
    fn schedule_delayed(&self, priority: Priority, job: Schedulable, delay: Millis) -> Result<()>;

    /// Run `task` first after `first_delay`, then every `interval` for as long
    /// as it keeps returning `true`.
    fn schedule_repeating(
        &self,
        priority: Priority,
        task: Rc<dyn IncrementalTask>,
        first_delay: Millis,
        interval: Millis,
    ) -> Result<()>;

    /// Drop `job` wherever it is. Cancelling the running job suppresses its
    /// re-queue.
    fn cancel(&self, job: &Schedulable);

    /// True while `job` waits in a queue. A running job is not scheduled.
    fn is_scheduled(&self, job: &Schedulable) -> bool;

    fn add_listener(&self, listener: Rc<dyn Listener>) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);

    /// Current host time.
    fn now(&self) -> Millis;
}

pub use config::SchedulerConfig;
pub use controller::{Controller, Knobs, NoopController};
pub use delayed::DelayedJobRegistry;
pub use error::{Result, SchedulerError};
pub use idempotent::{FinallyHost, FinallyState, IdempotentFinally, IdempotentScheduler};
pub use listener::{ExecutionStats, Listener, ListenerId, SchedulerMetrics, SlowJobLogger};
pub use priority::Priority;
pub use queue::ReadyQueues;
pub use scheduler::BrowserBackedScheduler;
pub use task::{IncrementalTask, JobKey, JobResult, Schedulable, Task};
pub use task_info::{TaskId, TaskIdGenerator, TaskInfo};
pub use timer::{HostTimer, HostTimerFactory, Millis, SliceCallback};
pub use timer_service::{SchedulerTimerService, TimerService};
