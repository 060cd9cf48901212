use crate::priority::Priority;
use crate::task::Schedulable;
use crate::timer::Millis;
use std::fmt;

/// Opaque identifier of a job descriptor. Unique for the lifetime of the
/// generator that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Issues `TaskId`s. Owned by the scheduler, one counter per instance.
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    next: u64,
}

impl TaskIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> TaskId {
        let id = TaskId(self.next);
        self.next += 1;
        id
    }
}

/// Scheduling metadata for one live job.
pub struct TaskInfo {
    id: TaskId,
    priority: Priority,
    job: Schedulable,
    /// Phase of a repeating job: every due time is `start_time + k * interval`.
    start_time: Millis,
    due_time: Millis,
    /// `None` for immediate and one-shot delayed jobs.
    interval: Option<Millis>,
}

impl TaskInfo {
    /// A descriptor that is due right away.
    pub fn immediate(id: TaskId, priority: Priority, job: Schedulable) -> Self {
        Self {
            id,
            priority,
            job,
            start_time: 0,
            due_time: 0,
            interval: None,
        }
    }

    /// A descriptor due once, `delay` after `created_at`.
    pub fn delayed(
        id: TaskId,
        priority: Priority,
        created_at: Millis,
        delay: Millis,
        job: Schedulable,
    ) -> Self {
        Self::repeating(id, priority, created_at, delay, 0, job)
    }

    /// A descriptor first due `delay` after `created_at`, then every `interval`.
    /// An interval of zero means the job does not recur.
    pub fn repeating(
        id: TaskId,
        priority: Priority,
        created_at: Millis,
        delay: Millis,
        interval: Millis,
        job: Schedulable,
    ) -> Self {
        let start_time = created_at.saturating_add(delay);
        Self {
            id,
            priority,
            job,
            start_time,
            due_time: start_time,
            interval: (interval > 0).then_some(interval),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn job(&self) -> &Schedulable {
        &self.job
    }

    pub fn due_time(&self) -> Millis {
        self.due_time
    }

    pub fn interval(&self) -> Option<Millis> {
        self.interval
    }

    pub fn is_repeating(&self) -> bool {
        self.interval.is_some()
    }

    /// Moves `due_time` to the first phase point strictly after `now`.
    ///
    /// Missed intervals are skipped rather than owed, so a job starved for
    /// several periods still runs once per lookup. Returns `false` and leaves
    /// the descriptor untouched when it does not recur.
    pub fn calculate_next_execute_time(&mut self, now: Millis) -> bool {
        let Some(interval) = self.interval else {
            return false;
        };

        self.due_time = if now < self.start_time {
            self.start_time
        } else {
            let periods = (now - self.start_time) / interval + 1;
            self.start_time.saturating_add(periods.saturating_mul(interval))
        };
        true
    }
}

impl fmt::Debug for TaskInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskInfo")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("job", &self.job)
            .field("due_time", &self.due_time)
            .field("interval", &self.interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Schedulable {
        Schedulable::incremental_fn(|| Ok(true))
    }

    #[test]
    fn ids_are_never_reused() {
        let mut ids = TaskIdGenerator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "task-0");
    }

    #[test]
    fn delayed_descriptor_does_not_recur() {
        let mut ids = TaskIdGenerator::new();
        let mut info = TaskInfo::delayed(ids.next_id(), Priority::Low, 10, 40, job());
        assert_eq!(info.due_time(), 50);
        assert!(!info.calculate_next_execute_time(50));
        assert_eq!(info.due_time(), 50);
    }

    #[test]
    fn next_time_is_strictly_after_now() {
        let mut ids = TaskIdGenerator::new();
        let mut info = TaskInfo::repeating(ids.next_id(), Priority::Low, 0, 0, 50, job());

        assert!(info.calculate_next_execute_time(0));
        assert_eq!(info.due_time(), 50);

        assert!(info.calculate_next_execute_time(50));
        assert_eq!(info.due_time(), 100);

        assert!(info.calculate_next_execute_time(73));
        assert_eq!(info.due_time(), 100);
    }

    #[test]
    fn starved_job_skips_missed_intervals() {
        let mut ids = TaskIdGenerator::new();
        let mut info = TaskInfo::repeating(ids.next_id(), Priority::Low, 0, 0, 5, job());

        assert!(info.calculate_next_execute_time(100));
        assert_eq!(info.due_time(), 105);
    }

    #[test]
    fn keeps_original_phase() {
        let mut ids = TaskIdGenerator::new();
        let mut info = TaskInfo::repeating(ids.next_id(), Priority::High, 3, 7, 20, job());
        assert_eq!(info.due_time(), 10);

        assert!(info.calculate_next_execute_time(4));
        assert_eq!(info.due_time(), 10);

        assert!(info.calculate_next_execute_time(31));
        assert_eq!(info.due_time(), 50);
    }
}
