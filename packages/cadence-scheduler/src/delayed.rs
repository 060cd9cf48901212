use crate::task_info::{TaskId, TaskInfo};
use crate::timer::Millis;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fmt;

/// Jobs that are not due yet, indexed by id and ordered by due time.
///
/// Entries sharing a due time come out in insertion order: every `add` takes
/// a fresh sequence number that breaks the tie.
#[derive(Default)]
pub struct DelayedJobRegistry {
    jobs: FxHashMap<TaskId, (u64, TaskInfo)>,
    by_due: BTreeSet<(Millis, u64, TaskId)>,
    next_seq: u64,
}

impl DelayedJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a descriptor. An entry already registered under the same id is
    /// replaced.
    pub fn add(&mut self, info: TaskInfo) {
        debug_assert!(
            !self.has(info.id()),
            "{} added to the delayed registry twice",
            info.id()
        );
        self.remove(info.id());

        let seq = self.next_seq;
        self.next_seq += 1;

        tracing::trace!(id = %info.id(), due = info.due_time(), "delayed job registered");
        self.by_due.insert((info.due_time(), seq, info.id()));
        self.jobs.insert(info.id(), (seq, info));
    }

    /// Removes and returns the descriptor for `id`. Absent ids are ignored.
    pub fn remove(&mut self, id: TaskId) -> Option<TaskInfo> {
        let (seq, info) = self.jobs.remove(&id)?;
        self.by_due.remove(&(info.due_time(), seq, id));
        Some(info)
    }

    pub fn has(&self, id: TaskId) -> bool {
        self.jobs.contains_key(&id)
    }

    /// Earliest due time across all entries.
    pub fn next_due_time(&self) -> Option<Millis> {
        self.by_due.first().map(|&(due, _, _)| due)
    }

    /// Removes and returns one entry due at or before `time`.
    ///
    /// Yields at most one entry per call; call repeatedly to drain.
    pub fn pop_due(&mut self, time: Millis) -> Option<TaskInfo> {
        let &(due, _, id) = self.by_due.first()?;
        if due > time {
            return None;
        }
        self.remove(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl fmt::Display for DelayedJobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Delayed[count: {}", self.len())?;
        if let Some(next) = self.next_due_time() {
            write!(f, ", next: {}", next)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::Priority;
    use crate::task::Schedulable;
    use crate::task_info::TaskIdGenerator;

    fn delayed(ids: &mut TaskIdGenerator, due: Millis) -> TaskInfo {
        TaskInfo::delayed(
            ids.next_id(),
            Priority::Low,
            0,
            due,
            Schedulable::task_fn(|| Ok(())),
        )
    }

    #[test]
    fn empty_registry() {
        let mut registry = DelayedJobRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.next_due_time(), None);
        assert!(registry.pop_due(u64::MAX).is_none());
    }

    #[test]
    fn tracks_earliest_due_time() {
        let mut ids = TaskIdGenerator::new();
        let mut registry = DelayedJobRegistry::new();

        registry.add(delayed(&mut ids, 50));
        assert_eq!(registry.next_due_time(), Some(50));
        registry.add(delayed(&mut ids, 60));
        assert_eq!(registry.next_due_time(), Some(50));
        let early = delayed(&mut ids, 40);
        let early_id = early.id();
        registry.add(early);
        assert_eq!(registry.next_due_time(), Some(40));

        assert!(registry.remove(early_id).is_some());
        assert_eq!(registry.next_due_time(), Some(50));
    }

    #[test]
    fn removing_absent_id_is_harmless() {
        let mut ids = TaskIdGenerator::new();
        let mut registry = DelayedJobRegistry::new();
        let info = delayed(&mut ids, 5);
        let id = info.id();
        registry.add(info);

        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(!registry.has(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn pops_one_due_entry_per_call() {
        let mut ids = TaskIdGenerator::new();
        let mut registry = DelayedJobRegistry::new();
        let first = delayed(&mut ids, 10);
        let second = delayed(&mut ids, 10);
        let late = delayed(&mut ids, 30);
        let (first_id, second_id) = (first.id(), second.id());
        registry.add(first);
        registry.add(second);
        registry.add(late);

        assert!(registry.pop_due(9).is_none());
        assert_eq!(registry.pop_due(20).map(|i| i.id()), Some(first_id));
        assert_eq!(registry.pop_due(20).map(|i| i.id()), Some(second_id));
        assert!(registry.pop_due(20).is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.to_string(), "Delayed[count: 1, next: 30]");
    }
}
