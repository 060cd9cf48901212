use crate::controller::Controller;
use crate::priority::Priority;
use crate::task_info::{TaskId, TaskInfo};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// One FIFO queue of ready descriptors per priority level.
///
/// Every push and removal is reported to the controller so it can keep
/// per-level counts.
pub struct ReadyQueues {
    queues: [VecDeque<TaskInfo>; Priority::COUNT],
    controller: Rc<dyn Controller>,
}

impl ReadyQueues {
    pub fn new(controller: Rc<dyn Controller>) -> Self {
        Self {
            queues: Default::default(),
            controller,
        }
    }

    /// Appends `info` to the tail of its own priority's queue.
    pub fn push(&mut self, info: TaskInfo) {
        let priority = info.priority();
        self.controller.job_added(priority, info.job());
        self.queues[priority.index()].push_back(info);
    }

    pub fn pop(&mut self, priority: Priority) -> Option<TaskInfo> {
        let info = self.queues[priority.index()].pop_front()?;
        self.controller.job_removed(priority, info.job());
        Some(info)
    }

    /// Pulls a specific descriptor out of the middle of a queue.
    pub fn remove(&mut self, priority: Priority, id: TaskId) -> Option<TaskInfo> {
        let queue = &mut self.queues[priority.index()];
        let position = queue.iter().position(|info| info.id() == id)?;
        let info = queue.remove(position)?;
        self.controller.job_removed(priority, info.job());
        Some(info)
    }

    pub fn len(&self, priority: Priority) -> usize {
        self.queues[priority.index()].len()
    }

    pub fn is_empty_at(&self, priority: Priority) -> bool {
        self.queues[priority.index()].is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(VecDeque::is_empty)
    }

    /// Whether any level the controller lets run has work waiting.
    pub fn has_runnable(&self) -> bool {
        Priority::ALL
            .iter()
            .any(|&p| !self.is_empty_at(p) && self.controller.is_runnable(p))
    }
}

impl fmt::Display for ReadyQueues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ready[")?;
        for (i, priority) in Priority::ALL.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", priority, self.len(*priority))?;
        }
        f.write_str("]")
    }
}
