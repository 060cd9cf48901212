use std::fmt;
use std::rc::Rc;

/// Result type returned by job bodies. An `Err` aborts the current drain pass.
pub type JobResult<T = ()> = anyhow::Result<T>;

/// A one-shot unit of work. Never re-queued after it runs.
pub trait Task {
    fn execute(&self) -> JobResult;
}

/// A long-running job that performs one bounded chunk per call.
///
/// Returning `Ok(true)` asks for another turn at the tail of its priority's
/// ready queue; `Ok(false)` ends the job.
pub trait IncrementalTask {
    fn execute(&self) -> JobResult<bool>;
}

impl<F> Task for F
where
    F: Fn() -> JobResult,
{
    fn execute(&self) -> JobResult {
        self()
    }
}

impl<F> IncrementalTask for F
where
    F: Fn() -> JobResult<bool>,
{
    fn execute(&self) -> JobResult<bool> {
        self()
    }
}

/// Identity of a schedulable object: the address of its `Rc` allocation.
///
/// Stable for as long as any clone of the `Rc` is alive, which the scheduler
/// guarantees by holding one inside the job descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey(usize);

/// Anything the scheduler can run.
#[derive(Clone)]
pub enum Schedulable {
    Task(Rc<dyn Task>),
    Incremental(Rc<dyn IncrementalTask>),
}

impl Schedulable {
    pub fn task(task: Rc<dyn Task>) -> Self {
        Schedulable::Task(task)
    }

    pub fn incremental(task: Rc<dyn IncrementalTask>) -> Self {
        Schedulable::Incremental(task)
    }

    /// Wraps a closure as a one-shot task.
    pub fn task_fn<F>(f: F) -> Self
    where
        F: Fn() -> JobResult + 'static,
    {
        Schedulable::Task(Rc::new(f))
    }

    /// Wraps a closure as an incremental task.
    pub fn incremental_fn<F>(f: F) -> Self
    where
        F: Fn() -> JobResult<bool> + 'static,
    {
        Schedulable::Incremental(Rc::new(f))
    }

    pub fn key(&self) -> JobKey {
        let ptr = match self {
            Schedulable::Task(task) => Rc::as_ptr(task) as *const (),
            Schedulable::Incremental(task) => Rc::as_ptr(task) as *const (),
        };
        JobKey(ptr as usize)
    }

    pub fn is_incremental(&self) -> bool {
        matches!(self, Schedulable::Incremental(_))
    }

    /// Runs one unit of work and reports whether the job wants another turn.
    /// One-shot tasks always report `false`.
    pub(crate) fn run(&self) -> JobResult<bool> {
        match self {
            Schedulable::Task(task) => task.execute().map(|()| false),
            Schedulable::Incremental(task) => task.execute(),
        }
    }
}

impl From<Rc<dyn Task>> for Schedulable {
    fn from(task: Rc<dyn Task>) -> Self {
        Schedulable::Task(task)
    }
}

impl From<Rc<dyn IncrementalTask>> for Schedulable {
    fn from(task: Rc<dyn IncrementalTask>) -> Self {
        Schedulable::Incremental(task)
    }
}

impl fmt::Debug for Schedulable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Schedulable::Task(_) => "Task",
            Schedulable::Incremental(_) => "Incremental",
        };
        write!(f, "{}({:#x})", kind, self.key().0)
    }
}
