use crate::Scheduler;
use crate::config::SchedulerConfig;
use crate::controller::{Controller, NoopController};
use crate::delayed::DelayedJobRegistry;
use crate::error::{Result, SchedulerError};
use crate::listener::{Listener, ListenerId, SlowJobLogger};
use crate::priority::Priority;
use crate::queue::ReadyQueues;
use crate::task::{IncrementalTask, JobKey, Schedulable};
use crate::task_info::{TaskId, TaskIdGenerator, TaskInfo};
use crate::timer::{HostTimer, HostTimerFactory, Millis};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// What the host timer is currently armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextSlice {
    Idle,
    Asap,
    At(Millis),
}

/// Where a live job's descriptor currently sits.
#[derive(Debug, Clone, Copy)]
struct Slot {
    id: TaskId,
    priority: Priority,
    delayed: bool,
}

/// The job whose `execute` is on the stack right now.
#[derive(Debug, Clone, Copy)]
struct Running {
    key: JobKey,
    cancelled: bool,
}

struct State {
    /// Every live job that is not running. Mirrors `ready` + `delayed`.
    slots: FxHashMap<JobKey, Slot>,
    ready: ReadyQueues,
    delayed: DelayedJobRegistry,
    ids: TaskIdGenerator,
    time_slice: Millis,
    next_slice: NextSlice,
    running: Option<Running>,
}

impl State {
    fn remove_job(&mut self, key: JobKey) -> Option<TaskInfo> {
        let slot = self.slots.remove(&key)?;
        if slot.delayed {
            self.delayed.remove(slot.id)
        } else {
            self.ready.remove(slot.priority, slot.id)
        }
    }

    fn enqueue_ready(&mut self, info: TaskInfo) {
        let slot = Slot {
            id: info.id(),
            priority: info.priority(),
            delayed: false,
        };
        self.slots.insert(info.job().key(), slot);
        self.ready.push(info);
    }

    fn enqueue_delayed(&mut self, info: TaskInfo) {
        let slot = Slot {
            id: info.id(),
            priority: info.priority(),
            delayed: true,
        };
        self.slots.insert(info.job().key(), slot);
        self.delayed.add(info);
    }

    /// Takes the head of `priority` and marks it as running.
    fn begin_unit(&mut self, priority: Priority) -> Option<TaskInfo> {
        let info = self.ready.pop(priority)?;
        let key = info.job().key();
        self.slots.remove(&key);
        self.running = Some(Running {
            key,
            cancelled: false,
        });
        Some(info)
    }

    fn next_run(&self) -> NextSlice {
        if self.ready.has_runnable() {
            NextSlice::Asap
        } else {
            match self.delayed.next_due_time() {
                Some(when) => NextSlice::At(when),
                None => NextSlice::Idle,
            }
        }
    }
}

/// Priority scheduler driven by a single host timer.
///
/// Each timer callback runs one drain pass: due delayed jobs move to their
/// ready queues, then queues drain from `Critical` down to `Low` until the
/// time slice is spent. `Critical` ignores the slice, and one non-Critical
/// job always runs per pass so a zero slice still makes progress. Afterwards
/// the timer is re-armed for the next moment anything needs attention.
pub struct BrowserBackedScheduler {
    timer: Box<dyn HostTimer>,
    controller: Rc<dyn Controller>,
    state: RefCell<State>,
    listeners: RefCell<SlotMap<ListenerId, Rc<dyn Listener>>>,
}

impl BrowserBackedScheduler {
    pub fn new(timers: &dyn HostTimerFactory) -> Rc<Self> {
        Self::with_config(timers, SchedulerConfig::default(), Rc::new(NoopController))
    }

    pub fn with_config(
        timers: &dyn HostTimerFactory,
        config: SchedulerConfig,
        controller: Rc<dyn Controller>,
    ) -> Rc<Self> {
        let scheduler = Rc::new_cyclic(|me: &Weak<Self>| {
            let me = me.clone();
            let timer = timers.create(Box::new(move || match me.upgrade() {
                Some(scheduler) => scheduler.run_slice(),
                None => Ok(()),
            }));

            Self {
                timer,
                controller: controller.clone(),
                state: RefCell::new(State {
                    slots: FxHashMap::default(),
                    ready: ReadyQueues::new(controller),
                    delayed: DelayedJobRegistry::new(),
                    ids: TaskIdGenerator::new(),
                    time_slice: config.time_slice_ms,
                    next_slice: NextSlice::Idle,
                    running: None,
                }),
                listeners: RefCell::new(SlotMap::with_key()),
            }
        });

        if let Some(threshold) = config.slow_job_threshold_ms {
            scheduler.add_listener(Rc::new(SlowJobLogger::new(threshold)));
        }

        tracing::debug!(time_slice = config.time_slice_ms, "scheduler created");
        scheduler
    }

    /// Sets the budget of a drain pass for every level below `Critical`.
    pub fn set_time_slice(&self, millis: Millis) {
        self.state.borrow_mut().time_slice = millis;
    }

    pub fn time_slice(&self) -> Millis {
        self.state.borrow().time_slice
    }

    /// True when no job is queued or waiting anywhere.
    pub fn debug_is_clear(&self) -> bool {
        let state = self.state.borrow();
        state.slots.is_empty() && state.ready.is_empty() && state.delayed.is_empty()
    }

    /// Re-arms the host timer after a controller change.
    pub fn resume(&self) {
        let mut state = self.state.borrow_mut();
        self.arm_for_next_run(&mut state);
    }

    /// One drain pass. Installed as the host timer callback.
    ///
    /// A failing job aborts the pass and its error is returned, after the
    /// timer has been re-armed for whatever work remains.
    pub fn run_slice(&self) -> Result<()> {
        self.state.borrow_mut().next_slice = NextSlice::Idle;
        let outcome = self.work_slice();

        let mut state = self.state.borrow_mut();
        self.arm_for_next_run(&mut state);
        outcome
    }

    fn work_slice(&self) -> Result<()> {
        let now = self.timer.now();
        let time_slice = {
            let mut state = self.state.borrow_mut();
            while let Some(info) = state.delayed.pop_due(now) {
                tracing::trace!(id = %info.id(), priority = %info.priority(), "delayed job due");
                state.enqueue_ready(info);
            }
            state.time_slice
        };

        let mut elapsed: Millis = 0;
        let mut executed = 0usize;
        // The first non-Critical unit of a pass always runs, whatever the budget.
        let mut throttled_runs = 0usize;
        for priority in Priority::ALL {
            if !self.controller.is_runnable(priority) {
                continue;
            }

            loop {
                let info = {
                    let mut state = self.state.borrow_mut();
                    if state.ready.is_empty_at(priority) {
                        break;
                    }
                    if priority != Priority::Critical
                        && throttled_runs > 0
                        && elapsed >= time_slice
                    {
                        tracing::debug!(executed, elapsed, "time slice spent, deferring");
                        return Ok(());
                    }
                    match state.begin_unit(priority) {
                        Some(info) => info,
                        None => break,
                    }
                };

                elapsed = elapsed.saturating_add(self.work_unit(info)?);
                executed += 1;
                if priority != Priority::Critical {
                    throttled_runs += 1;
                }
            }
        }

        tracing::debug!(executed, elapsed, "ready queues drained");
        Ok(())
    }

    /// Runs one job and decides where its descriptor goes next.
    /// Returns the time the job took.
    fn work_unit(&self, info: TaskInfo) -> Result<Millis> {
        let job = info.job().clone();
        let start = self.timer.now();
        let outcome = job.run();
        let spent = self.timer.now().saturating_sub(start);

        match outcome {
            Ok(wants_more) => self.finish_unit(info, wants_more, start),
            Err(err) => {
                self.state.borrow_mut().running = None;
                tracing::warn!(?job, error = %err, "job failed, aborting drain pass");
                self.notify(&job, spent);
                return Err(SchedulerError::Job(err));
            }
        }

        self.notify(&job, spent);
        Ok(spent)
    }

    fn finish_unit(&self, mut info: TaskInfo, wants_more: bool, start: Millis) {
        let mut state = self.state.borrow_mut();
        let cancelled = state.running.take().is_some_and(|running| running.cancelled);
        // Re-scheduled from inside its own execute: the new descriptor wins.
        let superseded = state.slots.contains_key(&info.job().key());

        if !wants_more || cancelled || superseded {
            tracing::trace!(id = %info.id(), cancelled, superseded, "job finished");
            drop(state);
            drop(info);
            return;
        }

        if info.calculate_next_execute_time(start) {
            tracing::trace!(id = %info.id(), due = info.due_time(), "repeating job re-registered");
            state.enqueue_delayed(info);
        } else {
            state.enqueue_ready(info);
        }
    }

    fn notify(&self, job: &Schedulable, spent: Millis) {
        let listeners: SmallVec<[Rc<dyn Listener>; 4]> =
            self.listeners.borrow().values().cloned().collect();
        for listener in listeners {
            listener.on_job_executed(job, spent);
        }
    }

    fn effective_priority(&self, priority: Priority, job: &Schedulable) -> Priority {
        if priority != Priority::InternalSuppress && self.controller.is_suppressed(priority, job) {
            tracing::debug!(?job, %priority, "job suppressed");
            Priority::InternalSuppress
        } else {
            priority
        }
    }

    fn schedule_job(&self, priority: Priority, job: Schedulable) {
        let priority = self.effective_priority(priority, &job);
        let key = job.key();

        let mut state = self.state.borrow_mut();
        let current = state.slots.get(&key).map(|slot| slot.priority);
        let replaced = match current {
            Some(current) if current == priority => return,
            Some(_) => state.remove_job(key),
            None => None,
        };

        let id = state.ids.next_id();
        tracing::trace!(%id, %priority, ?job, "job scheduled");
        state.enqueue_ready(TaskInfo::immediate(id, priority, job));
        self.maybe_schedule_slice(&mut state);
        drop(state);
        drop(replaced);
    }

    fn schedule_delayed_job(
        &self,
        priority: Priority,
        job: Schedulable,
        delay: Millis,
        interval: Millis,
    ) {
        let priority = self.effective_priority(priority, &job);
        let now = self.timer.now();

        let mut state = self.state.borrow_mut();
        let replaced = state.remove_job(job.key());

        let id = state.ids.next_id();
        let info = TaskInfo::repeating(id, priority, now, delay, interval, job);
        let due = info.due_time();
        tracing::trace!(%id, %priority, due, interval, "delayed job scheduled");
        state.enqueue_delayed(info);
        self.maybe_schedule_slice_at(&mut state, due);
        drop(state);
        drop(replaced);
    }

    fn arm_for_next_run(&self, state: &mut State) {
        match state.next_run() {
            NextSlice::Asap => self.maybe_schedule_slice(state),
            NextSlice::At(when) => self.maybe_schedule_slice_at(state, when),
            NextSlice::Idle => {}
        }
    }

    /// Ensures a slice runs at the next opportunity.
    fn maybe_schedule_slice(&self, state: &mut State) {
        if state.next_slice != NextSlice::Asap {
            tracing::trace!("slice requested as soon as possible");
            self.timer.schedule();
            state.next_slice = NextSlice::Asap;
        }
    }

    /// Ensures a slice runs no later than `when`.
    fn maybe_schedule_slice_at(&self, state: &mut State, when: Millis) {
        let earlier = match state.next_slice {
            NextSlice::Idle => true,
            NextSlice::Asap => false,
            NextSlice::At(armed) => when < armed,
        };
        if earlier {
            tracing::trace!(when, "slice requested");
            self.timer.schedule_at(when);
            state.next_slice = NextSlice::At(when);
        }
    }

    fn unschedule_slice(&self, state: &mut State) {
        state.next_slice = NextSlice::Idle;
        self.timer.cancel();
    }
}

fn ensure_usable(priority: Priority) -> Result<()> {
    if priority.is_usable() {
        Ok(())
    } else {
        Err(SchedulerError::ReservedPriority(priority))
    }
}

impl Scheduler for BrowserBackedScheduler {
    fn schedule(&self, priority: Priority, job: Schedulable) -> Result<()> {
        ensure_usable(priority)?;
        self.schedule_job(priority, job);
        Ok(())
    }

    fn schedule_delayed(&self, priority: Priority, job: Schedulable, delay: Millis) -> Result<()> {
        ensure_usable(priority)?;
        self.schedule_delayed_job(priority, job, delay, 0);
        Ok(())
    }

    fn schedule_repeating(
        &self,
        priority: Priority,
        task: Rc<dyn IncrementalTask>,
        first_delay: Millis,
        interval: Millis,
    ) -> Result<()> {
        ensure_usable(priority)?;
        let job = Schedulable::Incremental(task);
        if first_delay == 0 && interval == 0 {
            self.schedule_job(priority, job);
        } else {
            self.schedule_delayed_job(priority, job, first_delay, interval);
        }
        Ok(())
    }

    fn cancel(&self, job: &Schedulable) {
        let key = job.key();
        let mut state = self.state.borrow_mut();
        if let Some(running) = state.running.as_mut() {
            if running.key == key {
                running.cancelled = true;
            }
        }

        let removed = state.remove_job(key);
        if let Some(info) = &removed {
            tracing::trace!(id = %info.id(), "job cancelled");
            if state.slots.is_empty() {
                self.unschedule_slice(&mut state);
            }
        }
        drop(state);
        drop(removed);
    }

    fn is_scheduled(&self, job: &Schedulable) -> bool {
        self.state.borrow().slots.contains_key(&job.key())
    }

    fn add_listener(&self, listener: Rc<dyn Listener>) -> ListenerId {
        self.listeners.borrow_mut().insert(listener)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.borrow_mut().remove(id);
    }

    fn now(&self) -> Millis {
        self.timer.now()
    }
}

impl fmt::Display for BrowserBackedScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        write!(
            f,
            "Scheduler[ids: {}, {}, {}]",
            state.slots.len(),
            state.ready,
            state.delayed
        )
    }
}
