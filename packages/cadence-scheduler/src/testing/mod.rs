//! Deterministic stand-ins for host facilities, driven by a virtual clock.

use crate::error::Result;
use crate::idempotent::FinallyHost;
use crate::task::{IncrementalTask, JobKey, Schedulable};
use crate::timer::{HostTimer, HostTimerFactory, Millis, SliceCallback};
use crate::timer_service::TimerService;
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Default)]
struct FakeTimerInner {
    now: Cell<Millis>,
    scheduled: Cell<Option<Millis>>,
    callback: RefCell<Option<SliceCallback>>,
    registrations: Cell<usize>,
}

/// A host timer that only fires when told to.
///
/// Clones share one clock, so a job can advance time with `tick` to model
/// how long it ran.
#[derive(Clone, Default)]
pub struct FakeHostTimer {
    inner: Rc<FakeTimerInner>,
}

impl FakeHostTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time(&self) -> Millis {
        self.inner.now.get()
    }

    pub fn tick(&self, millis: Millis) {
        self.inner.now.set(self.inner.now.get() + millis);
    }

    /// The armed fire time, `None` when disarmed.
    pub fn scheduled_time(&self) -> Option<Millis> {
        self.inner.scheduled.get()
    }

    /// How many times `schedule` or `schedule_at` was called.
    pub fn registrations(&self) -> usize {
        self.inner.registrations.get()
    }

    /// Fires the callback if the timer is armed for now or earlier.
    /// Returns whether it fired.
    pub fn trigger(&self) -> Result<bool> {
        match self.inner.scheduled.get() {
            Some(when) if when <= self.time() => {}
            _ => return Ok(false),
        }
        self.inner.scheduled.set(None);

        let Some(mut callback) = self.inner.callback.borrow_mut().take() else {
            return Ok(false);
        };
        let outcome = callback();
        *self.inner.callback.borrow_mut() = Some(callback);
        outcome.map(|()| true)
    }

    pub fn trigger_after(&self, millis: Millis) -> Result<bool> {
        self.tick(millis);
        self.trigger()
    }

    fn arm(&self, when: Millis) {
        self.inner.scheduled.set(Some(when));
        self.inner
            .registrations
            .set(self.inner.registrations.get() + 1);
    }
}

impl HostTimer for FakeHostTimer {
    fn now(&self) -> Millis {
        self.time()
    }

    fn schedule(&self) {
        self.arm(self.time());
    }

    fn schedule_at(&self, when: Millis) {
        self.arm(when);
    }

    fn cancel(&self) {
        self.inner.scheduled.set(None);
    }

    fn scheduled_fire_time(&self) -> Option<Millis> {
        self.scheduled_time()
    }
}

impl HostTimerFactory for FakeHostTimer {
    fn create(&self, callback: SliceCallback) -> Box<dyn HostTimer> {
        let previous = self.inner.callback.borrow_mut().replace(callback);
        debug_assert!(previous.is_none(), "fake timer shared by two schedulers");
        Box::new(self.clone())
    }
}

struct Pending {
    job: Schedulable,
    interval: Millis,
}

/// A `TimerService` over a virtual clock.
///
/// Entries run in (due time, creation order), so tasks re-added at the same
/// time take turns.
#[derive(Default)]
pub struct FakeTimerService {
    now: Cell<Millis>,
    instances: Cell<u64>,
    queue: RefCell<BTreeMap<(Millis, u64), Pending>>,
    index: RefCell<FxHashMap<JobKey, (Millis, u64)>>,
}

impl FakeTimerService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.index.borrow().len()
    }

    /// Advances the clock by `millis`, running everything that comes due on
    /// the way. A failing task stops the tick.
    pub fn tick(&self, millis: Millis) -> Result<()> {
        let target = self.now.get() + millis;
        loop {
            let next = {
                let mut queue = self.queue.borrow_mut();
                let due = queue.first_key_value().map(|(&(due, _), _)| due);
                match due {
                    Some(due) if due <= target => queue.pop_first(),
                    _ => None,
                }
            };
            let Some(((due, _), entry)) = next else {
                break;
            };

            self.index.borrow_mut().remove(&entry.job.key());
            self.now.set(self.now.get().max(due));
            if entry.job.run()? && !self.is_scheduled(&entry.job) {
                self.insert(due + entry.interval, entry.interval, entry.job);
            }
        }
        self.now.set(target);
        Ok(())
    }

    fn insert(&self, due: Millis, interval: Millis, job: Schedulable) {
        self.cancel(&job);
        let instance = self.instances.get();
        self.instances.set(instance + 1);
        self.index.borrow_mut().insert(job.key(), (due, instance));
        self.queue
            .borrow_mut()
            .insert((due, instance), Pending { job, interval });
    }
}

impl TimerService for FakeTimerService {
    fn schedule(&self, job: Schedulable) -> Result<()> {
        self.insert(self.now.get(), 0, job);
        Ok(())
    }

    /// Incremental jobs come back every millisecond while they want more.
    fn schedule_delayed(&self, job: Schedulable, delay: Millis) -> Result<()> {
        let interval = if job.is_incremental() { 1 } else { 0 };
        self.insert(self.now.get() + delay, interval, job);
        Ok(())
    }

    fn schedule_repeating(
        &self,
        task: Rc<dyn IncrementalTask>,
        first_delay: Millis,
        interval: Millis,
    ) -> Result<()> {
        self.insert(
            self.now.get() + first_delay,
            interval,
            Schedulable::Incremental(task),
        );
        Ok(())
    }

    fn cancel(&self, job: &Schedulable) {
        let slot = self.index.borrow_mut().remove(&job.key());
        if let Some(slot) = slot {
            self.queue.borrow_mut().remove(&slot);
        }
    }

    fn is_scheduled(&self, job: &Schedulable) -> bool {
        self.index.borrow().contains_key(&job.key())
    }

    fn elapsed_millis(&self) -> Millis {
        self.now.get()
    }

    fn current_time_millis(&self) -> Millis {
        self.now.get()
    }
}

/// Collects finally commands until `flush` runs them.
#[derive(Default)]
pub struct FakeFinallyHost {
    commands: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl FakeFinallyHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.commands.borrow().len()
    }

    /// Runs queued commands, including ones queued while flushing.
    /// Returns how many ran.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        loop {
            let batch = std::mem::take(&mut *self.commands.borrow_mut());
            if batch.is_empty() {
                return ran;
            }
            for command in batch {
                command();
                ran += 1;
            }
        }
    }
}

impl FinallyHost for FakeFinallyHost {
    fn schedule_finally(&self, command: Box<dyn FnOnce()>) {
        self.commands.borrow_mut().push(command);
    }
}
