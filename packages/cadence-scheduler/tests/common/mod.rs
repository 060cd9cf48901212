#![allow(dead_code)]

use cadence_scheduler::testing::FakeHostTimer;
use cadence_scheduler::{
    BrowserBackedScheduler, Millis, NoopController, Schedulable, SchedulerConfig,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

pub type Log = Rc<RefCell<Vec<String>>>;

/// Routes scheduler traces to the test output. Set `RUST_LOG=trace` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn setup(time_slice: Millis) -> (FakeHostTimer, Rc<BrowserBackedScheduler>, Log) {
    init_tracing();
    let timer = FakeHostTimer::new();
    let scheduler = BrowserBackedScheduler::with_config(
        &timer,
        SchedulerConfig::default().with_time_slice(time_slice),
        Rc::new(NoopController),
    );
    (timer, scheduler, Rc::new(RefCell::new(Vec::new())))
}

/// A one-shot task that logs its name and holds the clock for `duration`.
pub fn fake_task(timer: &FakeHostTimer, log: &Log, name: &str, duration: Millis) -> Schedulable {
    let (timer, log, name) = (timer.clone(), log.clone(), name.to_string());
    Schedulable::task_fn(move || {
        log.borrow_mut().push(name.clone());
        timer.tick(duration);
        Ok(())
    })
}

/// An incremental task of `chunks` units, each logging its name and holding
/// the clock for `chunk_duration`.
pub fn fake_process(
    timer: &FakeHostTimer,
    log: &Log,
    name: &str,
    chunks: usize,
    chunk_duration: Millis,
) -> Schedulable {
    let (timer, log, name) = (timer.clone(), log.clone(), name.to_string());
    let remaining = Cell::new(chunks);
    Schedulable::incremental_fn(move || {
        log.borrow_mut().push(name.clone());
        timer.tick(chunk_duration);
        remaining.set(remaining.get().saturating_sub(1));
        Ok(remaining.get() > 0)
    })
}

pub fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

pub fn assert_idle(timer: &FakeHostTimer, scheduler: &BrowserBackedScheduler) {
    assert!(scheduler.debug_is_clear(), "{scheduler}");
    assert_eq!(timer.scheduled_time(), None);
}
