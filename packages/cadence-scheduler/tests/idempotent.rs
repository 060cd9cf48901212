mod common;

use cadence_scheduler::testing::{FakeFinallyHost, FakeTimerService};
use cadence_scheduler::{
    FinallyState, IdempotentFinally, IdempotentScheduler, IncrementalTask, JobResult,
    Priority, Schedulable, SchedulerError, SchedulerTimerService, Task, TimerService,
};
use std::cell::Cell;
use std::rc::Rc;

fn counting_task(runs: &Rc<Cell<usize>>, limit: usize) -> Rc<dyn IncrementalTask> {
    let runs = runs.clone();
    Rc::new(move || -> JobResult<bool> {
        runs.set(runs.get() + 1);
        Ok(runs.get() < limit)
    })
}

#[test]
fn test_repeated_schedule_registers_once() {
    let service = Rc::new(FakeTimerService::new());
    let runs = Rc::new(Cell::new(0));
    let wrapper = IdempotentScheduler::new(service.clone(), counting_task(&runs, 1), 10);

    wrapper.schedule().unwrap();
    wrapper.schedule().unwrap();
    wrapper.schedule().unwrap();
    assert_eq!(service.pending(), 1);
    assert!(wrapper.is_scheduled());

    service.tick(10).unwrap();
    assert_eq!(runs.get(), 1);
    assert!(!wrapper.is_scheduled());
}

#[test]
fn test_reschedules_after_completion() {
    let service = Rc::new(FakeTimerService::new());
    let runs = Rc::new(Cell::new(0));
    let wrapper = IdempotentScheduler::new(service.clone(), counting_task(&runs, 1), 5);

    wrapper.schedule().unwrap();
    service.tick(5).unwrap();
    wrapper.schedule().unwrap();
    assert!(wrapper.is_scheduled());
    service.tick(5).unwrap();
    assert_eq!(runs.get(), 2);
}

#[test]
fn test_recurs_while_task_continues() {
    let service = Rc::new(FakeTimerService::new());
    let runs = Rc::new(Cell::new(0));
    let wrapper = IdempotentScheduler::new(service.clone(), counting_task(&runs, 3), 10);

    wrapper.schedule().unwrap();
    service.tick(100).unwrap();
    assert_eq!(runs.get(), 3);
    assert!(!wrapper.is_scheduled());
}

#[test]
fn test_cancel_before_run() {
    let service = Rc::new(FakeTimerService::new());
    let runs = Rc::new(Cell::new(0));
    let wrapper = IdempotentScheduler::new(service.clone(), counting_task(&runs, 1), 10);

    // Cancelling an unscheduled wrapper is a no-op
    wrapper.cancel();
    wrapper.schedule().unwrap();
    wrapper.cancel();
    service.tick(50).unwrap();
    assert_eq!(runs.get(), 0);

    wrapper.set_delay(20);
    wrapper.schedule().unwrap();
    service.tick(19).unwrap();
    assert_eq!(runs.get(), 0);
    service.tick(1).unwrap();
    assert_eq!(runs.get(), 1);
}

#[test]
fn test_over_browser_scheduler() {
    let (timer, scheduler, _log) = common::setup(100);
    let service = Rc::new(SchedulerTimerService::new(scheduler.clone(), Priority::Medium).unwrap());
    let runs = Rc::new(Cell::new(0));
    let wrapper = IdempotentScheduler::new(service.clone(), counting_task(&runs, 1), 30);

    wrapper.schedule().unwrap();
    wrapper.schedule().unwrap();
    assert_eq!(timer.registrations(), 1);
    assert_eq!(timer.scheduled_time(), Some(30));

    timer.trigger_after(30).unwrap();
    assert_eq!(runs.get(), 1);
    assert_eq!(service.elapsed_millis(), 30);
    assert!(scheduler.debug_is_clear());
}

#[test]
fn test_timer_service_rejects_reserved_priority() {
    let (_timer, scheduler, _log) = common::setup(100);
    let result = SchedulerTimerService::new(scheduler, Priority::InternalSuppress);
    assert!(matches!(result, Err(SchedulerError::ReservedPriority(_))));
}

fn finally_fixture() -> (Rc<FakeFinallyHost>, Rc<Cell<usize>>, Rc<IdempotentFinally>) {
    let host = Rc::new(FakeFinallyHost::new());
    let runs = Rc::new(Cell::new(0));
    let action: Rc<dyn Task> = {
        let runs = runs.clone();
        Rc::new(move || -> JobResult {
            runs.set(runs.get() + 1);
            Ok(())
        })
    };
    let finally = IdempotentFinally::new(host.clone(), action);
    (host, runs, finally)
}

#[test]
fn test_finally_runs_once() {
    let (host, runs, finally) = finally_fixture();

    finally.schedule();
    finally.schedule();
    assert_eq!(finally.state(), FinallyState::Pending);
    assert_eq!(host.pending(), 1);

    host.flush();
    assert_eq!(runs.get(), 1);
    assert_eq!(finally.state(), FinallyState::Idle);
}

#[test]
fn test_finally_cancel_skips_action() {
    let (host, runs, finally) = finally_fixture();

    finally.schedule();
    finally.cancel();
    host.flush();
    assert_eq!(runs.get(), 0);

    // Cancel, then schedule again before the host fires: one registration
    finally.schedule();
    finally.cancel();
    finally.schedule();
    assert_eq!(host.pending(), 1);
    host.flush();
    assert_eq!(runs.get(), 1);
}

#[test]
fn test_finally_execute_requires_pending() {
    let (host, runs, finally) = finally_fixture();

    let err = finally.execute().unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidState(_)));

    finally.schedule();
    finally.execute().unwrap();
    assert_eq!(runs.get(), 1);
    assert!(finally.execute().is_err());

    // The host registration finds nothing pending
    host.flush();
    assert_eq!(runs.get(), 1);
}

#[test]
fn test_schedulable_identity_is_the_wrapper() {
    let service = Rc::new(FakeTimerService::new());
    let runs = Rc::new(Cell::new(0));
    let wrapper = IdempotentScheduler::new(service.clone(), counting_task(&runs, 1), 10);
    wrapper.schedule().unwrap();

    let as_job: Rc<dyn IncrementalTask> = wrapper.clone();
    assert!(service.is_scheduled(&Schedulable::Incremental(as_job)));
}
