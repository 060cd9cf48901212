use crate::error::SchedulerError;

/// Milliseconds on the host clock.
pub type Millis = u64;

/// Callback a scheduler hands to its host timer. Errors are job failures
/// escaping a drain pass.
pub type SliceCallback = Box<dyn FnMut() -> Result<(), SchedulerError>>;

/// The single low-level timer primitive a scheduler is driven by.
///
/// A timer holds at most one registration: `schedule` and `schedule_at`
/// replace whatever was pending. Implementations must never run the callback
/// synchronously from inside either call.
pub trait HostTimer {
    /// Current host time.
    fn now(&self) -> Millis;

    /// Fire the callback on the next tick.
    fn schedule(&self);

    /// Fire the callback at or after `when`.
    fn schedule_at(&self, when: Millis);

    /// Drop the pending registration, if any.
    fn cancel(&self);

    /// When the pending registration will fire, if one exists.
    fn scheduled_fire_time(&self) -> Option<Millis>;
}

/// Builds the one timer a scheduler binds to.
pub trait HostTimerFactory {
    fn create(&self, callback: SliceCallback) -> Box<dyn HostTimer>;
}
