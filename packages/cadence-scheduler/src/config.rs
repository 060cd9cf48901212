use crate::timer::Millis;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIME_SLICE_MS: Millis = 100;

/// Construction-time knobs for a `BrowserBackedScheduler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize), serde(default))]
pub struct SchedulerConfig {
    /// Budget of one drain pass for every level below `Critical`.
    pub time_slice_ms: Millis,
    /// Jobs running longer than this are logged. `None` disables the logger.
    pub slow_job_threshold_ms: Option<Millis>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            time_slice_ms: DEFAULT_TIME_SLICE_MS,
            slow_job_threshold_ms: None,
        }
    }
}

impl SchedulerConfig {
    pub fn with_time_slice(mut self, millis: Millis) -> Self {
        self.time_slice_ms = millis;
        self
    }

    pub fn with_slow_job_threshold(mut self, millis: Millis) -> Self {
        self.slow_job_threshold_ms = Some(millis);
        self
    }
}
