use std::fmt;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Scheduling class of a job.
///
/// Variants are declared in drain order, so the derived `Ord` puts the most
/// urgent level first: `Critical < High < Medium < Low < InternalSuppress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Priority {
    /// Always drained in full, never throttled by the time slice.
    Critical,
    High,
    Medium,
    Low,
    /// Parking level for jobs a `Controller` has suppressed. Not user-selectable.
    InternalSuppress,
}

impl Priority {
    pub const COUNT: usize = 5;

    /// Every level, in drain order.
    pub const ALL: [Priority; Priority::COUNT] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::InternalSuppress,
    ];

    /// Levels callers may schedule at.
    pub const USABLE: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn is_usable(self) -> bool {
        !matches!(self, Priority::InternalSuppress)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::InternalSuppress => "internal-suppress",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
