use crate::priority::Priority;
use thiserror::Error;

/// Errors surfaced by the scheduler and its wrappers.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The priority is reserved for administratively suppressed jobs.
    #[error("priority {0} is reserved and cannot be scheduled directly")]
    ReservedPriority(Priority),

    /// An operation was invoked in a state that does not allow it.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// A scheduled job failed while executing.
    #[error(transparent)]
    Job(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
