//! Scheduler error taxonomy

use crate::handle::WatchId;
use thiserror::Error;

/// Errors surfaced by scheduler operations
///
/// Registration mistakes are reported instead of silently ignored: a leaked
/// listener or a second notification would be the alternative.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("{0} is already registered")]
    AlreadyRegistered(WatchId),

    #[error("{0} is not registered")]
    NotRegistered(WatchId),

    #[error("{0} has already become visible")]
    AlreadyVisible(WatchId),

    #[error("scheduler must be created inside a tokio runtime")]
    NoRuntime,

    #[error("invalid configuration: {0}")]
    Config(String),
}
