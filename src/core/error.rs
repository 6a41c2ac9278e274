//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler has stopped and no longer accepts tasks.
    #[error("scheduler stopped: task rejected")]
    RejectedAfterStop,
    /// A bounded queue is at capacity.
    #[error("queue full: {0}")]
    QueueFull(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The dedicated scheduler thread could not be spawned.
    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// The dedicated scheduler thread panicked outside of task execution.
    #[error("scheduler thread panicked")]
    ThreadPanicked,
    /// The process-wide scheduler has already been created.
    #[error("global scheduler already initialized")]
    AlreadyInitialized,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
