//! Core scheduling: tasks, the event loop, and the scheduler driving it.

pub mod error;
pub mod event_loop;
pub mod scheduler;
pub mod task;

pub use error::{AppResult, SchedulerError};
pub use event_loop::{EventLoop, LoopStats, NativeEvent, Processor};
pub use scheduler::{RunState, Scheduler, SchedulerStats, DEFAULT_EXIT_CODE};
pub use task::{bind, PendingTask, Task};
