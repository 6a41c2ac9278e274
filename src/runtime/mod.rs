//! Runtime adapters for hosting a scheduler.

pub mod thread;

pub use thread::SchedulerThread;
