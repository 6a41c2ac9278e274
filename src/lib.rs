//! # Prometheus Task Loop
//!
//! A single-threaded cooperative task scheduler for the Prometheus AI Platform.
//!
//! Work arrives from any number of producer threads and runs, one task at a
//! time, on the single thread that owns the scheduler's event loop. This is
//! the model UI and host-integration code needs: state touched by tasks is
//! only ever touched from one thread, while producers never block on it.
//!
//! ## Key Features
//!
//! - **Immediate tasks**: strict FIFO, one task per wake so host events interleave
//! - **Delayed tasks**: earliest deadline first, every overdue task drained per timer fire
//! - **Debounced wake-ups**: at most one wake signal and one timer outstanding
//! - **No polling**: the loop blocks on a `Condvar` until a message, quit, or deadline
//! - **Panic containment**: a panicking task is logged and counted, the loop continues
//! - **Observable shutdown**: tasks left queued at stop are dropped unexecuted and counted
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use prometheus_task_loop::core::Scheduler;
//! use prometheus_task_loop::runtime::SchedulerThread;
//!
//! let scheduler = Arc::new(Scheduler::new());
//! let thread = SchedulerThread::spawn(Arc::clone(&scheduler))?;
//!
//! // From any thread:
//! scheduler.submit(|| println!("runs on the loop thread"))?;
//!
//! let stopper = Arc::clone(&scheduler);
//! scheduler.submit_delayed(move || { stopper.stop(42); }, Duration::from_millis(20))?;
//!
//! assert_eq!(thread.join()?, 42);
//! # Ok::<(), prometheus_task_loop::core::SchedulerError>(())
//! ```
//!
//! Host events that must share the loop thread are posted through
//! [`core::EventLoop::post_native_event`]; they take priority over tasks.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling: tasks, the event loop, and the scheduler.
pub mod core;
/// Configuration models for the scheduler.
pub mod config;
/// Queue structures backing the scheduler.
pub mod infra;
/// Runtime adapters for hosting a scheduler on a thread.
pub mod runtime;
/// Process-wide scheduler accessor.
pub mod global;
/// Shared utilities: clocks and telemetry.
pub mod util;

pub use crate::core::{Scheduler, SchedulerError, Task};
