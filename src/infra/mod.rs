//! In-memory infrastructure for pending work.

pub mod queue;
pub use queue::{DelayedQueue, ImmediateQueue};
