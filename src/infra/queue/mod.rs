//! Queue structures backing the scheduler.

pub mod delayed;
pub mod immediate;

pub use delayed::DelayedQueue;
pub use immediate::ImmediateQueue;
