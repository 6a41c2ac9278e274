//! FIFO queue for tasks submitted without delay.

use std::collections::VecDeque;

use crate::core::PendingTask;

/// Insertion-ordered queue: the first task pushed is the first popped.
#[derive(Debug, Default)]
pub struct ImmediateQueue {
    tasks: VecDeque<PendingTask>,
}

impl ImmediateQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task at the back.
    pub fn push(&mut self, task: PendingTask) {
        self.tasks.push_back(task);
    }

    /// Remove the oldest task.
    pub fn pop(&mut self) -> Option<PendingTask> {
        self.tasks.pop_front()
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Remove every queued task, oldest first.
    pub fn drain(&mut self) -> Vec<PendingTask> {
        self.tasks.drain(..).collect()
    }
}
