//! Deadline-ordered queue for delayed tasks.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::PendingTask;

/// Wrapper ordering entries so the max-heap top is the earliest deadline,
/// FIFO by submission sequence among equal deadlines.
struct DeadlineEntry {
    task: PendingTask,
}

impl PartialEq for DeadlineEntry {
    fn eq(&self, other: &Self) -> bool {
        self.task.due_time() == other.task.due_time() && self.task.seq() == other.task.seq()
    }
}

impl Eq for DeadlineEntry {}

impl PartialOrd for DeadlineEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DeadlineEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for max-heap: smaller due_time, then smaller seq, wins.
        match other.task.due_time().cmp(&self.task.due_time()) {
            Ordering::Equal => other.task.seq().cmp(&self.task.seq()),
            ord => ord,
        }
    }
}

/// Queue of delayed tasks, earliest `due_time` first.
/// O(log n) insert and removal, O(1) peek.
#[derive(Default)]
pub struct DelayedQueue {
    tasks: BinaryHeap<DeadlineEntry>,
}

impl DelayedQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task.
    pub fn push(&mut self, task: PendingTask) {
        self.tasks.push(DeadlineEntry { task });
    }

    /// Due time of the earliest task, if any.
    #[must_use]
    pub fn peek_due_time(&self) -> Option<u64> {
        self.tasks.peek().map(|entry| entry.task.due_time())
    }

    /// Remove the earliest task if it is due at `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<PendingTask> {
        if self.peek_due_time()? <= now_ms {
            self.tasks.pop().map(|entry| entry.task)
        } else {
            None
        }
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

    /// Remove every queued task in deadline order.
    pub fn drain(&mut self) -> Vec<PendingTask> {
        let mut drained = Vec::with_capacity(self.tasks.len());
        while let Some(entry) = self.tasks.pop() {
            drained.push(entry.task);
        }
        drained
    }
}

impl std::fmt::Debug for DelayedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedQueue")
            .field("len", &self.tasks.len())
            .field("next_due", &self.peek_due_time())
            .finish()
    }
}
