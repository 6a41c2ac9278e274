//! Tests for the task queues

use prometheus_task_loop::core::PendingTask;
use prometheus_task_loop::infra::{DelayedQueue, ImmediateQueue};

fn pending(post_time: u64, delay: u64, seq: u64) -> PendingTask {
    PendingTask::new(Box::new(|| {}), post_time, delay, seq)
}

#[test]
fn test_immediate_queue_is_fifo() {
    let mut queue = ImmediateQueue::new();
    for seq in 0..5 {
        queue.push(pending(0, 0, seq));
    }
    let order: Vec<u64> = std::iter::from_fn(|| queue.pop()).map(|t| t.seq()).collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
    assert!(queue.is_empty());
}

#[test]
fn test_delayed_queue_pops_only_due_tasks() {
    let mut queue = DelayedQueue::new();
    queue.push(pending(0, 300, 0));
    queue.push(pending(0, 100, 1));
    queue.push(pending(50, 100, 2));

    assert_eq!(queue.peek_due_time(), Some(100));
    assert!(queue.pop_due(99).is_none());

    let due: Vec<u64> = std::iter::from_fn(|| queue.pop_due(150))
        .map(|t| t.seq())
        .collect();
    assert_eq!(due, vec![1, 2]);
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.peek_due_time(), Some(300));
}

#[test]
fn test_delayed_queue_saturates_far_deadlines() {
    let mut queue = DelayedQueue::new();
    queue.push(pending(u64::MAX - 1, 10, 0));
    assert_eq!(queue.peek_due_time(), Some(u64::MAX));
}

#[test]
fn test_drain_empties_both_queues() {
    let mut immediate = ImmediateQueue::new();
    let mut delayed = DelayedQueue::new();
    immediate.push(pending(0, 0, 0));
    delayed.push(pending(0, 10, 1));
    delayed.push(pending(0, 20, 2));

    assert_eq!(immediate.drain().len(), 1);
    assert_eq!(delayed.drain().len(), 2);
    assert!(immediate.is_empty());
    assert!(delayed.is_empty());
}
