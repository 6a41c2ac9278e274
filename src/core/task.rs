//! Task abstraction and the queue entry that carries it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A single-use unit of work.
///
/// `run` consumes the boxed task, so a task executes at most once and is
/// destroyed right after it returns. Any `FnOnce() + Send + 'static` closure
/// is a task.
///
/// ```
/// use prometheus_task_loop::core::Task;
///
/// let task: Box<dyn Task> = Box::new(|| println!("hello from the loop"));
/// task.run();
/// ```
pub trait Task: Send + 'static {
    /// Execute the task.
    fn run(self: Box<Self>);
}

impl<F> Task for F
where
    F: FnOnce() + Send + 'static,
{
    fn run(self: Box<Self>) {
        (*self)();
    }
}

/// Build a task that invokes `method` on a shared receiver.
///
/// Arguments are bound by capturing them in `method`:
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use prometheus_task_loop::core::{bind, Task};
///
/// struct Counter(AtomicUsize);
///
/// impl Counter {
///     fn add(&self, n: usize) {
///         self.0.fetch_add(n, Ordering::SeqCst);
///     }
/// }
///
/// let counter = Arc::new(Counter(AtomicUsize::new(0)));
/// let task = bind(Arc::clone(&counter), |c| c.add(10));
/// Box::new(task).run();
/// assert_eq!(counter.0.load(Ordering::SeqCst), 10);
/// ```
pub fn bind<T, F>(receiver: Arc<T>, method: F) -> impl Task
where
    T: Send + Sync + 'static,
    F: FnOnce(&T) + Send + 'static,
{
    move || method(&receiver)
}

/// A task waiting in one of the scheduler queues.
pub struct PendingTask {
    task: Box<dyn Task>,
    post_time: u64,
    delay: u64,
    due_time: u64,
    seq: u64,
}

impl PendingTask {
    /// Wrap `task`, posted at `post_time` with `delay` milliseconds of delay.
    ///
    /// `due_time` is fixed here and never recomputed.
    #[must_use]
    pub fn new(task: Box<dyn Task>, post_time: u64, delay: u64, seq: u64) -> Self {
        Self {
            task,
            post_time,
            delay,
            due_time: post_time.saturating_add(delay),
            seq,
        }
    }

    /// Tick count at submission.
    #[must_use]
    pub const fn post_time(&self) -> u64 {
        self.post_time
    }

    /// Requested delay in milliseconds (0 for immediate tasks).
    #[must_use]
    pub const fn delay(&self) -> u64 {
        self.delay
    }

    /// Earliest tick at which the task may run.
    #[must_use]
    pub const fn due_time(&self) -> u64 {
        self.due_time
    }

    /// Submission sequence number, unique per scheduler.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Take the task out of its queue entry.
    #[must_use]
    pub fn into_task(self) -> Box<dyn Task> {
        self.task
    }
}

impl fmt::Debug for PendingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTask")
            .field("seq", &self.seq)
            .field("post_time", &self.post_time)
            .field("delay", &self.delay)
            .field("due_time", &self.due_time)
            .finish_non_exhaustive()
    }
}

/// Render a panic payload for logging.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
