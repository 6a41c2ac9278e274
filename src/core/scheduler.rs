//! Single-consumer task scheduler.
//!
//! Producers on any thread hand closures to [`Scheduler::submit`] or
//! [`Scheduler::submit_delayed`]; the one thread blocked in
//! [`Scheduler::start`] runs them on its [`EventLoop`].
//!
//! # Design
//!
//! - **One lock for both queues**: critical sections are a single push or pop
//! - **Lock-free run state**: `Idle → Running → Stopped`, one transition each
//! - **Tasks run unlocked**: a slow task never blocks producers
//! - **Debounced signaling**: at most one wake in flight and one timer armed
//!
//! ```
//! use std::sync::Arc;
//! use prometheus_task_loop::core::Scheduler;
//!
//! let scheduler = Arc::new(Scheduler::new());
//!
//! let stopper = Arc::clone(&scheduler);
//! scheduler.submit(move || {
//!     stopper.stop(3);
//! })?;
//!
//! assert_eq!(scheduler.start(), 3);
//! assert!(scheduler.submit(|| {}).is_err());
//! # Ok::<(), prometheus_task_loop::core::SchedulerError>(())
//! ```

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::config::SchedulerConfig;
use crate::core::event_loop::{EventLoop, Processor};
use crate::core::task::{panic_message, PendingTask, Task};
use crate::core::SchedulerError;
use crate::infra::queue::{DelayedQueue, ImmediateQueue};
use crate::util::clock::{Clock, MonotonicClock};

/// Exit code returned by [`Scheduler::start`] when it does not run the loop.
pub const DEFAULT_EXIT_CODE: i32 = 0;

/// Lifecycle of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Constructed, not started. Submissions are queued.
    Idle,
    /// The loop is running on the thread that called `start`.
    Running,
    /// The loop has exited. Submissions are rejected.
    Stopped,
}

impl RunState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Stopped => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

/// Statistics about scheduler activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Immediate tasks accepted.
    pub submitted: u64,
    /// Delayed tasks accepted.
    pub delayed_submitted: u64,
    /// Submissions refused.
    pub rejected: u64,
    /// Tasks that ran to completion.
    pub executed: u64,
    /// Tasks that panicked. They still count as completed.
    pub panicked: u64,
    /// Tasks dropped unexecuted at shutdown.
    pub discarded: u64,
    /// Immediate tasks currently queued.
    pub pending_immediate: usize,
    /// Delayed tasks currently queued.
    pub pending_delayed: usize,
}

#[derive(Debug, Default)]
struct SchedulerCounters {
    submitted: AtomicU64,
    delayed_submitted: AtomicU64,
    rejected: AtomicU64,
    executed: AtomicU64,
    panicked: AtomicU64,
    discarded: AtomicU64,
}

#[derive(Debug, Default)]
struct TaskQueues {
    immediate: ImmediateQueue,
    delayed: DelayedQueue,
    next_seq: u64,
}

impl TaskQueues {
    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// Cooperative scheduler multiplexing immediate and delayed tasks onto one
/// event loop thread.
pub struct Scheduler {
    config: SchedulerConfig,
    queues: Mutex<TaskQueues>,
    state: AtomicU8,
    event_loop: EventLoop,
    clock: Arc<dyn Clock>,
    counters: SchedulerCounters,
}

impl Scheduler {
    /// Create a scheduler with the default configuration and a monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self::build(SchedulerConfig::default(), Arc::new(MonotonicClock::new()))
    }

    /// Create a scheduler from `config`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if the configuration is invalid.
    pub fn with_config(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    /// Create a scheduler from `config` that reads ticks from `clock`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if the configuration is invalid.
    pub fn with_clock(
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(Self::build(config, clock))
    }

    pub(crate) fn build(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            queues: Mutex::new(TaskQueues::default()),
            state: AtomicU8::new(RunState::Idle.as_u8()),
            event_loop: EventLoop::new(Arc::clone(&clock)),
            clock,
            counters: SchedulerCounters::default(),
        }
    }

    /// Queue `task` to run on the loop thread as soon as possible.
    ///
    /// Tasks submitted before [`Scheduler::start`] wait for the loop.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::RejectedAfterStop` once the scheduler has stopped
    /// - `SchedulerError::QueueFull` if `max_queue_depth` is reached
    pub fn submit<T: Task>(&self, task: T) -> Result<(), SchedulerError> {
        self.ensure_accepting()?;

        let seq = {
            let mut queues = self.queues.lock();
            if self.state() == RunState::Stopped {
                drop(queues);
                return self.reject(SchedulerError::RejectedAfterStop);
            }
            if let Some(max) = self.config.max_queue_depth {
                if queues.immediate.len() >= max {
                    drop(queues);
                    return self.reject(SchedulerError::QueueFull(format!(
                        "immediate queue at max depth {max}"
                    )));
                }
            }
            let seq = queues.next_seq();
            let post_time = self.clock.now_ms();
            queues
                .immediate
                .push(PendingTask::new(Box::new(task), post_time, 0, seq));
            seq
        };

        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        let posted = self.event_loop.request_wake();
        trace!(seq, wake_posted = posted, "task submitted");
        Ok(())
    }

    /// Queue `task` to run no earlier than `delay` from now.
    ///
    /// Delays are measured in whole milliseconds; sub-millisecond parts are
    /// truncated.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::RejectedAfterStop` once the scheduler has stopped
    /// - `SchedulerError::QueueFull` if `max_queue_depth` is reached
    pub fn submit_delayed<T: Task>(&self, task: T, delay: Duration) -> Result<(), SchedulerError> {
        self.ensure_accepting()?;

        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let (seq, due_time) = {
            let mut queues = self.queues.lock();
            if self.state() == RunState::Stopped {
                drop(queues);
                return self.reject(SchedulerError::RejectedAfterStop);
            }
            if let Some(max) = self.config.max_queue_depth {
                if queues.delayed.len() >= max {
                    drop(queues);
                    return self.reject(SchedulerError::QueueFull(format!(
                        "delayed queue at max depth {max}"
                    )));
                }
            }
            let seq = queues.next_seq();
            let pending = PendingTask::new(Box::new(task), self.clock.now_ms(), delay_ms, seq);
            let due_time = pending.due_time();
            queues.delayed.push(pending);
            (seq, due_time)
        };

        self.counters
            .delayed_submitted
            .fetch_add(1, Ordering::Relaxed);
        let armed = self.event_loop.request_timer(delay_ms);
        trace!(seq, delay_ms, due_time, timer_armed = armed, "delayed task submitted");
        Ok(())
    }

    /// Run the event loop on the calling thread until [`Scheduler::stop`].
    ///
    /// Only the first call on a scheduler runs; later calls return
    /// [`DEFAULT_EXIT_CODE`] immediately. When the loop exits the scheduler
    /// is `Stopped` and any tasks still queued are dropped unexecuted.
    pub fn start(&self) -> i32 {
        let span = tracing::info_span!("scheduler", name = %self.config.name);
        let _enter = span.enter();

        let admitted = self.event_loop.run_if(self, || {
            self.state
                .compare_exchange(
                    RunState::Idle.as_u8(),
                    RunState::Running.as_u8(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
        });

        let Some(code) = admitted else {
            debug!(state = ?self.state(), "start ignored: scheduler already started");
            return DEFAULT_EXIT_CODE;
        };

        self.state
            .store(RunState::Stopped.as_u8(), Ordering::Release);
        let discarded = self.discard_pending();
        info!(exit_code = code, discarded, "scheduler stopped");
        code
    }

    /// Ask a running scheduler to exit with `code`.
    ///
    /// Returns whether the running loop took the request. Outside of
    /// `Running`, or once a stop is already pending, this is a no-op and the
    /// first code stands. A task already executing always finishes.
    pub fn stop(&self, code: i32) -> bool {
        if self.state() != RunState::Running {
            debug!(state = ?self.state(), code, "stop ignored: scheduler not running");
            return false;
        }
        let requested = self.event_loop.quit(code);
        if requested {
            debug!(code, "stop requested");
        } else {
            debug!(code, "stop ignored: loop already stopping");
        }
        requested
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Configuration this scheduler was built with.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The loop driving this scheduler, for posting host events.
    #[must_use]
    pub const fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    /// Get current scheduler statistics.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let (pending_immediate, pending_delayed) = {
            let queues = self.queues.lock();
            (queues.immediate.len(), queues.delayed.len())
        };
        SchedulerStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            delayed_submitted: self.counters.delayed_submitted.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            executed: self.counters.executed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
            pending_immediate,
            pending_delayed,
        }
    }

    /// Fast-path rejection. Submissions re-check under the queue lock, which
    /// `discard_pending` also takes after the `Stopped` store, so every push
    /// is either drained at shutdown or rejected.
    fn ensure_accepting(&self) -> Result<(), SchedulerError> {
        if self.state() == RunState::Stopped {
            return self.reject(SchedulerError::RejectedAfterStop);
        }
        Ok(())
    }

    fn reject(&self, err: SchedulerError) -> Result<(), SchedulerError> {
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        warn!(error = %err, "task submission rejected");
        Err(err)
    }

    /// Execute one task outside the queue lock, containing any panic.
    fn execute(&self, pending: PendingTask) {
        let seq = pending.seq();
        let task = pending.into_task();
        match catch_unwind(AssertUnwindSafe(move || task.run())) {
            Ok(()) => {
                self.counters.executed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                self.counters.panicked.fetch_add(1, Ordering::Relaxed);
                error!(
                    seq,
                    panic = %panic_message(payload.as_ref()),
                    "task panicked"
                );
            }
        }
    }

    /// Drop every queued task without running it. Refused while running.
    fn discard_pending(&self) -> usize {
        if self.state() == RunState::Running {
            return 0;
        }

        let (immediate, delayed) = {
            let mut queues = self.queues.lock();
            (queues.immediate.drain(), queues.delayed.drain())
        };
        let discarded = immediate.len() + delayed.len();
        if discarded > 0 {
            self.counters
                .discarded
                .fetch_add(discarded as u64, Ordering::Relaxed);
            info!(
                immediate = immediate.len(),
                delayed = delayed.len(),
                "discarding tasks left in queue"
            );
        }
        // Task destructors run here, with the lock released.
        drop(immediate);
        drop(delayed);
        discarded
    }
}

impl Processor for Scheduler {
    fn run_ready_task(&self) -> bool {
        let Some(pending) = self.queues.lock().immediate.pop() else {
            return false;
        };

        self.execute(pending);

        !self.queues.lock().immediate.is_empty()
    }

    fn run_due_delayed_tasks(&self) -> Option<u64> {
        loop {
            let now = self.clock.now_ms();
            let Some(pending) = self.queues.lock().delayed.pop_due(now) else {
                break;
            };
            trace!(
                seq = pending.seq(),
                lateness_ms = now.saturating_sub(pending.due_time()),
                "running delayed task"
            );
            self.execute(pending);
        }

        let next_due = self.queues.lock().delayed.peek_due_time()?;
        Some(next_due.saturating_sub(self.clock.now_ms()))
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.discard_pending();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::clock::ManualClock;
    use std::sync::atomic::AtomicUsize;

    fn manual_scheduler(start_ms: u64) -> (Scheduler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start_ms));
        let scheduler = Scheduler::with_clock(SchedulerConfig::default(), clock.clone()).unwrap();
        (scheduler, clock)
    }

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(log: &Arc<Mutex<Vec<&'static str>>>, marker: &'static str) -> impl Task {
        let log = Arc::clone(log);
        move || log.lock().push(marker)
    }

    #[test]
    fn test_run_ready_task_runs_one_per_call() {
        let (scheduler, _clock) = manual_scheduler(0);
        let log = recorder();

        scheduler.submit(push(&log, "a")).unwrap();
        scheduler.submit(push(&log, "b")).unwrap();
        scheduler.submit(push(&log, "c")).unwrap();

        assert!(scheduler.run_ready_task());
        assert_eq!(*log.lock(), vec!["a"]);
        assert!(scheduler.run_ready_task());
        assert!(!scheduler.run_ready_task());
        assert!(!scheduler.run_ready_task());
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
        assert_eq!(scheduler.stats().executed, 3);
    }

    #[test]
    fn test_delayed_tasks_run_earliest_deadline_first() {
        let (scheduler, clock) = manual_scheduler(1_000);
        let log = recorder();

        scheduler
            .submit_delayed(push(&log, "a"), Duration::from_millis(300))
            .unwrap();
        scheduler
            .submit_delayed(push(&log, "b"), Duration::from_millis(100))
            .unwrap();

        // Nothing due yet; the next deadline is B's.
        assert_eq!(scheduler.run_due_delayed_tasks(), Some(100));
        assert!(log.lock().is_empty());

        clock.advance(150);
        assert_eq!(scheduler.run_due_delayed_tasks(), Some(150));
        assert_eq!(*log.lock(), vec!["b"]);

        clock.advance(150);
        assert_eq!(scheduler.run_due_delayed_tasks(), None);
        assert_eq!(*log.lock(), vec!["b", "a"]);
    }

    #[test]
    fn test_overdue_delayed_tasks_drain_in_one_call() {
        let (scheduler, clock) = manual_scheduler(0);
        let log = recorder();

        scheduler
            .submit_delayed(push(&log, "late"), Duration::from_millis(30))
            .unwrap();
        scheduler
            .submit_delayed(push(&log, "early"), Duration::from_millis(10))
            .unwrap();
        scheduler
            .submit_delayed(push(&log, "middle"), Duration::from_millis(20))
            .unwrap();
        scheduler
            .submit_delayed(push(&log, "future"), Duration::from_millis(500))
            .unwrap();

        clock.set(100);
        // Remaining time is recomputed from now, not the stored 500ms offset.
        assert_eq!(scheduler.run_due_delayed_tasks(), Some(400));
        assert_eq!(*log.lock(), vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_submit_delayed_arms_earliest_timer() {
        let (scheduler, _clock) = manual_scheduler(1_000);

        scheduler
            .submit_delayed(|| {}, Duration::from_millis(300))
            .unwrap();
        assert_eq!(scheduler.event_loop().timer_deadline(), Some(1_300));

        scheduler
            .submit_delayed(|| {}, Duration::from_millis(500))
            .unwrap();
        assert_eq!(scheduler.event_loop().timer_deadline(), Some(1_300));

        scheduler
            .submit_delayed(|| {}, Duration::from_millis(100))
            .unwrap();
        assert_eq!(scheduler.event_loop().timer_deadline(), Some(1_100));
    }

    #[test]
    fn test_submit_posts_single_wake() {
        let (scheduler, _clock) = manual_scheduler(0);
        for _ in 0..10 {
            scheduler.submit(|| {}).unwrap();
        }

        let loop_stats = scheduler.event_loop().stats();
        assert_eq!(loop_stats.wakes_posted, 1);
        assert_eq!(loop_stats.wakes_debounced, 9);
        assert_eq!(scheduler.stats().pending_immediate, 10);
    }

    #[test]
    fn test_panicking_task_is_contained() {
        let (scheduler, _clock) = manual_scheduler(0);
        let log = recorder();

        scheduler.submit(|| panic!("task failure")).unwrap();
        scheduler.submit(push(&log, "after")).unwrap();

        assert!(scheduler.run_ready_task());
        assert!(!scheduler.run_ready_task());
        assert_eq!(*log.lock(), vec!["after"]);

        let stats = scheduler.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.executed, 1);
    }

    #[test]
    fn test_queue_depth_limit() {
        let config = SchedulerConfig::new().with_max_queue_depth(2);
        let scheduler = Scheduler::with_config(config).unwrap();

        scheduler.submit(|| {}).unwrap();
        scheduler.submit(|| {}).unwrap();
        assert!(matches!(
            scheduler.submit(|| {}),
            Err(SchedulerError::QueueFull(_))
        ));

        // The delayed queue has its own bound.
        scheduler
            .submit_delayed(|| {}, Duration::from_secs(1))
            .unwrap();
        assert_eq!(scheduler.stats().rejected, 1);
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let (scheduler, _clock) = manual_scheduler(0);
        assert!(!scheduler.stop(1));
        assert_eq!(scheduler.state(), RunState::Idle);
    }

    #[test]
    fn test_drop_discards_without_running() {
        struct DropCounter(Arc<AtomicUsize>);

        impl Drop for DropCounter {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let ran = Arc::new(AtomicUsize::new(0));
        {
            let (scheduler, _clock) = manual_scheduler(0);
            for _ in 0..3 {
                let guard = DropCounter(Arc::clone(&drops));
                let ran = Arc::clone(&ran);
                scheduler
                    .submit_delayed(
                        move || {
                            let _guard = guard;
                            ran.fetch_add(1, Ordering::SeqCst);
                        },
                        Duration::from_secs(60),
                    )
                    .unwrap();
            }
        }

        assert_eq!(drops.load(Ordering::SeqCst), 3);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_run_state_round_trip() {
        for state in [RunState::Idle, RunState::Running, RunState::Stopped] {
            assert_eq!(RunState::from_u8(state.as_u8()), state);
        }
    }
}
