//! Condvar-backed event loop.
//!
//! The loop owns a small message queue (wake signals and host "native"
//! events), a single one-shot timer, and a quit request, all behind one
//! `parking_lot::Mutex` paired with a `Condvar`. Any thread may post to it;
//! exactly one thread runs it.
//!
//! # Loop discipline
//!
//! Each iteration handles at most one event: a due timer first, then the
//! oldest posted message. When nothing is pending the [`Processor`]'s idle
//! hook gets a turn, and if that reports no work the thread blocks on the
//! condvar until a message, a quit request, or the timer deadline arrives.
//!
//! A wake signal runs exactly one ready task and re-posts itself to the back
//! of the message queue if more remain, so host events posted in between are
//! never starved by a long task backlog.
//!
//! Every handler runs with the loop lock released. Tasks and native event
//! handlers may freely post, wake, arm the timer or quit.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, trace, warn};

use crate::core::task::panic_message;
use crate::util::clock::Clock;

/// Hooks the event loop drives on behalf of its owner.
pub trait Processor {
    /// Run one ready task. Returns whether more ready tasks remain.
    fn run_ready_task(&self) -> bool;

    /// Run every delayed task that is due. Returns the milliseconds until
    /// the next pending deadline, or `None` when no delayed work remains.
    fn run_due_delayed_tasks(&self) -> Option<u64>;

    /// Idle hook, called when no event is pending. Returns whether more idle
    /// work remains.
    fn run_idle(&self) -> bool {
        false
    }
}

/// A host event handler posted to the loop.
pub type NativeEvent = Box<dyn FnOnce() + Send + 'static>;

/// Snapshot of loop activity counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Wake signals actually posted to the message queue.
    pub wakes_posted: u64,
    /// Wake requests dropped because a signal was already in flight.
    pub wakes_debounced: u64,
    /// Wake signals consumed by the loop.
    pub wakes_handled: u64,
    /// Times the one-shot timer was armed or moved.
    pub timers_armed: u64,
    /// Times the timer fired.
    pub timer_fires: u64,
    /// Native events dispatched.
    pub native_dispatched: u64,
}

impl LoopStats {
    /// Wake signals posted but not yet consumed.
    #[must_use]
    pub const fn wakes_in_flight(&self) -> u64 {
        self.wakes_posted.saturating_sub(self.wakes_handled)
    }
}

#[derive(Debug, Default)]
struct LoopCounters {
    wakes_posted: AtomicU64,
    wakes_debounced: AtomicU64,
    wakes_handled: AtomicU64,
    timers_armed: AtomicU64,
    timer_fires: AtomicU64,
    native_dispatched: AtomicU64,
}

impl LoopCounters {
    fn snapshot(&self) -> LoopStats {
        LoopStats {
            wakes_posted: self.wakes_posted.load(Ordering::Relaxed),
            wakes_debounced: self.wakes_debounced.load(Ordering::Relaxed),
            wakes_handled: self.wakes_handled.load(Ordering::Relaxed),
            timers_armed: self.timers_armed.load(Ordering::Relaxed),
            timer_fires: self.timer_fires.load(Ordering::Relaxed),
            native_dispatched: self.native_dispatched.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Finished,
}

enum Message {
    Wake,
    Native(NativeEvent),
}

enum LoopEvent {
    Timer,
    Message(Message),
}

struct LoopState {
    phase: Phase,
    messages: VecDeque<Message>,
    /// Absolute deadline of the armed timer.
    timer: Option<u64>,
    quit_requested: bool,
    exit_code: i32,
}

/// Single-consumer event loop with cross-thread wake and a one-shot timer.
pub struct EventLoop {
    state: Mutex<LoopState>,
    signal: Condvar,
    /// Set while a wake signal is in flight; cleared right before the drain.
    wake_pending: AtomicBool,
    clock: Arc<dyn Clock>,
    counters: LoopCounters,
}

impl EventLoop {
    /// Create an idle loop reading deadlines from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(LoopState {
                phase: Phase::Idle,
                messages: VecDeque::new(),
                timer: None,
                quit_requested: false,
                exit_code: 0,
            }),
            signal: Condvar::new(),
            wake_pending: AtomicBool::new(false),
            clock,
            counters: LoopCounters::default(),
        }
    }

    /// Run the loop on the calling thread until [`EventLoop::quit`] is observed.
    ///
    /// Returns the code passed to `quit`. A call made while the loop is
    /// already running (nested from a handler, or from a second thread) is
    /// rejected and returns the last recorded code.
    pub fn run(&self, processor: &dyn Processor) -> i32 {
        self.run_if(processor, || true)
            .unwrap_or_else(|| self.state.lock().exit_code)
    }

    /// Run the loop only if `admit` agrees.
    ///
    /// `admit` is evaluated under the loop lock together with the transition
    /// into the running phase, so a `quit` racing with startup either lands
    /// before admission (and is ignored) or reaches the running loop.
    pub(crate) fn run_if(
        &self,
        processor: &dyn Processor,
        admit: impl FnOnce() -> bool,
    ) -> Option<i32> {
        {
            let mut state = self.state.lock();
            if state.phase == Phase::Running {
                warn!("event loop is already running; nested run rejected");
                return None;
            }
            if !admit() {
                return None;
            }
            state.phase = Phase::Running;
            state.quit_requested = false;
        }

        debug!("event loop running");
        self.run_loop(processor);

        let mut state = self.state.lock();
        state.phase = Phase::Finished;
        state.quit_requested = false;
        debug!(exit_code = state.exit_code, "event loop finished");
        Some(state.exit_code)
    }

    /// Ask the loop to terminate with `code`.
    ///
    /// Callable from any thread. Returns whether a running loop took the
    /// request. Within a run the first requested code wins; later calls are
    /// ignored. Outside of a run this only records the code.
    pub fn quit(&self, code: i32) -> bool {
        let mut state = self.state.lock();
        if state.phase != Phase::Running {
            state.exit_code = code;
            return false;
        }
        if state.quit_requested {
            trace!(code, ignored_for = state.exit_code, "quit already requested");
            return false;
        }
        state.exit_code = code;
        state.quit_requested = true;
        drop(state);
        self.signal.notify_all();
        true
    }

    /// Ask the loop to call [`Processor::run_ready_task`].
    ///
    /// Callable from any thread. Returns `false` without posting when a wake
    /// signal is already in flight; that signal is consumed only after the
    /// caller's preceding queue write, so it will observe it.
    pub fn request_wake(&self) -> bool {
        if self.wake_pending.swap(true, Ordering::AcqRel) {
            self.counters.wakes_debounced.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.state.lock().messages.push_back(Message::Wake);
        self.signal.notify_one();
        self.counters.wakes_posted.fetch_add(1, Ordering::Relaxed);
        trace!("wake posted");
        true
    }

    /// Arm the one-shot timer to fire `delay_ms` from now, replacing any
    /// timer already armed.
    pub fn arm_timer(&self, delay_ms: u64) {
        let deadline = self.clock.now_ms().saturating_add(delay_ms);
        self.state.lock().timer = Some(deadline);
        self.signal.notify_one();
        self.counters.timers_armed.fetch_add(1, Ordering::Relaxed);
        trace!(delay_ms, deadline, "timer armed");
    }

    /// Arm the timer for `delay_ms` unless an armed timer already fires no
    /// later than that. Returns whether the timer was (re)armed.
    pub fn request_timer(&self, delay_ms: u64) -> bool {
        let deadline = self.clock.now_ms().saturating_add(delay_ms);
        {
            let mut state = self.state.lock();
            if state.timer.is_some_and(|armed| armed <= deadline) {
                return false;
            }
            state.timer = Some(deadline);
        }
        self.signal.notify_one();
        self.counters.timers_armed.fetch_add(1, Ordering::Relaxed);
        trace!(delay_ms, deadline, "timer armed");
        true
    }

    /// Disarm the timer. Returns whether one was armed.
    pub fn disarm_timer(&self) -> bool {
        self.state.lock().timer.take().is_some()
    }

    /// Post a host event to be dispatched on the loop thread.
    ///
    /// Callable from any thread, including before the loop runs. A panic
    /// inside `event` is caught and logged.
    pub fn post_native_event<F>(&self, event: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.state
            .lock()
            .messages
            .push_back(Message::Native(Box::new(event)));
        self.signal.notify_one();
    }

    /// Whether a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().phase == Phase::Running
    }

    /// Whether a wake signal is currently in flight.
    #[must_use]
    pub fn wake_pending(&self) -> bool {
        self.wake_pending.load(Ordering::Acquire)
    }

    /// Absolute deadline of the armed timer, if any.
    #[must_use]
    pub fn timer_deadline(&self) -> Option<u64> {
        self.state.lock().timer
    }

    /// Snapshot of loop activity counters.
    #[must_use]
    pub fn stats(&self) -> LoopStats {
        self.counters.snapshot()
    }

    fn run_loop(&self, processor: &dyn Processor) {
        loop {
            let more_work = self.process_next_event(processor);
            if self.quit_requested() {
                break;
            }
            if more_work {
                continue;
            }

            let more_idle_work = processor.run_idle();
            if self.quit_requested() {
                break;
            }
            if more_idle_work {
                continue;
            }

            self.wait_for_work();
        }
    }

    fn quit_requested(&self) -> bool {
        self.state.lock().quit_requested
    }

    /// Handle at most one event. Returns whether one was handled.
    fn process_next_event(&self, processor: &dyn Processor) -> bool {
        let event = {
            let mut state = self.state.lock();
            if state.quit_requested {
                return false;
            }
            let now = self.clock.now_ms();
            if state.timer.is_some_and(|deadline| deadline <= now) {
                state.timer = None;
                Some(LoopEvent::Timer)
            } else {
                state.messages.pop_front().map(LoopEvent::Message)
            }
        };

        match event {
            None => false,
            Some(LoopEvent::Timer) => {
                self.handle_timer(processor);
                true
            }
            Some(LoopEvent::Message(Message::Wake)) => {
                self.handle_wake(processor);
                true
            }
            Some(LoopEvent::Message(Message::Native(event))) => {
                self.dispatch_native(event);
                true
            }
        }
    }

    fn handle_wake(&self, processor: &dyn Processor) {
        self.wake_pending.store(false, Ordering::Release);
        self.counters.wakes_handled.fetch_add(1, Ordering::Relaxed);

        if processor.run_ready_task() {
            self.request_wake();
        }
    }

    fn handle_timer(&self, processor: &dyn Processor) {
        self.counters.timer_fires.fetch_add(1, Ordering::Relaxed);

        if let Some(next_delay_ms) = processor.run_due_delayed_tasks() {
            self.request_timer(next_delay_ms);
        }
    }

    fn dispatch_native(&self, event: NativeEvent) {
        self.counters.native_dispatched.fetch_add(1, Ordering::Relaxed);
        if let Err(payload) = catch_unwind(AssertUnwindSafe(event)) {
            error!(
                panic = %panic_message(payload.as_ref()),
                "native event handler panicked"
            );
        }
    }

    /// Block until a message, a quit request, or the timer deadline.
    fn wait_for_work(&self) {
        let mut state = self.state.lock();
        loop {
            if state.quit_requested || !state.messages.is_empty() {
                return;
            }
            match state.timer {
                None => self.signal.wait(&mut state),
                Some(deadline) => {
                    let now = self.clock.now_ms();
                    if deadline <= now {
                        return;
                    }
                    let _ = self
                        .signal
                        .wait_for(&mut state, Duration::from_millis(deadline - now));
                }
            }
        }
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventLoop")
            .field("phase", &state.phase)
            .field("pending_messages", &state.messages.len())
            .field("timer", &state.timer)
            .field("wake_pending", &self.wake_pending.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        let pending = self.state.get_mut().messages.len();
        if pending > 0 {
            info!(pending, "event loop dropped with undelivered messages");
        }
    }
}
