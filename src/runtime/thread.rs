//! Running a scheduler on its own OS thread.

use std::ops::Deref;
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::core::{Scheduler, SchedulerError};

/// Handle to a thread blocked in [`Scheduler::start`].
///
/// The thread is named after the scheduler config and uses its stack size.
/// It exits once something calls [`Scheduler::stop`] from a task or from
/// another thread while the scheduler is running.
///
/// ```
/// use std::sync::Arc;
/// use prometheus_task_loop::core::Scheduler;
/// use prometheus_task_loop::runtime::SchedulerThread;
///
/// let scheduler = Arc::new(Scheduler::new());
/// let thread = SchedulerThread::spawn(Arc::clone(&scheduler))?;
///
/// let stopper = Arc::clone(&scheduler);
/// scheduler.submit(move || {
///     stopper.stop(42);
/// })?;
///
/// assert_eq!(thread.join()?, 42);
/// # Ok::<(), prometheus_task_loop::core::SchedulerError>(())
/// ```
#[derive(Debug)]
pub struct SchedulerThread {
    name: String,
    handle: JoinHandle<i32>,
}

impl SchedulerThread {
    /// Spawn a thread that runs `scheduler.start()`.
    ///
    /// Accepts any owner of a scheduler that can move to another thread,
    /// such as `Arc<Scheduler>` or `&'static Scheduler`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Spawn` if the OS refuses to create the thread.
    pub fn spawn<S>(scheduler: S) -> Result<Self, SchedulerError>
    where
        S: Deref<Target = Scheduler> + Send + 'static,
    {
        let name = scheduler.config().name.clone();
        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(size) = scheduler.config().thread_stack_size {
            builder = builder.stack_size(size);
        }

        let handle = builder.spawn(move || {
            debug!("scheduler thread started");
            let code = scheduler.start();
            debug!(exit_code = code, "scheduler thread exiting");
            code
        })?;

        info!(name = %name, "scheduler thread spawned");
        Ok(Self { name, handle })
    }

    /// Thread name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the scheduler thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the scheduler to stop and return its exit code.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::ThreadPanicked` if the thread panicked.
    pub fn join(self) -> Result<i32, SchedulerError> {
        self.handle
            .join()
            .map_err(|_| SchedulerError::ThreadPanicked)
    }
}
