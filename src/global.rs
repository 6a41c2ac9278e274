//! Process-wide scheduler.
//!
//! Prefer constructing a [`Scheduler`] and handing `Arc<Scheduler>` to the
//! code that needs it. When a single instance must be reachable from
//! anywhere, this module keeps one in a lazily initialized
//! [`OnceLock`](std::sync::OnceLock):
//!
//! - [`global`] creates it with the default configuration on first use
//! - [`init_global`] creates it with an explicit configuration, once
//!
//! The instance is never torn down; it lives until the process exits.
//!
//! ```no_run
//! use prometheus_task_loop::config::SchedulerConfig;
//! use prometheus_task_loop::global::{global, init_global};
//!
//! init_global(SchedulerConfig::new().with_name("ui"))?;
//!
//! global().submit(|| println!("Call Test()"))?;
//! global().submit(|| {
//!     global().stop(3);
//! })?;
//! assert_eq!(global().start(), 3);
//! # Ok::<(), prometheus_task_loop::core::SchedulerError>(())
//! ```

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::config::SchedulerConfig;
use crate::core::{Scheduler, SchedulerError};
use crate::util::clock::MonotonicClock;

static GLOBAL: OnceLock<Scheduler> = OnceLock::new();

/// The process-wide scheduler, created with defaults on first access.
pub fn global() -> &'static Scheduler {
    GLOBAL.get_or_init(|| {
        debug!("initializing global scheduler with default configuration");
        Scheduler::new()
    })
}

/// Create the process-wide scheduler from `config`.
///
/// # Errors
///
/// - `SchedulerError::InvalidConfig` if `config` does not validate
/// - `SchedulerError::AlreadyInitialized` if the scheduler already exists,
///   whether from an earlier call or from [`global`]
pub fn init_global(config: SchedulerConfig) -> Result<&'static Scheduler, SchedulerError> {
    config.validate().map_err(SchedulerError::InvalidConfig)?;

    let mut created = false;
    let scheduler = GLOBAL.get_or_init(|| {
        created = true;
        debug!(name = %config.name, "initializing global scheduler");
        Scheduler::build(config, Arc::new(MonotonicClock::new()))
    });

    if created {
        Ok(scheduler)
    } else {
        Err(SchedulerError::AlreadyInitialized)
    }
}

/// The process-wide scheduler if it has been created.
pub fn try_global() -> Option<&'static Scheduler> {
    GLOBAL.get()
}
