//! Scheduler configuration.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::AppResult;

/// Smallest stack accepted for a dedicated scheduler thread.
pub const MIN_THREAD_STACK_SIZE: usize = 16 * 1024;

const ENV_NAME: &str = "TASK_LOOP_NAME";
const ENV_MAX_QUEUE_DEPTH: &str = "TASK_LOOP_MAX_QUEUE_DEPTH";
const ENV_THREAD_STACK_SIZE: &str = "TASK_LOOP_THREAD_STACK_SIZE";

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Name used for the scheduler's log span and dedicated thread.
    pub name: String,
    /// Per-queue bound on pending tasks. `None` means unbounded.
    pub max_queue_depth: Option<usize>,
    /// Stack size for a dedicated scheduler thread. `None` uses the platform default.
    pub thread_stack_size: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "task-loop".to_string(),
            max_queue_depth: None,
            thread_stack_size: None,
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scheduler name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bound each queue to `depth` pending tasks.
    #[must_use]
    pub const fn with_max_queue_depth(mut self, depth: usize) -> Self {
        self.max_queue_depth = Some(depth);
        self
    }

    /// Set the stack size of a dedicated scheduler thread.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = Some(size);
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        if self.max_queue_depth == Some(0) {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if let Some(size) = self.thread_stack_size {
            if size < MIN_THREAD_STACK_SIZE {
                return Err(format!(
                    "thread_stack_size must be at least {MIN_THREAD_STACK_SIZE} bytes"
                ));
            }
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns a message on malformed JSON or invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the process environment, loading `.env` first.
    ///
    /// Reads `TASK_LOOP_NAME`, `TASK_LOOP_MAX_QUEUE_DEPTH` and
    /// `TASK_LOOP_THREAD_STACK_SIZE`; unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Fails if a variable does not parse or the result is invalid.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Fails if a value does not parse or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(name) = lookup(ENV_NAME) {
            cfg.name = name;
        }
        if let Some(depth) = lookup(ENV_MAX_QUEUE_DEPTH) {
            let depth = depth
                .trim()
                .parse::<usize>()
                .with_context(|| format!("{ENV_MAX_QUEUE_DEPTH}={depth:?} is not a number"))?;
            cfg.max_queue_depth = Some(depth);
        }
        if let Some(size) = lookup(ENV_THREAD_STACK_SIZE) {
            let size = size
                .trim()
                .parse::<usize>()
                .with_context(|| format!("{ENV_THREAD_STACK_SIZE}={size:?} is not a number"))?;
            cfg.thread_stack_size = Some(size);
        }
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}
