//! Scheduler configuration

use crate::error::{Error, Result};
use crate::window::{WindowSplitter, DEFAULT_WINDOW_SECS};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// What a worker does when a single sub-window query fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryErrorPolicy {
    /// Record the failure and continue with the next sub-window (default)
    #[default]
    Skip,
    /// Record the failure and drop the rest of the task
    AbortTask,
}

impl fmt::Display for QueryErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::AbortTask => write!(f, "abort-task"),
        }
    }
}

impl FromStr for QueryErrorPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort-task" | "abort_task" | "abort" => Ok(Self::AbortTask),
            other => Err(Error::config(format!(
                "unknown query error policy '{other}' (expected 'skip' or 'abort-task')"
            ))),
        }
    }
}

/// Configuration for one scheduler run
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of workers (and store sessions)
    pub worker_count: usize,
    /// Sub-window size
    pub window_size: TimeDelta,
    /// Deadline for a single query (`None` = no deadline)
    pub query_timeout: Option<Duration>,
    /// Deadline for a worker to open its session
    pub connect_timeout: Duration,
    /// How long to wait for workers to release their sessions after the run
    pub shutdown_timeout: Duration,
    /// Per-query error handling
    pub error_policy: QueryErrorPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            window_size: TimeDelta::seconds(DEFAULT_WINDOW_SECS as i64),
            query_timeout: None,
            connect_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(30),
            error_policy: QueryErrorPolicy::Skip,
        }
    }
}

impl SchedulerConfig {
    /// Create a config with `worker_count` workers and defaults elsewhere
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Default::default()
        }
    }

    /// Set the sub-window size
    pub fn with_window_size(mut self, size: TimeDelta) -> Self {
        self.window_size = size;
        self
    }

    /// Set the sub-window size in seconds, saturating at the largest
    /// representable window
    pub fn with_window_secs(mut self, secs: u64) -> Self {
        self.window_size = i64::try_from(secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        self
    }

    /// Set the per-query deadline
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Set the session connect deadline
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the shutdown deadline
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the query error policy
    pub fn with_error_policy(mut self, policy: QueryErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Splitter for the configured window size
    pub fn splitter(&self) -> Result<WindowSplitter> {
        WindowSplitter::new(self.window_size)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::config("worker count must be at least 1"));
        }
        self.splitter()?;
        if self.query_timeout == Some(Duration::ZERO) {
            return Err(Error::config("query timeout must be positive"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect timeout must be positive"));
        }
        Ok(())
    }
}
