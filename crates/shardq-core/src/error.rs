//! Error types for shardq-core
//!
//! Errors are classified so callers can tell what is fatal for a run:
//! - Fatal before any worker starts (configuration)
//! - Fatal for the run (connection acquisition)
//! - Fatal for one worker (connection lost mid-run)
//! - Local to one sub-window query (query, timeout)

use std::fmt;
use thiserror::Error;

/// Result type for shardq-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid configuration or input (reported before workers start)
    Configuration,
    /// Could not acquire a store session
    Connection,
    /// Store session dropped while a worker was using it
    ConnectionLost,
    /// A single query failed
    Query,
    /// A single query exceeded its deadline
    Timeout,
    /// The run was cancelled
    Cancelled,
    /// Worker task crashed or stopped unexpectedly
    Worker,
}

impl ErrorCategory {
    /// Whether errors in this category are local to a single sub-window query
    #[inline]
    pub const fn is_query_local(self) -> bool {
        matches!(self, Self::Query | Self::Timeout)
    }

    /// Whether a worker that hits this error can keep consuming its queue
    #[inline]
    pub const fn is_worker_fatal(self) -> bool {
        matches!(self, Self::Connection | Self::ConnectionLost | Self::Worker)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Connection => write!(f, "connection"),
            Self::ConnectionLost => write!(f, "connection_lost"),
            Self::Query => write!(f, "query"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Worker => write!(f, "worker"),
        }
    }
}

/// Main error type for shardq-core
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Invalid configuration or input
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Connection could not be established
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connection dropped while in use
    #[error("connection lost: {message}")]
    ConnectionLost {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution failed
    #[error("query error: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query timed out
    #[error("timeout: {message}")]
    Timeout { message: String },

    /// Run was cancelled
    #[error("cancelled")]
    Cancelled,

    /// A worker failed to start
    #[error("worker {worker} failed: {source}")]
    WorkerStartup {
        worker: usize,
        #[source]
        source: Box<Error>,
    },

    /// A worker stopped unexpectedly
    #[error("worker error: {message}")]
    Worker { message: String },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::ConnectionLost { .. } => ErrorCategory::ConnectionLost,
            Self::Query { .. } => ErrorCategory::Query,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::WorkerStartup { source, .. } => source.category(),
            Self::Worker { .. } => ErrorCategory::Worker,
        }
    }

    /// Whether this error only affects the sub-window query that raised it
    #[inline]
    pub fn is_query_local(&self) -> bool {
        self.category().is_query_local()
    }

    /// Whether this error stops the worker that raised it
    #[inline]
    pub fn is_worker_fatal(&self) -> bool {
        self.category().is_worker_fatal()
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a connection-lost error
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::ConnectionLost {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection-lost error with source
    pub fn connection_lost_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConnectionLost {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            source: None,
        }
    }

    /// Create a query error with source
    pub fn query_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Query {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Wrap an error raised while starting a worker
    pub fn worker_startup(worker: usize, source: Error) -> Self {
        Self::WorkerStartup {
            worker,
            source: Box::new(source),
        }
    }

    /// Create a worker error
    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker {
            message: message.into(),
        }
    }
}
