//! # shardq-core
//!
//! Host-partitioned concurrent query scheduler.
//!
//! Every task names a host and a time interval. The scheduler splits each
//! interval into fixed-size sub-windows and runs one aggregate query per
//! sub-window on a pool of workers. Hosts are pinned to workers by a
//! deterministic hash, so all queries for a host run on the same worker, on
//! the same store session, in submission order.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shardq_core::prelude::*;
//! use std::sync::Arc;
//!
//! let config = SchedulerConfig::new(4).with_window_secs(60);
//! let dispatcher = Dispatcher::new(config, Arc::new(my_factory));
//!
//! let report = dispatcher.run(tasks).await?;
//! if let Some(stats) = report.stats() {
//!     println!("{stats}");
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `prometheus` - Prometheus exporter for the scheduler metrics

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod assignment;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod hash;
pub mod metrics;
pub mod queue;
pub mod sink;
pub mod stats;
pub mod task;
pub mod window;
pub mod worker;

pub use assignment::AssignmentTable;
pub use config::{QueryErrorPolicy, SchedulerConfig};
pub use dispatcher::{build_assignment, Dispatcher, RunReport, WorkerReport};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{ExecutorFactory, QueryExecutor};
pub use hash::assign_worker;
pub use sink::{LatencyLog, ResultSink};
pub use stats::LatencyStats;
pub use task::{Aggregate, QueryFailure, QueryResult, QueryTask};
pub use window::{Window, WindowSplitter, Windows, DEFAULT_WINDOW_SECS};
pub use worker::{WorkerState, WorkerSummary};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assignment::AssignmentTable;
    pub use crate::config::{QueryErrorPolicy, SchedulerConfig};
    pub use crate::dispatcher::{build_assignment, Dispatcher, RunReport, WorkerReport};
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::executor::{ExecutorFactory, QueryExecutor};
    pub use crate::stats::LatencyStats;
    pub use crate::task::{Aggregate, QueryFailure, QueryResult, QueryTask};
    pub use crate::window::{Window, WindowSplitter};
    pub use crate::worker::{WorkerState, WorkerSummary};
}
