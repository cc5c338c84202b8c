//! Shared result sink and latency log.
//!
//! All workers append concurrently; the dispatcher reads only after the
//! completion barrier. A result and its latency are written under the same
//! lock so the two sequences never disagree in length.

use crate::stats::LatencyStats;
use crate::task::{QueryFailure, QueryResult};
use parking_lot::Mutex;
use std::time::Duration;

/// Append-only per-query latency measurements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatencyLog {
    samples: Vec<Duration>,
}

impl LatencyLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one measurement
    pub fn push(&mut self, latency: Duration) {
        self.samples.push(latency);
    }

    /// Number of measurements
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the log holds no measurements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Measurements in append order
    pub fn as_slice(&self) -> &[Duration] {
        &self.samples
    }

    /// Summary statistics; `None` if no query was executed
    pub fn stats(&self) -> Option<LatencyStats> {
        LatencyStats::from_samples(&self.samples)
    }
}

impl From<Vec<Duration>> for LatencyLog {
    fn from(samples: Vec<Duration>) -> Self {
        Self { samples }
    }
}

#[derive(Debug, Default)]
struct SinkState {
    results: Vec<QueryResult>,
    latencies: LatencyLog,
    failures: Vec<QueryFailure>,
}

/// Everything a sink collected during a run
#[derive(Debug, Default)]
pub struct SinkContents {
    /// Per-query results, one per executed sub-window
    pub results: Vec<QueryResult>,
    /// Per-query latencies, parallel to `results`
    pub latencies: LatencyLog,
    /// Sub-windows whose query failed
    pub failures: Vec<QueryFailure>,
}

/// Thread-safe accumulator shared by all workers of a run
#[derive(Debug, Default)]
pub struct ResultSink {
    state: Mutex<SinkState>,
}

impl ResultSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result together with its latency
    pub fn record(&self, result: QueryResult, latency: Duration) {
        let mut state = self.state.lock();
        state.results.push(result);
        state.latencies.push(latency);
    }

    /// Append a failed query
    pub fn record_failure(&self, failure: QueryFailure) {
        self.state.lock().failures.push(failure);
    }

    /// Number of results recorded so far
    pub fn len(&self) -> usize {
        self.state.lock().results.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of failures recorded so far
    pub fn failure_count(&self) -> usize {
        self.state.lock().failures.len()
    }

    /// Take everything recorded, leaving the sink empty
    pub fn take(&self) -> SinkContents {
        let state = std::mem::take(&mut *self.state.lock());
        SinkContents {
            results: state.results,
            latencies: state.latencies,
            failures: state.failures,
        }
    }
}
