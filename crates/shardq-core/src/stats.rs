//! Latency statistics over a finished run.

use std::fmt;
use std::time::Duration;

/// Summary of per-query latencies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    /// Number of queries
    pub count: usize,
    /// Sum of all latencies
    pub total: Duration,
    /// Fastest query
    pub min: Duration,
    /// Slowest query
    pub max: Duration,
    /// Arithmetic mean
    pub mean: Duration,
    /// Median (mean of the two middle samples for an even count)
    pub median: Duration,
    /// 95th percentile, nearest-rank
    pub p95: Duration,
    /// 99th percentile, nearest-rank
    pub p99: Duration,
}

impl LatencyStats {
    /// Compute statistics; `None` when there are no samples
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let count = sorted.len();
        let total: Duration = sorted.iter().sum();
        let mean = Duration::from_nanos((total.as_nanos() / count as u128) as u64);

        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2
        };

        Some(Self {
            count,
            total,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median,
            p95: nearest_rank(&sorted, 95.0),
            p99: nearest_rank(&sorted, 99.0),
        })
    }
}

/// Nearest-rank percentile of a sorted, non-empty slice
fn nearest_rank(sorted: &[Duration], percentile: f64) -> Duration {
    let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

impl fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "count={} total={:.6}s min={:.6}s max={:.6}s mean={:.6}s median={:.6}s p95={:.6}s p99={:.6}s",
            self.count,
            self.total.as_secs_f64(),
            self.min.as_secs_f64(),
            self.max.as_secs_f64(),
            self.mean.as_secs_f64(),
            self.median.as_secs_f64(),
            self.p95.as_secs_f64(),
            self.p99.as_secs_f64(),
        )
    }
}
