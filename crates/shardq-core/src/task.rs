//! Task and result records.

use crate::window::Window;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One unit of submitted work: aggregate `host` over `[start, end)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTask {
    /// Partition key
    pub host: String,
    /// Interval start
    pub start: NaiveDateTime,
    /// Interval end
    pub end: NaiveDateTime,
}

impl QueryTask {
    /// Create a task
    pub fn new(host: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            host: host.into(),
            start,
            end,
        }
    }
}

/// Aggregate values returned by the store for one window.
///
/// Both values are `None` when the window holds no rows.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aggregate {
    /// Maximum value in the window
    pub max: Option<f64>,
    /// Minimum value in the window
    pub min: Option<f64>,
}

impl Aggregate {
    /// Create an aggregate
    pub fn new(max: Option<f64>, min: Option<f64>) -> Self {
        Self { max, min }
    }
}

/// Result of one sub-window query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Worker that executed the query
    pub worker_id: usize,
    /// Host the query was for
    pub host: String,
    /// Window start
    pub window_start: NaiveDateTime,
    /// Window end
    pub window_end: NaiveDateTime,
    /// Maximum value in the window
    pub max_value: Option<f64>,
    /// Minimum value in the window
    pub min_value: Option<f64>,
}

impl QueryResult {
    /// Build a result from a window and its aggregate
    pub fn new(worker_id: usize, host: impl Into<String>, window: Window, agg: Aggregate) -> Self {
        Self {
            worker_id,
            host: host.into(),
            window_start: window.start,
            window_end: window.end,
            max_value: agg.max,
            min_value: agg.min,
        }
    }

    /// The window this result covers
    pub fn window(&self) -> Window {
        Window::new(self.window_start, self.window_end)
    }
}

/// A sub-window query that did not produce a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFailure {
    /// Worker that ran the query
    pub worker_id: usize,
    /// Host the query was for
    pub host: String,
    /// Window start
    pub window_start: NaiveDateTime,
    /// Window end
    pub window_end: NaiveDateTime,
    /// Error category (see [`crate::ErrorCategory`])
    pub category: String,
    /// Error message
    pub error: String,
}

impl QueryFailure {
    /// Record a failure for `window`
    pub fn new(
        worker_id: usize,
        host: impl Into<String>,
        window: Window,
        error: &crate::Error,
    ) -> Self {
        Self {
            worker_id,
            host: host.into(),
            window_start: window.start,
            window_end: window.end,
            category: error.category().to_string(),
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_query_result_from_window() {
        let window = Window::new(ts("2024-01-01 00:00:00"), ts("2024-01-01 00:01:00"));
        let result = QueryResult::new(2, "host_000001", window, Aggregate::new(Some(90.5), Some(3.0)));

        assert_eq!(result.worker_id, 2);
        assert_eq!(result.window(), window);
        assert_eq!(result.max_value, Some(90.5));
        assert_eq!(result.min_value, Some(3.0));
    }

    #[test]
    fn test_query_failure_captures_category() {
        let window = Window::new(ts("2024-01-01 00:00:00"), ts("2024-01-01 00:01:00"));
        let failure = QueryFailure::new(0, "h", window, &crate::Error::timeout("5s elapsed"));

        assert_eq!(failure.category, "timeout");
        assert!(failure.error.contains("5s elapsed"));
    }

    #[test]
    fn test_empty_aggregate() {
        let agg = Aggregate::default();
        assert!(agg.max.is_none());
        assert!(agg.min.is_none());
    }

    #[test]
    fn test_failure_serializes_for_reports() {
        let window = Window::new(ts("2024-01-01 00:00:00"), ts("2024-01-01 00:01:00"));
        let failure = QueryFailure::new(3, "h", window, &crate::Error::query("syntax error"));
        let json = serde_json::to_value(&failure).unwrap();

        assert_eq!(json["worker_id"], 3);
        assert_eq!(json["window_start"], "2024-01-01T00:00:00");
        assert_eq!(json["category"], "query");

        let back: QueryFailure = serde_json::from_value(json).unwrap();
        assert_eq!(back, failure);
    }
}
