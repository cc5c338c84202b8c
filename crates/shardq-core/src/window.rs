//! Sub-window decomposition of a query interval.
//!
//! A task's `[start, end)` interval is cut into back-to-back windows of a
//! fixed size, each of which becomes one aggregation query.
//!
//! ## Trailing remainder
//!
//! A window is emitted only when the *whole* window fits before `end`. A
//! trailing remainder shorter than the window size produces no query. This
//! truncation is intentional: every query covers exactly one full window, so
//! per-window aggregates stay comparable across hosts and runs.
//!
//! ```
//! use chrono::NaiveDateTime;
//! use shardq_core::window::WindowSplitter;
//!
//! let ts = |s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap();
//! let splitter = WindowSplitter::default(); // 60 seconds
//!
//! // 90 seconds: one full window, the last 30 seconds are dropped
//! let windows: Vec<_> = splitter
//!     .split(ts("2024-01-01 00:00:00"), ts("2024-01-01 00:01:30"))
//!     .collect();
//! assert_eq!(windows.len(), 1);
//! ```

use crate::error::{Error, Result};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;

/// Default sub-window size in seconds
pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// One sub-window `[start, end)` of a task interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Window {
    /// Inclusive start
    pub start: NaiveDateTime,
    /// End of the window (`start + size`)
    pub end: NaiveDateTime,
}

impl Window {
    /// Create a window
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Window length
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

/// Splits intervals into fixed-size windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSplitter {
    size: TimeDelta,
}

impl Default for WindowSplitter {
    fn default() -> Self {
        Self {
            size: TimeDelta::seconds(DEFAULT_WINDOW_SECS as i64),
        }
    }
}

impl WindowSplitter {
    /// Create a splitter; the window size must be positive
    pub fn new(size: TimeDelta) -> Result<Self> {
        if size <= TimeDelta::zero() {
            return Err(Error::config(format!(
                "window size must be positive, got {size}"
            )));
        }
        Ok(Self { size })
    }

    /// Create a splitter from a size in whole seconds
    pub fn from_secs(secs: u64) -> Result<Self> {
        let secs = i64::try_from(secs)
            .map_err(|_| Error::config(format!("window size too large: {secs}s")))?;
        let size = TimeDelta::try_seconds(secs)
            .ok_or_else(|| Error::config(format!("window size too large: {secs}s")))?;
        Self::new(size)
    }

    /// Window size
    #[inline]
    pub fn size(&self) -> TimeDelta {
        self.size
    }

    /// Lazily split `[start, end)` into full windows
    pub fn split(&self, start: NaiveDateTime, end: NaiveDateTime) -> Windows {
        Windows {
            next_start: start,
            end,
            size: self.size,
        }
    }

    /// Number of windows `split(start, end)` yields, without iterating
    pub fn window_count(&self, start: NaiveDateTime, end: NaiveDateTime) -> usize {
        let span = end.signed_duration_since(start);
        if span < self.size {
            return 0;
        }
        match (span.num_nanoseconds(), self.size.num_nanoseconds()) {
            (Some(span), Some(size)) => (span / size) as usize,
            // Spans beyond ~292 years overflow nanoseconds
            _ => (span.num_milliseconds() / self.size.num_milliseconds().max(1)) as usize,
        }
    }
}

/// Split `[start, end)` into windows of `size`.
pub fn split(start: NaiveDateTime, end: NaiveDateTime, size: TimeDelta) -> Result<Windows> {
    Ok(WindowSplitter::new(size)?.split(start, end))
}

/// Iterator over the windows of one interval.
///
/// Cloning restarts nothing: a clone continues from the same position. To
/// regenerate the sequence, call [`WindowSplitter::split`] again.
#[derive(Debug, Clone)]
pub struct Windows {
    next_start: NaiveDateTime,
    end: NaiveDateTime,
    size: TimeDelta,
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        let window_end = self.next_start.checked_add_signed(self.size)?;
        if window_end > self.end {
            return None;
        }
        let window = Window::new(self.next_start, window_end);
        self.next_start = window_end;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = WindowSplitter { size: self.size }.window_count(self.next_start, self.end);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows {}

impl FusedIterator for Windows {}
