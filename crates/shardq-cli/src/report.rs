//! Run output: per-query JSON records and the stdout summary

use crate::input::TIMESTAMP_FORMAT;
use serde::Serialize;
use shardq_core::{QueryResult, RunReport};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

const BANNER: &str = "==========================================================";

/// One line of the output file
#[derive(Debug, Serialize)]
pub struct OutputRecord<'a> {
    /// Worker that ran the query
    pub worker: usize,
    /// Host
    pub host: &'a str,
    /// Window start
    pub start_time: String,
    /// Window end
    pub end_time: String,
    /// MAX over the window; `null` when the window has no rows
    pub max_cpu_usage: Option<f64>,
    /// MIN over the window; `null` when the window has no rows
    pub min_cpu_usage: Option<f64>,
}

impl<'a> From<&'a QueryResult> for OutputRecord<'a> {
    fn from(result: &'a QueryResult) -> Self {
        Self {
            worker: result.worker_id,
            host: &result.host,
            start_time: result.window_start.format(TIMESTAMP_FORMAT).to_string(),
            end_time: result.window_end.format(TIMESTAMP_FORMAT).to_string(),
            max_cpu_usage: result.max_value,
            min_cpu_usage: result.min_value,
        }
    }
}

/// Write one JSON object per result, one per line
pub fn write_results<W: Write>(mut writer: W, results: &[QueryResult]) -> io::Result<()> {
    for result in results {
        serde_json::to_writer(&mut writer, &OutputRecord::from(result))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// Create (or truncate) `path` and write all results to it
pub fn write_results_file(path: &Path, results: &[QueryResult]) -> io::Result<()> {
    let file = File::create(path)?;
    write_results(BufWriter::new(file), results)
}

/// Human-readable run summary
pub fn render_summary(report: &RunReport, output: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", BANNER);

    match report.stats() {
        Some(stats) => {
            let _ = writeln!(out, "Total number of queries: {}", stats.count);
            let _ = writeln!(
                out,
                "Total processing time of all queries: {:.6}s",
                stats.total.as_secs_f64()
            );
            let _ = writeln!(out, "Minimum query time: {:.6}s", stats.min.as_secs_f64());
            let _ = writeln!(out, "Maximum query time: {:.6}s", stats.max.as_secs_f64());
            let _ = writeln!(out, "Average query time: {:.6}s", stats.mean.as_secs_f64());
            let _ = writeln!(out, "Median query time: {:.6}s", stats.median.as_secs_f64());
            let _ = writeln!(out, "95th percentile query time: {:.6}s", stats.p95.as_secs_f64());
            let _ = writeln!(out, "99th percentile query time: {:.6}s", stats.p99.as_secs_f64());
        }
        None => {
            let _ = writeln!(out, "No queries were executed");
        }
    }

    if !report.failures.is_empty() {
        let _ = writeln!(out, "Failed queries: {}", report.failures.len());
    }
    if report.abandoned > 0 {
        let _ = writeln!(out, "Abandoned tasks: {}", report.abandoned);
        let _ = writeln!(out, "Failed workers: {:?}", report.failed_workers());
    }
    if report.skipped > 0 {
        let _ = writeln!(out, "Skipped tasks (cancelled): {}", report.skipped);
    }
    let _ = writeln!(out, "Wall-clock time: {:.3}s", report.elapsed.as_secs_f64());
    let _ = writeln!(out, "{}", BANNER);
    let _ = write!(
        out,
        "Please refer `{}` file for more details on query results",
        output.display()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use shardq_core::{build_assignment, Aggregate, LatencyLog, Window};
    use std::time::Duration;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    fn result(max: Option<f64>) -> QueryResult {
        QueryResult::new(
            1,
            "host_000008",
            Window::new(ts("2017-01-01 08:59:22"), ts("2017-01-01 09:00:22")),
            Aggregate::new(max, max.map(|m| m / 2.0)),
        )
    }

    fn report(latencies: Vec<Duration>) -> RunReport {
        RunReport {
            results: Vec::new(),
            latencies: LatencyLog::from(latencies),
            failures: Vec::new(),
            tasks_dispatched: 1,
            abandoned: 0,
            skipped: 0,
            assignment: build_assignment(["host_000008"], 2).unwrap(),
            workers: Vec::new(),
            elapsed: Duration::from_millis(1500),
        }
    }

    #[test]
    fn test_output_record_format() {
        let mut buf = Vec::new();
        write_results(&mut buf, &[result(Some(90.5)), result(None)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"worker":1,"host":"host_000008","start_time":"2017-01-01 08:59:22","end_time":"2017-01-01 09:00:22","max_cpu_usage":90.5,"min_cpu_usage":45.25}"#
        );
        let empty: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert!(empty["max_cpu_usage"].is_null());
        assert!(empty["min_cpu_usage"].is_null());
    }

    #[test]
    fn test_write_results_file_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.log");
        std::fs::write(&path, "stale\nstale\nstale\n").unwrap();

        write_results_file(&path, &[result(Some(1.0))]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(!text.contains("stale"));
    }

    #[test]
    fn test_summary_with_queries() {
        let report = report(
            [100, 200, 300, 400]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
        );
        let summary = render_summary(&report, Path::new("output.log"));

        assert!(summary.starts_with(BANNER));
        assert!(summary.contains("Total number of queries: 4"));
        assert!(summary.contains("Total processing time of all queries: 1.000000s"));
        assert!(summary.contains("Average query time: 0.250000s"));
        assert!(summary.contains("Median query time: 0.250000s"));
        assert!(summary.ends_with("`output.log` file for more details on query results"));
        assert!(!summary.contains("Abandoned"));
    }

    #[test]
    fn test_summary_without_queries() {
        let mut report = report(Vec::new());
        report.abandoned = 3;
        let summary = render_summary(&report, Path::new("out.jsonl"));

        assert!(summary.contains("No queries were executed"));
        assert!(summary.contains("Abandoned tasks: 3"));
        assert!(!summary.contains("Average"));
    }
}
