//! Query input file.
//!
//! Format: one `host,start_time,end_time` record per line, timestamps as
//! `YYYY-MM-DD HH:MM:SS`. The first line is a header and is always skipped.
//! Blank lines are ignored and fields are trimmed.

use chrono::NaiveDateTime;
use shardq_core::QueryTask;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Timestamp format used in input and output records
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Input file errors
#[derive(Debug, Error)]
pub enum InputError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Input path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Wrong number of fields
    #[error("line {line}: expected 3 fields (host,start_time,end_time), found {found}")]
    FieldCount {
        /// 1-based line number
        line: usize,
        /// Fields found
        found: usize,
    },

    /// Host field is empty
    #[error("line {line}: host is empty")]
    EmptyHost {
        /// 1-based line number
        line: usize,
    },

    /// Timestamp could not be parsed
    #[error("line {line}: invalid {field} '{value}' (expected YYYY-MM-DD HH:MM:SS)")]
    Timestamp {
        /// 1-based line number
        line: usize,
        /// `start_time` or `end_time`
        field: &'static str,
        /// Raw value
        value: String,
        /// Parser error
        #[source]
        source: chrono::ParseError,
    },

    /// No records after the header
    #[error("{path}: no query records")]
    Empty {
        /// Input path
        path: PathBuf,
    },
}

fn unquote(field: &str) -> &str {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
}

fn parse_timestamp(value: &str, field: &'static str, line: usize) -> Result<NaiveDateTime, InputError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|source| InputError::Timestamp {
        line,
        field,
        value: value.to_string(),
        source,
    })
}

/// Parse input text into tasks, in input order
pub fn parse_tasks(text: &str) -> Result<Vec<QueryTask>, InputError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut tasks = Vec::new();

    for (idx, raw) in text.lines().enumerate().skip(1) {
        let line = idx + 1;
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let fields: Vec<&str> = raw.split(',').map(unquote).collect();
        if fields.len() != 3 {
            return Err(InputError::FieldCount {
                line,
                found: fields.len(),
            });
        }
        if fields[0].is_empty() {
            return Err(InputError::EmptyHost { line });
        }

        let start = parse_timestamp(fields[1], "start_time", line)?;
        let end = parse_timestamp(fields[2], "end_time", line)?;
        if end < start {
            tracing::warn!(line, host = fields[0], "end_time is before start_time, no windows");
        }
        tasks.push(QueryTask::new(fields[0], start, end));
    }

    Ok(tasks)
}

/// Read and parse `path`; an input without records is an error
pub fn load_tasks(path: &Path) -> Result<Vec<QueryTask>, InputError> {
    let text = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let tasks = parse_tasks(&text)?;
    if tasks.is_empty() {
        return Err(InputError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn test_parse_skips_header_and_blank_lines() {
        let text = "hostname,start_time,end_time\n\
                    host_000008,2017-01-01 08:59:22,2017-01-01 09:59:22\n\
                    \n\
                    host_000001, 2017-01-02 13:02:02 ,2017-01-02 14:02:02\r\n";
        let tasks = parse_tasks(text).unwrap();

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].host, "host_000008");
        assert_eq!(tasks[0].start, ts("2017-01-01 08:59:22"));
        assert_eq!(tasks[1].host, "host_000001");
        assert_eq!(tasks[1].end, ts("2017-01-02 14:02:02"));
    }

    #[test]
    fn test_header_only() {
        assert!(parse_tasks("hostname,start_time,end_time\n").unwrap().is_empty());
        assert!(parse_tasks("").unwrap().is_empty());
    }

    #[test]
    fn test_quoted_fields_and_bom() {
        let text = "\u{feff}hostname,start_time,end_time\n\"h1\",\"2017-01-01 00:00:00\",\"2017-01-01 00:01:00\"";
        let tasks = parse_tasks(text).unwrap();
        assert_eq!(tasks[0].host, "h1");
    }

    #[test]
    fn test_field_count_error_names_line() {
        let text = "hostname,start_time,end_time\nh1,2017-01-01 00:00:00\n";
        let err = parse_tasks(text).unwrap_err();
        assert!(matches!(err, InputError::FieldCount { line: 2, found: 2 }));
        assert!(err.to_string().starts_with("line 2:"));
    }

    #[test]
    fn test_bad_timestamp() {
        let text = "h,s,e\nh1,2017-01-01 00:00:00,2017-13-01 00:00:00\n";
        let err = parse_tasks(text).unwrap_err();
        assert!(matches!(
            err,
            InputError::Timestamp {
                line: 2,
                field: "end_time",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_host() {
        let text = "h,s,e\n ,2017-01-01 00:00:00,2017-01-01 00:01:00\n";
        assert!(matches!(
            parse_tasks(text).unwrap_err(),
            InputError::EmptyHost { line: 2 }
        ));
    }

    #[test]
    fn test_load_tasks_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hostname,start_time,end_time").unwrap();
        writeln!(file, "host_000002,2017-01-01 08:00:00,2017-01-01 08:03:00").unwrap();

        let tasks = load_tasks(file.path()).unwrap();
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn test_load_tasks_rejects_empty_and_missing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hostname,start_time,end_time").unwrap();
        assert!(matches!(
            load_tasks(file.path()).unwrap_err(),
            InputError::Empty { .. }
        ));

        assert!(matches!(
            load_tasks(Path::new("/nonexistent/shardq/input.csv")).unwrap_err(),
            InputError::Io { .. }
        ));
    }
}
