//! Aggregate query text.
//!
//! Table and column names are spliced into the SQL, so every identifier is
//! checked with [`validate_sql_identifier`] before it is used. Values are
//! always bound as parameters.

use shardq_core::{Error, Result};

/// PostgreSQL truncates names longer than this many bytes
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Check that `name` can be spliced into SQL unquoted.
///
/// Only ASCII letters, digits and `_` are allowed, and a digit may not come
/// first.
///
/// ```
/// use shardq_pg::query::validate_sql_identifier;
///
/// assert!(validate_sql_identifier("cpu_usage").is_ok());
/// assert!(validate_sql_identifier("x; DROP TABLE cpu_usage--").is_err());
/// assert!(validate_sql_identifier("1st").is_err());
/// ```
pub fn validate_sql_identifier(name: &str) -> Result<()> {
    let reject = |reason: String| -> Result<()> {
        Err(Error::config(format!("identifier {:?} rejected: {}", name, reason)))
    };

    if name.is_empty() {
        return reject("empty".to_string());
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return reject(format!("{} bytes, limit is {}", name.len(), MAX_IDENTIFIER_LEN));
    }
    for (pos, c) in name.char_indices() {
        let allowed = c == '_' || c.is_ascii_alphabetic() || (pos > 0 && c.is_ascii_digit());
        if !allowed {
            return reject(format!("unexpected {:?} at byte {}", c, pos));
        }
    }
    Ok(())
}

/// Per-window MAX/MIN query over a time-series table.
///
/// Parameters: `$1` window start, `$2` window end (both inclusive), `$3` host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateQuery {
    /// Hypertable name
    pub table: String,
    /// Column aggregated with MAX and MIN
    pub value_column: String,
    /// Column holding the host key
    pub host_column: String,
    /// Timestamp column
    pub time_column: String,
}

impl Default for AggregateQuery {
    fn default() -> Self {
        Self {
            table: "cpu_usage".into(),
            value_column: "usage".into(),
            host_column: "host".into(),
            time_column: "ts".into(),
        }
    }
}

impl AggregateQuery {
    /// Query over `cpu_usage(ts, host, usage)`
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the aggregated column
    pub fn with_value_column(mut self, column: impl Into<String>) -> Self {
        self.value_column = column.into();
        self
    }

    /// Set the host column
    pub fn with_host_column(mut self, column: impl Into<String>) -> Self {
        self.host_column = column.into();
        self
    }

    /// Set the timestamp column
    pub fn with_time_column(mut self, column: impl Into<String>) -> Self {
        self.time_column = column.into();
        self
    }

    /// Validate every identifier
    pub fn validate(&self) -> Result<()> {
        validate_sql_identifier(&self.table)?;
        validate_sql_identifier(&self.value_column)?;
        validate_sql_identifier(&self.host_column)?;
        validate_sql_identifier(&self.time_column)?;
        Ok(())
    }

    /// SQL text; call [`validate`](Self::validate) first
    pub fn sql(&self) -> String {
        format!(
            "SELECT MAX({value})::float8, MIN({value})::float8 FROM {table} \
             WHERE {time} >= $1::timestamp AND {time} <= $2::timestamp AND {host} = $3",
            value = self.value_column,
            table = self.table,
            time = self.time_column,
            host = self.host_column,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sql() {
        assert_eq!(
            AggregateQuery::new().sql(),
            "SELECT MAX(usage)::float8, MIN(usage)::float8 FROM cpu_usage \
             WHERE ts >= $1::timestamp AND ts <= $2::timestamp AND host = $3"
        );
    }

    #[test]
    fn test_custom_identifiers() {
        let query = AggregateQuery::new()
            .with_table("metrics")
            .with_value_column("mem_used")
            .with_host_column("node")
            .with_time_column("time");

        assert!(query.validate().is_ok());
        let sql = query.sql();
        assert!(sql.contains("MAX(mem_used)"));
        assert!(sql.contains("FROM metrics"));
        assert!(sql.contains("time >= $1::timestamp AND time <= $2::timestamp"));
        assert!(sql.ends_with("node = $3"));
    }

    #[test]
    fn test_rejects_injection() {
        let query = AggregateQuery::new().with_table("cpu_usage; DROP TABLE cpu_usage");
        assert!(query.validate().is_err());

        let query = AggregateQuery::new().with_value_column("usage)--");
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_identifier_rules() {
        assert!(validate_sql_identifier("_private").is_ok());
        assert!(validate_sql_identifier("t123").is_ok());
        assert!(validate_sql_identifier("").is_err());
        assert!(validate_sql_identifier("123abc").is_err());
        assert!(validate_sql_identifier("bad-name").is_err());
        assert!(validate_sql_identifier(&"a".repeat(63)).is_ok());
        assert!(validate_sql_identifier(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_identifier_error_points_at_offending_char() {
        let err = validate_sql_identifier("usage)--").unwrap_err();
        assert_eq!(err.category(), shardq_core::ErrorCategory::Configuration);
        assert!(err.to_string().contains("unexpected ')' at byte 5"));

        let err = validate_sql_identifier("9lives").unwrap_err();
        assert!(err.to_string().contains("at byte 0"));
    }
}
