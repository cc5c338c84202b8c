//! CLI argument parsing for shardq
//!
//! Every option can also be set through an environment variable; database
//! settings use the plain `DB_*` names.

use clap::{Parser, ValueEnum};
use shardq_core::{QueryErrorPolicy, SchedulerConfig};
use shardq_pg::{AggregateQuery, PgConfig};
use std::path::PathBuf;
use std::time::Duration;

/// shardq - host-partitioned time-series query runner
///
/// Reads `host,start_time,end_time` records, splits every interval into
/// fixed windows and runs a MAX/MIN query per window on a pool of workers.
/// All queries for one host run on the same worker, in input order.
#[derive(Parser, Debug)]
#[command(name = "shardq")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    // ============ Workload ============
    /// CSV file of `host,start_time,end_time` records (first line is a header)
    #[arg(short = 'q', long = "query-inp-file", alias = "query_inp_file", env = "SHARDQ_INPUT")]
    pub query_inp_file: PathBuf,

    /// Number of concurrent workers
    #[arg(short = 'n', long, alias = "num_workers", env = "SHARDQ_NUM_WORKERS")]
    pub num_workers: usize,

    /// Sub-window size in seconds
    #[arg(long, default_value = "60", env = "SHARDQ_WINDOW_SECS")]
    pub window_secs: u64,

    /// Per-query timeout in milliseconds (0 = none)
    #[arg(long, default_value = "0", env = "SHARDQ_QUERY_TIMEOUT_MS")]
    pub query_timeout_ms: u64,

    /// Session connect timeout in milliseconds
    #[arg(long, default_value = "10000", env = "SHARDQ_CONNECT_TIMEOUT_MS")]
    pub connect_timeout_ms: u64,

    /// What to do when a window query fails
    #[arg(long, default_value = "skip", env = "SHARDQ_ON_QUERY_ERROR")]
    pub on_query_error: OnQueryError,

    // ============ Database ============
    /// Database user
    #[arg(long, env = "DB_USER")]
    pub db_user: String,

    /// Database host
    #[arg(long, default_value = "localhost", env = "DB_HOST")]
    pub db_host: String,

    /// Database port
    #[arg(long, default_value = "5432", env = "DB_PORT")]
    pub db_port: u16,

    /// Database name
    #[arg(long, env = "DB_NAME")]
    pub db_name: String,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Table holding the time series
    #[arg(long, default_value = "cpu_usage")]
    pub table: String,

    /// Column aggregated with MAX/MIN
    #[arg(long, default_value = "usage")]
    pub value_column: String,

    /// Column holding the host
    #[arg(long, default_value = "host")]
    pub host_column: String,

    /// Timestamp column
    #[arg(long, default_value = "ts")]
    pub time_column: String,

    // ============ Output ============
    /// File receiving one JSON record per executed query
    #[arg(short, long, default_value = "output.log", env = "SHARDQ_OUTPUT")]
    pub output: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Prometheus metrics listen address
    #[cfg(feature = "prometheus")]
    #[arg(long, env = "SHARDQ_METRICS_ADDR")]
    pub metrics_addr: Option<std::net::SocketAddr>,
}

/// Query error handling, as accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OnQueryError {
    /// Record the failure and continue with the next window
    #[default]
    Skip,
    /// Record the failure and drop the rest of the task
    AbortTask,
}

impl From<OnQueryError> for QueryErrorPolicy {
    fn from(value: OnQueryError) -> Self {
        match value {
            OnQueryError::Skip => QueryErrorPolicy::Skip,
            OnQueryError::AbortTask => QueryErrorPolicy::AbortTask,
        }
    }
}

impl Cli {
    /// Validate argument combinations clap cannot check
    pub fn validate(&self) -> Result<(), String> {
        if self.num_workers == 0 {
            return Err("num_workers must be at least 1".to_string());
        }
        if self.window_secs == 0 {
            return Err("window_secs must be at least 1".to_string());
        }
        if self.connect_timeout_ms == 0 {
            return Err("connect_timeout_ms must be positive".to_string());
        }
        if self.db_user.trim().is_empty() {
            return Err("db_user cannot be empty".to_string());
        }
        if self.db_name.trim().is_empty() {
            return Err("db_name cannot be empty".to_string());
        }
        self.aggregate_query().validate().map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Scheduler settings
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let mut config = SchedulerConfig::new(self.num_workers)
            .with_window_secs(self.window_secs)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_error_policy(self.on_query_error.into());
        if self.query_timeout_ms > 0 {
            config = config.with_query_timeout(Duration::from_millis(self.query_timeout_ms));
        }
        config
    }

    /// Database connection settings
    pub fn pg_config(&self) -> PgConfig {
        let config = PgConfig::new(&self.db_user, &self.db_name)
            .with_host(&self.db_host)
            .with_port(self.db_port)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms));
        match &self.db_password {
            Some(password) => config.with_password(password),
            None => config,
        }
    }

    /// Aggregate query over the configured table and columns
    pub fn aggregate_query(&self) -> AggregateQuery {
        AggregateQuery::new()
            .with_table(&self.table)
            .with_value_column(&self.value_column)
            .with_host_column(&self.host_column)
            .with_time_column(&self.time_column)
    }
}
