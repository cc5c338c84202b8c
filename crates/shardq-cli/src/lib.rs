//! shardq command line tool
//!
//! Loads the query input file, runs it through the scheduler against
//! PostgreSQL / TimescaleDB and writes per-query results plus a latency
//! summary.
//!
//! ```bash
//! DB_USER=postgres DB_NAME=homework shardq -q query_params.csv -n 4
//! ```

pub mod cli;
pub mod input;
pub mod report;

pub use cli::Cli;

use anyhow::Context;
use shardq_core::{Dispatcher, Error, ErrorCategory, RunReport};
use shardq_pg::PgExecutorFactory;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Exit code for invalid configuration or input
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for runtime failures (connection, output)
pub const EXIT_FAILURE: i32 = 1;
/// Exit code when the run was interrupted
pub const EXIT_CANCELLED: i32 = 130;

/// Run the whole workload described by `cli`
pub async fn run(cli: &Cli, cancel: CancellationToken) -> anyhow::Result<RunReport> {
    cli.validate().map_err(Error::config)?;

    let tasks = input::load_tasks(&cli.query_inp_file)?;
    tracing::info!(
        tasks = tasks.len(),
        input = %cli.query_inp_file.display(),
        "Loaded query input"
    );

    let factory = PgExecutorFactory::new(cli.pg_config(), cli.aggregate_query())?;
    tracing::info!(endpoint = %factory.config().endpoint(), "Using PostgreSQL backend");

    let dispatcher =
        Dispatcher::new(cli.scheduler_config(), Arc::new(factory)).with_cancellation(cancel);
    let report = dispatcher.run(tasks).await?;

    report::write_results_file(&cli.output, &report.results)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    Ok(report)
}

/// Process exit code for a failed run
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<input::InputError>().is_some() {
        return EXIT_CONFIG;
    }
    match err.downcast_ref::<Error>().map(Error::category) {
        Some(ErrorCategory::Configuration) => EXIT_CONFIG,
        Some(ErrorCategory::Cancelled) => EXIT_CANCELLED,
        _ => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes() {
        let config: anyhow::Error = Error::config("bad").into();
        assert_eq!(exit_code(&config), EXIT_CONFIG);

        let startup: anyhow::Error =
            Error::worker_startup(1, Error::connection("refused")).into();
        assert_eq!(exit_code(&startup), EXIT_FAILURE);

        let input: anyhow::Error = input::InputError::Empty {
            path: PathBuf::from("in.csv"),
        }
        .into();
        assert_eq!(exit_code(&input), EXIT_CONFIG);

        let io = anyhow::anyhow!("disk full").context("failed to write output.log");
        assert_eq!(exit_code(&io), EXIT_FAILURE);

        let cancelled: anyhow::Error = Error::Cancelled.into();
        assert_eq!(exit_code(&cancelled), EXIT_CANCELLED);
    }

    #[tokio::test]
    async fn test_run_rejects_empty_input_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        std::fs::write(&input, "hostname,start_time,end_time\n").unwrap();

        let cli = Cli::parse_from([
            "shardq",
            "-q",
            input.to_str().unwrap(),
            "-n",
            "2",
            "--db-user",
            "postgres",
            "--db-name",
            "homework",
            "-o",
            dir.path().join("out.log").to_str().unwrap(),
        ]);

        let err = run(&cli, CancellationToken::new()).await.unwrap_err();
        assert_eq!(exit_code(&err), EXIT_CONFIG);
        assert!(!dir.path().join("out.log").exists());
    }
}
