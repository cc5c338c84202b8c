//! PostgreSQL query executor
//!
//! Each worker gets its own `tokio_postgres::Client` with the aggregate
//! statement prepared once at connect time.

use async_trait::async_trait;
use shardq_core::executor::{ExecutorFactory, QueryExecutor};
use shardq_core::{Aggregate, Error, Result, Window};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, Statement};
use tracing::{debug, warn};

use crate::config::PgConfig;
use crate::query::AggregateQuery;

/// Map a driver error raised while a session was in use
fn map_query_error(e: tokio_postgres::Error) -> Error {
    if e.is_closed() {
        Error::connection_lost_with_source(e.to_string(), e)
    } else {
        Error::query_with_source(e.to_string(), e)
    }
}

/// One worker's session
pub struct PgExecutor {
    worker: usize,
    client: Client,
    statement: Statement,
    driver: JoinHandle<()>,
    closed: AtomicBool,
    created_at: Instant,
}

impl PgExecutor {
    /// Worker that owns this session
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Time since the session was opened
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn execute(&self, host: &str, window: Window) -> Result<Aggregate> {
        if self.closed.load(Ordering::Relaxed) || self.client.is_closed() {
            return Err(Error::connection_lost("connection is closed"));
        }

        let row = self
            .client
            .query_one(&self.statement, &[&window.start, &window.end, &host])
            .await
            .map_err(map_query_error)?;

        let max: Option<f64> = row
            .try_get(0)
            .map_err(|e| Error::query_with_source("unexpected MAX column type", e))?;
        let min: Option<f64> = row
            .try_get(1)
            .map_err(|e| Error::query_with_source("unexpected MIN column type", e))?;
        Ok(Aggregate::new(max, min))
    }

    async fn is_valid(&self) -> bool {
        !self.closed.load(Ordering::Relaxed) && self.client.simple_query("SELECT 1").await.is_ok()
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::Relaxed) {
            debug!(worker = self.worker, age_ms = self.age().as_millis() as u64, "Closing session");
            self.driver.abort();
        }
        Ok(())
    }
}

impl Drop for PgExecutor {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Opens one [`PgExecutor`] per worker
#[derive(Debug, Clone)]
pub struct PgExecutorFactory {
    config: PgConfig,
    query: AggregateQuery,
    sql: String,
}

impl PgExecutorFactory {
    /// Create a factory; fails if the connection settings or any identifier are invalid
    pub fn new(config: PgConfig, query: AggregateQuery) -> Result<Self> {
        config.validate()?;
        query.validate()?;
        let sql = query.sql();
        Ok(Self { config, query, sql })
    }

    /// Connection settings
    pub fn config(&self) -> &PgConfig {
        &self.config
    }

    /// Aggregate query
    pub fn query(&self) -> &AggregateQuery {
        &self.query
    }

    /// SQL prepared on every session
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

#[async_trait]
impl ExecutorFactory for PgExecutorFactory {
    async fn connect(&self, worker: usize) -> Result<Box<dyn QueryExecutor>> {
        let endpoint = self.config.endpoint();
        let (client, connection) = self
            .config
            .to_pg_config(worker)
            .connect(NoTls)
            .await
            .map_err(|e| {
                Error::connection_with_source(format!("failed to connect to {}: {}", endpoint, e), e)
            })?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(worker, "Connection error: {}", e);
            }
        });

        let statement = match client.prepare(&self.sql).await {
            Ok(statement) => statement,
            Err(e) => {
                driver.abort();
                return Err(Error::connection_with_source(
                    format!("failed to prepare aggregate query: {}", e),
                    e,
                ));
            }
        };

        debug!(worker, endpoint = %endpoint, "Session ready");
        Ok(Box::new(PgExecutor {
            worker,
            client,
            statement,
            driver,
            closed: AtomicBool::new(false),
            created_at: Instant::now(),
        }))
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_validates_identifiers() {
        let config = PgConfig::new("postgres", "homework");
        assert!(PgExecutorFactory::new(config.clone(), AggregateQuery::new()).is_ok());

        let bad = AggregateQuery::new().with_table("cpu usage");
        let err = PgExecutorFactory::new(config, bad).unwrap_err();
        assert_eq!(err.category(), shardq_core::ErrorCategory::Configuration);
    }

    #[test]
    fn test_factory_validates_config() {
        let err = PgExecutorFactory::new(PgConfig::new("", "homework"), AggregateQuery::new())
            .unwrap_err();
        assert_eq!(err.category(), shardq_core::ErrorCategory::Configuration);
    }

    #[test]
    fn test_factory_sql_and_name() {
        let factory =
            PgExecutorFactory::new(PgConfig::new("postgres", "homework"), AggregateQuery::new())
                .unwrap();
        assert!(factory.sql().starts_with("SELECT MAX(usage)"));
        assert_eq!(factory.name(), "postgres");
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        // Nothing listens on port 1
        let config = PgConfig::new("postgres", "homework")
            .with_host("127.0.0.1")
            .with_port(1)
            .with_connect_timeout(std::time::Duration::from_secs(2));
        let factory = PgExecutorFactory::new(config, AggregateQuery::new()).unwrap();

        let err = factory.connect(0).await.err().unwrap();
        assert_eq!(err.category(), shardq_core::ErrorCategory::Connection);
    }
}
