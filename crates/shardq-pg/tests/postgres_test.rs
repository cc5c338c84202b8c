//! Tests for the PostgreSQL executor.
//!
//! The live tests need a reachable server and are ignored by default:
//!
//! ```text
//! SHARDQ_TEST_PG_USER=postgres SHARDQ_TEST_PG_DB=homework \
//!     cargo test -p shardq-pg -- --ignored
//! ```

use chrono::NaiveDateTime;
use shardq_core::executor::ExecutorFactory;
use shardq_core::{ErrorCategory, Window};
use shardq_pg::{AggregateQuery, PgConfig, PgExecutorFactory};
use std::time::Duration;

fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn live_config() -> Option<PgConfig> {
    let user = std::env::var("SHARDQ_TEST_PG_USER").ok()?;
    let db = std::env::var("SHARDQ_TEST_PG_DB").ok()?;
    let mut config = PgConfig::new(user, db);
    if let Ok(host) = std::env::var("SHARDQ_TEST_PG_HOST") {
        config = config.with_host(host);
    }
    if let Ok(password) = std::env::var("SHARDQ_TEST_PG_PASSWORD") {
        config = config.with_password(password);
    }
    Some(config)
}

// ==================== Offline ====================

#[test]
fn test_factory_rejects_bad_identifier() {
    let err = PgExecutorFactory::new(
        PgConfig::new("postgres", "homework"),
        AggregateQuery::new().with_host_column("host'--"),
    )
    .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn test_factory_keeps_settings() {
    let factory = PgExecutorFactory::new(
        PgConfig::new("postgres", "homework").with_port(6432),
        AggregateQuery::new().with_table("cpu_usage_hourly"),
    )
    .unwrap();

    assert_eq!(factory.config().port, 6432);
    assert_eq!(factory.query().table, "cpu_usage_hourly");
    assert!(factory.sql().contains("FROM cpu_usage_hourly"));
}

// ==================== Live ====================

#[tokio::test]
#[ignore = "Needs a PostgreSQL server - run explicitly with --ignored"]
async fn test_live_aggregate_over_empty_window() {
    let Some(config) = live_config() else {
        return;
    };
    let factory = PgExecutorFactory::new(
        config.with_connect_timeout(Duration::from_secs(5)),
        AggregateQuery::new(),
    )
    .unwrap();

    match factory.connect(0).await {
        Ok(executor) => {
            let window = Window::new(ts("1970-01-01 00:00:00"), ts("1970-01-01 00:01:00"));
            let aggregate = executor.execute("no-such-host", window).await.unwrap();
            assert_eq!(aggregate.max, None);
            assert_eq!(aggregate.min, None);
            executor.close().await.unwrap();
            assert!(executor.execute("no-such-host", window).await.is_err());
        }
        // No cpu_usage table in this database
        Err(e) => assert_eq!(e.category(), ErrorCategory::Connection),
    }
}
