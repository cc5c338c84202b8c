//! # shardq-pg
//!
//! PostgreSQL / TimescaleDB backend for the shardq scheduler.
//!
//! [`PgExecutorFactory`] opens one `tokio-postgres` session per worker and
//! prepares the per-window MAX/MIN query on it. Sessions use `NoTls`.
//!
//! ```rust,ignore
//! use shardq_pg::{AggregateQuery, PgConfig, PgExecutorFactory};
//!
//! let config = PgConfig::new("postgres", "homework").with_password(password);
//! let factory = PgExecutorFactory::new(config, AggregateQuery::new())?;
//! let dispatcher = Dispatcher::new(scheduler_config, Arc::new(factory));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod executor;
pub mod query;

pub use config::{PgConfig, DEFAULT_PORT};
pub use executor::{PgExecutor, PgExecutorFactory};
pub use query::{validate_sql_identifier, AggregateQuery};
