//! Query executor abstractions
//!
//! The scheduler never talks to a store directly. Each worker asks an
//! [`ExecutorFactory`] for its own [`QueryExecutor`] when it starts, keeps it
//! for the whole run, and closes it when its queue is drained.

use async_trait::async_trait;

use crate::error::Result;
use crate::task::Aggregate;
use crate::window::Window;

/// A store session owned by exactly one worker
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Aggregate `host` over `window`, bounds inclusive on both ends
    async fn execute(&self, host: &str, window: Window) -> Result<Aggregate>;

    /// Check if the session is still usable
    async fn is_valid(&self) -> bool {
        true
    }

    /// Release the session
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Factory that opens one session per worker
#[async_trait]
pub trait ExecutorFactory: Send + Sync {
    /// Open a session for `worker`
    async fn connect(&self, worker: usize) -> Result<Box<dyn QueryExecutor>>;

    /// Backend name, used in logs
    fn name(&self) -> &str;
}
