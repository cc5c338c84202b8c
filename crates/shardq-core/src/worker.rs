//! Worker execution loop.
//!
//! A worker owns one queue and one store session for the whole run. It pops
//! tasks in FIFO order, splits each into sub-windows and executes them one at
//! a time, so all windows for a host run sequentially on the same session.
//!
//! Lifecycle: `Idle -> Running -> Draining -> Terminated`, or `Failed` when
//! the session cannot be opened, fails its validity check, or is lost
//! mid-run.

use crate::config::QueryErrorPolicy;
use crate::error::{Error, Result};
use crate::executor::{ExecutorFactory, QueryExecutor};
use crate::metrics::{SchedulerMetrics, Timer};
use crate::queue::QueueReceiver;
use crate::sink::ResultSink;
use crate::task::{QueryFailure, QueryResult, QueryTask};
use crate::window::WindowSplitter;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WorkerState {
    /// Queue attached, no session yet
    #[default]
    Idle = 0,
    /// Session open, consuming the queue
    Running = 1,
    /// Queue closed, releasing the session
    Draining = 2,
    /// Finished normally
    Terminated = 3,
    /// Session could not be opened or was lost
    Failed = 4,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Draining,
            3 => Self::Terminated,
            4 => Self::Failed,
            _ => Self::Idle,
        }
    }

    /// Whether the worker has stopped for good
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Terminated => write!(f, "terminated"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Shared, observable worker state
#[derive(Debug, Default)]
pub struct WorkerStatus {
    state: AtomicU8,
}

impl WorkerStatus {
    /// Create a status in `Idle`
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Everything a worker needs besides its queue
#[derive(Clone)]
pub struct WorkerContext {
    /// Worker index
    pub id: usize,
    /// Opens this worker's session
    pub factory: Arc<dyn ExecutorFactory>,
    /// Shared result sink
    pub sink: Arc<ResultSink>,
    /// Sub-window splitter
    pub splitter: WindowSplitter,
    /// Per-query deadline
    pub query_timeout: Option<Duration>,
    /// Session connect deadline
    pub connect_timeout: Duration,
    /// Per-query error handling
    pub error_policy: QueryErrorPolicy,
    /// Run-wide cancellation
    pub cancel: CancellationToken,
    /// Observable state
    pub status: Arc<WorkerStatus>,
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("id", &self.id)
            .field("factory", &self.factory.name())
            .field("splitter", &self.splitter)
            .field("query_timeout", &self.query_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("error_policy", &self.error_policy)
            .field("state", &self.status.get())
            .finish()
    }
}

/// What a worker did during a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerSummary {
    /// Worker index
    pub worker: usize,
    /// Final state
    pub state: WorkerState,
    /// Tasks fully processed
    pub tasks_completed: u64,
    /// Tasks cut short by the `abort-task` policy
    pub tasks_aborted: u64,
    /// Sub-window queries that returned a result
    pub queries_executed: u64,
    /// Sub-window queries that failed
    pub queries_failed: u64,
    /// Sub-windows not executed because the run was cancelled
    pub windows_skipped: u64,
    /// Fatal error, if the worker failed
    pub error: Option<String>,
}

enum TaskOutcome {
    Completed,
    Aborted,
    Cancelled,
    Fatal(Error),
}

/// Run one worker to completion.
///
/// `ready` receives the result of opening the session before any task is
/// consumed. The function returns once the queue is closed and drained, or
/// as soon as the session fails; in the latter case dropping `queue` marks
/// every remaining task as abandoned.
pub async fn run_worker(
    ctx: WorkerContext,
    mut queue: QueueReceiver,
    ready: oneshot::Sender<Result<()>>,
) -> WorkerSummary {
    let mut summary = WorkerSummary {
        worker: ctx.id,
        ..Default::default()
    };
    ctx.status.set(WorkerState::Idle);

    let executor = match connect(&ctx).await {
        Ok(executor) => executor,
        Err(e) => {
            error!(worker = ctx.id, backend = ctx.factory.name(), "Failed to open session: {}", e);
            ctx.status.set(WorkerState::Failed);
            SchedulerMetrics::increment_worker_failures();
            summary.state = WorkerState::Failed;
            summary.error = Some(e.to_string());
            let _ = ready.send(Err(e));
            return summary;
        }
    };

    ctx.status.set(WorkerState::Running);
    if ready.send(Ok(())).is_err() {
        // Dispatcher gave up on the run before dispatching anything
        debug!(worker = ctx.id, "Dispatcher went away before start");
        close_executor(&ctx, executor.as_ref()).await;
        ctx.status.set(WorkerState::Terminated);
        summary.state = WorkerState::Terminated;
        return summary;
    }
    debug!(worker = ctx.id, "Worker running");

    while let Some(queued) = queue.pop().await {
        let (task, ack) = queued.into_parts();

        if ctx.cancel.is_cancelled() {
            summary.windows_skipped += ctx.splitter.window_count(task.start, task.end) as u64;
            ack.skipped();
            continue;
        }

        match process_task(&ctx, executor.as_ref(), &task, &mut summary).await {
            TaskOutcome::Completed => {
                summary.tasks_completed += 1;
                ack.done();
            }
            TaskOutcome::Aborted => {
                summary.tasks_aborted += 1;
                ack.done();
            }
            TaskOutcome::Cancelled => ack.skipped(),
            TaskOutcome::Fatal(e) => {
                error!(worker = ctx.id, host = %task.host, "Worker stopped: {}", e);
                ctx.status.set(WorkerState::Failed);
                SchedulerMetrics::increment_worker_failures();
                summary.state = WorkerState::Failed;
                summary.error = Some(e.to_string());
                // In-flight task and everything still queued count as abandoned
                drop(ack);
                drop(queue);
                close_executor(&ctx, executor.as_ref()).await;
                return summary;
            }
        }
    }

    ctx.status.set(WorkerState::Draining);
    close_executor(&ctx, executor.as_ref()).await;
    ctx.status.set(WorkerState::Terminated);
    summary.state = WorkerState::Terminated;

    info!(
        worker = ctx.id,
        tasks = summary.tasks_completed,
        queries = summary.queries_executed,
        failed = summary.queries_failed,
        "Worker terminated"
    );
    summary
}

/// Open and validate the session under the connect timeout
async fn connect(ctx: &WorkerContext) -> Result<Box<dyn QueryExecutor>> {
    let open = async {
        let executor = ctx.factory.connect(ctx.id).await?;
        if !executor.is_valid().await {
            close_executor(ctx, executor.as_ref()).await;
            return Err(Error::connection(format!(
                "worker {} opened an unusable {} session",
                ctx.id,
                ctx.factory.name()
            )));
        }
        Ok(executor)
    };

    match tokio::time::timeout(ctx.connect_timeout, open).await {
        Ok(result) => result,
        Err(_) => Err(Error::connection(format!(
            "worker {} timed out after {:?} opening a {} session",
            ctx.id,
            ctx.connect_timeout,
            ctx.factory.name()
        ))),
    }
}

async fn close_executor(ctx: &WorkerContext, executor: &dyn QueryExecutor) {
    if let Err(e) = executor.close().await {
        warn!(worker = ctx.id, "Failed to close session: {}", e);
    }
}

async fn process_task(
    ctx: &WorkerContext,
    executor: &dyn QueryExecutor,
    task: &QueryTask,
    summary: &mut WorkerSummary,
) -> TaskOutcome {
    let mut windows = ctx.splitter.split(task.start, task.end);

    while let Some(window) = windows.next() {
        if ctx.cancel.is_cancelled() {
            summary.windows_skipped += 1 + windows.len() as u64;
            return TaskOutcome::Cancelled;
        }

        let timer = Timer::new();
        let outcome = match ctx.query_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, executor.execute(&task.host, window)).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::timeout(format!("query exceeded {:?}", limit))),
                }
            }
            None => executor.execute(&task.host, window).await,
        };
        let latency = timer.elapsed();

        match outcome {
            Ok(aggregate) => {
                debug!(
                    worker = ctx.id,
                    host = %task.host,
                    window_start = %window.start,
                    max = ?aggregate.max,
                    min = ?aggregate.min,
                    latency_us = latency.as_micros() as u64,
                    "Query done"
                );
                SchedulerMetrics::increment_queries_executed(ctx.id);
                SchedulerMetrics::record_query_latency(latency);
                ctx.sink
                    .record(QueryResult::new(ctx.id, task.host.as_str(), window, aggregate), latency);
                summary.queries_executed += 1;
            }
            Err(e) => {
                SchedulerMetrics::increment_queries_failed(&e.category().to_string());
                ctx.sink
                    .record_failure(QueryFailure::new(ctx.id, task.host.as_str(), window, &e));
                summary.queries_failed += 1;

                if e.is_worker_fatal() {
                    return TaskOutcome::Fatal(e);
                }
                match ctx.error_policy {
                    QueryErrorPolicy::Skip => {
                        warn!(
                            worker = ctx.id,
                            host = %task.host,
                            window_start = %window.start,
                            "Query failed, skipping window: {}",
                            e
                        );
                    }
                    QueryErrorPolicy::AbortTask => {
                        warn!(
                            worker = ctx.id,
                            host = %task.host,
                            window_start = %window.start,
                            remaining = windows.len(),
                            "Query failed, aborting task: {}",
                            e
                        );
                        return TaskOutcome::Aborted;
                    }
                }
            }
        }
    }

    TaskOutcome::Completed
}
