//! Run coordinator.
//!
//! The dispatcher owns one run end to end:
//!
//! 1. validate the config and input
//! 2. assign every distinct host to a worker and route each task to it
//! 3. start all workers and wait until each has opened its session; a
//!    run cancelled by then stops here with [`Error::Cancelled`]
//! 4. enqueue tasks, in input order, on the owning worker's queue
//! 5. wait until every queue has acknowledged every task (the barrier)
//! 6. collect results, close the queues and release the workers
//!
//! Results are only read after step 5, so no worker is still writing.

use crate::assignment::AssignmentTable;
use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::executor::ExecutorFactory;
use crate::metrics::{SchedulerMetrics, Timer};
use crate::queue::{worker_queue, QueueSender, QueueStats};
use crate::sink::{LatencyLog, ResultSink};
use crate::stats::LatencyStats;
use crate::task::{QueryFailure, QueryResult, QueryTask};
use crate::worker::{run_worker, WorkerContext, WorkerState, WorkerStatus, WorkerSummary};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Build the host-to-worker table for `hosts`
pub fn build_assignment<I, S>(hosts: I, worker_count: usize) -> Result<AssignmentTable>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    AssignmentTable::build(hosts, worker_count)
}

/// Per-worker outcome of a run
#[derive(Debug, Clone)]
pub struct WorkerReport {
    /// Worker index
    pub worker: usize,
    /// Hosts assigned to this worker
    pub hosts: usize,
    /// Queue counters at the barrier
    pub queue: QueueStats,
    /// Worker summary; `None` if the worker panicked or had to be aborted
    pub summary: Option<WorkerSummary>,
}

impl WorkerReport {
    /// Final worker state, if known
    pub fn state(&self) -> Option<WorkerState> {
        self.summary.as_ref().map(|s| s.state)
    }
}

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunReport {
    /// One entry per executed sub-window
    pub results: Vec<QueryResult>,
    /// Per-query latencies, parallel to `results`
    pub latencies: LatencyLog,
    /// Sub-windows whose query failed
    pub failures: Vec<QueryFailure>,
    /// Tasks routed to workers
    pub tasks_dispatched: u64,
    /// Tasks dropped unprocessed by a failed worker
    pub abandoned: u64,
    /// Tasks skipped after cancellation
    pub skipped: u64,
    /// Host-to-worker table used for the run
    pub assignment: AssignmentTable,
    /// Per-worker details
    pub workers: Vec<WorkerReport>,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl RunReport {
    /// Latency statistics; `None` if no query was executed
    pub fn stats(&self) -> Option<LatencyStats> {
        self.latencies.stats()
    }

    /// Number of executed sub-window queries
    pub fn query_count(&self) -> usize {
        self.latencies.len()
    }

    /// Workers that ended in `Failed`
    pub fn failed_workers(&self) -> Vec<usize> {
        self.workers
            .iter()
            .filter(|w| w.state() == Some(WorkerState::Failed))
            .map(|w| w.worker)
            .collect()
    }
}

/// Schedules tasks across a fixed pool of workers
pub struct Dispatcher {
    config: SchedulerConfig,
    factory: Arc<dyn ExecutorFactory>,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// Create a dispatcher
    pub fn new(config: SchedulerConfig, factory: Arc<dyn ExecutorFactory>) -> Self {
        Self {
            config,
            factory,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an external cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels the run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Execute `tasks` and wait for every one of them to be accounted for
    pub async fn run(&self, tasks: Vec<QueryTask>) -> Result<RunReport> {
        let timer = Timer::new();

        self.config.validate()?;
        if tasks.is_empty() {
            return Err(Error::config("no tasks to run"));
        }
        let worker_count = self.config.worker_count;
        let splitter = self.config.splitter()?;
        let assignment = build_assignment(tasks.iter().map(|t| t.host.as_str()), worker_count)?;
        // Routed before any session opens, so a routing error leaves nothing to shut down
        let routed = route(&assignment, tasks)?;

        SchedulerMetrics::set_hosts(assignment.len());
        info!(
            workers = worker_count,
            hosts = assignment.len(),
            tasks = routed.len(),
            backend = self.factory.name(),
            "Starting run"
        );

        let sink = Arc::new(ResultSink::new());
        let mut senders: Vec<QueueSender> = Vec::with_capacity(worker_count);
        let mut handles = Vec::with_capacity(worker_count);
        let mut readiness = Vec::with_capacity(worker_count);

        for id in 0..worker_count {
            let (tx, rx) = worker_queue(id);
            let (ready_tx, ready_rx) = oneshot::channel();
            let ctx = WorkerContext {
                id,
                factory: Arc::clone(&self.factory),
                sink: Arc::clone(&sink),
                splitter,
                query_timeout: self.config.query_timeout,
                connect_timeout: self.config.connect_timeout,
                error_policy: self.config.error_policy,
                cancel: self.cancel.clone(),
                status: Arc::new(WorkerStatus::new()),
            };
            handles.push(tokio::spawn(run_worker(ctx, rx, ready_tx)));
            senders.push(tx);
            readiness.push(ready_rx);
        }

        // Fail fast: no task is dispatched unless every worker has a session
        for (id, ready) in readiness.into_iter().enumerate() {
            let failure = match ready.await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(_) => Error::worker("exited before opening a session"),
            };
            error!(worker = id, "Worker failed to start, aborting run: {}", failure);
            drop(senders);
            self.shutdown(handles).await;
            return Err(Error::worker_startup(id, failure));
        }
        if self.cancel.is_cancelled() {
            info!("Run cancelled before dispatch, closing sessions");
            drop(senders);
            self.shutdown(handles).await;
            return Err(Error::Cancelled);
        }
        SchedulerMetrics::set_active_workers(worker_count);
        debug!(workers = worker_count, "All workers ready");

        let mut tasks_dispatched = 0u64;
        for (worker, task) in routed {
            SchedulerMetrics::increment_tasks_dispatched(worker);
            tasks_dispatched += 1;
            if !senders[worker].push(task) {
                debug!(worker, "Worker gone, task abandoned");
            }
        }

        // Barrier
        for sender in &senders {
            sender.join().await;
            debug!(worker = sender.worker(), "Queue drained");
        }

        let contents = sink.take();
        let queue_stats: Vec<QueueStats> = senders.iter().map(QueueSender::stats).collect();

        // Closing the queues lets every running worker drain and terminate
        drop(senders);
        let summaries = self.shutdown(handles).await;
        SchedulerMetrics::set_active_workers(0);

        let workers: Vec<WorkerReport> = queue_stats
            .into_iter()
            .zip(summaries)
            .enumerate()
            .map(|(worker, (queue, summary))| WorkerReport {
                worker,
                hosts: assignment.hosts_for(worker).len(),
                queue,
                summary,
            })
            .collect();

        let abandoned: u64 = workers.iter().map(|w| w.queue.abandoned).sum();
        let skipped: u64 = workers.iter().map(|w| w.queue.skipped).sum();
        if abandoned > 0 {
            SchedulerMetrics::add_tasks_abandoned(abandoned);
        }

        let elapsed = timer.elapsed();
        SchedulerMetrics::record_run_duration(elapsed);

        let report = RunReport {
            results: contents.results,
            latencies: contents.latencies,
            failures: contents.failures,
            tasks_dispatched,
            abandoned,
            skipped,
            assignment,
            workers,
            elapsed,
        };

        info!(
            queries = report.query_count(),
            failures = report.failures.len(),
            abandoned,
            skipped,
            elapsed_ms = elapsed.as_millis() as u64,
            "Run complete"
        );
        Ok(report)
    }

    /// Wait for workers to finish, aborting any that overrun the shutdown timeout
    async fn shutdown(&self, handles: Vec<JoinHandle<WorkerSummary>>) -> Vec<Option<WorkerSummary>> {
        let timeout = self.config.shutdown_timeout;
        let deadline = tokio::time::Instant::now() + timeout;
        let mut summaries = Vec::with_capacity(handles.len());

        for (id, mut handle) in handles.into_iter().enumerate() {
            let summary = match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(summary)) => Some(summary),
                Ok(Err(e)) => {
                    warn!(worker = id, "Worker task failed: {}", e);
                    None
                }
                Err(_) => {
                    warn!(worker = id, "Worker did not stop within {:?}, aborting", timeout);
                    handle.abort();
                    None
                }
            };
            summaries.push(summary);
        }
        summaries
    }
}

/// Pair every task with its worker, keeping input order
fn route(assignment: &AssignmentTable, tasks: Vec<QueryTask>) -> Result<Vec<(usize, QueryTask)>> {
    tasks
        .into_iter()
        .map(|task| match assignment.worker_for(&task.host) {
            Some(worker) => Ok((worker, task)),
            None => Err(Error::worker(format!(
                "host '{}' missing from assignment",
                task.host
            ))),
        })
        .collect()
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("backend", &self.factory.name())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
