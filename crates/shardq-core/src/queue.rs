//! Per-worker task queue with acknowledgment tracking.
//!
//! Each worker owns one unbounded FIFO queue. The dispatcher is the only
//! producer and the worker the only consumer, so per-host submission order is
//! preserved end to end.
//!
//! Every queued task carries a [`TaskAck`] guard. The guard decrements the
//! queue's pending count when it is dropped, whichever way that happens:
//! - the worker finished the task ([`TaskAck::done`])
//! - the worker skipped it after cancellation ([`TaskAck::skipped`])
//! - the task was never processed because the worker went away (dropped
//!   with the queue, counted as abandoned)
//!
//! [`QueueSender::join`] therefore always returns once every pushed task has
//! been accounted for.

use crate::task::QueryTask;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// How a task left the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Processed by the worker
    Done,
    /// Skipped because the run was cancelled
    Skipped,
    /// Dropped unprocessed (worker failed or exited)
    Abandoned,
}

#[derive(Debug)]
struct AckState {
    pending: watch::Sender<usize>,
    enqueued: AtomicU64,
    completed: AtomicU64,
    skipped: AtomicU64,
    abandoned: AtomicU64,
}

impl AckState {
    fn new() -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            pending,
            enqueued: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
        }
    }

    fn acknowledge(&self, outcome: AckOutcome) {
        let counter = match outcome {
            AckOutcome::Done => &self.completed,
            AckOutcome::Skipped => &self.skipped,
            AckOutcome::Abandoned => &self.abandoned,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.pending.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Acknowledgment guard for one queued task
#[derive(Debug)]
pub struct TaskAck {
    state: Arc<AckState>,
    outcome: AckOutcome,
}

impl TaskAck {
    /// Acknowledge the task as processed
    pub fn done(mut self) {
        self.outcome = AckOutcome::Done;
    }

    /// Acknowledge the task as skipped
    pub fn skipped(mut self) {
        self.outcome = AckOutcome::Skipped;
    }
}

impl Drop for TaskAck {
    fn drop(&mut self) {
        self.state.acknowledge(self.outcome);
    }
}

/// A task together with its acknowledgment guard
#[derive(Debug)]
pub struct QueuedTask {
    task: QueryTask,
    ack: TaskAck,
}

impl QueuedTask {
    /// The queued task
    pub fn task(&self) -> &QueryTask {
        &self.task
    }

    /// Split into the task and its guard
    pub fn into_parts(self) -> (QueryTask, TaskAck) {
        (self.task, self.ack)
    }
}

/// Snapshot of queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks pushed
    pub enqueued: u64,
    /// Tasks processed
    pub completed: u64,
    /// Tasks skipped after cancellation
    pub skipped: u64,
    /// Tasks dropped unprocessed
    pub abandoned: u64,
    /// Tasks not yet acknowledged
    pub pending: usize,
}

/// Producer side of a worker queue
#[derive(Debug)]
pub struct QueueSender {
    worker: usize,
    tx: mpsc::UnboundedSender<QueuedTask>,
    state: Arc<AckState>,
}

/// Consumer side of a worker queue
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<QueuedTask>,
}

/// Create the queue for `worker`
pub fn worker_queue(worker: usize) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let state = Arc::new(AckState::new());
    (
        QueueSender { worker, tx, state },
        QueueReceiver { rx },
    )
}

impl QueueSender {
    /// Worker this queue feeds
    #[inline]
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Enqueue a task.
    ///
    /// Returns `false` if the worker is gone; the task is then counted as
    /// abandoned and does not hold up [`join`](Self::join).
    pub fn push(&self, task: QueryTask) -> bool {
        self.state.enqueued.fetch_add(1, Ordering::Relaxed);
        self.state.pending.send_modify(|n| *n += 1);

        let queued = QueuedTask {
            task,
            ack: TaskAck {
                state: Arc::clone(&self.state),
                outcome: AckOutcome::Abandoned,
            },
        };
        // On failure the returned task drops here and abandons itself
        self.tx.send(queued).is_ok()
    }

    /// Number of tasks not yet acknowledged
    pub fn pending(&self) -> usize {
        *self.state.pending.borrow()
    }

    /// Wait until every pushed task has been acknowledged
    pub async fn join(&self) {
        let mut rx = self.state.pending.subscribe();
        // The sender lives in `self.state`, so this cannot observe a closed channel
        let _ = rx.wait_for(|pending| *pending == 0).await;
    }

    /// Counter snapshot
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.state.enqueued.load(Ordering::Relaxed),
            completed: self.state.completed.load(Ordering::Relaxed),
            skipped: self.state.skipped.load(Ordering::Relaxed),
            abandoned: self.state.abandoned.load(Ordering::Relaxed),
            pending: self.pending(),
        }
    }
}

impl QueueReceiver {
    /// Wait for the next task; `None` once the queue is closed and empty
    pub async fn pop(&mut self) -> Option<QueuedTask> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use std::time::Duration;

    fn task(host: &str) -> QueryTask {
        let t = NaiveDateTime::parse_from_str("2024-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        QueryTask::new(host, t, t)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (tx, mut rx) = worker_queue(0);
        for i in 0..5 {
            assert!(tx.push(task(&format!("h{i}"))));
        }

        for i in 0..5 {
            let queued = rx.pop().await.unwrap();
            assert_eq!(queued.task().host, format!("h{i}"));
            queued.into_parts().1.done();
        }
        assert_eq!(tx.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_waits_for_acks() {
        let (tx, mut rx) = worker_queue(0);
        tx.push(task("a"));
        tx.push(task("b"));
        assert_eq!(tx.pending(), 2);

        let consumer = tokio::spawn(async move {
            while let Some(queued) = rx.pop().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
                queued.into_parts().1.done();
            }
        });

        tokio::time::timeout(Duration::from_secs(5), tx.join())
            .await
            .expect("join should complete");

        let stats = tx.stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.pending, 0);

        drop(tx);
        consumer.await.unwrap();
    }

    #[tokio::test]
    async fn test_join_on_empty_queue_returns() {
        let (tx, _rx) = worker_queue(3);
        tokio::time::timeout(Duration::from_secs(1), tx.join())
            .await
            .expect("empty queue joins immediately");
        assert_eq!(tx.worker(), 3);
    }

    #[tokio::test]
    async fn test_dropped_receiver_abandons_queued_tasks() {
        let (tx, rx) = worker_queue(0);
        tx.push(task("a"));
        tx.push(task("b"));
        drop(rx);

        tokio::time::timeout(Duration::from_secs(1), tx.join())
            .await
            .expect("abandoned tasks must not block join");
        assert_eq!(tx.stats().abandoned, 2);

        // Pushing to a dead worker fails fast
        assert!(!tx.push(task("c")));
        assert_eq!(tx.stats().abandoned, 3);
        assert_eq!(tx.pending(), 0);
    }

    #[tokio::test]
    async fn test_ack_on_drop_without_done() {
        let (tx, mut rx) = worker_queue(0);
        tx.push(task("a"));
        {
            let queued = rx.pop().await.unwrap();
            let (_task, _ack) = queued.into_parts();
            // Guard dropped at end of scope
        }
        assert_eq!(tx.pending(), 0);
        assert_eq!(tx.stats().abandoned, 1);
    }

    #[tokio::test]
    async fn test_skipped_outcome() {
        let (tx, mut rx) = worker_queue(0);
        tx.push(task("a"));
        rx.pop().await.unwrap().into_parts().1.skipped();

        let stats = tx.stats();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.completed, 0);
    }
}
