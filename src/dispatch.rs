//! Bounded worker pool
//!
//! A fixed number of workers pull tasks from one shared queue. Each worker
//! keeps its own [`ResultSet`] and failure tally; nothing is shared while
//! requests are in flight except the queue cursor and a completion counter.
//! Buffers are merged on a single thread once every worker has joined.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{FailureKind, TaskError};
use crate::results::{ResultSet, TaskResult};
use crate::source::{Measurement, TimingSource};
use crate::workload::Task;

pub const DEFAULT_PROGRESS_EVERY: usize = 50;

type TaskQueue = Mutex<std::vec::IntoIter<Task>>;

/// Failure counts per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FailureTally {
    counts: BTreeMap<FailureKind, usize>,
}

impl FailureTally {
    pub fn record(&mut self, kind: FailureKind) {
        *self.counts.entry(kind).or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: &FailureTally) {
        for (kind, count) in &other.counts {
            *self.counts.entry(*kind).or_insert(0) += count;
        }
    }

    pub fn get(&self, kind: FailureKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSummary {
    pub results: ResultSet,
    pub total_tasks: usize,
    pub succeeded: usize,
    pub failures: FailureTally,
    /// Tasks never started because the run was cancelled
    pub skipped: usize,
    pub elapsed: Duration,
}

impl DispatchSummary {
    pub fn failed(&self) -> usize {
        self.failures.total()
    }

    pub fn cancelled(&self) -> bool {
        self.skipped > 0
    }
}

#[derive(Default)]
struct WorkerOutcome {
    results: ResultSet,
    failures: FailureTally,
    succeeded: usize,
    processed: usize,
}

pub struct Dispatcher<S> {
    source: Arc<S>,
    workers: usize,
    progress_every: usize,
    cancel: CancellationToken,
}

impl<S: TimingSource + 'static> Dispatcher<S> {
    pub fn new(source: Arc<S>, workers: usize) -> Self {
        Self {
            source,
            workers: workers.max(1),
            progress_every: DEFAULT_PROGRESS_EVERY,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    /// Once `cancel` fires, workers stop taking new tasks; in-flight requests
    /// run to completion or timeout.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(&self, tasks: Vec<Task>) -> DispatchSummary {
        let total = tasks.len();
        let started = Instant::now();
        let queue: Arc<TaskQueue> = Arc::new(Mutex::new(tasks.into_iter()));
        let completed = Arc::new(AtomicUsize::new(0));
        let pool_size = self.workers.min(total);

        info!(tasks = total, workers = pool_size, "dispatch started");

        let mut pool = JoinSet::new();
        for worker_id in 0..pool_size {
            let worker = Worker {
                id: worker_id,
                source: Arc::clone(&self.source),
                queue: Arc::clone(&queue),
                completed: Arc::clone(&completed),
                cancel: self.cancel.clone(),
                total,
                progress_every: self.progress_every,
                started,
            };
            pool.spawn(worker.run());
        }

        let mut results = ResultSet::new();
        let mut failures = FailureTally::default();
        let mut succeeded = 0;
        let mut processed = 0;

        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(outcome) => {
                    results.merge(outcome.results);
                    failures.merge(&outcome.failures);
                    succeeded += outcome.succeeded;
                    processed += outcome.processed;
                }
                Err(e) => error!(error = %e, "dispatch worker terminated abnormally"),
            }
        }

        let summary = DispatchSummary {
            results,
            total_tasks: total,
            succeeded,
            failures,
            skipped: total.saturating_sub(processed),
            elapsed: started.elapsed(),
        };

        if summary.cancelled() {
            warn!(skipped = summary.skipped, "dispatch cancelled before all tasks ran");
        }
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed(),
            skipped = summary.skipped,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "dispatch finished"
        );

        summary
    }
}

struct Worker<S> {
    id: usize,
    source: Arc<S>,
    queue: Arc<TaskQueue>,
    completed: Arc<AtomicUsize>,
    cancel: CancellationToken,
    total: usize,
    progress_every: usize,
    started: Instant,
}

impl<S: TimingSource + 'static> Worker<S> {
    async fn run(self) -> WorkerOutcome {
        let mut outcome = WorkerOutcome::default();

        while !self.cancel.is_cancelled() {
            let Some(task) = next_task(&self.queue) else {
                break;
            };

            match self.measure_isolated(&task).await {
                Ok(measurement) => {
                    outcome.results.record(TaskResult::new(&task, measurement));
                    outcome.succeeded += 1;
                }
                Err(err) => {
                    log_failure(&task, &err);
                    outcome.failures.record(err.kind());
                }
            }
            outcome.processed += 1;

            let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
            if should_report(done, self.progress_every, self.total) {
                info!(
                    completed = done,
                    total = self.total,
                    elapsed_secs = self.started.elapsed().as_secs_f64(),
                    "dispatch progress"
                );
            }
        }

        debug!(worker = self.id, processed = outcome.processed, "worker drained");
        outcome
    }

    /// Runs one measurement on its own task so a panic inside the source
    /// only costs that task, not the worker's buffered results.
    async fn measure_isolated(&self, task: &Task) -> Result<Measurement, TaskError> {
        let source = Arc::clone(&self.source);
        let owned = task.clone();
        match tokio::spawn(async move { source.measure(&owned).await }).await {
            Ok(result) => result,
            Err(join_err) => Err(TaskError::Crashed(join_err.to_string())),
        }
    }
}

/// Progress is logged every `every` completions and once more on the last one.
fn should_report(done: usize, every: usize, total: usize) -> bool {
    done == total || (every > 0 && done % every == 0)
}

fn next_task(queue: &TaskQueue) -> Option<Task> {
    queue.lock().next()
}

fn log_failure(task: &Task, err: &TaskError) {
    let kind = err.kind();
    match err.body() {
        Some(body) => warn!(
            endpoint = %task.endpoint,
            entity_id = task.entity_id,
            item_count = task.item_count,
            kind = %kind,
            error = %err,
            body,
            "task dropped"
        ),
        None => warn!(
            endpoint = %task.endpoint,
            entity_id = task.entity_id,
            item_count = task.item_count,
            kind = %kind,
            error = %err,
            "task dropped"
        ),
    }
}
