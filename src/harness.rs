use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::aggregate::aggregate;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::report::RunReport;
use crate::source::{HttpTimingSource, TimingSource};
use crate::workload::{generate_tasks, workload_rng};

/// Full pipeline against the configured HTTP surface.
pub async fn run(config: &Config, cancel: CancellationToken) -> Result<RunReport> {
    let source = HttpTimingSource::new(config).context("failed to build HTTP client")?;
    run_with_source(config, Arc::new(source), cancel).await
}

/// generate -> dispatch -> aggregate. The workload is built before any
/// request goes out, so configuration errors never reach the network.
pub async fn run_with_source<S: TimingSource + 'static>(
    config: &Config,
    source: Arc<S>,
    cancel: CancellationToken,
) -> Result<RunReport> {
    let mut rng = workload_rng(config.seed);
    let tasks = generate_tasks(config, &mut rng).context("cannot build workload")?;

    info!(
        base_url = %config.base_url,
        tasks = tasks.len(),
        workers = config.workers,
        timeout_secs = config.timeout_seconds,
        "starting benchmark"
    );

    let summary = Dispatcher::new(source, config.workers)
        .with_progress_every(config.progress_every)
        .with_cancellation(cancel)
        .run(tasks)
        .await;

    let aggregate = aggregate(&summary.results, &config.endpoint_keys(), &config.load_sizes);
    Ok(RunReport::new(config, &summary, aggregate))
}
