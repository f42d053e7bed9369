use anyhow::Result;
use latency_harness::report::{ConsoleReporter, JsonArtifactReporter, Reporter};
use latency_harness::{config, harness, telemetry};
use config::Config;
use telemetry::init_tracing;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;
    info!(
        base_url = %cfg.base_url,
        endpoints = cfg.endpoints.len(),
        expected_tasks = cfg.expected_task_count(),
        "configuration loaded"
    );

    if cfg.workers > 200 {
        warn!(
            workers = cfg.workers,
            "very high worker count - the target may start refusing connections"
        );
    }

    let cancel = CancellationToken::new();
    telemetry::cancel_on_shutdown(cancel.clone());

    let run = harness::run(&cfg, cancel.clone()).await?;
    cancel.cancel();

    ConsoleReporter::new(std::io::stdout().lock()).report(&run)?;
    if let Some(path) = &cfg.report.json_path {
        JsonArtifactReporter::new(path).report(&run)?;
    }

    if run.summary.succeeded == 0 {
        warn!("no successful results collected");
    }
    info!(
        succeeded = run.summary.succeeded,
        total = run.summary.total_tasks,
        "benchmark complete"
    );
    Ok(())
}
