use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use strum::IntoEnumIterator;
use tracing::info;

use crate::aggregate::{Aggregate, GroupOutcome};
use crate::config::Config;
use crate::dispatch::{DispatchSummary, FailureTally};
use crate::error::FailureKind;

/// Everything a renderer needs about one finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub base_url: String,
    pub metric_field: String,
    pub repetitions: u32,
    pub workers: usize,
    pub summary: RunSummary,
    pub aggregate: Aggregate,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total_tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: FailureTally,
    pub elapsed_secs: f64,
}

impl RunReport {
    pub fn new(config: &Config, dispatch: &DispatchSummary, aggregate: Aggregate) -> Self {
        Self {
            generated_at: Utc::now(),
            base_url: config.base_url.clone(),
            metric_field: config.metric_field.clone(),
            repetitions: config.repetitions,
            workers: config.workers,
            summary: RunSummary {
                total_tasks: dispatch.total_tasks,
                succeeded: dispatch.succeeded,
                failed: dispatch.failed(),
                skipped: dispatch.skipped,
                failures: dispatch.failures.clone(),
                elapsed_secs: dispatch.elapsed.as_secs_f64(),
            },
            aggregate,
        }
    }

    /// One line series per endpoint with data, x = item count, y = mean ms
    pub fn chart_series(&self) -> Vec<ChartSeries> {
        self.aggregate
            .endpoints
            .iter()
            .filter_map(|e| {
                let points: Vec<ChartPoint> = e
                    .measured_groups()
                    .map(|(item_count, stat)| ChartPoint {
                        item_count,
                        mean_ms: stat.mean,
                    })
                    .collect();
                (!points.is_empty()).then(|| ChartSeries {
                    endpoint: e.endpoint.clone(),
                    points,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub endpoint: String,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub item_count: u32,
    pub mean_ms: f64,
}

/// Hands a finished run to some output
pub trait Reporter {
    fn report(&mut self, run: &RunReport) -> Result<()>;
}

/// Plain-text table on any writer, stdout in the binary
pub struct ConsoleReporter<W> {
    out: W,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn report(&mut self, run: &RunReport) -> Result<()> {
        write_table(&mut self.out, run).context("failed to write console report")?;
        self.out.flush().context("failed to flush console report")
    }
}

/// Run header, failure breakdown, then one block per endpoint.
pub fn write_table<W: Write>(out: &mut W, run: &RunReport) -> io::Result<()> {
    let s = &run.summary;
    let rule = "=".repeat(80);

    writeln!(out)?;
    writeln!(out, "{rule}")?;
    writeln!(
        out,
        "  Endpoint Latency Benchmark (server-reported `{}`)",
        run.metric_field
    )?;
    writeln!(out, "{rule}")?;
    writeln!(out, "  Target:      {}", run.base_url)?;
    writeln!(
        out,
        "  Generated:   {}",
        run.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(out, "  Repetitions: {} per load size", run.repetitions)?;
    writeln!(out, "  Workers:     {}", run.workers)?;
    writeln!(
        out,
        "  Tasks:       {} ({} ok, {} failed, {} skipped)",
        s.total_tasks, s.succeeded, s.failed, s.skipped
    )?;
    writeln!(out, "  Wall time:   {:.2}s", s.elapsed_secs)?;
    for kind in FailureKind::iter() {
        let count = s.failures.get(kind);
        if count > 0 {
            writeln!(out, "    {:<20} {}", kind.to_string(), count)?;
        }
    }
    writeln!(out, "{rule}")?;

    for endpoint in &run.aggregate.endpoints {
        writeln!(out)?;
        writeln!(out, "--- Endpoint: {} ---", endpoint.endpoint)?;
        for group in &endpoint.groups {
            match &group.outcome {
                GroupOutcome::Measured {
                    stat,
                    mean_round_trip_ms,
                } => writeln!(
                    out,
                    "  Count: {:<5} | Samples: {:<5} | Avg: {:>8.2}ms | Median: {:>8.2}ms \
                     | StDev: {:>7.2}ms | RTT: {:>8.2}ms",
                    group.item_count,
                    stat.sample_count,
                    stat.mean,
                    stat.median,
                    stat.stdev,
                    mean_round_trip_ms,
                )?,
                GroupOutcome::NoData => writeln!(
                    out,
                    "  Count: {:<5} | Samples: 0     | no data",
                    group.item_count
                )?,
            }
        }
    }
    writeln!(out)
}

/// Writes the aggregate and chart series as JSON for an external renderer
pub struct JsonArtifactReporter {
    path: PathBuf,
}

#[derive(Serialize)]
struct JsonArtifact<'a> {
    #[serde(flatten)]
    run: &'a RunReport,
    chart: Vec<ChartSeries>,
}

impl JsonArtifactReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Reporter for JsonArtifactReporter {
    fn report(&mut self, run: &RunReport) -> Result<()> {
        let artifact = JsonArtifact {
            run,
            chart: run.chart_series(),
        };
        let json = serde_json::to_string_pretty(&artifact).context("failed to encode report")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write report to {}", self.path.display()))?;
        info!(path = %self.path.display(), "report written");
        Ok(())
    }
}
