use serde::Serialize;
use std::collections::BTreeSet;

use crate::results::{GroupSamples, ResultSet};
use crate::stats;

/// Statistics over the server-reported times of one group
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateStat {
    pub mean: f64,
    pub median: f64,
    pub stdev: f64,
    pub sample_count: usize,
}

impl AggregateStat {
    /// `None` for an empty slice; a group without samples has no statistic.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        Some(Self {
            mean: stats::mean(samples)?,
            median: stats::median(samples)?,
            stdev: stats::sample_stdev(samples)?,
            sample_count: samples.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupOutcome {
    Measured {
        stat: AggregateStat,
        /// Mean client round trip, secondary to the server figure
        mean_round_trip_ms: f64,
    },
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadGroup {
    pub item_count: u32,
    #[serde(flatten)]
    pub outcome: GroupOutcome,
}

impl LoadGroup {
    pub fn stat(&self) -> Option<&AggregateStat> {
        match &self.outcome {
            GroupOutcome::Measured { stat, .. } => Some(stat),
            GroupOutcome::NoData => None,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.stat().map_or(0, |s| s.sample_count)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointAggregate {
    pub endpoint: String,
    /// Ascending by item count
    pub groups: Vec<LoadGroup>,
}

impl EndpointAggregate {
    pub fn measured_groups(&self) -> impl Iterator<Item = (u32, &AggregateStat)> {
        self.groups
            .iter()
            .filter_map(|g| g.stat().map(|s| (g.item_count, s)))
    }
}

/// Per-endpoint, per-load-size statistics in display order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub endpoints: Vec<EndpointAggregate>,
}

impl Aggregate {
    pub fn endpoint(&self, endpoint: &str) -> Option<&EndpointAggregate> {
        self.endpoints.iter().find(|e| e.endpoint == endpoint)
    }

    pub fn stat(&self, endpoint: &str, item_count: u32) -> Option<&AggregateStat> {
        self.endpoint(endpoint)?
            .groups
            .iter()
            .find(|g| g.item_count == item_count)?
            .stat()
    }

    pub fn total_samples(&self) -> usize {
        self.endpoints
            .iter()
            .flat_map(|e| &e.groups)
            .map(LoadGroup::sample_count)
            .sum()
    }
}

/// Groups `results` for display.
///
/// Endpoints follow `endpoint_order`; endpoints present only in the results
/// are appended in name order. Every configured load size gets a row, with
/// [`GroupOutcome::NoData`] when nothing was collected for it.
pub fn aggregate<E: AsRef<str>>(
    results: &ResultSet,
    endpoint_order: &[E],
    load_sizes: &[u32],
) -> Aggregate {
    let mut order: Vec<&str> = Vec::new();
    for endpoint in endpoint_order {
        let endpoint = endpoint.as_ref();
        if !order.contains(&endpoint) {
            order.push(endpoint);
        }
    }
    let mut extra: Vec<&str> = results
        .endpoints()
        .filter(|e| !order.contains(e))
        .collect();
    extra.sort_unstable();
    order.extend(extra);

    let endpoints = order
        .into_iter()
        .map(|endpoint| {
            let counts: BTreeSet<u32> = load_sizes
                .iter()
                .copied()
                .chain(results.item_counts(endpoint))
                .collect();

            let groups = counts
                .into_iter()
                .map(|item_count| LoadGroup {
                    item_count,
                    outcome: outcome_for(results.samples(endpoint, item_count)),
                })
                .collect();

            EndpointAggregate {
                endpoint: endpoint.to_string(),
                groups,
            }
        })
        .collect();

    Aggregate { endpoints }
}

fn outcome_for(samples: Option<&GroupSamples>) -> GroupOutcome {
    let Some(samples) = samples else {
        return GroupOutcome::NoData;
    };
    match AggregateStat::from_samples(&samples.elapsed_ms) {
        Some(stat) => GroupOutcome::Measured {
            stat,
            mean_round_trip_ms: stats::mean(&samples.round_trip_ms).unwrap_or(0.0),
        },
        None => GroupOutcome::NoData,
    }
}
