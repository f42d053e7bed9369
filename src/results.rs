use std::collections::{BTreeMap, HashMap};

use crate::source::Measurement;
use crate::workload::Task;

/// Successful outcome of one task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub endpoint: String,
    pub item_count: u32,
    /// Server-reported elapsed time
    pub elapsed_ms: f64,
    /// Client-side round trip, kept out of the grouping key
    pub round_trip_ms: f64,
}

impl TaskResult {
    pub fn new(task: &Task, measurement: Measurement) -> Self {
        Self {
            endpoint: task.endpoint.clone(),
            item_count: task.item_count,
            elapsed_ms: measurement.took_ms,
            round_trip_ms: measurement.round_trip_ms,
        }
    }
}

/// Samples collected for one `(endpoint, item_count)` group, in arrival order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupSamples {
    pub elapsed_ms: Vec<f64>,
    pub round_trip_ms: Vec<f64>,
}

impl GroupSamples {
    pub fn len(&self) -> usize {
        self.elapsed_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elapsed_ms.is_empty()
    }
}

/// Multimap `(endpoint, item_count) -> samples`.
///
/// Each dispatcher worker owns one; they are merged after the pool drains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    groups: HashMap<String, BTreeMap<u32, GroupSamples>>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: TaskResult) {
        let group = self
            .groups
            .entry(result.endpoint)
            .or_default()
            .entry(result.item_count)
            .or_default();
        group.elapsed_ms.push(result.elapsed_ms);
        group.round_trip_ms.push(result.round_trip_ms);
    }

    pub fn merge(&mut self, other: ResultSet) {
        for (endpoint, counts) in other.groups {
            let target = self.groups.entry(endpoint).or_default();
            for (item_count, mut samples) in counts {
                let group = target.entry(item_count).or_default();
                group.elapsed_ms.append(&mut samples.elapsed_ms);
                group.round_trip_ms.append(&mut samples.round_trip_ms);
            }
        }
    }

    pub fn samples(&self, endpoint: &str, item_count: u32) -> Option<&GroupSamples> {
        self.groups.get(endpoint)?.get(&item_count)
    }

    /// Item counts recorded for `endpoint`, ascending
    pub fn item_counts(&self, endpoint: &str) -> impl Iterator<Item = u32> + '_ {
        self.groups
            .get(endpoint)
            .into_iter()
            .flat_map(|counts| counts.keys().copied())
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Total number of samples across all groups
    pub fn len(&self) -> usize {
        self.groups
            .values()
            .flat_map(|counts| counts.values())
            .map(GroupSamples::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
