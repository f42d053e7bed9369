use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use latency_harness::dispatch::Dispatcher;
use latency_harness::error::TaskError;
use latency_harness::source::{Measurement, TimingSource};
use latency_harness::workload::Task;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Behaviour {
    Succeed,
    Refuse,
    Reject,
    Garble,
}

/// Task `i` sleeps `delays[i]` ms and then behaves as `script[i]`.
/// The reported time is the task index, so results can be traced back.
struct ScriptedSource {
    delays: Vec<u64>,
    script: Vec<Behaviour>,
    calls: Vec<AtomicUsize>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedSource {
    fn new(delays: Vec<u64>, script: Vec<Behaviour>) -> Self {
        let calls = (0..script.len()).map(|_| AtomicUsize::new(0)).collect();
        Self {
            delays,
            script,
            calls,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TimingSource for ScriptedSource {
    async fn measure(&self, task: &Task) -> Result<Measurement, TaskError> {
        let i = task.entity_id as usize;
        self.calls[i].fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(self.delays[i])).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.script[i] {
            Behaviour::Succeed => Ok(Measurement {
                took_ms: i as f64,
                round_trip_ms: self.delays[i] as f64,
            }),
            Behaviour::Refuse => Err(TaskError::Transport("connection refused".into())),
            Behaviour::Reject => Err(TaskError::Status {
                status: 500,
                body: String::new(),
            }),
            Behaviour::Garble => Err(TaskError::Decode {
                message: "expected value".into(),
                body: "<html>".into(),
            }),
        }
    }
}

fn behaviour() -> impl Strategy<Value = Behaviour> {
    prop_oneof![
        6 => Just(Behaviour::Succeed),
        1 => Just(Behaviour::Refuse),
        1 => Just(Behaviour::Reject),
        1 => Just(Behaviour::Garble),
    ]
}

fn task(i: usize) -> Task {
    Task {
        endpoint: format!("e{}", i % 3),
        entity_id: i as u64,
        item_count: if i % 2 == 0 { 1 } else { 10 },
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn every_success_recorded_exactly_once(
        (delays, script) in (1usize..80).prop_flat_map(|n| (
            prop::collection::vec(0u64..4, n),
            prop::collection::vec(behaviour(), n),
        )),
        workers in 1usize..12,
    ) {
        let n = script.len();
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        let source = Arc::new(ScriptedSource::new(delays, script.clone()));
        let tasks: Vec<Task> = (0..n).map(task).collect();
        let summary = rt.block_on(Dispatcher::new(Arc::clone(&source), workers).run(tasks));

        let expected_ok: Vec<usize> = (0..n)
            .filter(|&i| matches!(script[i], Behaviour::Succeed))
            .collect();

        prop_assert_eq!(summary.total_tasks, n);
        prop_assert_eq!(summary.succeeded, expected_ok.len());
        prop_assert_eq!(summary.failed(), n - expected_ok.len());
        prop_assert_eq!(summary.results.len(), expected_ok.len());
        prop_assert_eq!(summary.skipped, 0);
        prop_assert!(source.peak.load(Ordering::SeqCst) <= workers);
        for calls in &source.calls {
            prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
        }

        // each group holds exactly its own successful task indices
        for endpoint in ["e0", "e1", "e2"] {
            for item_count in [1u32, 10] {
                let mut want: Vec<f64> = expected_ok
                    .iter()
                    .copied()
                    .filter(|&i| task(i).endpoint == endpoint && task(i).item_count == item_count)
                    .map(|i| i as f64)
                    .collect();
                let mut got: Vec<f64> = summary
                    .results
                    .samples(endpoint, item_count)
                    .map(|g| g.elapsed_ms.clone())
                    .unwrap_or_default();
                want.sort_by(f64::total_cmp);
                got.sort_by(f64::total_cmp);
                prop_assert_eq!(got, want);
            }
        }
    }
}
