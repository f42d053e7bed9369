use std::time::Duration;

use latency_harness::config::{Config, EndpointSpec};
use latency_harness::error::{ConfigError, FailureKind};
use latency_harness::harness;
use latency_harness::report::write_table;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn scenario_config(server: &MockServer) -> Config {
    Config {
        base_url: format!("{}/api", server.uri()),
        endpoints: vec![
            EndpointSpec::new("redis", "random-redis-items"),
            EndpointSpec::new("postgres", "random-items"),
            EndpointSpec::new("postgres redis cache", "random-items-cached"),
        ],
        entity_ids: vec![1, 2, 3],
        load_sizes: vec![10, 1],
        repetitions: 5,
        workers: 4,
        timeout_seconds: 1,
        progress_every: 10,
        seed: Some(2024),
        ..Config::default()
    }
}

async fn mount_backends(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/random-redis-items/\d+/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"took": 4}"#))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/random-items/\d+/\d+$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"result": {"rows": [], "took": 7}}"#),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/random-items-cached/\d+/\d+$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"data": {"rows": [{"id": 1, "took": "1.5"}]}}"#),
        )
        .mount(server)
        .await;
}

/// 3 endpoints x 2 load sizes x 5 repetitions, three requests time out.
#[tokio::test]
async fn thirty_tasks_with_three_timeouts() {
    let server = MockServer::start().await;

    // registered first, so it answers the first three redis requests
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/random-redis-items/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"took": 999}"#)
                .set_delay(Duration::from_secs(3)),
        )
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_backends(&server).await;

    let cfg = scenario_config(&server);
    let report = harness::run(&cfg, CancellationToken::new()).await.unwrap();

    assert_eq!(report.summary.total_tasks, 30);
    assert_eq!(report.summary.succeeded, 27);
    assert_eq!(report.summary.failures.get(FailureKind::Timeout), 3);
    assert_eq!(report.summary.failed, 3);
    assert_eq!(report.summary.skipped, 0);

    let agg = &report.aggregate;
    assert_eq!(agg.total_samples(), 27);
    for endpoint in &agg.endpoints {
        assert!(endpoint.measured_groups().count() <= 2);
    }

    let names: Vec<&str> = agg.endpoints.iter().map(|e| e.endpoint.as_str()).collect();
    assert_eq!(names, vec!["redis", "postgres", "postgres redis cache"]);
    let counts: Vec<u32> = agg.endpoints[0].groups.iter().map(|g| g.item_count).collect();
    assert_eq!(counts, vec![1, 10]);

    let redis_samples: usize = agg
        .endpoint("redis")
        .unwrap()
        .measured_groups()
        .map(|(_, s)| s.sample_count)
        .sum();
    assert_eq!(redis_samples, 7);

    for item_count in [1, 10] {
        let postgres = agg.stat("postgres", item_count).unwrap();
        assert_eq!(postgres.sample_count, 5);
        assert_eq!(postgres.mean, 7.0);
        assert_eq!(postgres.stdev, 0.0);

        let cached = agg.stat("postgres redis cache", item_count).unwrap();
        assert_eq!(cached.median, 1.5);
    }
    for (_, stat) in agg.endpoint("redis").unwrap().measured_groups() {
        assert_eq!(stat.mean, 4.0);
    }

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 30);
}

#[tokio::test]
async fn remote_errors_leave_no_data_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/random-items-cached/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("cache offline"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/random-items/\d+/1$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"rows": []}"#))
        .mount(&server)
        .await;
    mount_backends(&server).await;

    let cfg = scenario_config(&server);
    let report = harness::run(&cfg, CancellationToken::new()).await.unwrap();

    assert_eq!(report.summary.failures.get(FailureKind::Status), 10);
    assert_eq!(report.summary.failures.get(FailureKind::MissingMetric), 5);
    assert_eq!(report.summary.succeeded, 15);

    let cached = report.aggregate.endpoint("postgres redis cache").unwrap();
    assert_eq!(cached.measured_groups().count(), 0);
    assert_eq!(cached.groups.len(), 2);
    assert!(report.aggregate.stat("postgres", 1).is_none());
    assert_eq!(report.aggregate.stat("postgres", 10).unwrap().sample_count, 5);

    let mut table = Vec::new();
    write_table(&mut table, &report).unwrap();
    let table = String::from_utf8(table).unwrap();
    assert!(table.contains("no data"));
    assert!(table.contains("missing_metric"));
}

#[tokio::test]
async fn empty_entity_pool_never_touches_the_network() {
    let server = MockServer::start().await;
    mount_backends(&server).await;

    let cfg = Config {
        entity_ids: Vec::new(),
        ..scenario_config(&server)
    };
    let err = harness::run(&cfg, CancellationToken::new()).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::EmptyEntityPool)
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_backend_drops_every_task_without_aborting() {
    let cfg = Config {
        base_url: "http://127.0.0.1:9/api".to_string(),
        endpoints: vec![EndpointSpec::new("redis", "random-redis-items")],
        load_sizes: vec![1],
        repetitions: 3,
        workers: 2,
        timeout_seconds: 2,
        ..Config::default()
    };

    let report = harness::run(&cfg, CancellationToken::new()).await.unwrap();

    assert_eq!(report.summary.total_tasks, 3);
    assert_eq!(report.summary.succeeded, 0);
    assert_eq!(report.summary.failed, 3);
    assert_eq!(report.aggregate.total_samples(), 0);
    assert!(report.chart_series().is_empty());
}
