use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::TaskError;
use crate::extract::{inspect, Extraction};
use crate::workload::Task;

/// Response bodies are cut to this many characters before being logged
pub const BODY_LOG_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Timing value reported by the backend
    pub took_ms: f64,
    /// Wall-clock time from send to fully read body
    pub round_trip_ms: f64,
}

/// Executes a single task and reports the backend's timing.
#[async_trait]
pub trait TimingSource: Send + Sync {
    async fn measure(&self, task: &Task) -> Result<Measurement, TaskError>;
}

pub struct HttpTimingSource {
    client: reqwest::Client,
    base_url: String,
    paths: HashMap<String, String>,
    metric_field: String,
    timeout: Duration,
}

impl HttpTimingSource {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("latency-harness/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let timeout = config.request_timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(config.workers)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            paths: config
                .endpoints
                .iter()
                .map(|e| (e.key.clone(), e.path.trim_matches('/').to_string()))
                .collect(),
            metric_field: config.metric_field.clone(),
            timeout,
        })
    }

    /// `{base_url}/{endpoint_path}/{entity_id}/{item_count}`
    pub fn url_for(&self, task: &Task) -> Option<String> {
        let path = self.paths.get(&task.endpoint)?;
        Some(format!(
            "{}/{}/{}/{}",
            self.base_url, path, task.entity_id, task.item_count
        ))
    }

    fn transport_error(&self, err: reqwest::Error) -> TaskError {
        if err.is_timeout() {
            TaskError::Timeout(self.timeout)
        } else {
            TaskError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl TimingSource for HttpTimingSource {
    async fn measure(&self, task: &Task) -> Result<Measurement, TaskError> {
        let url = self.url_for(task).ok_or_else(|| {
            TaskError::Transport(format!("no path configured for endpoint `{}`", task.endpoint))
        })?;

        let start = Instant::now();
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        if !status.is_success() {
            // body is only kept for the log line, a failed read leaves it empty
            let body = resp.text().await.unwrap_or_default();
            return Err(TaskError::Status {
                status: status.as_u16(),
                body: truncate_body(&body, BODY_LOG_LIMIT),
            });
        }

        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        let round_trip_ms = start.elapsed().as_secs_f64() * 1000.0;

        let json: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| TaskError::Decode {
                message: e.to_string(),
                body: truncate_body(&body, BODY_LOG_LIMIT),
            })?;

        match inspect(&json, &self.metric_field) {
            Extraction::Found(took_ms) => Ok(Measurement { took_ms, round_trip_ms }),
            Extraction::Missing => Err(TaskError::MissingMetric {
                field: self.metric_field.clone(),
                body: truncate_body(&body, BODY_LOG_LIMIT),
            }),
            Extraction::NonNumeric(value) => Err(TaskError::NonNumericMetric {
                field: self.metric_field.clone(),
                value: value.to_string(),
                body: truncate_body(&body, BODY_LOG_LIMIT),
            }),
        }
    }
}

/// Cuts `body` to `max_chars` characters, marking the cut with `...`.
pub fn truncate_body(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
