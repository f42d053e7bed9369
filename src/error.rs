use serde::Serialize;
use std::time::Duration;
use strum::{Display, EnumIter};
use thiserror::Error;

/// Fatal errors raised before any request is sent
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("entity id pool is empty: set `entity_ids` to at least one valid identifier")]
    EmptyEntityPool,
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// Per-task failure. Never escalated past the dispatcher.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("remote returned status {status}")]
    Status { status: u16, body: String },

    #[error("malformed JSON body: {message}")]
    Decode { message: String, body: String },

    #[error("field `{field}` not found in response")]
    MissingMetric { field: String, body: String },

    #[error("field `{field}` is not numeric: {value}")]
    NonNumericMetric {
        field: String,
        value: String,
        body: String,
    },

    #[error("measurement task crashed: {0}")]
    Crashed(String),
}

impl TaskError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TaskError::Transport(_) => FailureKind::Transport,
            TaskError::Timeout(_) => FailureKind::Timeout,
            TaskError::Status { .. } => FailureKind::Status,
            TaskError::Decode { .. } => FailureKind::Decode,
            TaskError::MissingMetric { .. } => FailureKind::MissingMetric,
            TaskError::NonNumericMetric { .. } => FailureKind::NonNumericMetric,
            TaskError::Crashed(_) => FailureKind::Crashed,
        }
    }

    /// Truncated response body, when the failure happened after a response arrived
    pub fn body(&self) -> Option<&str> {
        match self {
            TaskError::Status { body, .. }
            | TaskError::Decode { body, .. }
            | TaskError::MissingMetric { body, .. }
            | TaskError::NonNumericMetric { body, .. } => Some(body),
            TaskError::Transport(_) | TaskError::Timeout(_) | TaskError::Crashed(_) => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Timeout,
    Status,
    Decode,
    MissingMetric,
    NonNumericMetric,
    Crashed,
}
