pub mod aggregate;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod harness;
pub mod report;
pub mod results;
pub mod source;
pub mod stats;
pub mod telemetry;
pub mod workload;

pub use aggregate::{
    aggregate, Aggregate, AggregateStat, EndpointAggregate, GroupOutcome, LoadGroup,
};
pub use config::{Config, EndpointSpec};
pub use dispatch::{DispatchSummary, Dispatcher};
pub use error::{ConfigError, FailureKind, TaskError};
pub use results::{ResultSet, TaskResult};
pub use source::{HttpTimingSource, Measurement, TimingSource};
pub use workload::{generate_tasks, Task};
