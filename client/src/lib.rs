pub mod api;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod report;
pub mod workload;

pub use api::RegistryClient;
pub use dispatch::{
    poll_until_terminal, DispatchConfig, DispatchMode, Dispatcher, JobOutcome, JobResult,
    RunOutcome,
};
pub use error::{DispatchError, JobError};
pub use metrics::RunMetrics;
