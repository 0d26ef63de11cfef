pub mod api;
pub mod job;
pub mod results;

pub use api::{
    CancelResponse, ErrorResponse, HealthResponse, JobList, ResetResponse, RunRequest,
    RunResponse,
};
pub use job::{new_job_id, requested_wait_time, Job, JobId, JobInput, JobStatus};
pub use results::JobOutput;
