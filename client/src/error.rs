use common::{Job, JobId};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// El servidor rechazó el payload (400)
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("job {0} not found")]
    NotFound(JobId),

    /// El job terminó en CANCELLED o FAILED
    #[error("job {} ended as {}", .0.id, .0.status)]
    JobFailed(Box<Job>),

    /// Se acabó max_wait sin estado terminal. No toca el job en el servidor.
    #[error("job {job_id} not terminal after {max_wait:?}")]
    Timeout { job_id: JobId, max_wait: Duration },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response ({status}): {message}")]
    UnexpectedResponse { status: u16, message: String },

    #[error("dispatch task aborted: {0}")]
    Aborted(String),
}

impl DispatchError {
    /// Fallas de red que vale la pena reintentar enseguida.
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::Transport(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

/// Error de un job dentro de una corrida, con su índice para poder atribuirlo.
#[derive(Debug, Error)]
#[error("job #{index} failed: {source}")]
pub struct JobError {
    pub index: usize,
    /// None si falló antes de tener id (en el submit)
    pub job_id: Option<JobId>,
    #[source]
    pub source: DispatchError,
}

impl JobError {
    pub fn new(index: usize, job_id: Option<JobId>, source: DispatchError) -> Self {
        Self {
            index,
            job_id,
            source,
        }
    }
}
