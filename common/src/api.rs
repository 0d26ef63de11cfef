use serde::{Deserialize, Serialize};

use crate::job::{Job, JobId, JobInput, JobStatus};

/* --------- Cuerpos de request/response del protocolo --------- */

/// POST /v2/{endpoint}/run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub input: JobInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    pub id: JobId,
    pub status: JobStatus,
}

/// POST /v2/{endpoint}/cancel/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub id: JobId,
    pub status: JobStatus,
}

/// GET /health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_jobs: usize,
    pub total_jobs: usize,
}

/// GET /jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobList {
    pub total: usize,
    pub jobs: Vec<Job>,
}

/// POST /reset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
}

/// Cuerpo de cualquier respuesta de error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
