use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use common::{CancelResponse, HealthResponse, Job, JobList, ResetResponse, RunRequest, RunResponse};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `{endpoint}` es sólo un segmento de ruta: se loguea pero no separa nada.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v2/:endpoint/run", post(submit_job))
        .route("/v2/:endpoint/status/:id", get(job_status))
        .route("/v2/:endpoint/cancel/:id", post(cancel_job))
        .route("/health", get(health))
        .route("/jobs", get(list_jobs))
        .route("/reset", post(reset_jobs))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

// Recibe un job nuevo; responde apenas queda en cola
async fn submit_job(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> ApiResult<Json<RunResponse>> {
    let Json(req) = payload.map_err(|rejection| {
        ApiError::MalformedRequest(rejection.body_text())
    })?;

    let job = state.registry.submit(req.input)?;
    info!("[{}] job {} recibido", endpoint, job.id);

    Ok(Json(RunResponse {
        id: job.id,
        status: job.status,
    }))
}

async fn job_status(
    State(state): State<AppState>,
    Path((endpoint, id)): Path<(String, String)>,
) -> ApiResult<Json<Job>> {
    debug!("[{}] status de {}", endpoint, id);
    let job = state.registry.get_status(&id)?;
    Ok(Json(job))
}

async fn cancel_job(
    State(state): State<AppState>,
    Path((endpoint, id)): Path<(String, String)>,
) -> ApiResult<Json<CancelResponse>> {
    let job = state.registry.cancel(&id)?;
    info!("[{}] cancel de {} -> {}", endpoint, id, job.status);

    Ok(Json(CancelResponse {
        id: job.id,
        status: job.status,
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let h = state.registry.health();
    Json(HealthResponse {
        status: "healthy".to_string(),
        active_jobs: h.active_count,
        total_jobs: h.total_count,
    })
}

// Lista todos los jobs (para debug)
async fn list_jobs(State(state): State<AppState>) -> Json<JobList> {
    let jobs = state.registry.list_all();
    Json(JobList {
        total: jobs.len(),
        jobs,
    })
}

// Borra todo (para tests)
async fn reset_jobs(State(state): State<AppState>) -> Json<ResetResponse> {
    state.registry.reset();
    Json(ResetResponse {
        message: "All jobs cleared".to_string(),
    })
}
