use common::{
    CancelResponse, ErrorResponse, HealthResponse, Job, JobId, JobInput, JobList, ResetResponse,
    RunRequest, RunResponse,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::env;
use tracing::warn;

use crate::error::DispatchError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_ENDPOINT_ID: &str = "test-endpoint";

/// Reintentos inmediatos de un GET de status ante fallas de red.
/// El submit no se reintenta: podría duplicar el job.
pub const STATUS_RETRIES: u32 = 2;

/// URL base del servidor de jobs.
/// - REGISTRY_URL si está definida
/// - si no, http://localhost:5000 (pruebas locales)
pub fn registry_base_url() -> String {
    env::var("REGISTRY_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

pub fn registry_endpoint_id() -> String {
    env::var("ENDPOINT_ID").unwrap_or_else(|_| DEFAULT_ENDPOINT_ID.to_string())
}

/// Cliente HTTP del protocolo run/status/cancel. Clonarlo es barato
/// (reqwest::Client ya comparte el pool de conexiones).
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: Client,
    base_url: String,
    endpoint_id: String,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>, endpoint_id: impl Into<String>) -> Self {
        Self::with_http_client(Client::new(), base_url, endpoint_id)
    }

    pub fn with_http_client(
        http: Client,
        base_url: impl Into<String>,
        endpoint_id: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoint_id: endpoint_id.into(),
        }
    }

    fn job_url(&self, action: &str) -> String {
        format!("{}/v2/{}/{}", self.base_url, self.endpoint_id, action)
    }

    /// POST /v2/{endpoint}/run
    pub async fn submit_job(&self, input: &JobInput) -> Result<JobId, DispatchError> {
        let body = RunRequest {
            input: input.clone(),
        };
        let resp = self.http.post(self.job_url("run")).json(&body).send().await?;
        let run: RunResponse = decode(resp, None).await?;
        Ok(run.id)
    }

    /// GET /v2/{endpoint}/status/{id}, con hasta STATUS_RETRIES reintentos.
    pub async fn get_status(&self, id: &str) -> Result<Job, DispatchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_status(id).await {
                Err(e) if e.is_transient() && attempt < STATUS_RETRIES => {
                    attempt += 1;
                    warn!(
                        "status de {} falló ({}), reintento {}/{}",
                        id, e, attempt, STATUS_RETRIES
                    );
                }
                other => return other,
            }
        }
    }

    async fn fetch_status(&self, id: &str) -> Result<Job, DispatchError> {
        let url = self.job_url(&format!("status/{id}"));
        let resp = self.http.get(url).send().await?;
        decode(resp, Some(id)).await
    }

    /// POST /v2/{endpoint}/cancel/{id}
    pub async fn cancel(&self, id: &str) -> Result<CancelResponse, DispatchError> {
        let url = self.job_url(&format!("cancel/{id}"));
        let resp = self.http.post(url).send().await?;
        decode(resp, Some(id)).await
    }

    pub async fn health(&self) -> Result<HealthResponse, DispatchError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        decode(resp, None).await
    }

    pub async fn list_jobs(&self) -> Result<JobList, DispatchError> {
        let resp = self
            .http
            .get(format!("{}/jobs", self.base_url))
            .send()
            .await?;
        decode(resp, None).await
    }

    pub async fn reset(&self) -> Result<ResetResponse, DispatchError> {
        let resp = self
            .http
            .post(format!("{}/reset", self.base_url))
            .send()
            .await?;
        decode(resp, None).await
    }
}

/// Decodifica el body si la respuesta es 2xx; si no, traduce el
/// `{"error": ...}` del servidor al error que corresponde.
async fn decode<T: DeserializeOwned>(
    resp: Response,
    job_id: Option<&str>,
) -> Result<T, DispatchError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<T>().await?);
    }

    let message = match resp.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
    };

    Err(match (status, job_id) {
        (StatusCode::NOT_FOUND, Some(id)) => DispatchError::NotFound(id.to_string()),
        (StatusCode::BAD_REQUEST, _) => DispatchError::MalformedRequest(message),
        _ => DispatchError::UnexpectedResponse {
            status: status.as_u16(),
            message,
        },
    })
}
