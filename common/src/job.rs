use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::results::JobOutput;

pub type JobId = String;

/// Payload opaco que manda el cliente (objeto JSON clave→valor).
pub type JobInput = Map<String, Value>;

/// Genera un id nuevo (uuid v4); nunca se reutiliza.
pub fn new_job_id() -> JobId {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InQueue,
    InProgress,
    Completed,
    Cancelled,
    /// Parte del contrato de estados, el servidor nunca lo produce.
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::InQueue => "IN_QUEUE",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,

    /// Entrada tal cual la mandó el cliente
    #[serde(default)]
    pub input: JobInput,

    /// Sólo presente cuando status == COMPLETED
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<JobOutput>,

    /// -------- Tiempos del job --------
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        alias = "executionTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub execution_time_ms: Option<u64>,
}

impl Job {
    pub fn new(input: JobInput) -> Self {
        Self {
            id: new_job_id(),
            status: JobStatus::InQueue,
            input,
            output: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            execution_time_ms: None,
        }
    }

    /// `wait_time` pedido en la entrada (segundos), si viene.
    pub fn requested_wait_time(&self) -> Option<f64> {
        requested_wait_time(&self.input)
    }

    /// IN_QUEUE -> IN_PROGRESS. Devuelve false si el job ya no está en cola
    /// (por ejemplo, lo cancelaron antes de arrancar).
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != JobStatus::InQueue {
            return false;
        }
        self.status = JobStatus::InProgress;
        self.started_at = Some(now);
        true
    }

    /// IN_PROGRESS -> COMPLETED, escribiendo output y tiempos de una vez.
    /// Si el job fue cancelado mientras dormía no se toca nada.
    pub fn complete(&mut self, output: JobOutput, now: DateTime<Utc>) -> bool {
        if self.status != JobStatus::InProgress {
            return false;
        }
        self.execution_time_ms = Some(output.execution_time_ms());
        self.output = Some(output);
        self.completed_at = Some(now);
        self.status = JobStatus::Completed;
        true
    }

    /// Fuerza CANCELLED desde cualquier estado no terminal.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(now);
        true
    }
}

/// Lee `wait_time` de un payload de entrada. Devuelve None si no viene o no es numérico.
pub fn requested_wait_time(input: &JobInput) -> Option<f64> {
    input.get("wait_time").and_then(Value::as_f64)
}
