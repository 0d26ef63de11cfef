use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::JobInput;

/// Resultado de un job completado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    /// Reporte legible de la ejecución simulada
    pub result_text: String,
    /// Segundos que "trabajó" el job
    pub wait_time: f64,
    /// Copia de la entrada original
    pub input_data: JobInput,
}

impl JobOutput {
    pub fn new(
        job_id: &str,
        wait_time: f64,
        input_data: JobInput,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let pretty_input = serde_json::to_string_pretty(&input_data)
            .unwrap_or_else(|_| "{}".to_string());

        let result_text = format!(
            "Job completion report\n\
             ==================\n\
             Job ID: {job_id}\n\
             Wait time: {wait_time:.2}s\n\
             Input data: {pretty_input}\n\
             Completed at: {}\n\
             ==================\n",
            completed_at.to_rfc3339()
        );

        Self {
            result_text,
            wait_time,
            input_data,
        }
    }

    /// `wait_time` en milisegundos, truncado.
    pub fn execution_time_ms(&self) -> u64 {
        (self.wait_time * 1000.0) as u64
    }
}
