use chrono::Utc;
use serde_json::json;
use std::{
    fs,
    io,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::dispatch::{JobResult, RunOutcome};
use crate::metrics::RunMetrics;

/// Nombre del archivo de un resultado: result_{index:02}_{id8}.txt
pub fn result_file_name(result: &JobResult) -> String {
    let short_id = result.job_id.get(..8).unwrap_or(&result.job_id);
    format!("result_{:02}_{}.txt", result.job_index, short_id)
}

/// Escribe un .txt con el `result_text` de cada job exitoso y un
/// `summary.json` con totales, métricas y resultados. Devuelve la ruta del resumen.
pub fn save_results(
    output_dir: &Path,
    outcome: &RunOutcome,
    metrics: &RunMetrics,
) -> io::Result<PathBuf> {
    fs::create_dir_all(output_dir)?;

    let successful: Vec<&JobResult> = outcome.successes().collect();

    for result in &successful {
        let path = output_dir.join(result_file_name(result));
        fs::write(&path, &result.output.result_text)?;
        info!("guardado: {}", path.display());
    }

    let summary = json!({
        "timestamp": Utc::now().to_rfc3339(),
        "total_jobs": outcome.results.len(),
        "successful": metrics.successful,
        "failed": metrics.failed,
        "metrics": metrics,
        "results": successful,
    });

    let summary_path = output_dir.join("summary.json");
    let pretty = serde_json::to_string_pretty(&summary).map_err(io::Error::other)?;
    fs::write(&summary_path, pretty)?;
    info!("resumen guardado: {}", summary_path.display());

    Ok(summary_path)
}
