use common::JobInput;
use rand::Rng;
use serde_json::json;

/// Cuántos jobs comparten la misma etiqueta de `batch`.
const JOBS_PER_BATCH_LABEL: usize = 10;

/// Genera `n` entradas de prueba con un `wait_time` aleatorio (2 decimales)
/// entre `min_wait` y `max_wait`:
///
/// `{"task_name": "task_001", "wait_time": 1.73, "batch": "batch_1", "index": 1}`
pub fn generate_inputs(n: usize, min_wait: f64, max_wait: f64) -> Vec<JobInput> {
    let (lo, hi) = if min_wait <= max_wait {
        (min_wait, max_wait)
    } else {
        (max_wait, min_wait)
    };
    let mut rng = rand::thread_rng();

    (0..n)
        .map(|i| {
            let wait = round2(rng.gen_range(lo..=hi));
            build_input(i, wait)
        })
        .collect()
}

/// Igual que `generate_inputs` pero todos con el mismo `wait_time`.
pub fn uniform_inputs(n: usize, wait_time: f64) -> Vec<JobInput> {
    (0..n).map(|i| build_input(i, wait_time)).collect()
}

fn build_input(i: usize, wait_time: f64) -> JobInput {
    let value = json!({
        "task_name": format!("task_{:03}", i + 1),
        "wait_time": wait_time,
        "batch": format!("batch_{}", i / JOBS_PER_BATCH_LABEL + 1),
        "index": i + 1,
    });
    match value {
        serde_json::Value::Object(map) => map,
        _ => JobInput::new(),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
