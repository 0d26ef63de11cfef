use common::{requested_wait_time, JobInput};
use serde::Serialize;
use tracing::{info, warn};

use crate::dispatch::{DispatchMode, RunOutcome};

/// min / max / promedio de una serie de segundos.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Stats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Some(Self { min, max, mean })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    pub index: usize,
    pub job_id: Option<String>,
    pub error: String,
}

/// Métricas agregadas de una corrida.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    pub mode: DispatchMode,
    pub total_jobs: usize,
    pub successful: usize,
    pub failed: usize,
    pub concurrency_limit: usize,
    pub peak_in_flight: usize,

    /// makespan real
    pub elapsed_secs: f64,
    pub avg_secs_per_job: f64,
    /// suma de las duraciones simuladas (lo que tardaría de a uno)
    pub sequential_secs: f64,
    /// sequential / limit
    pub theoretical_secs: f64,
    pub speedup: f64,
    pub efficiency_pct: f64,
    pub time_saved_secs: f64,
    /// elapsed / theoretical (1.0 = sin overhead)
    pub overhead_ratio: f64,
    /// jobs por segundo
    pub throughput: f64,

    pub wait_stats: Option<Stats>,
    pub total_time_stats: Option<Stats>,
    pub failures: Vec<FailureSummary>,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

impl RunMetrics {
    /// `inputs` tiene que ser la misma lista (y orden) que se despachó.
    pub fn aggregate(inputs: &[JobInput], outcome: &RunOutcome) -> Self {
        let total_jobs = outcome.results.len();
        let limit = outcome.concurrency_limit.max(1);

        // duración simulada por job: la pedida si vino en la entrada,
        // si no la que reportó el servidor
        let sequential_secs: f64 = outcome
            .results
            .iter()
            .enumerate()
            .map(|(i, res)| {
                inputs
                    .get(i)
                    .and_then(requested_wait_time)
                    .or_else(|| res.as_ref().ok().map(|r| r.wait_time))
                    .unwrap_or(0.0)
            })
            .sum();

        let successes: Vec<_> = outcome.successes().collect();
        let failures: Vec<FailureSummary> = outcome
            .failures()
            .map(|e| FailureSummary {
                index: e.index,
                job_id: e.job_id.clone(),
                error: e.source.to_string(),
            })
            .collect();

        let elapsed_secs = outcome.elapsed.as_secs_f64();
        let speedup = ratio(sequential_secs, elapsed_secs);
        let theoretical_secs = sequential_secs / limit as f64;

        let waits: Vec<f64> = successes.iter().map(|r| r.wait_time).collect();
        let totals: Vec<f64> = successes.iter().map(|r| r.total_time).collect();

        Self {
            mode: outcome.mode,
            total_jobs,
            successful: successes.len(),
            failed: failures.len(),
            concurrency_limit: limit,
            peak_in_flight: outcome.peak_in_flight,
            elapsed_secs,
            avg_secs_per_job: ratio(elapsed_secs, total_jobs as f64),
            sequential_secs,
            theoretical_secs,
            speedup,
            efficiency_pct: speedup / limit as f64 * 100.0,
            time_saved_secs: sequential_secs - elapsed_secs,
            overhead_ratio: ratio(elapsed_secs, theoretical_secs),
            throughput: ratio(total_jobs as f64, elapsed_secs),
            wait_stats: Stats::from_values(&waits),
            total_time_stats: Stats::from_values(&totals),
            failures,
        }
    }

    pub fn success_rate_pct(&self) -> f64 {
        ratio(self.successful as f64, self.total_jobs as f64) * 100.0
    }

    pub fn log_summary(&self) {
        info!("==================== resultados ====================");
        info!("modo            : {}", self.mode);
        info!(
            "exitosos        : {}/{} ({:.1}%)",
            self.successful,
            self.total_jobs,
            self.success_rate_pct()
        );
        info!("fallidos        : {}/{}", self.failed, self.total_jobs);
        info!(
            "tiempo total    : {:.2}s ({:.2}s/job)",
            self.elapsed_secs, self.avg_secs_per_job
        );
        info!(
            "en vuelo        : pico {} de {} slots",
            self.peak_in_flight, self.concurrency_limit
        );
        info!("secuencial est. : {:.2}s", self.sequential_secs);
        info!("speedup         : {:.2}x", self.speedup);
        info!("tiempo ahorrado : {:.2}s", self.time_saved_secs);
        info!("eficiencia      : {:.1}%", self.efficiency_pct);
        info!(
            "óptimo teórico  : {:.2}s (real {:.2}x del teórico)",
            self.theoretical_secs, self.overhead_ratio
        );
        info!("throughput      : {:.2} jobs/s", self.throughput);

        if let Some(w) = self.wait_stats {
            info!(
                "espera          : min {:.2}s / max {:.2}s / prom {:.2}s",
                w.min, w.max, w.mean
            );
        }
        if let Some(t) = self.total_time_stats {
            info!("tiempo por job  : prom {:.2}s", t.mean);
        }
        for f in &self.failures {
            warn!("job #{} falló: {}", f.index + 1, f.error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{JobOutcome, JobResult};
    use crate::error::{DispatchError, JobError};
    use chrono::Utc;
    use common::{JobOutput, JobStatus};
    use serde_json::json;
    use std::time::Duration;

    fn input(wait: Option<f64>) -> JobInput {
        match wait {
            Some(w) => json!({ "wait_time": w }).as_object().cloned().unwrap(),
            None => JobInput::new(),
        }
    }

    fn ok(index: usize, wait: f64, total: f64) -> JobOutcome {
        Ok(JobResult {
            job_index: index,
            job_id: format!("job-{index}"),
            input: input(Some(wait)),
            output: JobOutput::new("x", wait, JobInput::new(), Utc::now()),
            wait_time: wait,
            total_time: total,
            status: JobStatus::Completed,
            submitted_at: Utc::now(),
            finished_at: Utc::now(),
        })
    }

    fn failed(index: usize) -> JobOutcome {
        Err(JobError::new(
            index,
            Some(format!("job-{index}")),
            DispatchError::Timeout {
                job_id: format!("job-{index}"),
                max_wait: Duration::from_secs(1),
            },
        ))
    }

    fn outcome(results: Vec<JobOutcome>, elapsed_secs: f64, limit: usize) -> RunOutcome {
        RunOutcome {
            mode: DispatchMode::Independent { workers: limit },
            results,
            elapsed: Duration::from_secs_f64(elapsed_secs),
            concurrency_limit: limit,
            peak_in_flight: limit,
        }
    }

    #[test]
    fn calcula_speedup_eficiencia_y_throughput() {
        let inputs = vec![input(Some(1.0)), input(Some(2.0)), input(Some(3.0)), input(Some(2.0))];
        let out = outcome(
            vec![ok(0, 1.0, 1.1), ok(1, 2.0, 2.1), ok(2, 3.0, 3.1), ok(3, 2.0, 2.1)],
            4.0,
            2,
        );

        let m = RunMetrics::aggregate(&inputs, &out);
        assert_eq!(m.total_jobs, 4);
        assert_eq!(m.successful, 4);
        assert_eq!(m.failed, 0);
        assert!((m.sequential_secs - 8.0).abs() < 1e-9);
        assert!((m.speedup - 2.0).abs() < 1e-9);
        assert!((m.efficiency_pct - 100.0).abs() < 1e-9);
        assert!((m.throughput - 1.0).abs() < 1e-9);
        assert!((m.theoretical_secs - 4.0).abs() < 1e-9);
        assert!((m.overhead_ratio - 1.0).abs() < 1e-9);
        assert!((m.time_saved_secs - 4.0).abs() < 1e-9);
        assert!((m.avg_secs_per_job - 1.0).abs() < 1e-9);

        let w = m.wait_stats.unwrap();
        assert_eq!((w.min, w.max), (1.0, 3.0));
        assert!((w.mean - 2.0).abs() < 1e-9);
    }

    #[test]
    fn fallidos_se_cuentan_y_no_desaparecen() {
        let inputs = vec![input(Some(1.0)), input(Some(2.0)), input(Some(1.0))];
        let out = outcome(vec![ok(0, 1.0, 1.0), failed(1), ok(2, 1.0, 1.0)], 2.0, 3);

        let m = RunMetrics::aggregate(&inputs, &out);
        assert_eq!(m.successful + m.failed, m.total_jobs);
        assert_eq!(m.failed, 1);
        assert_eq!(m.failures[0].index, 1);
        assert_eq!(m.failures[0].job_id.as_deref(), Some("job-1"));
        // el fallido igual suma su duración pedida
        assert!((m.sequential_secs - 4.0).abs() < 1e-9);
        assert!((m.success_rate_pct() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn sin_wait_time_en_entrada_usa_el_observado() {
        let inputs = vec![input(None), input(None)];
        let out = outcome(vec![ok(0, 1.5, 1.6), failed(1)], 2.0, 2);

        let m = RunMetrics::aggregate(&inputs, &out);
        assert!((m.sequential_secs - 1.5).abs() < 1e-9);
    }

    #[test]
    fn elapsed_cero_no_divide_por_cero() {
        let out = outcome(vec![], 0.0, 1);
        let m = RunMetrics::aggregate(&[], &out);
        assert_eq!(m.speedup, 0.0);
        assert_eq!(m.throughput, 0.0);
        assert_eq!(m.avg_secs_per_job, 0.0);
        assert!(m.wait_stats.is_none());
        assert!(m.total_time_stats.is_none());
    }

    #[test]
    fn stats_de_serie() {
        assert!(Stats::from_values(&[]).is_none());
        let s = Stats::from_values(&[2.0, 4.0, 9.0]).unwrap();
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
        assert!((s.mean - 5.0).abs() < 1e-9);
    }
}
