// server/src/registry.rs

use chrono::Utc;
use common::{requested_wait_time, Job, JobId, JobInput, JobOutput, JobStatus};
use rand::Rng;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WaitRange;
use crate::error::{ApiError, ApiResult};

/// Conteos para /health
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryHealth {
    /// jobs en IN_PROGRESS
    pub active_count: usize,
    pub total_count: usize,
}

/// Registro en memoria de todos los jobs del proceso.
///
/// Es barato de clonar: todos los clones comparten el mismo mapa. El lock
/// nunca se mantiene a través de un `.await`, así que la espera simulada de
/// un job no bloquea al resto.
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<JobId, Job>>>,
    wait_range: WaitRange,
    // se cancela al apagar el servidor; corta las esperas pendientes
    shutdown: CancellationToken,
}

impl JobRegistry {
    /// Un rango que no se puede convertir en `Duration` se reemplaza por el default.
    pub fn new(wait_range: WaitRange) -> Self {
        let wait_range = if wait_range.is_valid() {
            wait_range
        } else {
            warn!(
                "rango de espera inválido {:?}, usando {:?}",
                wait_range,
                WaitRange::default()
            );
            WaitRange::default()
        };

        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            wait_range,
            shutdown: CancellationToken::new(),
        }
    }

    fn lock_jobs(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        // un panic con el lock tomado no deja estados a medias: cada
        // transición se escribe completa dentro de Job
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Crea el job en IN_QUEUE, lanza su ejecución en segundo plano y
    /// vuelve enseguida, sin esperar el trabajo.
    pub fn submit(&self, input: JobInput) -> ApiResult<Job> {
        let (wait_time, sleep_for) = self.resolve_wait_time(&input)?;

        let job = Job::new(input);
        {
            let mut jobs = self.lock_jobs();
            jobs.insert(job.id.clone(), job.clone());
        }

        debug!("job {} en cola (wait_time={:.2}s)", job.id, wait_time);
        self.spawn_execution(job.id.clone(), job.input.clone(), wait_time, sleep_for);

        Ok(job)
    }

    pub fn get_status(&self, id: &str) -> ApiResult<Job> {
        let jobs = self.lock_jobs();
        jobs.get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(id.to_string()))
    }

    /// Fuerza CANCELLED si el job no terminó. Sobre un job terminal no
    /// hace nada y devuelve su estado actual.
    pub fn cancel(&self, id: &str) -> ApiResult<Job> {
        let mut jobs = self.lock_jobs();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(id.to_string()))?;

        if job.cancel(Utc::now()) {
            info!("job {} cancelado", id);
        } else {
            debug!("cancel ignorado: job {} ya estaba en {}", id, job.status);
        }

        Ok(job.clone())
    }

    pub fn health(&self) -> RegistryHealth {
        let jobs = self.lock_jobs();
        let active_count = jobs
            .values()
            .filter(|j| j.status == JobStatus::InProgress)
            .count();

        RegistryHealth {
            active_count,
            total_count: jobs.len(),
        }
    }

    /// Snapshot de todos los jobs, ordenados por fecha de creación.
    pub fn list_all(&self) -> Vec<Job> {
        let mut all: Vec<Job> = {
            let jobs = self.lock_jobs();
            jobs.values().cloned().collect()
        };
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    /// Borra todos los jobs. Devuelve cuántos había.
    pub fn reset(&self) -> usize {
        let removed = {
            let mut jobs = self.lock_jobs();
            let n = jobs.len();
            jobs.clear();
            n
        };
        info!("registro reiniciado ({} jobs eliminados)", removed);
        removed
    }

    /// Corta las esperas de todos los jobs en curso (apagado del servidor).
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Segundos a reportar y la espera ya convertida. Tanto el valor pedido
    /// como el sorteado pasan por `Duration::try_from_secs_f64`.
    fn resolve_wait_time(&self, input: &JobInput) -> ApiResult<(f64, Duration)> {
        let secs = match input.get("wait_time") {
            None => {
                let WaitRange { min_secs, max_secs } = self.wait_range;
                rand::thread_rng().gen_range(min_secs..=max_secs)
            }
            Some(raw) => requested_wait_time(input).ok_or_else(|| {
                ApiError::MalformedRequest(format!("wait_time must be a number, got {raw}"))
            })?,
        };

        let sleep_for = Duration::try_from_secs_f64(secs).map_err(|_| {
            ApiError::MalformedRequest(format!(
                "wait_time must be a finite, non-negative number of seconds, got {secs}"
            ))
        })?;
        Ok((secs, sleep_for))
    }

    fn spawn_execution(&self, job_id: JobId, input: JobInput, wait_time: f64, sleep_for: Duration) {
        let registry = self.clone();
        tokio::spawn(async move {
            registry.execute(job_id, input, wait_time, sleep_for).await;
        });
    }

    /// Unidad de ejecución de un job:
    /// 1. IN_QUEUE -> IN_PROGRESS (si nadie lo canceló antes)
    /// 2. duerme wait_time sin tener el lock
    /// 3. IN_PROGRESS -> COMPLETED, salvo que lo hayan cancelado o borrado
    async fn execute(&self, job_id: JobId, input: JobInput, wait_time: f64, sleep_for: Duration) {
        {
            let mut jobs = self.lock_jobs();
            let Some(job) = jobs.get_mut(&job_id) else {
                return;
            };
            if !job.start(Utc::now()) {
                debug!("job {} ya está en {}, no se ejecuta", job_id, job.status);
                return;
            }
            debug!("job {} IN_PROGRESS", job_id);
        }

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = self.shutdown.cancelled() => {
                warn!("apagando: job {} interrumpido en IN_PROGRESS", job_id);
                return;
            }
        }

        let now = Utc::now();
        let output = JobOutput::new(&job_id, wait_time, input, now);

        let mut jobs = self.lock_jobs();
        let Some(job) = jobs.get_mut(&job_id) else {
            debug!("job {} desapareció del registro (reset)", job_id);
            return;
        };
        if job.complete(output, now) {
            info!("job {} COMPLETED en {:.2}s", job_id, wait_time);
        } else {
            info!(
                "job {} terminó de dormir pero está en {}, se descarta el resultado",
                job_id, job.status
            );
        }
    }
}
