use chrono::{DateTime, Utc};
use common::{Job, JobId, JobInput, JobOutput, JobStatus};
use serde::Serialize;
use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::RegistryClient;
use crate::error::{DispatchError, JobError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    /// Cada cuánto se consulta el status de un job
    pub poll_interval: Duration,
    /// Tope de espera por job antes de dar Timeout
    pub max_wait: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

/// Forma de repartir los jobs entre los slots de concurrencia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DispatchMode {
    /// Workers independientes: un slot libre toma enseguida el próximo job.
    Independent { workers: usize },
    /// Lotes de `workers` jobs; cada lote se vacía antes de arrancar el siguiente.
    Batched { workers: usize },
    /// De a uno.
    Sequential,
    /// Todos a la vez.
    Unbounded,
}

impl Default for DispatchMode {
    fn default() -> Self {
        DispatchMode::Independent { workers: 10 }
    }
}

impl DispatchMode {
    /// Cuántos jobs pueden estar enviados-y-no-terminados a la vez.
    pub fn concurrency_limit(&self, total_jobs: usize) -> usize {
        match *self {
            DispatchMode::Independent { workers } | DispatchMode::Batched { workers } => {
                workers.max(1)
            }
            DispatchMode::Sequential => 1,
            DispatchMode::Unbounded => total_jobs.max(1),
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Independent { workers } => write!(f, "independent ({workers} workers)"),
            DispatchMode::Batched { workers } => write!(f, "batched ({workers} per batch)"),
            DispatchMode::Sequential => write!(f, "sequential"),
            DispatchMode::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Resultado de un job exitoso, desde el punto de vista del cliente.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub job_index: usize,
    pub job_id: JobId,
    pub input: JobInput,
    pub output: JobOutput,
    /// wait_time que reportó el servidor
    pub wait_time: f64,
    /// segundos desde el submit hasta ver el estado terminal
    pub total_time: f64,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub type JobOutcome = Result<JobResult, JobError>;

/// Todo lo que deja una corrida de `Dispatcher::run`.
#[derive(Debug)]
pub struct RunOutcome {
    pub mode: DispatchMode,
    /// Mismo orden que las entradas
    pub results: Vec<JobOutcome>,
    /// makespan
    pub elapsed: Duration,
    pub concurrency_limit: usize,
    /// Máximo de jobs en vuelo observado
    pub peak_in_flight: usize,
}

impl RunOutcome {
    pub fn successes(&self) -> impl Iterator<Item = &JobResult> {
        self.results.iter().filter_map(|r| r.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobError> {
        self.results.iter().filter_map(|r| r.as_ref().err())
    }
}

/// Consulta el status cada `poll_interval` hasta ver un estado terminal.
/// El timeout envuelve todo el loop: si pasa `max_wait` sin terminar, Timeout.
/// El job en el servidor sigue como estaba.
pub async fn poll_until_terminal(
    client: &RegistryClient,
    id: &str,
    poll_interval: Duration,
    max_wait: Duration,
) -> Result<Job, DispatchError> {
    match tokio::time::timeout(max_wait, poll_loop(client, id, poll_interval)).await {
        Ok(res) => res,
        Err(_) => Err(DispatchError::Timeout {
            job_id: id.to_string(),
            max_wait,
        }),
    }
}

async fn poll_loop(
    client: &RegistryClient,
    id: &str,
    poll_interval: Duration,
) -> Result<Job, DispatchError> {
    // interval() no acepta periodo cero
    let mut ticker = tokio::time::interval(poll_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let job = client.get_status(id).await?;
        match job.status {
            JobStatus::Completed => return Ok(job),
            JobStatus::Cancelled | JobStatus::Failed => {
                return Err(DispatchError::JobFailed(Box::new(job)))
            }
            JobStatus::InQueue | JobStatus::InProgress => {}
        }
    }
}

/* ---------------- progreso ---------------- */

#[derive(Debug)]
enum Progress {
    Started { index: usize },
    Finished { index: usize, wait_time: Option<f64> },
}

/// Estado compartido de una corrida: gauge de jobs en vuelo y canal de progreso.
struct Tracker {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    progress: mpsc::UnboundedSender<Progress>,
}

impl Tracker {
    fn enter(&self, index: usize) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _ = self.progress.send(Progress::Started { index });
    }

    fn leave(&self, index: usize, wait_time: Option<f64>) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let _ = self.progress.send(Progress::Finished { index, wait_time });
    }
}

/// Única dueña del contador de completados; loguea a medida que llegan eventos.
fn spawn_reporter(total: usize, mut rx: mpsc::UnboundedReceiver<Progress>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut completed = 0usize;
        while let Some(event) = rx.recv().await {
            match event {
                Progress::Started { index } => {
                    debug!("[job {:3}] iniciando (slot asignado)", index + 1);
                }
                Progress::Finished { index, wait_time } => {
                    completed += 1;
                    let pct = completed as f64 / total.max(1) as f64 * 100.0;
                    match wait_time {
                        Some(w) => info!(
                            "[job {:3}] completado (espera {:.2}s) | {}/{} ({:.1}%)",
                            index + 1,
                            w,
                            completed,
                            total,
                            pct
                        ),
                        None => warn!(
                            "[job {:3}] falló | {}/{} ({:.1}%)",
                            index + 1,
                            completed,
                            total,
                            pct
                        ),
                    }
                }
            }
        }
        completed
    })
}

/* ---------------- dispatcher ---------------- */

/// Envía jobs al servidor y los sigue hasta el final, con un límite de
/// jobs en vuelo.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: RegistryClient,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(client: RegistryClient, config: DispatchConfig) -> Self {
        Self { client, config }
    }

    /// Submit + poll de un job. El tiempo total se mide desde el submit
    /// hasta ver el estado terminal.
    pub async fn run_one(&self, input: JobInput, index: usize) -> JobOutcome {
        let submitted_at = Utc::now();
        let start = Instant::now();

        let job_id = self
            .client
            .submit_job(&input)
            .await
            .map_err(|e| JobError::new(index, None, e))?;
        debug!("[job {:3}] enviado como {}", index + 1, job_id);

        let job = poll_until_terminal(
            &self.client,
            &job_id,
            self.config.poll_interval,
            self.config.max_wait,
        )
        .await
        .map_err(|e| JobError::new(index, Some(job_id.clone()), e))?;

        let total_time = start.elapsed().as_secs_f64();
        let finished_at = Utc::now();

        let output = job.output.ok_or_else(|| {
            JobError::new(
                index,
                Some(job_id.clone()),
                DispatchError::UnexpectedResponse {
                    status: 200,
                    message: "COMPLETED job without output".to_string(),
                },
            )
        })?;

        Ok(JobResult {
            job_index: index,
            job_id,
            input,
            wait_time: output.wait_time,
            output,
            total_time,
            status: job.status,
            submitted_at,
            finished_at,
        })
    }

    /// Workers independientes: nunca más de `concurrency_limit` jobs en vuelo,
    /// y cada slot que se libera toma el siguiente job. Resultados en el
    /// orden de `inputs`.
    pub async fn run_many(&self, inputs: Vec<JobInput>, concurrency_limit: usize) -> Vec<JobOutcome> {
        self.run(
            inputs,
            DispatchMode::Independent {
                workers: concurrency_limit,
            },
        )
        .await
        .results
    }

    /// Lotes estrictos de `batch_size`: un lote termina entero antes de
    /// empezar el siguiente.
    pub async fn run_batched(&self, inputs: Vec<JobInput>, batch_size: usize) -> Vec<JobOutcome> {
        self.run(
            inputs,
            DispatchMode::Batched {
                workers: batch_size,
            },
        )
        .await
        .results
    }

    pub async fn run(&self, inputs: Vec<JobInput>, mode: DispatchMode) -> RunOutcome {
        let total = inputs.len();
        let limit = mode.concurrency_limit(total);

        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = spawn_reporter(total, rx);
        let tracker = Arc::new(Tracker {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            progress: tx,
        });

        info!("despachando {} jobs en modo {}", total, mode);
        let start = Instant::now();

        let indexed: Vec<(usize, JobInput)> = inputs.into_iter().enumerate().collect();
        let results = match mode {
            DispatchMode::Batched { .. } => self.dispatch_batches(indexed, limit, &tracker).await,
            _ => self.dispatch_pool(indexed, limit, &tracker).await,
        };

        let elapsed = start.elapsed();
        let peak_in_flight = tracker.peak.load(Ordering::SeqCst);

        // al soltar el último sender el reporter termina
        drop(tracker);
        if let Ok(reported) = reporter.await {
            debug!("reporter vio {} jobs terminados", reported);
        }

        RunOutcome {
            mode,
            results,
            elapsed,
            concurrency_limit: limit,
            peak_in_flight,
        }
    }

    async fn dispatch_batches(
        &self,
        jobs: Vec<(usize, JobInput)>,
        batch_size: usize,
        tracker: &Arc<Tracker>,
    ) -> Vec<JobOutcome> {
        let total_batches = jobs.len().div_ceil(batch_size);
        let mut results = Vec::with_capacity(jobs.len());

        for (n, batch) in jobs.chunks(batch_size).enumerate() {
            info!(
                "lote {}/{} ({} jobs)",
                n + 1,
                total_batches,
                batch.len()
            );
            let batch_results = self.dispatch_pool(batch.to_vec(), batch_size, tracker).await;
            results.extend(batch_results);
        }

        results
    }

    /// Lanza una tarea por job enseguida; cada una espera un permiso del
    /// semáforo *antes* del submit y lo suelta recién al llegar a un
    /// resultado terminal.
    async fn dispatch_pool(
        &self,
        jobs: Vec<(usize, JobInput)>,
        limit: usize,
        tracker: &Arc<Tracker>,
    ) -> Vec<JobOutcome> {
        let sem = Arc::new(Semaphore::new(limit.max(1)));

        let handles: Vec<(usize, JoinHandle<JobOutcome>)> = jobs
            .into_iter()
            .map(|(index, input)| {
                let sem = sem.clone();
                let tracker = tracker.clone();
                let dispatcher = self.clone();

                let handle = tokio::spawn(async move {
                    // el semáforo nunca se cierra; si fallara seguimos sin slot
                    let _permit = sem.acquire_owned().await.ok();

                    tracker.enter(index);
                    let outcome = dispatcher.run_one(input, index).await;
                    tracker.leave(index, outcome.as_ref().ok().map(|r| r.wait_time));

                    if let Err(e) = &outcome {
                        warn!("{}", e);
                    }
                    outcome
                });
                (index, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (index, handle) in handles {
            match handle.await {
                Ok(outcome) => results.push(outcome),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => results.push(Err(JobError::new(
                    index,
                    None,
                    DispatchError::Aborted(e.to_string()),
                ))),
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limite_por_modo() {
        assert_eq!(DispatchMode::Independent { workers: 4 }.concurrency_limit(100), 4);
        assert_eq!(DispatchMode::Batched { workers: 3 }.concurrency_limit(10), 3);
        assert_eq!(DispatchMode::Sequential.concurrency_limit(10), 1);
        assert_eq!(DispatchMode::Unbounded.concurrency_limit(7), 7);
    }

    #[test]
    fn limite_cero_se_trata_como_uno() {
        assert_eq!(DispatchMode::Independent { workers: 0 }.concurrency_limit(5), 1);
        assert_eq!(DispatchMode::Unbounded.concurrency_limit(0), 1);
    }

    #[test]
    fn modo_por_defecto_es_independiente() {
        assert!(matches!(
            DispatchMode::default(),
            DispatchMode::Independent { .. }
        ));
    }

    #[tokio::test]
    async fn tracker_registra_pico_de_jobs_en_vuelo() {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = spawn_reporter(3, rx);
        let tracker = Tracker {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            progress: tx,
        };

        tracker.enter(0);
        tracker.enter(1);
        tracker.leave(0, Some(1.0));
        tracker.enter(2);
        tracker.leave(1, None);
        tracker.leave(2, Some(0.5));

        assert_eq!(tracker.peak.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.in_flight.load(Ordering::SeqCst), 0);

        drop(tracker);
        assert_eq!(reporter.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn run_sin_jobs_devuelve_vacio() {
        let dispatcher = Dispatcher::new(
            RegistryClient::new("http://127.0.0.1:9", "ep"),
            DispatchConfig::default(),
        );
        let outcome = dispatcher.run(Vec::new(), DispatchMode::Batched { workers: 3 }).await;
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.peak_in_flight, 0);
    }
}
