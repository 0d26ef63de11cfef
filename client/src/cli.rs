use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client::api::{registry_base_url, registry_endpoint_id};
use client::dispatch::{DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL};
use client::{
    poll_until_terminal, report, workload, DispatchConfig, DispatchMode, Dispatcher,
    RegistryClient, RunMetrics,
};
use common::{Job, JobInput};
use serde_json::json;
use std::{path::PathBuf, time::Duration};
use tracing::info;

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI para hablar con el servidor de jobs y hacer pruebas de carga")]
struct Cli {
    /// URL base del servidor (default: REGISTRY_URL o http://localhost:5000)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Segmento {endpoint} de las rutas /v2 (default: ENDPOINT_ID o test-endpoint)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// cada worker toma el siguiente job apenas termina
    Independent,
    /// lotes de N, cada lote espera al anterior
    Batched,
    Sequential,
    Unbounded,
}

#[derive(Subcommand)]
enum Commands {
    /// Envía un job
    Submit {
        /// Segundos de trabajo simulado (si no, el servidor sortea)
        #[arg(long)]
        wait: Option<f64>,
        /// Espera hasta que el job termine
        #[arg(long)]
        follow: bool,
    },
    /// Consulta el estado de un job
    Status {
        #[arg(value_name = "JOB_ID")]
        id: String,
    },
    /// Cancela un job
    Cancel {
        #[arg(value_name = "JOB_ID")]
        id: String,
    },
    Health,
    /// Lista todos los jobs del servidor
    Jobs,
    /// Borra todos los jobs del servidor
    Reset,
    /// Prueba de carga: N jobs con W workers
    Run {
        #[arg(long, default_value_t = 100)]
        jobs: usize,
        #[arg(long, default_value_t = 10)]
        workers: usize,
        #[arg(long, value_enum, default_value = "independent")]
        mode: ModeArg,
        /// Mínimo del wait_time sorteado para cada job, en segundos
        #[arg(long, default_value_t = 1.0)]
        min_job_wait: f64,
        /// Máximo del wait_time sorteado para cada job, en segundos
        #[arg(long, default_value_t = 3.0)]
        max_job_wait: f64,
        /// Todos los jobs con este wait_time (ignora min/max)
        #[arg(long)]
        uniform_wait: Option<f64>,
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_secs_f64())]
        poll_interval: f64,
        /// Tope de espera por job, en segundos
        #[arg(long, default_value_t = DEFAULT_MAX_WAIT.as_secs_f64())]
        max_wait_secs: f64,
        /// Directorio donde guardar resultados y summary.json
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Corre la misma carga en paralelo y de a uno, y compara tiempos
    Compare {
        #[arg(long, default_value_t = 10)]
        jobs: usize,
        #[arg(long, default_value_t = 5)]
        workers: usize,
        #[arg(long, default_value_t = 1.0)]
        min_job_wait: f64,
        #[arg(long, default_value_t = 3.0)]
        max_job_wait: f64,
    },
}

fn secs(value: f64, name: &str) -> Result<Duration> {
    match Duration::try_from_secs_f64(value) {
        Ok(d) => Ok(d),
        Err(_) => bail!("{name} inválido: {value}"),
    }
}

/// Extremos del wait_time sorteado; tienen que ser segundos válidos.
fn job_wait_range(min: f64, max: f64) -> Result<(f64, f64)> {
    secs(min, "min_job_wait")?;
    secs(max, "max_job_wait")?;
    Ok((min, max))
}

fn print_job(job: &Job) {
    println!("Job:");
    println!("  id: {}", job.id);
    println!("  estado: {}", job.status);
    println!("  creado: {}", job.created_at);
    if let Some(ref started) = job.started_at {
        println!("  iniciado: {}", started);
    }
    if let Some(ref done) = job.completed_at {
        println!("  finalizado: {}", done);
    }
    if let Some(ms) = job.execution_time_ms {
        println!("  execution_time_ms: {}", ms);
    }
    if let Some(ref output) = job.output {
        println!("  wait_time: {:.2}s", output.wait_time);
        println!("{}", output.result_text);
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let base_url = cli.url.unwrap_or_else(registry_base_url);
    let endpoint = cli.endpoint.unwrap_or_else(registry_endpoint_id);
    let api = RegistryClient::new(base_url, endpoint);

    match cli.command {
        Commands::Submit { wait, follow } => {
            let mut input = JobInput::new();
            if let Some(w) = wait {
                input.insert("wait_time".to_string(), json!(w));
            }

            let id = api.submit_job(&input).await?;
            println!("Job enviado:");
            println!("  id: {}", id);

            if follow {
                let cfg = DispatchConfig::default();
                let job = poll_until_terminal(&api, &id, cfg.poll_interval, cfg.max_wait).await?;
                print_job(&job);
            }
        }

        Commands::Status { id } => {
            let job = api.get_status(&id).await?;
            print_job(&job);
        }

        Commands::Cancel { id } => {
            let resp = api.cancel(&id).await?;
            println!("Job {} -> {}", resp.id, resp.status);
        }

        Commands::Health => {
            let h = api.health().await?;
            println!("status       : {}", h.status);
            println!("active_jobs  : {}", h.active_jobs);
            println!("total_jobs   : {}", h.total_jobs);
        }

        Commands::Jobs => {
            let list = api.list_jobs().await?;
            if list.jobs.is_empty() {
                println!("No hay jobs.");
            }
            println!("{} jobs", list.total);
            for job in list.jobs {
                let wait = job
                    .output
                    .as_ref()
                    .map(|o| format!("{:.2}s", o.wait_time))
                    .unwrap_or_else(|| "-".to_string());
                println!("  {}  {:<11}  {}", job.id, job.status.to_string(), wait);
            }
        }

        Commands::Reset => {
            let resp = api.reset().await?;
            println!("{}", resp.message);
        }

        Commands::Run {
            jobs,
            workers,
            mode,
            min_job_wait,
            max_job_wait,
            uniform_wait,
            poll_interval,
            max_wait_secs,
            output_dir,
        } => {
            let config = DispatchConfig {
                poll_interval: secs(poll_interval, "poll_interval")?,
                max_wait: secs(max_wait_secs, "max_wait_secs")?,
            };
            let mode = match mode {
                ModeArg::Independent => DispatchMode::Independent { workers },
                ModeArg::Batched => DispatchMode::Batched { workers },
                ModeArg::Sequential => DispatchMode::Sequential,
                ModeArg::Unbounded => DispatchMode::Unbounded,
            };

            let inputs = match uniform_wait {
                Some(w) => {
                    secs(w, "uniform_wait")?;
                    workload::uniform_inputs(jobs, w)
                }
                None => {
                    let (min, max) = job_wait_range(min_job_wait, max_job_wait)?;
                    workload::generate_inputs(jobs, min, max)
                }
            };

            let dispatcher = Dispatcher::new(api, config);
            let outcome = dispatcher.run(inputs.clone(), mode).await;
            let metrics = RunMetrics::aggregate(&inputs, &outcome);
            metrics.log_summary();

            if let Some(dir) = output_dir {
                report::save_results(&dir, &outcome, &metrics)?;
            }

            if metrics.failed > 0 {
                bail!("{} de {} jobs fallaron", metrics.failed, metrics.total_jobs);
            }
        }

        Commands::Compare {
            jobs,
            workers,
            min_job_wait,
            max_job_wait,
        } => {
            let (min, max) = job_wait_range(min_job_wait, max_job_wait)?;
            let inputs = workload::generate_inputs(jobs, min, max);
            let dispatcher = Dispatcher::new(api, DispatchConfig::default());

            info!("---- paralelo ({} workers) ----", workers);
            let parallel = dispatcher
                .run(inputs.clone(), DispatchMode::Independent { workers })
                .await;
            info!("---- secuencial ----");
            let sequential = dispatcher.run(inputs.clone(), DispatchMode::Sequential).await;

            let par = RunMetrics::aggregate(&inputs, &parallel);
            let seq = RunMetrics::aggregate(&inputs, &sequential);

            let speedup = if par.elapsed_secs > 0.0 {
                seq.elapsed_secs / par.elapsed_secs
            } else {
                0.0
            };
            let saved = seq.elapsed_secs - par.elapsed_secs;
            let saved_pct = if seq.elapsed_secs > 0.0 {
                saved / seq.elapsed_secs * 100.0
            } else {
                0.0
            };

            println!("secuencial      : {:>8.2}s", seq.elapsed_secs);
            println!("paralelo        : {:>8.2}s", par.elapsed_secs);
            println!("speedup         : {:>8.2}x", speedup);
            println!("ahorrado        : {:>8.2}s ({:.1}%)", saved, saved_pct);
            println!(
                "eficiencia      : {:>8.1}%",
                speedup / workers.max(1) as f64 * 100.0
            );
            println!(
                "éxito paralelo  : {}/{} ({:.0}%)",
                par.successful,
                par.total_jobs,
                par.success_rate_pct()
            );
            println!(
                "éxito secuencial: {}/{} ({:.0}%)",
                seq.successful,
                seq.total_jobs,
                seq.success_rate_pct()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rango_de_espera_valido() {
        assert_eq!(job_wait_range(1.0, 3.0).unwrap(), (1.0, 3.0));
        assert_eq!(job_wait_range(3.0, 0.0).unwrap(), (3.0, 0.0));
    }

    #[test]
    fn rango_de_espera_no_finito_o_negativo_se_rechaza() {
        for (min, max) in [
            (1.0, f64::INFINITY),
            (f64::NAN, 3.0),
            (-1.0, 3.0),
            (1.0, 1e300),
        ] {
            assert!(job_wait_range(min, max).is_err(), "{min}..{max}");
        }
    }

    #[test]
    fn run_distingue_espera_del_job_y_timeout() {
        let cli = Cli::try_parse_from([
            "client",
            "run",
            "--min-job-wait",
            "0.5",
            "--max-job-wait",
            "2",
            "--max-wait-secs",
            "30",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                min_job_wait,
                max_job_wait,
                max_wait_secs,
                ..
            } => {
                assert_eq!(min_job_wait, 0.5);
                assert_eq!(max_job_wait, 2.0);
                assert_eq!(max_wait_secs, 30.0);
            }
            _ => panic!("se esperaba el subcomando run"),
        }

        assert!(Cli::try_parse_from(["client", "run", "--max-wait", "2"]).is_err());
    }
}
