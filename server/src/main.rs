use anyhow::Result;
use server::{build_router, AppState, ServerConfig};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("server=debug,tower_http=info")),
        )
        .init();

    let config = ServerConfig::from_env();
    let state = AppState::new(&config);

    // router HTTP
    let app = build_router(state.clone());

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(
        "servidor de jobs escuchando en {} (espera por defecto {:.1}-{:.1}s)",
        listener.local_addr()?,
        config.wait_range.min_secs,
        config.wait_range.max_secs
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // cortar las esperas que quedaron en curso
    state.registry.shutdown();
    info!("servidor detenido");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("no se pudo instalar el handler de ctrl-c: {:?}", e);
        std::future::pending::<()>().await;
    }
    info!("ctrl-c recibido, apagando");
}
