use std::sync::Arc;

use anyhow::Result;
use master::{handlers, Cluster, ClusterConfig};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("master=debug,worker=debug,tower_http=info")),
        )
        .init();

    let config = ClusterConfig::from_env();
    let faults = Arc::new(config.random_faults());
    let cluster = Cluster::start(&config, faults);

    // router HTTP
    let app = handlers::build_router(cluster.clone());

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("master escuchando en {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // drenar lo pendiente antes de salir
    let summary = cluster.shutdown().await;
    println!("{}", summary);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("no se pudo escuchar ctrl-c: {:?}", e);
    }
    info!("señal de apagado recibida");
}
