use clearance::config::Config;
use clearance::handlers::{open_store, serve, AppState};
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("clearance=info")),
        )
        .init();

    info!("Starting clearance service");

    let config = Config::from_env()?;

    // One store for the whole process, shared by every workflow
    let store = open_store(&config.store)?;
    match store.count().await {
        Ok(count) => info!("Store ready with {} submissions", count),
        Err(e) => tracing::warn!("Store not reachable at startup: {}", e),
    }

    let state = Arc::new(AppState::new(&config, store));

    let listener = std::net::TcpListener::bind(config.listen_addr)?;
    info!("Listening on {}", listener.local_addr()?);
    info!("Verification links use {}/verify", config.public_base_url);

    serve(listener, state, shutdown_signal()).await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
