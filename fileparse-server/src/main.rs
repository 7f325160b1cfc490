use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use log::info;

use fileparse::JobEngine;
use fileparse_server::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = fileparse::resolve_config(cli_path).context("Failed to load configuration")?;

    fileparse::logging::init(&config.logging).context("Failed to initialize logging")?;
    info!("Starting fileparse-server v{}", env!("CARGO_PKG_VERSION"));

    let engine = fileparse::build_engine(&config).context("Failed to start job engine")?;
    info!(
        "Uploads are stored in {}",
        engine.storage().root().display()
    );

    let app = router(AppState::new(
        Arc::clone(&engine),
        config.server.max_upload_bytes,
    ));

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Waiting for in-flight jobs to finish");
    tokio::task::spawn_blocking(move || stop_engine(&engine))
        .await
        .context("Engine shutdown task failed")?;
    info!("Shutdown complete");

    Ok(())
}

fn stop_engine(engine: &JobEngine) {
    engine.shutdown();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutdown signal received");
}
