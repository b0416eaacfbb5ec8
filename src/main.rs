//! isobar - point-and-time queries over gridded NetCDF data
//!
//! Entry point: configuration, tracing, state, background load, router.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tracing::{error, info, warn};

use isobar::handlers::router;
use isobar::logging::{init_tracing, log_operation_end, log_operation_start};
use isobar::{AppState, Config, IsobarError, Result};

fn main() -> Result<()> {
    let (config, data_path) = Config::load()?;
    config.validate()?;

    init_tracing(&config.log_level);
    info!("Starting isobar v{}", env!("CARGO_PKG_VERSION"));

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = config.server.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(serve(config, &data_path))
}

async fn serve(config: Config, data_path: &Path) -> Result<()> {
    if !data_path.exists() {
        error!(path = %data_path.display(), "Data file not found");
        return Err(IsobarError::DatasetNotFound {
            path: data_path.display().to_string(),
        });
    }

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .map_err(|e| IsobarError::Config {
                message: format!("Invalid host address: {}", e),
            })?,
        config.server.port,
    ));

    let state = AppState::new_shared(config, data_path);
    spawn_initial_load(Arc::clone(&state));
    #[cfg(unix)]
    spawn_reload_on_hangup(Arc::clone(&state));

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| IsobarError::Server {
            message: format!("Failed to bind to {}: {}", addr, e),
        })?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| IsobarError::Server {
            message: format!("Server error: {}", e),
        })?;

    info!("Server has been gracefully shut down");
    Ok(())
}

/// Open the dataset off the request path. Queries arriving first load it on demand.
fn spawn_initial_load(state: Arc<AppState>) {
    tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        log_operation_start("initial_load", Some(&state.data_path().display().to_string()));
        let result = state.load();
        if let Err(e) = &result {
            error!(error = %e, "Initial dataset load failed");
        }
        log_operation_end("initial_load", start, result.is_ok());
    });
}

/// Rebuild the engine whenever the process receives SIGHUP.
#[cfg(unix)]
fn spawn_reload_on_hangup(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "SIGHUP handler unavailable, reload disabled");
                return;
            }
        };

        while hangup.recv().await.is_some() {
            let state = Arc::clone(&state);
            let outcome = tokio::task::spawn_blocking(move || state.reload()).await;
            match outcome {
                Ok(Ok(())) => info!("Dataset reloaded"),
                Ok(Err(e)) => error!(error = %e, "Dataset reload failed, keeping current data"),
                Err(e) => error!(error = %e, "Reload task failed"),
            }
        }
    });
}

/// Wait for a shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
