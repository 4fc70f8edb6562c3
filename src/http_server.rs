use std::net::SocketAddr;

use axum::{Router, routing::get};
use tokio::{net::TcpListener, signal};

/// Serves the liveness and readiness probes until SIGINT or SIGTERM.
///
/// # Errors
///
/// Will return `Err` if `addr` could not be bound.
pub async fn run(addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr =% addr, "server started");

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");

    Ok(())
}

fn router() -> Router {
    Router::new()
        .route("/livez", get(handler))
        .route("/readyz", get(handler))
}

#[allow(clippy::unused_async)]
async fn handler() {}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(error =% error, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(error) => {
                tracing::error!(error =% error, "failed to listen for terminate");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}
