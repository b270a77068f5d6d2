//! Graceful shutdown signal handling.
//!
//! Resolves when the process receives ctrl-c (all platforms) or SIGTERM
//! (unix). Background click/webhook tasks end with the process; client
//! disconnects never cancel them.

use tracing::warn;

pub async fn listen_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Received ctrl-c, shutting down");
            }
            _ = sigterm.recv() => {
                warn!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        warn!("Received ctrl-c, shutting down");
    }
}
