//! Server mode
//!
//! Configures and starts the HTTP server with all public routes, then waits
//! for the server to finish or a shutdown signal.
//!
//! **Note**: logging must be initialized before calling `run_server`.

use actix_web::middleware::Compress;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use tracing::{debug, warn};

use crate::api::configure_routes;
use crate::config::AppConfig;
use crate::runtime::{shutdown, startup};

pub async fn run_server(config: &AppConfig) -> Result<()> {
    let started_at = chrono::Utc::now();
    debug!("Starting pre-startup processing...");

    let state = startup::prepare_server_startup(config)
        .await
        .map_err(|e| anyhow::anyhow!("startup failed: {}", e))?;
    let state = web::Data::new(state);

    debug!(
        "Pre-startup processing completed in {} ms",
        chrono::Utc::now()
            .signed_duration_since(started_at)
            .num_milliseconds()
    );

    let cpu_count = config.server.cpu_count.min(32);
    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    warn!("Starting server at http://{} ({} workers)", bind_address, cpu_count);

    let server = HttpServer::new({
        let state = state.clone();
        move || {
            App::new()
                .wrap(Compress::default())
                .app_data(state.clone())
                .app_data(web::PayloadConfig::new(64 * 1024))
                .configure(configure_routes)
        }
    })
    .keep_alive(std::time::Duration::from_secs(30))
    .client_request_timeout(std::time::Duration::from_millis(5000))
    .client_disconnect_timeout(std::time::Duration::from_millis(1000))
    .workers(cpu_count)
    .bind(&bind_address)?
    .run();

    tokio::select! {
        res = server => {
            res?;
        }
        _ = shutdown::listen_for_shutdown() => {
            warn!("Graceful shutdown: all tasks completed");
        }
    }

    Ok(())
}
