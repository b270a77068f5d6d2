//! LinkForty server entry point.
//!
//! Loads `.env`, builds the configuration snapshot, initializes logging and
//! runs the HTTP server until a shutdown signal arrives.

use color_eyre::Result;
use dotenv::dotenv;
use tracing::warn;

#[actix_web::main]
async fn main() -> Result<(), color_eyre::Report> {
    color_eyre::install()?;

    dotenv().ok();

    let config = linkforty::config::init_config();

    let logging = linkforty::system::logging::init_logging(&config.logging);
    // Keep the non-blocking writer alive for the process lifetime
    let _guard = logging.guard;
    if let Some(warning) = logging.warning {
        warn!("{}", warning);
    }

    linkforty::runtime::server::run_server(config)
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;

    Ok(())
}
