use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use sqlsense::config::{AppConfig, CliArgs};
use sqlsense::db;
use sqlsense::llm::{self, generator::Generator};
use sqlsense::util::logging::init_tracing;
use sqlsense::web::{self, state::AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if config.uses_default_secret() {
        warn!("SESSION_SECRET is not set, using the built-in development secret");
    }

    info!("Initializing DuckDB connection pool");
    let pool = db::init_pool(
        &config.database.connection_string,
        config.database.pool_size as u32,
    )?;

    info!(
        "Initializing LLM client with backend: {} ({})",
        config.llm.backend, config.llm.model
    );
    let client = llm::build_client(&config.llm)?;
    let generator = Generator::new(client);

    let app_state = Arc::new(AppState::new(config.clone(), pool, generator));

    // Start the web server
    info!("Starting SQLSense server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e);
        }
    }

    Ok(())
}
