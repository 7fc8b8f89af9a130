//! GatePass Server — Application entry point.

use gatepass_db::{DbConfig, DbManager};
use tracing_subscriber::EnvFilter;

/// Build the database configuration from environment variables,
/// falling back to defaults for anything unset.
fn db_config_from_env() -> DbConfig {
    let defaults = DbConfig::default();
    DbConfig {
        url: std::env::var("GATEPASS_DB_URL").unwrap_or(defaults.url),
        namespace: std::env::var("GATEPASS_DB_NAMESPACE").unwrap_or(defaults.namespace),
        database: std::env::var("GATEPASS_DB_NAME").unwrap_or(defaults.database),
        username: std::env::var("GATEPASS_DB_USER").unwrap_or(defaults.username),
        password: std::env::var("GATEPASS_DB_PASSWORD").unwrap_or(defaults.password),
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("gatepass=info".parse().unwrap()),
        )
        .json()
        .init();

    tracing::info!("Starting GatePass server...");

    let config = db_config_from_env();
    let manager = match DbManager::connect(&config).await {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to SurrealDB");
            std::process::exit(1);
        }
    };

    if let Err(e) = gatepass_db::run_migrations(manager.client()).await {
        tracing::error!(error = %e, "Failed to run migrations");
        std::process::exit(1);
    }

    tracing::info!("Storage ready; repositories and workflow services can be constructed");

    // TODO: Start REST API server (transport layer)
    // TODO: Wire identity/session provider for actor resolution

    tracing::info!("GatePass server stopped.");
}
