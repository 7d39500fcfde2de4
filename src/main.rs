//! SPORTSBOOK: sports-betting backend
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the configured store and serves the REST API until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use sportsbook::api::{self, identity::HeaderIdentity, routes::ApiState};
use sportsbook::config;
use sportsbook::engine::Services;
use sportsbook::storage::Stores;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("SPORTSBOOK_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    info!(
        config = %config_path,
        host = %cfg.server.host,
        port = cfg.server.port,
        store_timeout_ms = cfg.betting.store_timeout_ms,
        "Sportsbook starting up"
    );

    // -- Wire stores and services ----------------------------------------
    let stores = Stores::connect(&cfg.database_url(), cfg.database.max_connections).await?;
    let state = Arc::new(ApiState {
        services: Services::new(stores, &cfg.betting),
        identity: Arc::new(HeaderIdentity::new(&cfg.auth.user_header)?),
    });

    api::serve(state, &cfg.server).await?;

    info!("Sportsbook shut down cleanly");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sportsbook=info,tower_http=info"));

    let json_logging = std::env::var("SPORTSBOOK_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
