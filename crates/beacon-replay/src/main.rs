//! beacon-replay - re-send a logged webhook delivery.
//!
//! # Usage
//!
//! ```text
//! beacon-replay <delivery-id>
//! ```
//!
//! # Configuration
//!
//! - `BEACON_CONFIG` - optional path to a `.toml`, `.json` or `.yaml` file
//! - otherwise the `BEACON_*` variables read by `DispatchConfig::from_env`
//!
//! Exits non-zero when the replayed delivery does not succeed.

use std::process::ExitCode;
use std::sync::Arc;

use beacon_core::{
    replay_delivery, BeaconResult, DeliveryEngine, DeliveryLog, DispatchConfig,
    SqliteWebhookStore,
};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn load_config() -> BeaconResult<DispatchConfig> {
    match std::env::var("BEACON_CONFIG") {
        Ok(path) => DispatchConfig::from_file(path),
        Err(_) => DispatchConfig::from_env(),
    }
}

async fn run(delivery_id: &str) -> BeaconResult<bool> {
    let config = load_config()?;
    let store = Arc::new(SqliteWebhookStore::new(&config.database_path)?);
    let engine = DeliveryEngine::from_config(&config)?;
    let log = DeliveryLog::new(store.clone(), config.max_response_body_chars);

    let result = replay_delivery(&store, &engine, &log, delivery_id).await?;
    info!(
        subscription_id = %result.subscription_id,
        status = ?result.status_code(),
        attempt = result.attempt,
        success = result.success(),
        "Replay finished"
    );
    Ok(result.success())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let Some(delivery_id) = std::env::args().nth(1) else {
        eprintln!("usage: beacon-replay <delivery-id>");
        return ExitCode::from(2);
    };

    match run(&delivery_id).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(code = e.code().as_str(), "Replay failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
