//! Beacon API Server Binary
//!
//! Entry point for the Beacon telemetry ingestion server.

#![deny(unsafe_code)]

use anyhow::Result;
use api::{init_logging, run_server_with_config, Config};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_logging(config.log_format);

    run_server_with_config(config).await
}
