//! Stellar Gateway
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────────┐    ┌──────────────┐
//! │  Config  │───▶│  Stores  │───▶│   Services   │───▶│  Job Runner  │
//! │  (YAML)  │    │ (PG/mem) │    │ (tx/balance) │    │ (reconcile,  │
//! └──────────┘    └──────────┘    └──────────────┘    │  scan)       │
//!                                        ▲            └──────────────┘
//!                                        │
//!                                  Horizon client
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use stellar_gateway::balance::BalanceService;
use stellar_gateway::config::AppConfig;
use stellar_gateway::horizon::HorizonClient;
use stellar_gateway::jobs::{JobRunner, JobSchedule};
use stellar_gateway::store::{Stores, schema};
use stellar_gateway::transaction::{GatewaySettings, NoopCheckpoint, TransactionService};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env).context("Failed to load configuration")?;
    let _log_guard = stellar_gateway::logging::init_logging(&app_config);

    tracing::info!("Starting Stellar gateway in {} mode", env);

    let stores = match &app_config.postgres_url {
        Some(url) => {
            let pool = schema::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            schema::init_schema(&pool)
                .await
                .context("Failed to initialize schema")?;
            Stores::postgres(pool)
        }
        None => {
            tracing::warn!("No postgres_url configured, using in-memory stores");
            Stores::in_memory()
        }
    };

    let stellar = &app_config.stellar;
    let network = Arc::new(
        HorizonClient::new(
            &stellar.horizon_url,
            Duration::from_secs(stellar.http_timeout_secs),
        )
        .context("Failed to build Horizon client")?,
    );

    let settings = GatewaySettings::from_config(stellar);
    tracing::info!(
        deposit_base = %settings.deposit_base_address,
        asset = %settings.native_asset_id,
        "Gateway settings loaded"
    );

    let transactions = Arc::new(TransactionService::new(
        network.clone(),
        &stores,
        Arc::new(NoopCheckpoint),
        settings.clone(),
    ));
    let balances = Arc::new(BalanceService::new(
        network,
        &stores,
        settings,
        app_config.jobs.scan_page_size,
    ));

    let handles =
        JobRunner::new(transactions, balances, JobSchedule::from(&app_config.jobs)).spawn();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");
    for handle in handles {
        handle.abort();
    }
    Ok(())
}
