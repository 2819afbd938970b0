use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::error::StoreError;

const CREATE_BUILDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS stellar_tx_builds_tb (
    operation_id TEXT PRIMARY KEY,
    envelope_xdr TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_BROADCASTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS stellar_tx_broadcasts_tb (
    operation_id TEXT PRIMARY KEY,
    state SMALLINT NOT NULL,
    amount BIGINT NOT NULL,
    fee BIGINT NOT NULL,
    hash TEXT NOT NULL,
    ledger BIGINT,
    created_at TIMESTAMPTZ NOT NULL,
    error TEXT,
    error_code SMALLINT
)
"#;

const CREATE_OBSERVATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS stellar_observations_tb (
    kind TEXT NOT NULL,
    key TEXT NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (kind, key)
)
"#;

const CREATE_BALANCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS stellar_address_balances_tb (
    asset_id TEXT NOT NULL,
    address TEXT NOT NULL,
    balance BIGINT NOT NULL,
    minimum_reserve BIGINT NOT NULL DEFAULT 0,
    sequence_number BIGINT NOT NULL DEFAULT 0,
    ledger BIGINT NOT NULL,
    PRIMARY KEY (asset_id, address)
)
"#;

const CREATE_BALANCE_OPERATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS stellar_balance_operations_tb (
    asset_id TEXT NOT NULL,
    address TEXT NOT NULL,
    operation_hash BIGINT NOT NULL,
    ledger BIGINT NOT NULL,
    tx_hash TEXT NOT NULL,
    amount BIGINT NOT NULL,
    PRIMARY KEY (asset_id, address, operation_hash)
)
"#;

/// Open the connection pool
pub async fn connect(database_url: &str) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    tracing::info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Create the gateway tables if they do not exist
pub async fn init_schema(pool: &PgPool) -> Result<(), StoreError> {
    tracing::info!("Initializing gateway schema...");

    for ddl in [
        CREATE_BUILDS_TABLE,
        CREATE_BROADCASTS_TABLE,
        CREATE_OBSERVATIONS_TABLE,
        CREATE_BALANCES_TABLE,
        CREATE_BALANCE_OPERATIONS_TABLE,
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!("Gateway schema initialized");
    Ok(())
}
