//! PostgreSQL stores

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::error::StoreError;
use super::models::*;
use super::{BalanceStore, BroadcastStore, BuildStore, ObservationStore};
use crate::core_types::{OperationHash, OperationId};

fn parse_operation_id(raw: &str) -> Result<OperationId, StoreError> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("operation_id {}: {}", raw, e)))
}

fn parse_kind(raw: &str) -> Result<ObservationKind, StoreError> {
    match raw {
        "broadcast" => Ok(ObservationKind::Broadcast),
        "balance_scan" => Ok(ObservationKind::BalanceScan),
        other => Err(StoreError::Corrupt(format!("observation kind {}", other))),
    }
}

pub struct PgBuildStore {
    pool: PgPool,
}

impl PgBuildStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BuildStore for PgBuildStore {
    async fn get(&self, operation_id: OperationId) -> Result<Option<TransactionBuild>, StoreError> {
        let row = sqlx::query(
            "SELECT envelope_xdr FROM stellar_tx_builds_tb WHERE operation_id = $1",
        )
        .bind(operation_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| TransactionBuild {
            operation_id,
            envelope_xdr: r.get("envelope_xdr"),
        }))
    }

    async fn add(&self, build: &TransactionBuild) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO stellar_tx_builds_tb (operation_id, envelope_xdr)
            VALUES ($1, $2)
            ON CONFLICT (operation_id) DO NOTHING
            "#,
        )
        .bind(build.operation_id.to_string())
        .bind(&build.envelope_xdr)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "build {} already exists",
                build.operation_id
            )));
        }
        Ok(())
    }

    async fn delete(&self, operation_id: OperationId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM stellar_tx_builds_tb WHERE operation_id = $1")
            .bind(operation_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct PgBroadcastStore {
    pool: PgPool,
}

impl PgBroadcastStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_broadcast(row: &PgRow) -> Result<TransactionBroadcast, StoreError> {
        let operation_id: String = row.get("operation_id");
        let state_id: i16 = row.get("state");
        let error_code: Option<i16> = row.get("error_code");
        let created_at: DateTime<Utc> = row.get("created_at");

        Ok(TransactionBroadcast {
            operation_id: parse_operation_id(&operation_id)?,
            state: BroadcastState::from_id(state_id)
                .ok_or_else(|| StoreError::Corrupt(format!("broadcast state {}", state_id)))?,
            amount: row.get("amount"),
            fee: row.get("fee"),
            hash: row.get("hash"),
            ledger: row.get("ledger"),
            created_at,
            error: row.get("error"),
            error_code: match error_code {
                Some(id) => Some(
                    TxExecutionError::from_id(id)
                        .ok_or_else(|| StoreError::Corrupt(format!("error code {}", id)))?,
                ),
                None => None,
            },
        })
    }
}

#[async_trait]
impl BroadcastStore for PgBroadcastStore {
    async fn get(
        &self,
        operation_id: OperationId,
    ) -> Result<Option<TransactionBroadcast>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT operation_id, state, amount, fee, hash, ledger, created_at, error, error_code
            FROM stellar_tx_broadcasts_tb
            WHERE operation_id = $1
            "#,
        )
        .bind(operation_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_broadcast).transpose()
    }

    async fn insert_or_replace(&self, b: &TransactionBroadcast) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stellar_tx_broadcasts_tb
                (operation_id, state, amount, fee, hash, ledger, created_at, error, error_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (operation_id) DO UPDATE SET
                state = EXCLUDED.state,
                amount = EXCLUDED.amount,
                fee = EXCLUDED.fee,
                hash = EXCLUDED.hash,
                ledger = EXCLUDED.ledger,
                created_at = EXCLUDED.created_at,
                error = EXCLUDED.error,
                error_code = EXCLUDED.error_code
            "#,
        )
        .bind(b.operation_id.to_string())
        .bind(b.state.id())
        .bind(b.amount)
        .bind(b.fee)
        .bind(&b.hash)
        .bind(b.ledger)
        .bind(b.created_at)
        .bind(&b.error)
        .bind(b.error_code.map(|c| c.id()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn merge(&self, b: &TransactionBroadcast) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE stellar_tx_broadcasts_tb
            SET state = $2, amount = $3, fee = $4, hash = $5, ledger = $6,
                created_at = $7, error = $8, error_code = $9
            WHERE operation_id = $1
            "#,
        )
        .bind(b.operation_id.to_string())
        .bind(b.state.id())
        .bind(b.amount)
        .bind(b.fee)
        .bind(&b.hash)
        .bind(b.ledger)
        .bind(b.created_at)
        .bind(&b.error)
        .bind(b.error_code.map(|c| c.id()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "broadcast {} does not exist",
                b.operation_id
            )));
        }
        Ok(())
    }

    async fn delete(&self, operation_id: OperationId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM stellar_tx_broadcasts_tb WHERE operation_id = $1")
            .bind(operation_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct PgObservationStore {
    pool: PgPool,
}

impl PgObservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ObservationStore for PgObservationStore {
    async fn add(&self, record: ObservationRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stellar_observations_tb (kind, key, payload)
            VALUES ($1, $2, $3)
            ON CONFLICT (kind, key) DO UPDATE SET payload = EXCLUDED.payload
            "#,
        )
        .bind(record.kind.as_str())
        .bind(&record.key)
        .bind(&record.payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(
        &self,
        kind: ObservationKind,
        key: &str,
    ) -> Result<Option<ObservationRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT payload FROM stellar_observations_tb WHERE kind = $1 AND key = $2",
        )
        .bind(kind.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ObservationRecord {
            kind,
            key: key.to_string(),
            payload: r.get("payload"),
        }))
    }

    async fn delete_if_exists(&self, kind: ObservationKind, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM stellar_observations_tb WHERE kind = $1 AND key = $2")
            .bind(kind.as_str())
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn page(
        &self,
        kind: ObservationKind,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<ObservationPage, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT kind, key, payload FROM stellar_observations_tb
            WHERE kind = $1 AND ($2::TEXT IS NULL OR key > $2)
            ORDER BY key
            LIMIT $3
            "#,
        )
        .bind(kind.as_str())
        .bind(cursor)
        .bind(page_size as i64)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .iter()
            .map(|r| {
                let kind: String = r.get("kind");
                Ok(ObservationRecord {
                    kind: parse_kind(&kind)?,
                    key: r.get("key"),
                    payload: r.get("payload"),
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let next_cursor = if page_size > 0 && items.len() == page_size {
            items.last().map(|r| r.key.clone())
        } else {
            None
        };
        Ok(ObservationPage { items, next_cursor })
    }
}

pub struct PgBalanceStore {
    pool: PgPool,
}

impl PgBalanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceStore for PgBalanceStore {
    async fn get(
        &self,
        asset_id: &str,
        address: &str,
    ) -> Result<Option<AddressBalance>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT asset_id, address, balance, minimum_reserve, sequence_number, ledger
            FROM stellar_address_balances_tb
            WHERE asset_id = $1 AND address = $2
            "#,
        )
        .bind(asset_id)
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AddressBalance {
            asset_id: r.get("asset_id"),
            address: r.get("address"),
            balance: r.get("balance"),
            minimum_reserve: r.get("minimum_reserve"),
            sequence_number: r.get("sequence_number"),
            ledger: r.get("ledger"),
        }))
    }

    async fn has_operation(
        &self,
        asset_id: &str,
        address: &str,
        operation_hash: OperationHash,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT 1 AS found FROM stellar_balance_operations_tb
            WHERE asset_id = $1 AND address = $2 AND operation_hash = $3
            "#,
        )
        .bind(asset_id)
        .bind(address)
        .bind(operation_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn record_operation(&self, op: &BalanceOperation) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO stellar_balance_operations_tb
                (asset_id, address, operation_hash, ledger, tx_hash, amount)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (asset_id, address, operation_hash) DO NOTHING
            "#,
        )
        .bind(&op.asset_id)
        .bind(&op.address)
        .bind(op.operation_hash)
        .bind(op.ledger)
        .bind(&op.tx_hash)
        .bind(op.amount)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn refresh_balances(&self, keys: &[BalanceKey]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for key in keys {
            sqlx::query(
                r#"
                INSERT INTO stellar_address_balances_tb (asset_id, address, balance, ledger)
                SELECT $1, $2, COALESCE(SUM(amount), 0)::BIGINT, COALESCE(MAX(ledger), 0)
                FROM stellar_balance_operations_tb
                WHERE asset_id = $1 AND address = $2
                ON CONFLICT (asset_id, address) DO UPDATE SET
                    balance = EXCLUDED.balance,
                    ledger = EXCLUDED.ledger
                "#,
            )
            .bind(&key.asset_id)
            .bind(&key.address)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
