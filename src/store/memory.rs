//! In-memory stores, used when no database is configured and by tests

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::error::StoreError;
use super::models::*;
use super::{BalanceStore, BroadcastStore, BuildStore, ObservationStore};
use crate::core_types::{OperationHash, OperationId};

#[derive(Default)]
pub struct MemoryBuildStore {
    builds: Mutex<HashMap<OperationId, TransactionBuild>>,
}

impl MemoryBuildStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BuildStore for MemoryBuildStore {
    async fn get(&self, operation_id: OperationId) -> Result<Option<TransactionBuild>, StoreError> {
        Ok(self.builds.lock().await.get(&operation_id).cloned())
    }

    async fn add(&self, build: &TransactionBuild) -> Result<(), StoreError> {
        let mut builds = self.builds.lock().await;
        if builds.contains_key(&build.operation_id) {
            return Err(StoreError::Conflict(format!(
                "build {} already exists",
                build.operation_id
            )));
        }
        builds.insert(build.operation_id, build.clone());
        Ok(())
    }

    async fn delete(&self, operation_id: OperationId) -> Result<(), StoreError> {
        self.builds.lock().await.remove(&operation_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBroadcastStore {
    broadcasts: Mutex<HashMap<OperationId, TransactionBroadcast>>,
}

impl MemoryBroadcastStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BroadcastStore for MemoryBroadcastStore {
    async fn get(
        &self,
        operation_id: OperationId,
    ) -> Result<Option<TransactionBroadcast>, StoreError> {
        Ok(self.broadcasts.lock().await.get(&operation_id).cloned())
    }

    async fn insert_or_replace(&self, broadcast: &TransactionBroadcast) -> Result<(), StoreError> {
        self.broadcasts
            .lock()
            .await
            .insert(broadcast.operation_id, broadcast.clone());
        Ok(())
    }

    async fn merge(&self, broadcast: &TransactionBroadcast) -> Result<(), StoreError> {
        match self.broadcasts.lock().await.get_mut(&broadcast.operation_id) {
            Some(existing) => {
                *existing = broadcast.clone();
                Ok(())
            }
            None => Err(StoreError::Conflict(format!(
                "broadcast {} does not exist",
                broadcast.operation_id
            ))),
        }
    }

    async fn delete(&self, operation_id: OperationId) -> Result<(), StoreError> {
        self.broadcasts.lock().await.remove(&operation_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryObservationStore {
    records: Mutex<BTreeMap<(ObservationKind, String), String>>,
}

impl MemoryObservationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObservationStore for MemoryObservationStore {
    async fn add(&self, record: ObservationRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .insert((record.kind, record.key), record.payload);
        Ok(())
    }

    async fn get(
        &self,
        kind: ObservationKind,
        key: &str,
    ) -> Result<Option<ObservationRecord>, StoreError> {
        let records = self.records.lock().await;
        Ok(records
            .get(&(kind, key.to_string()))
            .map(|payload| ObservationRecord {
                kind,
                key: key.to_string(),
                payload: payload.clone(),
            }))
    }

    async fn delete_if_exists(&self, kind: ObservationKind, key: &str) -> Result<(), StoreError> {
        self.records.lock().await.remove(&(kind, key.to_string()));
        Ok(())
    }

    async fn page(
        &self,
        kind: ObservationKind,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<ObservationPage, StoreError> {
        let records = self.records.lock().await;
        let items: Vec<ObservationRecord> = records
            .iter()
            .filter(|((k, key), _)| *k == kind && cursor.is_none_or(|c| key.as_str() > c))
            .take(page_size)
            .map(|((k, key), payload)| ObservationRecord {
                kind: *k,
                key: key.clone(),
                payload: payload.clone(),
            })
            .collect();
        let next_cursor = if page_size > 0 && items.len() == page_size {
            items.last().map(|r| r.key.clone())
        } else {
            None
        };
        Ok(ObservationPage { items, next_cursor })
    }
}

#[derive(Default)]
struct BalanceLedger {
    balances: HashMap<BalanceKey, AddressBalance>,
    operations: BTreeMap<(BalanceKey, OperationHash), BalanceOperation>,
}

#[derive(Default)]
pub struct MemoryBalanceStore {
    ledger: Mutex<BalanceLedger>,
}

impl MemoryBalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded operations for `(asset_id, address)`, in ordinal order
    pub async fn operations(&self, asset_id: &str, address: &str) -> Vec<BalanceOperation> {
        let key = BalanceKey::new(asset_id, address);
        let ledger = self.ledger.lock().await;
        let mut ops: Vec<BalanceOperation> = ledger
            .operations
            .iter()
            .filter(|((k, _), _)| *k == key)
            .map(|(_, op)| op.clone())
            .collect();
        ops.sort_by_key(|op| op.ledger);
        ops
    }
}

#[async_trait]
impl BalanceStore for MemoryBalanceStore {
    async fn get(
        &self,
        asset_id: &str,
        address: &str,
    ) -> Result<Option<AddressBalance>, StoreError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .balances
            .get(&BalanceKey::new(asset_id, address))
            .cloned())
    }

    async fn has_operation(
        &self,
        asset_id: &str,
        address: &str,
        operation_hash: OperationHash,
    ) -> Result<bool, StoreError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .operations
            .contains_key(&(BalanceKey::new(asset_id, address), operation_hash)))
    }

    async fn record_operation(&self, operation: &BalanceOperation) -> Result<bool, StoreError> {
        let mut ledger = self.ledger.lock().await;
        let id = (operation.key(), operation.operation_hash);
        if ledger.operations.contains_key(&id) {
            return Ok(false);
        }
        ledger.operations.insert(id, operation.clone());
        Ok(true)
    }

    async fn refresh_balances(&self, keys: &[BalanceKey]) -> Result<(), StoreError> {
        let mut ledger = self.ledger.lock().await;
        for key in keys {
            let (sum, last) = ledger
                .operations
                .iter()
                .filter(|((k, _), _)| k == key)
                .fold((0i64, 0i64), |(sum, last), (_, op)| {
                    (sum + op.amount, last.max(op.ledger))
                });
            let row = ledger
                .balances
                .entry(key.clone())
                .or_insert_with(|| AddressBalance::empty(&key.asset_id, &key.address));
            row.balance = sum;
            row.ledger = last;
        }
        Ok(())
    }
}
