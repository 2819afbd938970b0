//! Persistence contracts and their implementations
//!
//! Four stores back the gateway: builds, broadcasts, observations and the
//! derived balance ledger. Each is an `async_trait` with an in-memory and a
//! PostgreSQL implementation.

pub mod error;
pub mod memory;
pub mod models;
pub mod observation;
pub mod postgres;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::core_types::{OperationHash, OperationId};

pub use error::StoreError;
pub use models::{
    AddressBalance, BalanceKey, BalanceOperation, BroadcastState, ObservationKind,
    ObservationPage, ObservationRecord, TransactionBroadcast, TransactionBuild, TxExecutionError,
};
pub use observation::{BalanceScanCursor, BroadcastObservation, ObservationPayload, ObservationQueue};

#[async_trait]
pub trait BuildStore: Send + Sync {
    async fn get(&self, operation_id: OperationId) -> Result<Option<TransactionBuild>, StoreError>;

    /// Fails with [`StoreError::Conflict`] if a build already exists
    async fn add(&self, build: &TransactionBuild) -> Result<(), StoreError>;

    async fn delete(&self, operation_id: OperationId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BroadcastStore: Send + Sync {
    async fn get(
        &self,
        operation_id: OperationId,
    ) -> Result<Option<TransactionBroadcast>, StoreError>;

    async fn insert_or_replace(&self, broadcast: &TransactionBroadcast) -> Result<(), StoreError>;

    /// Update an existing record in place; [`StoreError::Conflict`] if absent
    async fn merge(&self, broadcast: &TransactionBroadcast) -> Result<(), StoreError>;

    async fn delete(&self, operation_id: OperationId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Insert or replace
    async fn add(&self, record: ObservationRecord) -> Result<(), StoreError>;

    async fn get(
        &self,
        kind: ObservationKind,
        key: &str,
    ) -> Result<Option<ObservationRecord>, StoreError>;

    async fn delete_if_exists(&self, kind: ObservationKind, key: &str) -> Result<(), StoreError>;

    /// Records with key greater than `cursor`, in key order
    async fn page(
        &self,
        kind: ObservationKind,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<ObservationPage, StoreError>;
}

#[async_trait]
pub trait BalanceStore: Send + Sync {
    async fn get(&self, asset_id: &str, address: &str)
    -> Result<Option<AddressBalance>, StoreError>;

    async fn has_operation(
        &self,
        asset_id: &str,
        address: &str,
        operation_hash: OperationHash,
    ) -> Result<bool, StoreError>;

    /// Write-once insert keyed by `(asset_id, address, operation_hash)`.
    /// Returns `false` when the operation was already recorded.
    async fn record_operation(&self, operation: &BalanceOperation) -> Result<bool, StoreError>;

    /// Recompute each balance as the sum of its recorded operations
    async fn refresh_balances(&self, keys: &[BalanceKey]) -> Result<(), StoreError>;

    async fn refresh_balance(&self, key: &BalanceKey) -> Result<(), StoreError> {
        self.refresh_balances(std::slice::from_ref(key)).await
    }
}

/// Store handles shared by the services
#[derive(Clone)]
pub struct Stores {
    pub builds: Arc<dyn BuildStore>,
    pub broadcasts: Arc<dyn BroadcastStore>,
    pub observations: Arc<dyn ObservationStore>,
    pub balances: Arc<dyn BalanceStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            builds: Arc::new(memory::MemoryBuildStore::new()),
            broadcasts: Arc::new(memory::MemoryBroadcastStore::new()),
            observations: Arc::new(memory::MemoryObservationStore::new()),
            balances: Arc::new(memory::MemoryBalanceStore::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            builds: Arc::new(postgres::PgBuildStore::new(pool.clone())),
            broadcasts: Arc::new(postgres::PgBroadcastStore::new(pool.clone())),
            observations: Arc::new(postgres::PgObservationStore::new(pool.clone())),
            balances: Arc::new(postgres::PgBalanceStore::new(pool)),
        }
    }

    pub fn broadcast_queue(&self) -> ObservationQueue<BroadcastObservation> {
        ObservationQueue::new(self.observations.clone())
    }

    pub fn scan_queue(&self) -> ObservationQueue<BalanceScanCursor> {
        ObservationQueue::new(self.observations.clone())
    }
}
