//! Typed view over the generic observation store
//!
//! The store only knows `(kind, key, payload)`. Each payload type supplies its
//! partition and the mapping to and from the storage record.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ObservationStore;
use super::error::StoreError;
use super::models::{ObservationKind, ObservationRecord};
use crate::core_types::OperationId;

pub trait ObservationPayload: Sized {
    const KIND: ObservationKind;

    fn key(&self) -> String;

    fn to_record(&self) -> Result<ObservationRecord, StoreError>;

    fn from_record(record: &ObservationRecord) -> Result<Self, StoreError>;
}

/// "Poll the network for this broadcast"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastObservation {
    pub operation_id: OperationId,
}

impl ObservationPayload for BroadcastObservation {
    const KIND: ObservationKind = ObservationKind::Broadcast;

    fn key(&self) -> String {
        self.operation_id.to_string()
    }

    fn to_record(&self) -> Result<ObservationRecord, StoreError> {
        Ok(ObservationRecord {
            kind: Self::KIND,
            key: self.key(),
            payload: "{}".to_string(),
        })
    }

    fn from_record(record: &ObservationRecord) -> Result<Self, StoreError> {
        let operation_id = record.key.parse().map_err(|e| {
            StoreError::Corrupt(format!("observation key {}: {}", record.key, e))
        })?;
        Ok(Self { operation_id })
    }
}

/// Resume point of the deposit history scan for one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceScanCursor {
    #[serde(skip)]
    pub address: String,
    pub cursor: Option<String>,
}

impl ObservationPayload for BalanceScanCursor {
    const KIND: ObservationKind = ObservationKind::BalanceScan;

    fn key(&self) -> String {
        self.address.clone()
    }

    fn to_record(&self) -> Result<ObservationRecord, StoreError> {
        Ok(ObservationRecord {
            kind: Self::KIND,
            key: self.key(),
            payload: serde_json::to_string(self)?,
        })
    }

    fn from_record(record: &ObservationRecord) -> Result<Self, StoreError> {
        let mut cursor: BalanceScanCursor = serde_json::from_str(&record.payload)?;
        cursor.address = record.key.clone();
        Ok(cursor)
    }
}

pub struct ObservationQueue<T> {
    store: Arc<dyn ObservationStore>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for ObservationQueue<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T: ObservationPayload> ObservationQueue<T> {
    pub fn new(store: Arc<dyn ObservationStore>) -> Self {
        Self {
            store,
            _payload: PhantomData,
        }
    }

    /// Insert or replace
    pub async fn put(&self, item: &T) -> Result<(), StoreError> {
        self.store.add(item.to_record()?).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.store.get(T::KIND, key).await? {
            Some(record) => Ok(Some(T::from_record(&record)?)),
            None => Ok(None),
        }
    }

    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.store.delete_if_exists(T::KIND, key).await
    }

    /// One page in key order, plus the cursor of the next page
    pub async fn page(
        &self,
        size: usize,
        cursor: Option<&str>,
    ) -> Result<(Vec<T>, Option<String>), StoreError> {
        let page = self.store.page(T::KIND, size, cursor).await?;
        let items = page
            .items
            .iter()
            .map(T::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, page.next_cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryObservationStore;

    #[tokio::test]
    async fn test_cursor_payload_survives_storage() {
        let queue: ObservationQueue<BalanceScanCursor> =
            ObservationQueue::new(Arc::new(MemoryObservationStore::new()));
        let cursor = BalanceScanCursor {
            address: "GBASE".to_string(),
            cursor: Some("12345".to_string()),
        };
        queue.put(&cursor).await.unwrap();
        assert_eq!(queue.get("GBASE").await.unwrap(), Some(cursor));
        assert_eq!(queue.get("GOTHER").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_kinds_are_separate_partitions() {
        let store = Arc::new(MemoryObservationStore::new());
        let broadcasts: ObservationQueue<BroadcastObservation> =
            ObservationQueue::new(store.clone());
        let scans: ObservationQueue<BalanceScanCursor> = ObservationQueue::new(store);

        let id = OperationId::new();
        broadcasts
            .put(&BroadcastObservation { operation_id: id })
            .await
            .unwrap();
        scans
            .put(&BalanceScanCursor {
                address: "GBASE".to_string(),
                cursor: None,
            })
            .await
            .unwrap();

        let (items, next) = broadcasts.page(10, None).await.unwrap();
        assert_eq!(items, vec![BroadcastObservation { operation_id: id }]);
        assert!(next.is_none());

        broadcasts.remove(&id.to_string()).await.unwrap();
        broadcasts.remove(&id.to_string()).await.unwrap();
        assert!(broadcasts.page(10, None).await.unwrap().0.is_empty());
        assert!(scans.get("GBASE").await.unwrap().is_some());
    }
}
