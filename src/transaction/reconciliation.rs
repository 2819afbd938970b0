//! Reconciliation Job
//!
//! Polls the network for every broadcast observation and moves the matching
//! broadcast to its terminal state. One sequential pass per `run_once`.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::classify::final_amount;
use super::error::{JobError, TransactionError};
use crate::core_types::{OperationId, confirmed_ordinal};
use crate::horizon::{NetworkClient, TxLookup};
use crate::store::{
    BroadcastObservation, BroadcastStore, ObservationQueue, TransactionBroadcast,
    TxExecutionError,
};

pub const JOB_NAME: &str = "reconcile_broadcasts";

/// Outcome of one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Completed,
    /// Not on the network yet; observation kept
    Pending,
}

pub struct ReconciliationJob {
    network: Arc<dyn NetworkClient>,
    broadcasts: Arc<dyn BroadcastStore>,
    observations: ObservationQueue<BroadcastObservation>,
    last_error: Mutex<Option<String>>,
}

impl ReconciliationJob {
    pub fn new(
        network: Arc<dyn NetworkClient>,
        broadcasts: Arc<dyn BroadcastStore>,
        observations: ObservationQueue<BroadcastObservation>,
    ) -> Self {
        Self {
            network,
            broadcasts,
            observations,
            last_error: Mutex::new(None),
        }
    }

    pub async fn last_error(&self) -> Option<String> {
        self.last_error.lock().await.clone()
    }

    /// Process every observation, `batch_size` per page.
    ///
    /// Returns the number of observations visited, pending ones included.
    /// The first failing item aborts the run; items handled before it keep
    /// their state. An observation without a broadcast record is dropped and
    /// fails the run.
    pub async fn run_once(&self, batch_size: usize) -> Result<usize, JobError> {
        let mut processed = 0;
        let mut cursor: Option<String> = None;

        loop {
            let (items, next) = match self.observations.page(batch_size, cursor.as_deref()).await
            {
                Ok(page) => page,
                Err(e) => return Err(self.fail(processed, e.into()).await),
            };

            for item in items {
                match self.process(item.operation_id).await {
                    Ok(_) => processed += 1,
                    Err(e) => return Err(self.fail(processed, e).await),
                }
            }

            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        *self.last_error.lock().await = None;
        if processed > 0 {
            info!(processed, "Reconciliation pass finished");
        }
        Ok(processed)
    }

    async fn fail(&self, processed: usize, e: TransactionError) -> JobError {
        let err = JobError::new(JOB_NAME, processed, e);
        error!(processed, error = %err, "Reconciliation pass failed");
        *self.last_error.lock().await = Some(format!("Error in job {}: {}", JOB_NAME, err.source));
        err
    }

    async fn process(&self, operation_id: OperationId) -> Result<ItemOutcome, TransactionError> {
        let key = operation_id.to_string();
        let Some(mut broadcast) = self.broadcasts.get(operation_id).await? else {
            self.observations.remove(&key).await?;
            error!(operation_id = %operation_id, "Observation without broadcast dropped");
            return Err(TransactionError::Integrity(format!(
                "Broadcast for observed operation not found. operationId={}",
                operation_id
            )));
        };

        match self.confirm(&mut broadcast).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                // Poison item: terminal failure, never retried
                broadcast.mark_failed(e.to_string(), TxExecutionError::Unknown);
                self.broadcasts.merge(&broadcast).await?;
                self.observations.remove(&key).await?;
                error!(operation_id = %operation_id, error = %e, "Broadcast marked failed");
                Err(e)
            }
        }
    }

    async fn confirm(
        &self,
        broadcast: &mut TransactionBroadcast,
    ) -> Result<ItemOutcome, TransactionError> {
        let details = match self.network.transaction_by_hash(&broadcast.hash).await? {
            TxLookup::Found(details) => details,
            TxLookup::NotFoundYet => {
                debug!(
                    operation_id = %broadcast.operation_id,
                    hash = %broadcast.hash,
                    "Transaction not confirmed yet"
                );
                return Ok(ItemOutcome::Pending);
            }
        };

        if !details.hash.eq_ignore_ascii_case(&broadcast.hash) {
            return Err(TransactionError::Integrity(format!(
                "Transaction hash mismatch. actual={}, expected={}",
                details.hash, broadcast.hash
            )));
        }

        let amount = final_amount(self.network.as_ref(), &details)?;
        let ledger = confirmed_ordinal(details.ledger);
        broadcast.mark_completed(amount, details.fee_charged, ledger, details.created_at);

        self.broadcasts.merge(broadcast).await?;
        self.observations
            .remove(&broadcast.operation_id.to_string())
            .await?;

        info!(
            operation_id = %broadcast.operation_id,
            hash = %broadcast.hash,
            amount,
            ledger,
            "Broadcast completed"
        );
        Ok(ItemOutcome::Completed)
    }
}
