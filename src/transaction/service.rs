//! Caller-facing facade over the transaction lifecycle

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use super::GatewaySettings;
use super::broadcast::BroadcastCoordinator;
use super::builder::TransactionBuilder;
use super::checkpoint::Checkpoint;
use super::error::{JobError, TransactionError};
use super::internal_transfer::InternalTransferLedger;
use super::reconciliation::ReconciliationJob;
use crate::core_types::{OperationId, Stroops};
use crate::horizon::NetworkClient;
use crate::money::to_lumens;
use crate::store::{
    AddressBalance, BroadcastObservation, BroadcastStore, BuildStore, ObservationQueue, Stores,
    TransactionBroadcast, TransactionBuild,
};
use crate::xdr;

/// Network fee parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fees {
    /// Per operation, stroops
    pub base_fee: Stroops,
    /// Per entry, lumens
    pub base_reserve: Decimal,
}

pub struct TransactionService {
    network: Arc<dyn NetworkClient>,
    builds: Arc<dyn BuildStore>,
    broadcasts: Arc<dyn BroadcastStore>,
    observations: ObservationQueue<BroadcastObservation>,
    builder: TransactionBuilder,
    coordinator: BroadcastCoordinator,
    reconciliation: ReconciliationJob,
}

impl TransactionService {
    pub fn new(
        network: Arc<dyn NetworkClient>,
        stores: &Stores,
        checkpoint: Arc<dyn Checkpoint>,
        settings: GatewaySettings,
    ) -> Self {
        let observations = stores.broadcast_queue();
        let internal = InternalTransferLedger::new(
            network.clone(),
            stores.balances.clone(),
            stores.broadcasts.clone(),
            checkpoint.clone(),
            settings.native_asset_id.clone(),
        );
        let builder =
            TransactionBuilder::new(network.clone(), stores.builds.clone(), settings.clone());
        let coordinator = BroadcastCoordinator::new(
            network.clone(),
            stores.broadcasts.clone(),
            observations.clone(),
            internal,
            checkpoint,
            settings,
        );
        let reconciliation = ReconciliationJob::new(
            network.clone(),
            stores.broadcasts.clone(),
            observations.clone(),
        );

        Self {
            network,
            builds: stores.builds.clone(),
            broadcasts: stores.broadcasts.clone(),
            observations,
            builder,
            coordinator,
            reconciliation,
        }
    }

    pub async fn build(
        &self,
        operation_id: OperationId,
        from: &AddressBalance,
        to_address: &str,
        memo_text: Option<&str>,
        amount: Stroops,
    ) -> Result<String, TransactionError> {
        self.builder
            .build(operation_id, from, to_address, memo_text, amount)
            .await
    }

    pub async fn get_build(
        &self,
        operation_id: OperationId,
    ) -> Result<TransactionBuild, TransactionError> {
        self.builds
            .get(operation_id)
            .await?
            .ok_or_else(|| TransactionError::NotFound(format!("build {}", operation_id)))
    }

    pub async fn broadcast(
        &self,
        operation_id: OperationId,
        envelope_xdr: &str,
    ) -> Result<(), TransactionError> {
        self.coordinator.broadcast(operation_id, envelope_xdr).await
    }

    pub async fn get_broadcast(
        &self,
        operation_id: OperationId,
    ) -> Result<TransactionBroadcast, TransactionError> {
        self.broadcasts
            .get(operation_id)
            .await?
            .ok_or_else(|| TransactionError::NotFound(format!("broadcast {}", operation_id)))
    }

    /// Forget everything about an operation: pending observation, broadcast, build
    pub async fn delete_broadcast(&self, operation_id: OperationId) -> Result<(), TransactionError> {
        self.observations.remove(&operation_id.to_string()).await?;
        self.broadcasts.delete(operation_id).await?;
        self.builds.delete(operation_id).await?;
        info!(operation_id = %operation_id, "Broadcast deleted");
        Ok(())
    }

    pub async fn current_fees(&self) -> Result<Fees, TransactionError> {
        let ledger = self.network.latest_ledger().await?;
        Ok(Fees {
            base_fee: ledger.base_fee,
            base_reserve: to_lumens(ledger.base_reserve),
        })
    }

    /// Structural check only: the envelope decodes. Signatures are not verified.
    pub fn check_signature(&self, envelope_xdr: &str) -> bool {
        xdr::is_well_formed(envelope_xdr)
    }

    pub async fn reconcile_in_progress(&self, batch_size: usize) -> Result<usize, JobError> {
        self.reconciliation.run_once(batch_size).await
    }

    pub async fn last_job_error(&self) -> Option<String> {
        self.reconciliation.last_error().await
    }
}
