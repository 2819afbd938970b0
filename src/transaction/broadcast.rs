//! Broadcast Coordinator
//!
//! Routes signed envelopes either to the internal transfer ledger or to the
//! network. Accepted submissions leave an observation behind for the
//! reconciliation job; the observation is written before the broadcast record.

use std::sync::Arc;

use tracing::{info, warn};

use super::GatewaySettings;
use super::checkpoint::{Checkpoint, CheckpointId};
use super::classify::{classify_rejection, provisional_amount};
use super::error::TransactionError;
use super::internal_transfer::InternalTransferLedger;
use crate::balance::memo::virtual_address;
use crate::core_types::{OperationId, Stroops};
use crate::horizon::{HorizonError, NetworkClient};
use crate::store::{
    BroadcastObservation, BroadcastStore, ObservationQueue, TransactionBroadcast,
};
use crate::xdr::{self, Memo, OperationBody, TxView};

pub struct BroadcastCoordinator {
    network: Arc<dyn NetworkClient>,
    broadcasts: Arc<dyn BroadcastStore>,
    observations: ObservationQueue<BroadcastObservation>,
    internal: InternalTransferLedger,
    checkpoint: Arc<dyn Checkpoint>,
    settings: GatewaySettings,
}

impl BroadcastCoordinator {
    pub fn new(
        network: Arc<dyn NetworkClient>,
        broadcasts: Arc<dyn BroadcastStore>,
        observations: ObservationQueue<BroadcastObservation>,
        internal: InternalTransferLedger,
        checkpoint: Arc<dyn Checkpoint>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            network,
            broadcasts,
            observations,
            internal,
            checkpoint,
            settings,
        }
    }

    pub async fn broadcast(
        &self,
        operation_id: OperationId,
        envelope_xdr: &str,
    ) -> Result<(), TransactionError> {
        let envelope = xdr::decode_envelope(envelope_xdr)?;
        let tx = TxView::of(&envelope);

        if let Some((from_address, amount)) = self.internal_transfer(&tx) {
            self.internal
                .settle(operation_id, &from_address, amount)
                .await?;
            return Ok(());
        }

        let op = tx.first_operation().ok_or_else(|| {
            TransactionError::Business("Transaction has no operations".to_string())
        })?;
        let amount = provisional_amount(op)?;

        let hash = match self.network.submit(envelope_xdr).await {
            Ok(hash) => hash,
            Err(HorizonError::Rejected(rejection)) => {
                let error_code = classify_rejection(&rejection);
                warn!(
                    operation_id = %operation_id,
                    %rejection,
                    error_code = %error_code,
                    "Broadcast rejected"
                );
                return Err(TransactionError::BroadcastRejected {
                    operation_id,
                    message: rejection.to_string(),
                    error_code,
                });
            }
            Err(e) => return Err(e.into()),
        };

        self.checkpoint.reach(CheckpointId::AfterSubmit)?;

        self.observations
            .put(&BroadcastObservation { operation_id })
            .await?;

        self.checkpoint.reach(CheckpointId::AfterObservationWrite)?;

        self.broadcasts
            .insert_or_replace(&TransactionBroadcast::in_progress(
                operation_id,
                hash.clone(),
                amount,
            ))
            .await?;

        info!(
            operation_id = %operation_id,
            hash = %hash,
            amount,
            "Broadcast accepted"
        );
        Ok(())
    }

    /// Source virtual address and amount when the envelope is a single
    /// memo-tagged payment from the deposit base to itself
    fn internal_transfer(&self, tx: &TxView<'_>) -> Option<(String, Stroops)> {
        if tx.operations.len() != 1 {
            return None;
        }
        let Memo::Text(_) = tx.memo else {
            return None;
        };
        let memo = xdr::memo_text(tx.memo)?;
        if memo.trim().is_empty() {
            return None;
        }
        let OperationBody::Payment(payment) = &tx.operations[0].body else {
            return None;
        };

        let base = tx.source_address();
        if !self.settings.is_deposit_base(&base)
            || !self.settings.is_deposit_base(&xdr::muxed_address(&payment.destination))
        {
            return None;
        }
        Some((virtual_address(&base, &memo), payment.amount))
    }
}
