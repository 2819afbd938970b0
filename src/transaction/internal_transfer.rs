//! Internal Transfer Ledger
//!
//! Settles a payment between two sub-accounts of the deposit base without a
//! network round-trip. Only the debit of the source sub-account is written
//! here; the credit is picked up by the deposit scanner.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::checkpoint::{Checkpoint, CheckpointId};
use super::error::TransactionError;
use crate::core_types::{OperationId, Stroops, hash64, internal_ordinal};
use crate::horizon::NetworkClient;
use crate::store::{
    BalanceKey, BalanceOperation, BalanceStore, BroadcastStore, TransactionBroadcast,
    TxExecutionError,
};

pub const NOT_ENOUGH_BALANCE: &str = "Not enough balance!";

pub struct InternalTransferLedger {
    network: Arc<dyn NetworkClient>,
    balances: Arc<dyn BalanceStore>,
    broadcasts: Arc<dyn BroadcastStore>,
    checkpoint: Arc<dyn Checkpoint>,
    asset_id: String,
}

impl InternalTransferLedger {
    pub fn new(
        network: Arc<dyn NetworkClient>,
        balances: Arc<dyn BalanceStore>,
        broadcasts: Arc<dyn BroadcastStore>,
        checkpoint: Arc<dyn Checkpoint>,
        asset_id: String,
    ) -> Self {
        Self {
            network,
            balances,
            broadcasts,
            checkpoint,
            asset_id,
        }
    }

    /// Debit `amount` from the virtual address `from_address` and record the
    /// terminal broadcast.
    ///
    /// Safe to re-run for the same `operation_id`: the debit is keyed by a hash
    /// of the id, and an already recorded debit skips the balance check.
    pub async fn settle(
        &self,
        operation_id: OperationId,
        from_address: &str,
        amount: Stroops,
    ) -> Result<TransactionBroadcast, TransactionError> {
        let hash = operation_id.simple();
        let operation_hash = hash64(&hash);

        let latest = self.network.latest_ledger().await?;
        let ledger = internal_ordinal(latest.sequence);

        let mut broadcast = TransactionBroadcast::in_progress(operation_id, hash.clone(), amount);
        broadcast.ledger = Some(ledger);

        let already_debited = self
            .balances
            .has_operation(&self.asset_id, from_address, operation_hash)
            .await?;
        let balance = self
            .balances
            .get(&self.asset_id, from_address)
            .await?
            .map(|b| b.balance)
            .unwrap_or(0);

        if !already_debited && balance < amount {
            broadcast.mark_failed(NOT_ENOUGH_BALANCE, TxExecutionError::InsufficientBalance);
            warn!(
                operation_id = %operation_id,
                address = %from_address,
                balance,
                amount,
                "Internal transfer rejected: not enough balance"
            );
        } else {
            self.balances
                .record_operation(&BalanceOperation {
                    asset_id: self.asset_id.clone(),
                    address: from_address.to_string(),
                    ledger,
                    operation_hash,
                    tx_hash: hash,
                    amount: -amount,
                })
                .await?;
            self.balances
                .refresh_balance(&BalanceKey::new(&self.asset_id, from_address))
                .await?;
            broadcast.mark_completed(amount, 0, ledger, Utc::now());
            info!(
                operation_id = %operation_id,
                address = %from_address,
                amount,
                ledger,
                "Internal transfer settled"
            );
        }

        self.checkpoint.reach(CheckpointId::AfterInternalSettlement)?;

        self.broadcasts.insert_or_replace(&broadcast).await?;
        Ok(broadcast)
    }
}
