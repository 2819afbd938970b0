//! Transaction lifecycle
//!
//! Build → broadcast → reconcile, plus the internal-transfer fast path.
//!
//! ```text
//! build ──► TransactionBuild
//!
//! broadcast ─┬─ internal payment ──► InternalTransferLedger ──► Completed | Failed
//!            └─ submit ──► observation ──► InProgress
//!                                            │
//!                 ReconciliationJob ◄────────┘ ──► Completed | Failed
//! ```

pub mod broadcast;
pub mod builder;
pub mod checkpoint;
pub mod classify;
pub mod error;
pub mod internal_transfer;
pub mod reconciliation;
pub mod service;


use std::time::Duration;

use crate::config::StellarConfig;

pub use broadcast::BroadcastCoordinator;
pub use builder::TransactionBuilder;
pub use checkpoint::{Checkpoint, CheckpointId, NoopCheckpoint};
pub use error::{JobError, TransactionError};
pub use internal_transfer::InternalTransferLedger;
pub use reconciliation::ReconciliationJob;
pub use service::{Fees, TransactionService};

/// Settings shared by the lifecycle components
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Shared deposit address whose sub-accounts are tracked internally
    pub deposit_base_address: String,
    pub native_asset_id: String,
    /// Fee per operation, stroops
    pub operation_fee: u32,
    pub transaction_expiration: Duration,
}

impl GatewaySettings {
    pub fn from_config(config: &StellarConfig) -> Self {
        Self {
            deposit_base_address: config.deposit_base_address.clone(),
            native_asset_id: config.native_asset_id.clone(),
            operation_fee: config.operation_fee,
            transaction_expiration: Duration::from_secs(config.transaction_expiration_secs),
        }
    }

    pub fn is_deposit_base(&self, address: &str) -> bool {
        crate::balance::memo::same_address(address, &self.deposit_base_address)
    }
}
