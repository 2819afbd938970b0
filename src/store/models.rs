//! Persistent records of the transaction lifecycle and the derived balance ledger

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{LedgerOrdinal, OperationHash, OperationId, Stroops};

/// Unsigned envelope produced by the builder. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBuild {
    pub operation_id: OperationId,
    pub envelope_xdr: String,
}

/// Broadcast lifecycle state
///
/// Stored as SMALLINT. Terminal states: COMPLETED (1), FAILED (-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum BroadcastState {
    InProgress = 0,
    Completed = 1,
    Failed = -1,
}

impl BroadcastState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BroadcastState::InProgress)
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(BroadcastState::InProgress),
            1 => Some(BroadcastState::Completed),
            -1 => Some(BroadcastState::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastState::InProgress => "IN_PROGRESS",
            BroadcastState::Completed => "COMPLETED",
            BroadcastState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for BroadcastState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Machine-readable failure classification shown to pollers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum TxExecutionError {
    Unknown = 0,
    /// Underfunded or reserve violation
    InsufficientBalance = 1,
    /// Stale sequence or expired time bounds; caller must rebuild
    ShouldRebuild = 2,
}

impl TxExecutionError {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TxExecutionError::Unknown),
            1 => Some(TxExecutionError::InsufficientBalance),
            2 => Some(TxExecutionError::ShouldRebuild),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxExecutionError::Unknown => "UNKNOWN",
            TxExecutionError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            TxExecutionError::ShouldRebuild => "SHOULD_REBUILD",
        }
    }
}

impl fmt::Display for TxExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBroadcast {
    pub operation_id: OperationId,
    pub state: BroadcastState,
    pub amount: Stroops,
    pub fee: Stroops,
    /// Network hash, or the synthetic hash of an internal transfer
    pub hash: String,
    /// Scaled ledger ordinal, set once the outcome is known
    pub ledger: Option<LedgerOrdinal>,
    pub created_at: DateTime<Utc>,
    pub error: Option<String>,
    pub error_code: Option<TxExecutionError>,
}

impl TransactionBroadcast {
    pub fn in_progress(operation_id: OperationId, hash: String, amount: Stroops) -> Self {
        Self {
            operation_id,
            state: BroadcastState::InProgress,
            amount,
            fee: 0,
            hash,
            ledger: None,
            created_at: Utc::now(),
            error: None,
            error_code: None,
        }
    }

    pub fn mark_completed(
        &mut self,
        amount: Stroops,
        fee: Stroops,
        ledger: LedgerOrdinal,
        created_at: DateTime<Utc>,
    ) {
        self.state = BroadcastState::Completed;
        self.amount = amount;
        self.fee = fee;
        self.ledger = Some(ledger);
        self.created_at = created_at;
        self.error = None;
        self.error_code = None;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>, code: TxExecutionError) {
        self.state = BroadcastState::Failed;
        self.error = Some(error.into());
        self.error_code = Some(code);
    }
}

/// Balance row, derived from [`BalanceOperation`]s
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBalance {
    pub asset_id: String,
    pub address: String,
    pub balance: Stroops,
    pub minimum_reserve: Stroops,
    pub sequence_number: i64,
    /// Highest ordinal folded into `balance`
    pub ledger: LedgerOrdinal,
}

impl AddressBalance {
    pub fn empty(asset_id: &str, address: &str) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            address: address.to_string(),
            balance: 0,
            minimum_reserve: 0,
            sequence_number: 0,
            ledger: 0,
        }
    }
}

/// Write-once balance delta, unique per `(asset_id, address, operation_hash)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceOperation {
    pub asset_id: String,
    pub address: String,
    pub ledger: LedgerOrdinal,
    pub operation_hash: OperationHash,
    pub tx_hash: String,
    /// Signed delta
    pub amount: Stroops,
}

impl BalanceOperation {
    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(&self.asset_id, &self.address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BalanceKey {
    pub asset_id: String,
    pub address: String,
}

impl BalanceKey {
    pub fn new(asset_id: &str, address: &str) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            address: address.to_string(),
        }
    }
}

/// Partition of the observation store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObservationKind {
    Broadcast,
    BalanceScan,
}

impl ObservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationKind::Broadcast => "broadcast",
            ObservationKind::BalanceScan => "balance_scan",
        }
    }
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage shape of an observation; the payload is opaque JSON
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationRecord {
    pub kind: ObservationKind,
    pub key: String,
    pub payload: String,
}

#[derive(Debug, Clone, Default)]
pub struct ObservationPage {
    pub items: Vec<ObservationRecord>,
    /// Key to resume after; `None` once the partition is exhausted
    pub next_cursor: Option<String>,
}
