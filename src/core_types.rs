//! Core types used throughout the gateway
//!
//! These are fundamental type aliases and identifiers shared by the codec,
//! the stores and the transaction lifecycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Amount in stroops (1 lumen = 10^7 stroops).
///
/// Signed so that balance deltas and balances share one type.
pub type Stroops = i64;

/// Synthetic, monotonic ordering key for balance operations.
///
/// # Layout:
/// - `network_ledger * 10`     - operation confirmed on the network
/// - `network_ledger * 10 + 1` - internal transfer settled off-network
///
/// Nine slots per real ledger keep the two sources from colliding.
pub type LedgerOrdinal = i64;

/// Deduplication key of a balance operation
pub type OperationHash = i64;

/// Scaling factor between network ledger sequence and [`LedgerOrdinal`]
pub const LEDGER_ORDINAL_SCALE: i64 = 10;

/// Slot inside a scaled ledger reserved for internal transfers
pub const INTERNAL_TRANSFER_SLOT: i64 = 1;

/// Ordinal of an operation confirmed in `ledger`
#[inline]
pub fn confirmed_ordinal(ledger: i64) -> LedgerOrdinal {
    ledger * LEDGER_ORDINAL_SCALE
}

/// Ordinal of an internal transfer settled while `latest_ledger` was the newest ledger
#[inline]
pub fn internal_ordinal(latest_ledger: i64) -> LedgerOrdinal {
    latest_ledger * LEDGER_ORDINAL_SCALE + INTERNAL_TRANSFER_SLOT
}

/// Caller-supplied identifier of one logical transfer request.
///
/// Correlates build, broadcast and observation records end-to-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Rendering without separators, used as the synthetic transaction hash
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OperationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// 64-bit hash of `input`: the first eight bytes of its MD5 digest, big-endian.
pub fn hash64(input: &str) -> OperationHash {
    let digest = md5::compute(input.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.0[..8]);
    i64::from_be_bytes(bytes)
}
