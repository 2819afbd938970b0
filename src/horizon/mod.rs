//! Network Client
//!
//! The gateway's only view of the ledger network. [`NetworkClient`] is the
//! seam between the transaction lifecycle and the network: production wires
//! [`HorizonClient`], tests wire `mock::MockNetwork`.

pub mod client;
pub mod error;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::core_types::Stroops;
use crate::xdr::{self, Operation, TransactionEnvelope, TransactionResult, TxView};

pub use client::HorizonClient;
pub use error::{HorizonError, SubmitRejection};

/// Snapshot of the newest closed ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerInfo {
    pub sequence: i64,
    /// Fee per operation, stroops
    pub base_fee: Stroops,
    /// Reserve per entry, stroops
    pub base_reserve: Stroops,
}

/// Outcome of a lookup by hash. Absence is a normal state while a
/// submitted transaction waits to close.
#[derive(Debug, Clone)]
pub enum TxLookup {
    Found(Box<TransactionDetails>),
    NotFoundYet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOrder {
    Asc,
    Desc,
}

impl HistoryOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryOrder::Asc => "asc",
            HistoryOrder::Desc => "desc",
        }
    }
}

/// Confirmed transaction as reported by the network
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionDetails {
    pub hash: String,
    pub ledger: i64,
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "stroops_from_string_or_number")]
    pub fee_charged: Stroops,
    pub source_account: String,
    pub envelope_xdr: String,
    pub result_xdr: String,
    pub paging_token: String,
    #[serde(default = "default_successful")]
    pub successful: bool,
}

fn default_successful() -> bool {
    true
}

impl TransactionDetails {
    pub fn envelope(&self) -> Result<TransactionEnvelope, HorizonError> {
        Ok(xdr::decode_envelope(&self.envelope_xdr)?)
    }

    pub fn result(&self) -> Result<TransactionResult, HorizonError> {
        Ok(xdr::decode_result(&self.result_xdr)?)
    }
}

fn stroops_from_string_or_number<'de, D>(deserializer: D) -> Result<Stroops, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn latest_ledger(&self) -> Result<LedgerInfo, HorizonError>;

    async fn account_exists(&self, address: &str) -> Result<bool, HorizonError>;

    /// Submit a signed envelope; returns the network transaction hash.
    /// A rejection is reported as [`HorizonError::Rejected`].
    async fn submit(&self, envelope_base64: &str) -> Result<String, HorizonError>;

    async fn transaction_by_hash(&self, hash: &str) -> Result<TxLookup, HorizonError>;

    /// One page of transactions involving `address`, after `cursor`
    async fn history_for(
        &self,
        address: &str,
        order: HistoryOrder,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TransactionDetails>, HorizonError>;

    fn first_operation(&self, envelope_xdr: &str) -> Result<Operation, HorizonError> {
        let envelope = xdr::decode_envelope(envelope_xdr)?;
        TxView::of(&envelope)
            .first_operation()
            .cloned()
            .ok_or_else(|| HorizonError::Decode("envelope has no operations".to_string()))
    }

    fn account_merge_amount(&self, result_xdr: &str, index: usize) -> Result<Stroops, HorizonError> {
        Ok(xdr::result::account_merge_amount(result_xdr, index)?)
    }
}
