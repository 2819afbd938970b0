//! Transaction lifecycle error types

use thiserror::Error;

use super::checkpoint::CheckpointId;
use crate::core_types::OperationId;
use crate::horizon::HorizonError;
use crate::store::{StoreError, TxExecutionError};
use crate::xdr::XdrError;

#[derive(Debug, Error)]
pub enum TransactionError {
    // === Business Rules ===
    #[error("{0}")]
    Business(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unsupported operation type: {0}")]
    UnsupportedOperation(String),

    #[error("Broadcasting transaction failed. operationId={operation_id}, message={message}")]
    BroadcastRejected {
        operation_id: OperationId,
        message: String,
        error_code: TxExecutionError,
    },

    // === Lookup & Integrity ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Data integrity violation: {0}")]
    Integrity(String),

    /// Injected failure at a recovery point
    #[error("Crash injected at {0:?}")]
    Crash(CheckpointId),

    // === Collaborators ===
    #[error("Network error: {0}")]
    Network(#[from] HorizonError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Envelope error: {0}")]
    Xdr(#[from] XdrError),
}

impl TransactionError {
    pub fn code(&self) -> &'static str {
        match self {
            TransactionError::Business(_) => "BUSINESS",
            TransactionError::InvalidAddress(_) => "INVALID_ADDRESS",
            TransactionError::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            TransactionError::BroadcastRejected { .. } => "BROADCAST_REJECTED",
            TransactionError::NotFound(_) => "NOT_FOUND",
            TransactionError::Integrity(_) => "INTEGRITY",
            TransactionError::Crash(_) => "CRASH",
            TransactionError::Network(_) => "NETWORK",
            TransactionError::Store(_) => "STORE",
            TransactionError::Xdr(_) => "XDR",
        }
    }

    /// Rule violations reported to the caller and never retried
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            TransactionError::Business(_)
                | TransactionError::InvalidAddress(_)
                | TransactionError::UnsupportedOperation(_)
                | TransactionError::BroadcastRejected { .. }
        )
    }

    /// Classification carried by a rejected broadcast
    pub fn execution_error(&self) -> Option<TxExecutionError> {
        match self {
            TransactionError::BroadcastRejected { error_code, .. } => Some(*error_code),
            _ => None,
        }
    }
}

/// A periodic job run that stopped early
#[derive(Debug, Error)]
#[error("Job {job} failed after {processed} item(s): {source}")]
pub struct JobError {
    pub job: &'static str,
    /// Items fully processed before the failure
    pub processed: usize,
    pub source: Box<TransactionError>,
}

impl JobError {
    pub fn new(job: &'static str, processed: usize, source: TransactionError) -> Self {
        Self {
            job,
            processed,
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_classification() {
        assert!(TransactionError::Business("x".into()).is_business());
        assert!(TransactionError::UnsupportedOperation("Inflation".into()).is_business());
        assert!(!TransactionError::Integrity("x".into()).is_business());
        assert!(!TransactionError::Crash(CheckpointId::AfterSubmit).is_business());
    }

    #[test]
    fn test_job_error_reports_progress() {
        let err = JobError::new("reconcile", 3, TransactionError::Integrity("hash".into()));
        assert_eq!(err.processed, 3);
        assert!(err.to_string().contains("after 3 item(s)"));
    }
}
