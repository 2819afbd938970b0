use std::fmt;

use thiserror::Error;

use crate::xdr::XdrError;

/// Result codes attached to a rejected submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitRejection {
    /// e.g. `tx_failed`, `tx_bad_seq`
    pub transaction_code: String,
    /// One entry per operation, e.g. `op_underfunded`
    pub operation_codes: Vec<String>,
}

impl SubmitRejection {
    pub fn new(transaction_code: impl Into<String>, operation_codes: &[&str]) -> Self {
        Self {
            transaction_code: transaction_code.into(),
            operation_codes: operation_codes.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl fmt::Display for SubmitRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operation_codes.is_empty() {
            write!(f, "{}", self.transaction_code)
        } else {
            write!(
                f,
                "{} [{}]",
                self.transaction_code,
                self.operation_codes.join(", ")
            )
        }
    }
}

#[derive(Debug, Error)]
pub enum HorizonError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transaction rejected: {0}")]
    Rejected(SubmitRejection),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl HorizonError {
    pub fn code(&self) -> &'static str {
        match self {
            HorizonError::Http(_) => "HTTP",
            HorizonError::Status { .. } => "STATUS",
            HorizonError::Rejected(_) => "REJECTED",
            HorizonError::Decode(_) => "DECODE",
        }
    }
}

impl From<XdrError> for HorizonError {
    fn from(e: XdrError) -> Self {
        HorizonError::Decode(e.to_string())
    }
}
