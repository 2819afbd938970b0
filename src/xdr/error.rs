use thiserror::Error;

/// Envelope codec errors
#[derive(Debug, Error)]
pub enum XdrError {
    #[error("XDR codec error: {0}")]
    Codec(#[from] stellar_xdr::curr::Error),

    #[error("Invalid strkey: {0}")]
    InvalidStrKey(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl XdrError {
    pub fn code(&self) -> &'static str {
        match self {
            XdrError::Codec(_) => "CODEC",
            XdrError::InvalidStrKey(_) => "INVALID_STRKEY",
            XdrError::Unsupported(_) => "UNSUPPORTED",
        }
    }
}
