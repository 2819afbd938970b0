//! Transaction Envelope Codec
//!
//! Base64-wrapped XDR envelopes and results of the ledger network. Decoding
//! and encoding are `stellar_xdr`'s; this module adds the few views the
//! gateway reads: source, memo, operations and result amounts.

pub mod envelope;
pub mod error;
pub mod result;
pub mod strkey;

pub use envelope::{
    TxView, account_address, account_id, decode_envelope, encode_envelope, memo_text,
    muxed_account, muxed_address, text_memo,
};
pub use error::XdrError;
pub use result::decode_result;
pub use stellar_xdr::curr::{
    Asset, Memo, MuxedAccount, Operation, OperationBody, TransactionEnvelope, TransactionResult,
};
pub use strkey::is_valid_account_id;

/// Whether `envelope_base64` decodes as an envelope.
///
/// Structural check only. No signature is verified.
pub fn is_well_formed(envelope_base64: &str) -> bool {
    decode_envelope(envelope_base64).is_ok()
}
