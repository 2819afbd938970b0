//! Envelope access over the network's XDR types
//!
//! Every envelope layout is read through [`TxView`]. A fee bump exposes the
//! inner transaction it wraps.

use stellar_xdr::curr::{
    AccountId, FeeBumpTransactionInnerTx, Limits, Memo, MuxedAccount, Operation, Preconditions,
    PublicKey, ReadXdr, TimeBounds, Transaction, TransactionEnvelope, TransactionV1Envelope,
    Uint256, VecM, WriteXdr,
};

use super::error::XdrError;
use super::strkey;

pub const MAX_MEMO_TEXT: usize = 28;

pub fn decode_envelope(encoded: &str) -> Result<TransactionEnvelope, XdrError> {
    Ok(TransactionEnvelope::from_xdr_base64(
        encoded.trim(),
        Limits::none(),
    )?)
}

pub fn encode_envelope(envelope: &TransactionEnvelope) -> Result<String, XdrError> {
    Ok(envelope.to_xdr_base64(Limits::none())?)
}

/// Unsigned V1 envelope around `tx`
pub fn unsigned(tx: Transaction) -> TransactionEnvelope {
    TransactionEnvelope::Tx(TransactionV1Envelope {
        tx,
        signatures: VecM::default(),
    })
}

pub fn account_id(key: [u8; 32]) -> AccountId {
    AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(key)))
}

pub fn muxed_account(key: [u8; 32]) -> MuxedAccount {
    MuxedAccount::Ed25519(Uint256(key))
}

pub fn account_key(account: &AccountId) -> [u8; 32] {
    match &account.0 {
        PublicKey::PublicKeyTypeEd25519(key) => key.0,
    }
}

/// Underlying ed25519 key; a muxed id is dropped
pub fn muxed_key(account: &MuxedAccount) -> [u8; 32] {
    match account {
        MuxedAccount::Ed25519(key) => key.0,
        MuxedAccount::MuxedEd25519(muxed) => muxed.ed25519.0,
    }
}

pub fn muxed_address(account: &MuxedAccount) -> String {
    strkey::encode_account_id(&muxed_key(account))
}

pub fn account_address(account: &AccountId) -> String {
    strkey::encode_account_id(&account_key(account))
}

pub fn text_memo(text: &str) -> Result<Memo, XdrError> {
    Ok(Memo::Text(text.as_bytes().to_vec().try_into()?))
}

/// Text or id memo rendered as a string
pub fn memo_text(memo: &Memo) -> Option<String> {
    match memo {
        Memo::Text(text) => Some(String::from_utf8_lossy(text.as_slice()).into_owned()),
        Memo::Id(id) => Some(id.to_string()),
        Memo::None | Memo::Hash(_) | Memo::Return(_) => None,
    }
}

/// Source, memo and operations of the transaction an envelope carries
#[derive(Debug, Clone, Copy)]
pub struct TxView<'a> {
    pub source: [u8; 32],
    pub seq_num: i64,
    pub memo: &'a Memo,
    pub operations: &'a [Operation],
    pub time_bounds: Option<&'a TimeBounds>,
    /// Read from the inner transaction of a fee bump
    pub fee_bump: bool,
}

impl<'a> TxView<'a> {
    pub fn of(envelope: &'a TransactionEnvelope) -> Self {
        match envelope {
            TransactionEnvelope::TxV0(env) => Self {
                source: env.tx.source_account_ed25519.0,
                seq_num: env.tx.seq_num.0,
                memo: &env.tx.memo,
                operations: env.tx.operations.as_slice(),
                time_bounds: env.tx.time_bounds.as_ref(),
                fee_bump: false,
            },
            TransactionEnvelope::Tx(env) => Self::v1(&env.tx, false),
            TransactionEnvelope::TxFeeBump(env) => match &env.tx.inner_tx {
                FeeBumpTransactionInnerTx::Tx(inner) => Self::v1(&inner.tx, true),
            },
        }
    }

    fn v1(tx: &'a Transaction, fee_bump: bool) -> Self {
        let time_bounds = match &tx.cond {
            Preconditions::None => None,
            Preconditions::Time(bounds) => Some(bounds),
            Preconditions::V2(cond) => cond.time_bounds.as_ref(),
        };
        Self {
            source: muxed_key(&tx.source_account),
            seq_num: tx.seq_num.0,
            memo: &tx.memo,
            operations: tx.operations.as_slice(),
            time_bounds,
            fee_bump,
        }
    }

    pub fn source_address(&self) -> String {
        strkey::encode_account_id(&self.source)
    }

    pub fn first_operation(&self) -> Option<&'a Operation> {
        self.operations.first()
    }
}
