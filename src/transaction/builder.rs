//! Transaction Builder
//!
//! Chooses the single operation of an outgoing transfer, wraps it in an
//! unsigned V1 envelope and persists the build.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::GatewaySettings;
use super::error::TransactionError;
use crate::core_types::{OperationId, Stroops};
use crate::horizon::NetworkClient;
use crate::store::{AddressBalance, BuildStore, TransactionBuild};
use crate::xdr::envelope::{MAX_MEMO_TEXT, unsigned};
use crate::xdr::{self, Asset, Memo, Operation, OperationBody, strkey};
use stellar_xdr::curr::{
    CreateAccountOp, PaymentOp, Preconditions, SequenceNumber, TimeBounds, TimePoint,
    Transaction, TransactionExt,
};

pub struct TransactionBuilder {
    network: Arc<dyn NetworkClient>,
    builds: Arc<dyn BuildStore>,
    settings: GatewaySettings,
}

impl TransactionBuilder {
    pub fn new(
        network: Arc<dyn NetworkClient>,
        builds: Arc<dyn BuildStore>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            network,
            builds,
            settings,
        }
    }

    /// Build and persist an unsigned envelope moving `amount` from `from` to `to_address`
    ///
    /// # Operation choice
    /// - destination missing: create-account, only within the transferable balance
    /// - destination present: payment within the transferable balance, otherwise
    ///   account-merge unless `from` is the deposit base
    pub async fn build(
        &self,
        operation_id: OperationId,
        from: &AddressBalance,
        to_address: &str,
        memo_text: Option<&str>,
        amount: Stroops,
    ) -> Result<String, TransactionError> {
        if amount <= 0 {
            return Err(TransactionError::Business(format!(
                "Amount must be positive. amount={}",
                amount
            )));
        }
        let source = strkey::decode_account_id(&from.address)
            .map_err(|e| TransactionError::InvalidAddress(format!("{}: {}", from.address, e)))?;
        let destination = strkey::decode_account_id(to_address)
            .map_err(|e| TransactionError::InvalidAddress(format!("{}: {}", to_address, e)))?;

        let transferable = from.balance - from.minimum_reserve;
        let body = if self.network.account_exists(to_address).await? {
            if amount <= transferable {
                OperationBody::Payment(PaymentOp {
                    destination: xdr::muxed_account(destination),
                    asset: Asset::Native,
                    amount,
                })
            } else if !self.settings.is_deposit_base(&from.address) {
                OperationBody::AccountMerge(xdr::muxed_account(destination))
            } else {
                return Err(TransactionError::Business(format!(
                    "It isn't allowed to merge the entire balance from the deposit base into another account! Transfer less funds. transferable={}",
                    transferable
                )));
            }
        } else if amount <= transferable {
            OperationBody::CreateAccount(CreateAccountOp {
                destination: xdr::account_id(destination),
                starting_balance: amount,
            })
        } else {
            return Err(TransactionError::Business(format!(
                "It isn't possible to merge the entire balance into an unused account! Use a destination in existence. transferable={}",
                transferable
            )));
        };

        // Blank memos are dropped; any other text goes on chain as given
        let memo = match memo_text.filter(|m| !m.trim().is_empty()) {
            Some(text) if text.len() > MAX_MEMO_TEXT => {
                return Err(TransactionError::Business(format!(
                    "Memo exceeds {} bytes",
                    MAX_MEMO_TEXT
                )));
            }
            Some(text) => xdr::text_memo(text)?,
            None => Memo::None,
        };

        let max_time = Utc::now().timestamp().max(0) as u64
            + self.settings.transaction_expiration.as_secs();
        let op_type = body.name();
        let operation = Operation {
            source_account: Some(xdr::muxed_account(source)),
            body,
        };
        let tx = Transaction {
            source_account: xdr::muxed_account(source),
            fee: self.settings.operation_fee,
            seq_num: SequenceNumber(from.sequence_number + 1),
            cond: Preconditions::Time(TimeBounds {
                min_time: TimePoint(0),
                max_time: TimePoint(max_time),
            }),
            memo,
            operations: vec![operation].try_into().map_err(xdr::XdrError::from)?,
            ext: TransactionExt::V0,
        };
        let envelope_xdr = xdr::encode_envelope(&unsigned(tx))?;

        self.builds
            .add(&TransactionBuild {
                operation_id,
                envelope_xdr: envelope_xdr.clone(),
            })
            .await?;

        info!(
            operation_id = %operation_id,
            operation = %op_type,
            amount,
            "Transaction built"
        );
        Ok(envelope_xdr)
    }
}
