//! Operation and rejection classification shared by broadcast and reconciliation

use crate::core_types::Stroops;
use crate::horizon::{NetworkClient, SubmitRejection, TransactionDetails};
use crate::store::TxExecutionError;
use crate::xdr::{Operation, OperationBody};

use super::error::TransactionError;

const INSUFFICIENT_BALANCE_CODES: [&str; 2] = ["op_underfunded", "op_low_reserve"];
const SHOULD_REBUILD_CODES: [&str; 2] = ["tx_too_late", "tx_bad_seq"];

/// Map network result codes to the classification stored on a broadcast
pub fn classify_rejection(rejection: &SubmitRejection) -> TxExecutionError {
    if rejection
        .operation_codes
        .iter()
        .any(|code| INSUFFICIENT_BALANCE_CODES.contains(&code.as_str()))
    {
        return TxExecutionError::InsufficientBalance;
    }
    if SHOULD_REBUILD_CODES.contains(&rejection.transaction_code.as_str()) {
        return TxExecutionError::ShouldRebuild;
    }
    TxExecutionError::Unknown
}

/// Amount known before confirmation. A merge moves the whole balance, which is
/// only known from its result, so it starts at 0.
pub fn provisional_amount(op: &Operation) -> Result<Stroops, TransactionError> {
    match &op.body {
        OperationBody::Payment(payment) => Ok(payment.amount),
        OperationBody::CreateAccount(create) => Ok(create.starting_balance),
        OperationBody::AccountMerge(_) => Ok(0),
        other => Err(TransactionError::UnsupportedOperation(
            other.name().to_string(),
        )),
    }
}

/// Amount moved by the first operation of a confirmed transaction
pub fn final_amount(
    network: &dyn NetworkClient,
    details: &TransactionDetails,
) -> Result<Stroops, TransactionError> {
    let op = network.first_operation(&details.envelope_xdr)?;
    match &op.body {
        OperationBody::AccountMerge(_) => {
            Ok(network.account_merge_amount(&details.result_xdr, 0)?)
        }
        _ => provisional_amount(&op),
    }
}
