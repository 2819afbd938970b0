//! Amounts read from a `TransactionResult`
//!
//! A merge's moved balance and a strict-send's delivered amount are only
//! known from the applied result, never from the envelope.

use stellar_xdr::curr::{
    AccountMergeResult, InnerTransactionResultResult, Limits, OperationResult,
    OperationResultTr, PathPaymentStrictReceiveResult, PathPaymentStrictSendResult, ReadXdr,
    SimplePaymentResult, TransactionResult, TransactionResultResult,
};

use super::error::XdrError;

pub fn decode_result(encoded: &str) -> Result<TransactionResult, XdrError> {
    Ok(TransactionResult::from_xdr_base64(
        encoded.trim(),
        Limits::none(),
    )?)
}

/// Per-operation results of an applied transaction, unwrapping fee bumps
pub fn operation_results(result: &TransactionResult) -> Option<&[OperationResult]> {
    match &result.result {
        TransactionResultResult::TxSuccess(ops) | TransactionResultResult::TxFailed(ops) => {
            Some(ops.as_slice())
        }
        TransactionResultResult::TxFeeBumpInnerSuccess(pair)
        | TransactionResultResult::TxFeeBumpInnerFailed(pair) => match &pair.result.result {
            InnerTransactionResultResult::TxSuccess(ops)
            | InnerTransactionResultResult::TxFailed(ops) => Some(ops.as_slice()),
            _ => None,
        },
        _ => None,
    }
}

/// Balance moved by a successful account merge at `index`
pub fn merge_amount(result: &TransactionResult, index: usize) -> Option<i64> {
    match operation_results(result)?.get(index)? {
        OperationResult::OpInner(OperationResultTr::AccountMerge(
            AccountMergeResult::Success(amount),
        )) => Some(*amount),
        _ => None,
    }
}

/// Final hop of a successful path payment at `index`
pub fn path_payment_delivered(
    result: &TransactionResult,
    index: usize,
) -> Option<&SimplePaymentResult> {
    match operation_results(result)?.get(index)? {
        OperationResult::OpInner(OperationResultTr::PathPaymentStrictSend(
            PathPaymentStrictSendResult::Success(success),
        )) => Some(&success.last),
        OperationResult::OpInner(OperationResultTr::PathPaymentStrictReceive(
            PathPaymentStrictReceiveResult::Success(success),
        )) => Some(&success.last),
        _ => None,
    }
}

/// Amount moved by the account merge at `index` of a base64 result
pub fn account_merge_amount(result_xdr: &str, index: usize) -> Result<i64, XdrError> {
    let result = decode_result(result_xdr)?;
    merge_amount(&result, index).ok_or_else(|| {
        XdrError::Unsupported(format!(
            "operation {} is not a successful account merge",
            index
        ))
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::xdr::envelope::account_id;
    use stellar_xdr::curr::{
        Asset, PathPaymentStrictSendResultSuccess, PaymentResult, TransactionResultExt, VecM,
        WriteXdr,
    };

    fn encode(result: TransactionResultResult) -> String {
        TransactionResult {
            fee_charged: 100,
            result,
            ext: TransactionResultExt::V0,
        }
        .to_xdr_base64(Limits::none())
        .unwrap()
    }

    fn success(ops: Vec<OperationResult>) -> String {
        encode(TransactionResultResult::TxSuccess(ops.try_into().unwrap()))
    }

    fn merged(balance: i64) -> OperationResult {
        OperationResult::OpInner(OperationResultTr::AccountMerge(
            AccountMergeResult::Success(balance),
        ))
    }

    /// `[payment, account_merge(balance)]`
    pub(crate) fn merge_result_xdr(balance: i64) -> String {
        success(vec![
            OperationResult::OpInner(OperationResultTr::Payment(PaymentResult::Success)),
            merged(balance),
        ])
    }

    /// Successful single account merge
    pub(crate) fn single_merge_result_xdr(balance: i64) -> String {
        success(vec![merged(balance)])
    }

    pub(crate) fn strict_send_result_xdr(destination: [u8; 32], amount: i64) -> String {
        success(vec![OperationResult::OpInner(
            OperationResultTr::PathPaymentStrictSend(PathPaymentStrictSendResult::Success(
                PathPaymentStrictSendResultSuccess {
                    offers: VecM::default(),
                    last: SimplePaymentResult {
                        destination: account_id(destination),
                        asset: Asset::Native,
                        amount,
                    },
                },
            )),
        )])
    }

    #[test]
    fn test_account_merge_amount_after_payment_result() {
        let encoded = merge_result_xdr(123_456_789);
        let result = decode_result(&encoded).unwrap();
        assert_eq!(result.fee_charged, 100);
        assert_eq!(operation_results(&result).map(<[_]>::len), Some(2));
        assert_eq!(merge_amount(&result, 1), Some(123_456_789));
        assert_eq!(merge_amount(&result, 0), None);
        assert_eq!(account_merge_amount(&encoded, 1).unwrap(), 123_456_789);
        assert!(account_merge_amount(&encoded, 5).is_err());
    }

    #[test]
    fn test_path_payment_delivered_amount() {
        let result = decode_result(&strict_send_result_xdr([4u8; 32], 77_000)).unwrap();
        let last = path_payment_delivered(&result, 0).unwrap();
        assert_eq!(last.destination, account_id([4u8; 32]));
        assert_eq!(last.asset, Asset::Native);
        assert_eq!(last.amount, 77_000);
    }

    #[test]
    fn test_failed_transaction_has_no_merge_amount() {
        let encoded = encode(TransactionResultResult::TxFailed(
            vec![
                OperationResult::OpBadAuth,
                OperationResult::OpInner(OperationResultTr::Payment(PaymentResult::Underfunded)),
            ]
            .try_into()
            .unwrap(),
        ));
        let result = decode_result(&encoded).unwrap();
        assert_eq!(operation_results(&result).map(<[_]>::len), Some(2));
        assert_eq!(merge_amount(&result, 0), None);
        assert!(path_payment_delivered(&result, 1).is_none());
    }

    #[test]
    fn test_void_result_has_no_operations() {
        let result = decode_result(&encode(TransactionResultResult::TxBadSeq)).unwrap();
        assert!(operation_results(&result).is_none());
    }
}
