//! Deposit Scanner - credits memo-tagged deposits to virtual addresses
//!
//! Walks the shared deposit address's history in ascending order, one page per
//! run, resuming from a persisted paging token. Every credit is keyed by
//! `(tx hash, operation index)` so a replayed window records nothing twice.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::memo::{same_address, usable_memo, virtual_address};
use crate::core_types::{Stroops, confirmed_ordinal, hash64};
use crate::horizon::{HistoryOrder, NetworkClient, TransactionDetails};
use crate::store::{
    BalanceKey, BalanceOperation, BalanceScanCursor, BalanceStore, ObservationQueue,
};
use crate::transaction::{JobError, TransactionError};
use crate::xdr::result::path_payment_delivered;
use crate::xdr::{
    Asset, OperationBody, TransactionResult, TxView, account_address, muxed_address,
};

pub const JOB_NAME: &str = "scan_deposits";

/// Outcome of one scan run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanReport {
    pub transactions: usize,
    /// Balance operations newly written
    pub recorded: usize,
    pub touched: Vec<BalanceKey>,
    pub cursor: Option<String>,
}

pub struct DepositScanner {
    network: Arc<dyn NetworkClient>,
    balances: Arc<dyn BalanceStore>,
    cursors: ObservationQueue<BalanceScanCursor>,
    deposit_base: String,
    asset_id: String,
    page_size: usize,
    last_error: Mutex<Option<String>>,
}

impl DepositScanner {
    pub fn new(
        network: Arc<dyn NetworkClient>,
        balances: Arc<dyn BalanceStore>,
        cursors: ObservationQueue<BalanceScanCursor>,
        deposit_base: String,
        asset_id: String,
        page_size: usize,
    ) -> Self {
        Self {
            network,
            balances,
            cursors,
            deposit_base,
            asset_id,
            page_size,
            last_error: Mutex::new(None),
        }
    }

    pub async fn last_error(&self) -> Option<String> {
        self.last_error.lock().await.clone()
    }

    /// Scan one history page of the deposit base.
    ///
    /// The balance refresh runs once per call, also when nothing was touched.
    /// The cursor is persisted only after the refresh succeeded.
    pub async fn update_wallet_balances(&self) -> Result<ScanReport, JobError> {
        let mut report = ScanReport::default();
        match self.scan_page(&mut report).await {
            Ok(()) => {
                *self.last_error.lock().await = None;
                if report.transactions > 0 {
                    info!(
                        transactions = report.transactions,
                        recorded = report.recorded,
                        touched = report.touched.len(),
                        cursor = ?report.cursor,
                        "Deposit scan page processed"
                    );
                }
                Ok(report)
            }
            Err(e) => {
                let err = JobError::new(JOB_NAME, report.transactions, e);
                error!(processed = report.transactions, error = %err, "Deposit scan failed");
                *self.last_error.lock().await =
                    Some(format!("Error in job {}: {}", JOB_NAME, err.source));
                Err(err)
            }
        }
    }

    async fn scan_page(&self, report: &mut ScanReport) -> Result<(), TransactionError> {
        let stored = self.cursors.get(&self.deposit_base).await?;
        let cursor = stored.and_then(|c| c.cursor);

        let page = self
            .network
            .history_for(
                &self.deposit_base,
                HistoryOrder::Asc,
                cursor.as_deref(),
                self.page_size,
            )
            .await?;

        let mut touched = BTreeSet::new();
        for tx in &page {
            report.recorded += self.process_transaction(tx, &mut touched).await?;
            report.transactions += 1;
        }

        report.touched = touched.into_iter().collect();
        self.balances.refresh_balances(&report.touched).await?;

        report.cursor = page.last().map(|tx| tx.paging_token.clone()).or(cursor);
        if page.last().is_some() {
            self.cursors
                .put(&BalanceScanCursor {
                    address: self.deposit_base.clone(),
                    cursor: report.cursor.clone(),
                })
                .await?;
        }
        Ok(())
    }

    /// Record the credits of one transaction; returns how many were new
    async fn process_transaction(
        &self,
        tx: &TransactionDetails,
        touched: &mut BTreeSet<BalanceKey>,
    ) -> Result<usize, TransactionError> {
        if !tx.successful {
            debug!(hash = %tx.hash, "Skipping failed transaction");
            return Ok(0);
        }
        if same_address(&tx.source_account, &self.deposit_base) {
            debug!(hash = %tx.hash, "Skipping outgoing transaction");
            return Ok(0);
        }

        let envelope = match tx.envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(hash = %tx.hash, error = %e, "Undecodable transaction skipped");
                return Ok(0);
            }
        };
        let view = TxView::of(&envelope);
        let Some(memo) = usable_memo(view.memo) else {
            warn!(hash = %tx.hash, memo = ?view.memo, "Deposit without usable memo skipped");
            return Ok(0);
        };
        let address = virtual_address(&self.deposit_base, &memo);
        let ledger = confirmed_ordinal(tx.ledger);

        let credits = self.credits(tx, &view)?;
        let mut recorded = 0;
        for (index, amount) in credits {
            let inserted = self
                .balances
                .record_operation(&BalanceOperation {
                    asset_id: self.asset_id.clone(),
                    address: address.clone(),
                    ledger,
                    operation_hash: hash64(&format!("{}:{}", tx.hash, index)),
                    tx_hash: tx.hash.clone(),
                    amount,
                })
                .await?;
            // A replayed credit still needs its balance refreshed
            touched.insert(BalanceKey::new(&self.asset_id, &address));
            if inserted {
                recorded += 1;
            }
        }
        Ok(recorded)
    }

    /// `(operation index, amount)` of each operation paying the deposit base in lumens
    fn credits(
        &self,
        tx: &TransactionDetails,
        view: &TxView<'_>,
    ) -> Result<Vec<(usize, Stroops)>, TransactionError> {
        let mut result: Option<TransactionResult> = None;
        let mut credits = Vec::new();

        for (index, op) in view.operations.iter().enumerate() {
            let credit = match &op.body {
                OperationBody::Payment(payment) if payment.asset == Asset::Native => {
                    Some((muxed_address(&payment.destination), payment.amount))
                }
                OperationBody::CreateAccount(create) => {
                    Some((account_address(&create.destination), create.starting_balance))
                }
                OperationBody::PathPaymentStrictReceive(path) if path.dest_asset == Asset::Native => {
                    Some((muxed_address(&path.destination), path.dest_amount))
                }
                OperationBody::PathPaymentStrictSend(path) if path.dest_asset == Asset::Native => {
                    let applied = cached_result(&mut result, tx)?;
                    let delivered = path_payment_delivered(applied, index)
                        .map(|last| last.amount)
                        .ok_or_else(|| {
                            TransactionError::Integrity(format!(
                                "No path payment result. hash={}, index={}",
                                tx.hash, index
                            ))
                        })?;
                    Some((muxed_address(&path.destination), delivered))
                }
                OperationBody::AccountMerge(destination) => {
                    let amount = self.network.account_merge_amount(&tx.result_xdr, index)?;
                    Some((muxed_address(destination), amount))
                }
                other => {
                    debug!(hash = %tx.hash, index, operation = other.name(), "Operation skipped");
                    None
                }
            };

            if let Some((destination, amount)) = credit
                && same_address(&destination, &self.deposit_base)
                && amount > 0
            {
                credits.push((index, amount));
            }
        }
        Ok(credits)
    }
}

fn cached_result<'a>(
    slot: &'a mut Option<TransactionResult>,
    tx: &TransactionDetails,
) -> Result<&'a TransactionResult, TransactionError> {
    if slot.is_none() {
        *slot = Some(tx.result()?);
    }
    slot.as_ref()
        .ok_or_else(|| TransactionError::Integrity(format!("No result. hash={}", tx.hash)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::horizon::mock::MockNetwork;
    use crate::store::memory::{MemoryBalanceStore, MemoryObservationStore};
    use crate::core_types::OperationHash;
    use crate::store::{AddressBalance, StoreError};
    use crate::xdr::envelope::tests::{
        envelope_xdr, fee_bump_xdr, native_payment, restore_footprint,
    };
    use crate::xdr::result::tests::{single_merge_result_xdr, strict_send_result_xdr};
    use crate::xdr::{Memo, account_id, muxed_account, strkey, text_memo};
    use stellar_xdr::curr::{
        AlphaNum4, AssetCode4, BumpSequenceOp, CreateAccountOp, PathPaymentStrictSendOp,
        PaymentOp, SequenceNumber, VecM,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Balance store that counts calls and remembers refreshed key sets
    struct CountingBalances {
        inner: MemoryBalanceStore,
        record_calls: AtomicUsize,
        refreshes: StdMutex<Vec<Vec<BalanceKey>>>,
    }

    impl CountingBalances {
        fn new() -> Self {
            Self {
                inner: MemoryBalanceStore::new(),
                record_calls: AtomicUsize::new(0),
                refreshes: StdMutex::new(Vec::new()),
            }
        }

        fn record_calls(&self) -> usize {
            self.record_calls.load(Ordering::SeqCst)
        }

        fn refreshes(&self) -> Vec<Vec<BalanceKey>> {
            self.refreshes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BalanceStore for CountingBalances {
        async fn get(
            &self,
            asset_id: &str,
            address: &str,
        ) -> Result<Option<AddressBalance>, StoreError> {
            self.inner.get(asset_id, address).await
        }

        async fn has_operation(
            &self,
            asset_id: &str,
            address: &str,
            operation_hash: OperationHash,
        ) -> Result<bool, StoreError> {
            self.inner.has_operation(asset_id, address, operation_hash).await
        }

        async fn record_operation(&self, operation: &BalanceOperation) -> Result<bool, StoreError> {
            self.record_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.record_operation(operation).await
        }

        async fn refresh_balances(&self, keys: &[BalanceKey]) -> Result<(), StoreError> {
            self.refreshes.lock().unwrap().push(keys.to_vec());
            self.inner.refresh_balances(keys).await
        }
    }

    fn account(byte: u8) -> [u8; 32] {
        [byte; 32]
    }

    fn base() -> String {
        strkey::encode_account_id(&account(1))
    }

    fn text(memo: &str) -> Memo {
        text_memo(memo).unwrap()
    }

    fn details(hash: &str, token: &str, source: [u8; 32], envelope_xdr: String) -> TransactionDetails {
        TransactionDetails {
            hash: hash.to_string(),
            ledger: 700,
            created_at: Utc::now(),
            fee_charged: 100,
            source_account: strkey::encode_account_id(&source),
            envelope_xdr,
            result_xdr: String::new(),
            paging_token: token.to_string(),
            successful: true,
        }
    }

    fn deposit(hash: &str, token: &str, memo: &str, amount: i64) -> TransactionDetails {
        let xdr = envelope_xdr(account(2), text(memo), vec![native_payment(account(1), amount)]);
        details(hash, token, account(2), xdr)
    }

    fn scanner(network: Arc<MockNetwork>, balances: Arc<CountingBalances>) -> DepositScanner {
        DepositScanner::new(
            network,
            balances,
            ObservationQueue::new(Arc::new(MemoryObservationStore::new())),
            base(),
            "XLM".to_string(),
            10,
        )
    }

    async fn balance_of(balances: &CountingBalances, memo: &str) -> Option<i64> {
        let address = virtual_address(&base(), memo);
        balances
            .get("XLM", &address)
            .await
            .unwrap()
            .map(|row| row.balance)
    }

    #[tokio::test]
    async fn test_url_memo_records_nothing_but_still_refreshes() {
        let network = Arc::new(MockNetwork::new());
        network.push_history(deposit("hash", "1", "http://stellar-win.me/", 5_000));
        let balances = Arc::new(CountingBalances::new());

        let report = scanner(network, balances.clone())
            .update_wallet_balances()
            .await
            .unwrap();

        assert_eq!(report.transactions, 1);
        assert_eq!(balances.record_calls(), 0);
        assert_eq!(balances.refreshes(), vec![Vec::<BalanceKey>::new()]);
    }

    #[tokio::test]
    async fn test_memo_deposit_is_credited_to_virtual_address() {
        let network = Arc::new(MockNetwork::new());
        let memo = "r6mzsfwnbkgwtc8cktx4i5nw8e";
        network.push_history(deposit("hash", "1", memo, 5_000));
        let balances = Arc::new(CountingBalances::new());

        scanner(network, balances.clone())
            .update_wallet_balances()
            .await
            .unwrap();

        let address = virtual_address(&base(), memo);
        assert!(balances.record_calls() >= 1);
        let refreshes = balances.refreshes();
        assert_eq!(refreshes.len(), 1);
        assert_eq!(refreshes[0], vec![BalanceKey::new("XLM", &address)]);

        let row = balances.get("XLM", &address).await.unwrap().unwrap();
        assert_eq!(row.balance, 5_000);
        assert_eq!(row.ledger, 7_000);
        let ops = balances.inner.operations("XLM", &address).await;
        assert_eq!(ops[0].operation_hash, hash64("hash:0"));
    }

    #[tokio::test]
    async fn test_empty_history_still_refreshes_once() {
        let network = Arc::new(MockNetwork::new());
        let balances = Arc::new(CountingBalances::new());
        let report = scanner(network, balances.clone())
            .update_wallet_balances()
            .await
            .unwrap();
        assert_eq!(report.transactions, 0);
        assert_eq!(report.cursor, None);
        assert_eq!(balances.refreshes().len(), 1);
    }

    #[tokio::test]
    async fn test_only_native_credits_to_the_base_count() {
        let network = Arc::new(MockNetwork::new());
        let usd = Asset::CreditAlphanum4(AlphaNum4 {
            asset_code: AssetCode4(*b"USD\0"),
            issuer: account_id(account(9)),
        });
        let xdr = envelope_xdr(
            account(2),
            Memo::Id(7),
            vec![
                native_payment(account(3), 1),
                OperationBody::Payment(PaymentOp {
                    destination: muxed_account(account(1)),
                    asset: usd,
                    amount: 2,
                }),
                OperationBody::BumpSequence(BumpSequenceOp {
                    bump_to: SequenceNumber(10),
                }),
                native_payment(account(1), 4),
                OperationBody::CreateAccount(CreateAccountOp {
                    destination: account_id(account(1)),
                    starting_balance: 8,
                }),
            ],
        );
        network.push_history(details("h1", "1", account(2), xdr));
        let balances = Arc::new(CountingBalances::new());

        let report = scanner(network, balances.clone())
            .update_wallet_balances()
            .await
            .unwrap();

        assert_eq!(report.recorded, 2);
        let address = virtual_address(&base(), "7");
        let ops = balances.inner.operations("XLM", &address).await;
        let hashes: Vec<_> = ops.iter().map(|o| o.operation_hash).collect();
        assert!(hashes.contains(&hash64("h1:3")));
        assert!(hashes.contains(&hash64("h1:4")));
        assert_eq!(balance_of(&balances, "7").await, Some(12));
    }

    #[tokio::test]
    async fn test_merge_and_strict_send_use_result_amounts() {
        let network = Arc::new(MockNetwork::new());

        let mut merge = details(
            "merge",
            "1",
            account(2),
            envelope_xdr(
                account(2),
                text("bob"),
                vec![OperationBody::AccountMerge(muxed_account(account(1)))],
            ),
        );
        merge.result_xdr = single_merge_result_xdr(9_000);
        network.push_history(merge);

        let mut send = details(
            "send",
            "2",
            account(3),
            envelope_xdr(
                account(3),
                text("bob"),
                vec![OperationBody::PathPaymentStrictSend(PathPaymentStrictSendOp {
                    send_asset: Asset::Native,
                    send_amount: 500,
                    destination: muxed_account(account(1)),
                    dest_asset: Asset::Native,
                    dest_min: 1,
                    path: VecM::default(),
                })],
            ),
        );
        send.result_xdr = strict_send_result_xdr(account(1), 450);
        network.push_history(send);

        let balances = Arc::new(CountingBalances::new());
        scanner(network, balances.clone())
            .update_wallet_balances()
            .await
            .unwrap();

        assert_eq!(balance_of(&balances, "bob").await, Some(9_450));
    }

    #[tokio::test]
    async fn test_outgoing_and_failed_transactions_consume_cursor() {
        let network = Arc::new(MockNetwork::new());
        let out = envelope_xdr(
            account(1),
            text("alice"),
            vec![native_payment(account(1), 10)],
        );
        // Lowercase source still counts as the base
        let mut outgoing = details("out", "1", account(1), out);
        outgoing.source_account = outgoing.source_account.to_lowercase();
        network.push_history(outgoing);
        let mut failed = deposit("failed", "2", "alice", 10);
        failed.successful = false;
        network.push_history(failed);

        let balances = Arc::new(CountingBalances::new());
        let scanner = scanner(network.clone(), balances.clone());
        let report = scanner.update_wallet_balances().await.unwrap();
        assert_eq!(report.transactions, 2);
        assert_eq!(report.recorded, 0);
        assert_eq!(report.cursor.as_deref(), Some("2"));

        // Next run resumes after the cursor
        let report = scanner.update_wallet_balances().await.unwrap();
        assert_eq!(report.transactions, 0);
        assert_eq!(report.cursor.as_deref(), Some("2"));
        assert_eq!(network.history_count(), 2);
    }

    #[tokio::test]
    async fn test_replayed_window_records_nothing_twice() {
        let network = Arc::new(MockNetwork::new());
        network.push_history(deposit("h", "1", "carol", 300));
        let balances = Arc::new(CountingBalances::new());

        // Two scanners with separate cursors see the same window
        scanner(network.clone(), balances.clone())
            .update_wallet_balances()
            .await
            .unwrap();
        let report = scanner(network, balances.clone())
            .update_wallet_balances()
            .await
            .unwrap();

        assert_eq!(report.recorded, 0);
        assert_eq!(report.touched.len(), 1);
        assert_eq!(balance_of(&balances, "carol").await, Some(300));
    }

    #[tokio::test]
    async fn test_fee_bump_deposit_is_credited() {
        let network = Arc::new(MockNetwork::new());
        let bumped = fee_bump_xdr(
            account(5),
            account(2),
            text("alice"),
            vec![native_payment(account(1), 700)],
        );
        network.push_history(details("bumped", "1", account(2), bumped));
        network.push_history(deposit("plain", "2", "bob", 40));
        let balances = Arc::new(CountingBalances::new());

        let report = scanner(network, balances.clone())
            .update_wallet_balances()
            .await
            .unwrap();

        assert_eq!(report.recorded, 2);
        assert_eq!(report.cursor.as_deref(), Some("2"));
        assert_eq!(balance_of(&balances, "alice").await, Some(700));
        assert_eq!(balance_of(&balances, "bob").await, Some(40));
    }

    #[tokio::test]
    async fn test_soroban_operation_is_skipped_alone() {
        let network = Arc::new(MockNetwork::new());
        let xdr = envelope_xdr(
            account(2),
            text("alice"),
            vec![restore_footprint(), native_payment(account(1), 25)],
        );
        network.push_history(details("mixed", "1", account(2), xdr));
        let balances = Arc::new(CountingBalances::new());

        let report = scanner(network, balances.clone())
            .update_wallet_balances()
            .await
            .unwrap();

        assert_eq!(report.recorded, 1);
        let address = virtual_address(&base(), "alice");
        let ops = balances.inner.operations("XLM", &address).await;
        assert_eq!(ops[0].operation_hash, hash64("mixed:1"));
        assert_eq!(balance_of(&balances, "alice").await, Some(25));
    }

    #[tokio::test]
    async fn test_undecodable_envelope_is_skipped() {
        let network = Arc::new(MockNetwork::new());
        network.push_history(details("bad", "1", account(2), "!!".to_string()));
        network.push_history(deposit("good", "2", "bob", 90));
        let balances = Arc::new(CountingBalances::new());
        let scanner = scanner(network, balances.clone());

        let report = scanner.update_wallet_balances().await.unwrap();
        assert_eq!(report.transactions, 2);
        assert_eq!(report.recorded, 1);
        assert_eq!(report.cursor.as_deref(), Some("2"));
        assert!(scanner.last_error().await.is_none());
        assert_eq!(balance_of(&balances, "bob").await, Some(90));
    }
}
