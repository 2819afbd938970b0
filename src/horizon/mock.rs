//! In-process network double for tests

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

pub struct MockNetwork {
    ledger: Mutex<LedgerInfo>,
    accounts: Mutex<HashSet<String>>,
    /// Confirmed transactions by hash
    transactions: Mutex<HashMap<String, TransactionDetails>>,
    /// Ascending history served by `history_for`
    history: Mutex<Vec<TransactionDetails>>,
    submitted: Mutex<Vec<String>>,
    /// Hash returned by the next successful `submit`
    next_hash: Mutex<String>,
    submit_count: AtomicUsize,
    lookup_count: AtomicUsize,
    history_count: AtomicUsize,
    reject_with: Mutex<Option<SubmitRejection>>,
    fail_lookup: Mutex<bool>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self {
            ledger: Mutex::new(LedgerInfo {
                sequence: 1000,
                base_fee: 100,
                base_reserve: 5_000_000,
            }),
            accounts: Mutex::new(HashSet::new()),
            transactions: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            next_hash: Mutex::new("mock-hash".to_string()),
            submit_count: AtomicUsize::new(0),
            lookup_count: AtomicUsize::new(0),
            history_count: AtomicUsize::new(0),
            reject_with: Mutex::new(None),
            fail_lookup: Mutex::new(false),
        }
    }

    pub fn set_latest_ledger(&self, sequence: i64) {
        self.ledger.lock().unwrap().sequence = sequence;
    }

    pub fn add_account(&self, address: &str) {
        self.accounts.lock().unwrap().insert(address.to_string());
    }

    pub fn set_next_hash(&self, hash: &str) {
        *self.next_hash.lock().unwrap() = hash.to_string();
    }

    pub fn set_reject_with(&self, rejection: Option<SubmitRejection>) {
        *self.reject_with.lock().unwrap() = rejection;
    }

    pub fn set_fail_lookup(&self, fail: bool) {
        *self.fail_lookup.lock().unwrap() = fail;
    }

    pub fn confirm(&self, details: TransactionDetails) {
        self.transactions
            .lock()
            .unwrap()
            .insert(details.hash.clone(), details);
    }

    /// Serve `details` for lookups of `hash`, whatever hash the details carry
    pub fn confirm_as(&self, hash: &str, details: TransactionDetails) {
        self.transactions
            .lock()
            .unwrap()
            .insert(hash.to_string(), details);
    }

    pub fn push_history(&self, details: TransactionDetails) {
        self.history.lock().unwrap().push(details);
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submit_count(&self) -> usize {
        self.submit_count.load(Ordering::SeqCst)
    }

    pub fn lookup_count(&self) -> usize {
        self.lookup_count.load(Ordering::SeqCst)
    }

    pub fn history_count(&self) -> usize {
        self.history_count.load(Ordering::SeqCst)
    }
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkClient for MockNetwork {
    async fn latest_ledger(&self) -> Result<LedgerInfo, HorizonError> {
        Ok(*self.ledger.lock().unwrap())
    }

    async fn account_exists(&self, address: &str) -> Result<bool, HorizonError> {
        Ok(self.accounts.lock().unwrap().contains(address))
    }

    async fn submit(&self, envelope_base64: &str) -> Result<String, HorizonError> {
        self.submit_count.fetch_add(1, Ordering::SeqCst);
        if let Some(rejection) = self.reject_with.lock().unwrap().clone() {
            return Err(HorizonError::Rejected(rejection));
        }
        self.submitted
            .lock()
            .unwrap()
            .push(envelope_base64.to_string());
        Ok(self.next_hash.lock().unwrap().clone())
    }

    async fn transaction_by_hash(&self, hash: &str) -> Result<TxLookup, HorizonError> {
        self.lookup_count.fetch_add(1, Ordering::SeqCst);
        if *self.fail_lookup.lock().unwrap() {
            return Err(HorizonError::Status {
                status: 503,
                body: "mock outage".to_string(),
            });
        }
        Ok(match self.transactions.lock().unwrap().get(hash) {
            Some(details) => TxLookup::Found(Box::new(details.clone())),
            None => TxLookup::NotFoundYet,
        })
    }

    async fn history_for(
        &self,
        _address: &str,
        order: HistoryOrder,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TransactionDetails>, HorizonError> {
        self.history_count.fetch_add(1, Ordering::SeqCst);
        let mut history = self.history.lock().unwrap().clone();
        if order == HistoryOrder::Desc {
            history.reverse();
        }
        let start = match cursor {
            Some(cursor) => history
                .iter()
                .position(|t| t.paging_token == cursor)
                .map(|i| i + 1)
                .unwrap_or(0),
            None => 0,
        };
        Ok(history.into_iter().skip(start).take(limit).collect())
    }
}
