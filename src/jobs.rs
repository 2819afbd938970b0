//! Periodic job runner
//!
//! One tokio task per job. A task never overlaps with itself: the next run
//! starts `interval` after the previous one finished.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::balance::BalanceService;
use crate::config::JobsConfig;
use crate::transaction::TransactionService;

#[derive(Debug, Clone)]
pub struct JobSchedule {
    pub reconcile_interval: Duration,
    pub reconcile_batch_size: usize,
    pub scan_interval: Duration,
}

impl From<&JobsConfig> for JobSchedule {
    fn from(config: &JobsConfig) -> Self {
        Self {
            reconcile_interval: Duration::from_secs(config.reconcile_interval_secs),
            reconcile_batch_size: config.reconcile_batch_size,
            scan_interval: Duration::from_secs(config.scan_interval_secs),
        }
    }
}

pub struct JobRunner {
    transactions: Arc<TransactionService>,
    balances: Arc<BalanceService>,
    schedule: JobSchedule,
}

impl JobRunner {
    pub fn new(
        transactions: Arc<TransactionService>,
        balances: Arc<BalanceService>,
        schedule: JobSchedule,
    ) -> Self {
        Self {
            transactions,
            balances,
            schedule,
        }
    }

    /// Spawn both job loops
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        info!(
            reconcile_interval_secs = self.schedule.reconcile_interval.as_secs(),
            scan_interval_secs = self.schedule.scan_interval.as_secs(),
            "Starting jobs"
        );

        let transactions = self.transactions.clone();
        let batch_size = self.schedule.reconcile_batch_size;
        let reconcile_interval = self.schedule.reconcile_interval;
        let reconcile = tokio::spawn(async move {
            loop {
                reconcile_tick(&transactions, batch_size).await;
                tokio::time::sleep(reconcile_interval).await;
            }
        });

        let balances = self.balances.clone();
        let scan_interval = self.schedule.scan_interval;
        let scan = tokio::spawn(async move {
            loop {
                scan_tick(&balances).await;
                tokio::time::sleep(scan_interval).await;
            }
        });

        vec![reconcile, scan]
    }
}

/// One reconciliation run; returns the processed count, 0 on failure
pub async fn reconcile_tick(transactions: &TransactionService, batch_size: usize) -> usize {
    match transactions.reconcile_in_progress(batch_size).await {
        Ok(processed) => {
            if let Some(last) = transactions.last_job_error().await {
                error!(error = %last, "Reconciliation finished with errors");
            }
            debug!(processed, "Reconciliation tick");
            processed
        }
        Err(e) => {
            error!(job = e.job, processed = e.processed, error = %e.source, "Reconciliation tick failed");
            0
        }
    }
}

/// One deposit scan; returns the number of transactions read, 0 on failure
pub async fn scan_tick(balances: &BalanceService) -> usize {
    match balances.update_wallet_balances().await {
        Ok(report) => {
            debug!(transactions = report.transactions, "Deposit scan tick");
            report.transactions
        }
        Err(e) => {
            error!(job = e.job, processed = e.processed, error = %e.source, "Deposit scan tick failed");
            0
        }
    }
}
