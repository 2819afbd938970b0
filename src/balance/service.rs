//! Caller-facing facade over the derived balance ledger

use std::sync::Arc;

use super::memo::{is_valid_address, parse_virtual_address};
use super::scanner::{DepositScanner, ScanReport};
use crate::horizon::NetworkClient;
use crate::store::{AddressBalance, BalanceStore, Stores};
use crate::transaction::{GatewaySettings, JobError, TransactionError};

pub struct BalanceService {
    balances: Arc<dyn BalanceStore>,
    scanner: DepositScanner,
    settings: GatewaySettings,
}

impl BalanceService {
    pub fn new(
        network: Arc<dyn NetworkClient>,
        stores: &Stores,
        settings: GatewaySettings,
        scan_page_size: usize,
    ) -> Self {
        let scanner = DepositScanner::new(
            network,
            stores.balances.clone(),
            stores.scan_queue(),
            settings.deposit_base_address.clone(),
            settings.native_asset_id.clone(),
            scan_page_size,
        );
        Self {
            balances: stores.balances.clone(),
            scanner,
            settings,
        }
    }

    /// True for the shared address itself and for any of its sub-accounts
    pub fn is_deposit_base_address(&self, address: &str) -> bool {
        let (base, _) = parse_virtual_address(address);
        self.settings.is_deposit_base(base)
    }

    pub fn validate_address(&self, address: &str) -> bool {
        is_valid_address(address)
    }

    /// Derived balance of a virtual address; zero when nothing was recorded
    pub async fn get_address_balance(
        &self,
        address: &str,
    ) -> Result<AddressBalance, TransactionError> {
        if !is_valid_address(address) {
            return Err(TransactionError::InvalidAddress(address.to_string()));
        }
        let asset_id = &self.settings.native_asset_id;
        Ok(self
            .balances
            .get(asset_id, address)
            .await?
            .unwrap_or_else(|| AddressBalance::empty(asset_id, address)))
    }

    pub async fn update_wallet_balances(&self) -> Result<ScanReport, JobError> {
        self.scanner.update_wallet_balances().await
    }

    pub async fn last_job_error(&self) -> Option<String> {
        self.scanner.last_error().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::memo::virtual_address;
    use crate::horizon::mock::MockNetwork;
    use crate::store::BalanceOperation;
    use crate::xdr::strkey;
    use std::time::Duration;

    fn service(stores: &Stores) -> BalanceService {
        let settings = GatewaySettings {
            deposit_base_address: strkey::encode_account_id(&[1u8; 32]),
            native_asset_id: "XLM".to_string(),
            operation_fee: 100,
            transaction_expiration: Duration::from_secs(60),
        };
        BalanceService::new(Arc::new(MockNetwork::new()), stores, settings, 10)
    }

    #[tokio::test]
    async fn test_deposit_base_recognised_with_extension() {
        let stores = Stores::in_memory();
        let svc = service(&stores);
        let base = strkey::encode_account_id(&[1u8; 32]);
        assert!(svc.is_deposit_base_address(&base));
        assert!(svc.is_deposit_base_address(&virtual_address(&base, "x")));
        assert!(!svc.is_deposit_base_address(&strkey::encode_account_id(&[2u8; 32])));
    }

    #[tokio::test]
    async fn test_balance_of_unknown_address_is_zero() {
        let stores = Stores::in_memory();
        let svc = service(&stores);
        let addr = virtual_address(&strkey::encode_account_id(&[1u8; 32]), "nobody");
        let balance = svc.get_address_balance(&addr).await.unwrap();
        assert_eq!(balance.balance, 0);
        assert_eq!(balance.address, addr);

        assert!(matches!(
            svc.get_address_balance("bogus").await,
            Err(TransactionError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_balance_reads_derived_row() {
        let stores = Stores::in_memory();
        let svc = service(&stores);
        let addr = virtual_address(&strkey::encode_account_id(&[1u8; 32]), "dave");
        stores
            .balances
            .record_operation(&BalanceOperation {
                asset_id: "XLM".to_string(),
                address: addr.clone(),
                ledger: 10,
                operation_hash: 5,
                tx_hash: "t".to_string(),
                amount: 250,
            })
            .await
            .unwrap();
        stores
            .balances
            .refresh_balance(&crate::store::BalanceKey::new("XLM", &addr))
            .await
            .unwrap();
        assert_eq!(svc.get_address_balance(&addr).await.unwrap().balance, 250);
    }
}
