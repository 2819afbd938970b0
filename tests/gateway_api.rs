//! Public API behaviour over in-memory stores and a scripted network

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use stellar_gateway::balance::{parse_virtual_address, usable_memo, virtual_address};
use stellar_gateway::horizon::{
    HistoryOrder, HorizonError, LedgerInfo, NetworkClient, TransactionDetails, TxLookup,
};
use stellar_gateway::core_types::hash64;
use stellar_gateway::store::{
    AddressBalance, BalanceKey, BalanceOperation, BalanceStore, BroadcastState,
};
use stellar_gateway::transaction::NoopCheckpoint;
use stellar_gateway::xdr::{self, OperationBody, TransactionEnvelope, TxView, strkey};
use stellar_gateway::{
    BalanceService, GatewaySettings, OperationId, Stores, TransactionService,
};

const SIGNED_ENVELOPE: &str = "AAAAAAdlB/ts6RCzHAoU/FjtFBGyu66ibVPVoQuJh9CPgAueAAABkAClxo0AAAABAAAAAAAAAAEAAAAcc3RlbGwwNV81Yjk5MmUwZDAzOWI5NS4wMjQzNwAAAAQAAAABAAAAAIJL979+ksErfRfiXWlzB+rQZdH2j4pZdur2OwL02RfxAAAAAQAAAAAr5Jq3XoimudpnjzcQbriV22rXhttVbubwIx31oPeU1AAAAAFGWU9VAAAAAHC5SBVcvtgAfFcLHrI8qouvob0F0uxHhlP9otowVtJvAAAAAAAIi4AAAAABAAAAAIJL979+ksErfRfiXWlzB+rQZdH2j4pZdur2OwL02RfxAAAAAQAAAABHY0WsIeNz8/GVG6ienwp48nk2H0ec8UagsCoFsnd+0wAAAAFGWU9VAAAAAHC5SBVcvtgAfFcLHrI8qouvob0F0uxHhlP9otowVtJvAAAAAAAAnEAAAAABAAAAAIJL979+ksErfRfiXWlzB+rQZdH2j4pZdur2OwL02RfxAAAAAQAAAAAW1fr/5UFFVCSXQSIaRg+Bhgg6pYuTcsIiB0a+PA7cNAAAAAFGWU9VAAAAAHC5SBVcvtgAfFcLHrI8qouvob0F0uxHhlP9otowVtJvAAAAAAAB1MAAAAABAAAAAIJL979+ksErfRfiXWlzB+rQZdH2j4pZdur2OwL02RfxAAAAAQAAAAAW1fr/5UFFVCSXQSIaRg+Bhgg6pYuTcsIiB0a+PA7cNAAAAAFGWU9VAAAAAHC5SBVcvtgAfFcLHrI8qouvob0F0uxHhlP9otowVtJvAAAAAAABOIAAAAAAAAAAAvTZF/EAAABAX/dmfgcuMq0sTlNhvq4RIFtSNRe+RdNsmantkMWKqcfWjTWNO8YSW26ctKens8g9EIiD0RJZUr8oGBAoILCrBY+AC54AAABAEoGfpIrRlugsk0F5Br3Q7tInzScxEDgoYOKIKoBy3f3nWemHz6puW48rjPlFMs+ovx7XwhZnOS27iloMkVzeDA==";

/// Network that accepts every submission and confirms on demand
#[derive(Default)]
struct ScriptedNetwork {
    confirmed: Mutex<HashMap<String, TransactionDetails>>,
    history: Mutex<Vec<TransactionDetails>>,
}

#[async_trait]
impl NetworkClient for ScriptedNetwork {
    async fn latest_ledger(&self) -> Result<LedgerInfo, HorizonError> {
        Ok(LedgerInfo {
            sequence: 2_000,
            base_fee: 100,
            base_reserve: 5_000_000,
        })
    }

    async fn account_exists(&self, _address: &str) -> Result<bool, HorizonError> {
        Ok(true)
    }

    async fn submit(&self, _envelope_base64: &str) -> Result<String, HorizonError> {
        Ok("feedbeef".to_string())
    }

    async fn transaction_by_hash(&self, hash: &str) -> Result<TxLookup, HorizonError> {
        Ok(match self.confirmed.lock().unwrap().get(hash) {
            Some(details) => TxLookup::Found(Box::new(details.clone())),
            None => TxLookup::NotFoundYet,
        })
    }

    async fn history_for(
        &self,
        _address: &str,
        _order: HistoryOrder,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TransactionDetails>, HorizonError> {
        let history = self.history.lock().unwrap().clone();
        let start = cursor
            .and_then(|c| history.iter().position(|t| t.paging_token == c).map(|i| i + 1))
            .unwrap_or(0);
        Ok(history.into_iter().skip(start).take(limit).collect())
    }
}

fn settings() -> GatewaySettings {
    GatewaySettings {
        deposit_base_address: strkey::encode_account_id(&[1u8; 32]),
        native_asset_id: "XLM".to_string(),
        operation_fee: 100,
        transaction_expiration: Duration::from_secs(600),
    }
}

#[test]
fn signed_envelope_decodes() {
    assert!(xdr::is_well_formed(SIGNED_ENVELOPE));
    let envelope = xdr::decode_envelope(SIGNED_ENVELOPE).unwrap();
    let TransactionEnvelope::TxV0(legacy) = &envelope else {
        panic!("expected a legacy envelope");
    };
    assert_eq!(legacy.signatures.len(), 2);

    let tx = TxView::of(&envelope);
    assert_eq!(tx.operations.len(), 4);
    assert!(!tx.fee_bump);
    assert!(matches!(
        tx.first_operation().unwrap().body,
        OperationBody::Payment(_)
    ));
    assert_eq!(
        usable_memo(tx.memo).as_deref(),
        Some("stell05_5b992e0d039b95.02437")
    );
}

#[test]
fn memo_routing() {
    let base = settings().deposit_base_address;
    assert_eq!(usable_memo(&xdr::text_memo("http://stellar-win.me/").unwrap()), None);
    let address = virtual_address(&base, "r6mzsfwnbkgwtc8cktx4i5nw8e");
    assert_eq!(
        parse_virtual_address(&address),
        (base.as_str(), Some("r6mzsfwnbkgwtc8cktx4i5nw8e"))
    );
}

#[tokio::test]
async fn balance_operations_are_idempotent() {
    let stores = Stores::in_memory();
    let op = BalanceOperation {
        asset_id: "XLM".to_string(),
        address: "GBASE$memo".to_string(),
        ledger: 100,
        operation_hash: hash64("tx:0"),
        tx_hash: "tx".to_string(),
        amount: 42,
    };
    assert!(stores.balances.record_operation(&op).await.unwrap());
    assert!(!stores.balances.record_operation(&op).await.unwrap());
    stores
        .balances
        .refresh_balances(&[BalanceKey::new("XLM", "GBASE$memo")])
        .await
        .unwrap();
    let row = stores.balances.get("XLM", "GBASE$memo").await.unwrap().unwrap();
    assert_eq!(row.balance, 42);
}

#[tokio::test]
async fn build_broadcast_reconcile_and_scan() {
    let network = Arc::new(ScriptedNetwork::default());
    let stores = Stores::in_memory();
    let service =
        TransactionService::new(network.clone(), &stores, Arc::new(NoopCheckpoint), settings());
    let balances = BalanceService::new(network.clone(), &stores, settings(), 50);

    let from = AddressBalance {
        asset_id: "XLM".to_string(),
        address: strkey::encode_account_id(&[2u8; 32]),
        balance: 100_000_000,
        minimum_reserve: 10_000_000,
        sequence_number: 11,
        ledger: 0,
    };
    let base = settings().deposit_base_address;
    let id = OperationId::new();
    let built = service
        .build(id, &from, &base, Some("client-7"), 25_000_000)
        .await
        .unwrap();
    service.broadcast(id, &built).await.unwrap();
    assert_eq!(
        service.get_broadcast(id).await.unwrap().state,
        BroadcastState::InProgress
    );

    let details = TransactionDetails {
        hash: "feedbeef".to_string(),
        ledger: 2_001,
        created_at: Utc::now(),
        fee_charged: 100,
        source_account: from.address.clone(),
        envelope_xdr: built,
        result_xdr: String::new(),
        paging_token: "p1".to_string(),
        successful: true,
    };
    network
        .confirmed
        .lock()
        .unwrap()
        .insert("feedbeef".to_string(), details.clone());
    network.history.lock().unwrap().push(details);

    assert_eq!(service.reconcile_in_progress(10).await.unwrap(), 1);
    let done = service.get_broadcast(id).await.unwrap();
    assert_eq!(done.state, BroadcastState::Completed);
    assert_eq!(done.ledger, Some(20_010));

    // The same payment lands on the client's sub-account
    let report = balances.update_wallet_balances().await.unwrap();
    assert_eq!(report.recorded, 1);
    let credited = balances
        .get_address_balance(&virtual_address(&base, "client-7"))
        .await
        .unwrap();
    assert_eq!(credited.balance, 25_000_000);
}
