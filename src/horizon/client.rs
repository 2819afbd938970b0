//! Horizon REST implementation of [`NetworkClient`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::error::{HorizonError, SubmitRejection};
use super::{HistoryOrder, LedgerInfo, NetworkClient, TransactionDetails, TxLookup};

#[derive(Deserialize)]
struct Page<T> {
    #[serde(rename = "_embedded")]
    embedded: Embedded<T>,
}

#[derive(Deserialize)]
struct Embedded<T> {
    records: Vec<T>,
}

#[derive(Deserialize)]
struct LedgerRecord {
    sequence: i64,
    base_fee_in_stroops: i64,
    base_reserve_in_stroops: i64,
}

#[derive(Deserialize)]
struct SubmitResponse {
    hash: String,
}

#[derive(Deserialize, Default)]
struct Problem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extras: Option<ProblemExtras>,
}

#[derive(Deserialize)]
struct ProblemExtras {
    result_codes: Option<ResultCodes>,
}

#[derive(Deserialize)]
struct ResultCodes {
    transaction: String,
    #[serde(default)]
    operations: Vec<String>,
}

/// Client for a Horizon server
pub struct HorizonClient {
    base_url: String,
    http: reqwest::Client,
}

impl HorizonClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HorizonError> {
        info!("Initializing Horizon client at {}", base_url);
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path`; `Ok(None)` on 404
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, HorizonError> {
        let response = self.http.get(self.url(path)).query(query).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HorizonError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(Some(response.json().await?))
    }
}

#[async_trait]
impl NetworkClient for HorizonClient {
    async fn latest_ledger(&self) -> Result<LedgerInfo, HorizonError> {
        let query = [("order", "desc".to_string()), ("limit", "1".to_string())];
        let page: Page<LedgerRecord> = self
            .get_json("/ledgers", &query)
            .await?
            .ok_or_else(|| HorizonError::Decode("ledgers endpoint not found".to_string()))?;
        let ledger = page
            .embedded
            .records
            .into_iter()
            .next()
            .ok_or_else(|| HorizonError::Decode("no ledgers returned".to_string()))?;
        Ok(LedgerInfo {
            sequence: ledger.sequence,
            base_fee: ledger.base_fee_in_stroops,
            base_reserve: ledger.base_reserve_in_stroops,
        })
    }

    async fn account_exists(&self, address: &str) -> Result<bool, HorizonError> {
        let account: Option<serde_json::Value> = self
            .get_json(&format!("/accounts/{}", address), &[])
            .await?;
        Ok(account.is_some())
    }

    async fn submit(&self, envelope_base64: &str) -> Result<String, HorizonError> {
        let response = self
            .http
            .post(self.url("/transactions"))
            .form(&[("tx", envelope_base64)])
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            let accepted: SubmitResponse = response.json().await?;
            debug!(hash = %accepted.hash, "Transaction accepted by Horizon");
            return Ok(accepted.hash);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST {
            let problem: Problem = serde_json::from_str(&body).unwrap_or_default();
            if let Some(codes) = problem.extras.and_then(|e| e.result_codes) {
                let rejection = SubmitRejection {
                    transaction_code: codes.transaction,
                    operation_codes: codes.operations,
                };
                warn!(%rejection, "Transaction rejected by Horizon");
                return Err(HorizonError::Rejected(rejection));
            }
            warn!(title = %problem.title, "Submission failed without result codes");
        }
        Err(HorizonError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn transaction_by_hash(&self, hash: &str) -> Result<TxLookup, HorizonError> {
        let details: Option<TransactionDetails> = self
            .get_json(&format!("/transactions/{}", hash), &[])
            .await?;
        Ok(match details {
            Some(details) => TxLookup::Found(Box::new(details)),
            None => TxLookup::NotFoundYet,
        })
    }

    async fn history_for(
        &self,
        address: &str,
        order: HistoryOrder,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TransactionDetails>, HorizonError> {
        let mut query = vec![
            ("order", order.as_str().to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        let page: Option<Page<TransactionDetails>> = self
            .get_json(&format!("/accounts/{}/transactions", address), &query)
            .await?;
        Ok(page.map(|p| p.embedded.records).unwrap_or_default())
    }
}
