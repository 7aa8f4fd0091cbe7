//! Transaction history from an Etherscan-compatible block explorer API
//! (`module=account&action=txlist`).

use super::{HistoryFetchError, TransactionHistory};
use async_trait::async_trait;
use inv_vault_core::RawTx;
use serde::Deserialize;
use std::sync::Arc;

const NO_TRANSACTIONS: &str = "No transactions found";

/// Transactions requested per `txlist` page.
pub const DEFAULT_PAGE_SIZE: u32 = 1_000;
/// Etherscan-compatible APIs serve at most this many rows (`page * offset`)
/// for one query.
pub const RESULT_WINDOW: u32 = 10_000;

#[derive(Clone)]
pub struct ExplorerClient {
    pub base_url: String,
    api_key: Option<String>,
    page_size: u32,
    result_window: u32,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TxListResponse {
    status: String,
    message: String,
    /// A list of transactions on success, an error string otherwise.
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExplorerTx {
    hash: String,
    from: String,
    #[serde(default)]
    to: String,
    value: String,
    #[serde(default)]
    input: String,
    time_stamp: String,
    #[serde(default)]
    is_error: String,
}

impl ExplorerClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Arc<Self> {
        Self::with_limits(base_url, api_key, DEFAULT_PAGE_SIZE, RESULT_WINDOW)
    }

    pub fn with_limits(base_url: String, api_key: Option<String>, page_size: u32, result_window: u32) -> Arc<Self> {
        let page_size = page_size.max(1);
        Arc::new(Self {
            base_url,
            api_key,
            page_size,
            result_window: result_window.max(page_size),
            http_client: reqwest::Client::new(),
        })
    }

    async fn fetch_page(&self, address: &str, page: u32) -> Result<Vec<RawTx>, HistoryFetchError> {
        let page = page.to_string();
        let offset = self.page_size.to_string();
        // No endblock: the explorer then reads up to the chain head.
        let mut query = vec![
            ("module", "account"),
            ("action", "txlist"),
            ("address", address),
            ("startblock", "0"),
            ("page", page.as_str()),
            ("offset", offset.as_str()),
            ("sort", "asc"),
        ];
        if let Some(key) = self.api_key.as_deref() {
            query.push(("apikey", key));
        }

        let resp = self
            .http_client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| HistoryFetchError(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(HistoryFetchError(format!("explorer returned {status} - {body}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| HistoryFetchError(format!("failed to read response: {e}")))?;
        parse_txlist(&body)
    }
}

#[async_trait]
impl TransactionHistory for ExplorerClient {
    /// Walks `txlist` pages until a short page comes back. A history that
    /// fills the explorer's whole result window is reported as an error
    /// rather than returned truncated.
    async fn fetch(&self, address: &str) -> Result<Vec<RawTx>, HistoryFetchError> {
        let mut txs = Vec::new();
        let mut page = 1u32;
        loop {
            let batch = self.fetch_page(address, page).await?;
            let len = batch.len();
            txs.extend(batch);
            if len < self.page_size as usize {
                break;
            }
            if page.saturating_mul(self.page_size) >= self.result_window {
                tracing::error!(%address, count = txs.len(), "explorer result window exhausted");
                return Err(HistoryFetchError(format!(
                    "history of {address} exceeds the explorer's {} transaction window",
                    self.result_window
                )));
            }
            page += 1;
        }
        tracing::info!(%address, count = txs.len(), pages = page, "fetched transaction history");
        Ok(txs)
    }
}

/// Parses a `txlist` response body. "No transactions found" is an empty
/// history; any other non-OK status is an error.
pub fn parse_txlist(body: &str) -> Result<Vec<RawTx>, HistoryFetchError> {
    let resp: TxListResponse = serde_json::from_str(body)
        .map_err(|e| HistoryFetchError(format!("malformed explorer response: {e}")))?;

    if resp.status != "1" {
        if resp.message.starts_with(NO_TRANSACTIONS) {
            return Ok(Vec::new());
        }
        let detail = resp.result.as_str().unwrap_or_default();
        return Err(HistoryFetchError(format!("{} {}", resp.message, detail).trim().to_string()));
    }

    let raw: Vec<ExplorerTx> = serde_json::from_value(resp.result)
        .map_err(|e| HistoryFetchError(format!("malformed transaction list: {e}")))?;
    raw.into_iter().map(into_raw_tx).collect()
}

fn into_raw_tx(tx: ExplorerTx) -> Result<RawTx, HistoryFetchError> {
    let value = parse_quantity(&tx.value)
        .ok_or_else(|| HistoryFetchError(format!("bad value '{}' in {}", tx.value, tx.hash)))?;
    let timestamp = tx
        .time_stamp
        .parse()
        .map_err(|_| HistoryFetchError(format!("bad timestamp '{}' in {}", tx.time_stamp, tx.hash)))?;
    Ok(RawTx {
        hash: tx.hash,
        from: tx.from,
        to: Some(tx.to).filter(|to| !to.is_empty()),
        value,
        input: tx.input,
        timestamp,
        is_error: tx.is_error == "1",
    })
}

/// Decimal or `0x` hex quantity.
fn parse_quantity(s: &str) -> Option<u128> {
    let s = s.trim();
    match s.strip_prefix("0x") {
        Some(hex) if hex.is_empty() => Some(0),
        Some(hex) => u128::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}
