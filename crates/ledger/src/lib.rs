use async_trait::async_trait;
use inv_vault_core::{Bytes32, IntegrityHash, LedgerInvoiceRecord, RawTx, ReceiverKeyId};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tokio::time::{sleep, Duration};

const READ_RETRY_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),
    #[error("ledger read failed: {0}")]
    Read(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transaction history unavailable: {0}")]
pub struct HistoryFetchError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceFilter {
    /// Invoices created by this sender address.
    Sender(String),
    Receiver(ReceiverKeyId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: String,
    pub invoice_id: Bytes32,
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Writes `createInvoice`. Callers must not retry on failure; a second
    /// attempt may create a duplicate invoice.
    async fn submit_invoice(
        &self,
        receiver_key: &ReceiverKeyId,
        ciphertext: &[u8],
        integrity_hash: &IntegrityHash,
    ) -> Result<TransactionReceipt, LedgerError>;

    /// One page of records in ledger insertion order.
    async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
        start: u64,
        count: u64,
    ) -> Result<Vec<LedgerInvoiceRecord>, LedgerError>;
}

/// Source of the transaction history of an address.
#[async_trait]
pub trait TransactionHistory: Send + Sync {
    async fn fetch(&self, address: &str) -> Result<Vec<RawTx>, HistoryFetchError>;
}

/// Retries a read up to `attempts` times. Only for idempotent calls.
pub async fn retry_read<T, F, Fut>(attempts: u32, mut op: F) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < attempts => {
                tracing::warn!(attempt, error = %e, "ledger read failed, retrying");
                sleep(READ_RETRY_DELAY).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Walks `start` forward one page at a time until a short page comes back.
pub async fn list_all_invoices(
    gateway: &dyn LedgerGateway,
    filter: &InvoiceFilter,
    page_size: u64,
    read_retries: u32,
) -> Result<Vec<LedgerInvoiceRecord>, LedgerError> {
    let page_size = page_size.max(1);
    let mut out = Vec::new();
    let mut start = 0;
    loop {
        let page = retry_read(read_retries, move || gateway.list_invoices(filter, start, page_size)).await?;
        let len = page.len() as u64;
        out.extend(page);
        if len < page_size {
            break;
        }
        start += len;
    }
    tracing::debug!(count = out.len(), ?filter, "listed ledger invoices");
    Ok(out)
}

pub mod explorer;
pub mod mock;
