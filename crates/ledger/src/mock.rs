use super::{HistoryFetchError, InvoiceFilter, LedgerError, LedgerGateway, TransactionHistory, TransactionReceipt};
use async_trait::async_trait;
use chrono::Utc;
use inv_vault_core::codec::encode_hex;
use inv_vault_core::reconcile::same_address;
use inv_vault_core::{Bytes32, IntegrityHash, LedgerInvoiceRecord, RawTx, ReceiverKeyId};
use rand::RngCore;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory ledger with the vault contract's semantics. Every submission is
/// recorded as sent by `sender`.
pub struct MockLedger {
    sender: String,
    records: Mutex<Vec<LedgerInvoiceRecord>>,
    rejecting: AtomicBool,
    failing_reads: AtomicU32,
    submissions: AtomicUsize,
}

impl MockLedger {
    pub fn new(sender: &str) -> Arc<Self> {
        Arc::new(Self {
            sender: sender.to_string(),
            records: Mutex::new(Vec::new()),
            rejecting: AtomicBool::new(false),
            failing_reads: AtomicU32::new(0),
            submissions: AtomicUsize::new(0),
        })
    }

    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// The next `n` reads fail with [`LedgerError::Read`].
    pub fn fail_next_reads(&self, n: u32) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    /// Number of submission attempts, including rejected ones.
    pub fn submission_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<LedgerInvoiceRecord> {
        lock(&self.records).clone()
    }

    /// Inserts a record as if another party had submitted it.
    pub fn insert(&self, record: LedgerInvoiceRecord) {
        lock(&self.records).push(record);
    }
}

fn random_bytes32() -> Bytes32 {
    let mut b = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut b);
    Bytes32(b)
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn submit_invoice(
        &self,
        receiver_key: &ReceiverKeyId,
        ciphertext: &[u8],
        integrity_hash: &IntegrityHash,
    ) -> Result<TransactionReceipt, LedgerError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(LedgerError::SubmissionRejected("execution reverted".into()));
        }

        let record = LedgerInvoiceRecord {
            id: random_bytes32(),
            sender: self.sender.clone(),
            receiver_key: *receiver_key,
            encrypted_data: ciphertext.to_vec(),
            integrity_hash: *integrity_hash,
            created_at: Utc::now().timestamp().max(0) as u64,
        };
        let receipt = TransactionReceipt {
            tx_hash: encode_hex(random_bytes32().as_bytes()),
            invoice_id: record.id,
        };
        lock(&self.records).push(record);
        tracing::debug!(tx_hash = %receipt.tx_hash, "mock ledger accepted invoice");
        Ok(receipt)
    }

    async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
        start: u64,
        count: u64,
    ) -> Result<Vec<LedgerInvoiceRecord>, LedgerError> {
        let pending_failures = self.failing_reads.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.failing_reads.store(pending_failures - 1, Ordering::SeqCst);
            return Err(LedgerError::Read("node unavailable".into()));
        }

        let records = lock(&self.records);
        Ok(records
            .iter()
            .filter(|r| match filter {
                InvoiceFilter::Sender(sender) => same_address(&r.sender, sender),
                InvoiceFilter::Receiver(key) => r.receiver_key == *key,
            })
            .skip(start as usize)
            .take(count as usize)
            .cloned()
            .collect())
    }
}

/// In-memory transaction history, switchable to "unavailable".
pub struct MockHistory {
    txs: Mutex<Vec<RawTx>>,
    available: AtomicBool,
}

impl MockHistory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            txs: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        })
    }

    pub fn push(&self, tx: RawTx) {
        lock(&self.txs).push(tx);
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransactionHistory for MockHistory {
    async fn fetch(&self, address: &str) -> Result<Vec<RawTx>, HistoryFetchError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(HistoryFetchError("explorer unreachable".into()));
        }
        Ok(lock(&self.txs)
            .iter()
            .filter(|tx| {
                same_address(&tx.from, address)
                    || tx.to.as_deref().is_some_and(|to| same_address(to, address))
            })
            .cloned()
            .collect())
    }
}
