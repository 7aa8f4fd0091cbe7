mod audit;
mod error;
mod inbox;
mod issue;
pub mod reconcile;
pub mod session;
pub mod store;

pub use audit::{AuditEvent, AuditLog};
pub use error::VaultError;
pub use inbox::PaymentRequest;
pub use issue::{prepare_invoice, prepare_invoice_with, IssuedInvoice, PreparedInvoice};
pub use reconcile::{BalanceState, InvoiceBalance, ReconciliationReport};
pub use session::Session;
pub use store::{InvoiceLog, StoreError};

use ledger::LedgerGateway;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_PAGE_SIZE: u64 = 20;
const DEFAULT_READ_RETRIES: u32 = 3;

/// Everything the issuing and receiving flows share: the local invoice log,
/// the ledger gateway and the audit trail.
#[derive(Clone)]
pub struct Vault {
    log: InvoiceLog,
    ledger: Arc<dyn LedgerGateway + 'static>,
    audit: AuditLog,
    page_size: u64,
    read_retries: u32,
}

impl Vault {
    pub fn new(log: InvoiceLog, ledger: Arc<dyn LedgerGateway + 'static>, audit: AuditLog) -> Self {
        Self {
            log,
            ledger,
            audit,
            page_size: DEFAULT_PAGE_SIZE,
            read_retries: DEFAULT_READ_RETRIES,
        }
    }

    pub fn open(
        data_dir: &Path,
        audit_path: impl Into<PathBuf>,
        ledger: Arc<dyn LedgerGateway + 'static>,
    ) -> Result<Self, VaultError> {
        let log = InvoiceLog::open(data_dir)?;
        Ok(Self::new(log, ledger, AuditLog::new(audit_path)))
    }

    pub fn with_paging(mut self, page_size: u64, read_retries: u32) -> Self {
        self.page_size = page_size.max(1);
        self.read_retries = read_retries.max(1);
        self
    }

    pub fn log(&self) -> &InvoiceLog {
        &self.log
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }
}
