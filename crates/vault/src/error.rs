use crate::store::StoreError;
use envelope::{DecryptError, EnvelopeError};
use inv_vault_core::parsing::SchemaError;
use inv_vault_core::{Bytes32, DecodeError, LocalInvoiceEntry};
use ledger::{HistoryFetchError, LedgerError};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid draft: {}", .0.join("; "))]
    InvalidDraft(Vec<String>),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error(transparent)]
    Decrypt(#[from] DecryptError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    History(#[from] HistoryFetchError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invoice {invoice_id} does not match its anchored hash {anchored} (plaintext hashes to {computed})")]
    IntegrityMismatch {
        invoice_id: Bytes32,
        anchored: Bytes32,
        computed: Bytes32,
    },
    /// The ledger accepted the invoice but the local entry could not be
    /// written. `entry` is the only copy of the reference the sender holds.
    #[error(
        "invoice {} anchored in tx {} but not recorded locally: {source}",
        .entry.invoice_reference,
        .entry.tx_hash
    )]
    AnchoredButUnrecorded {
        entry: Box<LocalInvoiceEntry>,
        invoice_id: Bytes32,
        source: StoreError,
    },
    #[error("invoice amount {0} cannot be paid")]
    UnpayableAmount(Decimal),
}
