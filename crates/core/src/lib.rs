//! Invoice model, key codecs and payment reconciliation for ledger-anchored
//! encrypted invoices.

pub mod codec;
pub mod invoice;
pub mod models;
pub mod parsing;
pub mod reconcile;
pub mod units;
pub mod validation;

pub use codec::{Bytes32, DecodeError, IntegrityHash, ReceiverKeyId};
pub use invoice::{build_canonical_invoice, CanonicalInvoice, InvoiceDraft};
pub use models::{IncomingPayment, LedgerInvoiceRecord, LocalInvoiceEntry, PaymentSummary, RawTx};
pub use reconcile::reconcile;
