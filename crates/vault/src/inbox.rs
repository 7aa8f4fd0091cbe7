use crate::audit::AuditEvent;
use crate::session::Session;
use crate::{Vault, VaultError};
use envelope::{KeyHolder, ReceiverPublicKey};
use inv_vault_core::codec::ReceiverKeyId;
use inv_vault_core::parsing::{compute_sha256, parse_canonical_invoice};
use inv_vault_core::units::to_base_units;
use inv_vault_core::{CanonicalInvoice, LedgerInvoiceRecord};
use ledger::{list_all_invoices, InvoiceFilter};
use serde::{Deserialize, Serialize};

/// A native transfer settling an invoice. `data` carries the invoice
/// reference so the sender's reconciliation can attribute it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub from: String,
    pub to: String,
    pub value: u128,
    pub data: String,
}

impl Vault {
    pub async fn sent_invoices(&self, session: &Session) -> Result<Vec<LedgerInvoiceRecord>, VaultError> {
        let filter = InvoiceFilter::Sender(session.account().to_string());
        Ok(list_all_invoices(self.ledger.as_ref(), &filter, self.page_size, self.read_retries).await?)
    }

    pub async fn received_invoices(
        &self,
        receiver: &ReceiverKeyId,
    ) -> Result<Vec<LedgerInvoiceRecord>, VaultError> {
        let filter = InvoiceFilter::Receiver(*receiver);
        Ok(list_all_invoices(self.ledger.as_ref(), &filter, self.page_size, self.read_retries).await?)
    }

    /// The session account's encryption key, as published by its key holder.
    pub async fn receiver_key(
        &self,
        session: &Session,
        key_holder: &dyn KeyHolder,
    ) -> Result<ReceiverPublicKey, VaultError> {
        let base64 = key_holder.encryption_public_key(session.account()).await?;
        Ok(ReceiverPublicKey::from_base64(&base64)?)
    }

    /// Decrypts a received invoice and checks it against its ledger anchor.
    pub async fn open_invoice(
        &self,
        session: &Session,
        key_holder: &dyn KeyHolder,
        record: &LedgerInvoiceRecord,
    ) -> Result<CanonicalInvoice, VaultError> {
        let plaintext = session.decrypt(key_holder, record).await?;

        let computed = compute_sha256(plaintext.as_bytes());
        if computed != record.integrity_hash {
            tracing::warn!(invoice_id = %record.id, "decrypted invoice does not match its anchor");
            return Err(VaultError::IntegrityMismatch {
                invoice_id: record.id,
                anchored: record.integrity_hash,
                computed,
            });
        }
        let invoice = parse_canonical_invoice(&plaintext)?;

        self.audit.record(
            &AuditEvent::new("invoice_opened")
                .with_invoice_id(record.id.to_hex())
                .with_reference(&invoice.invoice_reference)
                .with_account(session.account()),
        );
        Ok(invoice)
    }

    pub fn payment_request(
        &self,
        session: &Session,
        record: &LedgerInvoiceRecord,
        invoice: &CanonicalInvoice,
    ) -> Result<PaymentRequest, VaultError> {
        let amount = invoice.total_amount_with_vat;
        let value = to_base_units(amount)
            .filter(|v| *v > 0)
            .ok_or(VaultError::UnpayableAmount(amount))?;
        Ok(PaymentRequest {
            from: session.account().to_string(),
            to: record.sender.clone(),
            value,
            data: invoice.invoice_reference.clone(),
        })
    }
}
