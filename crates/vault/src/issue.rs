use crate::audit::AuditEvent;
use crate::{Vault, VaultError};
use chrono::{NaiveDate, Utc};
use envelope::{encrypt_invoice_with, EncryptedEnvelope, ReceiverPublicKey};
use inv_vault_core::invoice::{build_canonical_invoice_with, CANONICAL_SCHEMA_VERSION};
use inv_vault_core::validation::{price_warnings, validate};
use inv_vault_core::{CanonicalInvoice, InvoiceDraft, LocalInvoiceEntry};
use ledger::TransactionReceipt;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

/// A validated invoice sealed for its receiver, not yet on any ledger.
#[derive(Debug, Clone)]
pub struct PreparedInvoice {
    pub invoice: CanonicalInvoice,
    pub envelope: EncryptedEnvelope,
}

#[derive(Debug, Clone)]
pub struct IssuedInvoice {
    pub invoice: CanonicalInvoice,
    pub envelope: EncryptedEnvelope,
    pub receipt: TransactionReceipt,
    pub entry: LocalInvoiceEntry,
}

/// Validates and seals a draft. Touches neither the ledger nor the local log.
pub fn prepare_invoice(
    draft: &InvoiceDraft,
    receiver: &ReceiverPublicKey,
    issued_on: NaiveDate,
) -> Result<PreparedInvoice, VaultError> {
    prepare_invoice_with(draft, receiver, issued_on, &mut OsRng)
}

pub fn prepare_invoice_with<R>(
    draft: &InvoiceDraft,
    receiver: &ReceiverPublicKey,
    issued_on: NaiveDate,
    rng: &mut R,
) -> Result<PreparedInvoice, VaultError>
where
    R: RngCore + CryptoRng,
{
    validate(draft, issued_on).map_err(VaultError::InvalidDraft)?;
    for warning in price_warnings(draft) {
        tracing::warn!(%warning, "draft line item ignored in totals");
    }

    let invoice = build_canonical_invoice_with(draft, rng);
    let envelope = encrypt_invoice_with(&invoice.to_canonical_json(), receiver, rng)?;
    Ok(PreparedInvoice { invoice, envelope })
}

impl Vault {
    /// Validates, seals and anchors an invoice, then records it locally.
    ///
    /// The ledger write happens exactly once. A rejected submission is
    /// returned as is and leaves the local log untouched.
    pub async fn issue_invoice(
        &self,
        draft: &InvoiceDraft,
        receiver: &ReceiverPublicKey,
        issued_on: NaiveDate,
    ) -> Result<IssuedInvoice, VaultError> {
        self.issue_invoice_with(draft, receiver, issued_on, &mut OsRng).await
    }

    pub async fn issue_invoice_with<R>(
        &self,
        draft: &InvoiceDraft,
        receiver: &ReceiverPublicKey,
        issued_on: NaiveDate,
        rng: &mut R,
    ) -> Result<IssuedInvoice, VaultError>
    where
        R: RngCore + CryptoRng + Send,
    {
        let PreparedInvoice { invoice, envelope } = prepare_invoice_with(draft, receiver, issued_on, rng)?;

        let receipt = match self
            .ledger
            .submit_invoice(&envelope.receiver_key_id, &envelope.ciphertext, &envelope.integrity_hash)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::error!(reference = %invoice.invoice_reference, error = %e, "invoice submission failed");
                self.audit.record(
                    &AuditEvent::new("submission_failed")
                        .with_reference(&invoice.invoice_reference)
                        .with_hash(envelope.integrity_hash.to_hex())
                        .with_error(e.to_string()),
                );
                return Err(e.into());
            }
        };

        let entry = LocalInvoiceEntry {
            invoice_reference: invoice.invoice_reference.clone(),
            total_amount: invoice.total_amount,
            total_amount_with_vat: invoice.total_amount_with_vat,
            payment_due_date: invoice.payment_due_date,
            receiver_key: envelope.receiver_key_id,
            tx_hash: receipt.tx_hash.clone(),
            schema_version: CANONICAL_SCHEMA_VERSION,
            created_at: Utc::now(),
        };
        if let Err(e) = self.log.append(&entry) {
            // Already on the ledger; resubmitting would duplicate it.
            tracing::error!(
                reference = %entry.invoice_reference,
                tx_hash = %receipt.tx_hash,
                error = %e,
                "invoice anchored but local entry could not be written"
            );
            self.audit.record(
                &AuditEvent::new("invoice_anchored_unrecorded")
                    .with_reference(&entry.invoice_reference)
                    .with_invoice_id(receipt.invoice_id.to_hex())
                    .with_tx_hash(&receipt.tx_hash)
                    .with_hash(envelope.integrity_hash.to_hex())
                    .with_amount_due(entry.total_amount_with_vat, entry.payment_due_date)
                    .with_error(e.to_string()),
            );
            return Err(VaultError::AnchoredButUnrecorded {
                entry: Box::new(entry),
                invoice_id: receipt.invoice_id,
                source: e,
            });
        }

        self.audit.record(
            &AuditEvent::new("invoice_submitted")
                .with_reference(&entry.invoice_reference)
                .with_invoice_id(receipt.invoice_id.to_hex())
                .with_tx_hash(&receipt.tx_hash)
                .with_hash(envelope.integrity_hash.to_hex())
                .with_amount_due(entry.total_amount_with_vat, entry.payment_due_date),
        );
        tracing::info!(
            reference = %entry.invoice_reference,
            tx_hash = %receipt.tx_hash,
            total = %entry.total_amount_with_vat,
            "invoice issued"
        );

        Ok(IssuedInvoice {
            invoice,
            envelope,
            receipt,
            entry,
        })
    }
}
