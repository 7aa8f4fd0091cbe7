//! Joins a [`PaymentSummary`] with the local invoice log.

use crate::audit::{AuditEvent, AuditLog};
use crate::store::InvoiceLog;
use crate::{Vault, VaultError};
use chrono::NaiveDate;
use inv_vault_core::models::normalize_reference;
use inv_vault_core::units::{from_base_units, to_base_units};
use inv_vault_core::{reconcile, LocalInvoiceEntry, PaymentSummary};
use ledger::TransactionHistory;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceState {
    Open,
    PartiallyPaid,
    Paid,
    Overpaid,
    /// Not fully paid and past its due date.
    Overdue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceBalance {
    pub reference: String,
    pub due: Decimal,
    pub due_date: Option<NaiveDate>,
    pub paid_base_units: u128,
    pub paid: Decimal,
    pub outstanding: Decimal,
    pub state: BalanceState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub as_of: NaiveDate,
    pub balances: Vec<InvoiceBalance>,
    pub summary: PaymentSummary,
}

impl ReconciliationReport {
    pub fn balance(&self, reference: &str) -> Option<&InvoiceBalance> {
        let key = normalize_reference(reference);
        self.balances.iter().find(|b| b.reference == key)
    }
}

pub fn build_report(entries: &[LocalInvoiceEntry], summary: PaymentSummary, as_of: NaiveDate) -> ReconciliationReport {
    let balances = entries
        .iter()
        .map(|entry| {
            let reference = normalize_reference(&entry.invoice_reference);
            let paid_base_units = summary.sum_for(&reference).unwrap_or(0);
            balance_for(entry, reference, paid_base_units, as_of)
        })
        .collect();
    ReconciliationReport {
        as_of,
        balances,
        summary,
    }
}

fn balance_for(entry: &LocalInvoiceEntry, reference: String, paid_base_units: u128, as_of: NaiveDate) -> InvoiceBalance {
    let due = entry.total_amount_with_vat;
    let due_base_units = to_base_units(due).unwrap_or(u128::MAX);
    let paid = from_base_units(paid_base_units).unwrap_or(Decimal::MAX);
    let outstanding = (due - paid).max(Decimal::ZERO);
    let past_due = entry.payment_due_date.is_some_and(|d| d < as_of);

    let state = if paid_base_units > due_base_units {
        BalanceState::Overpaid
    } else if paid_base_units == due_base_units {
        BalanceState::Paid
    } else if past_due {
        BalanceState::Overdue
    } else if paid_base_units > 0 {
        BalanceState::PartiallyPaid
    } else {
        BalanceState::Open
    };

    InvoiceBalance {
        reference,
        due,
        due_date: entry.payment_due_date,
        paid_base_units,
        paid,
        outstanding,
        state,
    }
}

/// Recomputes every balance from the full transaction history of
/// `own_address`. An unavailable feed is an error, never an empty report.
pub async fn reconcile_log(
    log: &InvoiceLog,
    audit: &AuditLog,
    own_address: &str,
    history: &dyn TransactionHistory,
    as_of: NaiveDate,
) -> Result<ReconciliationReport, VaultError> {
    let txs = match history.fetch(own_address).await {
        Ok(txs) => txs,
        Err(e) => {
            tracing::error!(%own_address, error = %e, "reconciliation aborted");
            audit.record(
                &AuditEvent::new("reconciliation_failed")
                    .with_account(own_address)
                    .with_error(e.to_string()),
            );
            return Err(e.into());
        }
    };

    let entries = log.list()?;
    let summary = reconcile(
        own_address,
        entries.iter().map(|e| e.invoice_reference.as_str()),
        &txs,
    );
    let report = build_report(&entries, summary, as_of);

    audit.record(&AuditEvent::new("reconciliation_completed").with_account(own_address));
    tracing::info!(
        %own_address,
        invoices = report.balances.len(),
        payments = report.summary.payments.len(),
        "reconciliation completed"
    );
    Ok(report)
}

impl Vault {
    pub async fn reconcile(
        &self,
        own_address: &str,
        history: &dyn TransactionHistory,
        as_of: NaiveDate,
    ) -> Result<ReconciliationReport, VaultError> {
        reconcile_log(&self.log, &self.audit, own_address, history, as_of).await
    }
}
