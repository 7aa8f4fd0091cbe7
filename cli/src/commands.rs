use crate::ConfigAction;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use envelope::ReceiverPublicKey;
use inv_vault_core::codec::{base64_to_hex, hex_to_base64};
use inv_vault_core::validation::price_warnings;
use inv_vault_core::{build_canonical_invoice, InvoiceDraft};
use ledger::{LedgerGateway, TransactionHistory};
use std::path::PathBuf;
use std::sync::Arc;
use vault::{AuditLog, InvoiceLog, Vault};

/// Parses `DESCRIPTION=PRICE`; the price is everything after the last `=`.
pub fn parse_item(s: &str) -> Result<(String, String), String> {
    let (description, price) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected DESCRIPTION=PRICE, got '{s}'"))?;
    Ok((description.trim().to_string(), price.trim().to_string()))
}

fn log_path(cfg: &config::AppConfig) -> PathBuf {
    cfg.storage.data_dir.join("invoices")
}

pub fn open_vault(cfg: &config::AppConfig, gateway: Arc<dyn LedgerGateway>) -> Result<Vault> {
    let path = log_path(cfg);
    let vault = Vault::open(&path, cfg.storage.data_dir.join(&cfg.storage.audit_log), gateway)
        .with_context(|| format!("Failed to open invoice log at {}", path.display()))?;
    Ok(vault.with_paging(cfg.ledger.page_size, cfg.ledger.read_retries))
}

pub fn key_to_hex(key: &str) -> Result<()> {
    println!("{}", base64_to_hex(key)?);
    Ok(())
}

pub fn key_to_base64(key: &str) -> Result<()> {
    println!("{}", hex_to_base64(key)?);
    Ok(())
}

pub fn draft(draft: &InvoiceDraft) -> Result<()> {
    for warning in price_warnings(draft) {
        eprintln!("warning: {warning}");
    }
    let invoice = build_canonical_invoice(draft);
    println!("{}", invoice.to_canonical_json());
    println!("integrity hash: {}", invoice.integrity_hash());
    Ok(())
}

/// `issue --dry-run`: validate and seal without submitting or recording.
pub fn seal(draft: &InvoiceDraft, receiver_key: &str) -> Result<()> {
    let receiver = ReceiverPublicKey::parse(receiver_key).context("Invalid receiver key")?;
    let issued_on = chrono::Local::now().date_naive();
    let prepared = vault::prepare_invoice(draft, &receiver, issued_on)?;

    println!("reference:      {}", prepared.invoice.invoice_reference);
    println!("receiver key:   {}", prepared.envelope.receiver_key_id);
    println!("integrity hash: {}", prepared.envelope.integrity_hash);
    println!("amount due:     {}", prepared.invoice.total_amount_with_vat);
    println!("ciphertext:     {} bytes", prepared.envelope.ciphertext.len());
    eprintln!("dry run: nothing submitted, nothing recorded");
    Ok(())
}

pub async fn issue(vault: &Vault, draft: &InvoiceDraft, receiver_key: &str) -> Result<()> {
    let receiver = ReceiverPublicKey::parse(receiver_key).context("Invalid receiver key")?;
    let issued_on = chrono::Local::now().date_naive();
    let issued = vault.issue_invoice(draft, &receiver, issued_on).await?;

    println!("reference:      {}", issued.entry.invoice_reference);
    println!("invoice id:     {}", issued.receipt.invoice_id);
    println!("tx hash:        {}", issued.receipt.tx_hash);
    println!("integrity hash: {}", issued.envelope.integrity_hash);
    println!("amount due:     {}", issued.entry.total_amount_with_vat);
    Ok(())
}

pub fn entries(cfg: &config::AppConfig) -> Result<()> {
    let path = log_path(cfg);
    let log = InvoiceLog::open(&path)?;
    let entries = log.list()?;
    if entries.is_empty() {
        println!("no invoices recorded in {}", path.display());
        return Ok(());
    }
    for e in entries {
        let due = e
            .payment_due_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {}  {:>12}  due {}  {}",
            e.created_at.format("%Y-%m-%d %H:%M"),
            e.invoice_reference,
            e.total_amount_with_vat,
            due,
            e.tx_hash
        );
    }
    Ok(())
}

pub async fn reconcile(
    cfg: &config::AppConfig,
    history: &dyn TransactionHistory,
    address: &str,
    as_of: NaiveDate,
) -> Result<()> {
    let path = log_path(cfg);
    let log = InvoiceLog::open(&path)
        .with_context(|| format!("Failed to open invoice log at {}", path.display()))?;
    let audit = AuditLog::new(cfg.storage.data_dir.join(&cfg.storage.audit_log));
    let report = vault::reconcile::reconcile_log(&log, &audit, address, history, as_of).await?;
    for b in &report.balances {
        println!(
            "{}  {:?}  due {}  paid {}  outstanding {}",
            b.reference, b.state, b.due, b.paid, b.outstanding
        );
        for p in report.summary.payments_for(&b.reference) {
            println!("    {}  from {}  {} wei", p.tx_hash, p.from_address, p.amount);
        }
    }
    println!(
        "{} invoices, {} matched payments as of {}",
        report.balances.len(),
        report.summary.payments.len(),
        report.as_of
    );
    Ok(())
}

pub fn configure(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let cfg = config::load()?;
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            let key_state = if config::explorer_api_key().is_some() { "set" } else { "not set" };
            println!("explorer api key: {key_state}");
        }
        ConfigAction::SetExplorerUrl { url } => {
            let mut cfg = config::load()?;
            cfg.explorer.base_url = Some(url);
            config::store(&cfg)?;
            tracing::info!("explorer url updated");
        }
        ConfigAction::SetApiKey { key } => {
            config::store_secret(config::EXPLORER_API_KEY, &key)?;
            tracing::info!("explorer api key stored in keychain");
        }
        ConfigAction::DeleteApiKey => {
            config::delete_secret(config::EXPLORER_API_KEY)?;
            tracing::info!("explorer api key removed from keychain");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_splits_on_last_equals() {
        assert_eq!(
            parse_item("Setup = fee=12.50").unwrap(),
            ("Setup = fee".to_string(), "12.50".to_string())
        );
        assert!(parse_item("no price").is_err());
    }
}
