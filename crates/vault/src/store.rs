use inv_vault_core::models::normalize_reference;
use inv_vault_core::LocalInvoiceEntry;
use sled::Db;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invoice {0} is already recorded")]
    DuplicateReference(String),
    #[error("storage error: {0}")]
    Db(#[from] sled::Error),
    #[error("corrupt entry: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Append-only log of issued invoices, keyed by invoice reference.
#[derive(Clone)]
pub struct InvoiceLog {
    db: Db,
}

impl InvoiceLog {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(sled::open(path)?))
    }

    pub fn new(db: Db) -> Self {
        Self { db }
    }

    fn invoices_tree(&self) -> Result<sled::Tree, StoreError> {
        Ok(self.db.open_tree("invoices")?)
    }

    /// Inserts a new entry. Existing entries are never overwritten.
    pub fn append(&self, entry: &LocalInvoiceEntry) -> Result<(), StoreError> {
        let tree = self.invoices_tree()?;
        let key = normalize_reference(&entry.invoice_reference);
        let value = serde_json::to_vec(entry)?;
        tree.compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(value))?
            .map_err(|_| StoreError::DuplicateReference(key.clone()))?;
        tree.flush()?;
        tracing::debug!(reference = %key, "local invoice entry appended");
        Ok(())
    }

    pub fn get(&self, reference: &str) -> Result<Option<LocalInvoiceEntry>, StoreError> {
        let tree = self.invoices_tree()?;
        match tree.get(normalize_reference(reference).as_bytes())? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    /// All entries, oldest first.
    pub fn list(&self) -> Result<Vec<LocalInvoiceEntry>, StoreError> {
        let tree = self.invoices_tree()?;
        let mut out = Vec::new();
        for item in tree.iter() {
            let (_k, v) = item?;
            let entry: LocalInvoiceEntry = serde_json::from_slice(&v)?;
            out.push(entry);
        }
        out.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.invoice_reference.cmp(&b.invoice_reference))
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use inv_vault_core::Bytes32;
    use rust_decimal::Decimal;

    fn temp_log() -> InvoiceLog {
        InvoiceLog::new(sled::Config::new().temporary(true).open().unwrap())
    }

    fn entry(reference: &str, secs: i64) -> LocalInvoiceEntry {
        LocalInvoiceEntry {
            invoice_reference: reference.to_string(),
            total_amount: Decimal::from(100),
            total_amount_with_vat: Decimal::new(10810, 2),
            payment_due_date: None,
            receiver_key: Bytes32([1; 32]),
            tx_hash: "0xfeed".to_string(),
            schema_version: 1,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn appends_and_lists_in_creation_order() {
        let log = temp_log();
        log.append(&entry("0xbb", 20)).unwrap();
        log.append(&entry("0xaa", 10)).unwrap();
        let all = log.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].invoice_reference, "0xaa");
        assert_eq!(log.get("0xBB").unwrap().unwrap().total_amount_with_vat, Decimal::new(10810, 2));
        assert!(log.get("0xcc").unwrap().is_none());
    }

    #[test]
    fn never_overwrites() {
        let log = temp_log();
        log.append(&entry("0xaa", 10)).unwrap();
        let mut changed = entry("0xAA", 11);
        changed.total_amount = Decimal::ZERO;
        assert!(matches!(log.append(&changed), Err(StoreError::DuplicateReference(_))));
        assert_eq!(log.get("0xaa").unwrap().unwrap().total_amount, Decimal::from(100));
    }
}
