use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event_type: String,
    pub invoice_reference: Option<String>,
    pub invoice_id: Option<String>,
    pub tx_hash: Option<String>,
    pub integrity_hash: Option<String>,
    pub account: Option<String>,
    pub amount_due: Option<String>,
    pub due_date: Option<String>,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event_type: event_type.to_string(),
            invoice_reference: None,
            invoice_id: None,
            tx_hash: None,
            integrity_hash: None,
            account: None,
            amount_due: None,
            due_date: None,
            error: None,
        }
    }

    pub fn with_reference(mut self, reference: &str) -> Self {
        self.invoice_reference = Some(reference.to_string());
        self
    }

    pub fn with_invoice_id(mut self, id: String) -> Self {
        self.invoice_id = Some(id);
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: &str) -> Self {
        self.tx_hash = Some(tx_hash.to_string());
        self
    }

    pub fn with_hash(mut self, hash: String) -> Self {
        self.integrity_hash = Some(hash);
        self
    }

    pub fn with_account(mut self, account: &str) -> Self {
        self.account = Some(account.to_string());
        self
    }

    pub fn with_amount_due(mut self, amount: Decimal, due_date: Option<NaiveDate>) -> Self {
        self.amount_due = Some(amount.to_string());
        self.due_date = due_date.map(|d| d.to_string());
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

/// Append-only JSON-lines audit trail.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Writes the event; a failing audit write never fails the operation.
    pub fn record(&self, event: &AuditEvent) {
        if let Err(e) = self.write(event) {
            tracing::warn!(event_type = %event.event_type, error = %e, "audit write failed");
        }
    }

    fn write(&self, event: &AuditEvent) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json)?;
        tracing::debug!(event_type = %event.event_type, "Audit event written");
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<AuditEvent>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if !line.trim().is_empty() {
                out.push(serde_json::from_str(&line)?);
            }
        }
        Ok(out)
    }
}
