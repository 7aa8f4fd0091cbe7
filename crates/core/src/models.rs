use crate::codec::{Bytes32, IntegrityHash, ReceiverKeyId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An invoice as stored by the ledger contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerInvoiceRecord {
    pub id: Bytes32,
    pub sender: String,
    pub receiver_key: ReceiverKeyId,
    #[serde(with = "hex_bytes")]
    pub encrypted_data: Vec<u8>,
    pub integrity_hash: IntegrityHash,
    /// Block timestamp, seconds since the epoch.
    pub created_at: u64,
}

/// What the issuing party keeps locally for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalInvoiceEntry {
    pub invoice_reference: String,
    pub total_amount: Decimal,
    pub total_amount_with_vat: Decimal,
    pub payment_due_date: Option<NaiveDate>,
    pub receiver_key: ReceiverKeyId,
    pub tx_hash: String,
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
}

/// One transaction as reported by the history feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTx {
    pub hash: String,
    pub from: String,
    /// Empty for contract creations.
    pub to: Option<String>,
    /// Native value in base units.
    pub value: u128,
    pub input: String,
    pub timestamp: u64,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingPayment {
    pub tx_hash: String,
    pub from_address: String,
    pub amount: u128,
    pub matched_reference: String,
    pub timestamp: u64,
}

/// Paid totals per known reference. Every known reference has an entry,
/// zero when nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub totals: BTreeMap<String, u128>,
    pub payments: Vec<IncomingPayment>,
}

impl PaymentSummary {
    pub fn sum_for(&self, reference: &str) -> Option<u128> {
        self.totals.get(&normalize_reference(reference)).copied()
    }

    pub fn payments_for<'a>(&'a self, reference: &str) -> impl Iterator<Item = &'a IncomingPayment> {
        let key = normalize_reference(reference);
        self.payments
            .iter()
            .filter(move |p| p.matched_reference == key)
    }
}

/// Lowercase `0x` form used as the summary key.
pub fn normalize_reference(reference: &str) -> String {
    let body = crate::codec::strip_hex_prefix(reference.trim());
    format!("0x{}", body.to_ascii_lowercase())
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&crate::codec::encode_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        crate::codec::decode_hex(&s).map_err(serde::de::Error::custom)
    }
}
