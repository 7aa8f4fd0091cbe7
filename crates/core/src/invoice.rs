//! Invoice drafts and their canonical, hashable form.

use crate::codec::{encode_hex, IntegrityHash};
use crate::parsing::{compute_sha256, parse_decimal};
use chrono::NaiveDate;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Version of the canonical field set below.
pub const CANONICAL_SCHEMA_VERSION: u32 = 1;

const REFERENCE_BYTES: usize = 32;
const NONCE_BYTES: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemDraft {
    pub description: String,
    /// Raw price text as entered by the sender.
    pub unit_price: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub title: String,
    /// Raw VAT percentage text, `,` or `.` separated.
    pub vat: String,
    pub line_items: Vec<LineItemDraft>,
    pub payment_due_date: Option<NaiveDate>,
}

impl InvoiceDraft {
    pub fn new(title: impl Into<String>, vat: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            vat: vat.into(),
            ..Default::default()
        }
    }

    pub fn with_item(mut self, description: impl Into<String>, unit_price: impl Into<String>) -> Self {
        self.line_items.push(LineItemDraft {
            description: description.into(),
            unit_price: unit_price.into(),
        });
        self
    }

    pub fn due_on(mut self, date: NaiveDate) -> Self {
        self.payment_due_date = Some(date);
        self
    }

    /// Sum of all parseable, non-negative unit prices.
    pub fn total_amount(&self) -> Decimal {
        self.line_items
            .iter()
            .map(|item| price_or_zero(&item.unit_price))
            .fold(Decimal::ZERO, |acc, price| acc.saturating_add(price))
    }

    pub fn vat_percent(&self) -> Decimal {
        parse_decimal(&self.vat).unwrap_or(Decimal::ZERO)
    }

    pub fn total_amount_with_vat(&self) -> Decimal {
        with_vat(self.total_amount(), self.vat_percent())
    }
}

pub(crate) fn price_or_zero(raw: &str) -> Decimal {
    match parse_decimal(raw) {
        Some(price) if !price.is_sign_negative() => price,
        _ => Decimal::ZERO,
    }
}

fn with_vat(total: Decimal, vat_percent: Decimal) -> Decimal {
    let factor = Decimal::ONE + vat_percent / Decimal::ONE_HUNDRED;
    total
        .saturating_mul(factor)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanonicalLineItem {
    pub index: usize,
    pub text: String,
    pub preis: String,
}

/// Field order is the serialization order and therefore part of the hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CanonicalInvoice {
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub vat: Decimal,
    pub line_items: Vec<CanonicalLineItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount_with_vat: Decimal,
    pub payment_due_date: Option<NaiveDate>,
    pub invoice_reference: String,
    pub nonce: String,
}

impl CanonicalInvoice {
    /// The exact bytes that are hashed and encrypted.
    pub fn to_canonical_json(&self) -> String {
        // Only strings, numbers and dates; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn integrity_hash(&self) -> IntegrityHash {
        compute_sha256(self.to_canonical_json().as_bytes())
    }
}

pub fn build_canonical_invoice(draft: &InvoiceDraft) -> CanonicalInvoice {
    build_canonical_invoice_with(draft, &mut OsRng)
}

pub fn build_canonical_invoice_with<R>(draft: &InvoiceDraft, rng: &mut R) -> CanonicalInvoice
where
    R: RngCore + CryptoRng,
{
    let mut reference = [0u8; REFERENCE_BYTES];
    rng.fill_bytes(&mut reference);
    let mut nonce = [0u8; NONCE_BYTES];
    rng.fill_bytes(&mut nonce);

    let line_items = draft
        .line_items
        .iter()
        .enumerate()
        .map(|(index, item)| CanonicalLineItem {
            index,
            text: item.description.clone(),
            preis: item.unit_price.trim().to_string(),
        })
        .collect();

    CanonicalInvoice {
        title: draft.title.clone(),
        vat: draft.vat_percent(),
        line_items,
        total_amount: draft.total_amount(),
        total_amount_with_vat: draft.total_amount_with_vat(),
        payment_due_date: draft.payment_due_date,
        invoice_reference: encode_hex(&reference),
        nonce: encode_hex(&nonce),
    }
}
