//! Matches observed ledger transactions against known invoice references.
//!
//! The engine keeps no state between calls: every pass recomputes the whole
//! [`PaymentSummary`] from the history it is given, so a retried pass can
//! never double-count.

use crate::codec::strip_hex_prefix;
use crate::models::{normalize_reference, IncomingPayment, PaymentSummary, RawTx};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Compares two ledger addresses, ignoring ASCII case.
pub fn same_address(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

pub fn reconcile<I, S>(own_address: &str, known_references: I, history: &[RawTx]) -> PaymentSummary
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    // Hex bodies, lowercase, deduplicated and ordered.
    let references: BTreeSet<String> = known_references
        .into_iter()
        .map(|r| strip_hex_prefix(r.as_ref().trim()).to_ascii_lowercase())
        .filter(|r| !r.is_empty())
        .collect();

    let mut totals: BTreeMap<String, u128> = references
        .iter()
        .map(|body| (format!("0x{body}"), 0))
        .collect();
    let mut payments = Vec::new();
    let mut seen = HashSet::new();

    for tx in history {
        if tx.is_error {
            continue;
        }
        let Some(to) = tx.to.as_deref() else {
            continue;
        };
        if !same_address(to, own_address) {
            continue;
        }
        if !seen.insert(tx.hash.to_ascii_lowercase()) {
            tracing::debug!(tx_hash = %tx.hash, "skipping repeated observation");
            continue;
        }
        let Some(reference) = match_reference(&tx.input, &references, &tx.hash) else {
            continue;
        };

        let entry = totals.entry(reference.clone()).or_insert(0);
        *entry = entry.saturating_add(tx.value);
        payments.push(IncomingPayment {
            tx_hash: tx.hash.clone(),
            from_address: tx.from.clone(),
            amount: tx.value,
            matched_reference: reference,
            timestamp: tx.timestamp,
        });
    }

    payments.sort_by(|a, b| {
        (a.timestamp, a.tx_hash.to_ascii_lowercase()).cmp(&(b.timestamp, b.tx_hash.to_ascii_lowercase()))
    });

    PaymentSummary { totals, payments }
}

/// Picks the reference occurring earliest in `input`; equal offsets go to the
/// lexicographically smaller reference.
fn match_reference(input: &str, references: &BTreeSet<String>, tx_hash: &str) -> Option<String> {
    let haystack = input.to_ascii_lowercase();
    let hits: Vec<(usize, &String)> = references
        .iter()
        .filter_map(|body| haystack.find(body.as_str()).map(|pos| (pos, body)))
        .collect();

    if hits.len() > 1 {
        tracing::warn!(
            tx_hash = %tx_hash,
            candidates = hits.len(),
            "transaction payload contains more than one known reference"
        );
    }

    hits.into_iter()
        .min()
        .map(|(_, body)| normalize_reference(body))
}
