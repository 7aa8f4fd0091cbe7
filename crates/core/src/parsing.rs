use crate::codec::Bytes32;
use crate::invoice::CanonicalInvoice;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("not a schema-1 canonical invoice: {0}")]
pub struct SchemaError(#[from] pub serde_json::Error);

pub fn compute_sha256(data: &[u8]) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Bytes32(hasher.finalize().into())
}

/// Parses a user-entered decimal, accepting `,` or `.` as the separator.
pub fn parse_decimal(input: &str) -> Option<Decimal> {
    let normalized = input.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    Decimal::from_str(&normalized).ok()
}

/// Strictly parses a decrypted plaintext. Unknown keys are rejected so that
/// payloads from other schema revisions are never silently half-read.
pub fn parse_canonical_invoice(json: &str) -> Result<CanonicalInvoice, SchemaError> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_known_input() {
        assert_eq!(
            compute_sha256(b"abc").to_hex(),
            "0xba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn decimal_separators() {
        assert_eq!(parse_decimal("8,1"), parse_decimal("8.1"));
        assert_eq!(parse_decimal(" 100 "), Some(Decimal::from(100)));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("abc"), None);
    }

    #[test]
    fn rejects_unknown_keys() {
        let json = r#"{"title":"A","vat":8.1,"lineItems":[],"totalAmount":0,
            "totalAmountWithVat":0,"paymentDueDate":null,
            "invoiceReference":"0x01","nonce":"0x02","bearerToken":"x"}"#;
        assert!(parse_canonical_invoice(json).is_err());
    }
}
