//! Conversions between wallet-native (base64) and ledger-native (hex, 32-byte)
//! representations of keys, hashes and identifiers.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    InvalidBase64(String),
    #[error("hex string has odd length {0}")]
    OddLength(usize),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

/// Removes a leading `0x`/`0X` if present.
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

pub fn decode_hex(s: &str) -> Result<Vec<u8>, DecodeError> {
    let body = strip_hex_prefix(s.trim());
    if body.len() % 2 != 0 {
        return Err(DecodeError::OddLength(body.len()));
    }
    hex::decode(body).map_err(|e| DecodeError::InvalidHex(e.to_string()))
}

/// Lowercase, `0x`-prefixed rendering of raw bytes.
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn base64_to_hex(base64: &str) -> Result<String, DecodeError> {
    let raw = STANDARD
        .decode(base64.trim())
        .map_err(|e| DecodeError::InvalidBase64(e.to_string()))?;
    Ok(encode_hex(&raw))
}

pub fn hex_to_base64(hex: &str) -> Result<String, DecodeError> {
    let raw = decode_hex(hex)?;
    Ok(STANDARD.encode(raw))
}

pub fn hex_to_bytes32(hex: &str) -> Result<[u8; 32], DecodeError> {
    to_array(&decode_hex(hex)?)
}

pub fn base64_to_bytes32(base64: &str) -> Result<[u8; 32], DecodeError> {
    let raw = STANDARD
        .decode(base64.trim())
        .map_err(|e| DecodeError::InvalidBase64(e.to_string()))?;
    to_array(&raw)
}

fn to_array(raw: &[u8]) -> Result<[u8; 32], DecodeError> {
    <[u8; 32]>::try_from(raw).map_err(|_| DecodeError::WrongLength {
        expected: 32,
        actual: raw.len(),
    })
}

/// Fixed 32-byte value as stored on the ledger (`bytes32`).
///
/// Used for receiver key identifiers, integrity hashes and ledger record ids.
/// Serializes as a `0x`-prefixed lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Bytes32(pub [u8; 32]);

pub type ReceiverKeyId = Bytes32;
pub type IntegrityHash = Bytes32;

impl Bytes32 {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        encode_hex(&self.0)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self, DecodeError> {
        base64_to_bytes32(s).map(Self)
    }
}

impl From<[u8; 32]> for Bytes32 {
    fn from(value: [u8; 32]) -> Self {
        Self(value)
    }
}

impl FromStr for Bytes32 {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex_to_bytes32(s).map(Self)
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes32({})", self.to_hex())
    }
}

impl Serialize for Bytes32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Bytes32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
