//! Public-key envelopes for canonical invoices.
//!
//! Invoices are sealed with an ephemeral X25519 key agreement followed by
//! XSalsa20-Poly1305, the same box format browser wallets decrypt
//! (`x25519-xsalsa20-poly1305`). The sealed payload is a small JSON document
//! carrying the ephemeral public key, nonce and ciphertext, so the bytes
//! stored on the ledger are self-contained.

pub mod keyholder;
pub mod local;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use crypto_box::aead::{Aead, AeadCore};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use inv_vault_core::codec::{self, DecodeError, IntegrityHash, ReceiverKeyId};
use inv_vault_core::parsing::compute_sha256;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use keyholder::{DecryptError, KeyHolder};

pub const ENCRYPTION_VERSION: &str = "x25519-xsalsa20-poly1305";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid receiver public key: {0}")]
    InvalidPublicKey(#[from] DecodeError),
    #[error("encryption failed")]
    Cipher,
    #[error("failed to encode sealed payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A recipient's X25519 encryption key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ReceiverPublicKey([u8; 32]);

impl ReceiverPublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Wallet-native form, as returned by `eth_getEncryptionPublicKey`.
    pub fn from_base64(s: &str) -> Result<Self, DecodeError> {
        codec::base64_to_bytes32(s).map(Self)
    }

    pub fn from_hex(s: &str) -> Result<Self, DecodeError> {
        codec::hex_to_bytes32(s).map(Self)
    }

    /// Accepts either form: `0x` hex, bare 64-char hex, or base64.
    pub fn parse(s: &str) -> Result<Self, DecodeError> {
        let s = s.trim();
        let bare = codec::strip_hex_prefix(s);
        if s.len() != bare.len() || (bare.len() == 64 && bare.bytes().all(|b| b.is_ascii_hexdigit())) {
            Self::from_hex(s)
        } else {
            Self::from_base64(s)
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// The on-chain lookup key is the raw public key itself.
    pub fn receiver_key_id(&self) -> ReceiverKeyId {
        ReceiverKeyId::from(self.0)
    }
}

impl fmt::Debug for ReceiverPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReceiverPublicKey({})", self.to_base64())
    }
}

/// Wire form of a sealed invoice, matching the wallet `eth_decrypt` input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    pub version: String,
    pub nonce: String,
    pub ephem_public_key: String,
    pub ciphertext: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub ciphertext: Vec<u8>,
    pub integrity_hash: IntegrityHash,
    pub receiver_key_id: ReceiverKeyId,
}

pub fn encrypt_invoice(
    canonical_json: &str,
    receiver: &ReceiverPublicKey,
) -> Result<EncryptedEnvelope, EnvelopeError> {
    encrypt_invoice_with(canonical_json, receiver, &mut OsRng)
}

pub fn encrypt_invoice_with<R>(
    canonical_json: &str,
    receiver: &ReceiverPublicKey,
    rng: &mut R,
) -> Result<EncryptedEnvelope, EnvelopeError>
where
    R: RngCore + CryptoRng,
{
    let ephemeral = SecretKey::generate(&mut *rng);
    let salsa_box = SalsaBox::new(&PublicKey::from(receiver.0), &ephemeral);
    let nonce = SalsaBox::generate_nonce(&mut *rng);
    let sealed = salsa_box
        .encrypt(&nonce, canonical_json.as_bytes())
        .map_err(|_| EnvelopeError::Cipher)?;

    let payload = EncryptedPayload {
        version: ENCRYPTION_VERSION.to_string(),
        nonce: STANDARD.encode(nonce),
        ephem_public_key: STANDARD.encode(ephemeral.public_key().as_bytes()),
        ciphertext: STANDARD.encode(sealed),
    };

    let envelope = EncryptedEnvelope {
        ciphertext: serde_json::to_vec(&payload)?,
        integrity_hash: compute_sha256(canonical_json.as_bytes()),
        receiver_key_id: receiver.receiver_key_id(),
    };
    tracing::debug!(
        receiver = %envelope.receiver_key_id,
        integrity_hash = %envelope.integrity_hash,
        size = envelope.ciphertext.len(),
        "invoice sealed"
    );
    Ok(envelope)
}
