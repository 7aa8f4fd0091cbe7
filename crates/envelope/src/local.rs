use super::{DecryptError, EncryptedPayload, KeyHolder, ReceiverPublicKey, ENCRYPTION_VERSION};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::Aead;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use inv_vault_core::codec::base64_to_bytes32;
use inv_vault_core::reconcile::same_address;
use rand::rngs::OsRng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const NONCE_LEN: usize = 24;

/// In-process key holder that keeps the secret key itself.
///
/// Stands in for a wallet: it can be told to refuse requests and counts how
/// often it was asked to decrypt.
pub struct LocalKeyHolder {
    account: String,
    secret: SecretKey,
    refusing: AtomicBool,
    prompts: AtomicUsize,
}

impl LocalKeyHolder {
    pub fn generate(account: &str) -> Self {
        Self::from_secret(account, SecretKey::generate(&mut OsRng))
    }

    pub fn from_secret_bytes(account: &str, secret: [u8; 32]) -> Self {
        Self::from_secret(account, SecretKey::from(secret))
    }

    fn from_secret(account: &str, secret: SecretKey) -> Self {
        Self {
            account: account.to_string(),
            secret,
            refusing: AtomicBool::new(false),
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn public_key(&self) -> ReceiverPublicKey {
        ReceiverPublicKey::from_bytes(*self.secret.public_key().as_bytes())
    }

    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyHolder for LocalKeyHolder {
    async fn encryption_public_key(&self, account: &str) -> Result<String, DecryptError> {
        if !same_address(account, &self.account) {
            return Err(DecryptError::Denied(format!("no key for account {account}")));
        }
        Ok(self.public_key().to_base64())
    }

    async fn decrypt(&self, ciphertext: &[u8], owner: &str) -> Result<String, DecryptError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        if self.refusing.load(Ordering::SeqCst) {
            return Err(DecryptError::Denied("request rejected by key holder".into()));
        }
        if !same_address(owner, &self.account) {
            return Err(DecryptError::Denied(format!("no key for account {owner}")));
        }
        open_payload(&self.secret, ciphertext)
    }
}

/// Opens a sealed payload with the recipient's secret key.
pub fn open_payload(secret: &SecretKey, ciphertext: &[u8]) -> Result<String, DecryptError> {
    let payload: EncryptedPayload = serde_json::from_slice(ciphertext)
        .map_err(|e| DecryptError::Failed(format!("malformed envelope: {e}")))?;
    if payload.version != ENCRYPTION_VERSION {
        return Err(DecryptError::Failed(format!(
            "unsupported envelope version {}",
            payload.version
        )));
    }

    let nonce = STANDARD
        .decode(&payload.nonce)
        .map_err(|e| DecryptError::Failed(format!("bad nonce: {e}")))?;
    if nonce.len() != NONCE_LEN {
        return Err(DecryptError::Failed(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce.len()
        )));
    }
    let ephemeral = base64_to_bytes32(&payload.ephem_public_key)
        .map_err(|e| DecryptError::Failed(format!("bad ephemeral key: {e}")))?;
    let sealed = STANDARD
        .decode(&payload.ciphertext)
        .map_err(|e| DecryptError::Failed(format!("bad ciphertext: {e}")))?;

    let salsa_box = SalsaBox::new(&PublicKey::from(ephemeral), secret);
    let plain = salsa_box
        .decrypt(GenericArray::from_slice(&nonce), sealed.as_slice())
        .map_err(|_| DecryptError::Failed("authentication failed".into()))?;

    String::from_utf8(plain).map_err(|e| DecryptError::Failed(format!("plaintext is not UTF-8: {e}")))
}
