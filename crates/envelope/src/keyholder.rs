use async_trait::async_trait;
use thiserror::Error;

/// Failure modes of a key holder. A refusal and a broken ciphertext are
/// reported differently to the user, so they are never merged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptError {
    #[error("decryption denied: {0}")]
    Denied(String),
    #[error("decryption failed: {0}")]
    Failed(String),
}

/// A party holding the private half of a receiver key, typically a wallet.
///
/// Each call may block on user approval.
#[async_trait]
pub trait KeyHolder: Send + Sync {
    /// Base64 encryption public key for `account`.
    async fn encryption_public_key(&self, account: &str) -> Result<String, DecryptError>;

    async fn decrypt(&self, ciphertext: &[u8], owner: &str) -> Result<String, DecryptError>;
}
