use envelope::{DecryptError, KeyHolder};
use inv_vault_core::{Bytes32, LedgerInvoiceRecord};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;

/// A connected wallet account and what was decrypted for it.
///
/// Created on connect and dropped on disconnect; nothing outlives it. Decrypt
/// requests for the same invoice share one cell, so concurrent callers wait
/// for a single key-holder prompt instead of each raising their own.
pub struct Session {
    account: String,
    decrypted: Mutex<HashMap<Bytes32, Arc<OnceCell<String>>>>,
}

impl Session {
    pub fn connect(account: &str) -> Self {
        tracing::info!(%account, "session connected");
        Self {
            account: account.trim().to_string(),
            decrypted: Mutex::new(HashMap::new()),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<Bytes32, Arc<OnceCell<String>>>> {
        self.decrypted.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Plaintext of `record`, asking the key holder only on the first call
    /// that succeeds. Failures are not cached.
    pub async fn decrypt(
        &self,
        key_holder: &dyn KeyHolder,
        record: &LedgerInvoiceRecord,
    ) -> Result<String, DecryptError> {
        let cell = Arc::clone(self.cache().entry(record.id).or_default());
        let plaintext = cell
            .get_or_try_init(|| async {
                tracing::debug!(invoice_id = %record.id, "requesting decryption");
                key_holder.decrypt(&record.encrypted_data, &self.account).await
            })
            .await?;
        Ok(plaintext.clone())
    }

    pub fn cached(&self, invoice_id: &Bytes32) -> Option<String> {
        self.cache().get(invoice_id).and_then(|cell| cell.get().cloned())
    }

    pub fn disconnect(self) {
        let cached = self.cache().values().filter(|c| c.initialized()).count();
        tracing::info!(account = %self.account, cached, "session disconnected");
    }
}
