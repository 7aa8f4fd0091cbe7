use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const APP_NAME: &str = "inv-vault";
const KEYCHAIN_SERVICE: &str = "inv.vault.credentials";

pub const EXPLORER_API_KEY: &str = "explorer_api_key";
pub const EXPLORER_API_KEY_ENV: &str = "INV_VAULT_EXPLORER_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_kind")]
    pub kind: String, // "mock"
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            kind: default_ledger_kind(),
            page_size: default_page_size(),
            read_retries: default_read_retries(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Etherscan-compatible API endpoint, e.g. `https://api-moonbase.moonscan.io/api`.
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_audit_log")]
    pub audit_log: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            audit_log: default_audit_log(),
        }
    }
}

fn default_ledger_kind() -> String {
    "mock".to_string()
}

fn default_page_size() -> u64 {
    20
}

fn default_read_retries() -> u32 {
    3
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".inv_vault")
}

fn default_audit_log() -> PathBuf {
    PathBuf::from("audit.jsonl")
}

pub fn load() -> Result<AppConfig> {
    let cfg: AppConfig = confy::load(APP_NAME, None).context("Failed to load app config")?;
    Ok(cfg)
}

pub fn store(cfg: &AppConfig) -> Result<()> {
    confy::store(APP_NAME, None, cfg).context("Failed to store app config")?;
    Ok(())
}

/// Store a secret in the OS keychain
pub fn store_secret(key: &str, value: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.set_password(value)?;
    Ok(())
}

/// Retrieve a secret from the OS keychain
pub fn get_secret(key: &str) -> Result<String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    let password = entry.get_password()?;
    Ok(password)
}

/// Delete a secret from the OS keychain
pub fn delete_secret(key: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.delete_password()?;
    Ok(())
}

/// Explorer API key from the environment, falling back to the keychain.
pub fn explorer_api_key() -> Option<String> {
    std::env::var(EXPLORER_API_KEY_ENV)
        .ok()
        .filter(|k| !k.is_empty())
        .or_else(|| get_secret(EXPLORER_API_KEY).ok())
}
