//! inv-vault: issue encrypted invoices against a ledger and reconcile
//! incoming payments.

mod commands;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use ledger::{explorer::ExplorerClient, LedgerGateway, TransactionHistory};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "inv-vault")]
#[command(about = "Encrypted, ledger-anchored invoices", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a base64 public key to 0x-prefixed hex
    KeyToHex { key: String },

    /// Convert a 0x-prefixed hex key back to base64
    KeyToBase64 { key: String },

    /// Print the canonical JSON an invoice would be sealed with
    Draft {
        #[command(flatten)]
        draft: DraftArgs,
    },

    /// Encrypt an invoice for a receiver and anchor it on the ledger
    Issue {
        #[command(flatten)]
        draft: DraftArgs,

        /// Receiver's encryption public key (base64 or hex)
        #[arg(long)]
        receiver_key: String,

        /// Validate and seal only; nothing is submitted or recorded
        #[arg(long)]
        dry_run: bool,
    },

    /// List locally recorded invoices
    Entries,

    /// Match incoming payments against issued invoices
    Reconcile {
        /// Account receiving the payments
        #[arg(long)]
        address: String,

        /// Reference date for overdue checks (defaults to today)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct DraftArgs {
    #[arg(long)]
    title: String,

    /// VAT percentage
    #[arg(long, default_value = "8.1")]
    vat: String,

    /// Line item as DESCRIPTION=PRICE, repeatable
    #[arg(long = "item", value_parser = commands::parse_item)]
    items: Vec<(String, String)>,

    /// Payment due date (YYYY-MM-DD)
    #[arg(long)]
    due: Option<NaiveDate>,
}

impl DraftArgs {
    fn into_draft(self) -> inv_vault_core::InvoiceDraft {
        let mut draft = inv_vault_core::InvoiceDraft::new(self.title, self.vat);
        for (description, price) in self.items {
            draft = draft.with_item(description, price);
        }
        draft.payment_due_date = self.due;
        draft
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current configuration
    Show,

    /// Set the explorer API endpoint
    SetExplorerUrl { url: String },

    /// Store the explorer API key in the OS keychain
    SetApiKey { key: String },

    /// Remove the explorer API key from the OS keychain
    DeleteApiKey,
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sled=warn".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Gateway for the configured ledger. The in-memory mock is refused here:
/// it forgets every invoice when the process exits, so anchoring through it
/// would leave local entries that no receiver can ever list.
fn create_ledger_gateway(cfg: &config::AppConfig) -> Result<Arc<dyn LedgerGateway>> {
    match cfg.ledger.kind.as_str() {
        "mock" => anyhow::bail!(
            "ledger kind 'mock' keeps nothing between runs; use `issue --dry-run` to seal without anchoring"
        ),
        other => anyhow::bail!("ledger kind '{other}' is not supported"),
    }
}

fn create_history_feed(cfg: &config::AppConfig) -> Result<Arc<dyn TransactionHistory>> {
    let base_url = cfg
        .explorer
        .base_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("explorer base_url not configured"))?;
    let api_key = config::explorer_api_key();
    if api_key.is_none() {
        tracing::warn!("No explorer API key in env or keychain; requests may be rate limited");
    }
    Ok(ExplorerClient::new(base_url, api_key))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::KeyToHex { key } => commands::key_to_hex(&key),
        Commands::KeyToBase64 { key } => commands::key_to_base64(&key),
        Commands::Draft { draft } => commands::draft(&draft.into_draft()),
        Commands::Issue {
            draft,
            receiver_key,
            dry_run: true,
        } => commands::seal(&draft.into_draft(), &receiver_key),
        Commands::Issue {
            draft,
            receiver_key,
            dry_run: false,
        } => {
            let cfg = config::load().unwrap_or_default();
            let gateway = create_ledger_gateway(&cfg)?;
            let vault = commands::open_vault(&cfg, gateway)?;
            commands::issue(&vault, &draft.into_draft(), &receiver_key).await
        }
        Commands::Entries => {
            let cfg = config::load().unwrap_or_default();
            commands::entries(&cfg)
        }
        Commands::Reconcile { address, as_of } => {
            let cfg = config::load().unwrap_or_default();
            let history = create_history_feed(&cfg)?;
            let as_of = as_of.unwrap_or_else(|| chrono::Local::now().date_naive());
            commands::reconcile(&cfg, history.as_ref(), &address, as_of).await
        }
        Commands::Config { action } => commands::configure(action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_ledger_cannot_anchor() {
        let err = create_ledger_gateway(&config::AppConfig::default()).err().unwrap();
        assert!(err.to_string().contains("--dry-run"));

        let mut cfg = config::AppConfig::default();
        cfg.ledger.kind = "moonbase".into();
        assert!(create_ledger_gateway(&cfg).is_err());
    }

    #[test]
    fn issue_flags_parse() {
        let cli = Cli::try_parse_from([
            "inv-vault",
            "issue",
            "--title",
            "A",
            "--item",
            "x=100",
            "--receiver-key",
            "AQID",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Issue { draft, dry_run, .. } => {
                assert!(dry_run);
                assert_eq!(draft.into_draft().total_amount().to_string(), "100");
            }
            _ => panic!("expected issue"),
        }
    }
}
