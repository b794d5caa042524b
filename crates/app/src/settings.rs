//! Handles settings for the application. Values come from
//! `config/billsync.toml`, then `BILLSYNC_*` environment variables, then
//! command line flags.

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use engine::{DEFAULT_LEDGER_URL, MatchPolicy, PollConfig};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "config/billsync.toml";

/// Environment variable holding the ledger token. Never read from the
/// config file.
pub const TOKEN_ENV: &str = "BILLSYNC_LEDGER_TOKEN";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub collector_url: String,
    pub ledger_url: String,
    pub state_path: PathBuf,
    /// File holding the ledger token, used when the environment has none.
    pub token_path: Option<PathBuf>,
    pub poll_max_attempts: u32,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub match_policy: MatchPolicy,
    pub refresh_after_payment: bool,
    pub level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            collector_url: "http://localhost:5001".to_string(),
            ledger_url: DEFAULT_LEDGER_URL.to_string(),
            state_path: PathBuf::from("config/billsync_state.json"),
            token_path: None,
            poll_max_attempts: 10,
            poll_interval_ms: 2000,
            request_timeout_ms: 1500,
            match_policy: MatchPolicy::First,
            refresh_after_payment: true,
            level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn poll(&self) -> PollConfig {
        PollConfig {
            max_attempts: self.poll_max_attempts,
            interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    /// Per-request timeout, kept below the poll interval so a slow answer
    /// never overlaps the next attempt.
    pub fn request_timeout(&self) -> Duration {
        let timeout = Duration::from_millis(self.request_timeout_ms);
        let interval = Duration::from_millis(self.poll_interval_ms);
        if timeout < interval {
            return timeout;
        }
        let clamped = (interval / 2).max(Duration::from_millis(1));
        tracing::warn!(
            "request_timeout_ms ({}) is not below poll_interval_ms ({}), using {}ms",
            self.request_timeout_ms,
            self.poll_interval_ms,
            clamped.as_millis()
        );
        clamped
    }
}

#[derive(Debug, Parser)]
#[command(name = "billsync")]
#[command(about = "Reconcile card transactions, pay bills and sync them to the budget ledger")]
pub struct Cli {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override the collector address (e.g. http://localhost:5001).
    #[arg(long)]
    collector_url: Option<String>,
    /// Override the local state file.
    #[arg(long)]
    state_path: Option<PathBuf>,
    /// Override the match policy (`first` or `closest`).
    #[arg(long, value_parser = parse_policy)]
    match_policy: Option<MatchPolicy>,
    /// Override the log level.
    #[arg(long)]
    level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Fetch transactions from the collector and merge them into local state.
    Refresh,
    /// List stored transactions.
    List,
    /// List unpaid transactions and their total.
    Unpaid {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Pay one or more transactions in a single bill payment.
    Pay {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    /// Pay every unpaid transaction.
    PayAll,
    /// Record a transaction in the ledger under a category.
    Categorize { id: Uuid, category_id: String },
    /// List the categories of the default budget.
    Categories,
    /// Delete a transaction from local state.
    Delete { id: Uuid },
    /// Revert a paid transaction to unpaid.
    MarkUnpaid { id: Uuid },
    /// Change the payment date of a paid transaction (RFC 3339 or YYYY-MM-DD).
    SetPaymentDate { id: Uuid, date: String },
    /// Check that the collector is reachable.
    Health,
    /// Show the card summary.
    Card,
    /// Export stored transactions as CSV.
    Export { path: PathBuf },
}

fn parse_policy(raw: &str) -> std::result::Result<MatchPolicy, String> {
    match raw.to_ascii_lowercase().as_str() {
        "first" => Ok(MatchPolicy::First),
        "closest" => Ok(MatchPolicy::Closest),
        other => Err(format!("unknown match policy: {other}")),
    }
}

pub fn load() -> Result<(Settings, Command)> {
    resolve(Cli::parse())
}

fn resolve(args: Cli) -> Result<(Settings, Command)> {
    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("BILLSYNC").try_parsing(true));
    let mut settings: Settings = builder.build()?.try_deserialize()?;

    if let Some(collector_url) = args.collector_url {
        settings.collector_url = collector_url;
    }
    if let Some(state_path) = args.state_path {
        settings.state_path = state_path;
    }
    if let Some(policy) = args.match_policy {
        settings.match_policy = policy;
    }
    if let Some(level) = args.level {
        settings.level = level;
    }

    Ok((settings, args.command))
}
