//! The module contains the errors the engine can throw.
//!
//! Collector-side failures ([`Transport`], [`CollectorUnavailable`],
//! [`Collector`], [`PollTimeout`]) carry an actionable hint through
//! [`EngineError::user_message`]. [`NotReady`] never leaves the poll loop.
//!
//!  [`Transport`]: EngineError::Transport
//!  [`CollectorUnavailable`]: EngineError::CollectorUnavailable
//!  [`Collector`]: EngineError::Collector
//!  [`PollTimeout`]: EngineError::PollTimeout
//!  [`NotReady`]: EngineError::NotReady
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("collector result not ready")]
    NotReady,
    #[error("collector unavailable: {0}")]
    CollectorUnavailable(String),
    #[error("collector error: {0}")]
    Collector(String),
    #[error("collector result not ready after {attempts} attempts")]
    PollTimeout { attempts: u32 },
    #[error("unexpected payload: {0}")]
    Decoding(String),
    #[error("no ledger credential configured")]
    NoCredential,
    #[error("ledger has no budget")]
    NoBudget,
    #[error("ledger budget has no open credit card account")]
    NoEligibleAccount,
    #[error("\"{0}\" is not a category of the budget")]
    UnknownCategory(String),
    #[error("ledger error {status}: {message}")]
    Ledger { status: u16, message: String },
    #[error("ledger rejected transaction: {0}")]
    LedgerCreateFailed(String),
    #[error("payment failed: {0}")]
    PaymentFailed(String),
    #[error("\"{0}\" is already paid")]
    AlreadyPaid(String),
    #[error("\"{0}\" is not paid")]
    NotPaid(String),
    #[error("payment already in progress for \"{0}\"")]
    PaymentInProgress(String),
    #[error("no transactions to pay")]
    EmptyBatch,
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("state storage error: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Returns `true` for failures raised while talking to the collector.
    pub fn is_collector_error(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::CollectorUnavailable(_)
                | Self::Collector(_)
                | Self::PollTimeout { .. }
                | Self::PaymentFailed(_)
        )
    }

    /// Short, user-facing description of the error.
    ///
    /// `collector_url` is the configured collector address, used in the hint
    /// attached to collector failures.
    pub fn user_message(&self, collector_url: &str) -> String {
        let message = match self {
            Self::Transport(_) => "Cannot reach the collector.".to_string(),
            Self::NotReady | Self::PollTimeout { .. } => {
                "Transactions are not ready yet, try again in a moment.".to_string()
            }
            Self::CollectorUnavailable(_) => "The collector did not accept the request.".to_string(),
            Self::Collector(message) => format!("The collector reported an error: {message}"),
            Self::Decoding(_) => "Received an unexpected response.".to_string(),
            Self::NoCredential => "Add your ledger access token first.".to_string(),
            Self::NoBudget => "Your ledger has no budget.".to_string(),
            Self::NoEligibleAccount => "No open credit card account found in your budget.".to_string(),
            Self::UnknownCategory(_) => "That category does not exist in your budget.".to_string(),
            Self::Ledger { status, .. } => format!("The ledger request failed ({status})."),
            Self::LedgerCreateFailed(_) => "The ledger rejected the transaction.".to_string(),
            Self::PaymentFailed(reason) => format!("Payment failed: {reason}"),
            Self::AlreadyPaid(_) => "This transaction is already paid.".to_string(),
            Self::NotPaid(_) => "This transaction is not paid.".to_string(),
            Self::PaymentInProgress(_) => "A payment is already in progress.".to_string(),
            Self::EmptyBatch => "There is nothing to pay.".to_string(),
            Self::KeyNotFound(_) => "Transaction not found.".to_string(),
            Self::InvalidAmount(_) => "A transaction has an invalid amount.".to_string(),
            Self::InvalidDate(_) => "A transaction has an invalid date.".to_string(),
            Self::Cancelled => "Cancelled.".to_string(),
            Self::Storage(_) => "Could not save local state.".to_string(),
            Self::Config(message) => format!("Invalid configuration: {message}"),
        };

        if self.is_collector_error() {
            format!("{message}\nMake sure the collector is running and reachable at {collector_url}.")
        } else {
            message
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Transport(a), Self::Transport(b)) => a == b,
            (Self::NotReady, Self::NotReady) => true,
            (Self::CollectorUnavailable(a), Self::CollectorUnavailable(b)) => a == b,
            (Self::Collector(a), Self::Collector(b)) => a == b,
            (Self::PollTimeout { attempts: a }, Self::PollTimeout { attempts: b }) => a == b,
            (Self::Decoding(a), Self::Decoding(b)) => a == b,
            (Self::NoCredential, Self::NoCredential) => true,
            (Self::NoBudget, Self::NoBudget) => true,
            (Self::NoEligibleAccount, Self::NoEligibleAccount) => true,
            (Self::UnknownCategory(a), Self::UnknownCategory(b)) => a == b,
            (
                Self::Ledger {
                    status: a,
                    message: ma,
                },
                Self::Ledger {
                    status: b,
                    message: mb,
                },
            ) => a == b && ma == mb,
            (Self::LedgerCreateFailed(a), Self::LedgerCreateFailed(b)) => a == b,
            (Self::PaymentFailed(a), Self::PaymentFailed(b)) => a == b,
            (Self::AlreadyPaid(a), Self::AlreadyPaid(b)) => a == b,
            (Self::NotPaid(a), Self::NotPaid(b)) => a == b,
            (Self::PaymentInProgress(a), Self::PaymentInProgress(b)) => a == b,
            (Self::EmptyBatch, Self::EmptyBatch) => true,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidDate(a), Self::InvalidDate(b)) => a == b,
            (Self::Cancelled, Self::Cancelled) => true,
            (Self::Storage(a), Self::Storage(b)) => a == b,
            (Self::Config(a), Self::Config(b)) => a == b,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decoding(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decoding(err.to_string())
    }
}
