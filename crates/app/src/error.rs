use engine::EngineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl AppError {
    /// Text shown to the user; the detail goes to the debug log.
    pub fn user_message(&self, collector_url: &str) -> String {
        match self {
            Self::Engine(err) => err.user_message(collector_url),
            other => other.to_string(),
        }
    }
}
