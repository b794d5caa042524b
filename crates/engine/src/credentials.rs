//! Sources of the ledger bearer token.
//!
//! Tokens live outside the transaction state file. Blank values count as
//! missing.

use std::{fs, path::PathBuf};

pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

fn non_blank(token: String) -> Option<String> {
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Fixed token, mostly for tests.
#[derive(Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn missing() -> Self {
        Self(None)
    }
}

impl CredentialProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone().and_then(non_blank)
    }
}

/// Reads the token from an environment variable on every call.
#[derive(Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvToken {
    fn bearer_token(&self) -> Option<String> {
        std::env::var(&self.var).ok().and_then(non_blank)
    }
}

/// Reads the token from a dedicated file on every call.
#[derive(Clone)]
pub struct FileToken {
    path: PathBuf,
}

impl FileToken {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialProvider for FileToken {
    fn bearer_token(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => non_blank(raw),
            Err(err) => {
                tracing::debug!("no token at {}: {err}", self.path.display());
                None
            }
        }
    }
}

/// First provider that has a token wins.
pub struct FirstOf(pub Vec<Box<dyn CredentialProvider>>);

impl CredentialProvider for FirstOf {
    fn bearer_token(&self) -> Option<String> {
        self.0.iter().find_map(|provider| provider.bearer_token())
    }
}
