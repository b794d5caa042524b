use std::{process::ExitCode, sync::Arc};

use engine::{
    CredentialProvider, Engine, EnvToken, FileToken, FirstOf, HttpCollector, HttpLedger,
    TransactionStore,
};

use crate::{
    error::Result,
    settings::{Settings, TOKEN_ENV},
};

mod commands;
mod error;
mod export;
mod settings;

#[tokio::main]
async fn main() -> ExitCode {
    let (settings, command) = match settings::load() {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "billsync={level},engine={level}",
            level = settings.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let outcome = match build_engine(&settings) {
        Ok(engine) => {
            tracing::debug!("state file: {}", settings.state_path.display());
            commands::run(&engine, command).await
        }
        Err(err) => Err(err),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!("{err:?}");
            eprintln!("{}", err.user_message(&settings.collector_url));
            ExitCode::FAILURE
        }
    }
}

fn build_engine(settings: &Settings) -> Result<Engine<HttpCollector, HttpLedger>> {
    let timeout = settings.request_timeout();

    let mut providers: Vec<Box<dyn CredentialProvider>> = vec![Box::new(EnvToken::new(TOKEN_ENV))];
    if let Some(path) = &settings.token_path {
        providers.push(Box::new(FileToken::new(path)));
    }

    if let Some(dir) = settings.state_path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let engine = Engine::builder()
        .collector(HttpCollector::new(&settings.collector_url, timeout)?)
        .ledger(HttpLedger::new(
            &settings.ledger_url,
            timeout,
            Arc::new(FirstOf(providers)),
        )?)
        .store(TransactionStore::open(&settings.state_path)?)
        .poll(settings.poll())
        .match_policy(settings.match_policy)
        .refresh_after_payment(settings.refresh_after_payment)
        .build()?;
    Ok(engine)
}
