//! Trigger-then-poll coordination with the collector.
//!
//! A `FetchPoller` runs one poll sequence at a time per caller; it holds no
//! lock of its own, so callers must not start overlapping sequences on the
//! same collector. [`crate::Engine::refresh`] serializes its cycles for you.

use std::{future::Future, sync::Arc, time::Duration};

use api_types::collector::CollectedTransaction;

use crate::{Collector, EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Result requests before giving up. Values below 1 count as 1.
    pub max_attempts: u32,
    /// Pause between two not-ready answers.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(2),
        }
    }
}

pub struct FetchPoller<C> {
    collector: Arc<C>,
    config: PollConfig,
}

impl<C: Collector> FetchPoller<C> {
    pub fn new(collector: Arc<C>, config: PollConfig) -> Self {
        Self { collector, config }
    }

    pub async fn trigger_fetch(&self) -> ResultEngine<()> {
        self.collector.trigger_fetch().await
    }

    /// Requests the result until it is ready.
    ///
    /// Not-ready answers are retried after `interval` up to `max_attempts`
    /// requests in total, then the sequence fails with
    /// [`EngineError::PollTimeout`]. Every other error ends the sequence
    /// immediately.
    pub async fn poll_for_result(&self) -> ResultEngine<Vec<CollectedTransaction>> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.collector.fetch_result().await {
                Ok(rows) => {
                    tracing::info!("collector result ready after {attempts} attempt(s): {} rows", rows.len());
                    return Ok(rows);
                }
                Err(EngineError::NotReady) => {
                    tracing::debug!("collector result not ready ({attempts}/{max_attempts})");
                    if attempts >= max_attempts {
                        tracing::warn!("collector result still not ready after {attempts} attempts");
                        return Err(EngineError::PollTimeout { attempts });
                    }
                    tokio::time::sleep(self.config.interval).await;
                }
                Err(err) => {
                    tracing::error!("collector poll failed: {err}");
                    return Err(err);
                }
            }
        }
    }

    /// Same as [`Self::poll_for_result`], but gives up with
    /// [`EngineError::Cancelled`] as soon as `shutdown` completes. A shutdown
    /// that is already complete wins over a ready result.
    pub async fn poll_for_result_until<F>(
        &self,
        shutdown: F,
    ) -> ResultEngine<Vec<CollectedTransaction>>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            () = shutdown => {
                tracing::info!("poll cancelled");
                Err(EngineError::Cancelled)
            }
            res = self.poll_for_result() => res,
        }
    }

    /// Triggers a fetch job and polls for its result.
    pub async fn fetch(&self) -> ResultEngine<Vec<CollectedTransaction>> {
        self.trigger_fetch().await?;
        self.poll_for_result().await
    }
}
