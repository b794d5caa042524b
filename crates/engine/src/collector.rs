//! Client side of the collector service.
//!
//! The collector scrapes the bank on its own schedule: `trigger_fetch` starts
//! a job, `fetch_result` returns the buffered rows once they are ready.

use std::{future::Future, time::Duration};

use api_types::collector::{CardInfo, CollectedTransaction, PayBill, StatusBody};
use reqwest::{StatusCode, Url};

use crate::{EngineError, ResultEngine};

/// Message the collector returns while its buffer file does not exist yet.
const COLD_START_MARKER: &str = "No such file";

/// Operations the engine needs from the collector.
pub trait Collector: Send + Sync {
    /// `Ok` when the collector answers its health check.
    fn health(&self) -> impl Future<Output = ResultEngine<()>> + Send;

    /// Starts a fetch job. Fails with [`EngineError::CollectorUnavailable`]
    /// when the job is not accepted.
    fn trigger_fetch(&self) -> impl Future<Output = ResultEngine<()>> + Send;

    /// Fetches the job result. A job that is still running yields
    /// [`EngineError::NotReady`].
    fn fetch_result(&self) -> impl Future<Output = ResultEngine<Vec<CollectedTransaction>>> + Send;

    /// Pays the whole batch in one call. Fails with
    /// [`EngineError::PaymentFailed`].
    fn pay_bill(
        &self,
        transactions: &[CollectedTransaction],
    ) -> impl Future<Output = ResultEngine<()>> + Send;

    fn card_info(&self) -> impl Future<Output = ResultEngine<CardInfo>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpCollector {
    base_url: String,
    http: reqwest::Client,
}

impl HttpCollector {
    /// `timeout` bounds every single request.
    pub fn new(base_url: &str, timeout: Duration) -> ResultEngine<Self> {
        Url::parse(base_url)
            .map_err(|err| EngineError::Transport(format!("invalid collector url: {err}")))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Collector for HttpCollector {
    async fn health(&self) -> ResultEngine<()> {
        let res = self
            .http
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|err| EngineError::CollectorUnavailable(err.to_string()))?;
        if res.status() == StatusCode::OK {
            return Ok(());
        }
        Err(EngineError::CollectorUnavailable(format!(
            "health check returned {}",
            res.status()
        )))
    }

    async fn trigger_fetch(&self) -> ResultEngine<()> {
        tracing::info!("triggering collector fetch");
        let res = self
            .http
            .post(self.url("/fetch-transactions"))
            .send()
            .await
            .map_err(|err| EngineError::CollectorUnavailable(err.to_string()))?;
        let status = res.status();
        if status == StatusCode::OK {
            return Ok(());
        }
        let message = status_message(status, &res.bytes().await.unwrap_or_default());
        tracing::warn!("collector refused fetch: {message}");
        Err(EngineError::CollectorUnavailable(message))
    }

    async fn fetch_result(&self) -> ResultEngine<Vec<CollectedTransaction>> {
        let res = self.http.get(self.url("/transactions")).send().await?;
        let status = res.status();
        let body = res.bytes().await?;
        classify_result(status, &body)
    }

    async fn pay_bill(&self, transactions: &[CollectedTransaction]) -> ResultEngine<()> {
        let payload = PayBill {
            transactions: transactions.to_vec(),
        };
        let res = self
            .http
            .post(self.url("/pay-bill"))
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                tracing::error!("pay-bill request failed: {err}");
                EngineError::PaymentFailed("collector unreachable".to_string())
            })?;
        let status = res.status();
        if status == StatusCode::OK {
            return Ok(());
        }
        let message = status_message(status, &res.bytes().await.unwrap_or_default());
        Err(EngineError::PaymentFailed(message))
    }

    async fn card_info(&self) -> ResultEngine<CardInfo> {
        let res = self.http.get(self.url("/cardInfo")).send().await?;
        let status = res.status();
        let body = res.bytes().await?;
        if status != StatusCode::OK {
            return Err(EngineError::Collector(status_message(status, &body)));
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Maps a `GET /transactions` response to rows, `NotReady` or an error.
///
/// A 500 whose message says the buffer file does not exist yet is an empty
/// result, not a failure.
pub(crate) fn classify_result(
    status: StatusCode,
    body: &[u8],
) -> ResultEngine<Vec<CollectedTransaction>> {
    match status {
        StatusCode::OK => Ok(serde_json::from_slice(body)?),
        StatusCode::ACCEPTED => Err(EngineError::NotReady),
        _ => {
            let parsed: StatusBody = serde_json::from_slice(body).unwrap_or_default();
            if status == StatusCode::INTERNAL_SERVER_ERROR
                && parsed.message.contains(COLD_START_MARKER)
            {
                tracing::debug!("collector has no buffered rows yet");
                return Ok(Vec::new());
            }
            Err(EngineError::Collector(status_message(status, body)))
        }
    }
}

fn status_message(status: StatusCode, body: &[u8]) -> String {
    match serde_json::from_slice::<StatusBody>(body) {
        Ok(parsed) if !parsed.message.is_empty() => parsed.message,
        _ => format!("HTTP {}", status.as_u16()),
    }
}
