use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

pub use amount::Amount;
pub use api_types::{
    collector::{CardInfo, CollectedTransaction},
    ledger::{Account, Budget, Category, CategoryGroup},
};
pub use collector::{Collector, HttpCollector};
pub use credentials::{CredentialProvider, EnvToken, FileToken, FirstOf, StaticToken};
pub use error::EngineError;
pub use ledger::{DEFAULT_LEDGER_URL, HttpLedger, Ledger, LedgerSync};
pub use merge::{MatchPolicy, MergeOutcome, merge};
pub use payment::PaymentOrchestrator;
pub use poller::{FetchPoller, PollConfig};
pub use store::TransactionStore;
pub use transaction::{CategoryRef, DISPLAY_DATE_FORMAT, LEDGER_DATE_FORMAT, Transaction};

mod amount;
mod collector;
mod credentials;
mod error;
mod ledger;
mod merge;
mod payment;
mod poller;
mod store;
mod transaction;

type ResultEngine<T> = Result<T, EngineError>;

/// Reconciliation and payment sync over one collector, one ledger and one
/// local store.
pub struct Engine<C, L> {
    collector: Arc<C>,
    poller: FetchPoller<C>,
    ledger: LedgerSync<L>,
    payments: PaymentOrchestrator<C>,
    store: TransactionStore,
    policy: MatchPolicy,
    refresh_after_payment: bool,
    refresh_lock: Mutex<()>,
}

impl<C: Collector, L: Ledger> Engine<C, L> {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder<C, L> {
        EngineBuilder::default()
    }

    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    pub fn payments(&self) -> &PaymentOrchestrator<C> {
        &self.payments
    }

    pub fn match_policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Subscribes to store changes, see [`TransactionStore::subscribe`].
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.store.subscribe()
    }

    pub async fn transactions(&self) -> Vec<Transaction> {
        self.store.load().await
    }

    pub async fn transaction(&self, id: Uuid) -> ResultEngine<Transaction> {
        self.store
            .get(id)
            .await
            .ok_or_else(|| EngineError::KeyNotFound(id.to_string()))
    }

    /// Unpaid transactions in stored order, at most `limit` of them.
    pub async fn unpaid(&self, limit: Option<usize>) -> Vec<Transaction> {
        self.store
            .load()
            .await
            .into_iter()
            .filter(|tx| !tx.is_paid())
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    pub async fn has_unpaid(&self) -> bool {
        self.store.load().await.iter().any(|tx| !tx.is_paid())
    }

    /// Sum of the unpaid amounts. Amounts that do not parse are left out.
    pub async fn total_unpaid(&self) -> ResultEngine<Amount> {
        let amounts: Vec<Amount> = self
            .store
            .load()
            .await
            .iter()
            .filter(|tx| !tx.is_paid())
            .filter_map(|tx| match tx.amount_value() {
                Ok(amount) => Some(amount),
                Err(err) => {
                    tracing::debug!("skipping {} in unpaid total: {err}", tx.id());
                    None
                }
            })
            .collect();
        Amount::checked_sum(amounts)
            .ok_or_else(|| EngineError::InvalidAmount("unpaid total is too large".to_string()))
    }

    pub async fn health(&self) -> ResultEngine<()> {
        self.collector.health().await
    }

    pub async fn card_info(&self) -> ResultEngine<CardInfo> {
        self.collector.card_info().await
    }

    /// Runs a full fetch cycle and merges the result into the store.
    pub async fn refresh(&self) -> ResultEngine<MergeOutcome> {
        self.refresh_until(std::future::pending()).await
    }

    /// Same as [`Self::refresh`], cancelled with [`EngineError::Cancelled`]
    /// when `shutdown` completes during polling. The store is left untouched
    /// on any failure.
    pub async fn refresh_until<F>(&self, shutdown: F) -> ResultEngine<MergeOutcome>
    where
        F: Future<Output = ()>,
    {
        let _cycle = self.refresh_lock.lock().await;

        self.collector.health().await?;
        self.poller.trigger_fetch().await?;
        let rows = self.poller.poll_for_result_until(shutdown).await?;
        tracing::info!("collector returned {} transaction(s)", rows.len());

        let fetched: Vec<Transaction> = rows.into_iter().map(Transaction::from).collect();
        let policy = self.policy;
        self.store
            .update(move |transactions| {
                let outcome = merge(fetched, transactions, policy);
                transactions.clone_from(&outcome.transactions);
                Ok(outcome)
            })
            .await
    }

    pub async fn default_budget(&self) -> ResultEngine<Budget> {
        self.ledger.resolve_default_budget().await
    }

    /// Category groups of the default budget.
    pub async fn categories(&self) -> ResultEngine<Vec<CategoryGroup>> {
        let budget = self.ledger.resolve_default_budget().await?;
        self.ledger.category_groups(&budget.id).await
    }

    /// Records the transaction in the default budget under `category_id`.
    pub async fn categorize(&self, id: Uuid, category_id: &str) -> ResultEngine<Transaction> {
        let transaction = self.transaction(id).await?;
        let budget = self.ledger.resolve_default_budget().await?;
        self.ledger
            .categorize(&transaction, category_id, &budget.id)
            .await
    }

    pub async fn delete(&self, id: Uuid) -> ResultEngine<Transaction> {
        if self.payments.is_processing(id) {
            return Err(EngineError::PaymentInProgress(id.to_string()));
        }
        let removed = self.store.remove(id).await?;
        tracing::info!("deleted transaction {id}");
        Ok(removed)
    }

    pub async fn pay(&self, id: Uuid) -> ResultEngine<Transaction> {
        let paid = self.payments.pay(id).await?;
        self.reconcile_after_payment().await;
        Ok(paid)
    }

    pub async fn submit_bill_payment(&self, ids: &[Uuid]) -> ResultEngine<Vec<Transaction>> {
        let paid = self.payments.submit_bill_payment(ids).await?;
        self.reconcile_after_payment().await;
        Ok(paid)
    }

    pub async fn pay_all_unpaid(&self) -> ResultEngine<Vec<Transaction>> {
        let paid = self.payments.pay_all_unpaid().await?;
        self.reconcile_after_payment().await;
        Ok(paid)
    }

    pub async fn mark_unpaid(&self, id: Uuid) -> ResultEngine<Transaction> {
        self.payments.mark_unpaid(id).await
    }

    pub async fn set_payment_date(&self, id: Uuid, at: DateTime<Utc>) -> ResultEngine<Transaction> {
        self.payments.set_payment_date(id, at).await
    }

    /// A payment already succeeded, so a failed refresh is only logged.
    async fn reconcile_after_payment(&self) {
        if !self.refresh_after_payment {
            return;
        }
        if let Err(err) = self.refresh().await {
            tracing::warn!("refresh after payment failed: {err}");
        }
    }
}

pub struct EngineBuilder<C, L> {
    collector: Option<Arc<C>>,
    ledger: Option<Arc<L>>,
    store: Option<TransactionStore>,
    poll: PollConfig,
    policy: MatchPolicy,
    refresh_after_payment: bool,
}

impl<C, L> Default for EngineBuilder<C, L> {
    fn default() -> Self {
        Self {
            collector: None,
            ledger: None,
            store: None,
            poll: PollConfig::default(),
            policy: MatchPolicy::default(),
            refresh_after_payment: true,
        }
    }
}

impl<C: Collector, L: Ledger> EngineBuilder<C, L> {
    /// Pass the required collector
    pub fn collector(mut self, collector: C) -> Self {
        self.collector = Some(Arc::new(collector));
        self
    }

    /// Pass the required ledger
    pub fn ledger(mut self, ledger: L) -> Self {
        self.ledger = Some(Arc::new(ledger));
        self
    }

    /// Pass the required store
    pub fn store(mut self, store: TransactionStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn match_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn refresh_after_payment(mut self, enabled: bool) -> Self {
        self.refresh_after_payment = enabled;
        self
    }

    /// Construct `Engine`
    pub fn build(self) -> ResultEngine<Engine<C, L>> {
        let collector = self
            .collector
            .ok_or_else(|| EngineError::Config("missing collector".to_string()))?;
        let ledger = self
            .ledger
            .ok_or_else(|| EngineError::Config("missing ledger".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| EngineError::Config("missing store".to_string()))?;

        Ok(Engine {
            poller: FetchPoller::new(collector.clone(), self.poll),
            ledger: LedgerSync::new(ledger, store.clone()),
            payments: PaymentOrchestrator::new(collector.clone(), store.clone()),
            collector,
            store,
            policy: self.policy,
            refresh_after_payment: self.refresh_after_payment,
            refresh_lock: Mutex::new(()),
        })
    }
}
