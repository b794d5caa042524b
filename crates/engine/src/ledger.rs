//! Budgeting ledger client and the categorization adapter on top of it.

use std::{future::Future, sync::Arc, time::Duration};

use api_types::ledger::{
    Account, AccountsData, Budget, BudgetsData, Category, CategoryGroup, CategoryGroupsData,
    Cleared, CreateTransaction, Envelope, ErrorBody, NewTransaction,
};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::{
    CredentialProvider, EngineError, ResultEngine, Transaction, TransactionStore,
};

pub const DEFAULT_LEDGER_URL: &str = "https://api.ynab.com/v1";

/// Operations the engine needs from the ledger.
pub trait Ledger: Send + Sync {
    fn budgets(&self) -> impl Future<Output = ResultEngine<Vec<Budget>>> + Send;

    fn accounts(&self, budget_id: &str) -> impl Future<Output = ResultEngine<Vec<Account>>> + Send;

    fn category_groups(
        &self,
        budget_id: &str,
    ) -> impl Future<Output = ResultEngine<Vec<CategoryGroup>>> + Send;

    /// Records a transaction. Fails with [`EngineError::LedgerCreateFailed`]
    /// unless the ledger answers 201.
    fn create_transaction(
        &self,
        budget_id: &str,
        transaction: NewTransaction,
    ) -> impl Future<Output = ResultEngine<()>> + Send;
}

pub struct HttpLedger {
    base_url: String,
    http: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpLedger {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        credentials: Arc<dyn CredentialProvider>,
    ) -> ResultEngine<Self> {
        Url::parse(base_url)
            .map_err(|err| EngineError::Transport(format!("invalid ledger url: {err}")))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Fails fast, before any request is built.
    fn token(&self) -> ResultEngine<String> {
        self.credentials
            .bearer_token()
            .ok_or(EngineError::NoCredential)
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> ResultEngine<T> {
        let token = self.token()?;
        let res = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await?;

        let status = res.status();
        let body = res.bytes().await?;
        if !status.is_success() {
            let message = error_detail(&body);
            tracing::warn!("ledger GET {path} failed with {status}: {message}");
            return Err(EngineError::Ledger {
                status: status.as_u16(),
                message,
            });
        }
        let envelope: Envelope<T> = serde_json::from_slice(&body)?;
        Ok(envelope.data)
    }
}

impl Ledger for HttpLedger {
    async fn budgets(&self) -> ResultEngine<Vec<Budget>> {
        let data: BudgetsData = self.get_data("/budgets").await?;
        tracing::debug!("ledger returned {} budgets", data.budgets.len());
        Ok(data.budgets)
    }

    async fn accounts(&self, budget_id: &str) -> ResultEngine<Vec<Account>> {
        let data: AccountsData = self
            .get_data(&format!("/budgets/{budget_id}/accounts"))
            .await?;
        Ok(data.accounts)
    }

    async fn category_groups(&self, budget_id: &str) -> ResultEngine<Vec<CategoryGroup>> {
        let data: CategoryGroupsData = self
            .get_data(&format!("/budgets/{budget_id}/categories"))
            .await?;
        Ok(data.category_groups)
    }

    async fn create_transaction(
        &self,
        budget_id: &str,
        transaction: NewTransaction,
    ) -> ResultEngine<()> {
        let token = self.token()?;
        let res = self
            .http
            .post(self.url(&format!("/budgets/{budget_id}/transactions")))
            .bearer_auth(token)
            .json(&CreateTransaction { transaction })
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::CREATED {
            return Ok(());
        }
        let message = error_detail(&res.bytes().await.unwrap_or_default());
        tracing::error!("ledger refused transaction ({status}): {message}");
        Err(EngineError::LedgerCreateFailed(message))
    }
}

fn error_detail(body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .map(|err| err.error)
        .and_then(|err| {
            [err.detail, err.name, err.id]
                .into_iter()
                .find(|part| !part.is_empty())
        })
        .unwrap_or_else(|| "unknown error".to_string())
}

/// Resolves ledger context and pushes categorized transactions.
pub struct LedgerSync<L> {
    ledger: Arc<L>,
    store: TransactionStore,
}

impl<L: Ledger> LedgerSync<L> {
    pub fn new(ledger: Arc<L>, store: TransactionStore) -> Self {
        Self { ledger, store }
    }

    /// The first budget; the engine works with a single budget.
    pub async fn resolve_default_budget(&self) -> ResultEngine<Budget> {
        self.ledger
            .budgets()
            .await?
            .into_iter()
            .next()
            .ok_or(EngineError::NoBudget)
    }

    /// The first open credit card account of the budget.
    pub async fn resolve_credit_account(&self, budget_id: &str) -> ResultEngine<Account> {
        self.ledger
            .accounts(budget_id)
            .await?
            .into_iter()
            .find(Account::is_eligible_credit_card)
            .ok_or(EngineError::NoEligibleAccount)
    }

    pub async fn category_groups(&self, budget_id: &str) -> ResultEngine<Vec<CategoryGroup>> {
        self.ledger.category_groups(budget_id).await
    }

    /// Looks a category up across every group of the budget.
    pub async fn resolve_category(
        &self,
        budget_id: &str,
        category_id: &str,
    ) -> ResultEngine<Category> {
        self.ledger
            .category_groups(budget_id)
            .await?
            .into_iter()
            .flat_map(|group| group.categories)
            .find(|category| category.id == category_id)
            .ok_or_else(|| EngineError::UnknownCategory(category_id.to_string()))
    }

    /// Records `transaction` in the ledger under `category_id`, then stores
    /// the category on the local copy.
    ///
    /// Local state changes only after the ledger confirmed the write.
    pub async fn categorize(
        &self,
        transaction: &Transaction,
        category_id: &str,
        budget_id: &str,
    ) -> ResultEngine<Transaction> {
        let amount = transaction.amount_value()?;
        let date = transaction.ledger_date()?;

        let account = self.resolve_credit_account(budget_id).await?;
        let category = self.resolve_category(budget_id, category_id).await?;

        let new = NewTransaction {
            account_id: account.id,
            date,
            amount: amount.to_outflow_milliunits(),
            payee_name: Some(transaction.name.clone()),
            category_id: Some(category.id.clone()),
            memo: None,
            cleared: Cleared::Uncleared,
            approved: true,
        };
        tracing::info!(
            "creating ledger transaction for {} ({} milliunits) in {}",
            transaction.id(),
            new.amount,
            category.name
        );
        self.ledger.create_transaction(budget_id, new).await?;

        let id = transaction.id();
        self.store
            .update(|transactions| {
                let stored = transactions
                    .iter_mut()
                    .find(|tx| tx.id() == id)
                    .ok_or_else(|| EngineError::KeyNotFound(id.to_string()))?;
                stored.assign_category(category.id, category.name);
                Ok(stored.clone())
            })
            .await
            .inspect_err(|err| {
                tracing::warn!("ledger transaction created but local update failed: {err}");
            })
    }
}
