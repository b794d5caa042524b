#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use api_types::ledger::NewTransaction;
use engine::{
    Account, Budget, CardInfo, Category, CategoryGroup, CollectedTransaction, Collector, Engine,
    EngineError, Ledger, PollConfig, TransactionStore,
};
use tokio::sync::Notify;
use uuid::Uuid;

pub fn row(date: &str, name: &str, amount: &str) -> CollectedTransaction {
    CollectedTransaction {
        date: date.to_string(),
        name: name.to_string(),
        amount: amount.to_string(),
    }
}

/// Fresh state file path under `target/test_state`.
pub fn state_path() -> PathBuf {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_state");
    std::fs::create_dir_all(&root).unwrap();
    root.join(format!("engine_{}.json", Uuid::new_v4()))
}

pub fn fast_poll() -> PollConfig {
    PollConfig {
        max_attempts: 3,
        interval: Duration::from_millis(5),
    }
}

pub fn engine_at<L: Ledger>(
    collector: &FakeCollector,
    ledger: L,
    path: &PathBuf,
) -> Engine<FakeCollector, L> {
    Engine::builder()
        .collector(collector.clone())
        .ledger(ledger)
        .store(TransactionStore::open(path).unwrap())
        .poll(fast_poll())
        .refresh_after_payment(false)
        .build()
        .unwrap()
}

pub fn engine_with(collector: &FakeCollector, ledger: &FakeLedger) -> Engine<FakeCollector, FakeLedger> {
    engine_at(collector, ledger.clone(), &state_path())
}

#[derive(Default)]
struct CollectorState {
    rows: Mutex<Vec<CollectedTransaction>>,
    down: AtomicBool,
    decline: AtomicBool,
    hold: AtomicBool,
    entered: Notify,
    release: Notify,
    payments: Mutex<Vec<Vec<CollectedTransaction>>>,
    triggers: AtomicU32,
}

/// In-process collector. Results are ready on the first poll.
#[derive(Clone, Default)]
pub struct FakeCollector(Arc<CollectorState>);

impl FakeCollector {
    pub fn with_rows(rows: Vec<CollectedTransaction>) -> Self {
        let collector = Self::default();
        collector.set_rows(rows);
        collector
    }

    pub fn set_rows(&self, rows: Vec<CollectedTransaction>) {
        *self.0.rows.lock().unwrap() = rows;
    }

    pub fn set_down(&self, down: bool) {
        self.0.down.store(down, Ordering::SeqCst);
    }

    pub fn decline_payments(&self, decline: bool) {
        self.0.decline.store(decline, Ordering::SeqCst);
    }

    /// The next payment call blocks until [`Self::release_payment`].
    pub fn hold_next_payment(&self) {
        self.0.hold.store(true, Ordering::SeqCst);
    }

    pub async fn payment_entered(&self) {
        self.0.entered.notified().await;
    }

    pub fn release_payment(&self) {
        self.0.release.notify_one();
    }

    pub fn payments(&self) -> Vec<Vec<CollectedTransaction>> {
        self.0.payments.lock().unwrap().clone()
    }

    pub fn triggers(&self) -> u32 {
        self.0.triggers.load(Ordering::SeqCst)
    }
}

impl Collector for FakeCollector {
    async fn health(&self) -> Result<(), EngineError> {
        if self.0.down.load(Ordering::SeqCst) {
            return Err(EngineError::CollectorUnavailable("connection refused".to_string()));
        }
        Ok(())
    }

    async fn trigger_fetch(&self) -> Result<(), EngineError> {
        self.health().await?;
        self.0.triggers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_result(&self) -> Result<Vec<CollectedTransaction>, EngineError> {
        Ok(self.0.rows.lock().unwrap().clone())
    }

    async fn pay_bill(&self, transactions: &[CollectedTransaction]) -> Result<(), EngineError> {
        self.0.payments.lock().unwrap().push(transactions.to_vec());
        if self.0.hold.swap(false, Ordering::SeqCst) {
            self.0.entered.notify_one();
            self.0.release.notified().await;
        }
        if self.0.decline.load(Ordering::SeqCst) {
            return Err(EngineError::PaymentFailed("declined".to_string()));
        }
        Ok(())
    }

    async fn card_info(&self) -> Result<CardInfo, EngineError> {
        Ok(CardInfo {
            card_name: "Everyday Card".to_string(),
            last_four_digits: "4242".to_string(),
            current_balance: 1234.5,
        })
    }
}

struct LedgerState {
    budgets: Vec<Budget>,
    accounts: Mutex<Vec<Account>>,
    groups: Vec<CategoryGroup>,
    reject: AtomicBool,
    created: Mutex<Vec<(String, NewTransaction)>>,
}

/// In-process ledger with one budget, a closed and an open credit card
/// account, and two categories.
#[derive(Clone)]
pub struct FakeLedger(Arc<LedgerState>);

impl Default for FakeLedger {
    fn default() -> Self {
        Self::with_budgets(vec![Budget {
            id: "b1".to_string(),
            name: "Home".to_string(),
        }])
    }
}

impl FakeLedger {
    pub fn without_budgets() -> Self {
        Self::with_budgets(Vec::new())
    }

    fn with_budgets(budgets: Vec<Budget>) -> Self {
        let account = |id: &str, kind: &str, closed: bool| Account {
            id: id.to_string(),
            name: id.to_string(),
            kind: kind.to_string(),
            balance: 0,
            closed,
        };
        let category = |id: &str, name: &str| Category {
            id: id.to_string(),
            name: name.to_string(),
            balance: 0,
            category_group_id: "g1".to_string(),
        };
        Self(Arc::new(LedgerState {
            budgets,
            accounts: Mutex::new(vec![
                account("acc-old", "creditCard", true),
                account("acc-checking", "checking", false),
                account("acc-card", "creditCard", false),
            ]),
            groups: vec![CategoryGroup {
                id: "g1".to_string(),
                name: "Everyday".to_string(),
                categories: vec![category("cat-food", "Groceries"), category("cat-fun", "Fun")],
            }],
            reject: AtomicBool::new(false),
            created: Mutex::new(Vec::new()),
        }))
    }

    pub fn reject_creates(&self, reject: bool) {
        self.0.reject.store(reject, Ordering::SeqCst);
    }

    pub fn close_all_accounts(&self) {
        for account in self.0.accounts.lock().unwrap().iter_mut() {
            account.closed = true;
        }
    }

    pub fn created(&self) -> Vec<(String, NewTransaction)> {
        self.0.created.lock().unwrap().clone()
    }
}

impl Ledger for FakeLedger {
    async fn budgets(&self) -> Result<Vec<Budget>, EngineError> {
        Ok(self.0.budgets.clone())
    }

    async fn accounts(&self, _budget_id: &str) -> Result<Vec<Account>, EngineError> {
        Ok(self.0.accounts.lock().unwrap().clone())
    }

    async fn category_groups(&self, _budget_id: &str) -> Result<Vec<CategoryGroup>, EngineError> {
        Ok(self.0.groups.clone())
    }

    async fn create_transaction(
        &self,
        budget_id: &str,
        transaction: NewTransaction,
    ) -> Result<(), EngineError> {
        if self.0.reject.load(Ordering::SeqCst) {
            return Err(EngineError::LedgerCreateFailed("amount is invalid".to_string()));
        }
        self.0
            .created
            .lock()
            .unwrap()
            .push((budget_id.to_string(), transaction));
        Ok(())
    }
}
