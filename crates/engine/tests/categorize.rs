use std::{sync::Arc, time::Duration};

use api_types::ledger::Cleared;
use engine::{Engine, EngineError, HttpLedger, StaticToken, TransactionStore};

mod common;

use common::{FakeCollector, FakeLedger, engine_with, row};

async fn refreshed(
    rows: Vec<engine::CollectedTransaction>,
) -> (FakeCollector, FakeLedger, Engine<FakeCollector, FakeLedger>) {
    let collector = FakeCollector::with_rows(rows);
    let ledger = FakeLedger::default();
    let engine = engine_with(&collector, &ledger);
    engine.refresh().await.unwrap();
    (collector, ledger, engine)
}

#[tokio::test]
async fn categorized_transactions_are_outflows_on_the_card() {
    let (_, ledger, engine) = refreshed(vec![
        row("Jun 01, 2025", "Coffee Shop", "-12.34"),
        row("2025-06-02", "Refund", "5.00"),
    ])
    .await;
    let txs = engine.transactions().await;

    let coffee = engine.categorize(txs[0].id(), "cat-food").await.unwrap();
    assert_eq!(coffee.category_id(), Some("cat-food"));
    assert_eq!(coffee.category_name(), Some("Groceries"));
    engine.categorize(txs[1].id(), "cat-fun").await.unwrap();

    let created = ledger.created();
    assert_eq!(created.len(), 2);
    let (budget, first) = &created[0];
    assert_eq!(budget, "b1");
    assert_eq!(first.account_id, "acc-card");
    assert_eq!(first.date, "2025-06-01");
    assert_eq!(first.amount, -12340);
    assert_eq!(first.payee_name.as_deref(), Some("Coffee Shop"));
    assert_eq!(first.category_id.as_deref(), Some("cat-food"));
    assert_eq!(first.memo, None);
    assert_eq!(first.cleared, Cleared::Uncleared);
    assert!(first.approved);

    assert_eq!(created[1].1.date, "2025-06-02");
    assert_eq!(created[1].1.amount, -5000);

    let stored = engine.transaction(txs[1].id()).await.unwrap();
    assert_eq!(stored.category_name(), Some("Fun"));
}

#[tokio::test]
async fn unknown_category_fails_before_any_write() {
    let (_, ledger, engine) = refreshed(vec![row("Jun 01, 2025", "Coffee Shop", "-4.50")]).await;
    let id = engine.transactions().await[0].id();

    let err = engine.categorize(id, "cat-nope").await.unwrap_err();
    assert_eq!(err, EngineError::UnknownCategory("cat-nope".to_string()));
    assert!(ledger.created().is_empty());
    assert_eq!(engine.transaction(id).await.unwrap().category(), None);
}

#[tokio::test]
async fn ledger_rejection_leaves_local_state_alone() {
    let (_, ledger, engine) = refreshed(vec![row("Jun 01, 2025", "Coffee Shop", "-4.50")]).await;
    let id = engine.transactions().await[0].id();
    ledger.reject_creates(true);

    let err = engine.categorize(id, "cat-food").await.unwrap_err();
    assert!(matches!(err, EngineError::LedgerCreateFailed(_)));
    assert_eq!(engine.transaction(id).await.unwrap().category(), None);
}

#[tokio::test]
async fn closed_cards_are_not_eligible() {
    let (_, ledger, engine) = refreshed(vec![row("Jun 01, 2025", "Coffee Shop", "-4.50")]).await;
    let id = engine.transactions().await[0].id();
    ledger.close_all_accounts();

    assert_eq!(
        engine.categorize(id, "cat-food").await.unwrap_err(),
        EngineError::NoEligibleAccount
    );
    assert!(ledger.created().is_empty());
}

#[tokio::test]
async fn unreadable_dates_and_amounts_are_refused() {
    let (_, ledger, engine) = refreshed(vec![
        row("yesterday", "Coffee Shop", "-4.50"),
        row("Jun 01, 2025", "Grocer", "n/a"),
    ])
    .await;
    let txs = engine.transactions().await;

    assert!(matches!(
        engine.categorize(txs[0].id(), "cat-food").await,
        Err(EngineError::InvalidDate(_))
    ));
    assert!(matches!(
        engine.categorize(txs[1].id(), "cat-food").await,
        Err(EngineError::InvalidAmount(_))
    ));
    assert!(ledger.created().is_empty());
}

#[tokio::test]
async fn categories_of_the_default_budget() {
    let (_, _, engine) = refreshed(Vec::new()).await;

    assert_eq!(engine.default_budget().await.unwrap().id, "b1");
    let groups = engine.categories().await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].categories[1].name, "Fun");
}

#[tokio::test]
async fn ledger_without_budgets_is_reported() {
    let collector = FakeCollector::with_rows(vec![row("Jun 01, 2025", "Coffee Shop", "-12.34")]);
    let ledger = FakeLedger::without_budgets();
    let engine = engine_with(&collector, &ledger);
    engine.refresh().await.unwrap();
    let id = engine.transactions().await[0].id();

    assert_eq!(engine.default_budget().await.unwrap_err(), EngineError::NoBudget);
    assert_eq!(engine.categories().await.unwrap_err(), EngineError::NoBudget);
    assert_eq!(
        engine.categorize(id, "cat-food").await.unwrap_err(),
        EngineError::NoBudget
    );
    assert!(ledger.created().is_empty());
    assert!(engine.transaction(id).await.unwrap().category_id().is_none());
}

#[tokio::test]
async fn missing_token_is_reported_without_network() {
    let collector = FakeCollector::with_rows(vec![row("Jun 01, 2025", "Coffee Shop", "-4.50")]);
    // Nothing listens on the discard port.
    let ledger = HttpLedger::new(
        "http://127.0.0.1:9",
        Duration::from_millis(200),
        Arc::new(StaticToken::missing()),
    )
    .unwrap();
    let engine = Engine::builder()
        .collector(collector)
        .ledger(ledger)
        .store(TransactionStore::in_memory())
        .poll(common::fast_poll())
        .build()
        .unwrap();
    engine.refresh().await.unwrap();
    let id = engine.transactions().await[0].id();

    assert_eq!(
        engine.categorize(id, "cat-food").await.unwrap_err(),
        EngineError::NoCredential
    );
    assert_eq!(engine.categories().await.unwrap_err(), EngineError::NoCredential);
}

#[tokio::test]
async fn builder_requires_every_collaborator() {
    let missing = Engine::<FakeCollector, FakeLedger>::builder()
        .collector(FakeCollector::default())
        .store(TransactionStore::in_memory())
        .build();
    assert!(matches!(missing, Err(EngineError::Config(_))));
}
