//! Durable local copy of the transaction collection.
//!
//! The whole collection is replaced on every write. Read-modify-write cycles
//! go through [`TransactionStore::update`], which holds the store lock for the
//! whole cycle so concurrent categorization and payment updates never
//! overwrite each other.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, Transaction};

#[derive(Clone)]
pub struct TransactionStore {
    path: Option<PathBuf>,
    inner: Arc<Mutex<Vec<Transaction>>>,
    changes: Arc<watch::Sender<u64>>,
}

impl TransactionStore {
    /// Opens the store backed by `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> ResultEngine<Self> {
        let path = path.into();
        let transactions = read_json_file(&path)?;
        tracing::debug!(
            "loaded {} transactions from {}",
            transactions.len(),
            path.display()
        );
        Ok(Self::with_state(Some(path), transactions))
    }

    /// Store without persistence, for tests and dry runs.
    pub fn in_memory() -> Self {
        Self::with_state(None, Vec::new())
    }

    fn with_state(path: Option<PathBuf>, transactions: Vec<Transaction>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            path,
            inner: Arc::new(Mutex::new(transactions)),
            changes: Arc::new(changes),
        }
    }

    /// Snapshot of the whole collection.
    pub async fn load(&self) -> Vec<Transaction> {
        self.inner.lock().await.clone()
    }

    pub async fn get(&self, id: Uuid) -> Option<Transaction> {
        let guard = self.inner.lock().await;
        guard.iter().find(|tx| tx.id() == id).cloned()
    }

    /// Replaces the whole collection.
    pub async fn save(&self, transactions: Vec<Transaction>) -> ResultEngine<()> {
        self.update(move |current| {
            *current = transactions;
            Ok(())
        })
        .await
    }

    /// Runs one read-modify-write cycle.
    ///
    /// `f` works on a copy; the copy is persisted and published only if `f`
    /// succeeds and the result keeps ids unique. On any error the store is
    /// left untouched.
    pub async fn update<F, R>(&self, f: F) -> ResultEngine<R>
    where
        F: FnOnce(&mut Vec<Transaction>) -> ResultEngine<R>,
    {
        let mut guard = self.inner.lock().await;
        let mut working = guard.clone();
        let out = f(&mut working)?;

        ensure_unique_ids(&working)?;
        if let Some(path) = &self.path {
            write_json_file(path, &working)?;
        }
        *guard = working;
        drop(guard);

        self.changes.send_modify(|revision| *revision += 1);
        Ok(out)
    }

    /// Deletes a transaction from memory and disk in one cycle.
    pub async fn remove(&self, id: Uuid) -> ResultEngine<Transaction> {
        self.update(|transactions| {
            let index = transactions
                .iter()
                .position(|tx| tx.id() == id)
                .ok_or_else(|| EngineError::KeyNotFound(id.to_string()))?;
            Ok(transactions.remove(index))
        })
        .await
    }

    /// Subscribes to change notifications.
    ///
    /// The value is a revision counter bumped after every successful write.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

fn ensure_unique_ids(transactions: &[Transaction]) -> ResultEngine<()> {
    let mut seen = HashSet::with_capacity(transactions.len());
    for tx in transactions {
        if !seen.insert(tx.id()) {
            return Err(EngineError::Storage(format!("duplicate id {}", tx.id())));
        }
    }
    Ok(())
}

fn read_json_file(path: &Path) -> ResultEngine<Vec<Transaction>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw)
        .map_err(|err| EngineError::Storage(format!("{}: {err}", path.display())))
}

fn write_json_file(path: &Path, transactions: &[Transaction]) -> ResultEngine<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(transactions)
        .map_err(|err| EngineError::Storage(format!("serialize failed: {err}")))?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    match fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(&tmp, path)?;
            let _ = fs::remove_file(&tmp);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../target/test_state")
            .join(format!("store_{}.json", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn missing_file_opens_empty_and_persists_across_reopen() {
        let path = temp_path();
        let store = TransactionStore::open(&path).unwrap();
        assert!(store.load().await.is_empty());

        let tx = Transaction::new("Jun 01, 2025", "Coffee Shop", "-4.50");
        store.save(vec![tx.clone()]).await.unwrap();

        let reopened = TransactionStore::open(&path).unwrap();
        assert_eq!(reopened.load().await, vec![tx]);
        let _ = fs::remove_file(path);
    }

    #[tokio::test]
    async fn failed_update_leaves_state_untouched() {
        let store = TransactionStore::in_memory();
        let tx = Transaction::new("Jun 01, 2025", "Coffee Shop", "-4.50");
        store.save(vec![tx.clone()]).await.unwrap();

        let res: ResultEngine<()> = store
            .update(|txs| {
                txs.clear();
                Err(EngineError::EmptyBatch)
            })
            .await;
        assert!(res.is_err());
        assert_eq!(store.load().await, vec![tx]);
    }

    #[tokio::test]
    async fn duplicate_ids_are_refused() {
        let store = TransactionStore::in_memory();
        let tx = Transaction::new("Jun 01, 2025", "Coffee Shop", "-4.50");
        let err = store.save(vec![tx.clone(), tx]).await.unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn remove_deletes_from_disk_too() {
        let path = temp_path();
        let store = TransactionStore::open(&path).unwrap();
        let keep = Transaction::new("Jun 01, 2025", "Rent", "-1200");
        let gone = Transaction::new("Jun 01, 2025", "Coffee Shop", "-4.50");
        store.save(vec![keep.clone(), gone.clone()]).await.unwrap();

        let removed = store.remove(gone.id()).await.unwrap();
        assert_eq!(removed.id(), gone.id());
        assert_eq!(store.load().await, vec![keep.clone()]);
        assert_eq!(TransactionStore::open(&path).unwrap().load().await, vec![keep]);

        assert_eq!(
            store.remove(gone.id()).await.unwrap_err(),
            EngineError::KeyNotFound(gone.id().to_string())
        );
        let _ = fs::remove_file(path);
    }

    #[tokio::test]
    async fn writes_notify_subscribers() {
        let store = TransactionStore::in_memory();
        let mut changes = store.subscribe();
        assert_eq!(*changes.borrow_and_update(), 0);

        store.save(Vec::new()).await.unwrap();
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), 1);
    }
}
