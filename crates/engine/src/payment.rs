//! Bill payment through the collector.
//!
//! Per transaction: `Idle -> Processing -> {Paid, Failed}`. The in-flight
//! marker is set before the payment call and cleared only after local state
//! reflects the outcome, so readers never see a paid-looking gap. A batch is
//! paid or not as a whole.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Collector, EngineError, ResultEngine, Transaction, TransactionStore};

type IdSet = Arc<Mutex<HashSet<Uuid>>>;

fn locked(set: &Mutex<HashSet<Uuid>>) -> MutexGuard<'_, HashSet<Uuid>> {
    set.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-flight markers for one submission, released on drop.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<Uuid>>,
    ids: Vec<Uuid>,
}

impl<'a> InFlight<'a> {
    fn claim(set: &'a Mutex<HashSet<Uuid>>, ids: &[Uuid]) -> ResultEngine<Self> {
        let mut guard = locked(set);
        if let Some(busy) = ids.iter().find(|id| guard.contains(id)) {
            return Err(EngineError::PaymentInProgress(busy.to_string()));
        }
        guard.extend(ids.iter().copied());
        Ok(Self {
            set,
            ids: ids.to_vec(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut guard = locked(self.set);
        for id in &self.ids {
            guard.remove(id);
        }
    }
}

pub struct PaymentOrchestrator<C> {
    collector: Arc<C>,
    store: TransactionStore,
    in_flight: IdSet,
    recently_paid: IdSet,
}

impl<C: Collector> PaymentOrchestrator<C> {
    pub fn new(collector: Arc<C>, store: TransactionStore) -> Self {
        Self {
            collector,
            store,
            in_flight: IdSet::default(),
            recently_paid: IdSet::default(),
        }
    }

    /// `true` while a payment for `id` is outstanding.
    pub fn is_processing(&self, id: Uuid) -> bool {
        locked(&self.in_flight).contains(&id)
    }

    pub fn in_flight(&self) -> HashSet<Uuid> {
        locked(&self.in_flight).clone()
    }

    /// Ids paid through this orchestrator since the last
    /// [`Self::clear_recently_paid`].
    pub fn recently_paid(&self) -> HashSet<Uuid> {
        locked(&self.recently_paid).clone()
    }

    pub fn clear_recently_paid(&self) {
        locked(&self.recently_paid).clear();
    }

    /// Pays a single transaction.
    pub async fn pay(&self, id: Uuid) -> ResultEngine<Transaction> {
        let mut paid = self.submit_bill_payment(&[id]).await?;
        paid.pop().ok_or_else(|| EngineError::KeyNotFound(id.to_string()))
    }

    /// Pays every unpaid transaction that is not already being paid.
    pub async fn pay_all_unpaid(&self) -> ResultEngine<Vec<Transaction>> {
        let busy = self.in_flight();
        let ids: Vec<Uuid> = self
            .store
            .load()
            .await
            .iter()
            .filter(|tx| !tx.is_paid() && !busy.contains(&tx.id()))
            .map(Transaction::id)
            .collect();
        self.submit_bill_payment(&ids).await
    }

    /// Sends the whole batch in one payment call.
    ///
    /// On failure nothing is marked paid. On success every transaction of the
    /// batch gets the same payment date in a single store write.
    pub async fn submit_bill_payment(&self, ids: &[Uuid]) -> ResultEngine<Vec<Transaction>> {
        let mut unique = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        if unique.is_empty() {
            return Err(EngineError::EmptyBatch);
        }

        // Claimed before reading state, so a concurrent payment of the same
        // id either is refused here or sees the paid result below.
        let _marker = InFlight::claim(&self.in_flight, &unique)?;

        let snapshot = self.store.load().await;
        let mut batch = Vec::with_capacity(unique.len());
        for id in &unique {
            let tx = snapshot
                .iter()
                .find(|tx| tx.id() == *id)
                .ok_or_else(|| EngineError::KeyNotFound(id.to_string()))?;
            if tx.is_paid() {
                return Err(EngineError::AlreadyPaid(id.to_string()));
            }
            tx.amount_value()?;
            batch.push(tx.to_collected());
        }

        tracing::info!("submitting bill payment for {} transaction(s)", unique.len());

        if let Err(err) = self.collector.pay_bill(&batch).await {
            tracing::error!("bill payment failed: {err}");
            return Err(match err {
                EngineError::PaymentFailed(_) => err,
                other => EngineError::PaymentFailed(other.to_string()),
            });
        }

        let paid_at = Utc::now();
        let paid = self
            .store
            .update(|transactions| {
                let mut paid = Vec::with_capacity(unique.len());
                for tx in transactions.iter_mut().filter(|tx| unique.contains(&tx.id())) {
                    tx.mark_paid(paid_at);
                    paid.push(tx.clone());
                }
                Ok(paid)
            })
            .await
            .inspect_err(|err| tracing::error!("payment sent but local state not updated: {err}"))?;

        if paid.len() < unique.len() {
            tracing::warn!(
                "{} paid transaction(s) were removed while the payment was in flight",
                unique.len() - paid.len()
            );
        }
        locked(&self.recently_paid).extend(paid.iter().map(Transaction::id));
        tracing::info!("marked {} transaction(s) paid", paid.len());
        Ok(paid)
    }

    /// Reverts a paid transaction to unpaid.
    pub async fn mark_unpaid(&self, id: Uuid) -> ResultEngine<Transaction> {
        if self.is_processing(id) {
            return Err(EngineError::PaymentInProgress(id.to_string()));
        }
        self.store
            .update(|transactions| {
                let tx = find_mut(transactions, id)?;
                if !tx.is_paid() {
                    return Err(EngineError::NotPaid(id.to_string()));
                }
                tx.mark_unpaid();
                Ok(tx.clone())
            })
            .await
    }

    /// Moves the payment date of a paid transaction.
    pub async fn set_payment_date(&self, id: Uuid, at: DateTime<Utc>) -> ResultEngine<Transaction> {
        self.store
            .update(|transactions| {
                let tx = find_mut(transactions, id)?;
                tx.set_payment_date(at)?;
                Ok(tx.clone())
            })
            .await
    }
}

fn find_mut(transactions: &mut [Transaction], id: Uuid) -> ResultEngine<&mut Transaction> {
    transactions
        .iter_mut()
        .find(|tx| tx.id() == id)
        .ok_or_else(|| EngineError::KeyNotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_exclusive_and_released_on_drop() {
        let set = Mutex::new(HashSet::new());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let first = InFlight::claim(&set, &[a]).unwrap();
        assert_eq!(
            InFlight::claim(&set, &[b, a]).err(),
            Some(EngineError::PaymentInProgress(a.to_string()))
        );
        // A refused claim marks nothing.
        assert!(!locked(&set).contains(&b));

        drop(first);
        assert!(locked(&set).is_empty());
        let _second = InFlight::claim(&set, &[a, b]).unwrap();
        assert_eq!(locked(&set).len(), 2);
    }
}
