//! Reconciliation of a fresh fetch against stored state.
//!
//! The fetch is authoritative for which transactions exist; stored state is
//! authoritative for what the user did with them (paid state, payment date,
//! category). Rows are matched on `(name, amount within 0.01)` because fetched
//! rows carry no stable id.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, Transaction};

/// Which stored entry wins when several match one fetched row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// First matching entry in stored order.
    #[default]
    First,
    /// Smallest amount difference, then earliest stored date, then stored
    /// order.
    Closest,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub transactions: Vec<Transaction>,
    /// Fetched rows that inherited user fields from a stored entry.
    pub preserved: usize,
    /// Fetched rows with no stored counterpart.
    pub added: usize,
    /// Stored entries absent from the fetch.
    pub dropped: usize,
}

/// Merges `fetched` into `stored`, see the module docs.
///
/// Each merged row keeps the fetched date, name and amount. A matched row
/// takes the user fields of the policy's pick and, when still unclaimed in
/// this merge, its id; otherwise the id of the first unclaimed candidate, or a
/// new one. Merging a result with itself returns it unchanged.
pub fn merge(fetched: Vec<Transaction>, stored: &[Transaction], policy: MatchPolicy) -> MergeOutcome {
    let stored_amounts: Vec<Option<Amount>> =
        stored.iter().map(|tx| tx.amount_value().ok()).collect();

    let mut claimed: HashSet<Uuid> = HashSet::with_capacity(fetched.len());
    let mut outcome = MergeOutcome {
        transactions: Vec::with_capacity(fetched.len()),
        ..Default::default()
    };

    for incoming in fetched {
        let incoming_amount = incoming.amount_value().ok();
        let candidates: Vec<usize> = stored
            .iter()
            .enumerate()
            .filter(|(i, candidate)| {
                same_transaction(&incoming, incoming_amount, candidate, stored_amounts[*i])
            })
            .map(|(i, _)| i)
            .collect();

        let mut merged = Transaction::new(incoming.date, incoming.name, incoming.amount);
        match pick(policy, &candidates, stored, &stored_amounts, incoming_amount) {
            Some(chosen) => {
                merged.carry_user_fields(&stored[chosen]);
                let id = std::iter::once(chosen)
                    .chain(candidates.iter().copied())
                    .map(|i| stored[i].id())
                    .find(|id| !claimed.contains(id));
                if let Some(id) = id {
                    merged = merged.with_id(id);
                }
                outcome.preserved += 1;
            }
            None => outcome.added += 1,
        }

        claimed.insert(merged.id());
        outcome.transactions.push(merged);
    }

    outcome.dropped = stored.iter().filter(|tx| !claimed.contains(&tx.id())).count();
    tracing::debug!(
        "merge: {} preserved, {} added, {} dropped",
        outcome.preserved,
        outcome.added,
        outcome.dropped
    );
    outcome
}

/// Same name (case-sensitive) and amounts within tolerance. Amounts that do
/// not parse only match the identical text.
fn same_transaction(
    incoming: &Transaction,
    incoming_amount: Option<Amount>,
    stored: &Transaction,
    stored_amount: Option<Amount>,
) -> bool {
    if incoming.name != stored.name {
        return false;
    }
    match (incoming_amount, stored_amount) {
        (Some(a), Some(b)) => a.matches(b),
        _ => incoming.amount == stored.amount,
    }
}

fn pick(
    policy: MatchPolicy,
    candidates: &[usize],
    stored: &[Transaction],
    stored_amounts: &[Option<Amount>],
    incoming_amount: Option<Amount>,
) -> Option<usize> {
    match policy {
        MatchPolicy::First => candidates.first().copied(),
        MatchPolicy::Closest => candidates.iter().copied().min_by_key(|&i| {
            let distance = match (incoming_amount, stored_amounts[i]) {
                (Some(a), Some(b)) => a.distance(b),
                _ => Amount::ZERO,
            };
            // Undated entries sort after dated ones.
            let date = stored[i].parsed_date();
            (distance, date.is_none(), date, i)
        }),
    }
}
