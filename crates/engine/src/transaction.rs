use api_types::collector::CollectedTransaction;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, EngineError, ResultEngine};

/// Date format used by the collector and shown to users (`Jun 01, 2025`).
pub const DISPLAY_DATE_FORMAT: &str = "%b %d, %Y";
/// Date format the ledger expects (`2025-06-01`).
pub const LEDGER_DATE_FORMAT: &str = "%Y-%m-%d";

/// Ledger category assigned to a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryRef {
    pub id: String,
    pub name: Option<String>,
}

/// A bank transaction as kept in local state.
///
/// Paid state is a single optional payment date, so `is_paid` and
/// `payment_date` cannot disagree. A category name only exists alongside
/// its id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredTransaction", into = "StoredTransaction")]
pub struct Transaction {
    id: Uuid,
    pub date: String,
    pub name: String,
    pub amount: String,
    category: Option<CategoryRef>,
    payment_date: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new(date: impl Into<String>, name: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: date.into(),
            name: name.into(),
            amount: amount.into(),
            category: None,
            payment_date: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_paid(&self) -> bool {
        self.payment_date.is_some()
    }

    pub fn payment_date(&self) -> Option<DateTime<Utc>> {
        self.payment_date
    }

    pub fn category(&self) -> Option<&CategoryRef> {
        self.category.as_ref()
    }

    pub fn category_id(&self) -> Option<&str> {
        self.category.as_ref().map(|c| c.id.as_str())
    }

    pub fn category_name(&self) -> Option<&str> {
        self.category.as_ref().and_then(|c| c.name.as_deref())
    }

    /// Parsed numeric amount.
    pub fn amount_value(&self) -> ResultEngine<Amount> {
        self.amount.parse()
    }

    /// Parsed display date, if it is in one of the known formats.
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_date(&self.date)
    }

    /// Date in the ledger's `YYYY-MM-DD` format.
    pub fn ledger_date(&self) -> ResultEngine<String> {
        self.parsed_date()
            .map(|date| date.format(LEDGER_DATE_FORMAT).to_string())
            .ok_or_else(|| EngineError::InvalidDate(self.date.clone()))
    }

    pub fn mark_paid(&mut self, at: DateTime<Utc>) {
        self.payment_date = Some(at);
    }

    pub fn mark_unpaid(&mut self) {
        self.payment_date = None;
    }

    /// Moves the payment date of a paid transaction.
    pub fn set_payment_date(&mut self, at: DateTime<Utc>) -> ResultEngine<()> {
        if !self.is_paid() {
            return Err(EngineError::NotPaid(self.id.to_string()));
        }
        self.payment_date = Some(at);
        Ok(())
    }

    pub fn assign_category(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.category = Some(CategoryRef {
            id: id.into(),
            name: Some(name.into()),
        });
    }

    /// Copies the user-owned fields (paid state, category) from `other`.
    pub(crate) fn carry_user_fields(&mut self, other: &Transaction) {
        self.payment_date = other.payment_date;
        self.category = other.category.clone();
    }

    pub(crate) fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Row sent to the payment collaborator.
    pub fn to_collected(&self) -> CollectedTransaction {
        CollectedTransaction {
            date: self.date.clone(),
            name: self.name.clone(),
            amount: self.amount.clone(),
        }
    }
}

impl From<CollectedTransaction> for Transaction {
    fn from(row: CollectedTransaction) -> Self {
        Self::new(row.date, row.name, row.amount)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, DISPLAY_DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, LEDGER_DATE_FORMAT))
        .ok()
}

/// On-disk shape of a [`Transaction`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTransaction {
    id: Uuid,
    date: String,
    name: String,
    amount: String,
    #[serde(default)]
    category_id: Option<String>,
    #[serde(default)]
    category_name: Option<String>,
    #[serde(default)]
    is_paid: bool,
    #[serde(default)]
    payment_date: Option<DateTime<Utc>>,
}

impl TryFrom<StoredTransaction> for Transaction {
    type Error = String;

    fn try_from(stored: StoredTransaction) -> Result<Self, Self::Error> {
        if stored.is_paid != stored.payment_date.is_some() {
            return Err(format!(
                "transaction {}: isPaid and paymentDate disagree",
                stored.id
            ));
        }
        let category = match (stored.category_id, stored.category_name) {
            (Some(id), name) => Some(CategoryRef { id, name }),
            (None, None) => None,
            (None, Some(_)) => {
                return Err(format!(
                    "transaction {}: categoryName without categoryId",
                    stored.id
                ));
            }
        };
        Ok(Self {
            id: stored.id,
            date: stored.date,
            name: stored.name,
            amount: stored.amount,
            category,
            payment_date: stored.payment_date,
        })
    }
}

impl From<Transaction> for StoredTransaction {
    fn from(tx: Transaction) -> Self {
        let (category_id, category_name) = match tx.category {
            Some(CategoryRef { id, name }) => (Some(id), name),
            None => (None, None),
        };
        Self {
            id: tx.id,
            date: tx.date,
            name: tx.name,
            amount: tx.amount,
            category_id,
            category_name,
            is_paid: tx.payment_date.is_some(),
            payment_date: tx.payment_date,
        }
    }
}
