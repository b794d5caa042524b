//! Wire types shared by the collector and ledger HTTP clients.
//!
//! Field names follow each service's JSON exactly; conversion into engine
//! types happens in the engine crate.

use serde::{Deserialize, Serialize};

pub mod collector {
    use super::*;

    /// A transaction row as produced by the collector (`GET /transactions`)
    /// and as sent back for payment (`POST /pay-bill`).
    ///
    /// Every field is text; amounts keep the bank's formatting (e.g.
    /// `"-$1,204.50"`).
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CollectedTransaction {
        #[serde(rename = "Date")]
        pub date: String,
        #[serde(rename = "Name")]
        pub name: String,
        #[serde(rename = "Amount")]
        pub amount: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PayBill {
        pub transactions: Vec<CollectedTransaction>,
    }

    /// Error/status body returned by the collector on non-200 responses.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct StatusBody {
        #[serde(default)]
        pub status: String,
        #[serde(default)]
        pub message: String,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CardInfo {
        pub card_name: String,
        pub last_four_digits: String,
        pub current_balance: f64,
    }
}

pub mod ledger {
    use super::*;

    /// Every ledger response wraps its payload in `{"data": ...}`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct Envelope<T> {
        pub data: T,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BudgetsData {
        pub budgets: Vec<Budget>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Budget {
        pub id: String,
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountsData {
        pub accounts: Vec<Account>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Account {
        pub id: String,
        pub name: String,
        #[serde(rename = "type")]
        pub kind: String,
        /// Balance in milliunits.
        pub balance: i64,
        pub closed: bool,
    }

    impl Account {
        pub const CREDIT_CARD: &'static str = "creditcard";

        /// Open credit-card accounts are the only eligible payment targets.
        pub fn is_eligible_credit_card(&self) -> bool {
            !self.closed && self.kind.eq_ignore_ascii_case(Self::CREDIT_CARD)
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryGroupsData {
        pub category_groups: Vec<CategoryGroup>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CategoryGroup {
        pub id: String,
        pub name: String,
        pub categories: Vec<Category>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Category {
        pub id: String,
        pub name: String,
        /// Balance in milliunits.
        pub balance: i64,
        pub category_group_id: String,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Cleared {
        Cleared,
        Uncleared,
        Reconciled,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct NewTransaction {
        pub account_id: String,
        /// `YYYY-MM-DD`.
        pub date: String,
        /// Signed milliunits.
        pub amount: i64,
        pub payee_name: Option<String>,
        pub category_id: Option<String>,
        pub memo: Option<String>,
        pub cleared: Cleared,
        pub approved: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CreateTransaction {
        pub transaction: NewTransaction,
    }

    /// Ledger error body: `{"error": {"id", "name", "detail"}}`.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ErrorBody {
        pub error: ErrorDetail,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ErrorDetail {
        #[serde(default)]
        pub id: String,
        #[serde(default)]
        pub name: String,
        #[serde(default)]
        pub detail: String,
    }
}
