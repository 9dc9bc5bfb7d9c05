use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{AccountType, BalanceGroup, Numeric};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolloverReport {
    pub source: String,
    pub target: String,
    pub dry_run: bool,
    /// The target book existed before and was merged into
    pub target_existed: bool,
    pub opening_date: NaiveDate,
    pub closing_date: Option<NaiveDate>,
    pub main_currency: Option<String>,
    pub balances: Vec<OpeningBalanceReport>,
    pub copied: CopySummary,
    pub warnings: Vec<String>,
}

impl RolloverReport {
    /// Entries of one balance group, in plan order.
    pub fn group(&self, group: BalanceGroup) -> impl Iterator<Item = &OpeningBalanceReport> {
        self.balances.iter().filter(move |b| b.group == group)
    }
}

/// One opening balance transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpeningBalanceReport {
    pub group: BalanceGroup,
    /// Commodity as `NAMESPACE:MNEMONIC`
    pub commodity: String,
    pub mnemonic: String,
    pub lines: Vec<BalanceLine>,
    /// Amount booked into the balancing account
    pub total: Numeric,
    /// Full name of the balancing account; `None` when the total is zero
    pub balancing_account: Option<String>,
    /// `printify` rendering of the transaction without its balancing split
    pub rendered: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceLine {
    pub account: String,
    pub amount: Numeric,
}

/// What was written into the target book besides the opening transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySummary {
    pub accounts_created: usize,
    pub accounts_reused: usize,
    pub commodities_created: usize,
    pub transactions_created: usize,
    pub bill_terms: usize,
    pub vendors: usize,
    pub customers: usize,
    pub employees: usize,
    /// Business entities whose id already existed in the target
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: String,
    pub account_type: AccountType,
    pub commodity: String,
    pub balance: Numeric,
}
