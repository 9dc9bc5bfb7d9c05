//! Planning of the opening balance transactions of a new book.
//!
//! The plan is computed from the old book alone. Every account whose type
//! carries a balance into the new year contributes one split to the draft
//! transaction of its balance group and commodity. Writing the drafts into
//! the new book (and adding the balancing split) happens in the service.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{
    AccountTree, AccountType, Commodity, CommodityKey, Guid, Numeric, NumericError, Transaction,
};

/// Where opening balances are booked against unless a group says otherwise.
pub const OPENING_BALANCE_ACCOUNT: [&str; 2] = ["Equity", "Opening Balances"];

pub const OPENING_DESCRIPTION: &str = "Opening Balance";

/// Opening balances are collected in one transaction per group and commodity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceGroup {
    Asset,
    Liability,
    /// Every other type that carries a balance: bank, cash, credit, equity
    #[serde(rename = "*")]
    Other,
}

impl BalanceGroup {
    pub fn for_type(account_type: AccountType) -> Self {
        // Exact type only: BANK, CASH and CREDIT balance against `*`
        match account_type {
            AccountType::Asset => BalanceGroup::Asset,
            AccountType::Liability => BalanceGroup::Liability,
            _ => BalanceGroup::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceGroup::Asset => "ASSET",
            BalanceGroup::Liability => "LIABILITY",
            BalanceGroup::Other => "*",
        }
    }
}

impl std::fmt::Display for BalanceGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Balancing account per group, as account path components.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpeningTargets {
    pub asset: Option<Vec<String>>,
    pub liability: Option<Vec<String>>,
}

impl OpeningTargets {
    /// The configured path of a group, or `Equity:Opening Balances`.
    pub fn path(&self, group: BalanceGroup) -> Vec<String> {
        let configured = match group {
            BalanceGroup::Asset => self.asset.as_ref(),
            BalanceGroup::Liability => self.liability.as_ref(),
            BalanceGroup::Other => None,
        };
        configured.cloned().unwrap_or_else(|| {
            OPENING_BALANCE_ACCOUNT
                .iter()
                .map(|s| s.to_string())
                .collect()
        })
    }
}

/// `Equity:Opening Balances` becomes `Equity:Opening Balances - USD`.
pub fn suffixed_path(base: &[String], mnemonic: &str) -> Vec<String> {
    let mut path = base.to_vec();
    if let Some(last) = path.last_mut() {
        last.push_str(" - ");
        last.push_str(mnemonic);
    }
    path
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpeningBalance {
    pub group: BalanceGroup,
    pub commodity: CommodityKey,
    /// Old-book guid of the currency
    pub currency_guid: Guid,
    /// One split per account, old-book account guids, no balancing split
    pub transaction: Transaction,
    /// What the balancing account receives: minus the sum of the splits
    pub total: Numeric,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpeningPlan {
    /// In order of first appearance while walking the account tree
    pub balances: Vec<OpeningBalance>,
    pub main_currency: Option<CommodityKey>,
    pub warnings: Vec<String>,
}

impl OpeningPlan {
    pub fn is_main(&self, commodity: &CommodityKey) -> bool {
        self.main_currency.as_ref() == Some(commodity)
    }

    /// Preferred balancing path of an entry. The main currency books into
    /// the group path itself, the others into a suffixed variant.
    pub fn balancing_path(&self, balance: &OpeningBalance, targets: &OpeningTargets) -> Vec<String> {
        let base = targets.path(balance.group);
        if self.is_main(&balance.commodity) {
            base
        } else {
            suffixed_path(&base, &balance.commodity.mnemonic)
        }
    }
}

pub struct PlanInput<'a> {
    pub tree: &'a AccountTree,
    pub root_guid: &'a str,
    /// Old-book commodities by guid
    pub commodities: &'a HashMap<Guid, Commodity>,
    /// Old-book balances by account guid; missing means zero
    pub balances: &'a HashMap<Guid, Numeric>,
    pub opening_date: NaiveDate,
    pub preferred_currency: Option<&'a CommodityKey>,
}

pub fn plan_opening_balances(input: PlanInput<'_>) -> Result<OpeningPlan, NumericError> {
    let mut plan = OpeningPlan::default();

    for account in input.tree.walk(input.root_guid) {
        let balance = input
            .balances
            .get(&account.guid)
            .copied()
            .unwrap_or(Numeric::ZERO);
        if balance.is_zero() {
            continue;
        }
        let account_type = account.account_type;
        let full_name = input.tree.full_name(&account.guid);

        if account_type.is_income_statement() {
            plan.warnings.push(format!(
                "{} ({}) still has a balance of {}; close the old year into equity first",
                full_name, account_type, balance
            ));
            continue;
        }
        if account_type.needs_manual_opening() {
            plan.warnings.push(format!(
                "{} ({}) has a balance of {} that needs a manual opening entry",
                full_name, account_type, balance
            ));
            continue;
        }
        if !account_type.opens_balance() {
            continue;
        }

        let Some(commodity) = account
            .commodity_guid
            .as_ref()
            .and_then(|g| input.commodities.get(g))
        else {
            plan.warnings
                .push(format!("{} has no commodity; skipped", full_name));
            continue;
        };
        if !commodity.is_currency() {
            plan.warnings.push(format!(
                "{} is held in {}, which is not a currency; skipped",
                full_name,
                commodity.key()
            ));
            continue;
        }

        let group = BalanceGroup::for_type(account_type);
        let key = commodity.key();
        let amount = balance.rescale(commodity.fraction);

        let position = plan
            .balances
            .iter()
            .position(|b| b.group == group && b.commodity == key);
        let index = match position {
            Some(i) => i,
            None => {
                plan.balances.push(OpeningBalance {
                    group,
                    commodity: key,
                    currency_guid: commodity.guid.clone(),
                    transaction: Transaction::new(commodity.guid.clone(), input.opening_date)
                        .with_description(OPENING_DESCRIPTION),
                    total: Numeric::ZERO,
                });
                plan.balances.len() - 1
            }
        };
        let Some(entry) = plan.balances.get_mut(index) else {
            continue;
        };
        entry.transaction.add_split(account.guid.clone(), amount);
        entry.total = entry
            .total
            .checked_sub(amount)
            .ok_or(NumericError::Overflow)?;
    }

    plan.main_currency = select_main_currency(&plan.balances, input.preferred_currency);
    Ok(plan)
}

/// The preferred currency if any entry uses it, else the first entry's.
pub fn select_main_currency(
    balances: &[OpeningBalance],
    preferred: Option<&CommodityKey>,
) -> Option<CommodityKey> {
    if let Some(preferred) = preferred {
        if balances.iter().any(|b| &b.commodity == preferred) {
            return Some(preferred.clone());
        }
    }
    balances.first().map(|b| b.commodity.clone())
}
