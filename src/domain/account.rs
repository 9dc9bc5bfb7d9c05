use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{new_guid, Guid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    /// Hidden top of the account tree
    Root,
    Bank,
    Cash,
    Asset,
    Credit,
    Liability,
    Stock,
    Mutual,
    Currency,
    Income,
    Expense,
    Equity,
    Receivable,
    Payable,
    Trading,
    Checking,
    Savings,
    #[serde(rename = "MONEYMRKT")]
    MoneyMarket,
    CreditLine,
    /// GnuCash's `ACCT_TYPE_NONE`
    #[serde(rename = "NONE")]
    NoType,
}

impl AccountType {
    pub const ALL: [AccountType; 20] = [
        AccountType::Root,
        AccountType::Bank,
        AccountType::Cash,
        AccountType::Asset,
        AccountType::Credit,
        AccountType::Liability,
        AccountType::Stock,
        AccountType::Mutual,
        AccountType::Currency,
        AccountType::Income,
        AccountType::Expense,
        AccountType::Equity,
        AccountType::Receivable,
        AccountType::Payable,
        AccountType::Trading,
        AccountType::Checking,
        AccountType::Savings,
        AccountType::MoneyMarket,
        AccountType::CreditLine,
        AccountType::NoType,
    ];

    /// The name GnuCash stores in `accounts.account_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Root => "ROOT",
            AccountType::Bank => "BANK",
            AccountType::Cash => "CASH",
            AccountType::Asset => "ASSET",
            AccountType::Credit => "CREDIT",
            AccountType::Liability => "LIABILITY",
            AccountType::Stock => "STOCK",
            AccountType::Mutual => "MUTUAL",
            AccountType::Currency => "CURRENCY",
            AccountType::Income => "INCOME",
            AccountType::Expense => "EXPENSE",
            AccountType::Equity => "EQUITY",
            AccountType::Receivable => "RECEIVABLE",
            AccountType::Payable => "PAYABLE",
            AccountType::Trading => "TRADING",
            AccountType::Checking => "CHECKING",
            AccountType::Savings => "SAVINGS",
            AccountType::MoneyMarket => "MONEYMRKT",
            AccountType::CreditLine => "CREDITLINE",
            AccountType::NoType => "NONE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Resolve a short name like `asset` or `Liability`.
    pub fn shortname(name: &str) -> Option<Self> {
        Self::from_str(&name.trim().to_uppercase())
    }

    /// Simple balance sheet accounts that receive an opening balance.
    /// Income and expense belong to retained earnings.
    pub fn opens_balance(&self) -> bool {
        matches!(
            self,
            AccountType::Bank
                | AccountType::Cash
                | AccountType::Credit
                | AccountType::Asset
                | AccountType::Liability
                | AccountType::Equity
        )
    }

    /// Balance sheet accounts whose opening balance needs lots or trading
    /// splits and has to be entered by hand.
    pub fn needs_manual_opening(&self) -> bool {
        matches!(
            self,
            AccountType::Stock
                | AccountType::Mutual
                | AccountType::Receivable
                | AccountType::Payable
                | AccountType::Trading
        )
    }

    pub fn is_income_statement(&self) -> bool {
        matches!(self, AccountType::Income | AccountType::Expense)
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub guid: Guid,
    pub name: String,
    pub account_type: AccountType,
    pub commodity_guid: Option<Guid>,
    /// Smallest commodity unit, e.g. 100 for cents
    pub commodity_scu: i64,
    pub non_std_scu: bool,
    pub parent_guid: Option<Guid>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub hidden: bool,
    pub placeholder: bool,
    // Kept in the slots table
    pub notes: Option<String>,
    pub color: Option<String>,
    pub tax_related: bool,
}

impl Account {
    pub fn new(
        name: impl Into<String>,
        account_type: AccountType,
        commodity_guid: Option<Guid>,
        commodity_scu: i64,
    ) -> Self {
        Self {
            guid: new_guid(),
            name: name.into(),
            account_type,
            commodity_guid,
            commodity_scu,
            non_std_scu: false,
            parent_guid: None,
            code: None,
            description: None,
            hidden: false,
            placeholder: false,
            notes: None,
            color: None,
            tax_related: false,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<Guid>) -> Self {
        self.parent_guid = Some(parent.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: bool) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Copy of this account for another book: fresh guid, new parent and
    /// commodity, every descriptive attribute kept.
    pub fn clone_for_book(&self, parent: &str, commodity_guid: Option<Guid>) -> Self {
        Self {
            guid: new_guid(),
            parent_guid: Some(parent.to_string()),
            commodity_guid,
            ..self.clone()
        }
    }

    pub fn is_root(&self) -> bool {
        self.account_type == AccountType::Root
    }
}

/// Result of looking up a colon separated path below some account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathLookup {
    Found(Guid),
    /// `parent` exists, `remaining[0]` is the first missing component.
    Missing { parent: Guid, remaining: Vec<String> },
}

/// In-memory view of a book's account hierarchy.
#[derive(Debug, Clone, Default)]
pub struct AccountTree {
    accounts: HashMap<Guid, Account>,
    children: HashMap<Guid, Vec<Guid>>,
}

impl AccountTree {
    pub fn from_accounts(accounts: Vec<Account>) -> Self {
        let mut tree = Self::default();
        for account in accounts {
            tree.insert(account);
        }
        tree
    }

    pub fn insert(&mut self, account: Account) {
        if let Some(parent) = &account.parent_guid {
            let siblings = self.children.entry(parent.clone()).or_default();
            siblings.push(account.guid.clone());
            let accounts = &self.accounts;
            let new_name = account.name.clone();
            siblings.sort_by(|a, b| {
                let name_a = accounts.get(a).map_or(&new_name, |acc| &acc.name);
                let name_b = accounts.get(b).map_or(&new_name, |acc| &acc.name);
                name_a.cmp(name_b)
            });
        }
        self.accounts.insert(account.guid.clone(), account);
    }

    pub fn get(&self, guid: &str) -> Option<&Account> {
        self.accounts.get(guid)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Children of an account, sorted by name.
    pub fn children(&self, guid: &str) -> Vec<&Account> {
        self.children
            .get(guid)
            .map(|ids| ids.iter().filter_map(|id| self.accounts.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn child_by_name(&self, parent: &str, name: &str) -> Option<&Account> {
        self.children(parent).into_iter().find(|a| a.name == name)
    }

    /// Colon separated name from the top level account down, root excluded.
    pub fn full_name(&self, guid: &str) -> String {
        let mut parts = Vec::new();
        let mut current = self.accounts.get(guid);
        while let Some(account) = current {
            if account.is_root() {
                break;
            }
            parts.push(account.name.as_str());
            current = account
                .parent_guid
                .as_deref()
                .and_then(|p| self.accounts.get(p));
        }
        parts.reverse();
        parts.join(":")
    }

    /// All descendants of `guid` in preorder (parents before children).
    pub fn walk(&self, guid: &str) -> Vec<&Account> {
        let mut out = Vec::new();
        let mut stack: Vec<&Account> = self.children(guid).into_iter().rev().collect();
        while let Some(account) = stack.pop() {
            out.push(account);
            stack.extend(self.children(&account.guid).into_iter().rev());
        }
        out
    }

    pub fn resolve_path(&self, from: &str, path: &[String]) -> PathLookup {
        let mut current = from.to_string();
        for (i, name) in path.iter().enumerate() {
            match self.child_by_name(&current, name) {
                Some(child) => current = child.guid.clone(),
                None => {
                    return PathLookup::Missing {
                        parent: current,
                        remaining: path[i..].to_vec(),
                    };
                }
            }
        }
        PathLookup::Found(current)
    }
}

/// Split `Equity:Opening Balances` into its components.
pub fn parse_account_path(path: &str) -> Option<Vec<String>> {
    let parts: Vec<String> = path.split(':').map(|p| p.trim().to_string()).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> (AccountTree, Guid) {
        let root = Account::new("Root Account", AccountType::Root, None, 100);
        let root_guid = root.guid.clone();
        let assets = Account::new("Assets", AccountType::Asset, None, 100).with_parent(&root_guid);
        let checking =
            Account::new("Checking", AccountType::Bank, None, 100).with_parent(&assets.guid);
        let cash = Account::new("Cash", AccountType::Cash, None, 100).with_parent(&assets.guid);
        let equity = Account::new("Equity", AccountType::Equity, None, 100).with_parent(&root_guid);
        let tree = AccountTree::from_accounts(vec![root, assets, checking, cash, equity]);
        (tree, root_guid)
    }

    #[test]
    fn test_account_type_roundtrip() {
        for t in AccountType::ALL {
            assert_eq!(AccountType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(AccountType::from_str("bogus"), None);
    }

    #[test]
    fn test_shortname() {
        assert_eq!(AccountType::shortname("asset"), Some(AccountType::Asset));
        assert_eq!(
            AccountType::shortname(" Liability "),
            Some(AccountType::Liability)
        );
        assert_eq!(AccountType::shortname("moneymrkt"), Some(AccountType::MoneyMarket));
        assert_eq!(AccountType::shortname("nope"), None);
    }

    #[test]
    fn test_opening_types() {
        assert!(AccountType::Bank.opens_balance());
        assert!(AccountType::Equity.opens_balance());
        assert!(!AccountType::Income.opens_balance());
        assert!(!AccountType::Expense.opens_balance());
        assert!(!AccountType::Stock.opens_balance());
        assert!(!AccountType::Trading.opens_balance());
        assert!(AccountType::Payable.needs_manual_opening());
        assert!(!AccountType::Bank.needs_manual_opening());
    }

    #[test]
    fn test_children_sorted_by_name() {
        let (tree, root) = sample_tree();
        let top: Vec<&str> = tree.children(&root).iter().map(|a| a.name.as_str()).collect();
        assert_eq!(top, vec!["Assets", "Equity"]);

        let assets = tree.child_by_name(&root, "Assets").unwrap();
        let names: Vec<&str> = tree
            .children(&assets.guid)
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["Cash", "Checking"]);
    }

    #[test]
    fn test_full_name_and_walk() {
        let (tree, root) = sample_tree();
        let walked: Vec<String> = tree
            .walk(&root)
            .iter()
            .map(|a| tree.full_name(&a.guid))
            .collect();
        assert_eq!(
            walked,
            vec!["Assets", "Assets:Cash", "Assets:Checking", "Equity"]
        );
    }

    #[test]
    fn test_resolve_path() {
        let (tree, root) = sample_tree();
        let found = tree.resolve_path(&root, &["Assets".into(), "Cash".into()]);
        assert!(matches!(found, PathLookup::Found(_)));

        let missing = tree.resolve_path(&root, &["Equity".into(), "Opening Balances".into()]);
        match missing {
            PathLookup::Missing { parent, remaining } => {
                assert_eq!(tree.full_name(&parent), "Equity");
                assert_eq!(remaining, vec!["Opening Balances".to_string()]);
            }
            PathLookup::Found(_) => panic!("path should be missing"),
        }
    }

    #[test]
    fn test_clone_for_book_keeps_attributes() {
        let mut original = Account::new("Checking", AccountType::Bank, Some("c1".into()), 100)
            .with_description("Main account")
            .with_placeholder(true);
        original.notes = Some("IBAN ...".into());
        original.tax_related = true;

        let copy = original.clone_for_book("newparent", Some("c2".into()));
        assert_ne!(copy.guid, original.guid);
        assert_eq!(copy.parent_guid.as_deref(), Some("newparent"));
        assert_eq!(copy.commodity_guid.as_deref(), Some("c2"));
        assert_eq!(copy.name, "Checking");
        assert_eq!(copy.description.as_deref(), Some("Main account"));
        assert_eq!(copy.notes.as_deref(), Some("IBAN ..."));
        assert!(copy.placeholder);
        assert!(copy.tax_related);
    }

    #[test]
    fn test_parse_account_path() {
        assert_eq!(
            parse_account_path("Equity:Opening Balances"),
            Some(vec!["Equity".to_string(), "Opening Balances".to_string()])
        );
        assert_eq!(parse_account_path("Equity::X"), None);
        assert_eq!(parse_account_path(""), None);
    }
}
