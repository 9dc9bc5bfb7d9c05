// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use happy_new_year::application::{AccountBalance, RolloverOptions, YearEndService};
use happy_new_year::domain::{
    new_guid, Account, AccountType, Address, BillTerm, Commodity, Customer, Employee, Guid,
    Numeric, OpeningTargets, Transaction, Vendor,
};
use happy_new_year::storage::{Session, SessionMode};
use tempfile::TempDir;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn cents(amount: i64) -> Numeric {
    Numeric::new(amount, 100).unwrap()
}

/// Builds a GnuCash book in a fresh file. Parents must be added before
/// their children; accounts are addressed by full name.
pub struct BookBuilder {
    session: Session,
    root: Guid,
    commodities: Vec<Commodity>,
    accounts: Vec<Account>,
    by_name: HashMap<String, Guid>,
    transactions: Vec<Transaction>,
    bill_terms: Vec<BillTerm>,
    vendors: Vec<Vendor>,
    customers: Vec<Customer>,
    employees: Vec<Employee>,
}

impl BookBuilder {
    pub async fn create(path: &Path) -> Result<Self> {
        let session = Session::open(path.to_str().context("path")?, SessionMode::NewStore).await?;
        let roots = session.repository().book_roots().await?;
        Ok(Self {
            session,
            root: roots.root_account_guid,
            commodities: Vec::new(),
            accounts: Vec::new(),
            by_name: HashMap::new(),
            transactions: Vec::new(),
            bill_terms: Vec::new(),
            vendors: Vec::new(),
            customers: Vec::new(),
            employees: Vec::new(),
        })
    }

    pub fn currency(&mut self, mnemonic: &str) -> Guid {
        if let Some(c) = self.commodities.iter().find(|c| c.mnemonic == mnemonic) {
            return c.guid.clone();
        }
        let commodity = Commodity::currency(mnemonic, 100);
        let guid = commodity.guid.clone();
        self.commodities.push(commodity);
        guid
    }

    pub fn account(&mut self, full_name: &str, account_type: AccountType, currency: &str) -> Guid {
        let commodity = self.currency(currency);
        let (parent, name) = match full_name.rsplit_once(':') {
            Some((parent, name)) => (self.by_name[parent].clone(), name),
            None => (self.root.clone(), full_name),
        };
        let account = Account::new(name, account_type, Some(commodity), 100).with_parent(parent);
        let guid = account.guid.clone();
        self.by_name.insert(full_name.to_string(), guid.clone());
        self.accounts.push(account);
        guid
    }

    pub fn guid(&self, full_name: &str) -> Guid {
        self.by_name[full_name].clone()
    }

    pub fn account_mut(&mut self, full_name: &str) -> &mut Account {
        let guid = self.guid(full_name);
        self.accounts.iter_mut().find(|a| a.guid == guid).unwrap()
    }

    /// A transaction in the commodity of the first split's account.
    pub fn transaction(&mut self, posted: &str, description: &str, splits: &[(&str, i64)]) {
        let first = self.guid(splits[0].0);
        let currency = self
            .accounts
            .iter()
            .find(|a| a.guid == first)
            .and_then(|a| a.commodity_guid.clone())
            .unwrap();
        let mut tx = Transaction::new(currency, date(posted)).with_description(description);
        for (account, amount) in splits {
            let guid = self.guid(account);
            tx.add_split(guid, cents(*amount));
        }
        self.transactions.push(tx);
    }

    pub fn bill_term(&mut self, name: &str, due_days: i64) -> Guid {
        let term = BillTerm {
            guid: new_guid(),
            name: name.into(),
            description: format!("{} days", due_days),
            refcount: 1,
            invisible: false,
            parent: None,
            term_type: "GNC_TERM_TYPE_DAYS".into(),
            due_days: Some(due_days),
            discount_days: Some(0),
            discount: Some(Numeric::ZERO),
            cutoff: Some(0),
        };
        let guid = term.guid.clone();
        self.bill_terms.push(term);
        guid
    }

    pub fn vendor(&mut self, id: &str, name: &str, currency: &str, terms: Option<Guid>) {
        let currency_guid = self.currency(currency);
        self.vendors.push(Vendor {
            guid: new_guid(),
            id: id.into(),
            name: name.into(),
            notes: String::new(),
            currency_guid,
            active: true,
            tax_override: false,
            addr: Address {
                name: Some(name.into()),
                addr1: Some("Hauptstr. 1".into()),
                addr2: Some("12345 Musterstadt".into()),
                email: Some("info@example.org".into()),
                ..Address::default()
            },
            terms,
            tax_included: Some("USEGLOBAL".into()),
            tax_table: None,
        });
    }

    pub fn customer(&mut self, id: &str, name: &str, currency: &str) {
        let currency_guid = self.currency(currency);
        self.customers.push(Customer {
            guid: new_guid(),
            id: id.into(),
            name: name.into(),
            notes: "since 2019".into(),
            active: true,
            discount: Numeric::ZERO,
            credit: cents(100000),
            currency_guid,
            tax_override: false,
            addr: Address {
                name: Some(name.into()),
                ..Address::default()
            },
            ship_addr: Address::default(),
            terms: None,
            tax_included: Some(3),
            tax_table: None,
        });
    }

    pub fn employee(&mut self, id: &str, username: &str, currency: &str, ccard: Option<&str>) {
        let currency_guid = self.currency(currency);
        let ccard_guid = ccard.map(|name| self.guid(name));
        self.employees.push(Employee {
            guid: new_guid(),
            id: id.into(),
            username: username.into(),
            language: "de".into(),
            acl: String::new(),
            active: true,
            currency_guid,
            ccard_guid,
            workday: Numeric::new(8, 1).unwrap(),
            rate: cents(4500),
            addr: Address {
                name: Some(username.to_uppercase()),
                ..Address::default()
            },
        });
    }

    pub async fn finish(self) -> Result<()> {
        let mut writer = self.session.repository().begin().await?;
        for commodity in &self.commodities {
            writer.insert_commodity(commodity).await?;
        }
        for account in &self.accounts {
            writer.insert_account(account).await?;
        }
        for tx in &self.transactions {
            writer.insert_transaction(tx).await?;
        }
        for term in &self.bill_terms {
            writer.insert_bill_term(term).await?;
        }
        for vendor in &self.vendors {
            writer.insert_vendor(vendor).await?;
        }
        for customer in &self.customers {
            writer.insert_customer(customer).await?;
        }
        for employee in &self.employees {
            writer.insert_employee(employee).await?;
        }
        writer.commit().await?;
        self.session.end().await?;
        Ok(())
    }
}

/// Account tree of the standard 2024 book.
pub fn standard_accounts(book: &mut BookBuilder) {
    book.account("Assets", AccountType::Asset, "EUR");
    book.account("Assets:Checking", AccountType::Bank, "EUR");
    book.account("Assets:Wallet", AccountType::Asset, "EUR");
    book.account("Assets:Dollar", AccountType::Bank, "USD");
    book.account("Liabilities", AccountType::Liability, "EUR");
    book.account("Liabilities:Card", AccountType::Liability, "EUR");
    book.account("Income", AccountType::Income, "EUR");
    book.account("Income:Salary", AccountType::Income, "EUR");
    book.account("Income:Gifts", AccountType::Income, "USD");
    book.account("Expenses", AccountType::Expense, "EUR");
    book.account("Expenses:Groceries", AccountType::Expense, "EUR");
    book.account("Equity", AccountType::Equity, "EUR");
    book.account("Equity:Retained Earnings", AccountType::Equity, "EUR");
}

/// A 2024 book with one transaction after year end.
///
/// Balances on 2024-12-31: Checking 2900.00, Wallet 100.00, Dollar
/// 200.00 USD, Card -250.50, Retained Earnings -3000.00, Gifts -200.00 USD,
/// Groceries 250.50. The 2025 transaction moves 50.00 from Checking to
/// Groceries.
pub async fn standard_book(dir: &TempDir) -> Result<PathBuf> {
    let path = dir.path().join("2024.gnucash");
    let mut book = BookBuilder::create(&path).await?;
    standard_accounts(&mut book);
    {
        let checking = book.account_mut("Assets:Checking");
        checking.code = Some("1200".into());
        checking.notes = Some("Giro".into());
        checking.color = Some("#1e90ff".into());
        checking.tax_related = true;
    }
    book.account_mut("Assets").placeholder = true;

    book.transaction(
        "2024-01-31",
        "Salary",
        &[("Assets:Checking", 300000), ("Income:Salary", -300000)],
    );
    book.transaction(
        "2024-02-10",
        "Supermarket",
        &[("Expenses:Groceries", 25050), ("Liabilities:Card", -25050)],
    );
    book.transaction(
        "2024-03-01",
        "ATM",
        &[("Assets:Wallet", 10000), ("Assets:Checking", -10000)],
    );
    book.transaction(
        "2024-06-01",
        "Birthday",
        &[("Assets:Dollar", 20000), ("Income:Gifts", -20000)],
    );
    book.transaction(
        "2024-12-31",
        "Closing",
        &[("Income:Salary", 300000), ("Equity:Retained Earnings", -300000)],
    );
    book.transaction(
        "2025-01-15",
        "Bakery",
        &[("Expenses:Groceries", 5000), ("Assets:Checking", -5000)],
    );

    let net30 = book.bill_term("Net 30", 30);
    book.vendor("V001", "Stadtwerke", "EUR", Some(net30));
    book.customer("C001", "Musterfirma", "EUR");
    book.employee("E001", "jdoe", "EUR", Some("Liabilities:Card"));

    book.finish().await?;
    Ok(path)
}

pub fn options(target: &Path) -> RolloverOptions {
    RolloverOptions {
        target: target.to_str().unwrap().to_string(),
        targets: OpeningTargets::default(),
        currency: None,
        opening_date: date("2025-01-01"),
        closing_date: Some(date("2024-12-31")),
        break_lock: false,
        dry_run: false,
    }
}

/// Balances of a book by full account name.
pub async fn balances_of(path: &Path) -> Result<HashMap<String, AccountBalance>> {
    let service = YearEndService::open(path.to_str().unwrap()).await?;
    let balances = service.balances(None, true).await?;
    service.close().await?;
    Ok(balances
        .into_iter()
        .map(|b| (b.account.clone(), b))
        .collect())
}
