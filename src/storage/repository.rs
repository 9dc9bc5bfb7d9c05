use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool};
use tracing::debug;

use crate::domain::{
    new_guid, Account, AccountType, Address, BillTerm, Commodity, Customer, Employee, Guid,
    Numeric, Split, Transaction, Vendor,
};

use super::MIGRATION_001_GNUCASH_SCHEMA;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Format of books written by GnuCash before 2.6.
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

// KVP slot types as stored in `slots.slot_type`
const SLOT_INT64: i64 = 1;
const SLOT_STRING: i64 = 4;
const SLOT_GDATE: i64 = 10;

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, LEGACY_TIMESTAMP_FORMAT))
        .with_context(|| format!("Invalid timestamp: {}", s))
}

/// Guids of a book and its two account trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRoots {
    pub book_guid: Guid,
    pub root_account_guid: Guid,
    pub root_template_guid: Guid,
}

enum SlotValue<'a> {
    Int64(i64),
    Text(&'a str),
    Date(NaiveDate),
}

/// Repository for reading and writing a GnuCash SQLite book.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Lay out the GnuCash schema in an empty database and create the book
    /// with its root account and template root.
    pub async fn create_book(&self) -> Result<BookRoots> {
        sqlx::raw_sql(MIGRATION_001_GNUCASH_SCHEMA)
            .execute(&self.pool)
            .await
            .context("Failed to create GnuCash schema")?;

        let root = Account::new("Root Account", AccountType::Root, None, 100);
        let template = Account::new("Template Root", AccountType::Root, None, 0);
        let roots = BookRoots {
            book_guid: new_guid(),
            root_account_guid: root.guid.clone(),
            root_template_guid: template.guid.clone(),
        };

        let mut writer = self.begin().await?;
        writer.insert_book(&roots).await?;
        writer.insert_account(&root).await?;
        writer.insert_account(&template).await?;
        writer.commit().await?;

        debug!(book = %roots.book_guid, "created book");
        Ok(roots)
    }

    /// Start a write transaction. Nothing is visible until `commit`.
    pub async fn begin(&self) -> Result<BookWriter> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        Ok(BookWriter { tx })
    }

    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .context("Failed to inspect schema")?;
        Ok(row.get::<i64, _>("count") > 0)
    }

    pub async fn book_roots(&self) -> Result<BookRoots> {
        let row = sqlx::query("SELECT guid, root_account_guid, root_template_guid FROM books LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch book")?
            .ok_or_else(|| anyhow::anyhow!("Book table is empty"))?;

        Ok(BookRoots {
            book_guid: row.get("guid"),
            root_account_guid: row.get("root_account_guid"),
            root_template_guid: row.get("root_template_guid"),
        })
    }

    // ========================
    // Commodities and accounts
    // ========================

    pub async fn list_commodities(&self) -> Result<Vec<Commodity>> {
        let rows = sqlx::query(
            r#"
            SELECT guid, namespace, mnemonic, fullname, cusip, fraction, quote_flag, quote_source, quote_tz
            FROM commodities
            ORDER BY namespace, mnemonic
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list commodities")?;

        Ok(rows
            .iter()
            .map(|row| Commodity {
                guid: row.get("guid"),
                namespace: row.get("namespace"),
                mnemonic: row.get("mnemonic"),
                fullname: row.get("fullname"),
                cusip: row.get("cusip"),
                fraction: row.get("fraction"),
                quote_flag: row.get::<i64, _>("quote_flag") != 0,
                quote_source: row.get("quote_source"),
                quote_tz: row.get("quote_tz"),
            })
            .collect())
    }

    /// All accounts of the book, template accounts included, with their
    /// notes, color and tax-related slots.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT guid, name, account_type, commodity_guid, commodity_scu, non_std_scu, parent_guid, code, description, hidden, placeholder
            FROM accounts
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        let mut accounts: Vec<Account> = rows
            .iter()
            .map(Self::row_to_account)
            .collect::<Result<_>>()?;

        let slot_rows = sqlx::query(
            r#"
            SELECT obj_guid, name, int64_val, string_val
            FROM slots
            WHERE name IN ('notes', 'color', 'tax-related')
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list account slots")?;

        let mut slots: HashMap<String, Vec<&SqliteRow>> = HashMap::new();
        for row in &slot_rows {
            slots.entry(row.get("obj_guid")).or_default().push(row);
        }
        for account in &mut accounts {
            let Some(rows) = slots.get(&account.guid) else {
                continue;
            };
            for row in rows {
                let name: String = row.get("name");
                match name.as_str() {
                    "notes" => account.notes = row.get("string_val"),
                    "color" => account.color = row.get("string_val"),
                    "tax-related" => {
                        account.tax_related = row.get::<Option<i64>, _>("int64_val").unwrap_or(0) != 0
                    }
                    _ => {}
                }
            }
        }

        Ok(accounts)
    }

    /// Balance of every account with splits, in the account's commodity.
    /// With `as_of`, only transactions posted on or before that day count.
    pub async fn compute_all_balances(
        &self,
        as_of: Option<NaiveDate>,
    ) -> Result<HashMap<Guid, Numeric>> {
        let end_of_day = as_of.and_then(|d| d.and_hms_opt(23, 59, 59));
        let boundary = end_of_day.map(|ts| format_timestamp(&ts));
        let legacy_boundary = end_of_day.map(|ts| ts.format(LEGACY_TIMESTAMP_FORMAT).to_string());

        let rows = sqlx::query(
            r#"
            SELECT s.account_guid AS account_guid, s.quantity_denom AS denom, SUM(s.quantity_num) AS total
            FROM splits s
            JOIN transactions t ON t.guid = s.tx_guid
            WHERE ? IS NULL
               OR (length(t.post_date) = 19 AND t.post_date <= ?)
               OR (length(t.post_date) = 14 AND t.post_date <= ?)
            GROUP BY s.account_guid, s.quantity_denom
            "#,
        )
        .bind(&boundary)
        .bind(&boundary)
        .bind(&legacy_boundary)
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute balances")?;

        let mut balances: HashMap<Guid, Numeric> = HashMap::new();
        for row in rows {
            let account: Guid = row.get("account_guid");
            let part = Numeric::new(row.get("total"), row.get("denom"))
                .context("Invalid split quantity")?;
            let entry = balances.entry(account.clone()).or_insert(Numeric::ZERO);
            *entry = entry
                .checked_add(part)
                .ok_or_else(|| anyhow::anyhow!("Balance overflow in account {}", account))?;
        }

        Ok(balances)
    }

    // ========================
    // Transactions
    // ========================

    /// All transactions with their splits, ordered by post date.
    pub async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT guid, currency_guid, num, post_date, enter_date, description
            FROM transactions
            ORDER BY post_date, guid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        let split_rows = sqlx::query(
            r#"
            SELECT guid, tx_guid, account_guid, memo, action, reconcile_state, value_num, value_denom, quantity_num, quantity_denom
            FROM splits
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list splits")?;

        let mut splits: HashMap<Guid, Vec<Split>> = HashMap::new();
        for row in &split_rows {
            let tx_guid: Guid = row.get("tx_guid");
            splits.entry(tx_guid).or_default().push(Self::row_to_split(row)?);
        }

        rows.iter()
            .map(|row| -> Result<Transaction> {
                let guid: Guid = row.get("guid");
                let post_date: Option<String> = row.get("post_date");
                let enter_date: Option<String> = row.get("enter_date");
                Ok(Transaction {
                    splits: splits.remove(&guid).unwrap_or_default(),
                    guid,
                    currency_guid: row.get("currency_guid"),
                    num: row.get("num"),
                    post_date: post_date
                        .as_deref()
                        .map(parse_timestamp)
                        .transpose()?
                        .unwrap_or_default(),
                    enter_date: enter_date
                        .as_deref()
                        .map(parse_timestamp)
                        .transpose()?
                        .unwrap_or_default(),
                    description: row
                        .get::<Option<String>, _>("description")
                        .unwrap_or_default(),
                })
            })
            .collect()
    }

    // ========================
    // Business entities
    // ========================

    pub async fn list_bill_terms(&self) -> Result<Vec<BillTerm>> {
        if !self.table_exists("billterms").await? {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT guid, name, description, refcount, invisible, parent, type, duedays, discountdays, discount_num, discount_denom, cutoff
            FROM billterms
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list bill terms")?;

        rows.iter()
            .map(|row| -> Result<BillTerm> {
                let discount_num: Option<i64> = row.get("discount_num");
                let discount_denom: Option<i64> = row.get("discount_denom");
                let discount = match (discount_num, discount_denom) {
                    (Some(num), Some(denom)) if denom != 0 => Some(
                        Numeric::new(num, denom).context("Invalid bill term discount")?,
                    ),
                    _ => None,
                };
                Ok(BillTerm {
                    guid: row.get("guid"),
                    name: row.get("name"),
                    description: row.get("description"),
                    refcount: row.get("refcount"),
                    invisible: row.get::<i64, _>("invisible") != 0,
                    parent: row.get("parent"),
                    term_type: row.get("type"),
                    due_days: row.get("duedays"),
                    discount_days: row.get("discountdays"),
                    discount,
                    cutoff: row.get("cutoff"),
                })
            })
            .collect()
    }

    pub async fn list_vendors(&self) -> Result<Vec<Vendor>> {
        if !self.table_exists("vendors").await? {
            return Ok(Vec::new());
        }
        let rows = sqlx::query("SELECT * FROM vendors ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list vendors")?;

        Ok(rows
            .iter()
            .map(|row| Vendor {
                guid: row.get("guid"),
                id: row.get("id"),
                name: row.get("name"),
                notes: row.get("notes"),
                currency_guid: row.get("currency"),
                active: row.get::<i64, _>("active") != 0,
                tax_override: row.get::<i64, _>("tax_override") != 0,
                addr: Self::row_to_address(row, "addr"),
                terms: row.get("terms"),
                tax_included: row.get("tax_inc"),
                tax_table: row.get("tax_table"),
            })
            .collect())
    }

    pub async fn list_customers(&self) -> Result<Vec<Customer>> {
        if !self.table_exists("customers").await? {
            return Ok(Vec::new());
        }
        let rows = sqlx::query("SELECT * FROM customers ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list customers")?;

        rows.iter()
            .map(|row| -> Result<Customer> {
                Ok(Customer {
                    guid: row.get("guid"),
                    id: row.get("id"),
                    name: row.get("name"),
                    notes: row.get("notes"),
                    active: row.get::<i64, _>("active") != 0,
                    discount: Numeric::new(row.get("discount_num"), row.get("discount_denom"))
                        .context("Invalid customer discount")?,
                    credit: Numeric::new(row.get("credit_num"), row.get("credit_denom"))
                        .context("Invalid customer credit")?,
                    currency_guid: row.get("currency"),
                    tax_override: row.get::<i64, _>("tax_override") != 0,
                    addr: Self::row_to_address(row, "addr"),
                    ship_addr: Self::row_to_address(row, "shipaddr"),
                    terms: row.get("terms"),
                    tax_included: row.get("tax_included"),
                    tax_table: row.get("taxtable"),
                })
            })
            .collect()
    }

    pub async fn list_employees(&self) -> Result<Vec<Employee>> {
        if !self.table_exists("employees").await? {
            return Ok(Vec::new());
        }
        let rows = sqlx::query("SELECT * FROM employees ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list employees")?;

        rows.iter()
            .map(|row| -> Result<Employee> {
                Ok(Employee {
                    guid: row.get("guid"),
                    id: row.get("id"),
                    username: row.get("username"),
                    language: row.get("language"),
                    acl: row.get("acl"),
                    active: row.get::<i64, _>("active") != 0,
                    currency_guid: row.get("currency"),
                    ccard_guid: row.get("ccard_guid"),
                    workday: Numeric::new(row.get("workday_num"), row.get("workday_denom"))
                        .context("Invalid employee workday")?,
                    rate: Numeric::new(row.get("rate_num"), row.get("rate_denom"))
                        .context("Invalid employee rate")?,
                    addr: Self::row_to_address(row, "addr"),
                })
            })
            .collect()
    }

    fn row_to_account(row: &SqliteRow) -> Result<Account> {
        let type_str: String = row.get("account_type");
        Ok(Account {
            guid: row.get("guid"),
            name: row.get("name"),
            account_type: AccountType::from_str(&type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid account type: {}", type_str))?,
            commodity_guid: row.get("commodity_guid"),
            commodity_scu: row.get("commodity_scu"),
            non_std_scu: row.get::<i64, _>("non_std_scu") != 0,
            parent_guid: row.get("parent_guid"),
            code: row.get("code"),
            description: row.get("description"),
            hidden: row.get::<Option<i64>, _>("hidden").unwrap_or(0) != 0,
            placeholder: row.get::<Option<i64>, _>("placeholder").unwrap_or(0) != 0,
            notes: None,
            color: None,
            tax_related: false,
        })
    }

    fn row_to_split(row: &SqliteRow) -> Result<Split> {
        let reconcile: String = row.get("reconcile_state");
        Ok(Split {
            guid: row.get("guid"),
            account_guid: row.get("account_guid"),
            memo: row.get("memo"),
            action: row.get("action"),
            reconcile_state: reconcile.chars().next().unwrap_or('n'),
            value: Numeric::new(row.get("value_num"), row.get("value_denom"))
                .context("Invalid split value")?,
            quantity: Numeric::new(row.get("quantity_num"), row.get("quantity_denom"))
                .context("Invalid split quantity")?,
        })
    }

    fn row_to_address(row: &SqliteRow, prefix: &str) -> Address {
        let field = |name: &str| -> Option<String> { row.get(format!("{}_{}", prefix, name).as_str()) };
        Address {
            name: field("name"),
            addr1: field("addr1"),
            addr2: field("addr2"),
            addr3: field("addr3"),
            addr4: field("addr4"),
            phone: field("phone"),
            fax: field("fax"),
            email: field("email"),
        }
    }
}

/// Writes into a book inside a single database transaction. Dropping the
/// writer without `commit` rolls everything back.
pub struct BookWriter {
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl BookWriter {
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("Failed to commit")?;
        Ok(())
    }

    pub async fn insert_book(&mut self, roots: &BookRoots) -> Result<()> {
        sqlx::query("INSERT INTO books (guid, root_account_guid, root_template_guid) VALUES (?, ?, ?)")
            .bind(&roots.book_guid)
            .bind(&roots.root_account_guid)
            .bind(&roots.root_template_guid)
            .execute(&mut *self.tx)
            .await
            .context("Failed to save book")?;
        Ok(())
    }

    pub async fn insert_commodity(&mut self, commodity: &Commodity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO commodities (guid, namespace, mnemonic, fullname, cusip, fraction, quote_flag, quote_source, quote_tz)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&commodity.guid)
        .bind(&commodity.namespace)
        .bind(&commodity.mnemonic)
        .bind(&commodity.fullname)
        .bind(&commodity.cusip)
        .bind(commodity.fraction)
        .bind(commodity.quote_flag as i64)
        .bind(&commodity.quote_source)
        .bind(&commodity.quote_tz)
        .execute(&mut *self.tx)
        .await
        .context("Failed to save commodity")?;
        Ok(())
    }

    pub async fn insert_account(&mut self, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (guid, name, account_type, commodity_guid, commodity_scu, non_std_scu, parent_guid, code, description, hidden, placeholder)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.guid)
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(&account.commodity_guid)
        .bind(account.commodity_scu)
        .bind(account.non_std_scu as i64)
        .bind(&account.parent_guid)
        .bind(&account.code)
        .bind(&account.description)
        .bind(account.hidden as i64)
        .bind(account.placeholder as i64)
        .execute(&mut *self.tx)
        .await
        .with_context(|| format!("Failed to save account {}", account.name))?;

        if let Some(notes) = account.notes.as_deref().filter(|n| !n.is_empty()) {
            self.insert_slot(&account.guid, "notes", SlotValue::Text(notes))
                .await?;
        }
        if let Some(color) = account.color.as_deref().filter(|c| !c.is_empty()) {
            self.insert_slot(&account.guid, "color", SlotValue::Text(color))
                .await?;
        }
        if account.tax_related {
            self.insert_slot(&account.guid, "tax-related", SlotValue::Int64(1))
                .await?;
        }
        Ok(())
    }

    pub async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (guid, currency_guid, num, post_date, enter_date, description)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.guid)
        .bind(&transaction.currency_guid)
        .bind(&transaction.num)
        .bind(format_timestamp(&transaction.post_date))
        .bind(format_timestamp(&transaction.enter_date))
        .bind(&transaction.description)
        .execute(&mut *self.tx)
        .await
        .context("Failed to save transaction")?;

        for split in &transaction.splits {
            sqlx::query(
                r#"
                INSERT INTO splits (guid, tx_guid, account_guid, memo, action, reconcile_state, reconcile_date, value_num, value_denom, quantity_num, quantity_denom, lot_guid)
                VALUES (?, ?, ?, ?, ?, ?, NULL, ?, ?, ?, ?, NULL)
                "#,
            )
            .bind(&split.guid)
            .bind(&transaction.guid)
            .bind(&split.account_guid)
            .bind(&split.memo)
            .bind(&split.action)
            .bind(split.reconcile_state.to_string())
            .bind(split.value.num)
            .bind(split.value.denom)
            .bind(split.quantity.num)
            .bind(split.quantity.denom)
            .execute(&mut *self.tx)
            .await
            .context("Failed to save split")?;
        }

        self.insert_slot(
            &transaction.guid,
            "date-posted",
            SlotValue::Date(transaction.post_date.date()),
        )
        .await
    }

    pub async fn insert_bill_term(&mut self, term: &BillTerm) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO billterms (guid, name, description, refcount, invisible, parent, type, duedays, discountdays, discount_num, discount_denom, cutoff)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&term.guid)
        .bind(&term.name)
        .bind(&term.description)
        .bind(term.refcount)
        .bind(term.invisible as i64)
        .bind(&term.parent)
        .bind(&term.term_type)
        .bind(term.due_days)
        .bind(term.discount_days)
        .bind(term.discount.map(|d| d.num))
        .bind(term.discount.map(|d| d.denom))
        .bind(term.cutoff)
        .execute(&mut *self.tx)
        .await
        .context("Failed to save bill term")?;
        Ok(())
    }

    pub async fn insert_vendor(&mut self, vendor: &Vendor) -> Result<()> {
        let a = &vendor.addr;
        sqlx::query(
            r#"
            INSERT INTO vendors (guid, name, id, notes, currency, active, tax_override,
                addr_name, addr_addr1, addr_addr2, addr_addr3, addr_addr4, addr_phone, addr_fax, addr_email,
                terms, tax_inc, tax_table)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&vendor.guid)
        .bind(&vendor.name)
        .bind(&vendor.id)
        .bind(&vendor.notes)
        .bind(&vendor.currency_guid)
        .bind(vendor.active as i64)
        .bind(vendor.tax_override as i64)
        .bind(&a.name)
        .bind(&a.addr1)
        .bind(&a.addr2)
        .bind(&a.addr3)
        .bind(&a.addr4)
        .bind(&a.phone)
        .bind(&a.fax)
        .bind(&a.email)
        .bind(&vendor.terms)
        .bind(&vendor.tax_included)
        .bind(&vendor.tax_table)
        .execute(&mut *self.tx)
        .await
        .with_context(|| format!("Failed to save vendor {}", vendor.id))?;
        Ok(())
    }

    pub async fn insert_customer(&mut self, customer: &Customer) -> Result<()> {
        let a = &customer.addr;
        let s = &customer.ship_addr;
        sqlx::query(
            r#"
            INSERT INTO customers (guid, name, id, notes, active, discount_num, discount_denom, credit_num, credit_denom, currency, tax_override,
                addr_name, addr_addr1, addr_addr2, addr_addr3, addr_addr4, addr_phone, addr_fax, addr_email,
                shipaddr_name, shipaddr_addr1, shipaddr_addr2, shipaddr_addr3, shipaddr_addr4, shipaddr_phone, shipaddr_fax, shipaddr_email,
                terms, tax_included, taxtable)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&customer.guid)
        .bind(&customer.name)
        .bind(&customer.id)
        .bind(&customer.notes)
        .bind(customer.active as i64)
        .bind(customer.discount.num)
        .bind(customer.discount.denom)
        .bind(customer.credit.num)
        .bind(customer.credit.denom)
        .bind(&customer.currency_guid)
        .bind(customer.tax_override as i64)
        .bind(&a.name)
        .bind(&a.addr1)
        .bind(&a.addr2)
        .bind(&a.addr3)
        .bind(&a.addr4)
        .bind(&a.phone)
        .bind(&a.fax)
        .bind(&a.email)
        .bind(&s.name)
        .bind(&s.addr1)
        .bind(&s.addr2)
        .bind(&s.addr3)
        .bind(&s.addr4)
        .bind(&s.phone)
        .bind(&s.fax)
        .bind(&s.email)
        .bind(&customer.terms)
        .bind(customer.tax_included)
        .bind(&customer.tax_table)
        .execute(&mut *self.tx)
        .await
        .with_context(|| format!("Failed to save customer {}", customer.id))?;
        Ok(())
    }

    pub async fn insert_employee(&mut self, employee: &Employee) -> Result<()> {
        let a = &employee.addr;
        sqlx::query(
            r#"
            INSERT INTO employees (guid, username, id, language, acl, active, currency, ccard_guid, workday_num, workday_denom, rate_num, rate_denom,
                addr_name, addr_addr1, addr_addr2, addr_addr3, addr_addr4, addr_phone, addr_fax, addr_email)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&employee.guid)
        .bind(&employee.username)
        .bind(&employee.id)
        .bind(&employee.language)
        .bind(&employee.acl)
        .bind(employee.active as i64)
        .bind(&employee.currency_guid)
        .bind(&employee.ccard_guid)
        .bind(employee.workday.num)
        .bind(employee.workday.denom)
        .bind(employee.rate.num)
        .bind(employee.rate.denom)
        .bind(&a.name)
        .bind(&a.addr1)
        .bind(&a.addr2)
        .bind(&a.addr3)
        .bind(&a.addr4)
        .bind(&a.phone)
        .bind(&a.fax)
        .bind(&a.email)
        .execute(&mut *self.tx)
        .await
        .with_context(|| format!("Failed to save employee {}", employee.id))?;
        Ok(())
    }

    async fn insert_slot(&mut self, obj_guid: &str, name: &str, value: SlotValue<'_>) -> Result<()> {
        let (slot_type, int64_val, string_val, gdate_val) = match value {
            SlotValue::Int64(v) => (SLOT_INT64, v, None, None),
            SlotValue::Text(s) => (SLOT_STRING, 0, Some(s.to_string()), None),
            SlotValue::Date(d) => (SLOT_GDATE, 0, None, Some(d.format("%Y%m%d").to_string())),
        };
        sqlx::query(
            r#"
            INSERT INTO slots (obj_guid, name, slot_type, int64_val, string_val, double_val, timespec_val, guid_val, numeric_val_num, numeric_val_denom, gdate_val)
            VALUES (?, ?, ?, ?, ?, 0.0, NULL, NULL, 0, 1, ?)
            "#,
        )
        .bind(obj_guid)
        .bind(name)
        .bind(slot_type)
        .bind(int64_val)
        .bind(string_val)
        .bind(gdate_val)
        .execute(&mut *self.tx)
        .await
        .with_context(|| format!("Failed to save slot {}", name))?;
        Ok(())
    }
}
