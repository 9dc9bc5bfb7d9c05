use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::domain::{
    parents_first, plan_opening_balances, printify_transaction, suffixed_path, Account,
    AccountTree, AccountType, BusinessEntity, Commodity, CommodityKey, Guid, GuidMap, Numeric,
    OpeningBalance, OpeningPlan, OpeningTargets, PathLookup, PlanInput,
};
use crate::storage::{
    book_path, BookRoots, BookWriter, Repository, Session, SessionError, SessionMode,
};

use super::{AccountBalance, AppError, BalanceLine, CopySummary, OpeningBalanceReport, RolloverReport};

/// Year-end operations on a GnuCash book. The source book is only ever
/// opened read-only.
pub struct YearEndService {
    source: Session,
    location: String,
}

/// Parameters of a rollover into a new book.
#[derive(Debug, Clone)]
pub struct RolloverOptions {
    pub target: String,
    pub targets: OpeningTargets,
    pub currency: Option<CommodityKey>,
    pub opening_date: NaiveDate,
    pub closing_date: Option<NaiveDate>,
    pub break_lock: bool,
    pub dry_run: bool,
}

/// Everything read from the source book for one rollover.
struct SourceBook {
    roots: BookRoots,
    tree: AccountTree,
    commodities: HashMap<Guid, Commodity>,
    balances: HashMap<Guid, Numeric>,
}

impl YearEndService {
    /// Open the source book read-only.
    pub async fn open(location: &str) -> Result<Self, AppError> {
        let source = Session::open(location, SessionMode::ReadOnly).await?;
        Ok(Self {
            source,
            location: location.to_string(),
        })
    }

    pub fn source_path(&self) -> &Path {
        self.source.path()
    }

    fn repo(&self) -> &Repository {
        self.source.repository()
    }

    /// End the source session.
    pub async fn close(self) -> Result<(), AppError> {
        self.source.end().await?;
        Ok(())
    }

    async fn load_source(&self, as_of: Option<NaiveDate>) -> Result<SourceBook, AppError> {
        let repo = self.repo();
        let roots = repo.book_roots().await?;
        let tree = AccountTree::from_accounts(repo.list_accounts().await?);
        let commodities = repo
            .list_commodities()
            .await?
            .into_iter()
            .map(|c| (c.guid.clone(), c))
            .collect();
        let balances = repo.compute_all_balances(as_of).await?;
        debug!(accounts = tree.len(), "source book loaded");
        Ok(SourceBook {
            roots,
            tree,
            commodities,
            balances,
        })
    }

    // ========================
    // Balances
    // ========================

    /// Balance of every account below the root, in tree order.
    pub async fn balances(
        &self,
        as_of: Option<NaiveDate>,
        include_zero: bool,
    ) -> Result<Vec<AccountBalance>, AppError> {
        let source = self.load_source(as_of).await?;
        let mut result = Vec::new();
        for account in source.tree.walk(&source.roots.root_account_guid) {
            let balance = source
                .balances
                .get(&account.guid)
                .copied()
                .unwrap_or(Numeric::ZERO);
            if balance.is_zero() && !include_zero {
                continue;
            }
            let commodity = account
                .commodity_guid
                .as_ref()
                .and_then(|g| source.commodities.get(g));
            result.push(AccountBalance {
                account: source.tree.full_name(&account.guid),
                account_type: account.account_type,
                commodity: commodity.map(|c| c.mnemonic.clone()).unwrap_or_default(),
                balance: commodity.map_or(balance, |c| balance.rescale(c.fraction)),
            });
        }
        Ok(result)
    }

    // ========================
    // Rollover
    // ========================

    /// Create (or extend) the book for the new year: the account tree, the
    /// opening balance transactions and the business parties.
    pub async fn rollover(&self, options: &RolloverOptions) -> Result<RolloverReport, AppError> {
        let source = self.load_source(options.closing_date).await?;
        let plan = plan_opening_balances(PlanInput {
            tree: &source.tree,
            root_guid: &source.roots.root_account_guid,
            commodities: &source.commodities,
            balances: &source.balances,
            opening_date: options.opening_date,
            preferred_currency: options.currency.as_ref(),
        })?;
        for warning in &plan.warnings {
            warn!("{}", warning);
        }
        if let Some(preferred) = &options.currency {
            if !plan.is_main(preferred) && !plan.balances.is_empty() {
                warn!(currency = %preferred, "no opening balance in the requested currency");
            }
        }

        let target_path = book_path(&options.target)?;
        let target_existed = target_path.exists();
        if target_existed && same_file(self.source_path(), &target_path)? {
            return Err(AppError::TargetIsSource(target_path.display().to_string()));
        }
        let mut report = RolloverReport {
            source: self.location.clone(),
            target: options.target.clone(),
            dry_run: options.dry_run,
            target_existed,
            opening_date: options.opening_date,
            closing_date: options.closing_date,
            main_currency: plan.main_currency.as_ref().map(|k| k.mnemonic.clone()),
            balances: plan
                .balances
                .iter()
                .map(|b| entry_report(&source.tree, &plan, b, options))
                .collect(),
            copied: CopySummary::default(),
            warnings: plan.warnings.clone(),
        };

        if options.dry_run {
            info!(book = %options.target, "dry run; target book left untouched");
            return Ok(report);
        }

        let mode = if !target_existed {
            SessionMode::NewStore
        } else {
            warn!(book = %options.target, "target book exists; merging into it");
            if options.break_lock {
                SessionMode::BreakLock
            } else {
                SessionMode::NormalOpen
            }
        };
        let target = Session::open(&options.target, mode).await?;

        let result = self
            .write_target(target.repository(), &source, &plan, options, &mut report)
            .await;
        let ended = target.end().await;
        result?;
        ended?;

        info!(
            book = %options.target,
            transactions = report.copied.transactions_created,
            accounts = report.copied.accounts_created,
            "rollover complete"
        );
        Ok(report)
    }

    async fn write_target(
        &self,
        repo: &Repository,
        source: &SourceBook,
        plan: &OpeningPlan,
        options: &RolloverOptions,
        report: &mut RolloverReport,
    ) -> Result<(), AppError> {
        let roots = repo.book_roots().await?;
        let tree = AccountTree::from_accounts(repo.list_accounts().await?);
        let commodities = repo
            .list_commodities()
            .await?
            .into_iter()
            .map(|c| (c.key(), c.guid))
            .collect();
        let vendors = ids(repo.list_vendors().await?);
        let customers = ids(repo.list_customers().await?);
        let employees = ids(repo.list_employees().await?);
        let bill_terms: HashMap<String, Guid> = repo
            .list_bill_terms()
            .await?
            .into_iter()
            .map(|t| (t.name, t.guid))
            .collect();

        let mut copy = BookCopy {
            writer: repo.begin().await?,
            root: roots.root_account_guid,
            tree,
            commodities,
            map: GuidMap::default(),
            summary: CopySummary::default(),
        };

        copy.copy_accounts(source, plan).await?;

        for (entry, balance) in report.balances.iter_mut().zip(&plan.balances) {
            entry.balancing_account = copy
                .write_opening_balance(source, plan, balance, &options.targets)
                .await?;
        }

        let source_repo = self.repo();
        let terms = source_repo.list_bill_terms().await?;
        for term in parents_first(&terms) {
            if let Some(existing) = bill_terms.get(&term.name) {
                copy.map.bill_terms.insert(term.guid.clone(), existing.clone());
                continue;
            }
            let new_term = term.clone_for(&copy.map);
            copy.writer.insert_bill_term(&new_term).await?;
            copy.map.bill_terms.insert(term.guid.clone(), new_term.guid);
            copy.summary.bill_terms += 1;
        }

        for vendor in copy.prepare(&source_repo.list_vendors().await?, &vendors, source).await? {
            copy.writer.insert_vendor(&vendor).await?;
            copy.summary.vendors += 1;
        }
        for customer in copy.prepare(&source_repo.list_customers().await?, &customers, source).await? {
            copy.writer.insert_customer(&customer).await?;
            copy.summary.customers += 1;
        }
        for employee in copy.prepare(&source_repo.list_employees().await?, &employees, source).await? {
            copy.writer.insert_employee(&employee).await?;
            copy.summary.employees += 1;
        }

        report.copied = copy.summary;
        copy.writer.commit().await?;
        Ok(())
    }
}

fn same_file(a: &Path, b: &Path) -> Result<bool, AppError> {
    let canonical = |p: &Path| std::fs::canonicalize(p).map_err(SessionError::from);
    Ok(canonical(a)? == canonical(b)?)
}

fn ids<T: BusinessEntity>(entities: Vec<T>) -> HashSet<String> {
    entities.iter().map(|e| e.entity_id().to_string()).collect()
}

fn entry_report(
    tree: &AccountTree,
    plan: &OpeningPlan,
    balance: &OpeningBalance,
    options: &RolloverOptions,
) -> OpeningBalanceReport {
    let name_of = |guid: &str| tree.full_name(guid);
    OpeningBalanceReport {
        group: balance.group,
        commodity: balance.commodity.to_string(),
        mnemonic: balance.commodity.mnemonic.clone(),
        lines: balance
            .transaction
            .splits
            .iter()
            .map(|s| BalanceLine {
                account: name_of(&s.account_guid),
                amount: s.value,
            })
            .collect(),
        total: balance.total,
        balancing_account: (!balance.total.is_zero())
            .then(|| plan.balancing_path(balance, &options.targets).join(":")),
        rendered: printify_transaction(&balance.transaction, name_of),
    }
}

/// State of one write into the target book.
struct BookCopy {
    writer: BookWriter,
    root: Guid,
    /// The target's account tree, kept current while accounts are added
    tree: AccountTree,
    commodities: HashMap<CommodityKey, Guid>,
    map: GuidMap,
    summary: CopySummary,
}

impl BookCopy {
    /// Target guid of a source commodity, inserting it if the target lacks it.
    async fn ensure_commodity(&mut self, commodity: &Commodity) -> Result<Guid, AppError> {
        if let Some(guid) = self.map.commodities.get(&commodity.guid) {
            return Ok(guid.clone());
        }
        let key = commodity.key();
        let guid = match self.commodities.get(&key) {
            Some(guid) => guid.clone(),
            None => {
                let mut new_commodity = commodity.clone_for_book();
                new_commodity.namespace = key.namespace.clone();
                self.writer.insert_commodity(&new_commodity).await?;
                debug!(commodity = %key, "commodity created");
                self.commodities.insert(key, new_commodity.guid.clone());
                self.summary.commodities_created += 1;
                new_commodity.guid
            }
        };
        self.map
            .commodities
            .insert(commodity.guid.clone(), guid.clone());
        Ok(guid)
    }

    /// Recreate the source account tree below the target root. Accounts that
    /// already exist by name under the same parent are reused. A reused
    /// account held in another commodity is an error if it would receive an
    /// opening split.
    async fn copy_accounts(
        &mut self,
        source: &SourceBook,
        plan: &OpeningPlan,
    ) -> Result<(), AppError> {
        let source_root = &source.roots.root_account_guid;
        self.map
            .accounts
            .insert(source_root.clone(), self.root.clone());
        let opening: HashSet<&str> = plan
            .balances
            .iter()
            .flat_map(|b| b.transaction.splits.iter())
            .map(|s| s.account_guid.as_str())
            .collect();

        for account in source.tree.walk(source_root) {
            let parent = account
                .parent_guid
                .as_ref()
                .and_then(|p| self.map.accounts.get(p))
                .cloned()
                .unwrap_or_else(|| self.root.clone());
            let commodity = account
                .commodity_guid
                .as_ref()
                .and_then(|g| source.commodities.get(g));

            if let Some(existing) = self.tree.child_by_name(&parent, &account.name) {
                let full_name = source.tree.full_name(&account.guid);
                if existing.account_type != account.account_type {
                    warn!(
                        account = %full_name,
                        "existing account has type {}, source has {}",
                        existing.account_type,
                        account.account_type
                    );
                }
                let expected = commodity.and_then(|c| self.commodities.get(&c.key()));
                if existing.commodity_guid.as_ref() != expected {
                    let held_in = commodity.map(|c| c.mnemonic.clone()).unwrap_or_default();
                    if opening.contains(account.guid.as_str()) {
                        return Err(AppError::AccountCurrencyMismatch {
                            account: full_name,
                            currency: held_in,
                        });
                    }
                    warn!(
                        account = %full_name,
                        commodity = %held_in,
                        "existing account held in another commodity"
                    );
                }
                let guid = existing.guid.clone();
                self.map.accounts.insert(account.guid.clone(), guid);
                self.summary.accounts_reused += 1;
                continue;
            }

            let commodity_guid = match commodity {
                Some(commodity) => Some(self.ensure_commodity(commodity).await?),
                None => None,
            };
            let new_account = account.clone_for_book(&parent, commodity_guid);
            self.writer.insert_account(&new_account).await?;
            self.map
                .accounts
                .insert(account.guid.clone(), new_account.guid.clone());
            self.tree.insert(new_account);
            self.summary.accounts_created += 1;
        }
        Ok(())
    }

    /// Write one opening transaction. Returns the full name of the balancing
    /// account if a balancing split was added.
    async fn write_opening_balance(
        &mut self,
        source: &SourceBook,
        plan: &OpeningPlan,
        balance: &OpeningBalance,
        targets: &OpeningTargets,
    ) -> Result<Option<String>, AppError> {
        let commodity = source
            .commodities
            .get(&balance.currency_guid)
            .ok_or_else(|| AppError::InvalidCurrency(balance.commodity.to_string()))?;
        let currency = self.ensure_commodity(commodity).await?;

        let mut transaction = balance.transaction.clone();
        transaction.currency_guid = currency.clone();
        for split in &mut transaction.splits {
            let mapped = self.map.accounts.get(&split.account_guid).cloned().ok_or_else(|| {
                AppError::InvalidAccountPath(source.tree.full_name(&split.account_guid))
            })?;
            split.account_guid = mapped;
        }

        let mut balancing_name = None;
        if !balance.total.is_zero() {
            let preferred = plan.balancing_path(balance, targets);
            let fallback = plan
                .is_main(&balance.commodity)
                .then(|| suffixed_path(&preferred, &balance.commodity.mnemonic));
            let account = self
                .balancing_account(&preferred, fallback.as_deref(), &currency, commodity)
                .await?;
            transaction.add_split(account.clone(), balance.total);
            balancing_name = Some(self.tree.full_name(&account));
        }

        self.writer.insert_transaction(&transaction).await?;
        self.summary.transactions_created += 1;
        info!(
            group = %balance.group,
            commodity = %balance.commodity,
            total = %balance.total,
            "opening balance written"
        );
        Ok(balancing_name)
    }

    /// Find or create the balancing account. An existing account in another
    /// commodity is only acceptable if a fallback path resolves.
    async fn balancing_account(
        &mut self,
        path: &[String],
        fallback: Option<&[String]>,
        currency: &Guid,
        commodity: &Commodity,
    ) -> Result<Guid, AppError> {
        for candidate in std::iter::once(path).chain(fallback) {
            match self.tree.resolve_path(&self.root, candidate) {
                PathLookup::Found(guid) => {
                    let held_in = self.tree.get(&guid).and_then(|a| a.commodity_guid.as_ref());
                    if held_in == Some(currency) {
                        return Ok(guid);
                    }
                    debug!(account = %candidate.join(":"), "balancing account in another commodity");
                }
                PathLookup::Missing { parent, remaining } => {
                    return self
                        .create_path(parent, &remaining, currency, commodity.fraction)
                        .await;
                }
            }
        }
        Err(AppError::AccountCurrencyMismatch {
            account: path.join(":"),
            currency: commodity.mnemonic.clone(),
        })
    }

    async fn create_path(
        &mut self,
        mut parent: Guid,
        names: &[String],
        currency: &Guid,
        fraction: i64,
    ) -> Result<Guid, AppError> {
        for name in names {
            let account = Account::new(
                name.clone(),
                AccountType::Equity,
                Some(currency.clone()),
                fraction,
            )
            .with_parent(parent);
            self.writer.insert_account(&account).await?;
            parent = account.guid.clone();
            debug!(account = %name, "balancing account created");
            self.tree.insert(account);
            self.summary.accounts_created += 1;
        }
        Ok(parent)
    }

    /// Copies of the source entities that the target does not have yet.
    async fn prepare<T: BusinessEntity>(
        &mut self,
        entities: &[T],
        existing: &HashSet<String>,
        source: &SourceBook,
    ) -> Result<Vec<T>, AppError> {
        let mut copies = Vec::new();
        for entity in entities {
            if existing.contains(entity.entity_id()) {
                info!(kind = T::KIND, id = entity.entity_id(), "already present; skipped");
                self.summary.skipped += 1;
                continue;
            }
            if let Some(commodity) = source.commodities.get(entity.currency_guid()) {
                self.ensure_commodity(commodity).await?;
            }
            match entity.clone_for(&self.map) {
                Some(copy) => copies.push(copy),
                None => warn!(
                    kind = T::KIND,
                    id = entity.entity_id(),
                    name = entity.display_name(),
                    "unknown currency; skipped"
                ),
            }
        }
        Ok(copies)
    }
}
