use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_guid, Guid, Numeric};

/// GnuCash posts dates at 10:59 UTC so they show the same day in every timezone.
pub fn neutral_time(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(10, 59, 0).unwrap_or(NaiveTime::MIN))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub guid: Guid,
    pub account_guid: Guid,
    pub memo: String,
    pub action: String,
    /// `n`ew, `c`leared, `y` reconciled, `f`rozen, `v`oid
    pub reconcile_state: char,
    /// Amount in the transaction currency
    pub value: Numeric,
    /// Amount in the account commodity
    pub quantity: Numeric,
}

impl Split {
    pub fn new(account_guid: impl Into<Guid>, value: Numeric, quantity: Numeric) -> Self {
        Self {
            guid: new_guid(),
            account_guid: account_guid.into(),
            memo: String::new(),
            action: String::new(),
            reconcile_state: 'n',
            value,
            quantity,
        }
    }
}

/// A balanced set of splits. Transactions are written once; the tool never
/// edits existing ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub guid: Guid,
    pub currency_guid: Guid,
    pub num: String,
    pub post_date: NaiveDateTime,
    pub enter_date: NaiveDateTime,
    pub description: String,
    pub splits: Vec<Split>,
}

impl Transaction {
    pub fn new(currency_guid: impl Into<Guid>, post_date: NaiveDate) -> Self {
        Self {
            guid: new_guid(),
            currency_guid: currency_guid.into(),
            num: String::new(),
            post_date: neutral_time(post_date),
            enter_date: Utc::now().naive_utc(),
            description: String::new(),
            splits: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a split whose account commodity is the transaction currency.
    pub fn add_split(&mut self, account_guid: impl Into<Guid>, amount: Numeric) -> &Split {
        self.splits.push(Split::new(account_guid, amount, amount));
        let last = self.splits.len() - 1;
        &self.splits[last]
    }

    /// Sum of split values; zero for a balanced transaction.
    pub fn imbalance(&self) -> Option<Numeric> {
        Numeric::sum(self.splits.iter().map(|s| s.value))
    }

    pub fn is_balanced(&self) -> bool {
        self.imbalance().is_some_and(|n| n.is_zero())
    }
}

/// Human readable rendering of a transaction, one split per line:
///
/// ```text
///     120.00  |  Assets:Checking
/// ---------------------------------------------
/// Imbalance: 120.00
/// ```
pub fn printify_transaction<F>(transaction: &Transaction, name_of: F) -> String
where
    F: Fn(&str) -> String,
{
    let lines: Vec<String> = transaction
        .splits
        .iter()
        .map(|split| {
            format!(
                "{: >10.2}  |  {}",
                split.value.to_f64(),
                name_of(&split.account_guid)
            )
        })
        .collect();
    let imbalance = transaction.imbalance().map_or(f64::NAN, |n| n.to_f64());

    format!(
        "{}\n{}\nImbalance: {:.2}",
        lines.join("\n"),
        "-".repeat(10 + 5 + 30),
        imbalance
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_printify_empty_transaction() {
        let tx = Transaction::new("eur", date("2025-01-01"));
        let rendered = printify_transaction(&tx, |g| g.to_string());
        let trimmed = rendered.trim();
        assert_eq!(trimmed.len(), 61);
        assert_eq!(trimmed.lines().last(), Some("Imbalance: 0.00"));
    }

    #[test]
    fn test_printify_with_splits() {
        let mut tx = Transaction::new("eur", date("2025-01-01"));
        tx.add_split("checking", Numeric::new(1234, 100).unwrap());
        tx.add_split("card", Numeric::new(-34, 100).unwrap());

        let rendered = printify_transaction(&tx, |g| format!("Assets:{}", g));
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "     12.34  |  Assets:checking");
        assert_eq!(lines[1], "     -0.34  |  Assets:card");
        assert_eq!(lines[2], "-".repeat(45));
        assert_eq!(lines[3], "Imbalance: 12.00");
    }

    #[test]
    fn test_balanced() {
        let mut tx = Transaction::new("eur", date("2025-01-01"));
        assert!(tx.is_balanced());
        tx.add_split("a", Numeric::new(500, 100).unwrap());
        assert!(!tx.is_balanced());
        tx.add_split("b", Numeric::new(-5, 1).unwrap());
        assert!(tx.is_balanced());
    }

    #[test]
    fn test_post_date_is_neutral_time() {
        let tx = Transaction::new("eur", date("2025-01-01"));
        assert_eq!(tx.post_date.to_string(), "2025-01-01 10:59:00");
    }

    #[test]
    fn test_split_value_equals_quantity() {
        let mut tx = Transaction::new("eur", date("2025-01-01"));
        let split = tx.add_split("a", Numeric::new(42, 100).unwrap()).clone();
        assert_eq!(split.value, split.quantity);
        assert_eq!(split.reconcile_state, 'n');
    }
}
