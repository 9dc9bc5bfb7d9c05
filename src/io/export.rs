use anyhow::Result;
use std::io::Write;

use crate::application::{AccountBalance, RolloverReport};

/// Export account balances to CSV format
pub fn export_balances_csv<W: Write>(balances: &[AccountBalance], writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(["account", "type", "commodity", "balance"])?;

    for entry in balances {
        csv_writer.write_record([
            entry.account.clone(),
            entry.account_type.to_string(),
            entry.commodity.clone(),
            entry.balance.to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(balances.len())
}

/// Export the opening balance lines of a rollover to CSV format, one row
/// per split including the balancing split.
pub fn export_opening_csv<W: Write>(report: &RolloverReport, writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(["group", "commodity", "account", "amount"])?;

    let mut count = 0;
    for balance in &report.balances {
        for line in &balance.lines {
            csv_writer.write_record([
                balance.group.to_string(),
                balance.mnemonic.clone(),
                line.account.clone(),
                line.amount.to_string(),
            ])?;
            count += 1;
        }
        if let Some(account) = &balance.balancing_account {
            csv_writer.write_record([
                balance.group.to_string(),
                balance.mnemonic.clone(),
                account.clone(),
                balance.total.to_string(),
            ])?;
            count += 1;
        }
    }

    csv_writer.flush()?;
    Ok(count)
}
