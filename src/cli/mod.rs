use std::path::PathBuf;

use anyhow::Result;
use chrono::{Datelike, Local, NaiveDate};
use clap::{Args, Parser, Subcommand};

use crate::application::{
    AccountBalance, AppError, RolloverOptions, RolloverReport, YearEndService,
};
use crate::config::Config;
use crate::domain::{parse_account_path, BalanceGroup, CommodityKey, OpeningTargets};
use crate::io::{export_balances_csv, export_opening_csv};
use crate::logging::init_tracing;

/// happy-new-year - GnuCash year-end rollover
#[derive(Parser)]
#[command(name = "happy-new-year")]
#[command(about = "Start the GnuCash book of a new year with the old account tree and opening balances")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML) with defaults for the options below
    #[arg(short, long, global = true)]
    pub conf: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the new book: accounts, opening balances, business parties
    Rollover(RolloverArgs),

    /// Show account balances of a book
    Balances {
        /// GnuCash SQLite book to read
        #[arg(short, long)]
        infile: Option<String>,

        /// Only count transactions posted on or before this day (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<String>,

        /// Include accounts with a zero balance
        #[arg(long)]
        all: bool,

        /// Output format: table, csv, json
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct RolloverArgs {
    /// Book of the old year (read only)
    #[arg(short, long)]
    pub infile: Option<String>,

    /// Book of the new year, created if missing
    #[arg(short, long)]
    pub outfile: Option<String>,

    /// Balancing account for asset opening balances, e.g. "Equity:Opening Balances"
    #[arg(long)]
    pub target_asset: Option<String>,

    /// Balancing account for liability opening balances
    #[arg(long)]
    pub target_liability: Option<String>,

    /// Main currency, e.g. EUR
    #[arg(long)]
    pub currency: Option<String>,

    /// Post date of the opening transactions (YYYY-MM-DD)
    #[arg(long)]
    pub opening_date: Option<String>,

    /// Last day of the old year (YYYY-MM-DD); later transactions are ignored
    #[arg(long)]
    pub closing_date: Option<String>,

    /// Take over the new book even if another session holds its lock
    #[arg(long)]
    pub break_lock: bool,

    /// Compute and print the opening balances without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Output format: text, json, csv
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

impl RolloverArgs {
    /// Merge with the configuration file; command line values win.
    /// Returns the source location and the rollover options.
    pub fn resolve(
        self,
        config: &Config,
        today: NaiveDate,
    ) -> Result<(String, RolloverOptions), AppError> {
        let infile = self
            .infile
            .or_else(|| config.infile.clone())
            .filter(|s| !s.trim().is_empty())
            .ok_or(AppError::MissingArgument("infile"))?;
        let outfile = self
            .outfile
            .or_else(|| config.outfile.clone())
            .filter(|s| !s.trim().is_empty())
            .ok_or(AppError::MissingArgument("outfile"))?;

        let targets = OpeningTargets {
            asset: parse_target(self.target_asset.or_else(|| config.target_asset.clone()))?,
            liability: parse_target(
                self.target_liability
                    .or_else(|| config.target_liability.clone()),
            )?,
        };

        let currency = match self.currency.or_else(|| config.currency.clone()) {
            Some(s) => Some(CommodityKey::parse(&s).ok_or(AppError::InvalidCurrency(s))?),
            None => None,
        };

        let closing_date = match self.closing_date {
            Some(s) => Some(parse_date(&s)?),
            None => config.closing_date,
        };
        let opening_date = match self.opening_date {
            Some(s) => Some(parse_date(&s)?),
            None => config.opening_date,
        };
        let opening_date = opening_date
            .or_else(|| closing_date.and_then(|d| d.succ_opt()))
            .or_else(|| NaiveDate::from_ymd_opt(today.year(), 1, 1))
            .unwrap_or(today);

        Ok((
            infile,
            RolloverOptions {
                target: outfile,
                targets,
                currency,
                opening_date,
                closing_date,
                break_lock: self.break_lock,
                dry_run: self.dry_run,
            },
        ))
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        init_tracing(self.verbose);
        let config = Config::load(self.conf.as_deref())?;

        match self.command {
            Commands::Rollover(args) => {
                let format = args.format.clone();
                let (infile, options) = args.resolve(&config, Local::now().date_naive())?;
                run_rollover_command(&infile, &options, &format).await?;
            }

            Commands::Balances {
                infile,
                as_of,
                all,
                format,
            } => {
                let infile = infile
                    .or(config.infile)
                    .ok_or(AppError::MissingArgument("infile"))?;
                let as_of = match as_of {
                    Some(s) => Some(parse_date(&s)?),
                    None => config.closing_date,
                };
                run_balances_command(&infile, as_of, all, &format).await?;
            }
        }

        Ok(())
    }
}

async fn run_rollover_command(infile: &str, options: &RolloverOptions, format: &str) -> Result<()> {
    let service = YearEndService::open(infile).await?;
    let result = service.rollover(options).await;
    service.close().await?;
    let report = result?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "csv" => {
            export_opening_csv(&report, std::io::stdout())?;
        }
        _ => print_rollover(&report),
    }
    Ok(())
}

fn print_rollover(report: &RolloverReport) {
    for group in [BalanceGroup::Asset, BalanceGroup::Liability, BalanceGroup::Other] {
        println!("\n===============\n{}\n===============", group);
        for entry in report.group(group) {
            println!("== {} ==", entry.mnemonic);
            println!("{}", entry.total);
            println!("{}", entry.rendered);
            if let Some(account) = &entry.balancing_account {
                println!("Balanced against: {}", account);
            }
        }
    }

    println!();
    if let Some(currency) = &report.main_currency {
        println!("Main currency: {}", currency);
    }
    println!("Opening date: {}", report.opening_date);
    if report.dry_run {
        println!("Dry run: {} was not written.", report.target);
        return;
    }

    let copied = &report.copied;
    println!("Book written: {}", report.target);
    println!(
        "  {} accounts created, {} reused, {} commodities, {} transactions",
        copied.accounts_created,
        copied.accounts_reused,
        copied.commodities_created,
        copied.transactions_created
    );
    println!(
        "  {} bill terms, {} vendors, {} customers, {} employees ({} skipped)",
        copied.bill_terms, copied.vendors, copied.customers, copied.employees, copied.skipped
    );
    if !report.warnings.is_empty() {
        println!("{} warning(s), see log output.", report.warnings.len());
    }
}

async fn run_balances_command(
    infile: &str,
    as_of: Option<NaiveDate>,
    include_zero: bool,
    format: &str,
) -> Result<()> {
    let service = YearEndService::open(infile).await?;
    let result = service.balances(as_of, include_zero).await;
    service.close().await?;
    let balances = result?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&balances)?);
        }
        "csv" => {
            export_balances_csv(&balances, std::io::stdout())?;
        }
        _ => print_balances(&balances),
    }
    Ok(())
}

fn print_balances(balances: &[AccountBalance]) {
    if balances.is_empty() {
        println!("No balances found.");
        return;
    }
    println!(
        "{:<40} {:<10} {:>14} {:<8}",
        "ACCOUNT", "TYPE", "BALANCE", "COMMODITY"
    );
    println!("{}", "-".repeat(75));
    for entry in balances {
        println!(
            "{:<40} {:<10} {:>14} {:<8}",
            truncate(&entry.account, 40),
            entry.account_type,
            entry.balance.to_string(),
            entry.commodity
        );
    }
}

fn parse_target(path: Option<String>) -> Result<Option<Vec<String>>, AppError> {
    match path {
        Some(p) => parse_account_path(&p)
            .map(Some)
            .ok_or(AppError::InvalidAccountPath(p)),
        None => Ok(None),
    }
}

fn parse_date(date_str: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::InvalidDate(date_str.to_string()))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn args(infile: &str, outfile: &str) -> RolloverArgs {
        RolloverArgs {
            infile: Some(infile.into()),
            outfile: Some(outfile.into()),
            format: "text".into(),
            ..RolloverArgs::default()
        }
    }

    #[test]
    fn test_missing_files() {
        let err = RolloverArgs::default()
            .resolve(&Config::default(), date("2025-03-01"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Must give a valid infile.");

        let only_in = RolloverArgs {
            infile: Some("2024.gnucash".into()),
            ..RolloverArgs::default()
        };
        let err = only_in
            .resolve(&Config::default(), date("2025-03-01"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Must give a valid outfile.");
    }

    #[test]
    fn test_opening_date_defaults() {
        let (_, options) = args("a", "b")
            .resolve(&Config::default(), date("2025-03-01"))
            .unwrap();
        assert_eq!(options.opening_date, date("2025-01-01"));
        assert_eq!(options.closing_date, None);

        let mut with_closing = args("a", "b");
        with_closing.closing_date = Some("2024-12-31".into());
        let (_, options) = with_closing
            .resolve(&Config::default(), date("2025-03-01"))
            .unwrap();
        assert_eq!(options.opening_date, date("2025-01-01"));
        assert_eq!(options.closing_date, Some(date("2024-12-31")));

        let mut explicit = args("a", "b");
        explicit.closing_date = Some("2024-06-30".into());
        explicit.opening_date = Some("2024-07-02".into());
        let (_, options) = explicit
            .resolve(&Config::default(), date("2025-03-01"))
            .unwrap();
        assert_eq!(options.opening_date, date("2024-07-02"));
    }

    #[test]
    fn test_command_line_overrides_config() {
        let config = Config {
            infile: Some("config-in.gnucash".into()),
            outfile: Some("config-out.gnucash".into()),
            target_asset: Some("Equity:Opening Balances:Assets".into()),
            currency: Some("usd".into()),
            closing_date: Some(date("2024-12-31")),
            ..Config::default()
        };

        let mut cli = RolloverArgs {
            outfile: Some("cli-out.gnucash".into()),
            ..RolloverArgs::default()
        };
        cli.currency = Some("EUR".into());
        let (infile, options) = cli.resolve(&config, date("2025-03-01")).unwrap();

        assert_eq!(infile, "config-in.gnucash");
        assert_eq!(options.target, "cli-out.gnucash");
        assert_eq!(options.currency, Some(CommodityKey::currency("EUR")));
        assert_eq!(
            options.targets.asset,
            Some(vec![
                "Equity".to_string(),
                "Opening Balances".to_string(),
                "Assets".to_string()
            ])
        );
        assert_eq!(options.targets.liability, None);
        assert_eq!(options.opening_date, date("2025-01-01"));
    }

    #[test]
    fn test_invalid_values() {
        let mut bad_date = args("a", "b");
        bad_date.closing_date = Some("31.12.2024".into());
        assert!(matches!(
            bad_date.resolve(&Config::default(), date("2025-03-01")),
            Err(AppError::InvalidDate(_))
        ));

        let mut bad_path = args("a", "b");
        bad_path.target_asset = Some("Equity::Opening".into());
        assert!(matches!(
            bad_path.resolve(&Config::default(), date("2025-03-01")),
            Err(AppError::InvalidAccountPath(_))
        ));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Assets", 10), "Assets");
        assert_eq!(truncate("Assets:Current Assets:Checking", 12), "Assets:Cu...");
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "happy-new-year",
            "-v",
            "rollover",
            "-i",
            "2024.gnucash",
            "-o",
            "2025.gnucash",
            "--target-asset",
            "Equity:Opening Balances",
            "--dry-run",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Rollover(args) => {
                assert_eq!(args.infile.as_deref(), Some("2024.gnucash"));
                assert!(args.dry_run);
                assert_eq!(args.format, "text");
            }
            Commands::Balances { .. } => panic!("expected rollover"),
        }
    }
}
