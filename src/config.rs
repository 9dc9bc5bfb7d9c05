//! Optional TOML file with defaults for the command line.
//!
//! ```toml
//! infile = "books/2024.gnucash"
//! outfile = "books/2025.gnucash"
//! target_asset = "Equity:Opening Balances"
//! currency = "EUR"
//! closing_date = "2024-12-31"
//! ```

use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::application::AppError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub infile: Option<String>,
    pub outfile: Option<String>,
    pub target_asset: Option<String>,
    pub target_liability: Option<String>,
    pub currency: Option<String>,
    pub opening_date: Option<NaiveDate>,
    pub closing_date: Option<NaiveDate>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&contents).map_err(|e| match e {
            AppError::Config(msg) => AppError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, AppError> {
        toml::from_str(contents).map_err(|e| AppError::Config(e.message().to_string()))
    }

    /// `Some(path)` loads the file, `None` gives empty defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}
