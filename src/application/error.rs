use thiserror::Error;

use crate::domain::NumericError;
use crate::storage::SessionError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Must give a valid {0}.")]
    MissingArgument(&'static str),

    #[error("Invalid account path: {0}")]
    InvalidAccountPath(String),

    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),

    #[error("account currency and name mismatch: {account} is not held in {currency}")]
    AccountCurrencyMismatch { account: String, currency: String },

    #[error("Target book is the source book: {0}")]
    TargetIsSource(String),

    #[error("Amount error: {0}")]
    Numeric(#[from] NumericError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
