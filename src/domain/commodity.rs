use serde::{Deserialize, Serialize};

use super::{new_guid, Guid};

pub const CURRENCY_NAMESPACE: &str = "CURRENCY";
/// Namespace used for currencies by old GnuCash versions.
const LEGACY_CURRENCY_NAMESPACE: &str = "ISO4217";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commodity {
    pub guid: Guid,
    pub namespace: String,
    pub mnemonic: String,
    pub fullname: Option<String>,
    pub cusip: Option<String>,
    /// Smallest fraction, e.g. 100 for EUR
    pub fraction: i64,
    pub quote_flag: bool,
    pub quote_source: Option<String>,
    pub quote_tz: Option<String>,
}

impl Commodity {
    pub fn currency(mnemonic: impl Into<String>, fraction: i64) -> Self {
        Self {
            guid: new_guid(),
            namespace: CURRENCY_NAMESPACE.to_string(),
            mnemonic: mnemonic.into(),
            fullname: None,
            cusip: None,
            fraction,
            quote_flag: false,
            quote_source: None,
            quote_tz: None,
        }
    }

    pub fn key(&self) -> CommodityKey {
        CommodityKey::new(&self.namespace, &self.mnemonic)
    }

    pub fn is_currency(&self) -> bool {
        self.key().is_currency()
    }

    /// Same commodity under a fresh guid, for insertion into another book.
    pub fn clone_for_book(&self) -> Self {
        Self {
            guid: new_guid(),
            ..self.clone()
        }
    }
}

/// Identity of a commodity across books: namespace plus mnemonic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommodityKey {
    pub namespace: String,
    pub mnemonic: String,
}

impl CommodityKey {
    pub fn new(namespace: impl Into<String>, mnemonic: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let namespace = if namespace == LEGACY_CURRENCY_NAMESPACE {
            CURRENCY_NAMESPACE.to_string()
        } else {
            namespace
        };
        Self {
            namespace,
            mnemonic: mnemonic.into(),
        }
    }

    pub fn currency(mnemonic: impl Into<String>) -> Self {
        Self::new(CURRENCY_NAMESPACE, mnemonic)
    }

    /// `EUR` is a currency, `NASDAQ:AAPL` names the namespace explicitly.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        match s.split_once(':') {
            Some((ns, mnemonic)) if !ns.is_empty() && !mnemonic.is_empty() => {
                Some(Self::new(ns.trim(), mnemonic.trim()))
            }
            Some(_) => None,
            None if s.is_empty() => None,
            None => Some(Self::currency(s.to_uppercase())),
        }
    }

    pub fn is_currency(&self) -> bool {
        self.namespace == CURRENCY_NAMESPACE
    }
}

impl std::fmt::Display for CommodityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.mnemonic)
    }
}
