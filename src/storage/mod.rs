mod repository;
mod session;

pub use repository::*;
pub use session::*;

/// GnuCash SQLite layout written into new books
pub const MIGRATION_001_GNUCASH_SCHEMA: &str = include_str!("migrations/001_gnucash_schema.sql");
