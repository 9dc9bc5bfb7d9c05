// Application layer: year-end use cases on top of sessions and the repository

pub mod error;
pub mod report;
pub mod service;

pub use error::*;
pub use report::*;
pub use service::*;
