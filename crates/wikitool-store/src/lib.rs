//! SQLite storage layer: the `pages` table and its derived index tables,
//! full-text search, the sync log, versioned migrations, and the read-only
//! query surface.

mod db;
pub mod fts;
pub mod indexer;
pub mod migrate;
pub mod pages;
pub mod queries;
pub mod schema;
pub mod stats;
pub mod synclog;

pub use db::Database;
pub use pages::{PageFilter, PageUpsert};

pub use wikitool_core::{Error, Result};
