//! Network half of wikitool: the MediaWiki action-API client with its
//! process-wide rate limiter, and the reconciliation engine that keeps the
//! wiki, the database and the working tree agreeing with each other.

pub mod api;
pub mod engine;

pub use api::{
    Client, DeleteOutcome, EditOutcome, EditRequest, ListQuery, MediaWiki, OfflineClient,
    QueryPageItems, RateLimiter, RemotePageInfo, RemoteRevision,
};
pub use engine::{
    CancelFlag, ChangesOptions, InitOptions, PullOptions, PushOptions, SyncEngine,
};

pub use wikitool_core::{Error, Result};
