//! MediaWiki action-API access: the [`MediaWiki`] trait the engine is
//! generic over, the HTTP [`Client`] implementation, and the process-wide
//! [`RateLimiter`].

mod client;
mod rate_limit;
mod types;

pub use client::Client;
pub use rate_limit::RateLimiter;
pub use types::{
    DeleteOutcome, EditOutcome, EditRequest, ListQuery, QueryPageItems, RemotePageInfo,
    RemoteRevision,
};

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The engine's view of a wiki. Implemented by [`Client`] over HTTP and by
/// in-memory fakes in tests.
#[allow(async_fn_in_trait)]
pub trait MediaWiki {
    fn is_authenticated(&self) -> bool;

    /// Enumerates pages in the queried namespaces (optionally restricted to
    /// a category), with their latest revision id and touch timestamp.
    async fn list_pages(&self, query: &ListQuery) -> Result<Vec<RemotePageInfo>>;

    /// Latest revision of one page, or `None` when the title is missing.
    async fn get_page_content(&self, title: &str) -> Result<Option<RemoteRevision>>;

    /// Revision/touched metadata for one page without its content.
    async fn get_page_info(&self, title: &str) -> Result<Option<RemotePageInfo>>;

    /// Latest revisions for many titles; missing titles are absent from the
    /// result. Batches to the server limit internally.
    async fn fetch_batch(&self, titles: &[String]) -> Result<BTreeMap<String, RemoteRevision>>;

    async fn edit(&self, request: &EditRequest) -> Result<EditOutcome>;

    async fn delete(&self, title: &str, reason: &str) -> Result<DeleteOutcome>;

    /// Rendered HTML of a page, or `None` when the title is missing. The
    /// result is HTML by construction; wikitext comes from
    /// [`MediaWiki::get_page_content`] only.
    async fn get_parsed_html(&self, title: &str) -> Result<Option<String>>;

    /// Items of a `Special:` query page, with a truncation flag.
    async fn get_query_page_items(&self, query_page: &str, limit: u64)
        -> Result<QueryPageItems>;
}

#[allow(async_fn_in_trait)]
impl<T: MediaWiki + ?Sized> MediaWiki for Arc<T> {
    fn is_authenticated(&self) -> bool {
        self.as_ref().is_authenticated()
    }
    async fn list_pages(&self, query: &ListQuery) -> Result<Vec<RemotePageInfo>> {
        self.as_ref().list_pages(query).await
    }
    async fn get_page_content(&self, title: &str) -> Result<Option<RemoteRevision>> {
        self.as_ref().get_page_content(title).await
    }
    async fn get_page_info(&self, title: &str) -> Result<Option<RemotePageInfo>> {
        self.as_ref().get_page_info(title).await
    }
    async fn fetch_batch(&self, titles: &[String]) -> Result<BTreeMap<String, RemoteRevision>> {
        self.as_ref().fetch_batch(titles).await
    }
    async fn edit(&self, request: &EditRequest) -> Result<EditOutcome> {
        self.as_ref().edit(request).await
    }
    async fn delete(&self, title: &str, reason: &str) -> Result<DeleteOutcome> {
        self.as_ref().delete(title, reason).await
    }
    async fn get_parsed_html(&self, title: &str) -> Result<Option<String>> {
        self.as_ref().get_parsed_html(title).await
    }
    async fn get_query_page_items(&self, query_page: &str, limit: u64) -> Result<QueryPageItems> {
        self.as_ref().get_query_page_items(query_page, limit).await
    }
}

/// Client for offline operations (status, init, queries): every network
/// call fails with a configuration error.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineClient;

impl OfflineClient {
    fn refuse<T>() -> Result<T> {
        Err(Error::ConfigMissing(
            "this operation is offline; no wiki endpoint is configured".to_string(),
        ))
    }
}

impl MediaWiki for OfflineClient {
    fn is_authenticated(&self) -> bool {
        false
    }
    async fn list_pages(&self, _query: &ListQuery) -> Result<Vec<RemotePageInfo>> {
        Self::refuse()
    }
    async fn get_page_content(&self, _title: &str) -> Result<Option<RemoteRevision>> {
        Self::refuse()
    }
    async fn get_page_info(&self, _title: &str) -> Result<Option<RemotePageInfo>> {
        Self::refuse()
    }
    async fn fetch_batch(&self, _titles: &[String]) -> Result<BTreeMap<String, RemoteRevision>> {
        Self::refuse()
    }
    async fn edit(&self, _request: &EditRequest) -> Result<EditOutcome> {
        Self::refuse()
    }
    async fn delete(&self, _title: &str, _reason: &str) -> Result<DeleteOutcome> {
        Self::refuse()
    }
    async fn get_parsed_html(&self, _title: &str) -> Result<Option<String>> {
        Self::refuse()
    }
    async fn get_query_page_items(&self, _query_page: &str, _limit: u64) -> Result<QueryPageItems> {
        Self::refuse()
    }
}
