use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct RemotePageInfo {
    pub title: String,
    pub namespace: i64,
    pub lastrevid: i64,
    /// `touched` timestamp as reported by the server, ISO 8601 UTC.
    pub touched: String,
}

#[derive(Clone, Debug)]
pub struct RemoteRevision {
    /// Raw wikitext/Lua/CSS/JS. Never HTML.
    pub content: String,
    pub revision_id: i64,
    pub timestamp: String,
    pub content_model: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub namespaces: Vec<i64>,
    pub category: Option<String>,
    /// Start listing from this title (inclusive).
    pub apfrom: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct EditRequest {
    pub title: String,
    pub content: String,
    pub summary: String,
    /// Revision the edit is based on; the server rejects the edit with an
    /// edit conflict when it is stale.
    pub base_revid: Option<i64>,
    pub bot: bool,
}

#[derive(Clone, Debug)]
pub struct EditOutcome {
    pub new_revid: i64,
    pub timestamp: String,
    /// The server reported the edit as a no-op.
    pub no_change: bool,
}

#[derive(Clone, Debug)]
pub struct DeleteOutcome {
    pub logid: i64,
}

#[derive(Clone, Debug, Default)]
pub struct QueryPageItems {
    pub items: Vec<String>,
    pub truncated: bool,
}
