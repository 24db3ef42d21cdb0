//! Record types shared between the store, the sync engine, and the CLI.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Current UTC time as `2024-01-01T00:00:00Z`.
///
/// All persisted timestamps use this shape so that chronological order and
/// lexicographic order agree.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Article,
    Template,
    Module,
    Mediawiki,
    Category,
    Redirect,
    File,
}

impl PageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Template => "template",
            Self::Module => "module",
            Self::Mediawiki => "mediawiki",
            Self::Category => "category",
            Self::Redirect => "redirect",
            Self::File => "file",
        }
    }

    pub fn from_str(value: &str) -> Option<PageType> {
        Some(match value {
            "article" => Self::Article,
            "template" => Self::Template,
            "module" => Self::Module,
            "mediawiki" => Self::Mediawiki,
            "category" => Self::Category,
            "redirect" => Self::Redirect,
            "file" => Self::File,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    LocalModified,
    WikiModified,
    Conflict,
    Staged,
    New,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::LocalModified => "local_modified",
            Self::WikiModified => "wiki_modified",
            Self::Conflict => "conflict",
            Self::Staged => "staged",
            Self::New => "new",
        }
    }

    pub fn from_str(value: &str) -> Option<SyncStatus> {
        Some(match value {
            "synced" => Self::Synced,
            "local_modified" => Self::LocalModified,
            "wiki_modified" => Self::WikiModified,
            "conflict" => Self::Conflict,
            "staged" => Self::Staged,
            "new" => Self::New,
            _ => return None,
        })
    }
}

/// One row of the `pages` table.
#[derive(Clone, Debug, Serialize)]
pub struct PageRecord {
    pub id: i64,
    pub title: String,
    pub namespace: i64,
    pub page_type: PageType,
    pub filename: String,
    pub filepath: String,
    pub template_category: Option<String>,
    pub content: String,
    pub content_hash: String,
    pub file_mtime: Option<i64>,
    pub wiki_modified_at: Option<String>,
    pub last_synced_at: Option<String>,
    pub sync_status: SyncStatus,
    pub is_redirect: bool,
    pub redirect_target: Option<String>,
    pub content_model: Option<String>,
    pub page_id: Option<i64>,
    pub revision_id: Option<i64>,
    pub shortdesc: Option<String>,
    pub display_title: Option<String>,
    pub word_count: i64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    NewLocal,
    ModifiedLocal,
    DeletedLocal,
    Conflict,
    Synced,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewLocal => "new_local",
            Self::ModifiedLocal => "modified_local",
            Self::DeletedLocal => "deleted_local",
            Self::Conflict => "conflict",
            Self::Synced => "synced",
        }
    }
}

/// One entry of the change classification produced by `get_changes`.
#[derive(Clone, Debug, Serialize)]
pub struct Change {
    pub title: String,
    pub kind: ChangeKind,
    pub namespace: i64,
    pub filepath: Option<String>,
    pub local_hash: Option<String>,
    pub db_hash: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncOperation {
    Pull,
    Push,
    Delete,
    Resolve,
    Init,
}

impl SyncOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pull => "pull",
            Self::Push => "push",
            Self::Delete => "delete",
            Self::Resolve => "resolve",
            Self::Init => "init",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncOutcome {
    Success,
    Failed,
    Conflict,
    Skipped,
}

impl SyncOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Conflict => "conflict",
            Self::Skipped => "skipped",
        }
    }
}

/// One row appended to the `sync_log` table.
#[derive(Clone, Debug)]
pub struct SyncLogEntry {
    pub operation: SyncOperation,
    pub page_title: Option<String>,
    pub status: SyncOutcome,
    pub revision_id: Option<i64>,
    pub error_message: Option<String>,
    /// Opaque JSON payload with operation counters.
    pub details: Option<String>,
}

/// Per-title failure collected into an operation report.
#[derive(Clone, Debug, Serialize)]
pub struct PageError {
    pub title: Option<String>,
    pub message: String,
}

impl PageError {
    pub fn new(title: impl Into<String>, message: impl std::fmt::Display) -> PageError {
        PageError {
            title: Some(title.into()),
            message: message.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PullReport {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: Vec<PageError>,
    pub cancelled: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushAction {
    Created,
    Pushed,
    Deleted,
    Unchanged,
    Error,
}

#[derive(Clone, Debug, Serialize)]
pub struct PushedPage {
    pub title: String,
    pub action: PushAction,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PushReport {
    pub success: bool,
    pub pushed: u64,
    pub unchanged: u64,
    pub conflicts: Vec<String>,
    pub errors: Vec<PageError>,
    pub pages: Vec<PushedPage>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct InitFromFilesReport {
    pub imported: u64,
    pub unchanged: u64,
    pub errors: Vec<PageError>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RebuildReport {
    pub pages: u64,
    pub links: u64,
    pub categories: u64,
    pub templates: u64,
    pub sections: u64,
    pub redirects: u64,
    pub module_deps: u64,
    pub cargo_rows: u64,
    pub errors: Vec<PageError>,
}

/// Progress callback events for long-running operations. The core makes no
/// assumption about how the callback renders them.
#[derive(Clone, Debug)]
pub struct ProgressEvent {
    pub done: u64,
    pub total: Option<u64>,
    pub title: String,
}

pub type ProgressFn = Box<dyn Fn(ProgressEvent) + Send + Sync>;
