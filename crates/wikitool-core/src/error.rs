use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type shared by all wikitool crates.
///
/// Operations over many pages treat page-scoped variants as per-page
/// failures collected into the operation report; everything else aborts the
/// operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("missing configuration: {0}")]
    ConfigMissing(String),

    #[error("authentication required: {0}")]
    AuthRequired(String),

    #[error("edit conflict on \"{title}\"")]
    EditConflict { title: String },

    #[error("permission denied for \"{title}\" ({code})")]
    PermissionDenied { title: String, code: String },

    #[error("rate limited by server")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("page not found: \"{0}\"")]
    MissingPage(String),

    #[error("schema mismatch, missing tables {missing:?}; run `wikitool migrate`")]
    SchemaMismatch { missing: Vec<String> },

    #[error("migration {version} failed: {message}")]
    MigrationFailed { version: String, message: String },

    #[error("parse error in \"{title}\": {message}")]
    Parse { title: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error {code}: {info}")]
    Api { code: String, info: String },
}

impl Error {
    pub fn parse(title: impl Into<String>, message: impl Into<String>) -> Error {
        Error::Parse {
            title: title.into(),
            message: message.into(),
        }
    }

    /// Whether this error is scoped to a single page and should be recorded
    /// in the operation result instead of aborting the whole batch.
    pub fn is_page_scoped(&self) -> bool {
        matches!(
            self,
            Error::EditConflict { .. }
                | Error::PermissionDenied { .. }
                | Error::MissingPage(_)
                | Error::Parse { .. }
                | Error::Filesystem(_)
        )
    }
}
