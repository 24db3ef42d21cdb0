//! Typed access to the `pages` table.

use crate::{indexer, Database, Result};
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension, Row};
use wikitool_core::{
    hash::content_hash,
    types::{PageRecord, PageType, SyncStatus},
};

/// Partial update for one page, keyed by title. `None` fields are left
/// untouched; the row is created with defaults when absent.
#[derive(Clone, Debug, Default)]
pub struct PageUpsert {
    pub title: String,
    pub namespace: Option<i64>,
    pub page_type: Option<PageType>,
    pub filename: Option<String>,
    pub filepath: Option<String>,
    /// `Some(None)` clears the column.
    pub template_category: Option<Option<String>>,
    /// Setting content also recomputes `content_hash`.
    pub content: Option<String>,
    pub file_mtime: Option<i64>,
    pub wiki_modified_at: Option<String>,
    pub last_synced_at: Option<String>,
    pub sync_status: Option<SyncStatus>,
    pub is_redirect: Option<bool>,
    /// `Some(None)` clears the column.
    pub redirect_target: Option<Option<String>>,
    pub content_model: Option<String>,
    pub page_id: Option<i64>,
    pub revision_id: Option<i64>,
}

impl PageUpsert {
    pub fn new(title: impl Into<String>) -> PageUpsert {
        PageUpsert {
            title: title.into(),
            ..PageUpsert::default()
        }
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        let mut cols: Vec<(&'static str, Value)> = Vec::new();
        if let Some(v) = self.namespace {
            cols.push(("namespace", Value::Integer(v)));
        }
        if let Some(v) = self.page_type {
            cols.push(("page_type", Value::Text(v.as_str().to_string())));
        }
        if let Some(v) = &self.filename {
            cols.push(("filename", Value::Text(v.clone())));
        }
        if let Some(v) = &self.filepath {
            cols.push(("filepath", Value::Text(v.clone())));
        }
        if let Some(v) = &self.template_category {
            cols.push(("template_category", option_text(v.clone())));
        }
        if let Some(v) = &self.content {
            cols.push(("content", Value::Text(v.clone())));
            cols.push(("content_hash", Value::Text(content_hash(v))));
        }
        if let Some(v) = self.file_mtime {
            cols.push(("file_mtime", Value::Integer(v)));
        }
        if let Some(v) = &self.wiki_modified_at {
            cols.push(("wiki_modified_at", Value::Text(v.clone())));
        }
        if let Some(v) = &self.last_synced_at {
            cols.push(("last_synced_at", Value::Text(v.clone())));
        }
        if let Some(v) = self.sync_status {
            cols.push(("sync_status", Value::Text(v.as_str().to_string())));
        }
        if let Some(v) = self.is_redirect {
            cols.push(("is_redirect", Value::Integer(v as i64)));
        }
        if let Some(v) = &self.redirect_target {
            cols.push(("redirect_target", option_text(v.clone())));
        }
        if let Some(v) = &self.content_model {
            cols.push(("content_model", Value::Text(v.clone())));
        }
        if let Some(v) = self.page_id {
            cols.push(("page_id", Value::Integer(v)));
        }
        if let Some(v) = self.revision_id {
            cols.push(("revision_id", Value::Integer(v)));
        }
        cols
    }
}

fn option_text(value: Option<String>) -> Value {
    match value {
        Some(text) => Value::Text(text),
        None => Value::Null,
    }
}

/// Filter for [`get_pages`]. Output is always ordered by title.
#[derive(Clone, Debug, Default)]
pub struct PageFilter {
    pub namespaces: Option<Vec<i64>>,
    pub sync_status: Option<SyncStatus>,
    pub page_type: Option<PageType>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

const PAGE_COLUMNS: &str = "id, title, namespace, page_type, filename, filepath, \
     template_category, content, content_hash, file_mtime, wiki_modified_at, \
     last_synced_at, sync_status, is_redirect, redirect_target, content_model, \
     page_id, revision_id, shortdesc, display_title, word_count";

pub(crate) fn row_to_page(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    let page_type: String = row.get(3)?;
    let sync_status: String = row.get(12)?;
    Ok(PageRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        namespace: row.get(2)?,
        page_type: PageType::from_str(&page_type).unwrap_or(PageType::Article),
        filename: row.get(4)?,
        filepath: row.get(5)?,
        template_category: row.get(6)?,
        content: row.get(7)?,
        content_hash: row.get(8)?,
        file_mtime: row.get(9)?,
        wiki_modified_at: row.get(10)?,
        last_synced_at: row.get(11)?,
        sync_status: SyncStatus::from_str(&sync_status).unwrap_or(SyncStatus::New),
        is_redirect: row.get::<_, i64>(13)? != 0,
        redirect_target: row.get(14)?,
        content_model: row.get(15)?,
        page_id: row.get(16)?,
        revision_id: row.get(17)?,
        shortdesc: row.get(18)?,
        display_title: row.get(19)?,
        word_count: row.get(20)?,
    })
}

/// Creates or updates a page row; returns its id.
pub fn upsert_page(db: &Database, patch: &PageUpsert) -> Result<i64> {
    let conn = db.conn()?;
    upsert_page_conn(&conn, patch)
}

pub(crate) fn upsert_page_conn(conn: &Connection, patch: &PageUpsert) -> Result<i64> {
    let cols = patch.columns();
    let existing: Option<i64> = conn
        .prepare_cached("SELECT id FROM pages WHERE title = ?1")?
        .query_row([&patch.title], |row| row.get(0))
        .optional()?;

    match existing {
        Some(id) => {
            if !cols.is_empty() {
                let set_clause = cols
                    .iter()
                    .enumerate()
                    .map(|(i, (name, _))| format!("{name} = ?{}", i + 1))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "UPDATE pages SET {set_clause} WHERE id = ?{}",
                    cols.len() + 1
                );
                let mut values: Vec<Value> = cols.into_iter().map(|(_, v)| v).collect();
                values.push(Value::Integer(id));
                conn.execute(&sql, params_from_iter(values))?;
            }
            Ok(id)
        }
        None => {
            let mut names = vec!["title"];
            let mut values = vec![Value::Text(patch.title.clone())];
            let mut has_hash = false;
            for (name, value) in cols {
                has_hash = has_hash || name == "content_hash";
                names.push(name);
                values.push(value);
            }
            if !has_hash {
                names.push("content_hash");
                values.push(Value::Text(content_hash("")));
            }
            let placeholders = (1..=names.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO pages ({}) VALUES ({placeholders})",
                names.join(", ")
            );
            conn.execute(&sql, params_from_iter(values))?;
            Ok(conn.last_insert_rowid())
        }
    }
}

pub fn get_page(db: &Database, title: &str) -> Result<Option<PageRecord>> {
    let conn = db.conn()?;
    let sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE title = ?1");
    let page = conn
        .prepare_cached(&sql)?
        .query_row([title], row_to_page)
        .optional()?;
    Ok(page)
}

pub fn get_page_by_path(db: &Database, filepath: &str) -> Result<Option<PageRecord>> {
    let conn = db.conn()?;
    let sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE filepath = ?1");
    let page = conn
        .prepare_cached(&sql)?
        .query_row([filepath], row_to_page)
        .optional()?;
    Ok(page)
}

/// Case-insensitive filepath lookup, used to diagnose collisions coming
/// from case-insensitive filesystems.
pub fn get_page_by_filepath_insensitive(
    db: &Database,
    filepath: &str,
) -> Result<Option<PageRecord>> {
    let conn = db.conn()?;
    let sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE filepath = ?1 COLLATE NOCASE");
    let page = conn
        .prepare_cached(&sql)?
        .query_row([filepath], row_to_page)
        .optional()?;
    Ok(page)
}

pub fn get_pages(db: &Database, filter: &PageFilter) -> Result<Vec<PageRecord>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(namespaces) = &filter.namespaces {
        if !namespaces.is_empty() {
            let placeholders = namespaces
                .iter()
                .map(|ns| {
                    values.push(Value::Integer(*ns));
                    format!("?{}", values.len())
                })
                .collect::<Vec<_>>()
                .join(", ");
            clauses.push(format!("namespace IN ({placeholders})"));
        }
    }
    if let Some(status) = filter.sync_status {
        values.push(Value::Text(status.as_str().to_string()));
        clauses.push(format!("sync_status = ?{}", values.len()));
    }
    if let Some(page_type) = filter.page_type {
        values.push(Value::Text(page_type.as_str().to_string()));
        clauses.push(format!("page_type = ?{}", values.len()));
    }

    let mut sql = format!("SELECT {PAGE_COLUMNS} FROM pages");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY title");
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
        if let Some(offset) = filter.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    let conn = db.conn()?;
    let mut statement = conn.prepare_cached(&sql)?;
    let rows = statement.query_map(params_from_iter(values), row_to_page)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn update_sync_status(db: &Database, title: &str, status: SyncStatus) -> Result<()> {
    let conn = db.conn()?;
    conn.prepare_cached("UPDATE pages SET sync_status = ?1 WHERE title = ?2")?
        .execute([status.as_str(), title])?;
    Ok(())
}

/// Deletes a page and every derived row it owns, in one transaction.
/// Returns false when the title was unknown.
pub fn delete_page(db: &Database, title: &str) -> Result<bool> {
    let mut conn = db.conn()?;
    let txn = conn.transaction()?;

    let Some(id) = txn
        .prepare_cached("SELECT id FROM pages WHERE title = ?1")?
        .query_row([title], |row| row.get::<_, i64>(0))
        .optional()?
    else {
        return Ok(false);
    };

    indexer::clear_page_derived(&txn, id, title)?;
    txn.execute("DELETE FROM docs_fts WHERE title = ?1", [title])?;
    txn.execute("DELETE FROM pages WHERE id = ?1", [id])?;
    txn.commit()?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::run_migrations;
    use wikitool_core::types::{PageType, SyncStatus};

    fn test_db() -> Database {
        let db = Database::open_in_memory().expect("open");
        run_migrations(&db).expect("migrate");
        db
    }

    #[test]
    fn upsert_creates_then_patches() {
        let db = test_db();
        let id = upsert_page(
            &db,
            &PageUpsert {
                namespace: Some(0),
                content: Some("Hello".to_string()),
                sync_status: Some(SyncStatus::Synced),
                filepath: Some("wiki_content/Main/Foo.wiki".to_string()),
                ..PageUpsert::new("Foo")
            },
        )
        .expect("insert");

        let page = get_page(&db, "Foo").expect("get").expect("exists");
        assert_eq!(page.id, id);
        assert_eq!(page.content, "Hello");
        assert_eq!(page.content_hash, wikitool_core::hash::content_hash("Hello"));
        assert_eq!(page.sync_status, SyncStatus::Synced);

        // Patch a single column; everything else is untouched.
        let same_id = upsert_page(
            &db,
            &PageUpsert {
                revision_id: Some(42),
                ..PageUpsert::new("Foo")
            },
        )
        .expect("patch");
        assert_eq!(same_id, id);
        let page = get_page(&db, "Foo").expect("get").expect("exists");
        assert_eq!(page.revision_id, Some(42));
        assert_eq!(page.content, "Hello");
    }

    #[test]
    fn upsert_clears_redirect_target_with_some_none() {
        let db = test_db();
        upsert_page(
            &db,
            &PageUpsert {
                is_redirect: Some(true),
                redirect_target: Some(Some("Other".to_string())),
                ..PageUpsert::new("Old")
            },
        )
        .expect("insert");
        upsert_page(
            &db,
            &PageUpsert {
                is_redirect: Some(false),
                redirect_target: Some(None),
                ..PageUpsert::new("Old")
            },
        )
        .expect("clear");
        let page = get_page(&db, "Old").expect("get").expect("exists");
        assert!(!page.is_redirect);
        assert_eq!(page.redirect_target, None);
    }

    #[test]
    fn filters_and_ordering() {
        let db = test_db();
        for (title, ns, status) in [
            ("Beta", 0, SyncStatus::Synced),
            ("Alpha", 0, SyncStatus::New),
            ("Template:Thing", 10, SyncStatus::Synced),
        ] {
            upsert_page(
                &db,
                &PageUpsert {
                    namespace: Some(ns),
                    sync_status: Some(status),
                    page_type: Some(if ns == 10 {
                        PageType::Template
                    } else {
                        PageType::Article
                    }),
                    ..PageUpsert::new(title)
                },
            )
            .expect("insert");
        }

        let all = get_pages(&db, &PageFilter::default()).expect("all");
        let titles: Vec<&str> = all.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta", "Template:Thing"]);

        let main_only = get_pages(
            &db,
            &PageFilter {
                namespaces: Some(vec![0]),
                ..PageFilter::default()
            },
        )
        .expect("main");
        assert_eq!(main_only.len(), 2);

        let synced = get_pages(
            &db,
            &PageFilter {
                sync_status: Some(SyncStatus::Synced),
                ..PageFilter::default()
            },
        )
        .expect("synced");
        assert_eq!(synced.len(), 2);

        let limited = get_pages(
            &db,
            &PageFilter {
                limit: Some(1),
                offset: Some(1),
                ..PageFilter::default()
            },
        )
        .expect("limited");
        assert_eq!(limited[0].title, "Beta");
    }

    #[test]
    fn case_insensitive_filepath_lookup() {
        let db = test_db();
        upsert_page(
            &db,
            &PageUpsert {
                filepath: Some("wiki_content/Main/Foo.wiki".to_string()),
                ..PageUpsert::new("Foo")
            },
        )
        .expect("insert");

        assert!(get_page_by_path(&db, "wiki_content/main/foo.wiki")
            .expect("path")
            .is_none());
        assert!(
            get_page_by_filepath_insensitive(&db, "wiki_content/main/FOO.wiki")
                .expect("insensitive")
                .is_some()
        );
    }

    #[test]
    fn delete_unknown_returns_false() {
        let db = test_db();
        assert!(!delete_page(&db, "Missing").expect("delete"));
    }
}
