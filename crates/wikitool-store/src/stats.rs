//! Aggregate counts over the whole database.

use crate::{Database, Result};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, Serialize)]
pub struct DbStats {
    pub pages: i64,
    pub by_namespace: BTreeMap<i64, i64>,
    pub by_sync_status: BTreeMap<String, i64>,
    pub by_page_type: BTreeMap<String, i64>,
    /// Row counts for every derived table plus categories and the logs.
    pub table_counts: BTreeMap<String, i64>,
}

const COUNTED_TABLES: &[&str] = &[
    "categories",
    "page_categories",
    "page_links",
    "redirects",
    "template_usage",
    "template_calls",
    "template_params",
    "infobox_kv",
    "page_sections",
    "template_metadata",
    "module_deps",
    "cargo_tables",
    "cargo_stores",
    "cargo_queries",
    "docs_fts",
    "sync_log",
];

pub fn get_stats(db: &Database) -> Result<DbStats> {
    let conn = db.conn()?;
    let mut stats = DbStats::default();

    stats.pages = conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;

    {
        let mut statement =
            conn.prepare("SELECT namespace, COUNT(*) FROM pages GROUP BY namespace")?;
        let rows = statement.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get(1)?)))?;
        for row in rows {
            let (ns, count) = row?;
            stats.by_namespace.insert(ns, count);
        }
    }
    {
        let mut statement =
            conn.prepare("SELECT sync_status, COUNT(*) FROM pages GROUP BY sync_status")?;
        let rows = statement.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get(1)?)))?;
        for row in rows {
            let (status, count) = row?;
            stats.by_sync_status.insert(status, count);
        }
    }
    {
        let mut statement =
            conn.prepare("SELECT page_type, COUNT(*) FROM pages GROUP BY page_type")?;
        let rows = statement.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get(1)?)))?;
        for row in rows {
            let (page_type, count) = row?;
            stats.by_page_type.insert(page_type, count);
        }
    }

    for table in COUNTED_TABLES {
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        stats.table_counts.insert(table.to_string(), count);
    }

    Ok(stats)
}
