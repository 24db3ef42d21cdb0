//! Tiered full-text index over documentation content. The FTS rows are
//! shadows; the authoritative copy lives with the owning table.

use crate::{Database, Result};
use rusqlite::params;

pub const TIER_CONTENT: &str = "content";
pub const TIER_EXTENSION: &str = "extension";
pub const TIER_TECHNICAL: &str = "technical";

#[derive(Clone, Debug)]
pub struct SearchHit {
    pub tier: String,
    pub title: String,
    /// Contextual snippet with `[`/`]` markers around matches.
    pub snippet: String,
}

/// Writes or overwrites the FTS row for `(tier, title)`.
pub fn index_page(db: &Database, tier: &str, title: &str, content: &str) -> Result<()> {
    let conn = db.conn()?;
    conn.prepare_cached("DELETE FROM docs_fts WHERE tier = ?1 AND title = ?2")?
        .execute([tier, title])?;
    conn.prepare_cached("INSERT INTO docs_fts (tier, title, content) VALUES (?1, ?2, ?3)")?
        .execute([tier, title, content])?;
    Ok(())
}

pub fn remove_page(db: &Database, tier: &str, title: &str) -> Result<()> {
    let conn = db.conn()?;
    conn.prepare_cached("DELETE FROM docs_fts WHERE tier = ?1 AND title = ?2")?
        .execute([tier, title])?;
    Ok(())
}

/// Ranked full-text search, optionally restricted to one tier.
pub fn search(
    db: &Database,
    query: &str,
    tier: Option<&str>,
    limit: u64,
) -> Result<Vec<SearchHit>> {
    let conn = db.conn()?;
    let mut out = Vec::new();

    match tier {
        Some(tier) => {
            let mut statement = conn.prepare_cached(
                "SELECT tier, title, snippet(docs_fts, 2, '[', ']', '…', 12) \
                 FROM docs_fts WHERE docs_fts MATCH ?1 AND tier = ?2 \
                 ORDER BY rank LIMIT ?3",
            )?;
            let rows = statement.query_map(params![query, tier, limit as i64], |row| {
                Ok(SearchHit {
                    tier: row.get(0)?,
                    title: row.get(1)?,
                    snippet: row.get(2)?,
                })
            })?;
            for row in rows {
                out.push(row?);
            }
        }
        None => {
            let mut statement = conn.prepare_cached(
                "SELECT tier, title, snippet(docs_fts, 2, '[', ']', '…', 12) \
                 FROM docs_fts WHERE docs_fts MATCH ?1 \
                 ORDER BY rank LIMIT ?2",
            )?;
            let rows = statement.query_map(params![query, limit as i64], |row| {
                Ok(SearchHit {
                    tier: row.get(0)?,
                    title: row.get(1)?,
                    snippet: row.get(2)?,
                })
            })?;
            for row in rows {
                out.push(row?);
            }
        }
    }

    Ok(out)
}
