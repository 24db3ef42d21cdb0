//! Append-only audit log of sync operations.

use crate::{Database, Result};
use rusqlite::params;
use wikitool_core::types::{now_iso, SyncLogEntry};

#[derive(Clone, Debug)]
pub struct SyncLogRow {
    pub id: i64,
    pub operation: String,
    pub page_title: Option<String>,
    pub status: String,
    pub revision_id: Option<i64>,
    pub error_message: Option<String>,
    pub details: Option<String>,
    pub timestamp: String,
}

pub fn log_sync(db: &Database, entry: &SyncLogEntry) -> Result<()> {
    let conn = db.conn()?;
    conn.prepare_cached(
        "INSERT INTO sync_log \
         (operation, page_title, status, revision_id, error_message, details, timestamp) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?
    .execute(params![
        entry.operation.as_str(),
        entry.page_title,
        entry.status.as_str(),
        entry.revision_id,
        entry.error_message,
        entry.details,
        now_iso()
    ])?;
    Ok(())
}

/// Most recent entries first.
pub fn get_sync_logs(db: &Database, limit: u64) -> Result<Vec<SyncLogRow>> {
    let conn = db.conn()?;
    let mut statement = conn.prepare_cached(
        "SELECT id, operation, page_title, status, revision_id, error_message, details, timestamp \
         FROM sync_log ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = statement.query_map([limit as i64], |row| {
        Ok(SyncLogRow {
            id: row.get(0)?,
            operation: row.get(1)?,
            page_title: row.get(2)?,
            status: row.get(3)?,
            revision_id: row.get(4)?,
            error_message: row.get(5)?,
            details: row.get(6)?,
            timestamp: row.get(7)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::run_migrations;
    use wikitool_core::types::{SyncOperation, SyncOutcome};

    #[test]
    fn append_and_read_back() {
        let db = Database::open_in_memory().expect("open");
        run_migrations(&db).expect("migrate");

        log_sync(
            &db,
            &SyncLogEntry {
                operation: SyncOperation::Pull,
                page_title: Some("Alpha".to_string()),
                status: SyncOutcome::Success,
                revision_id: Some(10),
                error_message: None,
                details: Some("{\"created\":1}".to_string()),
            },
        )
        .expect("log");
        log_sync(
            &db,
            &SyncLogEntry {
                operation: SyncOperation::Push,
                page_title: Some("Beta".to_string()),
                status: SyncOutcome::Conflict,
                revision_id: None,
                error_message: Some("remote changed".to_string()),
                details: None,
            },
        )
        .expect("log");

        let rows = get_sync_logs(&db, 10).expect("read");
        assert_eq!(rows.len(), 2);
        // Most recent first.
        assert_eq!(rows[0].operation, "push");
        assert_eq!(rows[0].status, "conflict");
        assert_eq!(rows[1].operation, "pull");
        assert_eq!(rows[1].revision_id, Some(10));

        let limited = get_sync_logs(&db, 1).expect("read");
        assert_eq!(limited.len(), 1);
    }
}
