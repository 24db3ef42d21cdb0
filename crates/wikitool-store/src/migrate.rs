//! Transactional migration runner and schema validity check.

use crate::{
    schema::{latest_version, MIGRATIONS, REQUIRED_TABLES},
    Database, Result,
};
use std::collections::HashSet;
use wikitool_core::{types::now_iso, Error};

#[derive(Clone, Debug, Default)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub current_version: String,
}

#[derive(Clone, Debug)]
pub struct SchemaStatus {
    pub valid: bool,
    pub current_version: Option<String>,
    pub expected_version: String,
    pub missing_tables: Vec<String>,
}

/// Applies every unapplied migration in order, each inside its own
/// transaction. On failure the failing migration is rolled back, prior
/// successes are kept, and the failed version is reported.
pub fn run_migrations(db: &Database) -> Result<MigrationReport> {
    let mut conn = db.conn()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )?;

    let applied_set: HashSet<String> = {
        let mut statement = conn.prepare("SELECT version FROM schema_migrations")?;
        let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let mut report = MigrationReport::default();
    for (version, sql) in MIGRATIONS {
        if applied_set.contains(*version) {
            continue;
        }
        let txn = conn.transaction()?;
        let applied = (|| -> rusqlite::Result<()> {
            txn.execute_batch(sql)?;
            txn.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                [*version, now_iso().as_str()],
            )?;
            txn.execute(
                "INSERT OR REPLACE INTO config (key, value) VALUES ('schema_version', ?1)",
                [*version],
            )?;
            Ok(())
        })();
        match applied {
            Ok(()) => {
                txn.commit()?;
                tracing::info!(version, "applied schema migration");
                report.applied.push(version.to_string());
            }
            Err(err) => {
                drop(txn);
                return Err(Error::MigrationFailed {
                    version: version.to_string(),
                    message: err.to_string(),
                });
            }
        }
    }

    report.current_version = schema_version(db)?.unwrap_or_default();
    Ok(report)
}

pub fn schema_version(db: &Database) -> Result<Option<String>> {
    if !table_exists(db, "config")? {
        return Ok(None);
    }
    db.get_config("schema_version")
}

/// Compares the live schema against the enumerated required tables and the
/// expected version.
pub fn validate_schema(db: &Database) -> Result<SchemaStatus> {
    let existing: HashSet<String> = {
        let conn = db.conn()?;
        let mut statement = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type IN ('table', 'view')",
        )?;
        let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let missing_tables: Vec<String> = REQUIRED_TABLES
        .iter()
        .filter(|table| !existing.contains(**table))
        .map(|table| table.to_string())
        .collect();

    let current_version = schema_version(db)?;
    let expected_version = latest_version().to_string();
    let valid = missing_tables.is_empty() && current_version.as_deref() == Some(latest_version());

    Ok(SchemaStatus {
        valid,
        current_version,
        expected_version,
        missing_tables,
    })
}

/// Errors with a schema-mismatch when the database is not at the expected
/// version. Called by the engine before any sync operation.
pub fn require_valid_schema(db: &Database) -> Result<()> {
    let status = validate_schema(db)?;
    if status.valid {
        return Ok(());
    }
    Err(Error::SchemaMismatch {
        missing: status.missing_tables,
    })
}

fn table_exists(db: &Database, name: &str) -> Result<bool> {
    let conn = db.conn()?;
    let mut statement = conn
        .prepare_cached("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    let exists = statement.query([name])?.next()?.is_some();
    Ok(exists)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_replay_from_empty() {
        let db = Database::open_in_memory().expect("open");
        assert_eq!(schema_version(&db).expect("version"), None);

        let report = run_migrations(&db).expect("migrate");
        assert_eq!(
            report.applied,
            vec!["001", "002", "003", "004", "005"]
        );
        assert_eq!(report.current_version, "005");

        let status = validate_schema(&db).expect("validate");
        assert!(status.valid, "missing: {:?}", status.missing_tables);
        assert_eq!(status.current_version.as_deref(), Some("005"));
        assert_eq!(status.expected_version, "005");

        // One row per applied version.
        let conn = db.conn().expect("conn");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 5);
    }

    #[test]
    fn rerun_is_a_no_op() {
        let db = Database::open_in_memory().expect("open");
        run_migrations(&db).expect("first");
        let report = run_migrations(&db).expect("second");
        assert!(report.applied.is_empty());
        assert_eq!(report.current_version, "005");
    }

    #[test]
    fn validation_fails_before_migration() {
        let db = Database::open_in_memory().expect("open");
        let status = validate_schema(&db).expect("validate");
        assert!(!status.valid);
        assert!(status.missing_tables.contains(&"pages".to_string()));
        assert!(require_valid_schema(&db).is_err());
    }
}
