use crate::Result;
use rusqlite::{config::DbConfig, Connection, OpenFlags};
use std::{
    fs,
    path::Path,
    sync::{Mutex, MutexGuard},
};
use wikitool_core::Error;

/// Handle to the wikitool database. One writer at a time; WAL keeps readers
/// concurrent with it.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Database> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let open_flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let mut conn = Connection::open_with_flags(path, open_flags)?;
        Self::configure(&mut conn)?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Database> {
        let mut conn = Connection::open_in_memory()?;
        Self::configure(&mut conn)?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    fn configure(conn: &mut Connection) -> Result<()> {
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_DEFENSIVE, true)?;
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)?;
        conn.trace(Some(|sql: &str| tracing::trace!(sql, "Database::trace")));
        // WAL only applies to file-backed databases; in-memory stays as-is.
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| {
            Error::ConfigMissing("database connection mutex poisoned".to_string())
        })
    }

    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| Error::ConfigMissing("database connection mutex poisoned".to_string()))?;
        conn.close().map_err(|(_conn, err)| Error::Db(err))
    }

    /// Reads one config value.
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare_cached("SELECT value FROM config WHERE key = ?1")?;
        let mut rows = statement.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Writes one config value, replacing any previous one.
    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.prepare_cached("INSERT OR REPLACE INTO config (key, value) VALUES (?1, ?2)")?
            .execute([key, value])?;
        Ok(())
    }
}
