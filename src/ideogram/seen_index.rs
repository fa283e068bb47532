use std::fs::create_dir_all;
use std::path::Path;

use chrono::Utc;
use log::error;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Persistent set of download URLs that have completed a full
/// download-and-submit cycle. Records are only ever inserted; membership
/// testing before a cycle is what keeps harvest runs idempotent.
///
/// Lookup and insert failures are logged and mapped to "not seen" /
/// "insert failed" so a flaky store can never abort a harvest run. The worst
/// case is one duplicate re-download.
pub(crate) struct SeenIndex {
    conn: Mutex<Connection>,
}

impl SeenIndex {
    pub(crate) fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS seen_urls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                first_seen TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Equality lookup on the url column. Errors count as "not seen".
    pub(crate) fn exists(&self, url: &str) -> bool {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM seen_urls WHERE url = ?1)",
            params![url],
            |row| row.get::<_, bool>(0),
        );

        match result {
            Ok(seen) => seen,
            Err(e) => {
                error!("Error checking URL in seen index: {}", e);
                false
            }
        }
    }

    /// Inserts a processed URL. Returns whether the insert succeeded; a
    /// failure is logged and left for the next run to sort out.
    pub(crate) fn add(&self, url: &str) -> bool {
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT OR IGNORE INTO seen_urls (url, first_seen) VALUES (?1, ?2)",
            params![url, Utc::now().to_rfc3339()],
        );

        match result {
            Ok(_) => true,
            Err(e) => {
                error!("Error adding URL to seen index: {}", e);
                false
            }
        }
    }
}
