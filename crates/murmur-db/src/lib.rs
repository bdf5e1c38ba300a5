pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OpenFlags, ffi};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_READER_POOL: usize = 4;

/// Upper bound on how long a statement waits for a competing lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Message store with a reader/writer split: every write goes through one
/// connection, reads are spread over a small pool of read-only connections.
/// In-memory databases have no readers and serve everything from the writer.
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_readers(path, DEFAULT_READER_POOL)
    }

    pub fn open_with_readers(path: &Path, reader_count: usize) -> Result<Self> {
        let writer = Connection::open(path)?;

        // WAL mode for concurrent reads
        writer.pragma_update(None, "journal_mode", "WAL")?;
        configure(&writer)?;
        migrations::run(&writer)?;

        let mut readers = Vec::with_capacity(reader_count);
        for _ in 0..reader_count {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            register_functions(&conn)?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers)",
            path.display(),
            reader_count
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let writer = Connection::open_in_memory()?;
        configure(&writer)?;
        migrations::run(&writer)?;

        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            reader_idx: AtomicUsize::new(0),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        if self.readers.is_empty() {
            return self.with_conn_mut(f);
        }
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|e| anyhow!("Reader lock poisoned: {}", e))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .writer
            .lock()
            .map_err(|e| anyhow!("Writer lock poisoned: {}", e))?;
        f(&conn)
    }
}

fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    register_functions(conn)
}

/// SQL functions every connection needs. `fold_case(text)` applies
/// [`fold_case`] so queries fold case with full Unicode rules instead of
/// LIKE's ASCII-only folding.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text = ctx.get::<Option<String>>(0)?;
            Ok(text.map(|t| fold_case(&t)))
        },
    )?;
    Ok(())
}

/// Case folding shared by every case-insensitive search.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Formats a timestamp the way every column stores it: fixed-width RFC 3339
/// in UTC with microseconds, so string comparison is chronological.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("Corrupt timestamp '{}': {}", raw, e))
}

/// True when the error is a UNIQUE or PRIMARY KEY constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        sqlite_failure(err),
        Some(code) if code == ffi::SQLITE_CONSTRAINT_UNIQUE || code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// True when the error is a FOREIGN KEY constraint violation, i.e. the row
/// referenced a profile, conversation or message that does not exist.
pub fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
    sqlite_failure(err) == Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

fn sqlite_failure(err: &anyhow::Error) -> Option<i32> {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, _)) => Some(e.extended_code),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Database;

    pub const ALICE: &str = "00000000-0000-0000-0000-00000000000a";
    pub const BOB: &str = "00000000-0000-0000-0000-00000000000b";
    pub const CAROL: &str = "00000000-0000-0000-0000-00000000000c";
    pub const T0: &str = "2026-01-01T00:00:00.000000Z";

    pub fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        for (id, name) in [(ALICE, "Alice"), (BOB, "Bob"), (CAROL, "Carol")] {
            db.upsert_profile(id, Some(name), Some(&name.to_lowercase()), None, T0).unwrap();
        }
        db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_lexically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        let (a, b) = (timestamp(early), timestamp(late));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_timestamp(&b).unwrap(), late);
    }

    #[test]
    fn fold_case_is_registered_in_sql() {
        let db = Database::open_in_memory().unwrap();
        let folded: Option<String> = db
            .with_conn(|conn| Ok(conn.query_row("SELECT fold_case('ПРИВЕТ Ärger')", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(folded.as_deref(), Some("привет ärger"));

        let null: Option<String> = db
            .with_conn(|conn| Ok(conn.query_row("SELECT fold_case(NULL)", [], |r| r.get(0))?))
            .unwrap();
        assert!(null.is_none());
    }

    #[test]
    fn corrupt_timestamp_is_an_error() {
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn file_database_serves_reads_from_pool() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_with_readers(&dir.path().join("murmur.db"), 2).unwrap();
        db.upsert_profile(test_support::ALICE, Some("Alice"), None, None, test_support::T0)
            .unwrap();

        for _ in 0..3 {
            let found = db.get_profiles(&[test_support::ALICE.to_string()]).unwrap();
            assert_eq!(found.len(), 1);
        }
    }

    #[test]
    fn constraint_errors_are_classified() {
        let db = test_support::seeded();
        let err = db
            .with_conn_mut(|conn| {
                conn.execute(
                    "INSERT INTO profiles (id, created_at, updated_at) VALUES (?1, ?2, ?2)",
                    (test_support::ALICE, test_support::T0),
                )?;
                Ok(())
            })
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(!is_foreign_key_violation(&err));
    }
}
