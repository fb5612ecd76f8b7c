//! SQLite dedup store implementation
//!
//! The atomic check-and-set is a single `INSERT .. ON CONFLICT` statement,
//! so concurrent workers (including workers in other processes sharing the
//! same database file) race safely: exactly one observes `Inserted`.

use crate::store::schema::initialize_schema;
use crate::store::{DedupStore, MarkOutcome, StoreResult, VisitStatus, VisitedRecord};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed dedup store
pub struct SqliteDedupStore {
    conn: Mutex<Connection>,
}

impl SqliteDedupStore {
    /// Opens or creates a dedup store at the given path
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        configure_connection(&conn)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory store (for tests and ephemeral runs)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Applies connection pragmas shared by all store connections
fn configure_connection(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA temp_store = MEMORY;
    ",
    )?;
    Ok(())
}

impl DedupStore for SqliteDedupStore {
    fn mark_if_absent(&self, url: &str, run_id: &str) -> StoreResult<MarkOutcome> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        // A fresh insert and a reclaim of a 'failed' record both count as
        // a successful claim; a 'visited' record leaves the row unchanged.
        let changed = conn.execute(
            "INSERT INTO visited (url, run_id, status, first_seen_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(url, run_id) DO UPDATE SET status = excluded.status
             WHERE visited.status = ?5",
            params![
                url,
                run_id,
                VisitStatus::Visited.to_db_string(),
                now,
                VisitStatus::Failed.to_db_string()
            ],
        )?;

        if changed > 0 {
            Ok(MarkOutcome::Inserted)
        } else {
            Ok(MarkOutcome::AlreadyPresent)
        }
    }

    fn mark_failed(&self, url: &str, run_id: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE visited SET status = ?1 WHERE url = ?2 AND run_id = ?3",
            params![VisitStatus::Failed.to_db_string(), url, run_id],
        )?;
        Ok(())
    }

    fn get(&self, url: &str, run_id: &str) -> StoreResult<Option<VisitedRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT url, run_id, status, first_seen_at
                 FROM visited WHERE url = ?1 AND run_id = ?2",
                params![url, run_id],
                |row| {
                    Ok(VisitedRecord {
                        url: row.get(0)?,
                        run_id: row.get(1)?,
                        status: VisitStatus::from_db_string(&row.get::<_, String>(2)?)
                            .unwrap_or(VisitStatus::Failed),
                        first_seen_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn visited_count(&self, run_id: &str) -> StoreResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM visited WHERE run_id = ?1 AND status = ?2",
            params![run_id, VisitStatus::Visited.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
