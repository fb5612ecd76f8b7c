//! Database schema for the dedup store

/// SQL schema for the visited-URL database
pub const SCHEMA_SQL: &str = r#"
-- One record per (url, run) pair; presence of a 'visited' record means
-- the URL must not be fetched again within that run.
CREATE TABLE IF NOT EXISTS visited (
    url TEXT NOT NULL,
    run_id TEXT NOT NULL,
    status TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    PRIMARY KEY (url, run_id)
);

CREATE INDEX IF NOT EXISTS idx_visited_run ON visited(run_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }
}
