//! Database schema for the work queue

/// SQL schema for the queue database
pub const SCHEMA_SQL: &str = r#"
-- Live tasks: ready for delivery or in flight behind a visibility deadline.
-- visible_at is unix milliseconds; an in-flight task whose deadline passed
-- is reclaimed on the next receive.
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    body TEXT NOT NULL,
    state TEXT NOT NULL DEFAULT 'ready',
    attempts INTEGER NOT NULL DEFAULT 0,
    visible_at INTEGER NOT NULL DEFAULT 0,
    enqueued_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_state ON tasks(state, visible_at);

-- Terminal sink for tasks that exhausted their delivery attempts.
-- Rows are immutable once written and never redelivered.
CREATE TABLE IF NOT EXISTS dead_tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    body TEXT NOT NULL,
    attempts INTEGER NOT NULL,
    last_error TEXT NOT NULL,
    failed_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
