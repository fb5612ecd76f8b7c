//! SQLite work queue implementation
//!
//! Delivery mechanics mirror a classic at-least-once message queue:
//! receiving a task stamps a visibility deadline and bumps its attempt
//! counter inside one transaction; expired in-flight tasks are reclaimed
//! lazily by the next receive; diversion to the dead-letter table happens
//! in the same transaction that removes the task from the live table.

use crate::queue::schema::initialize_schema;
use crate::queue::{
    Delivery, QueueCounts, QueueError, QueueResult, ReceiptHandle, TaskState, WorkQueue,
};
use crate::task::{CrawlTask, DeadTask};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// SQLite-backed work queue with retry and dead-letter semantics
pub struct SqliteQueue {
    conn: Mutex<Connection>,
    max_attempts: u32,
    visibility_timeout: Duration,
}

impl SqliteQueue {
    /// Opens or creates a queue at the given path
    ///
    /// `max_attempts` is the total delivery attempts a task gets before it
    /// is diverted to the dead-letter queue; `visibility_timeout` is how
    /// long a delivered task stays hidden before it is considered
    /// abandoned.
    pub fn open(
        path: &Path,
        max_attempts: u32,
        visibility_timeout: Duration,
    ) -> QueueResult<Self> {
        let conn = Connection::open(path)?;
        configure_connection(&conn)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_attempts,
            visibility_timeout,
        })
    }

    /// Creates an in-memory queue (for tests and ephemeral runs)
    pub fn in_memory(max_attempts: u32, visibility_timeout: Duration) -> QueueResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_attempts,
            visibility_timeout,
        })
    }

    /// Appends a raw body for delivery
    ///
    /// This is the producer-side escape hatch: the queue does not validate
    /// bodies, so malformed payloads travel the normal retry path and end
    /// up in the dead-letter queue once their attempts are exhausted.
    pub fn enqueue_raw(&self, body: &str) -> QueueResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tasks (body, state, attempts, visible_at, enqueued_at)
             VALUES (?1, ?2, 0, 0, ?3)",
            params![
                body,
                TaskState::Ready.to_db_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Reclaims in-flight tasks whose visibility window expired
    ///
    /// Abandoned tasks go back to ready for redelivery, unless their
    /// attempts are already exhausted, in which case they are diverted.
    fn reap_expired(&self, tx: &Transaction<'_>, now_millis: i64) -> QueueResult<()> {
        let expired: Vec<(i64, String, u32)> = {
            let mut stmt = tx.prepare(
                "SELECT id, body, attempts FROM tasks
                 WHERE state = ?1 AND visible_at <= ?2",
            )?;
            let rows = stmt.query_map(
                params![TaskState::InFlight.to_db_string(), now_millis],
                |row| Ok((row.get(0)?, row.get(1)?, row.get::<_, i64>(2)? as u32)),
            )?;
            rows.collect::<Result<_, _>>()?
        };

        for (id, body, attempts) in expired {
            if attempts >= self.max_attempts {
                tracing::warn!(
                    "Task {} abandoned after {} attempts, diverting to DLQ",
                    id,
                    attempts
                );
                divert_to_dead(tx, id, &body, attempts, "visibility window expired")?;
            } else {
                tracing::debug!("Task {} visibility expired, returning to queue", id);
                tx.execute(
                    "UPDATE tasks SET state = ?1, visible_at = 0 WHERE id = ?2",
                    params![TaskState::Ready.to_db_string(), id],
                )?;
            }
        }

        Ok(())
    }
}

/// Applies connection pragmas shared by all queue connections
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

/// Moves a task into the dead-letter table and removes it from the live
/// table, within the caller's transaction
fn divert_to_dead(
    tx: &Transaction<'_>,
    id: i64,
    body: &str,
    attempts: u32,
    error: &str,
) -> QueueResult<()> {
    tx.execute(
        "INSERT INTO dead_tasks (body, attempts, last_error, failed_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![body, attempts, error, Utc::now().to_rfc3339()],
    )?;
    tx.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
    Ok(())
}

impl WorkQueue for SqliteQueue {
    fn enqueue(&self, task: &CrawlTask) -> QueueResult<()> {
        self.enqueue_raw(&task.to_body())
    }

    fn receive(&self) -> QueueResult<Option<Delivery>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now_millis = Utc::now().timestamp_millis();

        self.reap_expired(&tx, now_millis)?;

        let next: Option<(i64, String, u32)> = tx
            .query_row(
                "SELECT id, body, attempts FROM tasks
                 WHERE state = ?1 ORDER BY id LIMIT 1",
                params![TaskState::Ready.to_db_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get::<_, i64>(2)? as u32)),
            )
            .optional()?;

        let Some((id, body, attempts)) = next else {
            tx.commit()?;
            return Ok(None);
        };

        let attempt = attempts + 1;
        let deadline = now_millis + self.visibility_timeout.as_millis() as i64;
        tx.execute(
            "UPDATE tasks SET state = ?1, attempts = ?2, visible_at = ?3 WHERE id = ?4",
            params![TaskState::InFlight.to_db_string(), attempt, deadline, id],
        )?;
        tx.commit()?;

        Ok(Some(Delivery {
            body,
            receipt: ReceiptHandle {
                task_id: id,
                attempt,
            },
            attempt,
        }))
    }

    fn acknowledge(&self, receipt: ReceiptHandle) -> QueueResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "DELETE FROM tasks WHERE id = ?1 AND state = ?2 AND attempts = ?3",
            params![
                receipt.task_id,
                TaskState::InFlight.to_db_string(),
                receipt.attempt
            ],
        )?;

        if changed == 0 {
            return Err(QueueError::StaleReceipt {
                task_id: receipt.task_id,
                attempt: receipt.attempt,
            });
        }
        Ok(())
    }

    fn fail(&self, receipt: ReceiptHandle, error: &str) -> QueueResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let body: Option<String> = tx
            .query_row(
                "SELECT body FROM tasks WHERE id = ?1 AND state = ?2 AND attempts = ?3",
                params![
                    receipt.task_id,
                    TaskState::InFlight.to_db_string(),
                    receipt.attempt
                ],
                |row| row.get(0),
            )
            .optional()?;

        let Some(body) = body else {
            return Err(QueueError::StaleReceipt {
                task_id: receipt.task_id,
                attempt: receipt.attempt,
            });
        };

        if receipt.attempt >= self.max_attempts {
            divert_to_dead(&tx, receipt.task_id, &body, receipt.attempt, error)?;
        } else {
            tx.execute(
                "UPDATE tasks SET state = ?1, visible_at = 0 WHERE id = ?2",
                params![TaskState::Ready.to_db_string(), receipt.task_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn counts(&self) -> QueueResult<QueueCounts> {
        let conn = self.conn.lock().unwrap();

        let count_state = |state: TaskState| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE state = ?1",
                params![state.to_db_string()],
                |row| row.get(0),
            )
        };

        let ready = count_state(TaskState::Ready)?;
        let in_flight = count_state(TaskState::InFlight)?;
        let dead: i64 = conn.query_row("SELECT COUNT(*) FROM dead_tasks", [], |row| row.get(0))?;

        Ok(QueueCounts {
            ready: ready as u64,
            in_flight: in_flight as u64,
            dead: dead as u64,
        })
    }

    fn dead_tasks(&self) -> QueueResult<Vec<DeadTask>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT body, attempts, last_error, failed_at FROM dead_tasks ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(DeadTask {
                body: row.get(0)?,
                attempts: row.get::<_, i64>(1)? as u32,
                last_error: row.get(2)?,
                failed_at: row.get(3)?,
            })
        })?;

        Ok(rows.collect::<Result<_, _>>()?)
    }
}
