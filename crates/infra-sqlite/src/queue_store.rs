// SQLite QueueStore Implementation
//
// The durable sink the engine writes through: one row per entry keyed by
// (doctor, day, token), upserted on every state change. Rehydration reads
// only the active rows back.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use medq_core::domain::{EntryStatus, PriorityClass, QueueEntry, TokenNumber};
use medq_core::error::{EngineError, Result};
use medq_core::port::QueueStore;
use sqlx::SqlitePool;

// Helper to convert sqlx::Error to EngineError with structured information
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> EngineError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => EngineError::Database(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => EngineError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => {
                        EngineError::Database(format!("Database full: {}", db_err.message()))
                    }
                    _ => EngineError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                EngineError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => EngineError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            EngineError::Database(format!("Column not found: {}", col))
        }
        _ => EngineError::Database(err.to_string()),
    }
}

pub struct SqliteQueueStore {
    pool: SqlitePool,
}

impl SqliteQueueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn load_active(&self, doctor_id: &str, day: NaiveDate) -> Result<Vec<QueueEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            r#"
            SELECT * FROM queue_entries
            WHERE doctor_id = ? AND day = ? AND status IN ('WAITING', 'IN_SERVICE')
            ORDER BY token_number ASC
            "#,
        )
        .bind(doctor_id)
        .bind(day.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(|row| row.into_entry()).collect()
    }

    async fn max_token(&self, doctor_id: &str, day: NaiveDate) -> Result<Option<TokenNumber>> {
        let max: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(token_number) FROM queue_entries WHERE doctor_id = ? AND day = ?",
        )
        .bind(doctor_id)
        .bind(day.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(max.map(|t| t as TokenNumber))
    }

    async fn persist(&self, entry: &QueueEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO queue_entries (
                doctor_id, day, token_number, patient_ref,
                priority, status, enqueued_at, started_at, finished_at,
                estimated_wait_secs, note
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (doctor_id, day, token_number) DO UPDATE SET
                priority = excluded.priority,
                status = excluded.status,
                started_at = excluded.started_at,
                finished_at = excluded.finished_at,
                estimated_wait_secs = excluded.estimated_wait_secs,
                note = excluded.note
            "#,
        )
        .bind(&entry.doctor_id)
        .bind(entry.day.to_string())
        .bind(entry.token_number as i64)
        .bind(&entry.patient_ref)
        .bind(entry.priority.to_string())
        .bind(entry.status.to_string())
        .bind(entry.enqueued_at.timestamp_millis())
        .bind(entry.started_at.map(|t| t.timestamp_millis()))
        .bind(entry.finished_at.map(|t| t.timestamp_millis()))
        .bind(entry.estimated_wait_secs as i64)
        .bind(&entry.note)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

/// SQLite row representation of a queue entry
#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    doctor_id: String,
    day: String,
    token_number: i64,
    patient_ref: String,
    priority: String,
    status: String,
    enqueued_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    estimated_wait_secs: i64,
    note: Option<String>,
}

impl EntryRow {
    fn into_entry(self) -> Result<QueueEntry> {
        Ok(QueueEntry {
            token_number: self.token_number as TokenNumber,
            patient_ref: self.patient_ref,
            doctor_id: self.doctor_id,
            day: parse_day(&self.day)?,
            priority: parse_priority(&self.priority)?,
            status: parse_status(&self.status)?,
            enqueued_at: parse_millis(self.enqueued_at)?,
            started_at: self.started_at.map(parse_millis).transpose()?,
            finished_at: self.finished_at.map(parse_millis).transpose()?,
            estimated_wait_secs: self.estimated_wait_secs.max(0) as u64,
            note: self.note,
        })
    }
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    s.parse()
        .map_err(|_| EngineError::Database(format!("invalid day column: {s}")))
}

fn parse_millis(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| EngineError::Database(format!("invalid timestamp column: {millis}")))
}

fn parse_priority(s: &str) -> Result<PriorityClass> {
    match s {
        "EMERGENCY" => Ok(PriorityClass::Emergency),
        "URGENT" => Ok(PriorityClass::Urgent),
        "ROUTINE" => Ok(PriorityClass::Routine),
        other => Err(EngineError::Database(format!(
            "invalid priority column: {other}"
        ))),
    }
}

fn parse_status(s: &str) -> Result<EntryStatus> {
    match s {
        "WAITING" => Ok(EntryStatus::Waiting),
        "IN_SERVICE" => Ok(EntryStatus::InService),
        "COMPLETED" => Ok(EntryStatus::Completed),
        "CANCELLED" => Ok(EntryStatus::Cancelled),
        other => Err(EngineError::Database(format!(
            "invalid status column: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    fn entry(token: TokenNumber, status: EntryStatus) -> QueueEntry {
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut e = QueueEntry::new(
            token,
            format!("patient-{token}"),
            "dr-yang",
            t0.date_naive(),
            PriorityClass::Urgent,
            t0,
        );
        if status != EntryStatus::Waiting {
            e.begin_service(t0).unwrap();
        }
        if status == EntryStatus::Completed {
            e.complete(t0).unwrap();
        }
        if status == EntryStatus::Cancelled {
            e.cancel(t0).unwrap();
        }
        e
    }

    async fn store() -> SqliteQueueStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteQueueStore::new(pool)
    }

    #[tokio::test]
    async fn persist_and_load_round_trip() {
        let store = store().await;
        let e = entry(1, EntryStatus::Waiting);
        store.persist(&e).await.unwrap();

        let active = store.load_active("dr-yang", e.day).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].token_number, 1);
        assert_eq!(active[0].patient_ref, "patient-1");
        assert_eq!(active[0].priority, PriorityClass::Urgent);
        assert_eq!(active[0].status, EntryStatus::Waiting);
        assert_eq!(active[0].enqueued_at, e.enqueued_at);
    }

    #[tokio::test]
    async fn upsert_replaces_state_not_identity() {
        let store = store().await;
        let mut e = entry(1, EntryStatus::Waiting);
        store.persist(&e).await.unwrap();

        let t1 = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        e.begin_service(t1).unwrap();
        store.persist(&e).await.unwrap();

        let active = store.load_active("dr-yang", e.day).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].status, EntryStatus::InService);
        assert_eq!(active[0].started_at, Some(t1));
    }

    #[tokio::test]
    async fn terminal_entries_are_excluded_from_active_but_count_for_max_token() {
        let store = store().await;
        let day = entry(1, EntryStatus::Waiting).day;

        store.persist(&entry(1, EntryStatus::Completed)).await.unwrap();
        store.persist(&entry(2, EntryStatus::Cancelled)).await.unwrap();
        store.persist(&entry(3, EntryStatus::Waiting)).await.unwrap();

        let active = store.load_active("dr-yang", day).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].token_number, 3);

        assert_eq!(store.max_token("dr-yang", day).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn max_token_is_none_for_untouched_day() {
        let store = store().await;
        let day = NaiveDate::from_ymd_opt(2031, 1, 1).unwrap();
        assert_eq!(store.max_token("dr-yang", day).await.unwrap(), None);
    }
}
