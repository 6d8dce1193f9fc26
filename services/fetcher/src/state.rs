//! Fetch state persistence using SQLite with sqlx.
//!
//! Holds the ingest checkpoint (forward-only, written only after a
//! verified commit) and a log of completed fetch cycles for the status
//! API. Survives service restarts.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};
use uuid::Uuid;

/// Terminal state of one fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Committed,
    /// Nothing new in the window; the commit was still verified.
    Empty,
    /// Transient fetch failure; the window will be retried.
    RetryLater,
    Failed,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::Empty => "empty",
            Self::RetryLater => "retry_later",
            Self::Failed => "failed",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "committed" => Self::Committed,
            "empty" => Self::Empty,
            "retry_later" => Self::RetryLater,
            _ => Self::Failed,
        }
    }
}

/// One completed fetch cycle.
#[derive(Debug, Clone)]
pub struct CycleRecord {
    pub id: Uuid,
    pub dataset: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub fetched_rows: u64,
    pub inserted_rows: u64,
    pub unique_floats: u64,
    pub outcome: CycleOutcome,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Aggregate counters over the cycle log.
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    pub cycles: u64,
    pub committed: u64,
    pub failed: u64,
    pub total_fetched: u64,
    pub total_inserted: u64,
}

/// Manages checkpoint and cycle-log persistence.
pub struct IngestState {
    pool: SqlitePool,
}

impl IngestState {
    /// Open or create the state database at the given path.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to open SQLite database")?;

        let state = Self { pool };
        state.create_tables().await?;

        info!(path = %path.display(), "Opened fetch state database");
        Ok(state)
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let state = Self { pool };
        state.create_tables().await?;
        Ok(state)
    }

    async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ingest_checkpoint (
                dataset TEXT PRIMARY KEY,
                last_success TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fetch_cycles (
                id TEXT PRIMARY KEY,
                dataset TEXT NOT NULL,
                window_start TEXT NOT NULL,
                window_end TEXT NOT NULL,
                fetched_rows INTEGER NOT NULL DEFAULT 0,
                inserted_rows INTEGER NOT NULL DEFAULT 0,
                unique_floats INTEGER NOT NULL DEFAULT 0,
                outcome TEXT NOT NULL,
                error_message TEXT,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_cycles_dataset \
             ON fetch_cycles(dataset, finished_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Read the checkpoint for a dataset, if one has been committed.
    pub async fn checkpoint(&self, dataset: &str) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT last_success FROM ingest_checkpoint WHERE dataset = ?")
                .bind(dataset)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.and_then(|(raw,)| {
            DateTime::parse_from_rfc3339(&raw)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        }))
    }

    /// Advance the checkpoint. The timestamp only moves forward; a
    /// value at or behind the stored one is ignored. Returns whether
    /// the checkpoint actually moved.
    pub async fn advance_checkpoint(&self, dataset: &str, ts: DateTime<Utc>) -> Result<bool> {
        if let Some(current) = self.checkpoint(dataset).await? {
            if ts <= current {
                debug!(
                    dataset = %dataset,
                    current = %current,
                    proposed = %ts,
                    "Checkpoint not advanced"
                );
                return Ok(false);
            }
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO ingest_checkpoint (dataset, last_success, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(dataset) DO UPDATE SET
                last_success = excluded.last_success,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(dataset)
        .bind(ts.to_rfc3339())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!(dataset = %dataset, checkpoint = %ts, "Advanced checkpoint");
        Ok(true)
    }

    /// Append one finished cycle to the log.
    pub async fn record_cycle(&self, record: &CycleRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fetch_cycles (
                id, dataset, window_start, window_end,
                fetched_rows, inserted_rows, unique_floats,
                outcome, error_message, started_at, finished_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.dataset)
        .bind(record.window_start.to_rfc3339())
        .bind(record.window_end.to_rfc3339())
        .bind(record.fetched_rows as i64)
        .bind(record.inserted_rows as i64)
        .bind(record.unique_floats as i64)
        .bind(record.outcome.as_str())
        .bind(&record.error_message)
        .bind(record.started_at.to_rfc3339())
        .bind(record.finished_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent cycles, newest first.
    pub async fn recent_cycles(&self, limit: usize) -> Result<Vec<CycleRecord>> {
        let rows: Vec<(
            String,
            String,
            String,
            String,
            i64,
            i64,
            i64,
            String,
            Option<String>,
            String,
            String,
        )> = sqlx::query_as(
            r#"
            SELECT id, dataset, window_start, window_end,
                   fetched_rows, inserted_rows, unique_floats,
                   outcome, error_message, started_at, finished_at
            FROM fetch_cycles
            ORDER BY finished_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .into_iter()
            .map(|row| CycleRecord {
                id: Uuid::parse_str(&row.0).unwrap_or_else(|_| Uuid::nil()),
                dataset: row.1,
                window_start: parse_ts(&row.2),
                window_end: parse_ts(&row.3),
                fetched_rows: row.4 as u64,
                inserted_rows: row.5 as u64,
                unique_floats: row.6 as u64,
                outcome: CycleOutcome::from_str(&row.7),
                error_message: row.8,
                started_at: parse_ts(&row.9),
                finished_at: parse_ts(&row.10),
            })
            .collect();

        Ok(records)
    }

    /// Aggregate counters for the status API.
    pub async fn stats(&self) -> Result<IngestStats> {
        let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN outcome IN ('committed', 'empty') THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN outcome IN ('failed', 'retry_later') THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(fetched_rows), 0),
                   COALESCE(SUM(inserted_rows), 0)
            FROM fetch_cycles
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(IngestStats {
            cycles: row.0 as u64,
            committed: row.1 as u64,
            failed: row.2 as u64,
            total_fetched: row.3 as u64,
            total_inserted: row.4 as u64,
        })
    }
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_checkpoint_starts_empty() {
        let state = IngestState::open_memory().await.unwrap();
        assert!(state.checkpoint("argo-floats").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_checkpoint_only_moves_forward() {
        let state = IngestState::open_memory().await.unwrap();

        assert!(state.advance_checkpoint("argo-floats", ts(10)).await.unwrap());
        assert_eq!(state.checkpoint("argo-floats").await.unwrap(), Some(ts(10)));

        // A stale window end must not rewind the checkpoint.
        assert!(!state.advance_checkpoint("argo-floats", ts(5)).await.unwrap());
        assert_eq!(state.checkpoint("argo-floats").await.unwrap(), Some(ts(10)));

        assert!(state.advance_checkpoint("argo-floats", ts(12)).await.unwrap());
        assert_eq!(state.checkpoint("argo-floats").await.unwrap(), Some(ts(12)));
    }

    #[tokio::test]
    async fn test_checkpoint_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fetcher.db");

        let state = IngestState::open(&path).await.unwrap();
        state
            .advance_checkpoint("argo-floats", ts(10))
            .await
            .unwrap();
        drop(state);

        let reopened = IngestState::open(&path).await.unwrap();
        assert_eq!(
            reopened.checkpoint("argo-floats").await.unwrap(),
            Some(ts(10))
        );
    }

    #[tokio::test]
    async fn test_checkpoints_are_per_dataset() {
        let state = IngestState::open_memory().await.unwrap();

        state.advance_checkpoint("core", ts(10)).await.unwrap();
        assert!(state.checkpoint("bgc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cycle_log_round_trip() {
        let state = IngestState::open_memory().await.unwrap();

        let record = CycleRecord {
            id: Uuid::new_v4(),
            dataset: "argo-floats".to_string(),
            window_start: ts(9),
            window_end: ts(10),
            fetched_rows: 1200,
            inserted_rows: 800,
            unique_floats: 14,
            outcome: CycleOutcome::Committed,
            error_message: None,
            started_at: ts(10),
            finished_at: ts(10),
        };
        state.record_cycle(&record).await.unwrap();

        let recent = state.recent_cycles(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].fetched_rows, 1200);
        assert_eq!(recent[0].outcome, CycleOutcome::Committed);

        let stats = state.stats().await.unwrap();
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.committed, 1);
        assert_eq!(stats.total_inserted, 800);
    }
}
