//! Append-only row store backed by SQLite
//!
//! One row per submitted trial, columns in the fixed output order. The
//! `(participant_id, trial_index)` primary key makes appends idempotent and
//! lets concurrent participants append without coordinating.

use super::{Backend, ProgressStore};
use crate::identity::ParticipantId;
use crate::models::{AppendAck, ProgressSnapshot, TrialResponse};
use crate::Result;
use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

/// SQLite-backed row store
#[derive(Clone)]
pub struct RowStore {
    pool: SqlitePool,
}

impl RowStore {
    /// Open (creating if needed) the row store database
    pub async fn connect(db_path: &Path) -> Result<Self> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new response database: {}", db_path.display());
        } else {
            info!("Opened existing response database: {}", db_path.display());
        }

        // WAL lets readers proceed while another participant appends
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&pool)
            .await?;

        create_responses_table(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of stored rows for a participant
    pub async fn count_responses(&self, participant_id: &ParticipantId) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM responses WHERE participant_id = ?")
                .bind(participant_id.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

async fn create_responses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS responses (
            participant_id TEXT NOT NULL,
            name_prefix TEXT NOT NULL,
            trial_index INTEGER NOT NULL,
            trial_id TEXT NOT NULL,
            transcript TEXT NOT NULL,
            ratings_json TEXT NOT NULL,
            timestamp_iso8601 TEXT NOT NULL,
            completed_flag INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (participant_id, trial_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[async_trait]
impl ProgressStore for RowStore {
    fn backend(&self) -> Backend {
        Backend::Rows
    }

    fn keeps_trial_order(&self) -> bool {
        false
    }

    async fn load(&self, participant_id: &ParticipantId) -> Result<Option<ProgressSnapshot>> {
        let (count, last, completed): (i64, Option<i64>, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(*), MAX(trial_index), MAX(completed_flag) FROM responses WHERE participant_id = ?",
        )
        .bind(participant_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        if count == 0 {
            return Ok(None);
        }

        Ok(Some(ProgressSnapshot {
            last_trial_index: last.map(|v| v.max(0) as usize),
            completed: completed.unwrap_or(0) != 0,
            trial_order: None,
        }))
    }

    async fn begin(&self, participant_id: &ParticipantId, _trial_order: &[usize]) -> Result<()> {
        // Rows carry no trial order; it is re-derived from the participant ID
        debug!(participant_id = %participant_id, "Row store session begin");
        Ok(())
    }

    async fn append(&self, response: &TrialResponse) -> Result<AppendAck> {
        let result = sqlx::query(
            r#"
            INSERT INTO responses (
                participant_id, name_prefix, trial_index, trial_id, transcript,
                ratings_json, timestamp_iso8601, completed_flag
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(participant_id, trial_index) DO NOTHING
            "#,
        )
        .bind(response.participant_id.as_str())
        .bind(&response.name_prefix)
        .bind(response.trial_index as i64)
        .bind(&response.trial_id)
        .bind(&response.transcript)
        .bind(response.ratings.to_json())
        .bind(response.timestamp_iso8601())
        .bind(response.completed)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(AppendAck::AlreadyStored)
        } else {
            Ok(AppendAck::Appended)
        }
    }

    async fn finalize(&self, participant_id: &ParticipantId) -> Result<()> {
        // Completion is recorded by the completed_flag on the last row
        debug!(participant_id = %participant_id, "Row store finalize");
        Ok(())
    }
}
