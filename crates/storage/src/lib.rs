use std::{fs, path::PathBuf, str::FromStr, sync::Arc};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use shared::domain::{InteractionRecord, InteractionStatus, RequestId};

/// Persistent single-record store shared by the dispatcher and the popup.
///
/// The store holds at most one [`InteractionRecord`] (the "latest"
/// interaction). Writes persist to sqlite first and then notify subscribers
/// with the full new record, so readers never have to re-read fields that
/// changed alongside the status. The persisted row is what lets a request's
/// progress survive the popup being closed and reopened.
#[derive(Clone)]
pub struct InteractionStore {
    pool: Pool<Sqlite>,
    changes: Arc<watch::Sender<Option<InteractionRecord>>>,
}

impl InteractionStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS interaction_record (
                slot        INTEGER PRIMARY KEY CHECK (slot = 1),
                request_id  TEXT NOT NULL,
                status      TEXT NOT NULL,
                query       TEXT NOT NULL,
                answer      TEXT,
                error       TEXT,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to ensure interaction_record table exists")?;

        let latest = load_latest(&pool).await?;
        if latest.is_some() {
            info!("restored persisted interaction record");
        }
        let (changes, _) = watch::channel(latest);

        Ok(Self {
            pool,
            changes: Arc::new(changes),
        })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// The current record as last published, without touching the database.
    pub fn latest(&self) -> Option<InteractionRecord> {
        self.changes.borrow().clone()
    }

    /// Persists `record` as the latest interaction and notifies subscribers.
    pub async fn put(&self, record: InteractionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO interaction_record
                (slot, request_id, status, query, answer, error, updated_at)
            VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(slot) DO UPDATE SET
                request_id = excluded.request_id,
                status     = excluded.status,
                query      = excluded.query,
                answer     = excluded.answer,
                error      = excluded.error,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.request_id.0.to_string())
        .bind(record.status.as_str())
        .bind(&record.query)
        .bind(&record.answer)
        .bind(&record.error)
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("failed to persist interaction record")?;

        self.changes.send_replace(Some(record));
        Ok(())
    }

    /// Removes the persisted record and notifies subscribers with `None`.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM interaction_record")
            .execute(&self.pool)
            .await
            .context("failed to clear interaction record")?;
        self.changes.send_replace(None);
        Ok(())
    }

    /// Change notifications carrying the full new record. Dropping the
    /// receiver is the unsubscribe.
    pub fn subscribe(&self) -> watch::Receiver<Option<InteractionRecord>> {
        self.changes.subscribe()
    }
}

async fn load_latest(pool: &Pool<Sqlite>) -> Result<Option<InteractionRecord>> {
    let row = sqlx::query(
        "SELECT request_id, status, query, answer, error, updated_at
         FROM interaction_record WHERE slot = 1",
    )
    .fetch_optional(pool)
    .await
    .context("failed to load interaction record")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let request_id: String = row.try_get("request_id")?;
    let status: String = row.try_get("status")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Some(InteractionRecord {
        request_id: RequestId(
            Uuid::parse_str(&request_id)
                .with_context(|| format!("invalid persisted request id: {request_id}"))?,
        ),
        status: InteractionStatus::from_str_name(&status)
            .ok_or_else(|| anyhow!("invalid persisted status: {status}"))?,
        query: row.try_get("query")?,
        answer: row.try_get("answer")?,
        error: row.try_get("error")?,
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .with_context(|| format!("invalid persisted timestamp: {updated_at}"))?
            .with_timezone(&Utc),
    }))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(raw_path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    if raw_path.is_empty() {
        return Ok(());
    }
    let path = PathBuf::from(raw_path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
