//! SQLite-backed message store
//!
//! The pool is created lazily: `open` never touches the database, the
//! schema is ensured once on first use, and `close` releases the pool
//! for graceful shutdown.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::{MessageStore, NewMessage, StatusUpdate, StoreError};
use crate::types::{Message, MessageStatus};

pub struct SqliteStore {
    pool: SqlitePool,
    schema: OnceCell<()>,
}

#[derive(Debug, FromRow)]
struct DbMessage {
    id: String,
    recipients_json: String,
    subject: String,
    body_html: String,
    body_text: Option<String>,
    scheduled_time: Option<DateTime<Utc>>,
    status: String,
    created_at: DateTime<Utc>,
    provider_message_id: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
}

impl DbMessage {
    fn into_message(self) -> Result<Message, StoreError> {
        let to: Vec<String> = serde_json::from_str(&self.recipients_json)
            .map_err(|e| StoreError::InvalidRecord(format!("recipients: {e}")))?;
        let status = MessageStatus::parse(&self.status)
            .ok_or_else(|| StoreError::InvalidRecord(format!("status: {}", self.status)))?;

        Ok(Message {
            id: self.id,
            to,
            subject: self.subject,
            body_html: self.body_html,
            body_text: self.body_text,
            scheduled_time: self.scheduled_time,
            status,
            created_at: self.created_at,
            provider_message_id: self.provider_message_id,
            error_code: self.error_code,
            error_message: self.error_message,
            sent_at: self.sent_at,
            failed_at: self.failed_at,
        })
    }
}

impl SqliteStore {
    /// Open a store against a SQLite URL (e.g. `sqlite:mailflow.db?mode=rwc`).
    /// No connection is established until the first operation.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_lazy(url)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            pool,
            schema: OnceCell::new(),
        })
    }

    async fn pool(&self) -> Result<&SqlitePool, StoreError> {
        self.schema
            .get_or_try_init(|| async {
                info!("ensuring messages schema");
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS messages (
                        id TEXT PRIMARY KEY,
                        recipients_json TEXT NOT NULL,
                        subject TEXT NOT NULL,
                        body_html TEXT NOT NULL,
                        body_text TEXT,
                        scheduled_time TEXT,
                        status TEXT NOT NULL,
                        created_at TEXT NOT NULL,
                        provider_message_id TEXT,
                        error_code TEXT,
                        error_message TEXT,
                        sent_at TEXT,
                        failed_at TEXT
                    )
                    "#,
                )
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_messages_status ON messages(status)
                    "#,
                )
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;

                Ok::<(), StoreError>(())
            })
            .await?;

        Ok(&self.pool)
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn create(&self, message: NewMessage) -> Result<String, StoreError> {
        let pool = self.pool().await?;
        let id = Uuid::new_v4().to_string();
        let recipients_json = serde_json::to_string(&message.to)
            .map_err(|e| StoreError::InvalidRecord(format!("recipients: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, recipients_json, subject, body_html, body_text,
                                  scheduled_time, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&recipients_json)
        .bind(&message.subject)
        .bind(&message.body_html)
        .bind(&message.body_text)
        .bind(message.scheduled_time.map(|t| t.to_rfc3339()))
        .bind(message.status.as_str())
        .bind(message.created_at.to_rfc3339())
        .execute(pool)
        .await?;

        Ok(id)
    }

    async fn update(&self, id: &str, update: StatusUpdate) -> Result<(), StoreError> {
        let pool = self.pool().await?;

        let result = sqlx::query(
            r#"
            UPDATE messages SET
                status = ?,
                provider_message_id = COALESCE(?, provider_message_id),
                error_code = COALESCE(?, error_code),
                error_message = COALESCE(?, error_message),
                sent_at = COALESCE(?, sent_at),
                failed_at = COALESCE(?, failed_at)
            WHERE id = ?
            "#,
        )
        .bind(update.status.as_str())
        .bind(&update.provider_message_id)
        .bind(&update.error_code)
        .bind(&update.error_message)
        .bind(update.sent_at.map(|t| t.to_rfc3339()))
        .bind(update.failed_at.map(|t| t.to_rfc3339()))
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(id = %id, "status update for unknown message ignored");
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Message, StoreError> {
        let pool = self.pool().await?;

        let row: Option<DbMessage> = sqlx::query_as(
            r#"
            SELECT id, recipients_json, subject, body_html, body_text, scheduled_time,
                   status, created_at, provider_message_id, error_code, error_message,
                   sent_at, failed_at
            FROM messages
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        row.ok_or_else(|| StoreError::NotFound(id.to_string()))?
            .into_message()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
