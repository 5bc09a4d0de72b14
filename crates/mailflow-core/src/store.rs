//! Message persistence boundary
//!
//! The store owns the durable representation of a [`Message`]. The
//! dispatch engine is the only writer of status transitions; scheduled
//! jobs re-fetch records by id at fire time instead of holding copies.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::types::{Message, MessageStatus, SendRequest};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("message not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
}

/// A message record about to be persisted; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body_html: String,
    pub body_text: Option<String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    /// Record for an immediate send attempt.
    pub fn pending(request: &SendRequest) -> Self {
        Self {
            to: request.to.clone(),
            subject: request.subject.clone(),
            body_html: request.body_html.clone(),
            body_text: request.body_text.clone(),
            scheduled_time: None,
            status: MessageStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Record for a deferred send.
    pub fn scheduled(request: &SendRequest, fire_at: DateTime<Utc>) -> Self {
        Self {
            to: request.to.clone(),
            subject: request.subject.clone(),
            body_html: request.body_html.clone(),
            body_text: request.body_text.clone(),
            scheduled_time: Some(fire_at),
            status: MessageStatus::Scheduled,
            created_at: Utc::now(),
        }
    }

    pub fn into_message(self, id: String) -> Message {
        Message {
            id,
            to: self.to,
            subject: self.subject,
            body_html: self.body_html,
            body_text: self.body_text,
            scheduled_time: self.scheduled_time,
            status: self.status,
            created_at: self.created_at,
            provider_message_id: None,
            error_code: None,
            error_message: None,
            sent_at: None,
            failed_at: None,
        }
    }
}

/// Partial status update. Fields left as `None` keep their stored value.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: MessageStatus,
    pub provider_message_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    /// Terminal success transition.
    pub fn sent(provider_message_id: &str) -> Self {
        Self {
            status: MessageStatus::Sent,
            provider_message_id: Some(provider_message_id.to_string()),
            error_code: None,
            error_message: None,
            sent_at: Some(Utc::now()),
            failed_at: None,
        }
    }

    /// Terminal failure transition.
    pub fn failed(error_code: Option<String>, error_message: &str) -> Self {
        Self {
            status: MessageStatus::Failed,
            provider_message_id: None,
            error_code,
            error_message: Some(error_message.to_string()),
            sent_at: None,
            failed_at: Some(Utc::now()),
        }
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new record with the status supplied by the caller and
    /// return the assigned id.
    async fn create(&self, message: NewMessage) -> Result<String, StoreError>;

    /// Apply a partial update. An unknown id is a logged no-op, not an
    /// error: a fired job may race record deletion.
    async fn update(&self, id: &str, update: StatusUpdate) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Message, StoreError>;

    /// Release the underlying connection for graceful shutdown.
    async fn close(&self) {}
}

/// In-memory store backed by a keyed map. Default backend for tests and
/// single-process use.
#[derive(Default)]
pub struct MemoryStore {
    messages: RwLock<HashMap<String, Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create(&self, message: NewMessage) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let record = message.into_message(id.clone());
        self.messages.write().await.insert(id.clone(), record);
        Ok(id)
    }

    async fn update(&self, id: &str, update: StatusUpdate) -> Result<(), StoreError> {
        let mut messages = self.messages.write().await;
        let Some(record) = messages.get_mut(id) else {
            warn!(id = %id, "status update for unknown message ignored");
            return Ok(());
        };

        record.status = update.status;
        if update.provider_message_id.is_some() {
            record.provider_message_id = update.provider_message_id;
        }
        if update.error_code.is_some() {
            record.error_code = update.error_code;
        }
        if update.error_message.is_some() {
            record.error_message = update.error_message;
        }
        if update.sent_at.is_some() {
            record.sent_at = update.sent_at;
        }
        if update.failed_at.is_some() {
            record.failed_at = update.failed_at;
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Message, StoreError> {
        self.messages
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
