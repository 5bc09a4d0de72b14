//! Message model and request/response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle status of a message.
///
/// `Sent` and `Failed` are terminal. The string forms (`PENDING`, ...) are
/// part of the persisted record contract and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Pending,
    Scheduled,
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "PENDING",
            MessageStatus::Scheduled => "SCHEDULED",
            MessageStatus::Sent => "SENT",
            MessageStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(MessageStatus::Pending),
            "SCHEDULED" => Some(MessageStatus::Scheduled),
            "SENT" => Some(MessageStatus::Sent),
            "FAILED" => Some(MessageStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Sent | MessageStatus::Failed)
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One addressed send attempt and its persisted lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned id, immutable after creation
    pub id: String,

    /// Recipient addresses (non-empty)
    pub to: Vec<String>,

    pub subject: String,
    pub body_html: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,

    /// Deferred send instant, always UTC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,

    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,

    /// Provider message id, set only on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
}

/// Request to send a single message, now or at a future instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    pub to: Vec<String>,
    pub subject: String,
    pub body_html: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,

    /// When set, the send is deferred until this instant. Offsets in the
    /// serialized form are normalized to UTC on deserialization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// Result of accepting a send: an id the caller can poll for status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub id: String,
    pub status: MessageStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// Point-in-time status of a message, for polling callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: MessageStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// One time-bucketed counter row from the provider's sending statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendDataPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub delivery_attempts: i64,
    pub bounces: i64,
    pub complaints: i64,
    pub rejects: i64,
}

/// Per-row result of a bulk send, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BulkItemReport {
    /// Recipient address from the row, or "unknown" if the column was absent
    pub email: String,

    /// The row's resolved placeholder mapping, for correlation by the caller
    pub template_values: HashMap<String, String>,

    #[serde(flatten)]
    pub outcome: BulkOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BulkOutcome {
    Success {
        #[serde(flatten)]
        receipt: SendReceipt,
    },
    Error {
        error: String,
    },
}

impl BulkItemReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BulkOutcome::Success { .. })
    }
}

/// Input validation errors. Always synchronous; raised before any record
/// is created, so they are never persisted as a failed message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("scheduled time must be in the future")]
    PastScheduleTime,

    #[error("invalid email address: {0}")]
    InvalidRecipient(String),

    #[error("at least one recipient is required")]
    EmptyRecipients,

    #[error("subject must not be empty")]
    EmptySubject,
}

/// Minimal address check: presence of '@'. Intentionally not an RFC
/// grammar; the provider performs its own validation on send.
pub fn is_plausible_address(address: &str) -> bool {
    address.contains('@')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            MessageStatus::Pending,
            MessageStatus::Scheduled,
            MessageStatus::Sent,
            MessageStatus::Failed,
        ] {
            assert_eq!(MessageStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MessageStatus::parse("DELIVERED"), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(MessageStatus::Sent.is_terminal());
        assert!(MessageStatus::Failed.is_terminal());
        assert!(!MessageStatus::Pending.is_terminal());
        assert!(!MessageStatus::Scheduled.is_terminal());
    }

    #[test]
    fn scheduled_time_deserializes_to_utc() {
        let request: SendRequest = serde_json::from_str(
            r#"{
                "to": ["a@example.com"],
                "subject": "Hi",
                "body_html": "<p>Hi</p>",
                "scheduled_time": "2026-01-01T12:00:00+02:00"
            }"#,
        )
        .unwrap();

        let scheduled = request.scheduled_time.unwrap();
        assert_eq!(scheduled.to_rfc3339(), "2026-01-01T10:00:00+00:00");
    }

    #[test]
    fn plausible_address_is_at_sign_only() {
        assert!(is_plausible_address("a@b"));
        assert!(!is_plausible_address("not-an-address"));
    }
}
