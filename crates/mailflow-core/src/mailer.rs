//! Provider boundary
//!
//! Implemented by provider backends (AWS SES in `mailflow-ses`, mocks in
//! tests). Ordinary provider rejections are data (`SendOutcome::Rejected`),
//! not errors; only transport or auth failures surface as `ProviderError`.

use async_trait::async_trait;
use serde::Serialize;

use crate::types::{Message, SendDataPoint};

/// Provider's answer to a send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SendOutcome {
    /// Provider accepted the send and assigned a message id.
    Accepted { message_id: String },
    /// Provider rejected the send (unverified sender, bad address, ...).
    Rejected { code: String, message: String },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    #[error("provider rejected request: {code}: {message}")]
    Rejected { code: String, message: String },

    #[error("failed to build provider request: {0}")]
    BuildRequest(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Attempt an immediate send. Blocking within the provider's own
    /// timeout; no retry wrapping.
    async fn send_now(&self, message: &Message) -> Result<SendOutcome, ProviderError>;

    /// Ask the provider to start verifying `address`. Success means the
    /// request was accepted, not that the address is verified.
    async fn verify_address(&self, address: &str) -> Result<(), ProviderError>;

    /// Time-bucketed send/bounce/complaint/reject counters.
    async fn send_statistics(&self) -> Result<Vec<SendDataPoint>, ProviderError>;
}
