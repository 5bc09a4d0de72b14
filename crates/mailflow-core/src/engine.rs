//! Dispatch engine
//!
//! Orchestrates store, provider and scheduler: decides immediate vs
//! deferred sending, owns every status transition, and isolates per-row
//! failures in bulk sends.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::generate::{ContentGenerator, GenerateError, GenerateRequest};
use crate::mailer::{Mailer, ProviderError, SendOutcome};
use crate::scheduler::Scheduler;
use crate::store::{MessageStore, NewMessage, StatusUpdate, StoreError};
use crate::template::{RenderedRow, TemplateError};
use crate::types::{
    is_plausible_address, BulkItemReport, BulkOutcome, MessageStatus, SendDataPoint, SendReceipt,
    SendRequest, StatusReport, ValidationError,
};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The send failed after its record was created: the provider
    /// rejected or was unreachable, or the fire time elapsed before job
    /// registration. By the time the caller sees this the record is
    /// already marked FAILED, and `id` stays usable for status polling.
    #[error("send failed ({id}): {code}: {message}")]
    SendFailed {
        id: String,
        code: String,
        message: String,
    },

    /// Provider failure outside the send path (verification, statistics).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// Split a transport-level provider error into the code/message pair
/// recorded on the message.
fn provider_failure(err: &ProviderError) -> (String, String) {
    match err {
        ProviderError::Rejected { code, message } => (code.clone(), message.clone()),
        ProviderError::Unreachable(message) => ("Unreachable".to_string(), message.clone()),
        ProviderError::BuildRequest(message) => ("BuildRequest".to_string(), message.clone()),
    }
}

pub struct DispatchEngine {
    store: Arc<dyn MessageStore>,
    mailer: Arc<dyn Mailer>,
    scheduler: Arc<Scheduler>,
}

impl DispatchEngine {
    /// All collaborators are injected; the scheduler in particular is
    /// the process-wide shared instance, never constructed here.
    pub fn new(
        store: Arc<dyn MessageStore>,
        mailer: Arc<dyn Mailer>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            store,
            mailer,
            scheduler,
        }
    }

    /// Send one message, immediately or at `scheduled_time`.
    ///
    /// Validation failures happen before any record exists. Once a
    /// record is created the caller always gets a pollable id, either in
    /// the receipt or inside the recorded FAILED state.
    #[instrument(skip(self, request), fields(to = ?request.to, subject = %request.subject))]
    pub async fn send(&self, request: SendRequest) -> Result<SendReceipt, EngineError> {
        Self::validate(&request)?;

        if let Some(fire_at) = request.scheduled_time {
            return self.schedule_send(&request, fire_at).await;
        }

        let new_message = NewMessage::pending(&request);
        let id = self.store.create(new_message.clone()).await?;
        let message = new_message.into_message(id.clone());

        match self.mailer.send_now(&message).await {
            Ok(SendOutcome::Accepted { message_id }) => {
                self.store.update(&id, StatusUpdate::sent(&message_id)).await?;
                info!(id = %id, provider_message_id = %message_id, "email sent");
                Ok(SendReceipt {
                    id,
                    status: MessageStatus::Sent,
                    provider_message_id: Some(message_id),
                    scheduled_time: None,
                })
            }
            Ok(SendOutcome::Rejected { code, message }) => {
                self.store
                    .update(&id, StatusUpdate::failed(Some(code.clone()), &message))
                    .await?;
                warn!(id = %id, code = %code, "provider rejected send");
                Err(EngineError::SendFailed { id, code, message })
            }
            Err(err) => {
                let (code, message) = provider_failure(&err);
                self.store
                    .update(&id, StatusUpdate::failed(Some(code.clone()), &message))
                    .await?;
                error!(id = %id, error = %err, "provider call failed");
                Err(EngineError::SendFailed { id, code, message })
            }
        }
    }

    async fn schedule_send(
        &self,
        request: &SendRequest,
        fire_at: DateTime<Utc>,
    ) -> Result<SendReceipt, EngineError> {
        let id = self
            .store
            .create(NewMessage::scheduled(request, fire_at))
            .await?;

        let store = Arc::clone(&self.store);
        let mailer = Arc::clone(&self.mailer);
        let job_id = id.clone();
        if let Err(err) = self
            .scheduler
            .schedule(&id, fire_at, move || fire_scheduled(store, mailer, job_id))
        {
            // The clock can pass `fire_at` between validation and job
            // registration. The record must not stay SCHEDULED with no
            // job behind it, so it fails with a pollable id.
            let message = err.to_string();
            self.store
                .update(&id, StatusUpdate::failed(None, &message))
                .await?;
            warn!(id = %id, fire_at = %fire_at, "fire time elapsed before job registration");
            return Err(EngineError::SendFailed {
                id,
                code: "PastScheduleTime".to_string(),
                message,
            });
        }

        info!(id = %id, fire_at = %fire_at, "email scheduled");
        Ok(SendReceipt {
            id,
            status: MessageStatus::Scheduled,
            provider_message_id: None,
            scheduled_time: Some(fire_at),
        })
    }

    /// Send many pre-rendered rows independently. One bad row never
    /// aborts the batch; results come back in input order, one per row.
    pub async fn send_bulk(
        &self,
        rows: Vec<RenderedRow>,
        recipient_column: &str,
        scheduled_time: Option<DateTime<Utc>>,
    ) -> Vec<BulkItemReport> {
        let mut reports = Vec::with_capacity(rows.len());
        for row in rows {
            reports.push(self.send_bulk_row(row, recipient_column, scheduled_time).await);
        }
        reports
    }

    async fn send_bulk_row(
        &self,
        row: RenderedRow,
        recipient_column: &str,
        scheduled_time: Option<DateTime<Utc>>,
    ) -> BulkItemReport {
        let email = row.row.get(recipient_column).cloned();

        let outcome = match email.as_deref() {
            Some(address) if is_plausible_address(address) => {
                let request = SendRequest {
                    to: vec![address.to_string()],
                    subject: row.subject,
                    body_html: row.body_html,
                    body_text: None,
                    scheduled_time,
                };
                match self.send(request).await {
                    Ok(receipt) => BulkOutcome::Success { receipt },
                    Err(err) => BulkOutcome::Error {
                        error: err.to_string(),
                    },
                }
            }
            Some(address) => BulkOutcome::Error {
                error: format!("invalid email address: {address}"),
            },
            None => BulkOutcome::Error {
                error: format!("missing recipient column: {recipient_column}"),
            },
        };

        BulkItemReport {
            email: email.unwrap_or_else(|| "unknown".to_string()),
            template_values: row.mapping,
            outcome,
        }
    }

    /// Generate content through the collaborator, re-apply variable
    /// substitution, then follow the single-send path.
    pub async fn generate_and_send(
        &self,
        generator: &dyn ContentGenerator,
        to: Vec<String>,
        request: GenerateRequest,
        scheduled_time: Option<DateTime<Utc>>,
    ) -> Result<SendReceipt, EngineError> {
        let mut content = generator.generate(&request).await?;
        content.substitute(&request.variables);

        self.send(SendRequest {
            to,
            subject: content.subject,
            body_html: content.html_body,
            body_text: Some(content.text_body),
            scheduled_time,
        })
        .await
    }

    /// Current status of a message, for polling callers.
    pub async fn status(&self, id: &str) -> Result<StatusReport, EngineError> {
        let message = self.store.get(id).await?;
        Ok(StatusReport {
            status: message.status,
            scheduled_time: message.scheduled_time,
            sent_at: message.sent_at,
            error_message: message.error_message,
        })
    }

    /// Ask the provider to start verifying a sender/recipient address.
    pub async fn verify_address(&self, address: &str) -> Result<(), EngineError> {
        if !is_plausible_address(address) {
            return Err(ValidationError::InvalidRecipient(address.to_string()).into());
        }
        self.mailer.verify_address(address).await?;
        Ok(())
    }

    /// Provider sending statistics passthrough.
    pub async fn send_statistics(&self) -> Result<Vec<SendDataPoint>, EngineError> {
        Ok(self.mailer.send_statistics().await?)
    }

    fn validate(request: &SendRequest) -> Result<(), ValidationError> {
        if request.to.is_empty() {
            return Err(ValidationError::EmptyRecipients);
        }
        for address in &request.to {
            if !is_plausible_address(address) {
                return Err(ValidationError::InvalidRecipient(address.clone()));
            }
        }
        if request.subject.trim().is_empty() {
            return Err(ValidationError::EmptySubject);
        }
        if let Some(fire_at) = request.scheduled_time {
            if fire_at <= Utc::now() {
                return Err(ValidationError::PastScheduleTime);
            }
        }
        Ok(())
    }
}

/// Body of a fired scheduled job. Re-fetches the record so the send
/// reflects the latest persisted state; every failure is recorded on the
/// message and logged, never propagated (there is no caller left).
async fn fire_scheduled(store: Arc<dyn MessageStore>, mailer: Arc<dyn Mailer>, id: String) {
    let message = match store.get(&id).await {
        Ok(message) => message,
        Err(StoreError::NotFound(_)) => {
            warn!(id = %id, "scheduled message no longer exists, skipping");
            return;
        }
        Err(err) => {
            error!(id = %id, error = %err, "failed to fetch scheduled message");
            return;
        }
    };

    let update = match mailer.send_now(&message).await {
        Ok(SendOutcome::Accepted { message_id }) => {
            info!(id = %id, provider_message_id = %message_id, "scheduled email sent");
            StatusUpdate::sent(&message_id)
        }
        Ok(SendOutcome::Rejected { code, message }) => {
            warn!(id = %id, code = %code, "provider rejected scheduled send");
            StatusUpdate::failed(Some(code), &message)
        }
        Err(err) => {
            error!(id = %id, error = %err, "scheduled send failed");
            let (code, message) = provider_failure(&err);
            StatusUpdate::failed(Some(code), &message)
        }
    };

    if let Err(err) = store.update(&id, update).await {
        error!(id = %id, error = %err, "failed to record scheduled send result");
    }
}
