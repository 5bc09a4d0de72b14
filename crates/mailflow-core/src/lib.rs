//! Templated bulk email dispatch and scheduling engine
//!
//! This crate turns rows of personalization data into per-recipient
//! emails, sends them now or at a future instant, and durably records
//! each message's lifecycle so status stays queryable:
//!
//! - [`template`] - literal `{name}` substitution against an explicit
//!   placeholder list, validated with a complete missing-column report
//! - [`store`] / [`sqlite_store`] - the persisted message record and its
//!   four-state lifecycle (`PENDING`/`SCHEDULED`/`SENT`/`FAILED`)
//! - [`scheduler`] - process-wide deferred job execution, one pending
//!   job per message id
//! - [`mailer`] - provider boundary trait; AWS SES lives in the
//!   `mailflow-ses` crate
//! - [`engine`] - the orchestrator: immediate vs deferred dispatch,
//!   bulk sends with per-row failure isolation, generation-assisted
//!   sends, and status polling
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use mailflow_core::{DispatchEngine, MemoryStore, Scheduler, SendRequest};
//! # use mailflow_core::{Mailer, ProviderError, SendOutcome};
//! # use mailflow_core::types::{Message, SendDataPoint};
//! # struct NullMailer;
//! # #[async_trait::async_trait]
//! # impl Mailer for NullMailer {
//! #     async fn send_now(&self, _: &Message) -> Result<SendOutcome, ProviderError> {
//! #         Ok(SendOutcome::Accepted { message_id: "m".into() })
//! #     }
//! #     async fn verify_address(&self, _: &str) -> Result<(), ProviderError> { Ok(()) }
//! #     async fn send_statistics(&self) -> Result<Vec<SendDataPoint>, ProviderError> { Ok(vec![]) }
//! # }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = Scheduler::new();
//! let engine = DispatchEngine::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(NullMailer),
//!     scheduler,
//! );
//!
//! let receipt = engine
//!     .send(SendRequest {
//!         to: vec!["user@example.com".into()],
//!         subject: "Welcome".into(),
//!         body_html: "<p>Hello!</p>".into(),
//!         body_text: None,
//!         scheduled_time: None,
//!     })
//!     .await?;
//! println!("message {} is {}", receipt.id, receipt.status);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod generate;
pub mod mailer;
pub mod scheduler;
pub mod sqlite_store;
pub mod store;
pub mod template;
pub mod types;

pub use engine::{DispatchEngine, EngineError};
pub use generate::{ContentGenerator, GenerateError, GenerateRequest, GeneratedContent};
pub use mailer::{Mailer, ProviderError, SendOutcome};
pub use scheduler::Scheduler;
pub use sqlite_store::SqliteStore;
pub use store::{MemoryStore, MessageStore, NewMessage, StatusUpdate, StoreError};
pub use template::{render, render_rows, substitute, RenderedRow, TemplateError};
pub use types::{
    is_plausible_address, BulkItemReport, BulkOutcome, Message, MessageStatus, SendDataPoint,
    SendReceipt, SendRequest, StatusReport, ValidationError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
