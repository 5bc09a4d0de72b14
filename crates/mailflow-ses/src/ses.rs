//! AWS SES v1 client implementation
//!
//! Uses the classic SES API rather than SESv2 because the identity
//! verification and account statistics operations live there
//! (`VerifyEmailIdentity`, `GetSendStatistics`).

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ses::config::Credentials;
use aws_sdk_ses::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_ses::types::{Body, Content, Destination, Message as SesMessage};
use aws_sdk_ses::Client as SesClient;
use tracing::{error, info, instrument, warn};

use mailflow_core::mailer::{Mailer, ProviderError, SendOutcome};
use mailflow_core::types::{Message, SendDataPoint};

use crate::SesConfig;

/// SES-backed [`Mailer`]
pub struct SesMailer {
    client: SesClient,
    sender: String,
}

impl SesMailer {
    /// Create from explicit credentials.
    pub fn new(config: &SesConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "mailflow-static",
        );
        let ses_config = aws_sdk_ses::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .build();

        Self {
            client: SesClient::from_conf(ses_config),
            sender: config.sender.clone(),
        }
    }

    /// Create from the default AWS credential chain (env, profile, IMDS).
    pub async fn from_defaults(sender: &str) -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self {
            client: SesClient::new(&config),
            sender: sender.to_string(),
        }
    }

    /// Create with a custom client (for testing)
    pub fn with_client(client: SesClient, sender: &str) -> Self {
        Self {
            client,
            sender: sender.to_string(),
        }
    }

    fn build_message(&self, message: &Message) -> Result<SesMessage, ProviderError> {
        let subject = utf8_content(&message.subject)?;

        let mut body = Body::builder().html(utf8_content(&message.body_html)?);
        if let Some(ref text) = message.body_text {
            body = body.text(utf8_content(text)?);
        }

        Ok(SesMessage::builder()
            .subject(subject)
            .body(body.build())
            .build())
    }
}

fn utf8_content(data: &str) -> Result<Content, ProviderError> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| ProviderError::BuildRequest(e.to_string()))
}

#[async_trait]
impl Mailer for SesMailer {
    #[instrument(skip(self, message), fields(id = %message.id, to = ?message.to))]
    async fn send_now(&self, message: &Message) -> Result<SendOutcome, ProviderError> {
        let mut destination = Destination::builder();
        for to in &message.to {
            destination = destination.to_addresses(to);
        }

        let result = self
            .client
            .send_email()
            .source(&self.sender)
            .destination(destination.build())
            .message(self.build_message(message)?)
            .send()
            .await;

        match result {
            Ok(output) => {
                let message_id = output.message_id().to_string();
                info!(provider_message_id = %message_id, "SES accepted message");
                Ok(SendOutcome::Accepted { message_id })
            }
            Err(SdkError::ServiceError(ctx)) => {
                let err = ctx.err();
                let code = err.code().unwrap_or("ServiceError").to_string();
                let text = err.message().unwrap_or("send rejected").to_string();
                warn!(code = %code, message = %text, "SES rejected message");
                Ok(SendOutcome::Rejected {
                    code,
                    message: text,
                })
            }
            Err(e) => {
                error!(error = %e, "SES send failed");
                Err(ProviderError::Unreachable(e.to_string()))
            }
        }
    }

    #[instrument(skip(self))]
    async fn verify_address(&self, address: &str) -> Result<(), ProviderError> {
        self.client
            .verify_email_identity()
            .email_address(address)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        info!(email = %address, "Verification email requested");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn send_statistics(&self) -> Result<Vec<SendDataPoint>, ProviderError> {
        let output = self
            .client
            .get_send_statistics()
            .send()
            .await
            .map_err(classify_sdk_error)?;

        Ok(output
            .send_data_points()
            .iter()
            .map(convert_data_point)
            .collect())
    }
}

fn classify_sdk_error<E>(err: SdkError<E>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match &err {
        SdkError::ServiceError(ctx) => ProviderError::Rejected {
            code: ctx.err().code().unwrap_or("ServiceError").to_string(),
            message: ctx.err().message().unwrap_or_default().to_string(),
        },
        _ => ProviderError::Unreachable(err.to_string()),
    }
}

fn convert_data_point(point: &aws_sdk_ses::types::SendDataPoint) -> SendDataPoint {
    SendDataPoint {
        timestamp: point
            .timestamp()
            .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
        delivery_attempts: point.delivery_attempts(),
        bounces: point.bounces(),
        complaints: point.complaints(),
        rejects: point.rejects(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ses::primitives::DateTime as SesDateTime;

    // Send-path tests belong in integration tests against localstack;
    // here we cover the pure conversion and build helpers.

    #[test]
    fn data_point_conversion_preserves_counters() {
        let raw = aws_sdk_ses::types::SendDataPoint::builder()
            .timestamp(SesDateTime::from_secs(1_700_000_000))
            .delivery_attempts(12)
            .bounces(1)
            .complaints(0)
            .rejects(2)
            .build();

        let point = convert_data_point(&raw);
        assert_eq!(point.delivery_attempts, 12);
        assert_eq!(point.bounces, 1);
        assert_eq!(point.complaints, 0);
        assert_eq!(point.rejects, 2);
        let ts = point.timestamp.unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
    }

    #[test]
    fn data_point_without_counters_defaults_to_zero() {
        let raw = aws_sdk_ses::types::SendDataPoint::builder().build();
        let point = convert_data_point(&raw);
        assert!(point.timestamp.is_none());
        assert_eq!(point.delivery_attempts, 0);
    }

    #[test]
    fn message_body_includes_text_part_when_present() {
        let mailer = SesMailer::with_client(
            SesClient::from_conf(
                aws_sdk_ses::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .region(Region::new("us-east-1"))
                    .credentials_provider(Credentials::new("akid", "secret", None, None, "test"))
                    .build(),
            ),
            "sender@example.com",
        );

        let message = Message {
            id: "m-1".to_string(),
            to: vec!["dest@example.com".to_string()],
            subject: "Hello".to_string(),
            body_html: "<p>Hi</p>".to_string(),
            body_text: Some("Hi".to_string()),
            scheduled_time: None,
            status: mailflow_core::types::MessageStatus::Pending,
            created_at: chrono::Utc::now(),
            provider_message_id: None,
            error_code: None,
            error_message: None,
            sent_at: None,
            failed_at: None,
        };

        let built = mailer.build_message(&message).unwrap();
        let body = built.body().unwrap();
        assert!(body.text().is_some());
        assert!(body.html().is_some());
    }
}
