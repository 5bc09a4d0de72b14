//! AWS SES backend for the mailflow dispatch engine
//!
//! Implements the core [`Mailer`](mailflow_core::Mailer) boundary on top
//! of the SES `SendEmail` / `VerifyEmailIdentity` / `GetSendStatistics`
//! operations. Ordinary SES rejections (unverified sender, malformed
//! address) come back as `SendOutcome::Rejected` with the service error
//! code; only transport-level failures surface as `ProviderError`.

pub mod ses;

pub use ses::SesMailer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Provider credentials and sender identity, supplied once at
/// construction and not re-validated per call.
#[derive(Debug, Clone)]
pub struct SesConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    /// Verified sender address used as the `Source` of every send
    pub sender: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingVar(&'static str),
}

impl SesConfig {
    /// Load from environment variables. `AWS_REGION` defaults to
    /// `us-east-1`; everything else is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            access_key_id: require("AWS_ACCESS_KEY_ID")?,
            secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            sender: require("SENDER_EMAIL")?,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_vars_are_named() {
        // Serialize access to the process environment across tests.
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::remove_var("AWS_ACCESS_KEY_ID");

        let err = SesConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("AWS_ACCESS_KEY_ID")));
    }

    #[test]
    fn region_defaults_and_others_load() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("AWS_ACCESS_KEY_ID", "AKIA_TEST");
        std::env::set_var("AWS_SECRET_ACCESS_KEY", "secret");
        std::env::remove_var("AWS_REGION");
        std::env::set_var("SENDER_EMAIL", "noreply@example.com");

        let config = SesConfig::from_env().unwrap();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.sender, "noreply@example.com");

        std::env::remove_var("AWS_ACCESS_KEY_ID");
        std::env::remove_var("AWS_SECRET_ACCESS_KEY");
        std::env::remove_var("SENDER_EMAIL");
    }

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
}
