//! Content-generation collaborator boundary
//!
//! The generator itself is external; this module owns the contract and
//! the validation of its payloads. Generated content is re-substituted
//! with the row's variables before sending, which is safe because
//! substitution on token-free text is a no-op.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::template;

/// Inputs for content generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Email context / purpose
    pub situation: String,
    /// Key points to include
    pub keywords: Vec<String>,
    /// Personalization variables from the source row
    pub variables: HashMap<String, String>,
}

/// Validated generator output. All three fields are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerateError {
    #[error("malformed generator payload: {0}")]
    Malformed(String),

    #[error("generator payload missing field: {0}")]
    MissingField(&'static str),

    #[error("generator payload field is empty: {0}")]
    EmptyField(&'static str),

    #[error("generator request failed: {0}")]
    Request(String),
}

impl GeneratedContent {
    /// Parse and validate a raw generator payload: a JSON object with
    /// non-empty string fields `subject`, `html_body` and `text_body`,
    /// possibly wrapped in markdown code fences. Literal `\n` sequences
    /// in the text body become real newlines.
    pub fn from_json(raw: &str) -> Result<Self, GenerateError> {
        let cleaned = strip_code_fences(raw);
        let value: serde_json::Value = serde_json::from_str(&cleaned)
            .map_err(|e| GenerateError::Malformed(e.to_string()))?;

        let field = |name: &'static str| -> Result<String, GenerateError> {
            match value.get(name) {
                None => Err(GenerateError::MissingField(name)),
                Some(serde_json::Value::String(s)) if s.trim().is_empty() => {
                    Err(GenerateError::EmptyField(name))
                }
                Some(serde_json::Value::String(s)) => Ok(s.trim().to_string()),
                Some(_) => Err(GenerateError::Malformed(format!(
                    "field {name} must be a string"
                ))),
            }
        };

        Ok(Self {
            subject: field("subject")?,
            html_body: field("html_body")?,
            text_body: field("text_body")?.replace("\\n", "\n"),
        })
    }

    /// Re-apply literal placeholder substitution to every part. Safe to
    /// call even when the generator already substituted the variables.
    pub fn substitute(&mut self, variables: &HashMap<String, String>) {
        self.subject = template::substitute(&self.subject, variables);
        self.html_body = template::substitute(&self.html_body, variables);
        self.text_body = template::substitute(&self.text_body, variables);
    }
}

fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// External collaborator producing subject/html/text for a situation.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerateRequest)
        -> Result<GeneratedContent, GenerateError>;
}
