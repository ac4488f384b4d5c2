//! Text-generation provider contract.
//!
//! Adapters turn transport failures into a typed [`ProviderFailureKind`] at
//! the point where the HTTP status and error body are known, so nothing
//! downstream has to guess from message text.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

/// One prompt pair sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Structured failure category produced by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFailureKind {
    /// Quota or billing exhausted (HTTP 402, `insufficient_quota`,
    /// `RESOURCE_EXHAUSTED`).
    QuotaExhausted,
    /// Key rejected (HTTP 401/403).
    Unauthorized,
    Timeout,
    /// Network error or unexpected HTTP status.
    Transport,
    /// Response arrived but had no usable text.
    InvalidResponse,
}

/// A failed provider call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{provider}: {message}")]
pub struct ProviderFailure {
    pub provider: &'static str,
    pub kind: ProviderFailureKind,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(
        provider: &'static str,
        kind: ProviderFailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            kind,
            message: message.into(),
        }
    }

    /// Classifies a `reqwest` transport error.
    pub fn from_transport(provider: &'static str, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ProviderFailureKind::Timeout
        } else {
            ProviderFailureKind::Transport
        };
        Self::new(provider, kind, err.to_string())
    }

    /// Classifies a non-success HTTP response from its status and JSON body.
    pub fn from_status(provider: &'static str, status: StatusCode, body: &str) -> Self {
        let detail = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .map(|envelope| envelope.error);
        let quota_marker = detail.as_ref().is_some_and(|d| {
            [d.code.as_deref(), d.kind.as_deref(), d.status.as_deref()]
                .into_iter()
                .flatten()
                .any(|value| QUOTA_MARKERS.contains(&value))
        });

        let kind = match status {
            StatusCode::PAYMENT_REQUIRED => ProviderFailureKind::QuotaExhausted,
            StatusCode::TOO_MANY_REQUESTS if quota_marker => ProviderFailureKind::QuotaExhausted,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderFailureKind::Unauthorized,
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                ProviderFailureKind::Timeout
            }
            _ if quota_marker => ProviderFailureKind::QuotaExhausted,
            _ => ProviderFailureKind::Transport,
        };
        let message = match detail.and_then(|d| d.message) {
            Some(message) => format!("HTTP {}: {message}", status.as_u16()),
            None => format!("HTTP {}", status.as_u16()),
        };
        Self::new(provider, kind, message)
    }
}

const QUOTA_MARKERS: &[&str] = &[
    "insufficient_quota",
    "billing_hard_limit_reached",
    "RESOURCE_EXHAUSTED",
];

/// Error body shape shared by the OpenAI and Gemini APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    code: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    status: Option<String>,
}

/// OpenAI sends `code` as a string, Gemini as a number.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
        None => None,
    })
}

/// A text-generation backend.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Short stable name used in logs.
    fn name(&self) -> &'static str;

    /// Generates a completion for one prompt pair.
    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_required_is_quota_exhausted() {
        let failure = ProviderFailure::from_status("openai", StatusCode::PAYMENT_REQUIRED, "");
        assert_eq!(failure.kind, ProviderFailureKind::QuotaExhausted);
        assert!(failure.message.contains("402"));
    }

    #[test]
    fn rate_limit_with_quota_code_is_quota_exhausted() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        let failure = ProviderFailure::from_status("openai", StatusCode::TOO_MANY_REQUESTS, body);
        assert_eq!(failure.kind, ProviderFailureKind::QuotaExhausted);
        assert!(failure.message.contains("current quota"));
    }

    #[test]
    fn plain_rate_limit_is_transport() {
        let body = r#"{"error":{"message":"slow down","type":"requests","code":"rate_limit_exceeded"}}"#;
        let failure = ProviderFailure::from_status("openai", StatusCode::TOO_MANY_REQUESTS, body);
        assert_eq!(failure.kind, ProviderFailureKind::Transport);
    }

    #[test]
    fn gemini_numeric_code_and_status_are_understood() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let failure = ProviderFailure::from_status("gemini", StatusCode::TOO_MANY_REQUESTS, body);
        assert_eq!(failure.kind, ProviderFailureKind::QuotaExhausted);
    }

    #[test]
    fn unauthorized_is_classified() {
        let failure = ProviderFailure::from_status("gemini", StatusCode::UNAUTHORIZED, "not json");
        assert_eq!(failure.kind, ProviderFailureKind::Unauthorized);
        assert_eq!(failure.message, "HTTP 401");
    }
}
