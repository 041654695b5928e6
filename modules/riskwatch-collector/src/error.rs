//! Typed failures of one source adapter call.

use riskwatch_common::ApiStatus;
use thiserror::Error;

/// Why a source produced no result. Each variant maps to exactly one
/// connectivity state in the context store.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Credential missing; the source is skipped, not failed.
    #[error("{0} not configured")]
    NotConfigured(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    RateLimited(String),

    /// The endpoint answered with something other than JSON (throttle page).
    #[error("{0}")]
    ApiLimit(String),

    #[error("{0}")]
    AuthFailed(String),

    #[error("API request failed: {status}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl SourceError {
    pub fn api_status(&self) -> ApiStatus {
        match self {
            SourceError::NotConfigured(_) => ApiStatus::NotConfigured,
            SourceError::Timeout(_) => ApiStatus::Timeout,
            SourceError::RateLimited(_) => ApiStatus::RateLimited,
            SourceError::ApiLimit(_) => ApiStatus::ApiLimit,
            SourceError::AuthFailed(_) => ApiStatus::AuthFailed,
            SourceError::Http { .. } | SourceError::Transport(_) | SourceError::Parse(_) => {
                ApiStatus::Error
            }
        }
    }

    pub fn http(status: u16, body: &str) -> Self {
        SourceError::Http {
            status,
            message: body.chars().take(200).collect(),
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_failure_maps_to_one_status() {
        assert_eq!(
            SourceError::NotConfigured("FRED API key".into()).api_status(),
            ApiStatus::NotConfigured
        );
        assert_eq!(SourceError::http(503, "").api_status(), ApiStatus::Error);
        assert_eq!(
            SourceError::ApiLimit("html".into()).api_status(),
            ApiStatus::ApiLimit
        );
    }

    #[test]
    fn http_message_names_the_status() {
        assert_eq!(SourceError::http(500, "boom").to_string(), "API request failed: 500");
        assert_eq!(
            SourceError::NotConfigured("FRED API key".into()).to_string(),
            "FRED API key not configured"
        );
    }
}
