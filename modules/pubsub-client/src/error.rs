use thiserror::Error;

pub type Result<T> = std::result::Result<T, PubSubError>;

#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Publish returned no message id")]
    EmptyResponse,
}

impl From<reqwest::Error> for PubSubError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PubSubError::Timeout(err.to_string())
        } else {
            PubSubError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PubSubError {
    fn from(err: serde_json::Error) -> Self {
        PubSubError::Parse(err.to_string())
    }
}
