use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskwatchError {
    #[error("Unknown context section: {0}")]
    UnknownSection(String),

    #[error("Invalid value for section {section}: {message}")]
    InvalidSection { section: String, message: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
