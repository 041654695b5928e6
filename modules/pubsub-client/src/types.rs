use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// A single message in a `topics.publish` request.
/// `data` is the base64 encoding of the payload bytes.
#[derive(Debug, Clone, Serialize)]
pub struct PubsubMessage {
    pub data: String,
}

impl PubsubMessage {
    pub fn from_bytes(payload: &[u8]) -> Self {
        Self {
            data: STANDARD.encode(payload),
        }
    }
}

/// Body of `POST projects/{project}/topics/{topic}:publish`.
#[derive(Debug, Clone, Serialize)]
pub struct PublishRequest {
    pub messages: Vec<PubsubMessage>,
}

/// Response of `topics.publish`: one server-assigned id per message, in order.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishResponse {
    #[serde(rename = "messageIds", default)]
    pub message_ids: Vec<String>,
}
