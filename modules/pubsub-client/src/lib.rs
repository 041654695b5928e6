pub mod error;
pub mod types;

pub use error::{PubSubError, Result};
pub use types::{PublishRequest, PublishResponse, PubsubMessage};

use std::time::Duration;

const BASE_URL: &str = "https://pubsub.googleapis.com";

/// Default per-request timeout for publish calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct PubSubClient {
    client: reqwest::Client,
    base_url: String,
    topic_path: String,
    token: Option<String>,
}

impl PubSubClient {
    /// Client for the production endpoint, authenticated with an OAuth access token.
    pub fn new(project_id: &str, topic: &str, access_token: String) -> Result<Self> {
        Self::build(BASE_URL.to_string(), project_id, topic, Some(access_token))
    }

    /// Client for a local Pub/Sub emulator (`PUBSUB_EMULATOR_HOST`). No auth.
    pub fn emulator(host: &str, project_id: &str, topic: &str) -> Result<Self> {
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", host.trim_end_matches('/'))
        };
        Self::build(base, project_id, topic, None)
    }

    fn build(
        base_url: String,
        project_id: &str,
        topic: &str,
        token: Option<String>,
    ) -> Result<Self> {
        if project_id.trim().is_empty() {
            return Err(PubSubError::Config("project id is empty".into()));
        }
        if topic.trim().is_empty() {
            return Err(PubSubError::Config("topic name is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PubSubError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            topic_path: topic_path(project_id, topic),
            token,
        })
    }

    /// Fully-qualified topic name: `projects/{project}/topics/{topic}`.
    pub fn topic_path(&self) -> &str {
        &self.topic_path
    }

    /// Publish one payload. Returns the server-assigned message id.
    pub async fn publish(&self, payload: &[u8]) -> Result<String> {
        let ids = self
            .publish_messages(vec![PubsubMessage::from_bytes(payload)])
            .await?;
        ids.into_iter().next().ok_or(PubSubError::EmptyResponse)
    }

    /// Publish a batch of messages in one request. Ids come back in message order.
    pub async fn publish_messages(&self, messages: Vec<PubsubMessage>) -> Result<Vec<String>> {
        let count = messages.len();
        let url = format!("{}/v1/{}:publish", self.base_url, self.topic_path);
        let mut req = self.client.post(&url).json(&PublishRequest { messages });
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PubSubError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        let parsed: PublishResponse = serde_json::from_str(&body)?;
        tracing::debug!(topic = %self.topic_path, count, ids = parsed.message_ids.len(), "Published messages");
        Ok(parsed.message_ids)
    }
}

pub fn topic_path(project_id: &str, topic: &str) -> String {
    format!("projects/{}/topics/{}", project_id.trim(), topic.trim())
}
