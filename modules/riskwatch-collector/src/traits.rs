// Outbound seam: where serialized events go.
//
// EventSink abstracts the message stream so the publisher can be exercised
// with MemorySink in tests. PubSubSink is the production implementation.

use anyhow::Result;
use async_trait::async_trait;
use pubsub_client::PubSubClient;

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Destination name reported back to callers (the topic).
    fn destination(&self) -> &str;

    /// Send one serialized event. Returns the stream's message id.
    async fn send(&self, payload: Vec<u8>) -> Result<String>;
}

pub struct PubSubSink {
    client: PubSubClient,
    topic: String,
}

impl PubSubSink {
    pub fn new(client: PubSubClient, topic: &str) -> Self {
        Self {
            client,
            topic: topic.to_string(),
        }
    }
}

#[async_trait]
impl EventSink for PubSubSink {
    fn destination(&self) -> &str {
        &self.topic
    }

    async fn send(&self, payload: Vec<u8>) -> Result<String> {
        Ok(self.client.publish(&payload).await?)
    }
}
