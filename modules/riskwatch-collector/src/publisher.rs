use std::sync::Arc;

use chrono::Utc;
use riskwatch_common::{ContextStore, PublishReport, SupplyChainEvent};
use tracing::{error, info, warn};

use crate::pacing::RateLimiter;
use crate::traits::EventSink;

pub const NOT_INITIALIZED: &str = "Pub/Sub publisher not initialized";

/// Sends events to the outbound stream one message per event, in batches.
/// Failures are counted per event and never retried.
pub struct Publisher {
    sink: Option<Arc<dyn EventSink>>,
    pacing: Arc<RateLimiter>,
}

impl Publisher {
    pub fn new(sink: Option<Arc<dyn EventSink>>, pacing: Arc<RateLimiter>) -> Self {
        Self { sink, pacing }
    }

    /// A publisher whose sink failed to initialize. Every call fails fast.
    pub fn disabled() -> Self {
        Self::new(None, Arc::new(RateLimiter::unlimited()))
    }

    pub async fn publish(
        &self,
        events: &[SupplyChainEvent],
        batch_size: usize,
        store: &mut ContextStore,
    ) -> PublishReport {
        if events.is_empty() {
            return PublishReport::Warning {
                message: "No events provided for publishing".into(),
            };
        }
        let Some(sink) = &self.sink else {
            warn!(events = events.len(), "Pub/Sub publisher not initialized");
            return PublishReport::Error {
                message: NOT_INITIALIZED.into(),
                total_events: events.len(),
            };
        };

        info!(events = events.len(), topic = sink.destination(), "Publishing events");

        let mut published = 0usize;
        let mut failed = 0usize;
        // The bucket starts full, so only the gaps between batches wait.
        for batch in events.chunks(batch_size.max(1)) {
            self.pacing.acquire().await;
            for event in batch {
                let payload = match serde_json::to_vec(event) {
                    Ok(p) => p,
                    Err(e) => {
                        error!(error = %e, source = %event.source, "Failed to serialize event");
                        failed += 1;
                        continue;
                    }
                };
                match sink.send(payload).await {
                    Ok(_) => published += 1,
                    Err(e) => {
                        error!(error = %e, source = %event.source, "Failed to publish event");
                        failed += 1;
                    }
                }
            }
        }

        store.set_stat("total_published", published as i64);
        store.set_stat("total_failed", failed as i64);
        info!(published, failed, "Publish complete");

        PublishReport::Success {
            events_published: published,
            events_failed: failed,
            total_events: events.len(),
            topic: sink.destination().to_string(),
            timestamp: Utc::now(),
        }
    }
}
