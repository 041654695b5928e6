// Source adapters: one per upstream API.
//
// Each adapter turns one request cycle against its API into a SourceBatch or
// a SourceError. `fetch` is the only place that converts that outcome into an
// envelope and writes connectivity state, so adapters stay free of store
// bookkeeping.

pub mod fred;
pub mod gdelt;
pub mod marinetraffic;
pub mod noaa;
pub mod twitter;

use std::sync::Arc;

use async_trait::async_trait;
use riskwatch_common::{
    ApiStatus, AppConfig, ContextStore, GeoPoint, SourceEnvelope, SourceKind, SupplyChainEvent,
};
use serde_json::{Map, Value};
use tracing::{error, info, warn};
use typed_builder::TypedBuilder;

use crate::error::SourceError;
use crate::pacing::Pacing;
use crate::transport::HttpTransport;

pub use fred::FredAdapter;
pub use gdelt::GdeltAdapter;
pub use marinetraffic::MarineTrafficAdapter;
pub use noaa::NoaaAdapter;
pub use twitter::TwitterAdapter;

/// Per-call filter parameters. Each adapter reads the fields it understands.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CollectRequest {
    /// Weather alert area (e.g. a state code). Empty or `global` means everywhere.
    #[builder(default, setter(strip_option, into))]
    pub region: Option<String>,
    #[builder(default = "24h".to_string(), setter(into))]
    pub timespan: String,
    #[builder(default = 100)]
    pub max_records: usize,
    /// Percent change an indicator must exceed to become an event.
    #[builder(default = 2.0)]
    pub change_threshold: f64,
    #[builder(default)]
    pub include_retweets: bool,
}

impl Default for CollectRequest {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// What a successful adapter call produced.
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    pub events: Vec<SupplyChainEvent>,
    /// Adapter-specific extras surfaced in the success envelope.
    pub details: Map<String, Value>,
}

impl SourceBatch {
    pub fn new(events: Vec<SupplyChainEvent>) -> Self {
        Self {
            events,
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn collect(&self, request: &CollectRequest) -> Result<SourceBatch, SourceError>;
}

/// Run one adapter and fold the outcome into an envelope, recording the
/// source's connectivity state and event count in the store. Never fails.
pub async fn fetch(
    adapter: &dyn SourceAdapter,
    request: &CollectRequest,
    store: &mut ContextStore,
) -> SourceEnvelope {
    let kind = adapter.kind();
    match adapter.collect(request).await {
        Ok(batch) => {
            let count = batch.events.len();
            store.set_api_status(kind, ApiStatus::Connected);
            store.set_stat(kind.stats_key(), count as i64);
            info!(source = %kind, events = count, "Source collected");
            SourceEnvelope::success(kind, batch.events, batch.details)
        }
        Err(e) => {
            let status = e.api_status();
            match status {
                ApiStatus::NotConfigured | ApiStatus::RateLimited | ApiStatus::ApiLimit => {
                    warn!(source = %kind, %status, error = %e, "Source unavailable")
                }
                _ => error!(source = %kind, %status, error = %e, "Source failed"),
            }
            store.set_api_status(kind, status);
            SourceEnvelope::error(kind, status, e.to_string())
        }
    }
}

/// Build the five production adapters. Missing credentials are passed through
/// as `None`; those adapters report `not_configured` when called.
pub fn adapters_from_config(
    config: &AppConfig,
    transport: Arc<dyn HttpTransport>,
    pacing: &Pacing,
) -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(NoaaAdapter::new(transport.clone())),
        Arc::new(GdeltAdapter::new(transport.clone())),
        Arc::new(MarineTrafficAdapter::new(
            transport.clone(),
            config.marinetraffic_api_key.clone(),
            pacing.ports.clone(),
        )),
        Arc::new(FredAdapter::new(
            transport.clone(),
            config.fred_api_key.clone(),
            pacing.series.clone(),
        )),
        Arc::new(TwitterAdapter::new(
            transport,
            config.twitter_bearer_token.clone(),
        )),
    ]
}

// --- Shared JSON helpers ---

/// Read a float from a number or numeric string.
pub(crate) fn as_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn field(map: &Map<String, Value>, key: &str) -> Value {
    map.get(key).cloned().unwrap_or(Value::Null)
}

pub(crate) fn text_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Build a point from a GeoJSON position, which is `[lon, lat, ...]`.
pub(crate) fn point_from_position(position: &[Value]) -> Option<GeoPoint> {
    match position {
        [lon, lat, ..] => Some(GeoPoint::new(lat.as_f64()?, lon.as_f64()?)),
        _ => None,
    }
}
