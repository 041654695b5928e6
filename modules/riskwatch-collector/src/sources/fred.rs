// FRED economic series, flagged on large period-over-period moves.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use riskwatch_common::{GeoPoint, Severity, SourceKind, SupplyChainEvent};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{CollectRequest, SourceAdapter, SourceBatch};
use crate::error::SourceError;
use crate::pacing::RateLimiter;
use crate::transport::{ApiRequest, HttpTransport};

pub const OBSERVATIONS_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

/// Absolute percent change above which an indicator move is high severity.
pub const HIGH_CHANGE_PCT: f64 = 5.0;

/// Geographic centre of the contiguous United States.
pub const US_CENTROID: GeoPoint = GeoPoint {
    lat: 39.8283,
    lon: -98.5795,
};

#[derive(Debug, Clone, Copy)]
pub struct Indicator {
    pub series_id: &'static str,
    pub name: &'static str,
}

pub const INDICATORS: [Indicator; 2] = [
    Indicator {
        series_id: "CPIAUCSL",
        name: "Consumer Price Index",
    },
    Indicator {
        series_id: "UNRATE",
        name: "Unemployment Rate",
    },
];

#[derive(Debug, Deserialize)]
struct ObservationList {
    #[serde(default)]
    observations: Vec<Map<String, Value>>,
}

pub struct FredAdapter {
    transport: Arc<dyn HttpTransport>,
    api_key: Option<String>,
    pacing: Arc<RateLimiter>,
    url: String,
}

impl FredAdapter {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api_key: Option<String>,
        pacing: Arc<RateLimiter>,
    ) -> Self {
        Self {
            transport,
            api_key,
            pacing,
            url: OBSERVATIONS_URL.to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for FredAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Fred
    }

    async fn collect(&self, request: &CollectRequest) -> Result<SourceBatch, SourceError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::NotConfigured("FRED API key".into()))?;
        let threshold = request.change_threshold;

        let mut events = Vec::new();
        let mut failure: Option<SourceError> = None;
        for indicator in &INDICATORS {
            self.pacing.acquire().await;

            let req = ApiRequest::get(&self.url)
                .query("series_id", indicator.series_id)
                .query("api_key", key)
                .query("file_type", "json")
                .query("limit", 5)
                .query("sort_order", "desc");

            let resp = self.transport.get(req).await?;
            match resp.status {
                400 => {
                    tracing::warn!(series = indicator.series_id, "fred: invalid series id");
                    continue;
                }
                _ if !resp.is_success() => {
                    tracing::error!(series = indicator.series_id, status = resp.status, "fred: request failed");
                    failure.get_or_insert_with(|| SourceError::http(resp.status, &resp.body));
                    continue;
                }
                _ => {}
            }

            let list: ObservationList = resp.json()?;
            let [latest, prior, ..] = list.observations.as_slice() else {
                tracing::debug!(series = indicator.series_id, "fred: fewer than two observations");
                continue;
            };

            match percent_change(latest, prior) {
                Ok(change) => {
                    if let Some(event) = indicator_event(indicator, &change, threshold, latest) {
                        events.push(event);
                    }
                }
                Err(reason) => {
                    tracing::warn!(series = indicator.series_id, %reason, "fred: skipping indicator");
                }
            }
        }

        // Remaining series are still queried, but one failed request fails the source.
        if let Some(err) = failure {
            return Err(err);
        }

        Ok(SourceBatch::new(events)
            .with_detail("indicators_checked", INDICATORS.len())
            .with_detail("change_threshold", threshold))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub current: f64,
    pub previous: f64,
    pub percent: f64,
}

/// Percent change from the prior to the latest observation. Missing values
/// (FRED reports them as ".") and a zero prior are errors.
pub fn percent_change(
    latest: &Map<String, Value>,
    prior: &Map<String, Value>,
) -> Result<Change, String> {
    let current = observation_value(latest)?;
    let previous = observation_value(prior)?;
    if previous == 0.0 {
        return Err("previous value is zero".into());
    }
    Ok(Change {
        current,
        previous,
        percent: (current - previous) / previous * 100.0,
    })
}

fn observation_value(obs: &Map<String, Value>) -> Result<f64, String> {
    let raw = obs.get("value").ok_or("observation has no value")?;
    super::as_f64(Some(raw)).ok_or_else(|| format!("non-numeric value {raw}"))
}

/// An event when the absolute change exceeds `threshold` percent.
pub fn indicator_event(
    indicator: &Indicator,
    change: &Change,
    threshold: f64,
    latest: &Map<String, Value>,
) -> Option<SupplyChainEvent> {
    let magnitude = change.percent.abs();
    if magnitude <= threshold {
        return None;
    }
    let severity = if magnitude > HIGH_CHANGE_PCT {
        Severity::High
    } else {
        Severity::Medium
    };

    let mut metadata = Map::new();
    metadata.insert("indicator_name".into(), json!(indicator.name));
    metadata.insert("series_id".into(), json!(indicator.series_id));
    metadata.insert("current_value".into(), json!(change.current));
    metadata.insert("previous_value".into(), json!(change.previous));
    metadata.insert("change_percent".into(), json!(change.percent));

    Some(
        SupplyChainEvent::new(SourceKind::Fred, "economic_indicator", Utc::now())
            .with_location(Some(US_CENTROID))
            .with_severity(severity)
            .with_description(format!(
                "Significant change in {}: {:.2}%",
                indicator.name, change.percent
            ))
            .with_metadata(metadata)
            .with_raw_data(Value::Object(latest.clone())),
    )
}
