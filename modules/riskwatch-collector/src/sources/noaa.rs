// NWS active weather alerts, filtered to hazards that disrupt freight.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use riskwatch_common::{GeoPoint, SourceKind, SupplyChainEvent};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{field, point_from_position, text_field, CollectRequest, SourceAdapter, SourceBatch};
use crate::classify::map_noaa_severity;
use crate::error::SourceError;
use crate::transport::{ApiRequest, HttpTransport};

pub const ALERTS_URL: &str = "https://api.weather.gov/alerts/active";

/// The NWS API rejects requests without an identifying User-Agent.
pub const USER_AGENT: &str = "SupplyChainAgent/1.0";

/// Alert event names (lowercase substrings) worth turning into events.
pub const RELEVANT_HAZARDS: &[&str] = &[
    "hurricane",
    "typhoon",
    "flood",
    "earthquake",
    "wildfire",
    "tornado",
    "blizzard",
    "ice storm",
];

#[derive(Debug, Deserialize)]
struct AlertCollection {
    #[serde(default)]
    features: Vec<AlertFeature>,
}

#[derive(Debug, Deserialize)]
struct AlertFeature {
    #[serde(default)]
    properties: Map<String, Value>,
    #[serde(default)]
    geometry: Option<Value>,
}

pub struct NoaaAdapter {
    transport: Arc<dyn HttpTransport>,
    url: String,
}

impl NoaaAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            url: ALERTS_URL.to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for NoaaAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Noaa
    }

    async fn collect(&self, request: &CollectRequest) -> Result<SourceBatch, SourceError> {
        tracing::info!(region = request.region.as_deref().unwrap_or(""), "noaa: fetching alerts");

        let mut req = ApiRequest::get(&self.url)
            .header("User-Agent", USER_AGENT);
        if let Some(area) = area_param(request.region.as_deref()) {
            req = req.query("area", area);
        }

        let resp = self.transport.get(req).await?;
        if !resp.is_success() {
            return Err(SourceError::http(resp.status, &resp.body));
        }

        let alerts: AlertCollection = resp.json()?;
        let events = alerts
            .features
            .into_iter()
            .filter_map(alert_to_event)
            .collect();

        Ok(SourceBatch::new(events))
    }
}

/// `area` is sent unless the region is empty or `global`.
fn area_param(region: Option<&str>) -> Option<&str> {
    region
        .map(str::trim)
        .filter(|r| !r.is_empty() && !r.eq_ignore_ascii_case("global"))
}

fn is_relevant(event_name: &str) -> bool {
    RELEVANT_HAZARDS.iter().any(|h| event_name.contains(h))
}

fn alert_to_event(alert: AlertFeature) -> Option<SupplyChainEvent> {
    let props = alert.properties;
    let event_name = text_field(&props, "event").unwrap_or("").to_lowercase();
    if !is_relevant(&event_name) {
        return None;
    }

    let location = alert.geometry.as_ref().and_then(representative_point);
    let severity = map_noaa_severity(text_field(&props, "severity").unwrap_or("unknown"));
    let description = text_field(&props, "headline")
        .unwrap_or("Weather alert")
        .to_string();

    let mut metadata = Map::new();
    metadata.insert("urgency".into(), field(&props, "urgency"));
    metadata.insert("certainty".into(), field(&props, "certainty"));
    metadata.insert("areas".into(), field(&props, "areaDesc"));

    Some(
        SupplyChainEvent::new(
            SourceKind::Noaa,
            format!("weather_{}", event_name.replace(' ', "_")),
            Utc::now(),
        )
        .with_location(location)
        .with_severity(severity)
        .with_description(description)
        .with_metadata(metadata)
        .with_raw_data(Value::Object(props)),
    )
}

/// First position of the geometry: a point's own pair, or the first vertex of
/// the first ring for polygons.
fn representative_point(geometry: &Value) -> Option<GeoPoint> {
    let mut coords = geometry.get("coordinates")?.as_array()?;
    while let Some(Value::Array(inner)) = coords.first() {
        coords = inner;
    }
    point_from_position(coords)
}
