// MarineTraffic vessel export, used as a port congestion signal.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use riskwatch_common::{GeoPoint, Severity, SourceKind, SupplyChainEvent};
use serde_json::{json, Map, Value};

use super::{CollectRequest, SourceAdapter, SourceBatch};
use crate::error::SourceError;
use crate::pacing::RateLimiter;
use crate::transport::{ApiRequest, HttpTransport};

pub const API_BASE: &str = "https://services.marinetraffic.com";

/// Vessels in the box above which a port counts as congested.
pub const CONGESTION_THRESHOLD: usize = 50;
/// Vessels in the box above which congestion is high severity.
pub const HIGH_CONGESTION_THRESHOLD: usize = 100;
/// Half-width of the bounding box around each port, in degrees.
pub const BOX_HALF_WIDTH: f64 = 0.1;
/// Only this many ports are queried per call, to stay inside API credits.
pub const PORTS_QUERIED: usize = 2;
/// Vessels kept in `raw_data` per congestion event.
const SAMPLE_VESSELS: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct Port {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

pub const MONITORED_PORTS: [Port; 3] = [
    Port {
        name: "Shanghai",
        lat: 31.2304,
        lon: 121.4737,
    },
    Port {
        name: "Singapore",
        lat: 1.2966,
        lon: 103.7764,
    },
    Port {
        name: "Rotterdam",
        lat: 51.9244,
        lon: 4.4777,
    },
];

pub struct MarineTrafficAdapter {
    transport: Arc<dyn HttpTransport>,
    api_key: Option<String>,
    pacing: Arc<RateLimiter>,
    base_url: String,
}

impl MarineTrafficAdapter {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api_key: Option<String>,
        pacing: Arc<RateLimiter>,
    ) -> Self {
        Self {
            transport,
            api_key,
            pacing,
            base_url: API_BASE.to_string(),
        }
    }

    fn export_url(&self, key: &str) -> String {
        format!("{}/api/exportvessels/{key}/v:3/protocol:jsono", self.base_url)
    }
}

#[async_trait]
impl SourceAdapter for MarineTrafficAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::MarineTraffic
    }

    async fn collect(&self, _request: &CollectRequest) -> Result<SourceBatch, SourceError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::NotConfigured("MarineTraffic API key".into()))?;
        let url = self.export_url(key);

        let mut events = Vec::new();
        let mut failure: Option<SourceError> = None;
        for port in MONITORED_PORTS.iter().take(PORTS_QUERIED) {
            self.pacing.acquire().await;
            tracing::info!(port = port.name, "marinetraffic: querying port area");

            let req = ApiRequest::get(&url)
                .query("timespan", 60)
                .query("minlat", format!("{:.4}", port.lat - BOX_HALF_WIDTH))
                .query("maxlat", format!("{:.4}", port.lat + BOX_HALF_WIDTH))
                .query("minlon", format!("{:.4}", port.lon - BOX_HALF_WIDTH))
                .query("maxlon", format!("{:.4}", port.lon + BOX_HALF_WIDTH));

            let resp = self.transport.get(req).await?;
            match resp.status {
                401 => {
                    return Err(SourceError::AuthFailed(
                        "API authentication failed".into(),
                    ))
                }
                _ if !resp.is_success() => {
                    tracing::warn!(port = port.name, status = resp.status, "marinetraffic: port query failed");
                    failure.get_or_insert_with(|| SourceError::http(resp.status, &resp.body));
                    continue;
                }
                _ => {}
            }

            let vessels = match resp.json::<Value>()? {
                Value::Array(vessels) => vessels,
                _ => Vec::new(),
            };
            if let Some(event) = congestion_event(port, vessels) {
                events.push(event);
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        Ok(SourceBatch::new(events).with_detail("ports_monitored", MONITORED_PORTS.len()))
    }
}

/// A congestion event when the vessel count crosses the threshold.
pub fn congestion_event(port: &Port, vessels: Vec<Value>) -> Option<SupplyChainEvent> {
    let count = vessels.len();
    if count <= CONGESTION_THRESHOLD {
        return None;
    }
    let severity = if count > HIGH_CONGESTION_THRESHOLD {
        Severity::High
    } else {
        Severity::Medium
    };

    let mut metadata = Map::new();
    metadata.insert("port_name".into(), json!(port.name));
    metadata.insert("vessel_count".into(), json!(count));
    metadata.insert("congestion_threshold".into(), json!(CONGESTION_THRESHOLD));

    let sample: Vec<Value> = vessels.into_iter().take(SAMPLE_VESSELS).collect();

    Some(
        SupplyChainEvent::new(SourceKind::MarineTraffic, "port_congestion", Utc::now())
            .with_location(Some(GeoPoint::new(port.lat, port.lon)))
            .with_severity(severity)
            .with_description(format!(
                "High vessel traffic detected at {} port: {} vessels",
                port.name, count
            ))
            .with_metadata(metadata)
            .with_raw_data(json!({ "vessels": sample })),
    )
}
