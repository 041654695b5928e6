use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum description length for events derived from free text.
pub const DESCRIPTION_MAX_CHARS: usize = 200;

// --- Sources ---

/// The five upstream APIs an event can originate from.
/// Wire names match the names callers use in source selections ("NOAA,FRED").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "NOAA")]
    Noaa,
    #[serde(rename = "GDELT")]
    Gdelt,
    #[serde(rename = "MarineTraffic")]
    MarineTraffic,
    #[serde(rename = "FRED")]
    Fred,
    #[serde(rename = "Twitter")]
    Twitter,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Noaa,
        SourceKind::Gdelt,
        SourceKind::MarineTraffic,
        SourceKind::Fred,
        SourceKind::Twitter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Noaa => "NOAA",
            Self::Gdelt => "GDELT",
            Self::MarineTraffic => "MarineTraffic",
            Self::Fred => "FRED",
            Self::Twitter => "Twitter",
        }
    }

    /// Key under which the per-source event count is kept in `collection_stats`.
    pub fn stats_key(&self) -> &'static str {
        match self {
            Self::Noaa => "noaa_events",
            Self::Gdelt => "gdelt_events",
            Self::MarineTraffic => "marinetraffic_events",
            Self::Fred => "fred_events",
            Self::Twitter => "twitter_events",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        SourceKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown source: {trimmed}"))
    }
}

// --- Severity ---

/// Four-level ordinal severity. Ordering follows rank: low < medium < high < critical.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    /// High and critical events count toward the emergency high-priority tally.
    pub fn is_high_priority(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

// --- Geography ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

// --- Connectivity ---

/// Last known connectivity state of one upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStatus {
    #[default]
    Unknown,
    Connected,
    Error,
    Timeout,
    RateLimited,
    AuthFailed,
    NotConfigured,
    ApiLimit,
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Connected => "connected",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::AuthFailed => "auth_failed",
            Self::NotConfigured => "not_configured",
            Self::ApiLimit => "api_limit",
        };
        f.write_str(s)
    }
}

// --- Events ---

/// The canonical normalized record every source adapter produces.
///
/// `metadata` and `raw_data` are always JSON objects (possibly empty), so
/// consumers never need null checks on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyChainEvent {
    pub source: SourceKind,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub raw_data: Map<String, Value>,
    #[serde(default)]
    pub geojson: Option<Value>,
    #[serde(default)]
    pub impact_score: Option<f64>,
}

impl SupplyChainEvent {
    pub fn new(source: SourceKind, event_type: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            source,
            event_type: event_type.into(),
            timestamp,
            location: None,
            severity: Severity::default(),
            description: String::new(),
            metadata: Map::new(),
            raw_data: Map::new(),
            geojson: None,
            impact_score: None,
        }
    }

    pub fn with_location(mut self, location: Option<GeoPoint>) -> Self {
        self.location = location;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach the untransformed source fragment. Non-object values are wrapped
    /// under a `value` key so `raw_data` stays a mapping.
    pub fn with_raw_data(mut self, raw: Value) -> Self {
        self.raw_data = into_object(raw);
        self
    }
}

/// Coerce any JSON value into an object map. `null` becomes empty.
pub fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// Truncate free text to `max_chars` characters, appending `...` when cut.
pub fn truncate_description(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_orders_by_rank() {
        let mut levels = vec![Severity::High, Severity::Low, Severity::Critical, Severity::Medium];
        levels.sort();
        assert_eq!(
            levels,
            vec![Severity::Low, Severity::Medium, Severity::High, Severity::Critical]
        );
        assert_eq!(Severity::Critical.rank(), 4);
        assert_eq!(Severity::Low.rank(), 1);
    }

    #[test]
    fn severity_defaults_to_medium() {
        assert_eq!(Severity::default(), Severity::Medium);
    }

    #[test]
    fn source_names_parse_case_insensitively() {
        assert_eq!("NOAA".parse::<SourceKind>(), Ok(SourceKind::Noaa));
        assert_eq!(" fred ".parse::<SourceKind>(), Ok(SourceKind::Fred));
        assert_eq!("marinetraffic".parse::<SourceKind>(), Ok(SourceKind::MarineTraffic));
        assert!("Reuters".parse::<SourceKind>().is_err());
    }

    #[test]
    fn event_serializes_with_wire_names_and_text_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let event = SupplyChainEvent::new(SourceKind::MarineTraffic, "port_congestion", ts)
            .with_severity(Severity::High)
            .with_location(Some(GeoPoint::new(1.2966, 103.7764)));

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["source"], "MarineTraffic");
        assert_eq!(value["severity"], "high");
        assert_eq!(value["timestamp"], "2025-03-01T12:00:00Z");
        assert_eq!(value["location"], json!({"lat": 1.2966, "lon": 103.7764}));
        assert_eq!(value["metadata"], json!({}));
        assert_eq!(value["raw_data"], json!({}));
    }

    #[test]
    fn missing_maps_deserialize_as_empty() {
        let event: SupplyChainEvent = serde_json::from_value(json!({
            "source": "GDELT",
            "event_type": "news_event",
            "timestamp": "2025-03-01T12:00:00Z",
        }))
        .unwrap();
        assert!(event.metadata.is_empty());
        assert!(event.raw_data.is_empty());
        assert_eq!(event.severity, Severity::Medium);
    }

    #[test]
    fn raw_data_scalars_are_wrapped() {
        let event = SupplyChainEvent::new(SourceKind::Fred, "economic_indicator", Utc::now())
            .with_raw_data(json!("305.1"));
        assert_eq!(event.raw_data.get("value"), Some(&json!("305.1")));

        let event = event.with_raw_data(Value::Null);
        assert!(event.raw_data.is_empty());
    }

    #[test]
    fn truncation_appends_ellipsis_only_when_cut() {
        assert_eq!(truncate_description("short", 200), "short");
        let long = "x".repeat(250);
        let cut = truncate_description(&long, 200);
        assert_eq!(cut.len(), 203);
        assert!(cut.ends_with("..."));
    }
}
