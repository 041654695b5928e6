//! Structured results returned by every caller-facing operation.
//!
//! Each adapter returns a [`SourceEnvelope`], the publisher a
//! [`PublishReport`], the orchestrator a [`CollectionReport`] and the emergency
//! path an [`EmergencyReport`]. None of these operations raise past their own
//! boundary; failures are values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{ApiStatus, SourceKind, SupplyChainEvent};

// ---------------------------------------------------------------------------
// SourceEnvelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceEnvelope {
    Success {
        source: SourceKind,
        events_collected: usize,
        events: Vec<SupplyChainEvent>,
        /// Adapter-specific extras (ports monitored, search keywords, ...).
        #[serde(default)]
        details: Map<String, Value>,
        timestamp: DateTime<Utc>,
    },
    Error {
        source: SourceKind,
        api_status: ApiStatus,
        message: String,
        events_collected: usize,
        timestamp: DateTime<Utc>,
    },
}

impl SourceEnvelope {
    pub fn success(
        source: SourceKind,
        events: Vec<SupplyChainEvent>,
        details: Map<String, Value>,
    ) -> Self {
        Self::Success {
            source,
            events_collected: events.len(),
            events,
            details,
            timestamp: Utc::now(),
        }
    }

    pub fn error(source: SourceKind, api_status: ApiStatus, message: impl Into<String>) -> Self {
        Self::Error {
            source,
            api_status,
            message: message.into(),
            events_collected: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn source(&self) -> SourceKind {
        match self {
            Self::Success { source, .. } | Self::Error { source, .. } => *source,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn events(&self) -> &[SupplyChainEvent] {
        match self {
            Self::Success { events, .. } => events,
            Self::Error { .. } => &[],
        }
    }

    pub fn events_collected(&self) -> usize {
        match self {
            Self::Success {
                events_collected, ..
            } => *events_collected,
            Self::Error { .. } => 0,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Error { message, .. } => Some(message),
        }
    }
}

// ---------------------------------------------------------------------------
// PublishReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishReport {
    Success {
        events_published: usize,
        events_failed: usize,
        total_events: usize,
        topic: String,
        timestamp: DateTime<Utc>,
    },
    Warning {
        message: String,
    },
    Error {
        message: String,
        total_events: usize,
    },
}

impl PublishReport {
    pub fn events_published(&self) -> usize {
        match self {
            Self::Success {
                events_published, ..
            } => *events_published,
            _ => 0,
        }
    }

    pub fn events_failed(&self) -> usize {
        match self {
            Self::Success { events_failed, .. } => *events_failed,
            Self::Error { total_events, .. } => *total_events,
            Self::Warning { .. } => 0,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

// ---------------------------------------------------------------------------
// CollectionReport
// ---------------------------------------------------------------------------

/// Result of one orchestrated collection cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionReport {
    pub collection_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub emergency_mode: bool,
    pub sources_requested: String,
    pub sources_processed: Vec<SourceKind>,
    pub total_events_collected: usize,
    pub errors: Vec<String>,
    pub source_results: Vec<SourceEnvelope>,
    #[serde(default)]
    pub publish_result: Option<PublishReport>,
    #[serde(default)]
    pub cancelled: bool,
}

impl CollectionReport {
    pub fn start(sources_requested: &str, emergency_mode: bool) -> Self {
        let start_time = Utc::now();
        Self {
            collection_id: format!("collect_{}", start_time.timestamp()),
            start_time,
            end_time: start_time,
            duration_seconds: 0.0,
            emergency_mode,
            sources_requested: sources_requested.to_string(),
            sources_processed: Vec::new(),
            total_events_collected: 0,
            errors: Vec::new(),
            source_results: Vec::new(),
            publish_result: None,
            cancelled: false,
        }
    }

    pub fn finish(&mut self) {
        self.end_time = Utc::now();
        self.duration_seconds = elapsed_seconds(self.start_time, self.end_time);
    }
}

// ---------------------------------------------------------------------------
// EmergencyReport
// ---------------------------------------------------------------------------

/// Result of one emergency collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyReport {
    pub emergency_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub crisis_keywords: Vec<String>,
    pub geographic_focus: String,
    pub sources_processed: Vec<SourceKind>,
    pub total_events_collected: usize,
    pub high_priority_events: usize,
    pub errors: Vec<String>,
    pub source_results: Vec<SourceEnvelope>,
    #[serde(default)]
    pub publish_result: Option<PublishReport>,
}

impl EmergencyReport {
    pub fn start(crisis_keywords: Vec<String>, geographic_focus: &str) -> Self {
        let start_time = Utc::now();
        Self {
            emergency_id: format!("emergency_{}", start_time.timestamp()),
            start_time,
            end_time: start_time,
            duration_seconds: 0.0,
            crisis_keywords,
            geographic_focus: geographic_focus.to_string(),
            sources_processed: Vec::new(),
            total_events_collected: 0,
            high_priority_events: 0,
            errors: Vec::new(),
            source_results: Vec::new(),
            publish_result: None,
        }
    }

    pub fn finish(&mut self) {
        self.end_time = Utc::now();
        self.duration_seconds = elapsed_seconds(self.start_time, self.end_time);
    }
}

fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    #[test]
    fn success_envelope_has_no_message() {
        let event = SupplyChainEvent::new(SourceKind::Noaa, "weather_flood", Utc::now())
            .with_severity(Severity::High);
        let env = SourceEnvelope::success(SourceKind::Noaa, vec![event], Map::new());

        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["events_collected"], 1);
        assert!(value.get("message").is_none());
        assert!(env.message().is_none());
    }

    #[test]
    fn error_envelope_reports_zero_events() {
        let env = SourceEnvelope::error(SourceKind::Gdelt, ApiStatus::RateLimited, "slow down");
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["api_status"], "rate_limited");
        assert_eq!(value["events_collected"], 0);
        assert!(env.events().is_empty());
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let env = SourceEnvelope::error(SourceKind::Fred, ApiStatus::NotConfigured, "no key");
        let json = serde_json::to_string(&env).unwrap();
        let back: SourceEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.source(), SourceKind::Fred);
        assert!(!back.is_success());
    }

    #[test]
    fn collection_id_uses_start_timestamp() {
        let report = CollectionReport::start("all", false);
        assert_eq!(
            report.collection_id,
            format!("collect_{}", report.start_time.timestamp())
        );
    }

    #[test]
    fn publish_error_counts_everything_as_failed() {
        let report = PublishReport::Error {
            message: "Pub/Sub publisher not initialized".into(),
            total_events: 7,
        };
        assert_eq!(report.events_published(), 0);
        assert_eq!(report.events_failed(), 7);
    }
}
