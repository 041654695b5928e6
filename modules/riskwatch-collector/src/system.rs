//! System surface: the operations an outer caller (scheduler, CLI, agent
//! shell) invokes. Holds an optional collector; when it is absent every
//! operation reports it as unavailable instead of failing.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use riskwatch_common::{
    ApiStatus, CollectionReport, ContextStore, EmergencyReport, SourceKind, SystemHealth,
};
use serde::Serialize;
use tracing::{error, info};

use crate::collect::Collector;

pub const COLLECTOR_UNAVAILABLE: &str = "DataCollector not available";

/// Crisis categories understood by [`SupplyChainSystem::emergency_response`].
pub const CRISIS_TYPES: &[&str] = &[
    "natural_disaster",
    "geopolitical",
    "economic",
    "pandemic",
    "cyber",
    "logistics",
];

/// Search keywords for a crisis category. Unknown categories have none.
pub fn crisis_keywords(crisis_type: &str) -> &'static [&'static str] {
    match crisis_type.trim().to_ascii_lowercase().as_str() {
        "natural_disaster" => &[
            "earthquake",
            "tsunami",
            "hurricane",
            "typhoon",
            "flood",
            "wildfire",
            "volcano",
        ],
        "geopolitical" => &[
            "war",
            "conflict",
            "sanctions",
            "border closure",
            "trade dispute",
            "embargo",
        ],
        "economic" => &[
            "recession",
            "inflation",
            "currency crisis",
            "market crash",
            "bank failure",
        ],
        "pandemic" => &[
            "outbreak",
            "lockdown",
            "quarantine",
            "travel ban",
            "factory closure",
        ],
        "cyber" => &[
            "cyber attack",
            "ransomware",
            "data breach",
            "system outage",
            "network failure",
        ],
        "logistics" => &[
            "port strike",
            "shipping delay",
            "rail disruption",
            "trucker strike",
            "fuel shortage",
        ],
        _ => &[],
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriggerReport {
    Success {
        sources_requested: String,
        emergency_mode: bool,
        events_collected: usize,
        sources_processed: Vec<SourceKind>,
        errors: Vec<String>,
        collection_results: CollectionReport,
    },
    Error {
        sources_requested: String,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseReport {
    Success {
        crisis_type: String,
        geographic_focus: String,
        keywords_used: Vec<String>,
        collection_results: EmergencyReport,
    },
    Error {
        crisis_type: String,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub timestamp: DateTime<Utc>,
    pub system_health: SystemHealth,
    pub collector_available: bool,
    pub uptime_since: Option<DateTime<Utc>>,
    pub collection_cycles: u64,
    pub total_events_processed: u64,
    pub last_collection: Option<DateTime<Utc>>,
    pub emergency_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<StatusDetails>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusDetails {
    pub api_status: BTreeMap<SourceKind, ApiStatus>,
    pub collection_stats: BTreeMap<String, i64>,
    pub last_collection_summary: Option<LastCollectionSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastCollectionSummary {
    pub sources_processed: Vec<SourceKind>,
    pub total_events: usize,
    pub errors: usize,
    pub duration_seconds: f64,
}

pub struct SupplyChainSystem {
    collector: Option<Arc<Collector>>,
}

impl SupplyChainSystem {
    pub fn new(collector: Option<Arc<Collector>>) -> Self {
        Self { collector }
    }

    pub fn collector(&self) -> Option<&Arc<Collector>> {
        self.collector.as_ref()
    }

    /// Run one orchestrated cycle and fold the outcome into system health.
    /// Healthy when every selected source succeeded, degraded otherwise.
    pub async fn trigger_data_collection(
        &self,
        sources: &str,
        emergency_mode: bool,
        store: &mut ContextStore,
    ) -> TriggerReport {
        let now = Utc::now();
        store.initialize(now);

        let Some(collector) = &self.collector else {
            error!(reason = COLLECTOR_UNAVAILABLE, "Collector unavailable");
            let system = &mut store.supply_chain_system;
            system.system_health = SystemHealth::Error;
            system.last_error = Some(COLLECTOR_UNAVAILABLE.to_string());
            system.last_error_timestamp = Some(now);
            return TriggerReport::Error {
                sources_requested: sources.to_string(),
                error: COLLECTOR_UNAVAILABLE.to_string(),
            };
        };

        let report = collector
            .collect_all_sources(sources, emergency_mode, store)
            .await;

        let system = &mut store.supply_chain_system;
        system.collection_cycles += 1;
        system.last_collection_timestamp = Some(report.start_time);
        system.total_events_processed += report.total_events_collected as u64;
        if report.errors.is_empty() {
            system.system_health = SystemHealth::Healthy;
        } else {
            system.system_health = SystemHealth::Degraded;
            system.last_error = report.errors.last().cloned();
            system.last_error_timestamp = Some(report.end_time);
        }

        TriggerReport::Success {
            sources_requested: sources.to_string(),
            emergency_mode,
            events_collected: report.total_events_collected,
            sources_processed: report.sources_processed.clone(),
            errors: report.errors.clone(),
            collection_results: report,
        }
    }

    pub fn get_system_status(&self, include_details: bool, store: &ContextStore) -> SystemStatus {
        let now = Utc::now();
        let system = &store.supply_chain_system;

        let details = include_details.then(|| StatusDetails {
            api_status: store.api_status.clone(),
            collection_stats: store.collection_stats.clone(),
            last_collection_summary: store.last_collection.as_ref().map(|last| {
                LastCollectionSummary {
                    sources_processed: last.sources_processed.clone(),
                    total_events: last.total_events,
                    errors: last.errors.len(),
                    duration_seconds: last.duration_seconds,
                }
            }),
        });

        SystemStatus {
            timestamp: now,
            system_health: system.system_health,
            collector_available: self.collector.is_some(),
            uptime_since: system.start_time,
            collection_cycles: system.collection_cycles,
            total_events_processed: system.total_events_processed,
            last_collection: system.last_collection_timestamp,
            emergency_active: store.emergency_active(now),
            details,
        }
    }

    /// Emergency collection seeded with the crisis category's keywords plus
    /// the geographic focus.
    pub async fn emergency_response(
        &self,
        crisis_type: &str,
        geographic_focus: &str,
        store: &mut ContextStore,
    ) -> ResponseReport {
        info!(crisis_type, geographic_focus, "Emergency response triggered");

        let Some(collector) = &self.collector else {
            error!(reason = COLLECTOR_UNAVAILABLE, "Collector unavailable");
            return ResponseReport::Error {
                crisis_type: crisis_type.to_string(),
                error: COLLECTOR_UNAVAILABLE.to_string(),
            };
        };

        let mut keywords: Vec<String> = crisis_keywords(crisis_type)
            .iter()
            .map(|k| k.to_string())
            .collect();
        let focus = geographic_focus.trim();
        if !focus.is_empty() {
            keywords.push(focus.to_string());
        }

        let report = collector
            .emergency_collect(&keywords, focus, None, store)
            .await;
        if let Some(state) = store.emergency.as_mut() {
            state.crisis_type = Some(crisis_type.to_string());
        }

        ResponseReport::Success {
            crisis_type: crisis_type.to_string(),
            geographic_focus: focus.to_string(),
            keywords_used: keywords,
            collection_results: report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_crisis_type_has_keywords() {
        for kind in CRISIS_TYPES {
            assert!(!crisis_keywords(kind).is_empty(), "{kind}");
        }
        assert!(crisis_keywords("alien_invasion").is_empty());
    }

    #[tokio::test]
    async fn missing_collector_degrades_to_error() {
        let system = SupplyChainSystem::new(None);
        let mut store = ContextStore::new();

        let report = system.trigger_data_collection("all", false, &mut store).await;
        assert!(matches!(report, TriggerReport::Error { ref error, .. } if error == COLLECTOR_UNAVAILABLE));
        assert_eq!(store.supply_chain_system.system_health, SystemHealth::Error);

        let status = system.get_system_status(true, &store);
        assert!(!status.collector_available);
        assert_eq!(status.system_health, SystemHealth::Error);
    }

    #[tokio::test]
    async fn missing_collector_rejects_emergency_response() {
        let system = SupplyChainSystem::new(None);
        let mut store = ContextStore::new();
        let report = system.emergency_response("cyber", "EU", &mut store).await;
        assert!(matches!(report, ResponseReport::Error { .. }));
        assert!(!store.emergency_active(Utc::now()));
    }

    #[test]
    fn status_omits_details_when_not_asked() {
        let system = SupplyChainSystem::new(None);
        let store = ContextStore::new();
        let value = serde_json::to_value(system.get_system_status(false, &store)).unwrap();
        assert!(value.get("details").is_none());
        assert_eq!(value["system_health"], "unknown");
    }
}
