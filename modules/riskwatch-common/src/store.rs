//! Caller-owned run state threaded through every collection operation.
//!
//! The store is a plain value: operations borrow it `&mut`, so two overlapping
//! runs against the same store need the caller to serialize them. Every
//! section can be read and written generically by name through
//! [`ContextStore::get`], [`ContextStore::set`] and [`ContextStore::merge`];
//! the typed helpers below are what the collector itself uses.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RiskwatchError;
use crate::reports::{CollectionReport, EmergencyReport};
use crate::types::{ApiStatus, SourceKind};

// --- Sections ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    ApiStatus,
    CollectionStats,
    DataCollector,
    SupplyChainSystem,
    Emergency,
    LastCollection,
    Extras,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::ApiStatus,
        Section::CollectionStats,
        Section::DataCollector,
        Section::SupplyChainSystem,
        Section::Emergency,
        Section::LastCollection,
        Section::Extras,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiStatus => "api_status",
            Self::CollectionStats => "collection_stats",
            Self::DataCollector => "data_collector",
            Self::SupplyChainSystem => "supply_chain_system",
            Self::Emergency => "emergency",
            Self::LastCollection => "last_collection",
            Self::Extras => "extras",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = RiskwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Section::ALL
            .into_iter()
            .find(|sec| sec.as_str() == name)
            .ok_or_else(|| RiskwatchError::UnknownSection(name.to_string()))
    }
}

// --- Section payloads ---

/// Running counters of the data collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorCounters {
    pub initialized: bool,
    pub total_collections: u64,
    pub successful_collections: u64,
    pub failed_collections: u64,
    pub total_events_published: u64,
    pub last_collection_time: Option<DateTime<Utc>>,
    pub active_sources: Vec<SourceKind>,
    pub error_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemHealth {
    #[default]
    Unknown,
    Healthy,
    Degraded,
    Error,
}

impl fmt::Display for SystemHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Counters of the system (root) surface, across collection cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemCounters {
    pub start_time: Option<DateTime<Utc>>,
    pub collection_cycles: u64,
    pub total_events_processed: u64,
    pub system_health: SystemHealth,
    pub last_error: Option<String>,
    pub last_error_timestamp: Option<DateTime<Utc>>,
    pub last_collection_timestamp: Option<DateTime<Utc>>,
}

/// Emergency mode bookkeeping. Present only once an emergency has been run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyState {
    pub active: bool,
    pub crisis_keywords: Vec<String>,
    pub geographic_focus: String,
    pub activated_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub crisis_type: Option<String>,
    #[serde(default)]
    pub last_results: Option<EmergencyReport>,
}

/// Compact record of the most recent collection cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub collection_id: String,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub emergency_mode: bool,
    pub sources_processed: Vec<SourceKind>,
    pub total_events: usize,
    pub events_published: usize,
    pub errors: Vec<String>,
    #[serde(default)]
    pub cancelled: bool,
}

impl From<&CollectionReport> for CollectionSummary {
    fn from(report: &CollectionReport) -> Self {
        Self {
            collection_id: report.collection_id.clone(),
            start_time: report.start_time,
            duration_seconds: report.duration_seconds,
            emergency_mode: report.emergency_mode,
            sources_processed: report.sources_processed.clone(),
            total_events: report.total_events_collected,
            events_published: report
                .publish_result
                .as_ref()
                .map(|p| p.events_published())
                .unwrap_or(0),
            errors: report.errors.clone(),
            cancelled: report.cancelled,
        }
    }
}

// --- Store ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextStore {
    pub api_status: BTreeMap<SourceKind, ApiStatus>,
    pub collection_stats: BTreeMap<String, i64>,
    pub data_collector: CollectorCounters,
    pub supply_chain_system: SystemCounters,
    pub emergency: Option<EmergencyState>,
    pub last_collection: Option<CollectionSummary>,
    pub extras: Map<String, Value>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bootstrap a fresh store. Existing entries are left alone, so calling
    /// this before every operation is harmless.
    pub fn initialize(&mut self, now: DateTime<Utc>) {
        for kind in SourceKind::ALL {
            self.api_status.entry(kind).or_default();
        }
        self.data_collector.initialized = true;
        if self.supply_chain_system.start_time.is_none() {
            self.supply_chain_system.start_time = Some(now);
            self.supply_chain_system.system_health = SystemHealth::Healthy;
        }
    }

    // --- Generic section access ---

    pub fn get(&self, section: Section) -> Result<Value, RiskwatchError> {
        let value = match section {
            Section::ApiStatus => serde_json::to_value(&self.api_status)?,
            Section::CollectionStats => serde_json::to_value(&self.collection_stats)?,
            Section::DataCollector => serde_json::to_value(&self.data_collector)?,
            Section::SupplyChainSystem => serde_json::to_value(&self.supply_chain_system)?,
            Section::Emergency => serde_json::to_value(&self.emergency)?,
            Section::LastCollection => serde_json::to_value(&self.last_collection)?,
            Section::Extras => Value::Object(self.extras.clone()),
        };
        Ok(value)
    }

    /// Replace a whole section. The value must deserialize into the
    /// section's type; the store is unchanged on error.
    pub fn set(&mut self, section: Section, value: Value) -> Result<(), RiskwatchError> {
        match section {
            Section::ApiStatus => self.api_status = decode_section(section, value)?,
            Section::CollectionStats => self.collection_stats = decode_section(section, value)?,
            Section::DataCollector => self.data_collector = decode_section(section, value)?,
            Section::SupplyChainSystem => {
                self.supply_chain_system = decode_section(section, value)?
            }
            Section::Emergency => self.emergency = decode_section(section, value)?,
            Section::LastCollection => self.last_collection = decode_section(section, value)?,
            Section::Extras => self.extras = decode_section(section, value)?,
        }
        Ok(())
    }

    /// Shallow-merge an object into a section: top-level keys in `patch`
    /// overwrite, others are kept. A non-object patch replaces the section.
    pub fn merge(&mut self, section: Section, patch: Value) -> Result<(), RiskwatchError> {
        let merged = match (self.get(section)?, patch) {
            (Value::Object(mut current), Value::Object(patch)) => {
                current.extend(patch);
                Value::Object(current)
            }
            (_, other) => other,
        };
        self.set(section, merged)
    }

    // --- Connectivity and stats ---

    pub fn set_api_status(&mut self, source: SourceKind, status: ApiStatus) {
        self.api_status.insert(source, status);
    }

    pub fn api_status(&self, source: SourceKind) -> ApiStatus {
        self.api_status.get(&source).copied().unwrap_or_default()
    }

    pub fn set_stat(&mut self, key: &str, value: i64) {
        self.collection_stats.insert(key.to_string(), value);
    }

    pub fn stat(&self, key: &str) -> i64 {
        self.collection_stats.get(key).copied().unwrap_or(0)
    }

    // --- Emergency ---

    pub fn activate_emergency(&mut self, state: EmergencyState) {
        self.emergency = Some(state);
    }

    /// Clear the emergency flag. Keeps keywords and last results for
    /// inspection. Returns whether an active emergency was cleared.
    pub fn deactivate_emergency(&mut self) -> bool {
        match self.emergency.as_mut() {
            Some(state) if state.active => {
                state.active = false;
                true
            }
            _ => false,
        }
    }

    /// Deactivate an emergency whose TTL has passed. Returns whether it did.
    pub fn expire_emergency(&mut self, now: DateTime<Utc>) -> bool {
        let expired = self
            .emergency
            .as_ref()
            .map(|s| s.active && s.expires_at.is_some_and(|at| at <= now))
            .unwrap_or(false);
        if expired {
            self.deactivate_emergency();
        }
        expired
    }

    pub fn emergency_active(&self, now: DateTime<Utc>) -> bool {
        self.emergency
            .as_ref()
            .map(|s| s.active && s.expires_at.map_or(true, |at| at > now))
            .unwrap_or(false)
    }

    // --- Collection bookkeeping ---

    pub fn record_collection(&mut self, report: &CollectionReport) {
        self.last_collection = Some(CollectionSummary::from(report));
    }
}

impl EmergencyState {
    pub fn new(
        crisis_keywords: Vec<String>,
        geographic_focus: &str,
        activated_at: DateTime<Utc>,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            active: true,
            crisis_keywords,
            geographic_focus: geographic_focus.to_string(),
            activated_at,
            expires_at: ttl.and_then(|ttl| activated_at.checked_add_signed(ttl)),
            crisis_type: None,
            last_results: None,
        }
    }
}

fn decode_section<T: DeserializeOwned>(section: Section, value: Value) -> Result<T, RiskwatchError> {
    serde_json::from_value(value).map_err(|e| RiskwatchError::InvalidSection {
        section: section.to_string(),
        message: e.to_string(),
    })
}
