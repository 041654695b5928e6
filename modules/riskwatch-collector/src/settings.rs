use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Duration as TtlDuration;
use riskwatch_common::SourceKind;
use serde::Deserialize;

/// Upper bound for `emergency_ttl_hours` (ten years).
pub const MAX_EMERGENCY_TTL_HOURS: i64 = 24 * 365 * 10;

/// Collector tuning loaded from TOML. Every field has a default, so an empty
/// file (or no file) yields the standard behaviour. Secrets stay in env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectorSettings {
    /// Sources polled when a cycle asks for "all". Vessel traffic is left out
    /// by default to keep per-cycle API cost down.
    pub default_sources: Vec<SourceKind>,
    pub source_interval_ms: u64,
    pub port_interval_ms: u64,
    pub series_interval_ms: u64,
    pub publish_batch_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub batch_size: usize,
    pub emergency_batch_size: usize,
    pub emergency_max_records: usize,
    pub social_max_results: usize,
    pub social_emergency_max_results: usize,
    /// Hours before an emergency deactivates itself. `0` disables expiry.
    pub emergency_ttl_hours: i64,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            default_sources: vec![
                SourceKind::Noaa,
                SourceKind::Gdelt,
                SourceKind::Fred,
                SourceKind::Twitter,
            ],
            source_interval_ms: 500,
            port_interval_ms: 1000,
            series_interval_ms: 500,
            publish_batch_interval_ms: 100,
            request_timeout_secs: 10,
            batch_size: 10,
            emergency_batch_size: 5,
            emergency_max_records: 200,
            social_max_results: 100,
            social_emergency_max_results: 200,
            emergency_ttl_hours: 6,
        }
    }
}

impl CollectorSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `None` when emergencies never expire (`emergency_ttl_hours <= 0`).
    pub fn emergency_ttl(&self) -> Option<TtlDuration> {
        if self.emergency_ttl_hours <= 0 {
            return None;
        }
        TtlDuration::try_hours(self.emergency_ttl_hours.min(MAX_EMERGENCY_TTL_HOURS))
    }
}

/// Load and parse a TOML settings file.
pub fn load_settings(path: &Path) -> Result<CollectorSettings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
    parse_settings(&content)
        .with_context(|| format!("Failed to parse settings file: {}", path.display()))
}

pub fn parse_settings(content: &str) -> Result<CollectorSettings> {
    let settings: CollectorSettings = toml::from_str(content)?;
    anyhow::ensure!(
        settings.emergency_ttl_hours <= MAX_EMERGENCY_TTL_HOURS,
        "emergency_ttl_hours must be at most {MAX_EMERGENCY_TTL_HOURS}, got {}",
        settings.emergency_ttl_hours
    );
    Ok(settings)
}
