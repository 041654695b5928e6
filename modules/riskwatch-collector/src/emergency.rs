// Emergency collection: a reduced source set with raised limits, published
// highest severity first.

use std::cmp::Reverse;

use chrono::Utc;
use riskwatch_common::{ContextStore, EmergencyReport, EmergencyState, SourceKind, SupplyChainEvent};
use tracing::{info, warn};

use crate::collect::Collector;
use crate::sources::CollectRequest;

/// Keywords beyond this many are dropped.
pub const MAX_CRISIS_KEYWORDS: usize = 10;

impl Collector {
    /// Collect news, social and weather (in that order) with `max_per_source`
    /// records each (default from settings), publish by descending severity,
    /// and mark the store's emergency state active.
    pub async fn emergency_collect(
        &self,
        crisis_keywords: &[String],
        geographic_focus: &str,
        max_per_source: Option<usize>,
        store: &mut ContextStore,
    ) -> EmergencyReport {
        let keywords: Vec<String> = crisis_keywords
            .iter()
            .take(MAX_CRISIS_KEYWORDS)
            .cloned()
            .collect();
        let cap = max_per_source.unwrap_or(self.settings.emergency_max_records);
        let focus = geographic_focus.trim();

        let mut report = EmergencyReport::start(keywords.clone(), focus);
        store.initialize(report.start_time);
        info!(keywords = keywords.len(), focus, cap, "Emergency collection triggered");

        let mut all_events: Vec<SupplyChainEvent> = Vec::new();
        for (kind, request) in emergency_plan(cap, focus) {
            if self.take_cancel() {
                warn!(source = %kind, "Emergency collection cancelled");
                report.errors.push(format!("cancelled before {kind}"));
                break;
            }

            let envelope = self.fetch_source(kind, &request, store).await;
            if envelope.is_success() {
                report.sources_processed.push(kind);
                report.high_priority_events += envelope
                    .events()
                    .iter()
                    .filter(|e| e.severity.is_high_priority())
                    .count();
                report.total_events_collected += envelope.events_collected();
                all_events.extend(envelope.events().iter().cloned());
            } else {
                report.errors.push(format!(
                    "{kind}: {}",
                    envelope.message().unwrap_or("Failed")
                ));
            }
            report.source_results.push(envelope);
        }

        if !all_events.is_empty() {
            let ordered = prioritize(all_events);
            let published = self
                .publisher
                .publish(&ordered, self.settings.emergency_batch_size, store)
                .await;
            report.publish_result = Some(published);
        }

        report.finish();

        let mut state = EmergencyState::new(
            keywords,
            focus,
            report.start_time,
            self.settings.emergency_ttl(),
        );
        state.last_results = Some(report.clone());
        store.activate_emergency(state);

        info!(
            emergency_id = %report.emergency_id,
            events = report.total_events_collected,
            high_priority = report.high_priority_events,
            "Emergency collection completed"
        );
        report
    }

    /// Clear emergency mode by hand. Returns whether it was active.
    pub fn deactivate_emergency(&self, store: &mut ContextStore) -> bool {
        let cleared = store.deactivate_emergency();
        if cleared {
            info!(at = %Utc::now(), "Emergency mode deactivated");
        }
        cleared
    }
}

fn emergency_plan(cap: usize, focus: &str) -> [(SourceKind, CollectRequest); 3] {
    let weather = if focus.is_empty() {
        CollectRequest::default()
    } else {
        CollectRequest::builder().region(focus).build()
    };
    [
        (
            SourceKind::Gdelt,
            CollectRequest::builder().max_records(cap).build(),
        ),
        (
            SourceKind::Twitter,
            CollectRequest::builder()
                .max_records(cap)
                .include_retweets(true)
                .build(),
        ),
        (SourceKind::Noaa, weather),
    ]
}

/// Stable sort by descending severity; equal severities keep arrival order.
pub fn prioritize(mut events: Vec<SupplyChainEvent>) -> Vec<SupplyChainEvent> {
    events.sort_by_key(|e| Reverse(e.severity.rank()));
    events
}
