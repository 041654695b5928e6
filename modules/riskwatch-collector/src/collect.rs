// Collection orchestrator.
//
// Runs the selected adapters one after another, aggregates their events,
// publishes once, and folds run statistics into the caller's store. A run
// always returns a report; source failures become entries in `errors`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use riskwatch_common::{
    ApiStatus, CollectionReport, ContextStore, SourceEnvelope, SourceKind, SupplyChainEvent,
};
use tracing::{debug, info, warn};

use crate::pacing::Pacing;
use crate::publisher::Publisher;
use crate::settings::CollectorSettings;
use crate::sources::{self, CollectRequest, SourceAdapter};

pub struct Collector {
    pub(crate) adapters: BTreeMap<SourceKind, Arc<dyn SourceAdapter>>,
    pub(crate) publisher: Publisher,
    pub(crate) settings: CollectorSettings,
    pub(crate) pacing: Pacing,
    cancelled: Arc<AtomicBool>,
}

impl Collector {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        publisher: Publisher,
        settings: CollectorSettings,
        pacing: Pacing,
    ) -> Self {
        let adapters = adapters.into_iter().map(|a| (a.kind(), a)).collect();
        Self {
            adapters,
            publisher,
            settings,
            pacing,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop the current run before its next source. With no run in
    /// progress the next run stops instead. Each cancel stops one run.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Consume a pending cancel, so later runs start clean.
    pub(crate) fn take_cancel(&self) -> bool {
        self.cancelled.swap(false, Ordering::Relaxed)
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Run one adapter by kind. An unregistered kind yields an error envelope.
    pub async fn fetch_source(
        &self,
        kind: SourceKind,
        request: &CollectRequest,
        store: &mut ContextStore,
    ) -> SourceEnvelope {
        match self.adapters.get(&kind) {
            Some(adapter) => sources::fetch(adapter.as_ref(), request, store).await,
            None => {
                store.set_api_status(kind, ApiStatus::NotConfigured);
                SourceEnvelope::error(
                    kind,
                    ApiStatus::NotConfigured,
                    format!("{kind} adapter not registered"),
                )
            }
        }
    }

    /// `"all"` expands to the configured default set; otherwise a comma list
    /// in the given order. Unknown names are skipped.
    pub fn resolve_sources(&self, selection: &str) -> Vec<SourceKind> {
        let selection = selection.trim();
        if selection.eq_ignore_ascii_case("all") {
            return self.settings.default_sources.clone();
        }
        selection
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .filter_map(|name| match name.parse::<SourceKind>() {
                Ok(kind) => Some(kind),
                Err(_) => {
                    debug!(name, "Skipping unknown source");
                    None
                }
            })
            .collect()
    }

    /// Per-source parameters for a normal cycle.
    fn cycle_request(&self, kind: SourceKind, emergency_mode: bool) -> CollectRequest {
        match kind {
            SourceKind::Twitter => CollectRequest::builder()
                .max_records(if emergency_mode {
                    self.settings.social_emergency_max_results
                } else {
                    self.settings.social_max_results
                })
                .build(),
            _ => CollectRequest::default(),
        }
    }

    pub async fn collect_all_sources(
        &self,
        sources: &str,
        emergency_mode: bool,
        store: &mut ContextStore,
    ) -> CollectionReport {
        let mut report = CollectionReport::start(sources, emergency_mode);
        store.initialize(report.start_time);
        if store.expire_emergency(report.start_time) {
            info!("Emergency mode expired");
        }

        let selected = self.resolve_sources(sources);
        info!(sources, ?selected, emergency_mode, "Collection starting");
        store.data_collector.active_sources = selected.clone();

        let mut all_events: Vec<SupplyChainEvent> = Vec::new();
        for kind in selected {
            if self.take_cancel() {
                warn!(source = %kind, "Collection cancelled");
                report.errors.push(format!("cancelled before {kind}"));
                report.cancelled = true;
                break;
            }
            self.pacing.sources.acquire().await;

            let request = self.cycle_request(kind, emergency_mode);
            let envelope = self.fetch_source(kind, &request, store).await;
            if envelope.is_success() {
                report.sources_processed.push(kind);
                report.total_events_collected += envelope.events_collected();
                all_events.extend(envelope.events().iter().cloned());
            } else {
                report.errors.push(format!(
                    "{kind}: {}",
                    envelope.message().unwrap_or("Unknown error")
                ));
            }
            report.source_results.push(envelope);
        }

        if !all_events.is_empty() {
            let published = self
                .publisher
                .publish(&all_events, self.settings.batch_size, store)
                .await;
            report.publish_result = Some(published);
        }

        report.finish();
        record_cycle(store, &report);

        info!(
            collection_id = %report.collection_id,
            events = report.total_events_collected,
            sources = report.sources_processed.len(),
            errors = report.errors.len(),
            "Collection completed"
        );
        report
    }
}

fn record_cycle(store: &mut ContextStore, report: &CollectionReport) {
    let counters = &mut store.data_collector;
    counters.total_collections += 1;
    if report.sources_processed.is_empty() {
        counters.failed_collections += 1;
    } else {
        counters.successful_collections += 1;
    }
    counters.total_events_published += report.total_events_collected as u64;
    counters.last_collection_time = Some(report.start_time);
    counters.error_count += report.errors.len() as u64;
    store.record_collection(report);
}
