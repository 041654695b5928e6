//! Orchestrated collection, emergency collection and the system surface,
//! wired over mock adapters and an in-memory stream.

use std::sync::Arc;

use chrono::Utc;

use riskwatch_collector::sources::SourceAdapter;
use riskwatch_collector::system::{ResponseReport, SupplyChainSystem, TriggerReport};
use riskwatch_collector::testing::{
    call_log, collector_from, collector_with, event, CallLog, MemorySink, MockAdapter,
};
use riskwatch_common::{ApiStatus, ContextStore, PublishReport, Severity, SourceKind, SystemHealth};

fn all_sources_ok(log: &CallLog) -> Vec<MockAdapter> {
    vec![
        MockAdapter::ok(SourceKind::Noaa, vec![event(SourceKind::Noaa, Severity::High)]).logged(log),
        MockAdapter::ok(
            SourceKind::Gdelt,
            vec![
                event(SourceKind::Gdelt, Severity::Low),
                event(SourceKind::Gdelt, Severity::Medium),
            ],
        )
        .logged(log),
        MockAdapter::ok(SourceKind::MarineTraffic, vec![event(SourceKind::MarineTraffic, Severity::Medium)])
            .logged(log),
        MockAdapter::ok(SourceKind::Fred, vec![event(SourceKind::Fred, Severity::Medium)]).logged(log),
        MockAdapter::ok(SourceKind::Twitter, vec![]).logged(log),
    ]
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn all_runs_default_sources_and_skips_marine_traffic() {
    let log = call_log();
    let sink = Arc::new(MemorySink::new("raw_events"));
    let collector = collector_with(all_sources_ok(&log), Some(sink.clone()));
    let mut store = ContextStore::new();

    let report = collector.collect_all_sources("all", false, &mut store).await;

    assert_eq!(
        *log.lock().unwrap(),
        vec![SourceKind::Noaa, SourceKind::Gdelt, SourceKind::Fred, SourceKind::Twitter]
    );
    assert_eq!(report.sources_processed.len(), 4);
    assert!(report.errors.is_empty());
    assert_eq!(report.total_events_collected, 4);
    let summed: usize = report.source_results.iter().map(|r| r.events_collected()).sum();
    assert_eq!(summed, report.total_events_collected);
    assert!(report.collection_id.starts_with("collect_"));
    assert!(report.duration_seconds >= 0.0);

    assert_eq!(sink.sent().len(), 4);
    assert_eq!(report.publish_result.as_ref().map(|p| p.events_published()), Some(4));
    assert_eq!(store.api_status(SourceKind::MarineTraffic), ApiStatus::Unknown);
}

#[tokio::test]
async fn explicit_selection_runs_in_given_order() {
    let log = call_log();
    let collector = collector_with(all_sources_ok(&log), None);
    let mut store = ContextStore::new();

    let report = collector.collect_all_sources("FRED,NOAA", false, &mut store).await;

    assert_eq!(*log.lock().unwrap(), vec![SourceKind::Fred, SourceKind::Noaa]);
    assert_eq!(report.sources_processed, vec![SourceKind::Fred, SourceKind::Noaa]);
    assert_eq!(store.data_collector.active_sources, vec![SourceKind::Fred, SourceKind::Noaa]);
}

#[tokio::test]
async fn failing_source_does_not_stop_the_cycle() {
    let collector = collector_with(
        vec![
            MockAdapter::failing(SourceKind::Noaa, ApiStatus::Timeout, "Request timed out"),
            MockAdapter::ok(SourceKind::Gdelt, vec![event(SourceKind::Gdelt, Severity::Low)]),
        ],
        Some(Arc::new(MemorySink::new("raw_events"))),
    );
    let mut store = ContextStore::new();

    let report = collector.collect_all_sources("NOAA,GDELT", false, &mut store).await;

    assert_eq!(report.sources_processed, vec![SourceKind::Gdelt]);
    assert_eq!(report.errors, vec!["NOAA: Request timed out"]);
    assert_eq!(report.total_events_collected, 1);
    assert_eq!(store.api_status(SourceKind::Noaa), ApiStatus::Timeout);
    assert_eq!(store.api_status(SourceKind::Gdelt), ApiStatus::Connected);
}

#[tokio::test]
async fn no_events_means_no_publish() {
    let sink = Arc::new(MemorySink::new("raw_events"));
    let collector = collector_with(
        vec![MockAdapter::ok(SourceKind::Noaa, vec![])],
        Some(sink.clone()),
    );
    let mut store = ContextStore::new();

    let report = collector.collect_all_sources("NOAA", false, &mut store).await;

    assert!(report.publish_result.is_none());
    assert!(sink.sent().is_empty());
}

#[tokio::test]
async fn missing_stream_reports_error_without_failing_the_cycle() {
    let collector = collector_with(
        vec![MockAdapter::ok(SourceKind::Noaa, vec![event(SourceKind::Noaa, Severity::Low)])],
        None,
    );
    let mut store = ContextStore::new();

    let report = collector.collect_all_sources("NOAA", false, &mut store).await;

    let publish = report.publish_result.expect("events were collected");
    assert!(publish.is_error());
    assert_eq!(publish.events_failed(), 1);
    assert!(matches!(publish, PublishReport::Error { ref message, .. } if message == "Pub/Sub publisher not initialized"));
    assert_eq!(report.sources_processed, vec![SourceKind::Noaa]);
}

#[tokio::test]
async fn counters_accumulate_across_cycles() {
    let collector = collector_with(
        vec![
            MockAdapter::ok(SourceKind::Noaa, vec![event(SourceKind::Noaa, Severity::Low)]),
            MockAdapter::failing(SourceKind::Fred, ApiStatus::NotConfigured, "FRED API key not configured"),
        ],
        Some(Arc::new(MemorySink::new("raw_events"))),
    );
    let mut store = ContextStore::new();

    collector.collect_all_sources("NOAA", false, &mut store).await;
    collector.collect_all_sources("FRED", false, &mut store).await;

    let counters = &store.data_collector;
    assert!(counters.initialized);
    assert_eq!(counters.total_collections, 2);
    assert_eq!(counters.successful_collections, 1);
    assert_eq!(counters.failed_collections, 1);
    assert_eq!(counters.total_events_published, 1);
    assert_eq!(counters.error_count, 1);
    assert!(counters.last_collection_time.is_some());

    let last = store.last_collection.as_ref().expect("summary recorded");
    assert!(last.sources_processed.is_empty());
    assert_eq!(last.errors.len(), 1);
}

#[tokio::test]
async fn cancellation_stops_before_the_next_source() {
    let log = call_log();
    let collector = collector_with(all_sources_ok(&log), None);
    collector.cancel();
    let mut store = ContextStore::new();

    let report = collector.collect_all_sources("all", false, &mut store).await;

    assert!(report.cancelled);
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(report.errors, vec!["cancelled before NOAA"]);
}

#[tokio::test]
async fn cancel_stops_one_run_only() {
    let log = call_log();
    let collector = collector_with(all_sources_ok(&log), None);
    let mut store = ContextStore::new();

    collector.cancel();
    let stopped = collector.collect_all_sources("all", false, &mut store).await;
    assert!(stopped.cancelled);

    let next = collector.collect_all_sources("all", false, &mut store).await;
    assert!(!next.cancelled);
    assert!(next.errors.is_empty());
    assert_eq!(log.lock().unwrap().len(), 5);

    collector.cancel();
    let emergency = collector
        .emergency_collect(&["port strike".to_string()], "", None, &mut store)
        .await;
    assert_eq!(emergency.errors.len(), 1);
    let emergency = collector
        .emergency_collect(&["port strike".to_string()], "", None, &mut store)
        .await;
    assert!(emergency.errors.is_empty());
}

// ---------------------------------------------------------------------------
// Emergency collection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn emergency_publishes_highest_severity_first() {
    let log = call_log();
    let sink = Arc::new(MemorySink::new("raw_events"));
    let collector = collector_with(
        vec![
            MockAdapter::ok(
                SourceKind::Gdelt,
                vec![
                    event(SourceKind::Gdelt, Severity::Low),
                    event(SourceKind::Gdelt, Severity::Critical),
                ],
            )
            .logged(&log),
            MockAdapter::ok(
                SourceKind::Twitter,
                vec![
                    event(SourceKind::Twitter, Severity::Medium),
                    event(SourceKind::Twitter, Severity::High),
                ],
            )
            .logged(&log),
            MockAdapter::ok(SourceKind::Noaa, vec![event(SourceKind::Noaa, Severity::Critical)]).logged(&log),
        ],
        Some(sink.clone()),
    );
    let mut store = ContextStore::new();
    let keywords = vec!["port strike".to_string()];

    let report = collector
        .emergency_collect(&keywords, "West Coast", None, &mut store)
        .await;

    assert_eq!(
        *log.lock().unwrap(),
        vec![SourceKind::Gdelt, SourceKind::Twitter, SourceKind::Noaa]
    );
    assert_eq!(report.total_events_collected, 5);
    assert_eq!(report.high_priority_events, 3);
    assert!(report.emergency_id.starts_with("emergency_"));
    assert_eq!(
        sink.sent_severities(),
        vec!["critical", "critical", "high", "medium", "low"]
    );
    assert!(store.emergency_active(Utc::now()));
    let state = store.emergency.as_ref().expect("emergency recorded");
    assert_eq!(state.crisis_keywords, keywords);
    assert_eq!(state.geographic_focus, "West Coast");
    assert!(state.expires_at.is_some());
}

#[tokio::test]
async fn emergency_uses_raised_limits_and_focus() {
    let gdelt = Arc::new(MockAdapter::ok(SourceKind::Gdelt, vec![]));
    let twitter = Arc::new(MockAdapter::ok(SourceKind::Twitter, vec![]));
    let noaa = Arc::new(MockAdapter::ok(SourceKind::Noaa, vec![]));
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![gdelt.clone(), twitter.clone(), noaa.clone()];
    let collector = collector_from(adapters, None);
    let mut store = ContextStore::new();

    collector
        .emergency_collect(&["flood".to_string()], "TX", None, &mut store)
        .await;

    assert_eq!(gdelt.requests()[0].max_records, 200);
    let social = &twitter.requests()[0];
    assert_eq!(social.max_records, 200);
    assert!(social.include_retweets);
    assert_eq!(noaa.requests()[0].region.as_deref(), Some("TX"));
}

#[tokio::test]
async fn emergency_keywords_are_capped() {
    let collector = collector_with(vec![], None);
    let keywords: Vec<String> = (0..15).map(|i| format!("kw{i}")).collect();
    let mut store = ContextStore::new();

    let report = collector.emergency_collect(&keywords, "", None, &mut store).await;

    assert_eq!(report.crisis_keywords.len(), 10);
    assert_eq!(report.errors.len(), 3);
}

#[tokio::test]
async fn deactivation_clears_emergency_mode() {
    let collector = collector_with(vec![], None);
    let mut store = ContextStore::new();
    collector
        .emergency_collect(&["strike".to_string()], "", None, &mut store)
        .await;
    assert!(store.emergency_active(Utc::now()));

    assert!(collector.deactivate_emergency(&mut store));
    assert!(!store.emergency_active(Utc::now()));
    assert!(!collector.deactivate_emergency(&mut store));
}

// ---------------------------------------------------------------------------
// System surface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn trigger_marks_health_from_cycle_errors() {
    let collector = collector_with(
        vec![
            MockAdapter::ok(SourceKind::Noaa, vec![event(SourceKind::Noaa, Severity::Low)]),
            MockAdapter::failing(SourceKind::Gdelt, ApiStatus::ApiLimit, "GDELT API returned HTML (possible rate limit)"),
        ],
        Some(Arc::new(MemorySink::new("raw_events"))),
    );
    let system = SupplyChainSystem::new(Some(Arc::new(collector)));
    let mut store = ContextStore::new();

    let healthy = system.trigger_data_collection("NOAA", false, &mut store).await;
    assert!(matches!(healthy, TriggerReport::Success { events_collected: 1, .. }));
    assert_eq!(store.supply_chain_system.system_health, SystemHealth::Healthy);

    system.trigger_data_collection("NOAA,GDELT", false, &mut store).await;
    let counters = &store.supply_chain_system;
    assert_eq!(counters.system_health, SystemHealth::Degraded);
    assert_eq!(counters.collection_cycles, 2);
    assert_eq!(counters.total_events_processed, 2);
    assert!(counters
        .last_error
        .as_deref()
        .is_some_and(|e| e.starts_with("GDELT")));

    let status = system.get_system_status(true, &store);
    assert!(status.collector_available);
    assert_eq!(status.collection_cycles, 2);
    let details = status.details.expect("details requested");
    assert_eq!(details.api_status[&SourceKind::Gdelt], ApiStatus::ApiLimit);
    assert_eq!(details.api_status[&SourceKind::Twitter], ApiStatus::Unknown);
    let last = details.last_collection_summary.expect("a cycle ran");
    assert_eq!(last.errors, 1);
}

#[tokio::test]
async fn emergency_response_expands_crisis_keywords() {
    let collector = collector_with(
        vec![MockAdapter::ok(SourceKind::Gdelt, vec![event(SourceKind::Gdelt, Severity::High)])],
        Some(Arc::new(MemorySink::new("raw_events"))),
    );
    let system = SupplyChainSystem::new(Some(Arc::new(collector)));
    let mut store = ContextStore::new();

    let report = system.emergency_response("logistics", "Rotterdam", &mut store).await;

    let ResponseReport::Success { keywords_used, collection_results, .. } = report else {
        panic!("expected success");
    };
    assert!(keywords_used.contains(&"port strike".to_string()));
    assert_eq!(keywords_used.last().map(String::as_str), Some("Rotterdam"));
    assert_eq!(collection_results.high_priority_events, 1);
    let state = store.emergency.as_ref().expect("emergency recorded");
    assert_eq!(state.crisis_type.as_deref(), Some("logistics"));
    assert!(system.get_system_status(false, &store).emergency_active);
}
