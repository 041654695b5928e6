// Test mocks for the collector.
//
// Three mocks matching the three trait boundaries:
// - MockTransport (HttpTransport): URL → queued canned responses
// - MockAdapter (SourceAdapter): scripted events or a scripted failure
// - MemorySink (EventSink): records payloads, fails on chosen indices
//
// Plus helpers for building events, responses and collectors.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use riskwatch_common::{ApiStatus, Severity, SourceKind, SupplyChainEvent};
use serde_json::Value;

use crate::collect::Collector;
use crate::error::SourceError;
use crate::pacing::Pacing;
use crate::publisher::Publisher;
use crate::settings::CollectorSettings;
use crate::sources::{CollectRequest, SourceAdapter, SourceBatch};
use crate::traits::EventSink;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn event(source: SourceKind, severity: Severity) -> SupplyChainEvent {
    SupplyChainEvent::new(source, "test_event", Utc::now()).with_severity(severity)
}

pub fn json_response(status: u16, body: Value) -> ApiResponse {
    ApiResponse {
        status,
        content_type: Some("application/json".into()),
        body: body.to_string(),
    }
}

pub fn html_response(status: u16) -> ApiResponse {
    ApiResponse {
        status,
        content_type: Some("text/html; charset=utf-8".into()),
        body: "<html><body>Please slow down</body></html>".into(),
    }
}

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Reply {
    Response(ApiResponse),
    Timeout,
}

/// URL-keyed canned responses (query string ignored). Replies for a URL are
/// served in registration order; the last one repeats. Unregistered URLs
/// return a transport error.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, url: &str, response: ApiResponse) -> Self {
        self.push(url, Reply::Response(response));
        self
    }

    pub fn on_json(self, url: &str, status: u16, body: Value) -> Self {
        self.on(url, json_response(status, body))
    }

    pub fn on_timeout(self, url: &str) -> Self {
        self.push(url, Reply::Timeout);
        self
    }

    fn push(&self, url: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Every request seen, in order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, url: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url == url)
            .collect()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, request: ApiRequest) -> Result<ApiResponse, SourceError> {
        self.requests.lock().unwrap().push(request.clone());

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            let queue = replies.get_mut(&request.url).ok_or_else(|| {
                SourceError::Transport(format!(
                    "MockTransport: no response registered for {}",
                    request.url
                ))
            })?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        };

        match reply {
            Some(Reply::Response(resp)) => Ok(resp),
            Some(Reply::Timeout) => Err(SourceError::Timeout("Request timed out".into())),
            None => Err(SourceError::Transport("MockTransport: empty queue".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// MockAdapter
// ---------------------------------------------------------------------------

/// Shared record of which adapters ran, in call order.
pub type CallLog = Arc<Mutex<Vec<SourceKind>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

#[derive(Clone)]
enum Script {
    Events(Vec<SupplyChainEvent>),
    Fails(ApiStatus, String),
}

pub struct MockAdapter {
    kind: SourceKind,
    script: Script,
    log: Option<CallLog>,
    requests: Mutex<Vec<CollectRequest>>,
}

impl MockAdapter {
    pub fn ok(kind: SourceKind, events: Vec<SupplyChainEvent>) -> Self {
        Self {
            kind,
            script: Script::Events(events),
            log: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(kind: SourceKind, status: ApiStatus, message: &str) -> Self {
        Self {
            kind,
            script: Script::Fails(status, message.to_string()),
            log: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn logged(mut self, log: &CallLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    pub fn requests(&self) -> Vec<CollectRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn collect(&self, request: &CollectRequest) -> Result<SourceBatch, SourceError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(log) = &self.log {
            log.lock().unwrap().push(self.kind);
        }
        match &self.script {
            Script::Events(events) => Ok(SourceBatch::new(events.clone())),
            Script::Fails(status, message) => Err(error_for(*status, message)),
        }
    }
}

fn error_for(status: ApiStatus, message: &str) -> SourceError {
    let message = message.to_string();
    match status {
        ApiStatus::NotConfigured => SourceError::NotConfigured(message),
        ApiStatus::Timeout => SourceError::Timeout(message),
        ApiStatus::RateLimited => SourceError::RateLimited(message),
        ApiStatus::ApiLimit => SourceError::ApiLimit(message),
        ApiStatus::AuthFailed => SourceError::AuthFailed(message),
        _ => SourceError::Transport(message),
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// In-memory stream. Payloads at the indices given to `fail_on` (counting
/// every send attempt from 0) are rejected.
pub struct MemorySink {
    topic: String,
    sent: Mutex<Vec<Vec<u8>>>,
    attempts: Mutex<usize>,
    fail_on: HashSet<usize>,
}

impl MemorySink {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            sent: Mutex::new(Vec::new()),
            attempts: Mutex::new(0),
            fail_on: HashSet::new(),
        }
    }

    pub fn fail_on(mut self, indices: &[usize]) -> Self {
        self.fail_on.extend(indices.iter().copied());
        self
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    /// Sent payloads parsed back as JSON.
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent()
            .iter()
            .map(|p| serde_json::from_slice(p).unwrap())
            .collect()
    }

    /// Severities of the sent events, in send order.
    pub fn sent_severities(&self) -> Vec<String> {
        self.sent_json()
            .iter()
            .map(|v| v["severity"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    fn destination(&self) -> &str {
        &self.topic
    }

    async fn send(&self, payload: Vec<u8>) -> Result<String> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let current = *attempts;
            *attempts += 1;
            current
        };
        if self.fail_on.contains(&attempt) {
            bail!("MemorySink: rejected message {attempt}");
        }
        self.sent.lock().unwrap().push(payload);
        Ok(format!("msg-{attempt}"))
    }
}

// ---------------------------------------------------------------------------
// Collector helpers
// ---------------------------------------------------------------------------

/// Collector over mock adapters with no pacing. `sink: None` leaves the
/// publisher uninitialized.
pub fn collector_with(adapters: Vec<MockAdapter>, sink: Option<Arc<MemorySink>>) -> Collector {
    let adapters = adapters
        .into_iter()
        .map(|a| Arc::new(a) as Arc<dyn SourceAdapter>)
        .collect();
    collector_from(adapters, sink)
}

pub fn collector_from(
    adapters: Vec<Arc<dyn SourceAdapter>>,
    sink: Option<Arc<MemorySink>>,
) -> Collector {
    let pacing = Pacing::immediate();
    let sink = sink.map(|s| s as Arc<dyn EventSink>);
    let publisher = Publisher::new(sink, pacing.publish_batches.clone());
    Collector::new(adapters, publisher, CollectorSettings::default(), pacing)
}
