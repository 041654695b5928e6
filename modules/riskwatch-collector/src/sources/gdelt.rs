// GDELT DOC 2.0 article search.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use riskwatch_common::{GeoPoint, SourceKind, SupplyChainEvent};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{as_f64, field, text_field, CollectRequest, SourceAdapter, SourceBatch};
use crate::classify::{parse_tone, tone_severity};
use crate::error::SourceError;
use crate::transport::{ApiRequest, HttpTransport};

pub const DOC_API_URL: &str = "https://api.gdeltproject.org/api/v2/doc/doc";

/// Kept short; longer boolean queries make the API answer with an HTML page.
pub const SEARCH_QUERY: &str = "supply chain OR semiconductor OR chip shortage";

pub const MAX_RECORDS_CAP: usize = 100;

#[derive(Debug, Deserialize)]
struct ArticleList {
    #[serde(default)]
    articles: Vec<Map<String, Value>>,
}

pub struct GdeltAdapter {
    transport: Arc<dyn HttpTransport>,
    url: String,
}

impl GdeltAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            url: DOC_API_URL.to_string(),
        }
    }
}

#[async_trait]
impl SourceAdapter for GdeltAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Gdelt
    }

    async fn collect(&self, request: &CollectRequest) -> Result<SourceBatch, SourceError> {
        let max_records = request.max_records.min(MAX_RECORDS_CAP);
        tracing::info!(timespan = %request.timespan, max_records, "gdelt: searching articles");

        let req = ApiRequest::get(&self.url)
            .query("query", SEARCH_QUERY)
            .query("mode", "ArtList")
            .query("format", "json")
            .query("timespan", &request.timespan)
            .query("maxrecords", max_records)
            .query("sort", "DateDesc");

        let resp = self.transport.get(req).await.map_err(|e| match e {
            SourceError::Timeout(_) => SourceError::Timeout("GDELT API request timed out".into()),
            other => other,
        })?;

        match resp.status {
            429 => {
                return Err(SourceError::RateLimited(
                    "GDELT API rate limit exceeded".into(),
                ))
            }
            _ if !resp.is_success() => return Err(SourceError::http(resp.status, &resp.body)),
            _ => {}
        }
        if !resp.is_json() {
            tracing::warn!(
                content_type = resp.content_type.as_deref().unwrap_or(""),
                "gdelt: non-JSON response"
            );
            return Err(SourceError::ApiLimit(
                "GDELT API returned HTML (possible rate limit)".into(),
            ));
        }

        let list: ArticleList = resp.json()?;
        let events = list.articles.into_iter().map(article_to_event).collect();

        Ok(SourceBatch::new(events).with_detail("search_keywords", SEARCH_QUERY))
    }
}

fn article_to_event(article: Map<String, Value>) -> SupplyChainEvent {
    let location = match (
        as_f64(article.get("socialgeolat")),
        as_f64(article.get("socialgeolong")),
    ) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
        _ => None,
    };
    let severity = tone_severity(parse_tone(article.get("tone")));
    let description = text_field(&article, "title")
        .unwrap_or("Supply chain news event")
        .to_string();

    let mut metadata = Map::new();
    for key in ["url", "domain", "language", "tone"] {
        metadata.insert(key.into(), field(&article, key));
    }

    SupplyChainEvent::new(SourceKind::Gdelt, "news_event", Utc::now())
        .with_location(location)
        .with_severity(severity)
        .with_description(description)
        .with_metadata(metadata)
        .with_raw_data(Value::Object(article))
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskwatch_common::Severity;
    use serde_json::json;

    fn article(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn tone_drives_severity() {
        let event = article_to_event(article(json!({"title": "Fab fire", "tone": "-6.1"})));
        assert_eq!(event.severity, Severity::Critical);
        assert_eq!(event.description, "Fab fire");
        assert_eq!(event.metadata["tone"], "-6.1");
    }

    #[test]
    fn location_needs_both_coordinates() {
        let with = article_to_event(article(json!({
            "socialgeolat": "22.3", "socialgeolong": "114.2"
        })));
        assert_eq!(with.location, Some(GeoPoint::new(22.3, 114.2)));

        let half = article_to_event(article(json!({"socialgeolat": "22.3"})));
        assert!(half.location.is_none());

        let junk = article_to_event(article(json!({
            "socialgeolat": "north", "socialgeolong": "114.2"
        })));
        assert!(junk.location.is_none());
    }

    #[test]
    fn untitled_article_gets_default_description() {
        let event = article_to_event(Map::new());
        assert_eq!(event.description, "Supply chain news event");
        assert_eq!(event.severity, Severity::Low);
        assert_eq!(event.event_type, "news_event");
    }
}
