// X/Twitter v2 recent search, scored for supply-chain relevance.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use riskwatch_common::types::{truncate_description, DESCRIPTION_MAX_CHARS};
use riskwatch_common::{SourceKind, SupplyChainEvent};
use serde::Deserialize;
use serde_json::{json, Map};

use super::{CollectRequest, SourceAdapter, SourceBatch};
use crate::classify::{relevance_score, text_sentiment};
use crate::error::SourceError;
use crate::transport::{ApiRequest, HttpTransport};

pub const SEARCH_URL: &str = "https://api.twitter.com/2/tweets/search/recent";
pub const SEARCH_QUERY: &str = "supply chain OR semiconductor";
pub const RELEVANCE_KEYWORDS: &[&str] = &["supply chain", "semiconductor"];

/// Posts below this relevance are dropped.
pub const RELEVANCE_THRESHOLD: u32 = 3;
/// Upper bound on posts read per call, whatever the caller asks for.
pub const POST_CAP: usize = 50;

/// Page size bounds accepted by the recent search endpoint.
const MIN_PAGE_SIZE: usize = 10;
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    data: Vec<Post>,
    #[serde(default)]
    meta: Option<SearchMeta>,
}

#[derive(Debug, Deserialize)]
struct SearchMeta {
    #[serde(default)]
    next_token: Option<String>,
}

pub struct TwitterAdapter {
    transport: Arc<dyn HttpTransport>,
    bearer_token: Option<String>,
    url: String,
}

impl TwitterAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>, bearer_token: Option<String>) -> Self {
        Self {
            transport,
            bearer_token,
            url: SEARCH_URL.to_string(),
        }
    }

    /// Page through recent search until `limit` posts or the last page.
    async fn search(&self, token: &str, query: &str, limit: usize) -> Result<Vec<Post>, SourceError> {
        let page_size = limit.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
        let mut posts = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut req = ApiRequest::get(&self.url)
                .bearer(token)
                .query("query", query)
                .query("max_results", page_size)
                .query("tweet.fields", "created_at,author_id,public_metrics");
            if let Some(next) = &next_token {
                req = req.query("next_token", next);
            }

            let resp = self.transport.get(req).await?;
            match resp.status {
                429 => {
                    return Err(SourceError::RateLimited(
                        "Twitter API rate limit exceeded".into(),
                    ))
                }
                401 => {
                    return Err(SourceError::AuthFailed(
                        "Twitter authentication failed".into(),
                    ))
                }
                _ if !resp.is_success() => return Err(SourceError::http(resp.status, &resp.body)),
                _ => {}
            }

            let page: SearchPage = resp.json()?;
            let remaining = limit - posts.len();
            posts.extend(page.data.into_iter().take(remaining));

            next_token = page.meta.and_then(|m| m.next_token);
            if posts.len() >= limit || next_token.is_none() {
                break;
            }
        }

        Ok(posts)
    }
}

#[async_trait]
impl SourceAdapter for TwitterAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Twitter
    }

    async fn collect(&self, request: &CollectRequest) -> Result<SourceBatch, SourceError> {
        let token = self
            .bearer_token
            .as_deref()
            .ok_or_else(|| SourceError::NotConfigured("Twitter Bearer Token".into()))?;

        let query = search_query(request.include_retweets);
        let limit = request.max_records.min(POST_CAP);
        tracing::info!(limit, %query, "twitter: searching recent posts");

        let posts = self.search(token, &query, limit).await?;
        let processed = posts.len();
        let events: Vec<SupplyChainEvent> = posts.into_iter().filter_map(post_to_event).collect();

        tracing::info!(events = events.len(), processed, "twitter: relevant posts kept");
        Ok(SourceBatch::new(events).with_detail("tweets_processed", processed))
    }
}

pub fn search_query(include_retweets: bool) -> String {
    if include_retweets {
        SEARCH_QUERY.to_string()
    } else {
        format!("{SEARCH_QUERY} -is:retweet")
    }
}

/// A social signal when the post is relevant enough.
pub fn post_to_event(post: Post) -> Option<SupplyChainEvent> {
    let relevance = relevance_score(&post.text, RELEVANCE_KEYWORDS);
    if relevance < RELEVANCE_THRESHOLD {
        return None;
    }

    let timestamp = post.created_at.unwrap_or_else(Utc::now);
    let mut metadata = Map::new();
    metadata.insert("tweet_id".into(), json!(post.id));
    metadata.insert("author_id".into(), json!(post.author_id));
    metadata.insert("relevance_score".into(), json!(relevance));

    Some(
        SupplyChainEvent::new(SourceKind::Twitter, "social_signal", timestamp)
            .with_severity(text_sentiment(&post.text))
            .with_description(truncate_description(&post.text, DESCRIPTION_MAX_CHARS))
            .with_metadata(metadata)
            .with_raw_data(json!({
                "text": post.text,
                "created_at": timestamp.to_rfc3339(),
            })),
    )
}
