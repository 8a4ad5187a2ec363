//! Web and news search with canned fallbacks
//!
//! A single attempt against the live search backend; on failure the
//! provider degrades to a small keyword-matched table of canned
//! responses. It never raises to its caller and never returns an empty
//! sequence — search quality degrades, availability does not.

use crate::error::AdvisorError;
use crate::models::{NewsResult, SearchResult};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Topic keyword → canned response body, matched case-insensitively
/// against the query.
const FALLBACK_TOPICS: &[(&str, &str)] = &[
    (
        "nifty",
        "Market analysis shows mixed sentiment with banking stocks leading gains while IT sector faces headwinds.",
    ),
    (
        "investment",
        "Current market conditions suggest diversified approach with focus on large-cap stocks and defensive sectors.",
    ),
    (
        "stock",
        "Market volatility continues with selective stock picking being crucial for returns.",
    ),
    (
        "gold",
        "Gold prices showing stability amid global uncertainties, making it attractive for portfolio diversification.",
    ),
];

const GENERIC_FALLBACK: &str =
    "Current market conditions show mixed signals with opportunities in selective sectors.";

/// Seam for the live search source.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
    async fn search_news(&self, query: &str, max_results: usize) -> Result<Vec<NewsResult>>;
}

/// HTTP search backend against a configured JSON search API.
pub struct HttpSearchBackend {
    client: Client,
    base_url: String,
}

impl HttpSearchBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, path: &str, query: &str, max_results: usize) -> Result<Value> {
        if self.base_url.is_empty() {
            return Err(AdvisorError::SearchError(
                "SEARCH_API_URL is not configured".to_string(),
            ));
        }

        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(&[("q", query), ("max_results", &max_results.to_string())])
            .send()
            .await
            .map_err(|e| AdvisorError::SearchError(format!("Search request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AdvisorError::SearchError(format!(
                "Search API returned {}",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AdvisorError::SearchError(format!("Invalid search response: {}", e)))
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let body = self.fetch("/search", query, max_results).await?;

        let results = body
            .get("results")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .take(max_results)
                    .map(|item| SearchResult {
                        title: str_field(item, "title"),
                        body: str_field(item, "body"),
                        link: str_field(item, "href"),
                        timestamp: Utc::now(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }

    async fn search_news(&self, query: &str, max_results: usize) -> Result<Vec<NewsResult>> {
        let body = self.fetch("/news", query, max_results).await?;

        let results = body
            .get("results")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .take(max_results)
                    .map(|item| NewsResult {
                        title: str_field(item, "title"),
                        body: str_field(item, "body"),
                        url: str_field(item, "url"),
                        date: str_field(item, "date"),
                        source: str_field(item, "source"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }
}

fn str_field(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Search provider wrapping a backend with the fallback policy.
pub struct WebSearchProvider {
    backend: Box<dyn SearchBackend>,
}

impl WebSearchProvider {
    pub fn new(backend: Box<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    /// Web search. Infallible and never empty.
    pub async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        match self.backend.search(query, max_results).await {
            Ok(results) if !results.is_empty() => results,
            Ok(_) => {
                warn!("Search returned no results for '{}', using fallback", query);
                vec![fallback_search_result(query)]
            }
            Err(e) => {
                warn!("Search failed for '{}': {}", query, e);
                vec![fallback_search_result(query)]
            }
        }
    }

    /// News search. Infallible and never empty. The query is suffixed
    /// to bias toward Indian financial news, as the live source expects.
    pub async fn search_news(&self, query: &str, max_results: usize) -> Vec<NewsResult> {
        let news_query = format!("{} financial news India", query);
        match self.backend.search_news(&news_query, max_results).await {
            Ok(results) if !results.is_empty() => results,
            Ok(_) => {
                warn!("News search returned no results for '{}'", query);
                vec![fallback_news_result()]
            }
            Err(e) => {
                warn!("News search failed for '{}': {}", query, e);
                vec![fallback_news_result()]
            }
        }
    }
}

fn fallback_search_result(query: &str) -> SearchResult {
    let lowered = query.to_lowercase();
    for (key, body) in FALLBACK_TOPICS {
        if lowered.contains(key) {
            return SearchResult {
                title: format!("Market Analysis: {}", query),
                body: (*body).to_string(),
                link: String::new(),
                timestamp: Utc::now(),
            };
        }
    }

    SearchResult {
        title: "Market Update".to_string(),
        body: GENERIC_FALLBACK.to_string(),
        link: String::new(),
        timestamp: Utc::now(),
    }
}

fn fallback_news_result() -> NewsResult {
    NewsResult {
        title: "Market News Update".to_string(),
        body: "Financial markets continue to show resilience with sector rotation ongoing."
            .to_string(),
        url: String::new(),
        date: Utc::now().to_rfc3339(),
        source: "Market Analysis".to_string(),
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    /// Backend that fails every request.
    pub struct FailingSearchBackend;

    #[async_trait]
    impl SearchBackend for FailingSearchBackend {
        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchResult>> {
            Err(AdvisorError::SearchError("forced failure".to_string()))
        }

        async fn search_news(&self, _query: &str, _max: usize) -> Result<Vec<NewsResult>> {
            Err(AdvisorError::SearchError("forced failure".to_string()))
        }
    }

    /// Backend returning one fixed result per request.
    pub struct FixedSearchBackend;

    #[async_trait]
    impl SearchBackend for FixedSearchBackend {
        async fn search(&self, query: &str, _max: usize) -> Result<Vec<SearchResult>> {
            Ok(vec![SearchResult {
                title: format!("Result for {}", query),
                body: "Live search body.".to_string(),
                link: "https://example.com".to_string(),
                timestamp: Utc::now(),
            }])
        }

        async fn search_news(&self, query: &str, _max: usize) -> Result<Vec<NewsResult>> {
            Ok(vec![NewsResult {
                title: format!("News for {}", query),
                body: "Live news body.".to_string(),
                url: "https://example.com/news".to_string(),
                date: Utc::now().to_rfc3339(),
                source: "Live Wire".to_string(),
            }])
        }
    }
}
