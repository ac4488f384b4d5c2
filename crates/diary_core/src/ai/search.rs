//! Bounded web search for study materials.
//!
//! # Responsibility
//! - Define the search collaborator contract.
//! - Run the fixed set of material sub-queries, deduplicate by link and cap
//!   the result count.
//! - Provide a DuckDuckGo HTML backend.
//!
//! # Invariants
//! - Search never fails past this module: a failing sub-query contributes
//!   zero hits and a total failure yields an empty list.
//! - At most `max_results` hits are returned, first occurrence of a link wins.

use async_trait::async_trait;
use log::{debug, warn};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
}

/// Search backend failures. Always recovered locally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("search timed out after {0:?}")]
    Timeout(Duration),
}

/// Search tuning loaded from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub enabled: bool,
    /// Result cap per sub-query.
    pub sub_query_results: usize,
    /// Cap after deduplication.
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sub_query_results: 2,
            max_results: 5,
            timeout_secs: 8,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// Sub-queries issued for one material topic.
pub fn material_sub_queries(topic: &str) -> [String; 3] {
    [
        format!("site:vk.com/video {topic}"),
        format!("{topic} study material"),
        format!("{topic} video lesson"),
    ]
}

/// Runs every material sub-query and merges the hits.
///
/// Sub-queries run one after another; each is bounded by `config.timeout()`.
pub async fn search_materials(
    provider: &dyn SearchProvider,
    topic: &str,
    config: &SearchConfig,
) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for sub_query in material_sub_queries(topic) {
        let outcome = tokio::time::timeout(
            config.timeout(),
            provider.search(&sub_query, config.sub_query_results),
        )
        .await
        .unwrap_or(Err(SearchError::Timeout(config.timeout())));

        match outcome {
            Ok(mut found) => {
                found.truncate(config.sub_query_results);
                debug!("event=search_sub_query module=ai status=ok hits={}", found.len());
                hits.extend(found);
            }
            Err(err) => {
                warn!("event=search_sub_query module=ai status=error error={err}");
            }
        }
    }
    dedupe_and_cap(hits, config.max_results)
}

/// Keeps the first hit per link and truncates to `max_results`.
pub fn dedupe_and_cap(hits: Vec<SearchHit>, max_results: usize) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    let mut unique: Vec<SearchHit> = hits
        .into_iter()
        .filter(|hit| seen.insert(hit.link.clone()))
        .collect();
    unique.truncate(max_results);
    unique
}

const DUCKDUCKGO_HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// DuckDuckGo HTML-endpoint scraper.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: DUCKDUCKGO_HTML_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("q", query)])
            .send()
            .await
            .map_err(|e| SearchError::Http(format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| SearchError::Http(e.to_string()))?;
        let html = response
            .text()
            .await
            .map_err(|e| SearchError::Http(format!("response read failed: {e}")))?;
        parse_duckduckgo_html(&html, max_results)
    }
}

/// Parses DuckDuckGo's HTML result page.
pub fn parse_duckduckgo_html(html: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
    let document = Html::parse_document(html);
    let result_sel = Selector::parse(".result:not(.result--ad)")
        .map_err(|e| SearchError::Parse(format!("invalid result selector: {e:?}")))?;
    let title_sel = Selector::parse(".result__a")
        .map_err(|e| SearchError::Parse(format!("invalid title selector: {e:?}")))?;

    let hits = document
        .select(&result_sel)
        .filter_map(|element| {
            let anchor = element.select(&title_sel).next()?;
            let title = anchor.text().collect::<String>().trim().to_string();
            let link = unwrap_redirect(anchor.value().attr("href")?)?;
            (!title.is_empty()).then_some(SearchHit { title, link })
        })
        .take(max_results)
        .collect();
    Ok(hits)
}

/// Resolves `//duckduckgo.com/l/?uddg=<encoded>` wrappers to the target URL.
fn unwrap_redirect(href: &str) -> Option<String> {
    let full = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let parsed = Url::parse(&full).ok()?;
    if parsed.host_str() == Some("duckduckgo.com") && parsed.path().starts_with("/l/") {
        return parsed
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, value)| value.into_owned());
    }
    Some(full)
}
