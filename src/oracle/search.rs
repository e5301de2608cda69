//! Search-context provider: faceted web search for release evidence

use std::sync::LazyLock;

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::SearchError;
use crate::oracle::types::{SearchContext, SearchHit};
use crate::semver::{CompareResult, compare_versions, find_semantic_max};
use crate::types::ComponentKind;

/// Hits per facet query requested from the search API
const RESULTS_PER_FACET: usize = 10;

/// Keywords a hit must mention to count as release evidence
const RELEASE_KEYWORDS: &[&str] = &["release", "version", "changelog", "notes", "update"];

static VERSION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:\.\d+){1,2}\b").expect("version token regex"));

/// Provider of aggregated search evidence for one component
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Gather release evidence for a component.
    ///
    /// `current_version` narrows the filtered hit list to results that
    /// mention something newer.
    async fn search<'a>(
        &'a self,
        name: &'a str,
        current_version: Option<&'a str>,
        kind: ComponentKind,
    ) -> Result<SearchContext, SearchError>;
}

/// Serper-style search API client
pub struct HttpSearchProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpSearchProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    async fn call_facet(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .client
            .post(&self.base_url)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": RESULTS_PER_FACET, "gl": "us" }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Status(response.status()));
        }

        let body: FacetResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        let mut hits = body.organic;
        hits.extend(body.news);
        Ok(hits)
    }
}

/// Search API response shape; facets we do not use are ignored
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FacetResponse {
    organic: Vec<SearchHit>,
    news: Vec<SearchHit>,
}

fn release_facets(name: &str, kind: ComponentKind) -> Vec<String> {
    let kind_facet = match kind {
        ComponentKind::Language => {
            format!("{name} programming language latest stable version release")
        }
        ComponentKind::Tool => format!("{name} tool latest stable release download"),
        ComponentKind::Library => {
            format!("{name} latest release version site:pypi.org OR site:npmjs.com OR site:crates.io")
        }
    };

    vec![
        kind_facet,
        format!("{name} changelog OR release notes site:github.com OR site:gitlab.com"),
        format!("{name} new features OR breaking changes site:dev.to OR site:medium.com"),
        format!("{name} documentation latest version site:readthedocs.io OR site:{name}.org"),
    ]
}

fn future_facet(name: &str) -> String {
    format!("{name} roadmap OR upcoming release OR next version announcement")
}

/// True when the hit mentions any release keyword in title, link, or snippet
fn mentions_release(hit: &SearchHit) -> bool {
    let title = hit.title.to_lowercase();
    let link = hit.link.to_lowercase();
    let snippet = hit.snippet.to_lowercase();
    RELEASE_KEYWORDS
        .iter()
        .any(|k| title.contains(k) || snippet.contains(k) || link.contains(k))
}

fn version_tokens(hit: &SearchHit) -> Vec<String> {
    let text = format!("{} {}", hit.title, hit.snippet);
    VERSION_TOKEN
        .find_iter(&text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// True when the hit mentions a version strictly above `current`
fn mentions_newer_version(hit: &SearchHit, current: &str) -> bool {
    version_tokens(hit)
        .iter()
        .any(|token| compare_versions(token, current) == CompareResult::Greater)
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search<'a>(
        &'a self,
        name: &'a str,
        current_version: Option<&'a str>,
        kind: ComponentKind,
    ) -> Result<SearchContext, SearchError> {
        let mut context = SearchContext {
            library: name.to_string(),
            ..SearchContext::default()
        };
        let mut merged: Vec<SearchHit> = Vec::new();
        let mut failures = 0usize;

        let facets = release_facets(name, kind);
        for query in &facets {
            match self.call_facet(query).await {
                Ok(hits) => {
                    context.facet_counts.insert(query.clone(), hits.len());
                    merged.extend(hits);
                }
                Err(e) => {
                    warn!("[{}] Search facet failed: {} ({})", name, e, query);
                    context.facet_counts.insert(query.clone(), 0);
                    failures += 1;
                }
            }
        }

        let future_query = future_facet(name);
        match self.call_facet(&future_query).await {
            Ok(hits) => {
                context.facet_counts.insert(future_query, hits.len());
                context.future_focused = hits;
            }
            Err(e) => {
                warn!("[{}] Future facet failed: {}", name, e);
                context.facet_counts.insert(future_query, 0);
                failures += 1;
            }
        }

        if failures == facets.len() + 1 {
            return Err(SearchError::InvalidResponse(
                "every search facet failed".to_string(),
            ));
        }

        context.filtered = merged
            .into_iter()
            .filter(|hit| {
                mentions_release(hit)
                    && match current_version {
                        Some(current) => mentions_newer_version(hit, current),
                        None => true,
                    }
            })
            .collect();

        let tokens: Vec<String> = context
            .filtered
            .iter()
            .chain(context.future_focused.iter())
            .flat_map(version_tokens)
            .collect();
        context.latest_version_candidate = find_semantic_max(&tokens).unwrap_or_default();

        debug!(
            "[{}] {} filtered hits, candidate {:?}",
            name, context.filtered.len(), context.latest_version_candidate
        );

        Ok(context)
    }
}
