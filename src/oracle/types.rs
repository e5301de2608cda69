//! Payload types for the search provider and the release oracle

use indexmap::IndexMap;
use serde::Deserialize;

use crate::types::UpdateCategory;

/// One search hit, trimmed to the fields the oracle prompt uses
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Aggregated search evidence for one library.
///
/// `latest_version_candidate` is the only scalar the decision core consumes
/// directly; the hit lists feed the oracle prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchContext {
    pub library: String,
    /// Semantically highest version token seen across hits, or empty
    pub latest_version_candidate: String,
    /// Hits that mention a release and (when known) a version above the
    /// current one
    pub filtered: Vec<SearchHit>,
    /// Hits from the roadmap/announcement facet
    pub future_focused: Vec<SearchHit>,
    /// Hit count per facet query, in query order
    pub facet_counts: IndexMap<String, usize>,
}

/// Oracle output exactly as deserialized, before any trust decisions.
///
/// Every field is optional or defaulted; `error` presence means the whole
/// item must be skipped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawAnalysis {
    pub library: String,
    pub version: String,
    pub category: String,
    pub is_released: Option<bool>,
    /// May arrive as a number or a quoted string
    pub confidence: serde_json::Value,
    pub expected_date: String,
    pub release_date: String,
    pub summary: String,
    pub source: String,
    pub error: Option<String>,
}

/// Normalized oracle analysis, the decision engine's input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub library: String,
    /// Cleaned version string, may be empty
    pub version: String,
    pub category: UpdateCategory,
    pub is_released: bool,
    /// Clamped to 0..=100
    pub confidence: i64,
    /// Raw "YYYY-MM-DD or free text" as reported, parsed lazily downstream
    pub expected_date: String,
    pub release_date: String,
    pub summary: String,
    pub source: String,
}
