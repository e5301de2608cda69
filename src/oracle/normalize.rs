//! Normalization of untrusted oracle output.
//!
//! The oracle is a language model behind an HTTP API: every field of its
//! reply is free text until proven otherwise. This module turns a
//! [`RawAnalysis`] into a typed [`Analysis`], cross-checked against the
//! search provider's own version candidate.

use tracing::{debug, warn};

use crate::error::OracleError;
use crate::oracle::types::{Analysis, RawAnalysis, SearchContext};
use crate::semver::{CompareResult, clean_version, compare_versions};
use crate::types::UpdateCategory;

/// Fallback confidence when the oracle reports none or nonsense
const DEFAULT_CONFIDENCE: i64 = 50;

/// Confidence penalty applied when the search candidate outranks the
/// oracle's detected version, and the floor it never drops below.
const MISMATCH_PENALTY: i64 = 10;
const MISMATCH_FLOOR: i64 = 30;

/// Summary keywords that mark an update as major when the oracle's own
/// category is missing or unusable
const MAJOR_SIGNALS: &[&str] = &[
    "breaking",
    "deprecated",
    "security",
    "cve",
    "vulnerability",
    "removed",
    "migration",
    "refactor",
    "major",
    "incompatible",
    "upgrade required",
    "critical",
];

/// Infer major/minor from summary text cues
fn coerce_category(summary: &str) -> UpdateCategory {
    let lowered = summary.to_lowercase();
    if MAJOR_SIGNALS.iter().any(|signal| lowered.contains(signal)) {
        UpdateCategory::Major
    } else {
        UpdateCategory::Minor
    }
}

/// Extract the first JSON object from a possibly chatty reply
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn coerce_confidence(value: &serde_json::Value) -> i64 {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(c) if (0..=100).contains(&c) => c,
        _ => DEFAULT_CONFIDENCE,
    }
}

/// Normalize a raw oracle reply into a typed [`Analysis`].
///
/// An `error` field aborts the whole item; everything else is repaired in
/// place: versions are cleaned, unknown categories coerced from the
/// summary, `is_released == false` forces the `future` category, and the
/// search candidate both fills a missing version and overrides a detected
/// version it strictly outranks (with a confidence discount).
pub fn normalize(
    library: &str,
    raw: RawAnalysis,
    context: &SearchContext,
) -> Result<Analysis, OracleError> {
    if let Some(error) = raw.error {
        return Err(OracleError::Analysis(error));
    }

    let mut version = clean_version(&raw.version);
    let mut confidence = coerce_confidence(&raw.confidence);
    let is_released = raw.is_released.unwrap_or(true);

    let category = if !is_released {
        UpdateCategory::Future
    } else {
        raw.category
            .trim()
            .to_lowercase()
            .parse::<UpdateCategory>()
            .unwrap_or_else(|_| coerce_category(&raw.summary))
    };

    let candidate = context.latest_version_candidate.trim();
    if version.is_empty() && !candidate.is_empty() {
        debug!("[{}] No version from oracle, using search candidate {}", library, candidate);
        version = candidate.to_string();
    } else if !candidate.is_empty()
        && compare_versions(candidate, &version) == CompareResult::Greater
    {
        warn!(
            "[{}] Version mismatch: oracle detected {}, but search found {}. Using higher version.",
            library, version, candidate
        );
        version = candidate.to_string();
        confidence = (confidence - MISMATCH_PENALTY).max(MISMATCH_FLOOR);
    }

    Ok(Analysis {
        library: library.to_string(),
        version,
        category,
        is_released,
        confidence,
        expected_date: raw.expected_date.trim().to_string(),
        release_date: raw.release_date.trim().to_string(),
        summary: raw.summary.trim().to_string(),
        source: raw.source.trim().to_string(),
    })
}
