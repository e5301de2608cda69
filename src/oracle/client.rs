//! Release-intelligence oracle client.
//!
//! The oracle is an LLM behind an OpenAI-compatible chat-completions API:
//! we hand it the search evidence and it hands back one JSON object with
//! its best-effort version analysis. Everything it returns is untrusted
//! and goes through [`normalize`] before the engine sees it.
//!
//! [`normalize`]: crate::oracle::normalize::normalize

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::OracleError;
use crate::oracle::normalize::{extract_json, normalize};
use crate::oracle::types::{Analysis, RawAnalysis, SearchContext};

/// Upper bound on serialized search evidence shipped in the prompt
const MAX_EVIDENCE_CHARS: usize = 12_000;

/// Future-focused hits quoted verbatim in the prompt
const MAX_FUTURE_SNIPPETS: usize = 3;

const SYSTEM_PROMPT: &str = "You are a precise AI release analyzer. \
You always respond in valid JSON ONLY (no markdown, no explanations). \
Your task: extract and summarize the most relevant version info from the provided search results. \
CRITICAL: ALWAYS prioritize the NEWEST version from the most recent and official sources. \
Ignore results older than 6 months unless no recent information exists. \
If multiple versions are found, return the HIGHEST version number.";

const SCHEMA_HINT: &str = r#"Return JSON like this:
{
  "library": "<name>",
  "version": "<latest_version_number>",
  "category": "major|minor|future",
  "is_released": true|false,
  "confidence": 0-100,
  "expected_date": "YYYY-MM-DD or empty",
  "summary": "3-4 concise bullet points or sentences about new features or changes",
  "release_date": "YYYY-MM-DD or empty if unknown",
  "source": "<official URL>"
}

CRITICAL RULES:
1. Use "future" category ONLY if the version is NOT yet officially released (beta, RC, planned, announced, roadmap).
2. Use "major" or "minor" ONLY for officially released stable versions.
3. Set "is_released" to false for future/planned versions, true for released versions.
4. Set "expected_date" (YYYY-MM-DD format) for future versions if mentioned in sources.
5. Set "release_date" (YYYY-MM-DD format) for released versions only.
6. Provide "confidence" score (0-100) based on source reliability.
7. If you find BOTH a released version AND a future version in results, return the RELEASED version and mention the future version in the summary.
8. Cross-check your detected version against the 'latest version hint' provided. If the hint shows a higher version, use that version instead.
9. When comparing versions, always select the HIGHEST semantic version."#;

/// Structured release analysis for one component
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReleaseOracle: Send + Sync {
    /// Analyze the gathered search evidence for a component.
    ///
    /// An `Err` means the whole item must be skipped for this pass; it
    /// never aborts the run.
    async fn analyze(
        &self,
        name: &str,
        context: &SearchContext,
    ) -> Result<Analysis, OracleError>;
}

/// Chat-completions-backed oracle
pub struct HttpOracle {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpOracle {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            model,
        }
    }

    fn build_prompt(&self, name: &str, context: &SearchContext) -> String {
        let hits: Vec<_> = context
            .filtered
            .iter()
            .map(|hit| json!({"title": hit.title, "link": hit.link, "snippet": hit.snippet}))
            .collect();
        let mut evidence = serde_json::to_string_pretty(&hits).unwrap_or_default();
        if evidence.len() > MAX_EVIDENCE_CHARS {
            // Back off to a char boundary before cutting
            let mut end = MAX_EVIDENCE_CHARS;
            while !evidence.is_char_boundary(end) {
                end -= 1;
            }
            evidence.truncate(end);
        }

        let candidate = if context.latest_version_candidate.is_empty() {
            "unknown"
        } else {
            &context.latest_version_candidate
        };

        let mut future_lines = String::new();
        if !context.future_focused.is_empty() {
            future_lines.push_str("\nUpcoming / planned releases:\n");
            for hit in context.future_focused.iter().take(MAX_FUTURE_SNIPPETS) {
                future_lines.push_str(&format!(
                    "- {} :: {} ({})\n",
                    hit.title.trim(),
                    hit.snippet.trim(),
                    hit.link.trim()
                ));
            }
        }

        format!(
            "Analyze the following search results for the library '{name}'. \
             Find the latest release version, update type (major/minor), date, and summary.\n\n\
             {SCHEMA_HINT}\n\n\
             Latest version hint from search: {candidate}\n\
             {future_lines}\n\
             Search Results:\n{evidence}"
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl ReleaseOracle for HttpOracle {
    async fn analyze(
        &self,
        name: &str,
        context: &SearchContext,
    ) -> Result<Analysis, OracleError> {
        debug!("Requesting oracle analysis for {}", name);

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": self.build_prompt(name, context)},
                ],
                "temperature": 0.2,
                "response_format": {"type": "json_object"},
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OracleError::InvalidResponse(format!(
                "oracle API returned status {}",
                response.status()
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        let content = chat
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| OracleError::InvalidResponse("empty choices".to_string()))?;

        let value = extract_json(content)
            .ok_or_else(|| OracleError::InvalidResponse("no JSON object in reply".to_string()))?;

        let raw: RawAnalysis = serde_json::from_value(value)
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        normalize(name, raw, context)
    }
}
