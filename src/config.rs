use serde::Deserialize;
use std::path::PathBuf;

use crate::error::ConfigError;

// =============================================================================
// Policy constants
// =============================================================================

/// Minimum oracle confidence (0-100, inclusive) for a future update to be
/// tracked and notified.
pub const DEFAULT_MIN_CONFIDENCE: i64 = 70;

/// Minimum absolute confidence increase that re-notifies an already-tracked
/// (but not yet notified) future update.
pub const DEFAULT_MIN_CONFIDENCE_DELTA: i64 = 15;

/// Delay between consecutive oracle calls to respect third-party rate limits
/// (1.5 seconds).
pub const DEFAULT_ORACLE_DELAY_MS: u64 = 1_500;

/// Timeout for a single search + oracle round trip (30 seconds).
pub const DEFAULT_ORACLE_TIMEOUT_MS: u64 = 30_000;

/// Time of day the auto-scheduled pass runs at when none is given.
pub const DEFAULT_RUN_TIME: &str = "09:00";

/// Tunable decision thresholds.
///
/// The 70% and 15-point constants are policy knobs, not structural
/// constraints, so they are exposed here instead of being buried in the
/// engine.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Policy {
    /// Minimum confidence for future-update tracking (inclusive)
    pub min_confidence: i64,
    /// Minimum confidence increase for a re-notification
    pub min_confidence_delta: i64,
    /// Inter-call delay between oracle lookups in milliseconds
    pub oracle_delay_ms: u64,
    /// Bound on a single search + oracle round trip in milliseconds
    pub oracle_timeout_ms: u64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            min_confidence_delta: DEFAULT_MIN_CONFIDENCE_DELTA,
            oracle_delay_ms: DEFAULT_ORACLE_DELAY_MS,
            oracle_timeout_ms: DEFAULT_ORACLE_TIMEOUT_MS,
        }
    }
}

// =============================================================================
// External credentials and endpoints
// =============================================================================

pub const DEFAULT_SEARCH_URL: &str = "https://google.serper.dev/search";
pub const DEFAULT_ORACLE_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_ORACLE_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_MAILER_URL: &str = "https://bulk.api.mailtrap.io/api/send";

/// Credentials and endpoints for the external collaborators.
///
/// Missing mandatory variables abort the pass before any oracle call.
#[derive(Debug, Clone)]
pub struct Settings {
    pub search_api_key: String,
    pub search_url: String,
    pub oracle_api_key: String,
    pub oracle_url: String,
    pub oracle_model: String,
    pub mailer_api_key: String,
    pub mailer_url: String,
    pub mailer_from: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            search_api_key: require("DEPWATCH_SEARCH_API_KEY")?,
            search_url: optional("DEPWATCH_SEARCH_URL", DEFAULT_SEARCH_URL),
            oracle_api_key: require("DEPWATCH_ORACLE_API_KEY")?,
            oracle_url: optional("DEPWATCH_ORACLE_URL", DEFAULT_ORACLE_URL),
            oracle_model: optional("DEPWATCH_ORACLE_MODEL", DEFAULT_ORACLE_MODEL),
            mailer_api_key: require("DEPWATCH_MAILER_API_KEY")?,
            mailer_url: optional("DEPWATCH_MAILER_URL", DEFAULT_MAILER_URL),
            mailer_from: require("DEPWATCH_MAILER_FROM")?,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

fn optional(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

// =============================================================================
// Paths
// =============================================================================

/// Returns the path to the data directory for depwatch.
/// Uses $XDG_DATA_HOME/depwatch if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/depwatch,
/// or ./depwatch if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the database file.
pub fn db_path() -> PathBuf {
    data_dir().join("depwatch.db")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("depwatch.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("depwatch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    fn policy_from_partial_object_uses_defaults_for_missing_fields() {
        let result = serde_json::from_value::<Policy>(json!({
            "minConfidence": 80
        }))
        .unwrap();

        assert_eq!(result.min_confidence, 80);
        assert_eq!(result.min_confidence_delta, DEFAULT_MIN_CONFIDENCE_DELTA);
        assert_eq!(result.oracle_delay_ms, DEFAULT_ORACLE_DELAY_MS);
        assert_eq!(result.oracle_timeout_ms, DEFAULT_ORACLE_TIMEOUT_MS);
    }

    #[test]
    fn policy_from_full_object_parses_all_fields() {
        let result = serde_json::from_value::<Policy>(json!({
            "minConfidence": 60,
            "minConfidenceDelta": 20,
            "oracleDelayMs": 100,
            "oracleTimeoutMs": 5000
        }))
        .unwrap();

        assert_eq!(
            result,
            Policy {
                min_confidence: 60,
                min_confidence_delta: 20,
                oracle_delay_ms: 100,
                oracle_timeout_ms: 5000,
            }
        );
    }

    #[test]
    #[serial]
    fn settings_from_env_fails_on_missing_credentials() {
        // SAFETY: env mutation is process-global; tests touching it are
        // serialized and clean up after themselves.
        unsafe {
            std::env::remove_var("DEPWATCH_SEARCH_API_KEY");
            std::env::remove_var("DEPWATCH_ORACLE_API_KEY");
            std::env::remove_var("DEPWATCH_MAILER_API_KEY");
            std::env::remove_var("DEPWATCH_MAILER_FROM");
        }

        let err = Settings::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingVar("DEPWATCH_SEARCH_API_KEY")
        ));
    }

    #[test]
    #[serial]
    fn settings_from_env_applies_endpoint_defaults() {
        unsafe {
            std::env::set_var("DEPWATCH_SEARCH_API_KEY", "sk-search");
            std::env::set_var("DEPWATCH_ORACLE_API_KEY", "sk-oracle");
            std::env::set_var("DEPWATCH_MAILER_API_KEY", "sk-mail");
            std::env::set_var("DEPWATCH_MAILER_FROM", "updates@example.com");
            std::env::remove_var("DEPWATCH_SEARCH_URL");
            std::env::remove_var("DEPWATCH_ORACLE_URL");
            std::env::remove_var("DEPWATCH_ORACLE_MODEL");
            std::env::remove_var("DEPWATCH_MAILER_URL");
        }

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.search_url, DEFAULT_SEARCH_URL);
        assert_eq!(settings.oracle_model, DEFAULT_ORACLE_MODEL);
        assert_eq!(settings.mailer_from, "updates@example.com");

        unsafe {
            std::env::remove_var("DEPWATCH_SEARCH_API_KEY");
            std::env::remove_var("DEPWATCH_ORACLE_API_KEY");
            std::env::remove_var("DEPWATCH_MAILER_API_KEY");
            std::env::remove_var("DEPWATCH_MAILER_FROM");
        }
    }

    #[test]
    fn data_dir_with_env_uses_xdg_data_home_when_set() {
        let path = data_dir_with_env(
            Some("/tmp/test-data".to_string()),
            Some(PathBuf::from("/home/user")),
        );

        assert_eq!(path, PathBuf::from("/tmp/test-data/depwatch"));
    }

    #[test]
    fn data_dir_with_env_falls_back_to_home_local_share() {
        let path = data_dir_with_env(None, Some(PathBuf::from("/home/user")));

        assert_eq!(path, PathBuf::from("/home/user/.local/share/depwatch"));
    }

    #[test]
    fn data_dir_with_env_falls_back_to_current_dir_when_no_dirs_available() {
        let path = data_dir_with_env(None, None);
        assert_eq!(path, PathBuf::from("./depwatch"));
    }
}
