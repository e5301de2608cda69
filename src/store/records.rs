//! Row types for the persistent store

use chrono::{DateTime, NaiveDate, Utc};

use crate::types::{ComponentKind, FutureStatus, NotifyPreference, UpdateCategory};

/// A registered project with its notification settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub developer_names: String,
    /// Comma-separated list of recipient addresses
    pub developer_emails: String,
    /// Raw preference string, e.g. "major, minor" or "major, future"
    pub notification_type: String,
}

impl Project {
    /// Recipient addresses with empty entries dropped
    pub fn recipients(&self) -> Vec<String> {
        self.developer_emails
            .split(',')
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(|e| e.to_string())
            .collect()
    }

    /// Parse the stored preference string once for the whole pass
    pub fn preference(&self) -> NotifyPreference {
        NotifyPreference::parse(&self.notification_type)
    }
}

/// A dependency declared by one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub id: i64,
    pub project_id: i64,
    pub kind: ComponentKind,
    pub name: String,
    pub version: String,
    pub scope: String,
    /// Set once the component has been linked to a canonical library
    pub library_id: Option<i64>,
}

/// Canonical, deduplicated library record shared by all projects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    pub id: i64,
    /// Normalized lookup key (lowercase, whitespace collapsed to hyphens)
    pub key: String,
    pub name: String,
    pub kind: ComponentKind,
    pub latest_known_version: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// One entry of a library's release history, unique on (library, version)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    pub id: i64,
    pub library_id: i64,
    pub version: String,
    /// Oracle-reported dates are untrusted free text; unparseable ones are
    /// stored as None.
    pub release_date: Option<NaiveDate>,
    pub summary: String,
    pub source_url: String,
    pub security: bool,
}

/// Per-(project, library) notification watermark: the last version this
/// project was told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub project_id: i64,
    pub library_id: i64,
    pub version: String,
    pub category: UpdateCategory,
    pub release_date: String,
    pub summary: String,
    pub source: String,
}

/// Globally tracked not-yet-released update, unique on (library, version)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FutureUpdate {
    pub id: i64,
    pub library_id: i64,
    pub version: String,
    pub confidence: i64,
    pub previous_confidence: Option<i64>,
    pub expected_date: Option<NaiveDate>,
    pub features: String,
    pub source: String,
    pub status: FutureStatus,
    pub notification_sent: bool,
    pub notification_sent_at: Option<DateTime<Utc>>,
    pub change_reason: String,
    /// Set when the tracked version ships and the record is promoted
    pub promoted_release_id: Option<i64>,
}
