//! Tagged event and outcome types produced by the decision engine

use std::fmt;

use crate::types::{ComponentKind, UpdateCategory};

/// A released version a project should hear about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedEvent {
    pub library: String,
    pub version: String,
    pub category: UpdateCategory,
    pub release_date: String,
    pub summary: String,
    pub source: String,
    pub kind: ComponentKind,
}

/// First detection of a not-yet-released version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FutureEvent {
    pub library: String,
    pub version: String,
    pub confidence: i64,
    pub expected_date: String,
    pub summary: String,
    pub source: String,
    pub kind: ComponentKind,
}

/// Re-notification after a significant confidence increase on a tracked
/// future update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfidenceEvent {
    pub library: String,
    pub version: String,
    pub old_confidence: i64,
    pub new_confidence: i64,
    pub change_reason: String,
    pub expected_date: String,
    pub summary: String,
    pub source: String,
    pub kind: ComponentKind,
}

/// A notification-worthy event, ready for digest assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    Released(ReleasedEvent),
    Future(FutureEvent),
    ConfidenceUpdate(ConfidenceEvent),
}

impl UpdateEvent {
    pub fn library(&self) -> &str {
        match self {
            UpdateEvent::Released(e) => &e.library,
            UpdateEvent::Future(e) => &e.library,
            UpdateEvent::ConfidenceUpdate(e) => &e.library,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            UpdateEvent::Released(e) => &e.version,
            UpdateEvent::Future(e) => &e.version,
            UpdateEvent::ConfidenceUpdate(e) => &e.version,
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            UpdateEvent::Released(e) => &e.summary,
            UpdateEvent::Future(e) => &e.summary,
            UpdateEvent::ConfidenceUpdate(e) => &e.summary,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            UpdateEvent::Released(e) => &e.source,
            UpdateEvent::Future(e) => &e.source,
            UpdateEvent::ConfidenceUpdate(e) => &e.source,
        }
    }

    /// Date column for digest rendering: release date for released events,
    /// expected date otherwise.
    pub fn date_label(&self) -> &str {
        match self {
            UpdateEvent::Released(e) => &e.release_date,
            UpdateEvent::Future(e) => &e.expected_date,
            UpdateEvent::ConfidenceUpdate(e) => &e.expected_date,
        }
    }

    pub fn category_label(&self) -> &'static str {
        match self {
            UpdateEvent::Released(e) => e.category.as_str(),
            UpdateEvent::Future(_) => "future",
            UpdateEvent::ConfidenceUpdate(_) => "confidence_update",
        }
    }

    /// True for events that describe something not yet shipped
    pub fn is_future_flavored(&self) -> bool {
        matches!(
            self,
            UpdateEvent::Future(_) | UpdateEvent::ConfidenceUpdate(_)
        )
    }
}

/// Why a check produced no event. Callers log these; the engine never
/// silently drops a detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressReason {
    /// Oracle returned no version at all
    EmptyVersion,
    /// Detected version matches the watermark and the category brings no
    /// escalation
    NoNewVersion,
    /// The project's preference excludes this category
    PreferenceFiltered { category: UpdateCategory },
    /// Detected version is not strictly newer than what the project runs
    NotNewer { detected: String, installed: String },
    /// Preference lacks the future opt-in token
    FutureOptOut,
    /// Future-update confidence below the tracking threshold
    LowConfidence { confidence: i64, threshold: i64 },
    /// This (library, version) future update was already notified once
    AlreadyNotified,
    /// Future record refreshed, but nothing crossed a notification
    /// threshold
    NoMaterialChange,
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuppressReason::EmptyVersion => write!(f, "no version detected"),
            SuppressReason::NoNewVersion => write!(f, "no new version or category escalation"),
            SuppressReason::PreferenceFiltered { category } => {
                write!(f, "category {} filtered by preference", category.as_str())
            }
            SuppressReason::NotNewer {
                detected,
                installed,
            } => write!(
                f,
                "detected {detected} not newer than installed {installed}"
            ),
            SuppressReason::FutureOptOut => write!(f, "project opted out of future updates"),
            SuppressReason::LowConfidence {
                confidence,
                threshold,
            } => write!(f, "confidence {confidence}% below threshold {threshold}%"),
            SuppressReason::AlreadyNotified => {
                write!(f, "future update already notified for this version")
            }
            SuppressReason::NoMaterialChange => {
                write!(f, "tracked future update refreshed without escalation")
            }
        }
    }
}

/// Outcome of one engine evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Notify(UpdateEvent),
    Suppressed(SuppressReason),
}

impl Outcome {
    pub fn into_event(self) -> Option<UpdateEvent> {
        match self {
            Outcome::Notify(event) => Some(event),
            Outcome::Suppressed(_) => None,
        }
    }
}
