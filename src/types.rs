//! Common domain types shared across the store, engine, and notifier

use std::collections::BTreeSet;
use std::str::FromStr;

/// Kind of stack component a project declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Programming language runtime (e.g. Python, Node.js)
    Language,
    /// Developer tool (e.g. Docker, Terraform)
    Tool,
    /// Third-party library or framework
    Library,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Language => "language",
            ComponentKind::Tool => "tool",
            ComponentKind::Library => "library",
        }
    }
}

impl FromStr for ComponentKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "language" => Ok(ComponentKind::Language),
            "tool" => Ok(ComponentKind::Tool),
            "library" => Ok(ComponentKind::Library),
            _ => Err(()),
        }
    }
}

/// Category of a detected update.
///
/// `Future` is kept alongside `Major`/`Minor` because the per-project
/// watermark stores the legacy tri-state category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateCategory {
    Major,
    Minor,
    Future,
}

impl UpdateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateCategory::Major => "major",
            UpdateCategory::Minor => "minor",
            UpdateCategory::Future => "future",
        }
    }
}

impl FromStr for UpdateCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "major" => Ok(UpdateCategory::Major),
            "minor" => Ok(UpdateCategory::Minor),
            "future" => Ok(UpdateCategory::Future),
            _ => Err(()),
        }
    }
}

/// Lifecycle status of a tracked future update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureStatus {
    /// First seen in search results, not yet corroborated
    Detected,
    /// Corroborated by additional sources
    Confirmed,
    /// Shipped; the record is linked to the matching release record
    Released,
    /// Withdrawn by administrative action, never inferred automatically
    Cancelled,
}

impl FutureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FutureStatus::Detected => "detected",
            FutureStatus::Confirmed => "confirmed",
            FutureStatus::Released => "released",
            FutureStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for FutureStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detected" => Ok(FutureStatus::Detected),
            "confirmed" => Ok(FutureStatus::Confirmed),
            "released" => Ok(FutureStatus::Released),
            "cancelled" => Ok(FutureStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// A project's parsed notification preference.
///
/// Stored as a free-form comma-separated string (`"major, minor"`,
/// `"major, future"`, ...) and parsed once per project rather than
/// re-scanned on every check. Unknown tokens are ignored so a typo in one
/// token does not silence the rest of the preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyPreference {
    categories: BTreeSet<&'static str>,
}

impl NotifyPreference {
    pub fn parse(raw: &str) -> Self {
        let categories = raw
            .split(',')
            .filter_map(|token| token.trim().parse::<UpdateCategory>().ok())
            .map(|c| c.as_str())
            .collect();
        Self { categories }
    }

    pub fn wants(&self, category: UpdateCategory) -> bool {
        self.categories.contains(category.as_str())
    }

    pub fn wants_future(&self) -> bool {
        self.wants(UpdateCategory::Future)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
