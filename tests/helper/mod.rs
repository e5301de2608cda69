//! Shared fixtures for integration tests

// Each integration test binary uses a subset of these helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use depwatch::error::{MailerError, OracleError, SearchError};
use depwatch::notify::digest::Digest;
use depwatch::notify::mailer::Mailer;
use depwatch::oracle::client::ReleaseOracle;
use depwatch::oracle::search::SearchProvider;
use depwatch::oracle::types::{Analysis, SearchContext};
use depwatch::store::Store;
use depwatch::store::queries;
use depwatch::types::{ComponentKind, UpdateCategory};

pub fn create_test_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::new(&temp_dir.path().join("test.db")).unwrap();
    (temp_dir, store)
}

/// Register a project with one component and run the sync so the component
/// is linked to its canonical library. Returns (project_id, library_id).
pub fn seed_project_with_component(
    store: &Store,
    project_name: &str,
    notify: &str,
    component: &str,
    version: &str,
) -> (i64, i64) {
    let project_id = store
        .add_project(
            project_name,
            "Dev",
            &format!("{project_name}@example.com"),
            notify,
        )
        .unwrap();
    store
        .add_component(project_id, ComponentKind::Library, component, version, "")
        .unwrap();
    store.sync_components().unwrap();

    let library = store
        .library_by_key(&depwatch::store::normalize_key(component))
        .unwrap()
        .unwrap();
    (project_id, library.id)
}

/// Analysis builder with released defaults
pub fn released_analysis(library: &str, version: &str, category: UpdateCategory) -> Analysis {
    Analysis {
        library: library.to_string(),
        version: version.to_string(),
        category,
        is_released: true,
        confidence: 90,
        expected_date: String::new(),
        release_date: "2026-01-15".to_string(),
        summary: format!("{library} {version} release notes"),
        source: format!("https://docs.{library}.org/releases/{version}"),
    }
}

/// Analysis builder for a future/planned version
pub fn future_analysis(library: &str, version: &str, confidence: i64) -> Analysis {
    Analysis {
        library: library.to_string(),
        version: version.to_string(),
        category: UpdateCategory::Future,
        is_released: false,
        confidence,
        expected_date: "2026-09-01".to_string(),
        release_date: String::new(),
        summary: format!("{library} {version} roadmap"),
        source: format!("https://www.reddit.com/r/{library}/planned"),
    }
}

/// Seed a not-yet-notified future update record directly
pub fn seed_unnotified_future(
    store: &Store,
    library_id: i64,
    version: &str,
    confidence: i64,
    source: &str,
) -> i64 {
    store
        .with_tx(|conn| {
            queries::insert_future_update(
                conn,
                &queries::NewFutureUpdate {
                    library_id,
                    version,
                    confidence,
                    expected_date: None,
                    features: "initial roadmap notes",
                    source,
                },
            )
        })
        .unwrap()
}

/// Search provider returning an empty context; the scripted oracle below
/// ignores it anyway.
pub struct StaticSearch;

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search<'a>(
        &'a self,
        name: &'a str,
        _current_version: Option<&'a str>,
        _kind: ComponentKind,
    ) -> Result<SearchContext, SearchError> {
        Ok(SearchContext {
            library: name.to_string(),
            ..SearchContext::default()
        })
    }
}

/// Oracle scripted per library name, counting calls
pub struct ScriptedOracle {
    analyses: HashMap<String, Analysis>,
    failures: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self {
            analyses: HashMap::new(),
            failures: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_analysis(mut self, name: &str, analysis: Analysis) -> Self {
        self.analyses.insert(name.to_string(), analysis);
        self
    }

    pub fn with_failure(mut self, name: &str) -> Self {
        self.failures.push(name.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReleaseOracle for ScriptedOracle {
    async fn analyze(
        &self,
        name: &str,
        _context: &SearchContext,
    ) -> Result<Analysis, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.iter().any(|f| f == name) {
            return Err(OracleError::Analysis("scripted failure".to_string()));
        }
        self.analyses
            .get(name)
            .cloned()
            .ok_or_else(|| OracleError::Analysis(format!("no script for {name}")))
    }
}

/// Mailer that records digests instead of sending them
pub struct RecordingMailer {
    pub sent: Mutex<Vec<Digest>>,
    fail_for: Option<String>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: None,
        }
    }

    pub fn failing_for(project_name: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: Some(project_name.to_string()),
        }
    }

    pub fn sent_digests(&self) -> Vec<Digest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_digest(&self, digest: &Digest) -> Result<String, MailerError> {
        if self.fail_for.as_deref() == Some(digest.project_name.as_str()) {
            return Err(MailerError::Rejected("scripted rejection".to_string()));
        }
        self.sent.lock().unwrap().push(digest.clone());
        Ok("250 accepted".to_string())
    }
}
