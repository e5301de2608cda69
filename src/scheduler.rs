//! The daily check pass: sync, poll, decide, fan out.
//!
//! One pass is strictly sequential: component sync first, then one throttled
//! oracle round trip per active library, then per-project fan-out against
//! the analyses gathered in this pass. A failed oracle call skips that
//! library only; a failed mailer call skips that project only. Nothing here
//! blocks without a bound: every oracle round trip runs under a timeout.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Policy;
use crate::engine::{CheckRequest, DecisionEngine, Outcome};
use crate::error::{ConfigError, OracleError, PassError};
use crate::notify::digest::build_digest;
use crate::notify::mailer::Mailer;
use crate::oracle::client::ReleaseOracle;
use crate::oracle::search::SearchProvider;
use crate::oracle::types::Analysis;
use crate::store::records::Library;
use crate::store::{Store, SyncReport, normalize_key};

/// Collaborators for one pass
pub struct PassDeps<'a> {
    pub store: &'a Store,
    pub search: &'a dyn SearchProvider,
    pub oracle: &'a dyn ReleaseOracle,
    pub mailer: &'a dyn Mailer,
    pub policy: &'a Policy,
}

/// Counters for one completed pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub sync: SyncReport,
    pub libraries_checked: usize,
    pub oracle_failures: usize,
    pub events_emitted: usize,
    pub digests_sent: usize,
    pub mailer_failures: usize,
}

async fn check_library(
    deps: &PassDeps<'_>,
    library: &Library,
) -> Result<Analysis, OracleError> {
    let context = deps
        .search
        .search(
            &library.name,
            library.latest_known_version.as_deref(),
            library.kind,
        )
        .await?;
    deps.oracle.analyze(&library.name, &context).await
}

/// Run one full pass: sync -> per-library oracle calls -> per-project
/// fan-out.
pub async fn run_pass(deps: &PassDeps<'_>) -> Result<PassSummary, PassError> {
    let mut summary = PassSummary {
        sync: deps.store.sync_components()?,
        ..PassSummary::default()
    };
    info!(
        "Synced components: {} linked, {} libraries created",
        summary.sync.linked, summary.sync.created
    );

    let engine = DecisionEngine::new(deps.store, deps.policy);
    let libraries = deps.store.list_active_libraries()?;
    info!("Checking {} active libraries", libraries.len());

    // One oracle call per distinct library per pass; projects are checked
    // against these cached analyses afterwards.
    let mut analyses: HashMap<i64, Analysis> = HashMap::new();
    let timeout = Duration::from_millis(deps.policy.oracle_timeout_ms);
    for (i, library) in libraries.iter().enumerate() {
        if i > 0 {
            sleep(Duration::from_millis(deps.policy.oracle_delay_ms)).await;
        }

        let analysis = match tokio::time::timeout(timeout, check_library(deps, library)).await {
            Err(_) => {
                warn!(
                    "[{}] Oracle round trip exceeded {}ms, skipping for this pass",
                    library.key, deps.policy.oracle_timeout_ms
                );
                summary.oracle_failures += 1;
                continue;
            }
            Ok(Err(e)) => {
                warn!("[{}] Oracle check failed: {}", library.key, e);
                summary.oracle_failures += 1;
                continue;
            }
            Ok(Ok(analysis)) => analysis,
        };

        let check = engine.record_library_check(library, &analysis)?;
        debug!("[{}] Library registry check: {:?}", library.key, check);
        analyses.insert(library.id, analysis);
        summary.libraries_checked += 1;
    }

    // Fan-out: all qualifying events for a project go out in one digest;
    // zero events, zero calls.
    for project in deps.store.list_projects()? {
        let preference = project.preference();
        let components = deps.store.components_for_project(project.id)?;

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut events = Vec::new();
        for component in &components {
            let Some(library_id) = component.library_id else {
                continue;
            };
            if !seen.insert((normalize_key(&component.name), component.version.clone())) {
                continue;
            }
            let Some(analysis) = analyses.get(&library_id) else {
                continue;
            };

            let request = CheckRequest {
                project_id: project.id,
                library_id,
                installed_version: &component.version,
                preference: &preference,
                kind: component.kind,
            };
            match engine.evaluate(&request, analysis)? {
                Outcome::Notify(event) => events.push(event),
                Outcome::Suppressed(reason) => {
                    debug!("[{}:{}] No event: {}", project.name, component.name, reason);
                }
            }
        }

        summary.events_emitted += events.len();
        let Some(digest) = build_digest(&project, events) else {
            continue;
        };
        match deps.mailer.send_digest(&digest).await {
            Ok(status) => {
                info!(
                    "Sent digest with {} events to {} ({})",
                    digest.events.len(),
                    project.name,
                    status
                );
                summary.digests_sent += 1;
            }
            Err(e) => {
                // One project's mailer failure never blocks the others
                warn!("[{}] Digest delivery failed: {}", project.name, e);
                summary.mailer_failures += 1;
            }
        }
    }

    info!(
        "Pass complete: {} libraries checked ({} oracle failures), {} events, {} digests sent ({} failures)",
        summary.libraries_checked,
        summary.oracle_failures,
        summary.events_emitted,
        summary.digests_sent,
        summary.mailer_failures
    );
    Ok(summary)
}

/// Parse an HH:MM (24-hour) run time
pub fn parse_run_time(value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ConfigError::InvalidTime(value.to_string()))
}

/// Time until the next occurrence of `at`, from `now`
pub fn next_run_delay(now: DateTime<Local>, at: NaiveTime) -> Duration {
    let now_naive = now.naive_local();
    let mut next = now.date_naive().and_time(at);
    if next <= now_naive {
        next += chrono::Duration::days(1);
    }
    (next - now_naive).to_std().unwrap_or_default()
}
