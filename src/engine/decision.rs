//! The update decision engine.
//!
//! Two entry points, both transactional:
//!
//! - [`DecisionEngine::record_library_check`] mutates the canonical library
//!   registry after an oracle call (latest-known version, release history,
//!   promotion of tracked future updates).
//! - [`DecisionEngine::evaluate`] decides whether one analysis is a
//!   notification-worthy event for one (project, library) pair, routing
//!   future-flavored analyses to the lifecycle manager.

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::config::Policy;
use crate::engine::events::{Outcome, ReleasedEvent, SuppressReason, UpdateEvent};
use crate::engine::future;
use crate::error::StoreError;
use crate::oracle::types::Analysis;
use crate::semver::{CompareResult, compare_versions};
use crate::store::records::{Library, Watermark};
use crate::store::{Store, queries};
use crate::types::{ComponentKind, NotifyPreference, UpdateCategory};

/// One (project, library) check request
#[derive(Debug, Clone)]
pub struct CheckRequest<'a> {
    pub project_id: i64,
    pub library_id: i64,
    /// The version the project actually has declared/installed
    pub installed_version: &'a str,
    pub preference: &'a NotifyPreference,
    pub kind: ComponentKind,
}

/// Result of a library-level registry check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryCheck {
    /// Registry advanced to this version (release record upserted)
    Updated { version: String },
    /// Future-flavored analysis; the registry row is untouched
    FuturePath,
    /// Oracle reported no version
    NoVersion,
    /// Detected version equals the latest known one
    SameVersion,
    /// Detected version is older than the latest known one
    Older,
    /// Either side failed to parse; no safe ordering, no mutation
    Unparseable,
}

pub struct DecisionEngine<'a> {
    store: &'a Store,
    policy: &'a Policy,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(store: &'a Store, policy: &'a Policy) -> Self {
        Self { store, policy }
    }

    pub(crate) fn store(&self) -> &Store {
        self.store
    }

    pub(crate) fn policy(&self) -> &Policy {
        self.policy
    }

    /// Fold a successful oracle analysis into the canonical library record.
    ///
    /// Only strictly-newer released versions advance `latest_known_version`;
    /// every advance also writes the (library, version) release history row
    /// and promotes a matching tracked future update.
    pub fn record_library_check(
        &self,
        library: &Library,
        analysis: &Analysis,
    ) -> Result<LibraryCheck, StoreError> {
        if analysis.category == UpdateCategory::Future || !analysis.is_released {
            return Ok(LibraryCheck::FuturePath);
        }
        if analysis.version.is_empty() {
            return Ok(LibraryCheck::NoVersion);
        }

        let now = Utc::now();
        self.store.with_tx(|conn| {
            if let Some(current) = &library.latest_known_version {
                match compare_versions(&analysis.version, current) {
                    CompareResult::Greater => {}
                    CompareResult::Equal => {
                        queries::touch_library_checked(conn, library.id, now)?;
                        return Ok(LibraryCheck::SameVersion);
                    }
                    CompareResult::Less => {
                        queries::touch_library_checked(conn, library.id, now)?;
                        return Ok(LibraryCheck::Older);
                    }
                    CompareResult::Incomparable => {
                        warn!(
                            "[{}] Cannot order detected {} against known {}; leaving registry untouched",
                            library.key, analysis.version, current
                        );
                        return Ok(LibraryCheck::Unparseable);
                    }
                }
            }

            queries::set_library_latest(conn, library.id, &analysis.version, now)?;

            let (release_id, created) = queries::upsert_release_record(
                conn,
                library.id,
                &analysis.version,
                parse_reported_date(&analysis.release_date),
                &analysis.summary,
                &analysis.source,
                false,
            )?;
            if queries::promote_future(conn, library.id, &analysis.version, release_id)? {
                info!(
                    "[{}] Promoted tracked future update {} to released",
                    library.key, analysis.version
                );
            }

            info!(
                "[{}] Registry advanced to {} ({} release record)",
                library.key,
                analysis.version,
                if created { "new" } else { "refreshed" }
            );
            Ok(LibraryCheck::Updated {
                version: analysis.version.clone(),
            })
        })
    }

    /// Decide whether `analysis` is a notification-worthy event for one
    /// (project, library) pair.
    ///
    /// The read-decide-write sequence runs in a single transaction, so two
    /// concurrent checks for the same pair cannot both observe "not yet
    /// cached" and double-notify one version.
    pub fn evaluate(
        &self,
        request: &CheckRequest<'_>,
        analysis: &Analysis,
    ) -> Result<Outcome, StoreError> {
        if analysis.category == UpdateCategory::Future || !analysis.is_released {
            return future::handle_future(self, request, analysis);
        }

        self.store.with_tx(|conn| {
            let mark = queries::watermark(conn, request.project_id, request.library_id)?;
            let cached_version = mark.as_ref().map(|m| m.version.as_str()).unwrap_or("");
            let cached_category = mark.as_ref().map(|m| m.category);

            let new_version = !analysis.version.is_empty() && analysis.version != cached_version;
            let category_escalated = analysis.category == UpdateCategory::Major
                && cached_category != Some(UpdateCategory::Major);
            if !new_version && !category_escalated {
                return Ok(Outcome::Suppressed(SuppressReason::NoNewVersion));
            }

            if !request.preference.wants(analysis.category) {
                return Ok(Outcome::Suppressed(SuppressReason::PreferenceFiltered {
                    category: analysis.category,
                }));
            }

            // Only a decisive comparison may suppress: unparseable versions
            // fall through to the other signals above.
            if !analysis.version.is_empty()
                && !request.installed_version.is_empty()
                && matches!(
                    compare_versions(&analysis.version, request.installed_version),
                    CompareResult::Less | CompareResult::Equal
                )
            {
                return Ok(Outcome::Suppressed(SuppressReason::NotNewer {
                    detected: analysis.version.clone(),
                    installed: request.installed_version.to_string(),
                }));
            }

            queries::upsert_watermark(
                conn,
                &Watermark {
                    project_id: request.project_id,
                    library_id: request.library_id,
                    version: analysis.version.clone(),
                    category: analysis.category,
                    release_date: analysis.release_date.clone(),
                    summary: analysis.summary.clone(),
                    source: analysis.source.clone(),
                },
            )?;

            let (release_id, _) = queries::upsert_release_record(
                conn,
                request.library_id,
                &analysis.version,
                parse_reported_date(&analysis.release_date),
                &analysis.summary,
                &analysis.source,
                false,
            )?;
            if queries::promote_future(conn, request.library_id, &analysis.version, release_id)? {
                info!(
                    "[{}] Promoted tracked future update {} to released",
                    analysis.library, analysis.version
                );
            }

            Ok(Outcome::Notify(UpdateEvent::Released(ReleasedEvent {
                library: analysis.library.clone(),
                version: analysis.version.clone(),
                category: analysis.category,
                release_date: analysis.release_date.clone(),
                summary: analysis.summary.clone(),
                source: analysis.source.clone(),
                kind: request.kind,
            })))
        })
    }
}

/// Best-effort parse of an oracle-reported date. These are untrusted free
/// text ("2025-12-02", "12/02/2025", "Not Confirmed"); failures become
/// `None` and never block an update.
pub(crate) fn parse_reported_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .map_err(|_| {
            debug!("Could not parse reported date {:?}", raw);
        })
        .ok()
}
