//! Lifecycle manager for not-yet-released ("future") updates.
//!
//! A future update is tracked globally per (library, version): the first
//! qualifying detection both creates the record and sends the single
//! first-detection notification. After that the record only re-notifies
//! through the confidence-escalation path, and only while the original
//! notification has not gone out; once notified, the first-detection path
//! is terminal for that version.

use chrono::Utc;
use tracing::{debug, info};

use crate::engine::decision::{CheckRequest, DecisionEngine, parse_reported_date};
use crate::engine::events::{ConfidenceEvent, FutureEvent, Outcome, SuppressReason, UpdateEvent};
use crate::error::StoreError;
use crate::oracle::types::Analysis;
use crate::store::queries::{self, FutureFieldUpdate, NewFutureUpdate};
use crate::types::FutureStatus;

/// Domains carrying these markers count as official project sources
const OFFICIAL_INDICATORS: &[&str] = &["official", ".org", "docs.", "blog.", "developer."];

/// Domains carrying these markers count as community chatter
const COMMUNITY_INDICATORS: &[&str] = &["reddit", "medium", "dev.to", "stackoverflow"];

fn domain(url: &str) -> &str {
    url.split('/').nth(2).unwrap_or("")
}

fn is_official(domain: &str) -> bool {
    OFFICIAL_INDICATORS.iter().any(|ind| domain.contains(ind))
}

fn is_community(domain: &str) -> bool {
    COMMUNITY_INDICATORS.iter().any(|ind| domain.contains(ind))
}

/// Human-readable explanation for a confidence increase, based on where
/// the new evidence comes from relative to the old source.
fn confidence_reason(old_source: &str, new_source: &str) -> String {
    if new_source.is_empty() || new_source == old_source {
        return "Increased confidence from same source".to_string();
    }
    let old_domain = domain(old_source);
    let new_domain = domain(new_source);
    if is_official(new_domain) && is_community(old_domain) {
        format!("Featured on official site ({new_domain})")
    } else if is_official(new_domain) {
        format!("Now confirmed on {new_domain}")
    } else {
        format!("Additional source found ({new_domain})")
    }
}

pub(crate) fn handle_future(
    engine: &DecisionEngine<'_>,
    request: &CheckRequest<'_>,
    analysis: &Analysis,
) -> Result<Outcome, StoreError> {
    let label = &analysis.library;

    if !request.preference.wants_future() {
        debug!("[{}] Future update detected but project opted out", label);
        return Ok(Outcome::Suppressed(SuppressReason::FutureOptOut));
    }

    let threshold = engine.policy().min_confidence;
    if analysis.confidence < threshold {
        info!(
            "[{}] Future update confidence too low ({}% < {}%). Version {}, source: {}",
            label,
            analysis.confidence,
            threshold,
            analysis.version,
            if analysis.source.is_empty() { "N/A" } else { &analysis.source }
        );
        return Ok(Outcome::Suppressed(SuppressReason::LowConfidence {
            confidence: analysis.confidence,
            threshold,
        }));
    }

    if analysis.version.is_empty() {
        debug!("[{}] Future update without a version, nothing to track", label);
        return Ok(Outcome::Suppressed(SuppressReason::EmptyVersion));
    }

    let expected_date = parse_reported_date(&analysis.expected_date);
    let min_delta = engine.policy().min_confidence_delta;

    engine.store().with_tx(|conn| {
        let existing = queries::future_update(conn, request.library_id, &analysis.version)?;

        let Some(existing) = existing else {
            // First-time detection: create and notify in one step so this
            // (library, version) can never notify twice.
            let id = queries::insert_future_update(
                conn,
                &NewFutureUpdate {
                    library_id: request.library_id,
                    version: &analysis.version,
                    confidence: analysis.confidence,
                    expected_date,
                    features: &analysis.summary,
                    source: &analysis.source,
                },
            )?;
            queries::mark_future_notified(conn, id, Utc::now())?;

            info!(
                "[{}] Future update notification prepared: v{} (confidence: {}%, expected: {})",
                label,
                analysis.version,
                analysis.confidence,
                if analysis.expected_date.is_empty() { "TBD" } else { &analysis.expected_date }
            );

            return Ok(Outcome::Notify(UpdateEvent::Future(FutureEvent {
                library: analysis.library.clone(),
                version: analysis.version.clone(),
                confidence: analysis.confidence,
                expected_date: analysis.expected_date.clone(),
                summary: analysis.summary.clone(),
                source: analysis.source.clone(),
                kind: request.kind,
            })));
        };

        if existing.notification_sent {
            debug!(
                "[{}] Future update already notified on {}",
                label,
                existing
                    .notification_sent_at
                    .map(|at| at.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "unknown date".to_string())
            );
            return Ok(Outcome::Suppressed(SuppressReason::AlreadyNotified));
        }

        // The record exists but its first notification never went out
        // (created without sending, or a race before the send completed):
        // fold in field deltas and decide whether the confidence climb
        // alone warrants an escalation notice.
        let mut update_needed = false;
        let mut change_reasons: Vec<String> = Vec::new();

        let confidence_increased = analysis.confidence > existing.confidence;
        let confidence_delta = analysis.confidence - existing.confidence;
        let mut confidence = existing.confidence;
        let mut previous_confidence = existing.previous_confidence;
        if confidence_increased {
            previous_confidence = Some(existing.confidence);
            confidence = analysis.confidence;
            update_needed = true;
            change_reasons.push(confidence_reason(&existing.source, &analysis.source));
        }

        let mut features = existing.features.clone();
        if !analysis.summary.is_empty() && analysis.summary != existing.features {
            features = analysis.summary.clone();
            update_needed = true;
            if change_reasons.is_empty() {
                change_reasons.push("Updated feature details available".to_string());
            }
        }

        let mut source = existing.source.clone();
        if !analysis.source.is_empty() && analysis.source != existing.source {
            source = analysis.source.clone();
            update_needed = true;
        }

        let mut stored_expected = existing.expected_date;
        if let Some(new_date) = expected_date
            && Some(new_date) != existing.expected_date
        {
            match existing.expected_date {
                Some(old) if new_date < old => {
                    change_reasons.push(format!("Release date moved earlier (was {old})"));
                }
                Some(_) => change_reasons.push(format!("Release date updated to {new_date}")),
                None => change_reasons.push(format!("Release date now available: {new_date}")),
            }
            stored_expected = Some(new_date);
            update_needed = true;
        }

        if !update_needed {
            return Ok(Outcome::Suppressed(SuppressReason::NoMaterialChange));
        }

        let escalation = confidence_increased && confidence_delta >= min_delta;
        let change_reason = change_reasons.join("; ");
        queries::update_future_fields(
            conn,
            existing.id,
            &FutureFieldUpdate {
                confidence,
                previous_confidence,
                expected_date: stored_expected,
                features: &features,
                source: &source,
                change_reason: &change_reason,
                // A significant confidence climb corroborates the plan
                status: if escalation {
                    FutureStatus::Confirmed
                } else {
                    existing.status
                },
            },
        )?;
        debug!("[{}] Updated tracked future update with new info", label);

        if escalation {
            info!(
                "[{}] Significant confidence increase: {}% -> {}% (+{}%)",
                label, existing.confidence, analysis.confidence, confidence_delta
            );
            return Ok(Outcome::Notify(UpdateEvent::ConfidenceUpdate(
                ConfidenceEvent {
                    library: analysis.library.clone(),
                    version: analysis.version.clone(),
                    old_confidence: existing.confidence,
                    new_confidence: analysis.confidence,
                    change_reason,
                    expected_date: analysis.expected_date.clone(),
                    summary: analysis.summary.clone(),
                    source: analysis.source.clone(),
                    kind: request.kind,
                },
            )));
        }

        Ok(Outcome::Suppressed(SuppressReason::NoMaterialChange))
    })
}
