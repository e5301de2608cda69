//! Connection-level queries for the store tables.
//!
//! Every function takes a plain `&Connection` so callers can compose several
//! reads and writes inside one transaction via [`Store::with_tx`].
//!
//! [`Store::with_tx`]: crate::store::Store::with_tx

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;

use crate::error::StoreError;
use crate::store::records::{
    Component, FutureUpdate, Library, Project, ReleaseRecord, Watermark,
};
use crate::types::{ComponentKind, FutureStatus};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn parse_field<T: std::str::FromStr>(
    field: &'static str,
    value: String,
) -> Result<T, StoreError> {
    value
        .parse()
        .map_err(|_| StoreError::UnknownVariant { field, value })
}

fn parse_date(value: Option<String>) -> Option<NaiveDate> {
    value.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok())
}

fn format_date(value: Option<NaiveDate>) -> Option<String> {
    value.map(|d| d.format(DATE_FORMAT).to_string())
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

// =============================================================================
// Projects and components
// =============================================================================

pub fn insert_project(
    conn: &Connection,
    name: &str,
    developer_names: &str,
    developer_emails: &str,
    notification_type: &str,
) -> Result<i64, StoreError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        r#"
        INSERT INTO projects (name, developer_names, developer_emails, notification_type, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
        "#,
        (name, developer_names, developer_emails, notification_type, &now),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_projects(conn: &Connection) -> Result<Vec<Project>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, developer_names, developer_emails, notification_type
         FROM projects ORDER BY name",
    )?;
    let projects = stmt
        .query_map([], |row| {
            Ok(Project {
                id: row.get(0)?,
                name: row.get(1)?,
                developer_names: row.get(2)?,
                developer_emails: row.get(3)?,
                notification_type: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(projects)
}

pub fn insert_component(
    conn: &Connection,
    project_id: i64,
    kind: ComponentKind,
    name: &str,
    version: &str,
    scope: &str,
) -> Result<i64, StoreError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        r#"
        INSERT INTO components (project_id, kind, name, version, scope, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
        "#,
        (project_id, kind.as_str(), name, version, scope, &now),
    )?;
    Ok(conn.last_insert_rowid())
}

type RawComponentRow = (i64, i64, String, String, String, String, Option<i64>);

fn map_component_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawComponentRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn finish_component(
    (id, project_id, kind, name, version, scope, library_id): RawComponentRow,
) -> Result<Component, StoreError> {
    Ok(Component {
        id,
        project_id,
        kind: parse_field("component.kind", kind)?,
        name,
        version,
        scope,
        library_id,
    })
}

const COMPONENT_COLUMNS: &str = "id, project_id, kind, name, version, scope, library_id";

pub fn unlinked_components(conn: &Connection) -> Result<Vec<Component>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMPONENT_COLUMNS} FROM components WHERE library_id IS NULL ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([], map_component_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(finish_component).collect()
}

pub fn components_for_project(
    conn: &Connection,
    project_id: i64,
) -> Result<Vec<Component>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMPONENT_COLUMNS} FROM components WHERE project_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([project_id], map_component_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(finish_component).collect()
}

pub fn link_component(
    conn: &Connection,
    component_id: i64,
    library_id: i64,
) -> Result<(), StoreError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE components SET library_id = ?2, updated_at = ?3 WHERE id = ?1",
        (component_id, library_id, &now),
    )?;
    Ok(())
}

// =============================================================================
// Libraries
// =============================================================================

const LIBRARY_COLUMNS: &str = "id, key, name, kind, latest_known_version, last_checked_at";

fn map_library_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, String, String, Option<String>, Option<String>)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn finish_library(
    (id, key, name, kind, latest, checked): (i64, String, String, String, Option<String>, Option<String>),
) -> Result<Library, StoreError> {
    Ok(Library {
        id,
        key,
        name,
        kind: parse_field("library.kind", kind)?,
        latest_known_version: latest,
        last_checked_at: parse_timestamp(checked),
    })
}

/// Find or lazily create the canonical library for a normalized key.
/// Returns the library and whether it was newly created.
pub fn get_or_create_library(
    conn: &Connection,
    key: &str,
    name: &str,
    kind: ComponentKind,
) -> Result<(Library, bool), StoreError> {
    let inserted = conn.execute(
        r#"
        INSERT INTO libraries (key, name, kind)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO NOTHING
        "#,
        (key, name, kind.as_str()),
    )?;

    // The row must exist after the insert-or-ignore above.
    let raw = conn.query_row(
        &format!("SELECT {LIBRARY_COLUMNS} FROM libraries WHERE key = ?1"),
        [key],
        map_library_row,
    )?;
    Ok((finish_library(raw)?, inserted > 0))
}

pub fn library_by_key(conn: &Connection, key: &str) -> Result<Option<Library>, StoreError> {
    let row = conn.query_row(
        &format!("SELECT {LIBRARY_COLUMNS} FROM libraries WHERE key = ?1"),
        [key],
        map_library_row,
    );
    match row {
        Ok(raw) => Ok(Some(finish_library(raw)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Libraries still referenced by at least one live component declaration.
/// Orphaned libraries keep their history but drop out of polling.
pub fn list_active_libraries(conn: &Connection) -> Result<Vec<Library>, StoreError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT DISTINCT l.id, l.key, l.name, l.kind, l.latest_known_version, l.last_checked_at
        FROM libraries l
        JOIN components c ON c.library_id = l.id
        ORDER BY l.key
        "#,
    )?;
    let rows = stmt
        .query_map([], map_library_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(finish_library).collect()
}

pub fn set_library_latest(
    conn: &Connection,
    library_id: i64,
    version: &str,
    checked_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE libraries SET latest_known_version = ?2, last_checked_at = ?3 WHERE id = ?1",
        (library_id, version, checked_at.to_rfc3339()),
    )?;
    Ok(())
}

pub fn touch_library_checked(
    conn: &Connection,
    library_id: i64,
    checked_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE libraries SET last_checked_at = ?2 WHERE id = ?1",
        (library_id, checked_at.to_rfc3339()),
    )?;
    Ok(())
}

// =============================================================================
// Release records
// =============================================================================

const RELEASE_COLUMNS: &str = "id, library_id, version, release_date, summary, source_url, security";

fn map_release_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReleaseRecord> {
    let release_date: Option<String> = row.get(3)?;
    Ok(ReleaseRecord {
        id: row.get(0)?,
        library_id: row.get(1)?,
        version: row.get(2)?,
        release_date: parse_date(release_date),
        summary: row.get(4)?,
        source_url: row.get(5)?,
        security: row.get(6)?,
    })
}

pub fn release_record(
    conn: &Connection,
    library_id: i64,
    version: &str,
) -> Result<Option<ReleaseRecord>, StoreError> {
    let row = conn.query_row(
        &format!("SELECT {RELEASE_COLUMNS} FROM release_records WHERE library_id = ?1 AND version = ?2"),
        (library_id, version),
        map_release_row,
    );
    match row {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Create or refresh the (library, version) release history entry.
///
/// Refresh-on-duplicate is intentional: summaries and sources improve
/// between polls, and the history row should carry the best known text.
/// Returns the row id and whether it was newly created.
pub fn upsert_release_record(
    conn: &Connection,
    library_id: i64,
    version: &str,
    release_date: Option<NaiveDate>,
    summary: &str,
    source_url: &str,
    security: bool,
) -> Result<(i64, bool), StoreError> {
    if let Some(existing) = release_record(conn, library_id, version)? {
        conn.execute(
            r#"
            UPDATE release_records
            SET release_date = ?2, summary = ?3, source_url = ?4
            WHERE id = ?1
            "#,
            (existing.id, format_date(release_date), summary, source_url),
        )?;
        return Ok((existing.id, false));
    }

    conn.execute(
        r#"
        INSERT INTO release_records (library_id, version, release_date, summary, source_url, security)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        (
            library_id,
            version,
            format_date(release_date),
            summary,
            source_url,
            security,
        ),
    )?;
    Ok((conn.last_insert_rowid(), true))
}

// =============================================================================
// Watermarks
// =============================================================================

pub fn watermark(
    conn: &Connection,
    project_id: i64,
    library_id: i64,
) -> Result<Option<Watermark>, StoreError> {
    let row = conn.query_row(
        r#"
        SELECT version, category, release_date, summary, source
        FROM watermarks WHERE project_id = ?1 AND library_id = ?2
        "#,
        (project_id, library_id),
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        },
    );

    match row {
        Ok((version, category, release_date, summary, source)) => Ok(Some(Watermark {
            project_id,
            library_id,
            version,
            category: parse_field("watermark.category", category)?,
            release_date,
            summary,
            source,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn upsert_watermark(conn: &Connection, mark: &Watermark) -> Result<(), StoreError> {
    conn.execute(
        r#"
        INSERT INTO watermarks (project_id, library_id, version, category, release_date, summary, source)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(project_id, library_id) DO UPDATE SET
            version = excluded.version,
            category = excluded.category,
            release_date = excluded.release_date,
            summary = excluded.summary,
            source = excluded.source
        "#,
        (
            mark.project_id,
            mark.library_id,
            &mark.version,
            mark.category.as_str(),
            &mark.release_date,
            &mark.summary,
            &mark.source,
        ),
    )?;
    Ok(())
}

// =============================================================================
// Future updates
// =============================================================================

const FUTURE_COLUMNS: &str = "id, library_id, version, confidence, previous_confidence, \
     expected_date, features, source, status, notification_sent, notification_sent_at, \
     change_reason, promoted_release_id";

type RawFutureRow = (
    i64,
    i64,
    String,
    i64,
    Option<i64>,
    Option<String>,
    String,
    String,
    String,
    bool,
    Option<String>,
    Option<String>,
    Option<i64>,
);

fn map_future_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawFutureRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
    ))
}

fn finish_future(raw: RawFutureRow) -> Result<FutureUpdate, StoreError> {
    let (
        id,
        library_id,
        version,
        confidence,
        previous_confidence,
        expected_date,
        features,
        source,
        status,
        notification_sent,
        notification_sent_at,
        change_reason,
        promoted_release_id,
    ) = raw;
    Ok(FutureUpdate {
        id,
        library_id,
        version,
        confidence,
        previous_confidence,
        expected_date: parse_date(expected_date),
        features,
        source,
        status: parse_field("future.status", status)?,
        notification_sent,
        notification_sent_at: parse_timestamp(notification_sent_at),
        change_reason: change_reason.unwrap_or_default(),
        promoted_release_id,
    })
}

pub fn future_update(
    conn: &Connection,
    library_id: i64,
    version: &str,
) -> Result<Option<FutureUpdate>, StoreError> {
    let row = conn.query_row(
        &format!("SELECT {FUTURE_COLUMNS} FROM future_updates WHERE library_id = ?1 AND version = ?2"),
        (library_id, version),
        map_future_row,
    );
    match row {
        Ok(raw) => Ok(Some(finish_future(raw)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub struct NewFutureUpdate<'a> {
    pub library_id: i64,
    pub version: &'a str,
    pub confidence: i64,
    pub expected_date: Option<NaiveDate>,
    pub features: &'a str,
    pub source: &'a str,
}

pub fn insert_future_update(
    conn: &Connection,
    new: &NewFutureUpdate<'_>,
) -> Result<i64, StoreError> {
    conn.execute(
        r#"
        INSERT INTO future_updates
            (library_id, version, confidence, expected_date, features, source, status, notification_sent)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'detected', 0)
        "#,
        (
            new.library_id,
            new.version,
            new.confidence,
            format_date(new.expected_date),
            new.features,
            new.source,
        ),
    )?;
    Ok(conn.last_insert_rowid())
}

pub struct FutureFieldUpdate<'a> {
    pub confidence: i64,
    pub previous_confidence: Option<i64>,
    pub expected_date: Option<NaiveDate>,
    pub features: &'a str,
    pub source: &'a str,
    pub change_reason: &'a str,
    pub status: FutureStatus,
}

pub fn update_future_fields(
    conn: &Connection,
    id: i64,
    fields: &FutureFieldUpdate<'_>,
) -> Result<(), StoreError> {
    conn.execute(
        r#"
        UPDATE future_updates
        SET confidence = ?2, previous_confidence = ?3, expected_date = ?4,
            features = ?5, source = ?6, change_reason = ?7, status = ?8
        WHERE id = ?1
        "#,
        (
            id,
            fields.confidence,
            fields.previous_confidence,
            format_date(fields.expected_date),
            fields.features,
            fields.source,
            fields.change_reason,
            fields.status.as_str(),
        ),
    )?;
    Ok(())
}

pub fn mark_future_notified(
    conn: &Connection,
    id: i64,
    at: DateTime<Utc>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE future_updates SET notification_sent = 1, notification_sent_at = ?2 WHERE id = ?1",
        (id, at.to_rfc3339()),
    )?;
    Ok(())
}

/// Transition a tracked future update to `released`, linking it to the
/// release record it shipped as. Only `detected`/`confirmed` records move;
/// promotion never resurrects a cancelled entry and is idempotent for
/// already-released ones. Returns whether a row transitioned.
pub fn promote_future(
    conn: &Connection,
    library_id: i64,
    version: &str,
    release_id: i64,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        r#"
        UPDATE future_updates
        SET status = 'released', promoted_release_id = ?3
        WHERE library_id = ?1 AND version = ?2 AND status IN ('detected', 'confirmed')
        "#,
        (library_id, version, release_id),
    )?;
    Ok(changed > 0)
}

/// Administrative cancellation. Never inferred by the engine.
pub fn cancel_future(
    conn: &Connection,
    library_id: i64,
    version: &str,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        r#"
        UPDATE future_updates
        SET status = 'cancelled'
        WHERE library_id = ?1 AND version = ?2 AND status IN ('detected', 'confirmed')
        "#,
        (library_id, version),
    )?;
    Ok(changed > 0)
}
