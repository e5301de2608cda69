//! SQLite-backed persistent state for depwatch.
//!
//! Four logical caches live here: canonical libraries, their release
//! history, per-(project, library) notification watermarks, and the global
//! future-update records — plus the registered projects and their declared
//! components.
//!
//! All mutation paths the decision engine uses are composed through
//! [`Store::with_tx`], so a read-decide-write sequence runs as one
//! transaction behind one connection lock. That is what upholds the
//! at-most-once-per-version notification guarantee if the hosting system
//! ever parallelizes library checks.

pub mod queries;
pub mod records;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::records::{Component, FutureUpdate, Library, Project, ReleaseRecord, Watermark};
use crate::types::ComponentKind;

/// Schema migrations
/// Each version contains a list of SQL statements to execute
const MIGRATIONS: &[&[&str]] = &[
    // v1: confidence-delta tracking on future updates
    &[
        "ALTER TABLE future_updates ADD COLUMN previous_confidence INTEGER",
        "ALTER TABLE future_updates ADD COLUMN change_reason TEXT NOT NULL DEFAULT ''",
    ],
    // v2: promotion link from a future update to the release it shipped as
    &["ALTER TABLE future_updates ADD COLUMN promoted_release_id INTEGER"],
];

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn new(db_path: &Path) -> Result<Self, StoreError> {
        info!("Initializing store database at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        debug!("Database connection established");

        let store = Self {
            conn: Mutex::new(conn),
        };

        store.create_schema()?;
        info!("Store initialized successfully");

        Ok(store)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Run several reads and writes as one transaction.
    ///
    /// The closure gets a plain connection handle scoped to the
    /// transaction; on error the transaction rolls back.
    pub fn with_tx<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    fn create_schema(&self) -> Result<(), StoreError> {
        debug!("Creating database schema");

        let conn = self.lock_conn()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                developer_names TEXT NOT NULL DEFAULT '',
                developer_emails TEXT NOT NULL DEFAULT '',
                notification_type TEXT NOT NULL DEFAULT 'major, minor',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS components (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                name TEXT NOT NULL,
                version TEXT NOT NULL,
                scope TEXT NOT NULL DEFAULT '',
                library_id INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
                FOREIGN KEY (library_id) REFERENCES libraries(id)
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_components_project_id ON components(project_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_components_library_id ON components(library_id)",
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS libraries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL DEFAULT 'library',
                latest_known_version TEXT,
                last_checked_at TEXT,
                UNIQUE(key)
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS release_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                library_id INTEGER NOT NULL,
                version TEXT NOT NULL,
                release_date TEXT,
                summary TEXT NOT NULL DEFAULT '',
                source_url TEXT NOT NULL DEFAULT '',
                security INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (library_id) REFERENCES libraries(id) ON DELETE CASCADE,
                UNIQUE(library_id, version)
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS watermarks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                library_id INTEGER NOT NULL,
                version TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT 'minor',
                release_date TEXT NOT NULL DEFAULT '',
                summary TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL DEFAULT '',
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
                FOREIGN KEY (library_id) REFERENCES libraries(id) ON DELETE CASCADE,
                UNIQUE(project_id, library_id)
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS future_updates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                library_id INTEGER NOT NULL,
                version TEXT NOT NULL,
                confidence INTEGER NOT NULL,
                expected_date TEXT,
                features TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'detected',
                notification_sent INTEGER NOT NULL DEFAULT 0,
                notification_sent_at TEXT,
                FOREIGN KEY (library_id) REFERENCES libraries(id) ON DELETE CASCADE,
                UNIQUE(library_id, version)
            )
            "#,
            [],
        )?;

        // Apply migrations
        Self::apply_migrations(&conn)?;

        debug!("Database schema created successfully");
        Ok(())
    }

    /// Apply pending migrations based on user_version pragma
    fn apply_migrations(conn: &Connection) -> Result<(), StoreError> {
        let current_version: i32 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        for (i, statements) in MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i32;
            if version > current_version {
                for sql in *statements {
                    // Handle "duplicate column name" error for existing DBs
                    // that were created before the migration system
                    match conn.execute(sql, []) {
                        Ok(_) => {}
                        Err(rusqlite::Error::SqliteFailure(_, Some(ref msg)))
                            if msg.contains("duplicate column name") =>
                        {
                            debug!("Column already exists, skipping: {}", sql);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                debug!("Applied migration v{}", version);
            }
        }

        let target_version = MIGRATIONS.len() as i32;
        if target_version > current_version {
            conn.pragma_update(None, "user_version", target_version)?;
            debug!("Updated schema version to v{}", target_version);
        }

        Ok(())
    }
}

/// Result of one [`Store::sync_components`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Components newly linked to a canonical library
    pub linked: usize,
    /// Libraries lazily created during the run
    pub created: usize,
}

/// Normalize a component name into a canonical library key:
/// lowercase, runs of whitespace collapsed to a single hyphen.
pub fn normalize_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

impl Store {
    /// Link every not-yet-linked component declaration to its canonical
    /// library, creating libraries lazily.
    ///
    /// Each component is linked in its own transaction, so a declaration is
    /// either fully linked or untouched. Idempotent under re-invocation: a
    /// second run finds nothing left to link.
    pub fn sync_components(&self) -> Result<SyncReport, StoreError> {
        let unlinked = self.with_tx(queries::unlinked_components)?;
        debug!("Found {} unlinked components", unlinked.len());

        let mut report = SyncReport::default();
        for component in unlinked {
            let key = normalize_key(&component.name);
            self.with_tx(|conn| {
                let (library, created) =
                    queries::get_or_create_library(conn, &key, component.name.trim(), component.kind)?;
                queries::link_component(conn, component.id, library.id)?;
                if created {
                    info!("Created library {} for key {}", library.name, library.key);
                    report.created += 1;
                }
                report.linked += 1;
                Ok(())
            })?;
        }

        Ok(report)
    }

    pub fn list_active_libraries(&self) -> Result<Vec<Library>, StoreError> {
        self.with_tx(queries::list_active_libraries)
    }

    // Thin pass-throughs used by the CLI, the scheduler, and tests. The
    // engine composes the underlying query functions inside its own
    // transactions instead.

    pub fn add_project(
        &self,
        name: &str,
        developer_names: &str,
        developer_emails: &str,
        notification_type: &str,
    ) -> Result<i64, StoreError> {
        self.with_tx(|conn| {
            queries::insert_project(conn, name, developer_names, developer_emails, notification_type)
        })
    }

    pub fn add_component(
        &self,
        project_id: i64,
        kind: ComponentKind,
        name: &str,
        version: &str,
        scope: &str,
    ) -> Result<i64, StoreError> {
        self.with_tx(|conn| queries::insert_component(conn, project_id, kind, name, version, scope))
    }

    pub fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.with_tx(queries::list_projects)
    }

    pub fn components_for_project(&self, project_id: i64) -> Result<Vec<Component>, StoreError> {
        self.with_tx(|conn| queries::components_for_project(conn, project_id))
    }

    pub fn library_by_key(&self, key: &str) -> Result<Option<Library>, StoreError> {
        self.with_tx(|conn| queries::library_by_key(conn, key))
    }

    pub fn release_record(
        &self,
        library_id: i64,
        version: &str,
    ) -> Result<Option<ReleaseRecord>, StoreError> {
        self.with_tx(|conn| queries::release_record(conn, library_id, version))
    }

    pub fn watermark(
        &self,
        project_id: i64,
        library_id: i64,
    ) -> Result<Option<Watermark>, StoreError> {
        self.with_tx(|conn| queries::watermark(conn, project_id, library_id))
    }

    pub fn future_update(
        &self,
        library_id: i64,
        version: &str,
    ) -> Result<Option<FutureUpdate>, StoreError> {
        self.with_tx(|conn| queries::future_update(conn, library_id, version))
    }

    /// Administrative cancellation of a tracked future update.
    pub fn cancel_future(&self, library_id: i64, version: &str) -> Result<bool, StoreError> {
        self.with_tx(|conn| queries::cancel_future(conn, library_id, version))
    }
}
