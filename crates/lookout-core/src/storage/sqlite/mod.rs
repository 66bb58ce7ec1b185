//! SQLite storage backend for saved searches.
//!
//! The database holds one row per saved search plus two child tables: the
//! checkpoint of listings already credited to a search, and the listings
//! waiting to go out in the search's next digest. Child rows cascade with
//! their search. Every engine write runs in a single transaction.

mod row;
mod validation;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{LookoutError, Result};
use crate::filter::FilterSpec;
use crate::listing::ListingId;
use crate::storage::traits::SearchStore;
use crate::storage::types::{
    CheckCommit, CommitOutcome, DiscardReason, NewSavedSearch, SavedSearch, SearchPatch,
};

use row::{parse_timestamp, SearchRow, SEARCH_COLUMNS};
use validation::{normalize_name, validate_user_id};

pub use validation::MAX_NAME_CHARS;

const FORMAT_VERSION: &str = "1";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS saved_searches (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    filters_json TEXT NOT NULL,
    alert_enabled INTEGER NOT NULL,
    alert_frequency TEXT NOT NULL,
    total_matches INTEGER NOT NULL DEFAULT 0,
    new_matches_count INTEGER NOT NULL DEFAULT 0,
    generation INTEGER NOT NULL DEFAULT 0,
    last_checked TEXT NOT NULL,
    last_notified_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS saved_searches_by_user
ON saved_searches (user_id, seq);

-- Checkpoint: listings already counted as new for a search
CREATE TABLE IF NOT EXISTS search_known_listings (
    search_id TEXT NOT NULL,
    listing_id TEXT NOT NULL,

    PRIMARY KEY (search_id, listing_id),
    FOREIGN KEY (search_id) REFERENCES saved_searches(id) ON DELETE CASCADE
);

-- New matches waiting for the next daily/weekly digest
CREATE TABLE IF NOT EXISTS search_pending_digest (
    search_id TEXT NOT NULL,
    listing_id TEXT NOT NULL,

    PRIMARY KEY (search_id, listing_id),
    FOREIGN KEY (search_id) REFERENCES saved_searches(id) ON DELETE CASCADE
);
"#;

/// SQLite-backed saved-search store.
pub struct SqliteSearchStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteSearchStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSearchStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteSearchStore {
    /// Open (creating if needed) a database file.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('format_version', ?)",
            [FORMAT_VERSION],
        )?;
        let version: String = conn.query_row(
            "SELECT value FROM meta WHERE key = 'format_version'",
            [],
            |row| row.get(0),
        )?;
        if version != FORMAT_VERSION {
            return Err(LookoutError::Storage(format!(
                "Unsupported database format version {} (expected {})",
                version, FORMAT_VERSION
            )));
        }

        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Lock the database connection, returning an error if the mutex is poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LookoutError::Storage("SQLite connection poisoned".to_string()))
    }
}

fn sql_int<T: TryInto<i64>>(value: T) -> Result<i64> {
    value
        .try_into()
        .map_err(|_| LookoutError::Storage("Integer out of range for SQLite".to_string()))
}

fn load_listing_ids(conn: &Connection, table: &str, search_id: &str) -> Result<BTreeSet<ListingId>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT listing_id FROM {} WHERE search_id = ?",
        table
    ))?;
    let rows = stmt.query_map([search_id], |row| row.get::<_, String>(0))?;
    let mut ids = BTreeSet::new();
    for row in rows {
        ids.insert(ListingId::new(row?));
    }
    Ok(ids)
}

fn load_search(conn: &Connection, id: &Uuid) -> Result<Option<SavedSearch>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM saved_searches WHERE id = ?", SEARCH_COLUMNS),
            [id.to_string()],
            SearchRow::from_row,
        )
        .optional()?;

    match row {
        Some(row) => {
            let mut search: SavedSearch = row.try_into()?;
            search.known_listing_ids =
                load_listing_ids(conn, "search_known_listings", &id.to_string())?;
            Ok(Some(search))
        }
        None => Ok(None),
    }
}

fn load_searches<P: rusqlite::Params>(
    conn: &Connection,
    where_clause: &str,
    params: P,
) -> Result<Vec<SavedSearch>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM saved_searches {} ORDER BY seq",
        SEARCH_COLUMNS, where_clause
    ))?;
    let rows = stmt.query_map(params, SearchRow::from_row)?;

    let mut searches = Vec::new();
    for row in rows {
        let mut search: SavedSearch = row?.try_into()?;
        search.known_listing_ids =
            load_listing_ids(conn, "search_known_listings", &search.id.to_string())?;
        searches.push(search);
    }
    Ok(searches)
}

/// Current generation of a search, or `None` if it no longer exists.
fn current_generation(conn: &Connection, search_id: &str) -> Result<Option<u64>> {
    let generation: Option<i64> = conn
        .query_row(
            "SELECT generation FROM saved_searches WHERE id = ?",
            [search_id],
            |row| row.get(0),
        )
        .optional()?;
    generation
        .map(|value| {
            u64::try_from(value)
                .map_err(|_| LookoutError::Storage(format!("Negative generation: {}", value)))
        })
        .transpose()
}

impl SearchStore for SqliteSearchStore {
    fn create(&self, search: &NewSavedSearch) -> Result<SavedSearch> {
        validate_user_id(&search.user_id)?;
        let name = normalize_name(&search.name)?;
        let filters = search.filters.canonicalize()?;
        let filters_json = serde_json::to_string(&filters)?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO saved_searches (
                id,
                user_id,
                name,
                filters_json,
                alert_enabled,
                alert_frequency,
                last_checked,
                created_at,
                updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            (
                id.to_string(),
                &search.user_id,
                &name,
                filters_json,
                search.alert_enabled,
                search.alert_frequency.as_str(),
                &now_str,
                &now_str,
                &now_str,
            ),
        )?;

        tracing::debug!(search_id = %id, user_id = %search.user_id, "saved search created");

        Ok(SavedSearch {
            id,
            user_id: search.user_id.clone(),
            name,
            filters,
            alert_enabled: search.alert_enabled,
            alert_frequency: search.alert_frequency,
            known_listing_ids: BTreeSet::new(),
            total_matches: 0,
            new_matches_count: 0,
            generation: 0,
            last_checked: now,
            last_notified_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &Uuid) -> Result<Option<SavedSearch>> {
        let conn = self.lock_conn()?;
        load_search(&conn, id)
    }

    fn list_by_user(&self, user_id: &str) -> Result<Vec<SavedSearch>> {
        let conn = self.lock_conn()?;
        load_searches(&conn, "WHERE user_id = ?", [user_id])
    }

    fn update(&self, caller: &str, id: &Uuid, patch: &SearchPatch) -> Result<SavedSearch> {
        let name = patch.name.as_deref().map(normalize_name).transpose()?;
        let filters = patch
            .filters
            .as_ref()
            .map(FilterSpec::canonicalize)
            .transpose()?;

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let current = load_search(&tx, id)?.ok_or(LookoutError::NotFound(*id))?;
        if !current.is_owned_by(caller) {
            return Err(LookoutError::Unauthorized {
                search_id: *id,
                user_id: caller.to_string(),
            });
        }

        let filters_changed = filters
            .as_ref()
            .is_some_and(|filters| *filters != current.filters);
        let filters_json = serde_json::to_string(filters.as_ref().unwrap_or(&current.filters))?;
        let id_str = id.to_string();

        tx.execute(
            r#"
            UPDATE saved_searches
            SET name = ?, filters_json = ?, alert_enabled = ?, alert_frequency = ?, updated_at = ?
            WHERE id = ?
            "#,
            (
                name.as_deref().unwrap_or(&current.name),
                filters_json,
                patch.alert_enabled.unwrap_or(current.alert_enabled),
                patch
                    .alert_frequency
                    .unwrap_or(current.alert_frequency)
                    .as_str(),
                Utc::now().to_rfc3339(),
                &id_str,
            ),
        )?;

        if filters_changed {
            tx.execute(
                "UPDATE saved_searches SET new_matches_count = 0, generation = generation + 1 WHERE id = ?",
                [&id_str],
            )?;
            tx.execute(
                "DELETE FROM search_known_listings WHERE search_id = ?",
                [&id_str],
            )?;
            tx.execute(
                "DELETE FROM search_pending_digest WHERE search_id = ?",
                [&id_str],
            )?;
            tracing::debug!(search_id = %id, "filters changed, checkpoint reset");
        }

        let updated = load_search(&tx, id)?.ok_or(LookoutError::NotFound(*id))?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete(&self, caller: &str, id: &Uuid) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let owner: Option<String> = tx
            .query_row(
                "SELECT user_id FROM saved_searches WHERE id = ?",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match owner {
            None => Ok(()),
            Some(owner) if owner != caller => Err(LookoutError::Unauthorized {
                search_id: *id,
                user_id: caller.to_string(),
            }),
            Some(_) => {
                tx.execute("DELETE FROM saved_searches WHERE id = ?", [id.to_string()])?;
                tx.commit()?;
                tracing::debug!(search_id = %id, "saved search deleted");
                Ok(())
            }
        }
    }

    fn list_alerting(&self) -> Result<Vec<SavedSearch>> {
        let conn = self.lock_conn()?;
        load_searches(&conn, "WHERE alert_enabled = 1", ())
    }

    fn commit_check(&self, commit: &CheckCommit<'_>) -> Result<CommitOutcome> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let id_str = commit.search_id.to_string();

        match current_generation(&tx, &id_str)? {
            None => return Ok(CommitOutcome::Discarded(DiscardReason::Deleted)),
            Some(generation) if generation != commit.generation => {
                return Ok(CommitOutcome::Discarded(DiscardReason::Stale));
            }
            Some(_) => {}
        }

        let known = load_listing_ids(&tx, "search_known_listings", &id_str)?;
        let new_ids: BTreeSet<ListingId> = commit
            .matches
            .iter()
            .filter(|listing_id| !known.contains(*listing_id))
            .cloned()
            .collect();

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO search_known_listings (search_id, listing_id) VALUES (?, ?)",
            )?;
            for listing_id in &new_ids {
                stmt.execute((&id_str, listing_id.as_str()))?;
            }
        }

        let total_matches = commit.matches.len() as u64;
        tx.execute(
            r#"
            UPDATE saved_searches
            SET total_matches = ?, new_matches_count = new_matches_count + ?, last_checked = ?
            WHERE id = ?
            "#,
            (
                sql_int(total_matches)?,
                sql_int(new_ids.len())?,
                commit.checked_at.to_rfc3339(),
                &id_str,
            ),
        )?;
        tx.commit()?;

        Ok(CommitOutcome::Applied {
            new_ids,
            total_matches,
        })
    }

    fn mark_as_checked(&self, id: &Uuid) -> Result<()> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE saved_searches SET new_matches_count = 0 WHERE id = ?",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(LookoutError::NotFound(*id));
        }
        Ok(())
    }

    fn queue_digest(
        &self,
        id: &Uuid,
        generation: u64,
        ids: &BTreeSet<ListingId>,
    ) -> Result<bool> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let id_str = id.to_string();

        if current_generation(&tx, &id_str)? != Some(generation) {
            return Ok(false);
        }

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO search_pending_digest (search_id, listing_id) VALUES (?, ?)",
            )?;
            for listing_id in ids {
                stmt.execute((&id_str, listing_id.as_str()))?;
            }
        }
        tx.commit()?;
        Ok(true)
    }

    fn take_digest(
        &self,
        id: &Uuid,
        generation: u64,
        now: DateTime<Utc>,
        window: ChronoDuration,
    ) -> Result<BTreeSet<ListingId>> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let id_str = id.to_string();

        if current_generation(&tx, &id_str)? != Some(generation) {
            return Ok(BTreeSet::new());
        }

        let last_notified: Option<String> = tx.query_row(
            "SELECT last_notified_at FROM saved_searches WHERE id = ?",
            [&id_str],
            |row| row.get(0),
        )?;
        if let Some(last_notified) = last_notified.as_deref().map(parse_timestamp).transpose()? {
            if now - last_notified < window {
                return Ok(BTreeSet::new());
            }
        }

        let pending = load_listing_ids(&tx, "search_pending_digest", &id_str)?;
        if pending.is_empty() {
            return Ok(pending);
        }

        tx.execute(
            "DELETE FROM search_pending_digest WHERE search_id = ?",
            [&id_str],
        )?;
        tx.execute(
            "UPDATE saved_searches SET last_notified_at = ? WHERE id = ?",
            (now.to_rfc3339(), &id_str),
        )?;
        tx.commit()?;
        Ok(pending)
    }

    fn record_notified(&self, id: &Uuid, generation: u64, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE saved_searches SET last_notified_at = ? WHERE id = ? AND generation = ?",
            (now.to_rfc3339(), id.to_string(), sql_int(generation)?),
        )?;
        Ok(changed > 0)
    }

    fn total_new_matches(&self, user_id: &str) -> Result<u64> {
        let conn = self.lock_conn()?;
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(new_matches_count), 0) FROM saved_searches WHERE user_id = ? AND alert_enabled = 1",
            [user_id],
            |row| row.get(0),
        )?;
        u64::try_from(total)
            .map_err(|_| LookoutError::Storage(format!("Negative match total: {}", total)))
    }
}
