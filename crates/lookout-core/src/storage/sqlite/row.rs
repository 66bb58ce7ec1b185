//! Saved-search row type for database queries.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{LookoutError, Result};
use crate::filter::FilterSpec;
use crate::storage::types::{AlertFrequency, SavedSearch};

/// Column list matching the field order of [`SearchRow::from_row`].
pub const SEARCH_COLUMNS: &str = "id, user_id, name, filters_json, alert_enabled, \
     alert_frequency, total_matches, new_matches_count, generation, last_checked, \
     last_notified_at, created_at, updated_at";

/// Raw row data from the saved_searches table, before parsing into domain types.
#[derive(Debug)]
pub struct SearchRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub filters_json: String,
    pub alert_enabled: bool,
    pub alert_frequency: String,
    pub total_matches: i64,
    pub new_matches_count: i64,
    pub generation: i64,
    pub last_checked: String,
    pub last_notified_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl SearchRow {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            filters_json: row.get(3)?,
            alert_enabled: row.get(4)?,
            alert_frequency: row.get(5)?,
            total_matches: row.get(6)?,
            new_matches_count: row.get(7)?,
            generation: row.get(8)?,
            last_checked: row.get(9)?,
            last_notified_at: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

pub fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| LookoutError::Storage(format!("Invalid UUID: {}", e)))
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|e| LookoutError::Storage(format!("Invalid timestamp: {}", e)))?
        .with_timezone(&Utc))
}

fn to_count(value: i64, column: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| LookoutError::Storage(format!("Negative value in {}: {}", column, value)))
}

impl TryFrom<SearchRow> for SavedSearch {
    type Error = LookoutError;

    fn try_from(row: SearchRow) -> Result<Self> {
        let filters: FilterSpec = serde_json::from_str(&row.filters_json)
            .map_err(|e| LookoutError::Storage(format!("Invalid filters JSON: {}", e)))?;
        let alert_frequency: AlertFrequency = row
            .alert_frequency
            .parse()
            .map_err(|e| LookoutError::Storage(format!("Invalid alert frequency: {}", e)))?;
        let last_notified_at = row
            .last_notified_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;

        Ok(SavedSearch {
            id: parse_uuid(&row.id)?,
            user_id: row.user_id,
            name: row.name,
            filters,
            alert_enabled: row.alert_enabled,
            alert_frequency,
            known_listing_ids: BTreeSet::new(),
            total_matches: to_count(row.total_matches, "total_matches")?,
            new_matches_count: to_count(row.new_matches_count, "new_matches_count")?,
            generation: to_count(row.generation, "generation")?,
            last_checked: parse_timestamp(&row.last_checked)?,
            last_notified_at,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}
