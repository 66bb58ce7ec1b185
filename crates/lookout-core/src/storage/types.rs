//! Core data types for the storage layer.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LookoutError;
use crate::filter::FilterSpec;
use crate::listing::ListingId;

/// How often a saved search wants to hear about new matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertFrequency {
    /// Checked on every scheduler tick, notified on every non-empty delta
    #[default]
    Instant,
    /// Checked and digested once per day
    Daily,
    /// Checked and digested once per week
    Weekly,
}

impl AlertFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertFrequency::Instant => "instant",
            AlertFrequency::Daily => "daily",
            AlertFrequency::Weekly => "weekly",
        }
    }

    /// Whether notifications are batched into a digest.
    pub fn is_digest(&self) -> bool {
        !matches!(self, AlertFrequency::Instant)
    }
}

impl fmt::Display for AlertFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertFrequency {
    type Err = LookoutError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "instant" => Ok(AlertFrequency::Instant),
            "daily" => Ok(AlertFrequency::Daily),
            "weekly" => Ok(AlertFrequency::Weekly),
            other => Err(LookoutError::Validation(format!(
                "Unknown alert frequency: {} (expected instant, daily or weekly)",
                other
            ))),
        }
    }
}

/// A persisted, named filter with alerting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSearch {
    /// Unique identifier, immutable
    pub id: Uuid,

    /// Owner, immutable
    pub user_id: String,

    /// Display name (1-50 characters)
    pub name: String,

    /// Canonical filter criteria
    pub filters: FilterSpec,

    pub alert_enabled: bool,

    pub alert_frequency: AlertFrequency,

    /// Listings already credited to this search's match history
    pub known_listing_ids: BTreeSet<ListingId>,

    /// Size of the most recent full match set
    pub total_matches: u64,

    /// New matches found since the last acknowledgement
    pub new_matches_count: u64,

    /// Bumped whenever a filter change resets the checkpoint
    pub generation: u64,

    pub last_checked: DateTime<Utc>,

    /// When the last notification (instant or digest) went out
    pub last_notified_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl SavedSearch {
    /// Whether `caller` owns this search.
    pub fn is_owned_by(&self, caller: &str) -> bool {
        self.user_id == caller
    }

    /// Time since the last completed check.
    pub fn since_last_check(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_checked
    }
}

/// Builder for creating new saved searches.
#[derive(Debug, Clone)]
pub struct NewSavedSearch {
    pub user_id: String,
    pub name: String,
    pub filters: FilterSpec,
    pub alert_enabled: bool,
    pub alert_frequency: AlertFrequency,
}

impl NewSavedSearch {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, filters: FilterSpec) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            filters,
            alert_enabled: true,
            alert_frequency: AlertFrequency::default(),
        }
    }

    pub fn with_alerts(mut self, enabled: bool) -> Self {
        self.alert_enabled = enabled;
        self
    }

    pub fn with_frequency(mut self, frequency: AlertFrequency) -> Self {
        self.alert_frequency = frequency;
        self
    }
}

/// Owner-supplied changes to a saved search. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct SearchPatch {
    pub name: Option<String>,
    pub filters: Option<FilterSpec>,
    pub alert_enabled: Option<bool>,
    pub alert_frequency: Option<AlertFrequency>,
}

impl SearchPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn filters(mut self, filters: FilterSpec) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn alert_enabled(mut self, enabled: bool) -> Self {
        self.alert_enabled = Some(enabled);
        self
    }

    pub fn alert_frequency(mut self, frequency: AlertFrequency) -> Self {
        self.alert_frequency = Some(frequency);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.filters.is_none()
            && self.alert_enabled.is_none()
            && self.alert_frequency.is_none()
    }
}

/// Result of a match evaluation, ready to be folded into a search's checkpoint.
#[derive(Debug, Clone)]
pub struct CheckCommit<'a> {
    pub search_id: Uuid,

    /// Generation the evaluation was started against
    pub generation: u64,

    /// Full current match set
    pub matches: &'a HashSet<ListingId>,

    pub checked_at: DateTime<Utc>,
}

/// Why a check result was thrown away instead of written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The search was deleted while the check was in flight
    Deleted,
    /// The filters changed while the check was in flight
    Stale,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::Deleted => f.write_str("search deleted"),
            DiscardReason::Stale => f.write_str("filters changed"),
        }
    }
}

/// Outcome of folding a check into the stored checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied {
        new_ids: BTreeSet<ListingId>,
        total_matches: u64,
    },
    Discarded(DiscardReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_saved_search_builder() {
        let filters = FilterSpec::new().brand("porsche");
        let new_search = NewSavedSearch::new("user-1", "Porsches", filters.clone())
            .with_alerts(false)
            .with_frequency(AlertFrequency::Weekly);

        assert_eq!(new_search.user_id, "user-1");
        assert_eq!(new_search.name, "Porsches");
        assert_eq!(new_search.filters, filters);
        assert!(!new_search.alert_enabled);
        assert_eq!(new_search.alert_frequency, AlertFrequency::Weekly);
    }

    #[test]
    fn test_new_saved_search_defaults_to_instant_alerts() {
        let new_search = NewSavedSearch::new("user-1", "Any", FilterSpec::default());
        assert!(new_search.alert_enabled);
        assert_eq!(new_search.alert_frequency, AlertFrequency::Instant);
    }

    #[test]
    fn test_search_patch_builder() {
        assert!(SearchPatch::new().is_empty());

        let patch = SearchPatch::new()
            .name("Renamed")
            .alert_frequency(AlertFrequency::Daily);
        assert!(!patch.is_empty());
        assert_eq!(patch.name.as_deref(), Some("Renamed"));
        assert!(patch.filters.is_none());
        assert_eq!(patch.alert_frequency, Some(AlertFrequency::Daily));
    }

    #[test]
    fn test_alert_frequency_parse() {
        assert_eq!("Daily".parse::<AlertFrequency>().unwrap(), AlertFrequency::Daily);
        assert_eq!(" weekly ".parse::<AlertFrequency>().unwrap(), AlertFrequency::Weekly);
        assert!("hourly".parse::<AlertFrequency>().is_err());
        assert!(AlertFrequency::Daily.is_digest());
        assert!(!AlertFrequency::Instant.is_digest());
    }
}
