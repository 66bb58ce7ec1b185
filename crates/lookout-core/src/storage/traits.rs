//! Storage engine trait definition.
//!
//! The `SearchStore` trait defines the interface that saved-search backends
//! must implement. Owner-facing operations enforce ownership; engine-facing
//! operations are transactional and generation-checked so that a result
//! computed against stale filters, or for a deleted search, is never
//! written back.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::types::{CheckCommit, CommitOutcome, NewSavedSearch, SavedSearch, SearchPatch};
use crate::error::Result;
use crate::listing::ListingId;

/// Persistence interface for saved searches.
///
/// All implementations must ensure:
/// - Checkpoint writes are atomic (no partial `known_listing_ids` update)
/// - `list_by_user` returns searches in insertion order
/// - A filter change resets the checkpoint and bumps the generation
pub trait SearchStore: Send + Sync {
    // --- Owner operations ---

    /// Persist a new saved search.
    ///
    /// The checkpoint starts empty, both counters at zero and
    /// `last_checked = created_at`.
    ///
    /// # Errors
    ///
    /// Returns `LookoutError::Validation` if:
    /// - Name is empty or longer than 50 characters
    /// - Filters are structurally invalid
    /// - User id is empty
    fn create(&self, search: &NewSavedSearch) -> Result<SavedSearch>;

    /// Get a saved search by ID.
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(search))` if found, `Ok(None)` if not found.
    fn get(&self, id: &Uuid) -> Result<Option<SavedSearch>>;

    /// List a user's searches in the order they were created.
    fn list_by_user(&self, user_id: &str) -> Result<Vec<SavedSearch>>;

    /// Apply an owner's patch.
    ///
    /// Changing the filters to a different value clears the checkpoint, the
    /// new-match count and any pending digest. Equal filters are a no-op for
    /// the checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `LookoutError::NotFound` if the id is unknown,
    /// `LookoutError::Unauthorized` if `caller` is not the owner and
    /// `LookoutError::Validation` if the patch is invalid.
    fn update(&self, caller: &str, id: &Uuid, patch: &SearchPatch) -> Result<SavedSearch>;

    /// Delete a saved search. Unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Returns `LookoutError::Unauthorized` if `caller` is not the owner.
    fn delete(&self, caller: &str, id: &Uuid) -> Result<()>;

    // --- Engine operations ---

    /// All searches with alerts enabled, across users.
    fn list_alerting(&self) -> Result<Vec<SavedSearch>>;

    /// Fold a match evaluation into the stored checkpoint.
    ///
    /// The novelty diff is computed against the checkpoint as stored at
    /// commit time.
    fn commit_check(&self, commit: &CheckCommit<'_>) -> Result<CommitOutcome>;

    /// Clear the new-match count, keeping the checkpoint and total.
    ///
    /// # Errors
    ///
    /// Returns `LookoutError::NotFound` if the id is unknown.
    fn mark_as_checked(&self, id: &Uuid) -> Result<()>;

    /// Append listing ids to a search's pending digest.
    ///
    /// Returns `false` if the search is gone or the generation moved.
    fn queue_digest(&self, id: &Uuid, generation: u64, ids: &BTreeSet<ListingId>)
        -> Result<bool>;

    /// Drain the pending digest and stamp `last_notified_at = now`, provided
    /// at least `window` has passed since the last notification.
    ///
    /// Returns an empty set (and stamps nothing) if the window has not
    /// elapsed, nothing is pending, the search is gone, or the generation
    /// moved. The window test and the drain happen in one transaction, so
    /// concurrent callers cannot both send a digest for the same window.
    fn take_digest(
        &self,
        id: &Uuid,
        generation: u64,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<BTreeSet<ListingId>>;

    /// Stamp `last_notified_at = now` for an instant notification.
    ///
    /// Returns `false` (and stamps nothing) if the search is gone or the
    /// generation moved.
    fn record_notified(&self, id: &Uuid, generation: u64, now: DateTime<Utc>) -> Result<bool>;

    /// Sum of `new_matches_count` over a user's alert-enabled searches.
    fn total_new_matches(&self, user_id: &str) -> Result<u64>;
}
