//! Checkpointed "new match" tracking.
//!
//! A check evaluates a search's filters, credits every match not yet in the
//! search's checkpoint as new, and grows the checkpoint. Checks of the same
//! search are serialized by a per-search lock; the diff is computed inside
//! the store's commit transaction, and a commit is discarded if the search
//! was deleted or its filters changed while the evaluation was running.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{LookoutError, Result};
use crate::listing::ListingId;
use crate::matcher::{Matcher, ResultEntry};
use crate::storage::{CheckCommit, CommitOutcome, SavedSearch, SearchStore};

pub use crate::storage::DiscardReason;

/// Listings that newly matched a search in one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchDelta {
    pub search_id: Uuid,
    /// Generation of the filters the check evaluated
    pub generation: u64,
    pub new_listing_ids: BTreeSet<ListingId>,
    pub total_matches: u64,
    pub checked_at: DateTime<Utc>,
}

impl MatchDelta {
    pub fn is_empty(&self) -> bool {
        self.new_listing_ids.is_empty()
    }
}

/// What happened to a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The result was written back
    Applied(MatchDelta),
    /// The result was thrown away
    Discarded(DiscardReason),
}

impl CheckOutcome {
    pub fn delta(&self) -> Option<&MatchDelta> {
        match self {
            CheckOutcome::Applied(delta) => Some(delta),
            CheckOutcome::Discarded(_) => None,
        }
    }
}

/// Per-search exclusive locks, created on first use.
#[derive(Debug, Default)]
struct SearchLocks {
    slots: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SearchLocks {
    fn slot(&self, id: &Uuid) -> Result<Arc<Mutex<()>>> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| LookoutError::Storage("Search lock registry poisoned".to_string()))?;
        Ok(Arc::clone(slots.entry(*id).or_default()))
    }

    fn forget(&self, id: &Uuid) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.remove(id);
        }
    }
}

/// Computes and persists match deltas for saved searches.
pub struct DeltaTracker {
    store: Arc<dyn SearchStore>,
    matcher: Matcher,
    locks: SearchLocks,
}

impl std::fmt::Debug for DeltaTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeltaTracker")
            .field("matcher", &self.matcher)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl DeltaTracker {
    pub fn new(store: Arc<dyn SearchStore>, matcher: Matcher) -> Self {
        Self {
            store,
            matcher,
            locks: SearchLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SearchStore> {
        &self.store
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Run one check of a search at time `now`.
    ///
    /// A search that no longer exists yields `Discarded(Deleted)` rather than
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns `LookoutError::IndexUnavailable` if the index query fails; in
    /// that case nothing is written and `last_checked` keeps its old value.
    pub fn check(&self, search_id: &Uuid, now: DateTime<Utc>) -> Result<CheckOutcome> {
        let slot = self.locks.slot(search_id)?;
        let _guard = slot
            .lock()
            .map_err(|_| LookoutError::Storage("Search lock poisoned".to_string()))?;

        let Some(search) = self.store.get(search_id)? else {
            self.locks.forget(search_id);
            return Ok(CheckOutcome::Discarded(DiscardReason::Deleted));
        };

        let matches = self.matcher.evaluate(&search.filters)?;
        let outcome = self.store.commit_check(&CheckCommit {
            search_id: search.id,
            generation: search.generation,
            matches: &matches,
            checked_at: now,
        })?;

        match outcome {
            CommitOutcome::Applied {
                new_ids,
                total_matches,
            } => {
                tracing::debug!(
                    search_id = %search.id,
                    new = new_ids.len(),
                    total = total_matches,
                    "check applied"
                );
                Ok(CheckOutcome::Applied(MatchDelta {
                    search_id: search.id,
                    generation: search.generation,
                    new_listing_ids: new_ids,
                    total_matches,
                    checked_at: now,
                }))
            }
            CommitOutcome::Discarded(reason) => {
                if reason == DiscardReason::Deleted {
                    self.locks.forget(search_id);
                }
                tracing::debug!(search_id = %search.id, %reason, "check discarded");
                Ok(CheckOutcome::Discarded(reason))
            }
        }
    }

    /// Load a search on behalf of `caller`.
    ///
    /// # Errors
    ///
    /// Returns `LookoutError::NotFound` if the id is unknown and
    /// `LookoutError::Unauthorized` if `caller` is not the owner.
    pub fn authorize(&self, caller: &str, search_id: &Uuid) -> Result<SavedSearch> {
        let search = self
            .store
            .get(search_id)?
            .ok_or(LookoutError::NotFound(*search_id))?;
        if !search.is_owned_by(caller) {
            return Err(LookoutError::Unauthorized {
                search_id: *search_id,
                user_id: caller.to_string(),
            });
        }
        Ok(search)
    }

    /// Acknowledge a search's new matches: the count drops to zero, the
    /// checkpoint and total stay as they are.
    pub fn mark_as_checked(&self, caller: &str, search_id: &Uuid) -> Result<()> {
        self.authorize(caller, search_id)?;
        let slot = self.locks.slot(search_id)?;
        let _guard = slot
            .lock()
            .map_err(|_| LookoutError::Storage("Search lock poisoned".to_string()))?;
        self.store.mark_as_checked(search_id)
    }

    /// Results view for a search, newest first. Opening the results
    /// acknowledges the search's new matches.
    ///
    /// The search lock is held from evaluation to acknowledgement, so a
    /// check cannot commit matches in between that the caller never saw.
    pub fn open_results(&self, caller: &str, search_id: &Uuid) -> Result<Vec<ResultEntry>> {
        self.authorize(caller, search_id)?;
        let slot = self.locks.slot(search_id)?;
        let _guard = slot
            .lock()
            .map_err(|_| LookoutError::Storage("Search lock poisoned".to_string()))?;

        let search = self.authorize(caller, search_id)?;
        let results = self.matcher.ordered_results(&search.filters)?;
        self.store.mark_as_checked(search_id)?;
        Ok(results)
    }

    /// Delete a search on behalf of its owner. A check in flight for it is
    /// discarded when it tries to commit.
    pub fn delete(&self, caller: &str, search_id: &Uuid) -> Result<()> {
        self.store.delete(caller, search_id)?;
        self.locks.forget(search_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Mutex, OnceLock};
    use std::thread::JoinHandle;

    use super::*;
    use crate::filter::FilterSpec;
    use crate::index::{ListingIndex, MemoryListingIndex};
    use crate::listing::Listing;
    use crate::storage::{NewSavedSearch, SearchPatch, SqliteSearchStore};

    fn car(id: &str, brand: &str, price: f64) -> Listing {
        Listing {
            id: ListingId::new(id),
            title: format!("{} {}", brand, id),
            description: String::new(),
            brand: brand.to_string(),
            price,
            year: 2021,
            fuel_type: "petrol".to_string(),
            transmission: "automatic".to_string(),
            location: "stuttgart".to_string(),
            condition: "used".to_string(),
            updated_at: Utc::now(),
        }
    }

    fn setup() -> (Arc<MemoryListingIndex>, Arc<SqliteSearchStore>, DeltaTracker) {
        let index = Arc::new(MemoryListingIndex::new());
        let store = Arc::new(SqliteSearchStore::open_in_memory().unwrap());
        let tracker = DeltaTracker::new(store.clone(), Matcher::new(index.clone()));
        (index, store, tracker)
    }

    fn porsche_search(store: &SqliteSearchStore) -> SavedSearch {
        store
            .create(&NewSavedSearch::new(
                "alice",
                "Porsches",
                FilterSpec::new().brand("Porsche").price(50.0, 150.0),
            ))
            .unwrap()
    }

    #[test]
    fn test_porsche_scenario() {
        let (index, store, tracker) = setup();
        for id in ["p1", "p2", "p3"] {
            index.insert(car(id, "Porsche", 100.0)).unwrap();
        }
        index.insert(car("a1", "Audi", 100.0)).unwrap();
        index.insert(car("p-expensive", "Porsche", 900.0)).unwrap();
        let search = porsche_search(&store);

        let first = tracker.check(&search.id, Utc::now()).unwrap();
        let delta = first.delta().unwrap();
        assert_eq!(delta.new_listing_ids.len(), 3);
        assert_eq!(delta.total_matches, 3);

        index.insert(car("p4", "Porsche", 50.0)).unwrap();
        index.insert(car("p5", "Porsche", 150.0)).unwrap();

        let second = tracker.check(&search.id, Utc::now()).unwrap();
        let delta = second.delta().unwrap();
        assert_eq!(delta.new_listing_ids.len(), 2);
        assert_eq!(delta.total_matches, 5);

        let stored = store.get(&search.id).unwrap().unwrap();
        assert_eq!(stored.new_matches_count, 5);
        assert_eq!(stored.known_listing_ids.len(), 5);
    }

    #[test]
    fn test_repeated_check_is_idempotent() {
        let (index, store, tracker) = setup();
        index.insert(car("p1", "Porsche", 100.0)).unwrap();
        let search = porsche_search(&store);

        tracker.check(&search.id, Utc::now()).unwrap();
        let again = tracker.check(&search.id, Utc::now()).unwrap();
        let delta = again.delta().unwrap();
        assert!(delta.is_empty());
        assert_eq!(delta.total_matches, 1);
    }

    #[test]
    fn test_removed_listing_stays_known() {
        let (index, store, tracker) = setup();
        index.insert(car("p1", "Porsche", 100.0)).unwrap();
        index.insert(car("p2", "Porsche", 100.0)).unwrap();
        let search = porsche_search(&store);
        tracker.check(&search.id, Utc::now()).unwrap();

        index.remove(&ListingId::new("p1")).unwrap();
        let outcome = tracker.check(&search.id, Utc::now()).unwrap();
        assert_eq!(outcome.delta().unwrap().total_matches, 1);

        let stored = store.get(&search.id).unwrap().unwrap();
        assert!(stored.known_listing_ids.contains(&ListingId::new("p1")));

        // Relisting the same id is not news.
        index.insert(car("p1", "Porsche", 100.0)).unwrap();
        let relisted = tracker.check(&search.id, Utc::now()).unwrap();
        assert!(relisted.delta().unwrap().is_empty());
    }

    #[test]
    fn test_filter_change_rediscovers_matches() {
        let (index, store, tracker) = setup();
        index.insert(car("p1", "Porsche", 100.0)).unwrap();
        let search = porsche_search(&store);
        tracker.check(&search.id, Utc::now()).unwrap();

        store
            .update(
                "alice",
                &search.id,
                &SearchPatch::new().filters(FilterSpec::new().brand("porsche")),
            )
            .unwrap();
        let outcome = tracker.check(&search.id, Utc::now()).unwrap();
        assert_eq!(outcome.delta().unwrap().new_listing_ids.len(), 1);
    }

    #[test]
    fn test_check_of_deleted_search_is_discarded() {
        let (_index, store, tracker) = setup();
        let search = porsche_search(&store);
        tracker.delete("alice", &search.id).unwrap();

        let outcome = tracker.check(&search.id, Utc::now()).unwrap();
        assert_eq!(outcome, CheckOutcome::Discarded(DiscardReason::Deleted));
        assert!(store.get(&search.id).unwrap().is_none());
    }

    #[test]
    fn test_mark_as_checked_requires_owner() {
        let (index, store, tracker) = setup();
        index.insert(car("p1", "Porsche", 100.0)).unwrap();
        let search = porsche_search(&store);
        tracker.check(&search.id, Utc::now()).unwrap();

        assert!(matches!(
            tracker.mark_as_checked("mallory", &search.id),
            Err(LookoutError::Unauthorized { .. })
        ));
        tracker.mark_as_checked("alice", &search.id).unwrap();

        let stored = store.get(&search.id).unwrap().unwrap();
        assert_eq!(stored.new_matches_count, 0);
        assert_eq!(stored.total_matches, 1);
        assert_eq!(stored.known_listing_ids.len(), 1);
    }

    #[test]
    fn test_open_results_acknowledges() {
        let (index, store, tracker) = setup();
        index.insert(car("p1", "Porsche", 100.0)).unwrap();
        index.insert(car("p2", "Porsche", 120.0)).unwrap();
        let search = porsche_search(&store);
        tracker.check(&search.id, Utc::now()).unwrap();

        let results = tracker.open_results("alice", &search.id).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(store.get(&search.id).unwrap().unwrap().new_matches_count, 0);
    }

    /// Index that, while the results view is reading update times, lists a
    /// new car and starts a check of the search on another thread.
    struct ListsDuringResults {
        inner: MemoryListingIndex,
        late: Mutex<Option<Listing>>,
        tracker: OnceLock<Arc<DeltaTracker>>,
        search_id: OnceLock<Uuid>,
        checker: Mutex<Option<JoinHandle<Result<CheckOutcome>>>>,
    }

    impl ListingIndex for ListsDuringResults {
        fn query(&self, filters: &FilterSpec) -> Result<HashSet<ListingId>> {
            self.inner.query(filters)
        }

        fn listing_updated_at(&self, id: &ListingId) -> Result<Option<DateTime<Utc>>> {
            let late = self.late.lock().unwrap().take();
            if let Some(listing) = late {
                self.inner.insert(listing)?;
                let tracker = self.tracker.get().unwrap().clone();
                let search_id = *self.search_id.get().unwrap();
                let handle = std::thread::spawn(move || tracker.check(&search_id, Utc::now()));
                *self.checker.lock().unwrap() = Some(handle);
                // Give the check a chance to run if nothing holds it back.
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
            self.inner.listing_updated_at(id)
        }
    }

    #[test]
    fn test_open_results_keeps_matches_arriving_mid_view() {
        let index = Arc::new(ListsDuringResults {
            inner: MemoryListingIndex::new(),
            late: Mutex::new(Some(car("p2", "Porsche", 110.0))),
            tracker: OnceLock::new(),
            search_id: OnceLock::new(),
            checker: Mutex::new(None),
        });
        index.inner.insert(car("p1", "Porsche", 100.0)).unwrap();
        let store = Arc::new(SqliteSearchStore::open_in_memory().unwrap());
        let tracker = Arc::new(DeltaTracker::new(store.clone(), Matcher::new(index.clone())));
        let search = porsche_search(&store);
        index.tracker.set(tracker.clone()).ok().unwrap();
        index.search_id.set(search.id).unwrap();
        tracker.check(&search.id, Utc::now()).unwrap();

        let results = tracker.open_results("alice", &search.id).unwrap();
        assert_eq!(results.len(), 1);

        let handle = index.checker.lock().unwrap().take().unwrap();
        let outcome = handle.join().unwrap().unwrap();
        assert_eq!(outcome.delta().unwrap().new_listing_ids.len(), 1);

        // The car listed while the view was open was never shown, so it is
        // still counted as new.
        let stored = store.get(&search.id).unwrap().unwrap();
        assert_eq!(stored.new_matches_count, 1);
        assert_eq!(stored.total_matches, 2);
    }

    struct DownIndex;

    impl ListingIndex for DownIndex {
        fn query(&self, _filters: &FilterSpec) -> Result<HashSet<ListingId>> {
            Err(LookoutError::IndexUnavailable("maintenance".to_string()))
        }

        fn listing_updated_at(&self, _id: &ListingId) -> Result<Option<DateTime<Utc>>> {
            Err(LookoutError::IndexUnavailable("maintenance".to_string()))
        }
    }

    #[test]
    fn test_index_outage_leaves_search_untouched() {
        let store = Arc::new(SqliteSearchStore::open_in_memory().unwrap());
        let tracker = DeltaTracker::new(store.clone(), Matcher::new(Arc::new(DownIndex)));
        let search = porsche_search(&store);

        let result = tracker.check(&search.id, Utc::now());
        assert!(matches!(result, Err(LookoutError::IndexUnavailable(_))));

        let stored = store.get(&search.id).unwrap().unwrap();
        assert_eq!(stored.last_checked, search.last_checked);
        assert_eq!(stored.new_matches_count, 0);
    }
}
