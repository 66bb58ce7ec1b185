//! Unread-match totals for navigation badges.

use std::sync::Arc;

use crate::error::Result;
use crate::storage::SearchStore;

/// Read-only view over the store's new-match counters.
pub struct BadgeAggregator {
    store: Arc<dyn SearchStore>,
}

impl BadgeAggregator {
    pub fn new(store: Arc<dyn SearchStore>) -> Self {
        Self { store }
    }

    /// Sum of `new_matches_count` over the user's alert-enabled searches.
    pub fn total_new_matches(&self, user_id: &str) -> Result<u64> {
        self.store.total_new_matches(user_id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Utc;

    use super::*;
    use crate::filter::FilterSpec;
    use crate::listing::ListingId;
    use crate::storage::{CheckCommit, NewSavedSearch, SqliteSearchStore};

    #[test]
    fn test_badge_tracks_checks_and_acknowledgements() {
        let store = Arc::new(SqliteSearchStore::open_in_memory().unwrap());
        let badges = BadgeAggregator::new(store.clone());
        let first = store
            .create(&NewSavedSearch::new("alice", "One", FilterSpec::default()))
            .unwrap();
        let second = store
            .create(&NewSavedSearch::new("alice", "Two", FilterSpec::default()))
            .unwrap();
        assert_eq!(badges.total_new_matches("alice").unwrap(), 0);

        let matches: HashSet<ListingId> = ["a", "b", "c"].iter().map(|v| ListingId::new(*v)).collect();
        for search in [&first, &second] {
            store
                .commit_check(&CheckCommit {
                    search_id: search.id,
                    generation: search.generation,
                    matches: &matches,
                    checked_at: Utc::now(),
                })
                .unwrap();
        }
        assert_eq!(badges.total_new_matches("alice").unwrap(), 6);

        store.mark_as_checked(&first.id).unwrap();
        assert_eq!(badges.total_new_matches("alice").unwrap(), 3);
        assert_eq!(badges.total_new_matches("bob").unwrap(), 0);
    }
}
