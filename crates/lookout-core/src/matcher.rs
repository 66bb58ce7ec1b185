//! Filter evaluation against the listing index.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{LookoutError, Result};
use crate::filter::FilterSpec;
use crate::index::ListingIndex;
use crate::listing::ListingId;

/// One row of a results view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultEntry {
    pub listing_id: ListingId,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Evaluates saved-search filters against a [`ListingIndex`].
///
/// The matcher holds no state of its own; it canonicalizes the filter and
/// turns any index failure into `LookoutError::IndexUnavailable`, which the
/// scheduler treats as retryable.
#[derive(Clone)]
pub struct Matcher {
    index: Arc<dyn ListingIndex>,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher").finish_non_exhaustive()
    }
}

impl Matcher {
    pub fn new(index: Arc<dyn ListingIndex>) -> Self {
        Self { index }
    }

    /// Ids of every listing currently matching `filters`. No order guarantee.
    ///
    /// # Errors
    ///
    /// Returns `LookoutError::Validation` for an invalid filter and
    /// `LookoutError::IndexUnavailable` if the index query fails.
    pub fn evaluate(&self, filters: &FilterSpec) -> Result<HashSet<ListingId>> {
        let filters = filters.canonicalize()?;
        self.index.query(&filters).map_err(index_unavailable)
    }

    /// Current matches ordered for display: most recently updated first,
    /// listings with an unknown update time last, ties broken by id.
    pub fn ordered_results(&self, filters: &FilterSpec) -> Result<Vec<ResultEntry>> {
        let matches = self.evaluate(filters)?;
        let mut updated = self
            .index
            .listings_updated_at(&matches)
            .map_err(index_unavailable)?;

        let mut entries: Vec<ResultEntry> = matches
            .into_iter()
            .map(|listing_id| {
                let updated_at = updated.remove(&listing_id).flatten();
                ResultEntry {
                    listing_id,
                    updated_at,
                }
            })
            .collect();

        entries.sort_by(|a, b| match (a.updated_at, b.updated_at) {
            (Some(x), Some(y)) => y.cmp(&x).then_with(|| a.listing_id.cmp(&b.listing_id)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.listing_id.cmp(&b.listing_id),
        });
        Ok(entries)
    }
}

fn index_unavailable(err: LookoutError) -> LookoutError {
    match err {
        LookoutError::IndexUnavailable(_) => err,
        other => LookoutError::IndexUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::index::MemoryListingIndex;
    use crate::listing::Listing;

    fn listing(id: &str, brand: &str, price: f64, updated_at: DateTime<Utc>) -> Listing {
        Listing {
            id: ListingId::new(id),
            title: format!("{} {}", brand, id),
            description: String::new(),
            brand: brand.to_string(),
            price,
            year: 2020,
            fuel_type: "petrol".to_string(),
            transmission: "automatic".to_string(),
            location: "munich".to_string(),
            condition: "used".to_string(),
            updated_at,
        }
    }

    struct BrokenIndex;

    impl ListingIndex for BrokenIndex {
        fn query(&self, _filters: &FilterSpec) -> Result<HashSet<ListingId>> {
            Err(LookoutError::Storage("connection refused".to_string()))
        }

        fn listing_updated_at(&self, _id: &ListingId) -> Result<Option<DateTime<Utc>>> {
            Ok(None)
        }
    }

    #[test]
    fn test_empty_filter_returns_every_listing() {
        let now = Utc::now();
        let index = MemoryListingIndex::from_listings(vec![
            listing("a", "Audi", 10.0, now),
            listing("b", "BMW", 2000.0, now),
            listing("c", "Porsche", 99.0, now),
        ]);
        let matcher = Matcher::new(Arc::new(index));
        assert_eq!(matcher.evaluate(&FilterSpec::default()).unwrap().len(), 3);
    }

    #[test]
    fn test_evaluate_canonicalizes_raw_filters() {
        let now = Utc::now();
        let index = MemoryListingIndex::from_listings(vec![listing("a", "Porsche", 100.0, now)]);
        let matcher = Matcher::new(Arc::new(index));

        let mut raw = FilterSpec::new();
        raw.brands.insert("  PORSCHE ".to_string());
        assert_eq!(matcher.evaluate(&raw).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_filter_is_validation_error() {
        let matcher = Matcher::new(Arc::new(MemoryListingIndex::new()));
        let result = matcher.evaluate(&FilterSpec::new().years(2022, 2001));
        assert!(matches!(result, Err(LookoutError::Validation(_))));
    }

    #[test]
    fn test_index_errors_become_unavailable() {
        let matcher = Matcher::new(Arc::new(BrokenIndex));
        let result = matcher.evaluate(&FilterSpec::default());
        assert!(matches!(result, Err(LookoutError::IndexUnavailable(_))));
    }

    #[test]
    fn test_ordered_results_newest_first() {
        let now = Utc::now();
        let index = MemoryListingIndex::from_listings(vec![
            listing("old", "Audi", 10.0, now - Duration::days(3)),
            listing("new", "Audi", 10.0, now),
            listing("mid", "Audi", 10.0, now - Duration::days(1)),
        ]);
        let matcher = Matcher::new(Arc::new(index));
        let order: Vec<String> = matcher
            .ordered_results(&FilterSpec::new().brand("audi"))
            .unwrap()
            .into_iter()
            .map(|entry| entry.listing_id.to_string())
            .collect();
        assert_eq!(order, vec!["new", "mid", "old"]);
    }
}
