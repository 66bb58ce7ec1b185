//! Listing index interface.
//!
//! The `ListingIndex` trait is the only view the engine has of the listing
//! corpus. Listing storage and indexing live elsewhere; anything that can
//! answer these two questions can back the matcher.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::error::{LookoutError, Result};
use crate::filter::FilterSpec;
use crate::listing::{Listing, ListingId};

/// Query interface over the live listing corpus.
///
/// Implementations must be safe for concurrent reads: the scheduler queries
/// the index for many saved searches at once.
pub trait ListingIndex: Send + Sync {
    /// Return the ids of every listing satisfying `filters`.
    ///
    /// The filter is in canonical form. Implementations must follow the
    /// semantics of [`Listing::matches`]: empty sets do not constrain, ranges
    /// are inclusive, the query is a case-insensitive substring of title or
    /// description, and all constraints are ANDed.
    ///
    /// # Errors
    ///
    /// Returns `LookoutError::IndexUnavailable` if the index cannot be reached.
    fn query(&self, filters: &FilterSpec) -> Result<HashSet<ListingId>>;

    /// Last update time of a listing, or `None` if the index does not know it.
    ///
    /// # Errors
    ///
    /// Returns `LookoutError::IndexUnavailable` if the index cannot be reached.
    fn listing_updated_at(&self, id: &ListingId) -> Result<Option<DateTime<Utc>>>;

    /// Update times for a batch of listings, keyed by id. Backends that pay a
    /// per-lookup cost should override this to answer in one pass.
    ///
    /// # Errors
    ///
    /// Returns `LookoutError::IndexUnavailable` if the index cannot be reached.
    fn listings_updated_at(
        &self,
        ids: &HashSet<ListingId>,
    ) -> Result<HashMap<ListingId, Option<DateTime<Utc>>>> {
        ids.iter()
            .map(|id| Ok((id.clone(), self.listing_updated_at(id)?)))
            .collect()
    }
}

/// In-memory listing index.
///
/// Holds the corpus behind a read-write lock so listings can be inserted and
/// removed while checks are running.
#[derive(Debug, Default)]
pub struct MemoryListingIndex {
    listings: RwLock<HashMap<ListingId, Listing>>,
}

impl MemoryListingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_listings(listings: impl IntoIterator<Item = Listing>) -> Self {
        let map = listings
            .into_iter()
            .map(|listing| (listing.id.clone(), listing))
            .collect();
        Self {
            listings: RwLock::new(map),
        }
    }

    /// Insert or replace a listing.
    pub fn insert(&self, listing: Listing) -> Result<()> {
        self.write()?.insert(listing.id.clone(), listing);
        Ok(())
    }

    /// Remove a listing (sold, delisted). Returns whether it was present.
    pub fn remove(&self, id: &ListingId) -> Result<bool> {
        Ok(self.write()?.remove(id).is_some())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<ListingId, Listing>>> {
        self.listings
            .read()
            .map_err(|_| LookoutError::IndexUnavailable("Listing index lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<ListingId, Listing>>> {
        self.listings
            .write()
            .map_err(|_| LookoutError::IndexUnavailable("Listing index lock poisoned".to_string()))
    }
}

impl ListingIndex for MemoryListingIndex {
    fn query(&self, filters: &FilterSpec) -> Result<HashSet<ListingId>> {
        Ok(self
            .read()?
            .values()
            .filter(|listing| listing.matches(filters))
            .map(|listing| listing.id.clone())
            .collect())
    }

    fn listing_updated_at(&self, id: &ListingId) -> Result<Option<DateTime<Utc>>> {
        Ok(self.read()?.get(id).map(|listing| listing.updated_at))
    }

    fn listings_updated_at(
        &self,
        ids: &HashSet<ListingId>,
    ) -> Result<HashMap<ListingId, Option<DateTime<Utc>>>> {
        let listings = self.read()?;
        Ok(ids
            .iter()
            .map(|id| (id.clone(), listings.get(id).map(|listing| listing.updated_at)))
            .collect())
    }
}
