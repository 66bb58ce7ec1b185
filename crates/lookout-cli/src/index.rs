//! Listing index backed by a JSON file.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use lookout_core::{FilterSpec, Listing, ListingId, ListingIndex, LookoutError, Result};

/// File identity used to decide whether the cached parse is still current.
type Stamp = (Option<SystemTime>, u64);

#[derive(Debug)]
struct Snapshot {
    stamp: Stamp,
    listings: Arc<HashMap<ListingId, Listing>>,
}

/// Serves a JSON array of listings. The parsed file is cached and reloaded
/// when its modification time or size changes, so edits are picked up by the
/// next check without a restart.
#[derive(Debug)]
pub struct JsonFileIndex {
    path: PathBuf,
    cache: Mutex<Option<Snapshot>>,
}

impl JsonFileIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    fn unavailable(&self, err: impl std::fmt::Display) -> LookoutError {
        LookoutError::IndexUnavailable(format!("{}: {}", self.path.display(), err))
    }

    fn load(&self) -> Result<Arc<HashMap<ListingId, Listing>>> {
        let metadata = std::fs::metadata(&self.path).map_err(|e| self.unavailable(e))?;
        let stamp = (metadata.modified().ok(), metadata.len());

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| LookoutError::IndexUnavailable("Listing cache poisoned".to_string()))?;
        if let Some(snapshot) = cache.as_ref() {
            if snapshot.stamp.0.is_some() && snapshot.stamp == stamp {
                return Ok(Arc::clone(&snapshot.listings));
            }
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|e| self.unavailable(e))?;
        let parsed: Vec<Listing> = serde_json::from_str(&contents).map_err(|e| self.unavailable(e))?;
        let listings: Arc<HashMap<ListingId, Listing>> = Arc::new(
            parsed
                .into_iter()
                .map(|listing| (listing.id.clone(), listing))
                .collect(),
        );
        tracing::debug!(path = %self.path.display(), listings = listings.len(), "listing file loaded");

        *cache = Some(Snapshot {
            stamp,
            listings: Arc::clone(&listings),
        });
        Ok(listings)
    }
}

impl ListingIndex for JsonFileIndex {
    fn query(&self, filters: &FilterSpec) -> Result<HashSet<ListingId>> {
        Ok(self
            .load()?
            .values()
            .filter(|listing| listing.matches(filters))
            .map(|listing| listing.id.clone())
            .collect())
    }

    fn listing_updated_at(&self, id: &ListingId) -> Result<Option<DateTime<Utc>>> {
        Ok(self.load()?.get(id).map(|listing| listing.updated_at))
    }

    fn listings_updated_at(
        &self,
        ids: &HashSet<ListingId>,
    ) -> Result<HashMap<ListingId, Option<DateTime<Utc>>>> {
        let listings = self.load()?;
        Ok(ids
            .iter()
            .map(|id| (id.clone(), listings.get(id).map(|listing| listing.updated_at)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTINGS: &str = r#"[
        {
            "id": "p1",
            "title": "Porsche 911 Carrera",
            "brand": "Porsche",
            "price": 95000,
            "year": 2019,
            "fuel_type": "Petrol",
            "transmission": "Automatic",
            "location": "Stuttgart",
            "condition": "used",
            "updated_at": "2026-01-02T10:00:00Z"
        },
        {
            "id": "v1",
            "title": "VW Golf",
            "description": "Diesel hatchback, one owner",
            "brand": "Volkswagen",
            "price": 12000,
            "year": 2015,
            "fuel_type": "Diesel",
            "transmission": "Manual",
            "location": "Hamburg",
            "condition": "used",
            "updated_at": "2026-01-01T10:00:00Z"
        }
    ]"#;

    #[test]
    fn test_query_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.json");
        std::fs::write(&path, LISTINGS).unwrap();
        let index = JsonFileIndex::new(&path);

        assert_eq!(index.query(&FilterSpec::default()).unwrap().len(), 2);

        let diesel = index.query(&FilterSpec::new().fuel_type("diesel")).unwrap();
        assert!(diesel.contains(&ListingId::new("v1")));
        assert_eq!(diesel.len(), 1);

        let owner = index.query(&FilterSpec::new().query("ONE OWNER")).unwrap();
        assert!(owner.contains(&ListingId::new("v1")));

        let updated = index.listing_updated_at(&ListingId::new("p1")).unwrap();
        assert!(updated.is_some());
        assert!(index
            .listing_updated_at(&ListingId::new("missing"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_missing_or_corrupt_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.json");
        let index = JsonFileIndex::new(&path);
        assert!(matches!(
            index.query(&FilterSpec::default()),
            Err(LookoutError::IndexUnavailable(_))
        ));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            index.query(&FilterSpec::default()),
            Err(LookoutError::IndexUnavailable(_))
        ));
    }

    #[test]
    fn test_rewritten_file_is_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.json");
        std::fs::write(&path, LISTINGS).unwrap();
        let index = JsonFileIndex::new(&path);
        assert_eq!(index.query(&FilterSpec::default()).unwrap().len(), 2);

        let only_golf = LISTINGS.replacen("\"id\": \"p1\"", "\"id\": \"p1-sold\"", 1);
        std::fs::write(&path, &only_golf).unwrap();
        let ids = index.query(&FilterSpec::default()).unwrap();
        assert!(ids.contains(&ListingId::new("p1-sold")));
        assert!(!ids.contains(&ListingId::new("p1")));

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            index.query(&FilterSpec::default()),
            Err(LookoutError::IndexUnavailable(_))
        ));
    }

    #[test]
    fn test_batch_update_times_from_one_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.json");
        std::fs::write(&path, LISTINGS).unwrap();
        let index = JsonFileIndex::new(&path);

        let ids: HashSet<ListingId> = ["p1", "v1", "gone"].into_iter().map(ListingId::new).collect();
        let times = index.listings_updated_at(&ids).unwrap();
        assert_eq!(times.len(), 3);
        assert!(times[&ListingId::new("p1")] > times[&ListingId::new("v1")]);
        assert_eq!(times[&ListingId::new("gone")], None);
    }
}
