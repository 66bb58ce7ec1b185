//! Listing records and the matching predicate shared by every index.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filter::{normalize_member, normalize_text, FilterSpec};

/// Identifier of a listing in the external corpus.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(String);

impl ListingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListingId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ListingId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A vehicle listing as seen by the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub brand: String,
    pub price: f64,
    pub year: i32,
    pub fuel_type: String,
    pub transmission: String,
    pub location: String,
    pub condition: String,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Whether this listing satisfies every constraint present in `filters`.
    ///
    /// Empty sets and missing ranges do not constrain. Ranges are inclusive.
    /// The query is a case-insensitive substring of title or description,
    /// with whitespace runs folded on both sides.
    pub fn matches(&self, filters: &FilterSpec) -> bool {
        if let Some(query) = &filters.search_query {
            let needle = normalize_text(query);
            let in_title = normalize_text(&self.title).contains(&needle);
            if !in_title && !normalize_text(&self.description).contains(&needle) {
                return false;
            }
        }

        if let Some(range) = filters.price_range {
            if !range.contains(self.price) {
                return false;
            }
        }

        if let Some(range) = filters.year_range {
            if !range.contains(self.year) {
                return false;
            }
        }

        member_allowed(&filters.brands, &self.brand)
            && member_allowed(&filters.fuel_types, &self.fuel_type)
            && member_allowed(&filters.transmissions, &self.transmission)
            && member_allowed(&filters.locations, &self.location)
            && member_allowed(&filters.conditions, &self.condition)
    }
}

fn member_allowed(allowed: &BTreeSet<String>, value: &str) -> bool {
    allowed.is_empty() || allowed.contains(&normalize_member(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn porsche() -> Listing {
        Listing {
            id: ListingId::new("l-1"),
            title: "Porsche 911 Carrera".to_string(),
            description: "Single owner, full service history".to_string(),
            brand: "Porsche".to_string(),
            price: 120.0,
            year: 2018,
            fuel_type: "Petrol".to_string(),
            transmission: "Automatic".to_string(),
            location: "Berlin".to_string(),
            condition: "Used".to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unconstrained_filter_matches() {
        assert!(porsche().matches(&FilterSpec::default()));
    }

    #[test]
    fn test_query_is_case_insensitive_substring() {
        let listing = porsche();
        assert!(listing.matches(&FilterSpec::new().query("CARRERA")));
        assert!(listing.matches(&FilterSpec::new().query("service hist")));
        assert!(!listing.matches(&FilterSpec::new().query("cayenne")));
        // Substring, not token matching
        assert!(listing.matches(&FilterSpec::new().query("rera")));
    }

    #[test]
    fn test_query_ignores_whitespace_runs() {
        let mut listing = porsche();
        listing.title = "Tesla Model  3\tLong Range".to_string();
        assert!(listing.matches(&FilterSpec::new().query("Model  3")));
        assert!(listing.matches(&FilterSpec::new().query("model 3 long")));

        // Canonical filters collapse the query the same way.
        let canonical = FilterSpec::new().query("  MODEL   3 ").canonicalize().unwrap();
        assert!(listing.matches(&canonical));
    }

    #[test]
    fn test_constraints_are_combined_with_and() {
        let listing = porsche();
        let hit = FilterSpec::new().brand("porsche").price(50.0, 150.0).years(2015, 2020);
        assert!(listing.matches(&hit));

        let miss = hit.clone().fuel_type("diesel");
        assert!(!listing.matches(&miss));
    }

    #[test]
    fn test_set_membership_ignores_listing_case() {
        let mut listing = porsche();
        listing.location = "  BERLIN ".to_string();
        assert!(listing.matches(&FilterSpec::new().location("berlin")));
    }

    #[test]
    fn test_range_edges_are_inclusive() {
        let listing = porsche();
        assert!(listing.matches(&FilterSpec::new().price(120.0, 120.0)));
        assert!(listing.matches(&FilterSpec::new().years(2018, 2018)));
        assert!(!listing.matches(&FilterSpec::new().price(0.0, 119.99)));
    }
}
