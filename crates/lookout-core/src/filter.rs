//! Saved-search filter criteria.
//!
//! `FilterSpec` is the canonical, comparable form of a saved search's
//! criteria. Set members are kept in ordered sets, so two specs built from
//! the same values in a different order compare equal and serialize to the
//! same JSON.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{LookoutError, Result};

const MAX_MEMBERS_PER_SET: usize = 50;
const MAX_MEMBER_CHARS: usize = 100;

/// Inclusive price bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.min && price <= self.max
    }
}

/// Inclusive model-year bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.min && year <= self.max
    }
}

/// Filter criteria for a saved search.
///
/// Empty sets and missing ranges place no constraint on their dimension, so
/// `FilterSpec::default()` matches every listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Case-insensitive substring of the listing title or description
    pub search_query: Option<String>,
    pub brands: BTreeSet<String>,
    pub price_range: Option<PriceRange>,
    pub year_range: Option<YearRange>,
    pub fuel_types: BTreeSet<String>,
    pub transmissions: BTreeSet<String>,
    pub locations: BTreeSet<String>,
    pub conditions: BTreeSet<String>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.search_query = normalize_query(&query.into());
        self
    }

    pub fn brand(mut self, brand: impl AsRef<str>) -> Self {
        insert_member(&mut self.brands, brand.as_ref());
        self
    }

    pub fn price(mut self, min: f64, max: f64) -> Self {
        self.price_range = Some(PriceRange::new(min, max));
        self
    }

    pub fn years(mut self, min: i32, max: i32) -> Self {
        self.year_range = Some(YearRange::new(min, max));
        self
    }

    pub fn fuel_type(mut self, fuel_type: impl AsRef<str>) -> Self {
        insert_member(&mut self.fuel_types, fuel_type.as_ref());
        self
    }

    pub fn transmission(mut self, transmission: impl AsRef<str>) -> Self {
        insert_member(&mut self.transmissions, transmission.as_ref());
        self
    }

    pub fn location(mut self, location: impl AsRef<str>) -> Self {
        insert_member(&mut self.locations, location.as_ref());
        self
    }

    pub fn condition(mut self, condition: impl AsRef<str>) -> Self {
        insert_member(&mut self.conditions, condition.as_ref());
        self
    }

    /// Whether no dimension is constrained.
    pub fn is_unconstrained(&self) -> bool {
        self.search_query.is_none()
            && self.brands.is_empty()
            && self.price_range.is_none()
            && self.year_range.is_none()
            && self.fuel_types.is_empty()
            && self.transmissions.is_empty()
            && self.locations.is_empty()
            && self.conditions.is_empty()
    }

    /// Return the canonical form: members trimmed and lowercased, blanks
    /// dropped, query whitespace collapsed.
    pub fn normalized(&self) -> Self {
        Self {
            search_query: self.search_query.as_deref().and_then(normalize_query),
            brands: normalize_set(&self.brands),
            price_range: self.price_range,
            year_range: self.year_range,
            fuel_types: normalize_set(&self.fuel_types),
            transmissions: normalize_set(&self.transmissions),
            locations: normalize_set(&self.locations),
            conditions: normalize_set(&self.conditions),
        }
    }

    /// Check structural invariants.
    ///
    /// # Errors
    ///
    /// Returns `LookoutError::Validation` if a range is inverted, a price
    /// bound is negative or not finite, or a set or member is too large.
    pub fn validate(&self) -> Result<()> {
        if let Some(range) = self.price_range {
            if !range.min.is_finite() || !range.max.is_finite() {
                return Err(LookoutError::Validation(
                    "Price bounds must be finite numbers".to_string(),
                ));
            }
            if range.min < 0.0 || range.max < 0.0 {
                return Err(LookoutError::Validation(
                    "Price bounds must not be negative".to_string(),
                ));
            }
            if range.min > range.max {
                return Err(LookoutError::Validation(format!(
                    "Price range is inverted ({} > {})",
                    range.min, range.max
                )));
            }
        }

        if let Some(range) = self.year_range {
            if range.min > range.max {
                return Err(LookoutError::Validation(format!(
                    "Year range is inverted ({} > {})",
                    range.min, range.max
                )));
            }
        }

        if let Some(query) = &self.search_query {
            if query.chars().count() > MAX_MEMBER_CHARS {
                return Err(LookoutError::Validation(format!(
                    "Search query too long (max {} characters)",
                    MAX_MEMBER_CHARS
                )));
            }
        }

        for (label, set) in [
            ("brands", &self.brands),
            ("fuel types", &self.fuel_types),
            ("transmissions", &self.transmissions),
            ("locations", &self.locations),
            ("conditions", &self.conditions),
        ] {
            if set.len() > MAX_MEMBERS_PER_SET {
                return Err(LookoutError::Validation(format!(
                    "Too many {} (max {})",
                    label, MAX_MEMBERS_PER_SET
                )));
            }
            if set.iter().any(|m| m.chars().count() > MAX_MEMBER_CHARS) {
                return Err(LookoutError::Validation(format!(
                    "Value in {} too long (max {} characters)",
                    label, MAX_MEMBER_CHARS
                )));
            }
        }

        Ok(())
    }

    /// Normalize then validate; the form every stored search carries.
    ///
    /// # Errors
    ///
    /// Returns `LookoutError::Validation` if the normalized spec is invalid.
    pub fn canonicalize(&self) -> Result<Self> {
        let normalized = self.normalized();
        normalized.validate()?;
        Ok(normalized)
    }
}

/// Trim and lowercase a set member or listing attribute.
pub(crate) fn normalize_member(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Lowercase with runs of whitespace folded to a single space. Applied to
/// both the query and the text it is matched against.
pub(crate) fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn normalize_query(query: &str) -> Option<String> {
    let normalized = normalize_text(query);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn normalize_set(set: &BTreeSet<String>) -> BTreeSet<String> {
    set.iter()
        .map(|member| normalize_member(member))
        .filter(|member| !member.is_empty())
        .collect()
}

fn insert_member(set: &mut BTreeSet<String>, value: &str) {
    let member = normalize_member(value);
    if !member.is_empty() {
        set.insert(member);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unconstrained() {
        assert!(FilterSpec::default().is_unconstrained());
        assert!(!FilterSpec::new().brand("Audi").is_unconstrained());
    }

    #[test]
    fn test_equality_ignores_member_order_and_case() {
        let a = FilterSpec::new().brand("Porsche").brand("BMW").fuel_type("Petrol");
        let b = FilterSpec::new().brand(" bmw ").fuel_type("petrol").brand("PORSCHE");
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalized_cleans_raw_sets() {
        let mut raw = FilterSpec::new();
        raw.brands.insert("  Tesla".to_string());
        raw.brands.insert("tesla".to_string());
        raw.brands.insert("   ".to_string());
        raw.search_query = Some("  Model   3 ".to_string());

        let normalized = raw.normalized();
        assert_eq!(normalized.brands.len(), 1);
        assert!(normalized.brands.contains("tesla"));
        assert_eq!(normalized.search_query.as_deref(), Some("model 3"));
    }

    #[test]
    fn test_blank_query_is_dropped() {
        let spec = FilterSpec::new().query("   ");
        assert_eq!(spec.search_query, None);
    }

    #[test]
    fn test_validate_rejects_inverted_price_range() {
        let spec = FilterSpec::new().price(200.0, 100.0);
        assert!(matches!(spec.validate(), Err(LookoutError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_negative_and_nan_prices() {
        assert!(FilterSpec::new().price(-1.0, 10.0).validate().is_err());
        assert!(FilterSpec::new().price(0.0, f64::NAN).validate().is_err());
        assert!(FilterSpec::new().price(0.0, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_year_range() {
        assert!(FilterSpec::new().years(2020, 2010).validate().is_err());
        assert!(FilterSpec::new().years(2010, 2010).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_sets() {
        let mut spec = FilterSpec::new();
        for i in 0..=MAX_MEMBERS_PER_SET {
            spec = spec.location(format!("city-{}", i));
        }
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let price = PriceRange::new(50.0, 150.0);
        assert!(price.contains(50.0));
        assert!(price.contains(150.0));
        assert!(!price.contains(150.01));

        let years = YearRange::new(2015, 2020);
        assert!(years.contains(2015));
        assert!(years.contains(2020));
        assert!(!years.contains(2021));
    }

    #[test]
    fn test_canonical_json_is_order_independent() {
        let a = FilterSpec::new().brand("b").brand("a").canonicalize().unwrap();
        let b = FilterSpec::new().brand("a").brand("b").canonicalize().unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_deserialize_fills_missing_fields() {
        let spec: FilterSpec = serde_json::from_str(r#"{"brands":["porsche"]}"#).unwrap();
        assert!(spec.brands.contains("porsche"));
        assert!(spec.price_range.is_none());
        assert!(spec.fuel_types.is_empty());
    }
}
