//! Output formatting helpers for the CLI.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

use lookout_core::{FilterSpec, ResultEntry, SavedSearch};

use crate::helpers::short_id;

/// Convert a saved search to JSON for output.
pub fn search_json(search: &SavedSearch) -> serde_json::Value {
    serde_json::json!({
        "id": search.id,
        "user_id": search.user_id,
        "name": search.name,
        "filters": search.filters,
        "alert_enabled": search.alert_enabled,
        "alert_frequency": search.alert_frequency,
        "total_matches": search.total_matches,
        "new_matches_count": search.new_matches_count,
        "known_listing_count": search.known_listing_ids.len(),
        "last_checked": search.last_checked.to_rfc3339(),
        "last_notified_at": search.last_notified_at.map(|t| t.to_rfc3339()),
        "created_at": search.created_at.to_rfc3339(),
        "updated_at": search.updated_at.to_rfc3339(),
    })
}

/// One-line human summary of a filter.
pub fn filter_summary(filters: &FilterSpec) -> String {
    let mut parts = Vec::new();
    if let Some(query) = &filters.search_query {
        parts.push(format!("\"{}\"", query));
    }
    let sets = [
        ("brand", &filters.brands),
        ("fuel", &filters.fuel_types),
        ("transmission", &filters.transmissions),
        ("location", &filters.locations),
        ("condition", &filters.conditions),
    ];
    for (label, values) in sets {
        if !values.is_empty() {
            let joined: Vec<&str> = values.iter().map(String::as_str).collect();
            parts.push(format!("{}={}", label, joined.join("|")));
        }
    }
    if let Some(range) = filters.price_range {
        parts.push(format!("price {}..{}", range.min, range.max));
    }
    if let Some(range) = filters.year_range {
        parts.push(format!("year {}..{}", range.min, range.max));
    }
    if parts.is_empty() {
        "any listing".to_string()
    } else {
        parts.join(", ")
    }
}

fn table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.to_vec());
    for row in rows {
        table.add_row(row);
    }
    table.to_string()
}

/// Render a user's searches as a table.
pub fn searches_table(searches: &[SavedSearch]) -> String {
    let rows = searches
        .iter()
        .map(|search| {
            vec![
                short_id(&search.id),
                search.name.clone(),
                if search.alert_enabled {
                    search.alert_frequency.to_string()
                } else {
                    "off".to_string()
                },
                search.new_matches_count.to_string(),
                search.total_matches.to_string(),
                search.last_checked.format("%Y-%m-%d %H:%M UTC").to_string(),
            ]
        })
        .collect();
    table(
        &["ID", "Name", "Alerts", "New", "Total", "Last checked"],
        rows,
    )
}

/// Render a results view as a table.
pub fn results_table(results: &[ResultEntry]) -> String {
    let rows = results
        .iter()
        .map(|entry| {
            vec![
                entry.listing_id.to_string(),
                entry
                    .updated_at
                    .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    table(&["Listing", "Updated"], rows)
}

/// Print a single search in human-readable format.
pub fn print_search(search: &SavedSearch) {
    println!("ID: {}", search.id);
    println!("Name: {}", search.name);
    println!("Filters: {}", filter_summary(&search.filters));
    if search.alert_enabled {
        println!("Alerts: {}", search.alert_frequency);
    } else {
        println!("Alerts: off");
    }
    println!(
        "Matches: {} new, {} total",
        search.new_matches_count, search.total_matches
    );
    println!("Last checked: {}", search.last_checked.to_rfc3339());
    if let Some(notified) = search.last_notified_at {
        println!("Last notified: {}", notified.to_rfc3339());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_summary() {
        assert_eq!(filter_summary(&FilterSpec::default()), "any listing");
        let filters = FilterSpec::new()
            .brand("porsche")
            .brand("audi")
            .price(50.0, 150.0)
            .normalized();
        assert_eq!(filter_summary(&filters), "brand=audi|porsche, price 50..150");
    }
}
