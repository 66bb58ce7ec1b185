//! Argument helpers shared by the commands.

use lookout_core::{LookoutError, SearchStore};
use uuid::Uuid;

use crate::errors::CliError;

/// Resolve a search id given as a full UUID or as a prefix of one of the
/// user's searches (e.g. the first 8 characters shown by `list`).
pub fn resolve_search_id(store: &dyn SearchStore, user: &str, raw: &str) -> anyhow::Result<Uuid> {
    let raw = raw.trim();
    if let Ok(id) = Uuid::parse_str(raw) {
        return Ok(id);
    }
    if raw.len() < 4 || !raw.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        return Err(CliError::invalid_input(format!(
            "Invalid search id: {}\nHint: Use a full UUID or at least 4 leading characters.",
            raw
        ))
        .into());
    }

    let prefix = raw.to_ascii_lowercase();
    let matches: Vec<Uuid> = store
        .list_by_user(user)?
        .into_iter()
        .map(|search| search.id)
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(CliError::not_found(
            format!("No saved search matching {}", raw),
            format!("Hint: Run `lookout list --user {}` to see search IDs.", user),
        )
        .into()),
        _ => Err(CliError::invalid_input(format!(
            "Search id prefix {} is ambiguous ({} matches)",
            raw,
            matches.len()
        ))
        .into()),
    }
}

/// Map `None` from a store lookup to a not-found error.
pub fn require_found<T>(value: Option<T>, id: &Uuid) -> anyhow::Result<T> {
    value.ok_or_else(|| LookoutError::NotFound(*id).into())
}

/// First 8 characters of a UUID for table display.
pub fn short_id(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use lookout_core::{FilterSpec, NewSavedSearch, SqliteSearchStore};

    use super::*;

    #[test]
    fn test_resolve_full_and_prefix_ids() {
        let store = SqliteSearchStore::open_in_memory().unwrap();
        let search = store
            .create(&NewSavedSearch::new("alice", "One", FilterSpec::default()))
            .unwrap();

        let full = search.id.to_string();
        assert_eq!(resolve_search_id(&store, "alice", &full).unwrap(), search.id);
        assert_eq!(
            resolve_search_id(&store, "alice", &full[..8]).unwrap(),
            search.id
        );

        // Prefixes only resolve among the caller's own searches.
        assert!(resolve_search_id(&store, "bob", &full[..8]).is_err());
        assert!(resolve_search_id(&store, "alice", "xyz").is_err());
    }

    #[test]
    fn test_short_id() {
        let id = Uuid::parse_str("7a2e3c0b-1234-5678-9abc-def012345678").unwrap();
        assert_eq!(short_id(&id), "7a2e3c0b");
    }
}
