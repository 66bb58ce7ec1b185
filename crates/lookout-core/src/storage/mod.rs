//! Saved-search persistence.

mod sqlite;
mod traits;
mod types;

pub use sqlite::{SqliteSearchStore, MAX_NAME_CHARS};
pub use traits::SearchStore;
pub use types::{
    AlertFrequency, CheckCommit, CommitOutcome, DiscardReason, NewSavedSearch, SavedSearch,
    SearchPatch,
};
