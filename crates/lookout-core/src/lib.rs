//! # Lookout Core
//!
//! Core library for Lookout - a saved-search matching and alerting engine for
//! a vehicle marketplace.
//!
//! This crate provides the domain model, storage abstraction, matching and
//! delta tracking logic, and the background alert scheduler, independent of
//! the CLI interface.
//!
//! ## Architecture
//!
//! - **filter**: Canonical, validated filter criteria (`FilterSpec`)
//! - **listing**: Listing records and the shared matching predicate
//! - **index**: The `ListingIndex` collaborator and an in-memory index
//! - **storage**: `SearchStore` trait and the SQLite backend
//! - **matcher**: Evaluates filters against the listing index
//! - **tracker**: Checkpointed "new match" deltas and acknowledgement
//! - **scheduler**: Cadence-driven checks and notification dispatch
//! - **notify**: The `NotificationSink` collaborator
//! - **badge**: Unread-match totals for navigation badges

pub mod badge;
pub mod error;
pub mod filter;
pub mod index;
pub mod listing;
pub mod matcher;
pub mod notify;
pub mod scheduler;
pub mod storage;
pub mod tracker;

pub use badge::BadgeAggregator;
pub use error::{LookoutError, Result};
pub use filter::{FilterSpec, PriceRange, YearRange};
pub use index::{ListingIndex, MemoryListingIndex};
pub use listing::{Listing, ListingId};
pub use matcher::{Matcher, ResultEntry};
pub use notify::{LogSink, Notification, NotificationSink};
pub use scheduler::{AlertScheduler, SchedulerConfig, TickReport};
pub use storage::{
    AlertFrequency, NewSavedSearch, SavedSearch, SearchPatch, SearchStore, SqliteSearchStore,
};
pub use tracker::{CheckOutcome, DeltaTracker, DiscardReason, MatchDelta};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
