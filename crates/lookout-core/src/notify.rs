//! Outbound notification interface.
//!
//! Delivery (email, push) is someone else's job; the engine hands each
//! notification to a `NotificationSink` and moves on.

use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use crate::listing::ListingId;
use crate::storage::AlertFrequency;

/// New listings for one saved search, addressed to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub user_id: String,
    pub search_id: Uuid,
    pub search_name: String,
    /// `instant` for a single delta, `daily`/`weekly` for a digest
    pub frequency: AlertFrequency,
    pub listing_ids: BTreeSet<ListingId>,
}

/// Receiver of outbound notifications. Fire-and-forget from the engine's
/// point of view.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Sink that only logs notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: &Notification) {
        tracing::info!(
            user_id = %notification.user_id,
            search_id = %notification.search_id,
            frequency = %notification.frequency,
            listings = notification.listing_ids.len(),
            "notification"
        );
    }
}
