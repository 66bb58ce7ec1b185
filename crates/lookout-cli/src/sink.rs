//! Notification sinks available to the CLI.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use lookout_core::{LogSink, Notification, NotificationSink};

use crate::config::NotificationsSection;

/// Appends one JSON line per notification to a file.
#[derive(Debug)]
pub struct OutboxSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl OutboxSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn append(&self, notification: &Notification) -> anyhow::Result<()> {
        let line = serde_json::to_string(notification)?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("outbox lock poisoned"))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

impl NotificationSink for OutboxSink {
    fn notify(&self, notification: &Notification) {
        match self.append(notification) {
            Ok(()) => tracing::info!(
                search_id = %notification.search_id,
                listings = notification.listing_ids.len(),
                outbox = %self.path.display(),
                "notification queued"
            ),
            Err(err) => tracing::error!(
                search_id = %notification.search_id,
                error = %err,
                "failed to write notification"
            ),
        }
    }
}

/// Outbox sink when configured, log-only otherwise.
pub fn build_sink(section: &NotificationsSection) -> Arc<dyn NotificationSink> {
    match &section.outbox {
        Some(path) => Arc::new(OutboxSink::new(path)),
        None => Arc::new(LogSink),
    }
}
