//! Background alert scheduler.
//!
//! Every tick the scheduler lists the alert-enabled searches, picks the ones
//! whose cadence has elapsed, and checks them concurrently on the blocking
//! pool. Instant searches are notified on every non-empty delta. Daily and
//! weekly searches buffer their deltas and send at most one digest per
//! window. An unavailable index skips the check without advancing
//! `last_checked`, so the search is simply retried on the next tick.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{LookoutError, Result};
use crate::notify::{Notification, NotificationSink};
use crate::storage::{AlertFrequency, SavedSearch};
use crate::tracker::{CheckOutcome, DeltaTracker, MatchDelta};

/// Scheduler cadence and concurrency settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the scheduler wakes up (the instant cadence)
    pub tick_interval: StdDuration,
    /// Minimum time between checks, and between digests, of a daily search
    pub daily_window: Duration,
    /// Minimum time between checks, and between digests, of a weekly search
    pub weekly_window: Duration,
    /// Upper bound on checks running at the same time
    pub max_concurrent_checks: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: StdDuration::from_secs(60),
            daily_window: Duration::hours(24),
            weekly_window: Duration::days(7),
            max_concurrent_checks: 8,
        }
    }
}

impl SchedulerConfig {
    /// Cadence window for a frequency. Instant searches have none.
    pub fn window(&self, frequency: AlertFrequency) -> Duration {
        match frequency {
            AlertFrequency::Instant => Duration::zero(),
            AlertFrequency::Daily => self.daily_window,
            AlertFrequency::Weekly => self.weekly_window,
        }
    }
}

/// Counters for one scheduler tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Searches whose cadence had elapsed
    pub due: usize,
    /// Due searches left alone because their previous check was still running
    pub skipped: usize,
    /// Checks written back
    pub checked: usize,
    /// Notifications handed to the sink
    pub notified: usize,
    /// Checks skipped because the index was unavailable
    pub unavailable: usize,
    /// Checks thrown away (search deleted or filters changed mid-check)
    pub discarded: usize,
    /// Checks that failed for any other reason
    pub failed: usize,
}

impl TickReport {
    fn record(&mut self, joined: std::result::Result<(Uuid, Result<CheckRun>), JoinError>) {
        match joined {
            Ok((_, Ok(run))) => {
                match run.outcome {
                    CheckOutcome::Applied(_) => self.checked += 1,
                    CheckOutcome::Discarded(_) => self.discarded += 1,
                }
                if run.notified {
                    self.notified += 1;
                }
            }
            Ok((search_id, Err(err))) if err.is_transient() => {
                self.unavailable += 1;
                tracing::warn!(%search_id, error = %err, "index unavailable, will retry next tick");
            }
            Ok((search_id, Err(err))) => {
                self.failed += 1;
                tracing::error!(%search_id, error = %err, "check failed");
            }
            Err(err) => {
                self.failed += 1;
                tracing::error!(error = %err, "check task panicked");
            }
        }
    }

    fn completed(&self) -> usize {
        self.checked + self.unavailable + self.discarded + self.failed
    }
}

/// Result of a single check plus its dispatch.
#[derive(Debug)]
struct CheckRun {
    outcome: CheckOutcome,
    notified: bool,
}

type CheckTasks = JoinSet<(Uuid, Result<CheckRun>)>;

/// Marks a search as having a scheduled check running. Dropping the claim
/// releases it, also when the check panics or its task is aborted.
struct InFlight {
    running: Arc<Mutex<HashSet<Uuid>>>,
    search_id: Uuid,
}

impl InFlight {
    fn claim(running: &Arc<Mutex<HashSet<Uuid>>>, search_id: Uuid) -> Result<Option<Self>> {
        let mut set = running
            .lock()
            .map_err(|_| LookoutError::Storage("In-flight set poisoned".to_string()))?;
        if !set.insert(search_id) {
            return Ok(None);
        }
        Ok(Some(Self {
            running: Arc::clone(running),
            search_id,
        }))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.search_id);
    }
}

/// Drives periodic checks and notification dispatch.
///
/// Clones share the concurrency limit and the set of searches with a
/// scheduled check in flight.
#[derive(Clone)]
pub struct AlertScheduler {
    tracker: Arc<DeltaTracker>,
    sink: Arc<dyn NotificationSink>,
    config: SchedulerConfig,
    permits: Arc<Semaphore>,
    running: Arc<Mutex<HashSet<Uuid>>>,
}

impl std::fmt::Debug for AlertScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertScheduler")
            .field("tracker", &self.tracker)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn join_error(err: JoinError) -> LookoutError {
    LookoutError::Storage(format!("Check task failed: {}", err))
}

impl AlertScheduler {
    pub fn new(
        tracker: Arc<DeltaTracker>,
        sink: Arc<dyn NotificationSink>,
        config: SchedulerConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_checks.max(1)));
        Self {
            tracker,
            sink,
            config,
            permits,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<DeltaTracker> {
        &self.tracker
    }

    /// Whether a search's cadence has elapsed at `now`.
    pub fn is_due(&self, search: &SavedSearch, now: DateTime<Utc>) -> bool {
        if !search.alert_enabled {
            return false;
        }
        match search.alert_frequency {
            AlertFrequency::Instant => true,
            frequency => search.since_last_check(now) >= self.config.window(frequency),
        }
    }

    /// Run one scheduling pass at `now` and wait for the checks it started.
    ///
    /// Per-search failures are logged and counted, never returned. A search
    /// whose previous check is still running is counted as skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only if the list of searches cannot be loaded.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let mut tasks = CheckTasks::new();
        let mut report = self.launch_due(now, &mut tasks).await?;
        while let Some(joined) = tasks.join_next().await {
            report.record(joined);
        }

        if report.due > 0 {
            tracing::info!(
                due = report.due,
                skipped = report.skipped,
                checked = report.checked,
                notified = report.notified,
                unavailable = report.unavailable,
                discarded = report.discarded,
                failed = report.failed,
                "scheduler tick"
            );
        } else {
            tracing::debug!("scheduler tick, nothing due");
        }

        Ok(report)
    }

    /// User-triggered check: bypasses the cadence, then dispatches exactly
    /// like a scheduled check.
    ///
    /// # Errors
    ///
    /// Returns `LookoutError::NotFound` / `LookoutError::Unauthorized` for an
    /// unknown or foreign search and `LookoutError::IndexUnavailable` if the
    /// index is down (nothing is written in that case).
    pub async fn check_now(&self, caller: &str, search_id: Uuid) -> Result<CheckOutcome> {
        let scheduler = self.clone();
        let caller = caller.to_string();
        let now = Utc::now();
        tokio::task::spawn_blocking(move || {
            scheduler.tracker.authorize(&caller, &search_id)?;
            scheduler.run_check(&search_id, now).map(|run| run.outcome)
        })
        .await
        .map_err(join_error)?
    }

    /// Start due checks every `tick_interval` until `cancel` fires.
    ///
    /// Checks are reaped as they finish; the loop never waits for a batch,
    /// so a slow search only holds up its own next check.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            tick_ms = self.config.tick_interval.as_millis() as u64,
            "alert scheduler started"
        );

        let mut tasks = CheckTasks::new();
        let mut finished = TickReport::default();
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    finished.record(joined);
                }
                _ = ticker.tick() => {
                    if finished.completed() > 0 {
                        tracing::info!(
                            checked = finished.checked,
                            notified = finished.notified,
                            unavailable = finished.unavailable,
                            discarded = finished.discarded,
                            failed = finished.failed,
                            "scheduled checks finished"
                        );
                        finished = TickReport::default();
                    }
                    match self.launch_due(Utc::now(), &mut tasks).await {
                        Ok(launched) if launched.skipped > 0 => {
                            tracing::debug!(
                                due = launched.due,
                                skipped = launched.skipped,
                                "searches still being checked"
                            );
                        }
                        Ok(_) => {}
                        Err(err) => tracing::error!(error = %err, "scheduler tick failed"),
                    }
                }
            }
        }

        tasks.shutdown().await;
        tracing::info!("alert scheduler stopped");
    }

    /// Spawn a check for every due search that has none in flight. Returns a
    /// report with only `due` and `skipped` filled in.
    async fn launch_due(&self, now: DateTime<Utc>, tasks: &mut CheckTasks) -> Result<TickReport> {
        let store = Arc::clone(self.tracker.store());
        let searches = tokio::task::spawn_blocking(move || store.list_alerting())
            .await
            .map_err(join_error)??;

        let mut report = TickReport::default();
        for search in searches.iter().filter(|search| self.is_due(search, now)) {
            report.due += 1;
            let Some(claim) = InFlight::claim(&self.running, search.id)? else {
                report.skipped += 1;
                tracing::debug!(search_id = %search.id, "previous check still running");
                continue;
            };

            let scheduler = self.clone();
            let search_id = search.id;
            tasks.spawn(async move {
                let permit = match Arc::clone(&scheduler.permits).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        let err = LookoutError::Storage(format!("Scheduler semaphore closed: {}", e));
                        return (search_id, Err(err));
                    }
                };
                let result = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    let _claim = claim;
                    scheduler.run_check(&search_id, now)
                })
                .await
                .map_err(join_error)
                .and_then(|result| result);
                (search_id, result)
            });
        }
        Ok(report)
    }

    fn run_check(&self, search_id: &Uuid, now: DateTime<Utc>) -> Result<CheckRun> {
        let outcome = self.tracker.check(search_id, now)?;
        let notified = match &outcome {
            CheckOutcome::Applied(delta) => self.dispatch(delta, now)?,
            CheckOutcome::Discarded(_) => false,
        };
        Ok(CheckRun { outcome, notified })
    }

    /// Forward a delta according to the search's frequency. Returns whether
    /// a notification was sent.
    ///
    /// Every store write is stamped with the generation the check evaluated;
    /// a delta whose filters were replaced after the commit is dropped.
    fn dispatch(&self, delta: &MatchDelta, now: DateTime<Utc>) -> Result<bool> {
        let store = self.tracker.store();
        let Some(search) = store.get(&delta.search_id)? else {
            return Ok(false);
        };
        if !search.alert_enabled {
            return Ok(false);
        }
        if search.generation != delta.generation {
            tracing::debug!(search_id = %search.id, "filters changed since check, delta dropped");
            return Ok(false);
        }

        let listing_ids = match search.alert_frequency {
            AlertFrequency::Instant => {
                // Flush anything buffered while the search was on a digest cadence.
                let mut ids =
                    store.take_digest(&search.id, delta.generation, now, Duration::zero())?;
                ids.extend(delta.new_listing_ids.iter().cloned());
                if ids.is_empty() || !store.record_notified(&search.id, delta.generation, now)? {
                    return Ok(false);
                }
                ids
            }
            frequency => {
                if !delta.is_empty()
                    && !store.queue_digest(&search.id, delta.generation, &delta.new_listing_ids)?
                {
                    return Ok(false);
                }
                let ids = store.take_digest(
                    &search.id,
                    delta.generation,
                    now,
                    self.config.window(frequency),
                )?;
                if ids.is_empty() {
                    return Ok(false);
                }
                ids
            }
        };

        self.sink.notify(&Notification {
            user_id: search.user_id.clone(),
            search_id: search.id,
            search_name: search.name.clone(),
            frequency: search.alert_frequency,
            listing_ids,
        });
        tracing::debug!(search_id = %search.id, frequency = %search.alert_frequency, "notification dispatched");
        Ok(true)
    }
}
