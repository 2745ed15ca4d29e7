//! Periodic live-display updater.
//!
//! Every period the updater pulls one reading from its [`ReadingSource`],
//! replaces the display snapshot, and (when it owns a history store) appends
//! the reading under the reading's local calendar date.
//!
//! A failed tick is logged and leaves the previous snapshot in place. Each
//! tick runs as its own task so even a panic inside a tick does not end the
//! loop.
//!
//! The period can be changed while the loop runs through [`UpdaterControl`],
//! which also reports uptime and tick counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::error::{InvalidInterval, StorageError};
use crate::models::{DateKey, DisplaySnapshot};
use crate::source::ReadingSource;
use crate::store::{KeyValueStore, SharedHistory};

// ---

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Latest display values, `None` until the first successful tick.
pub type DisplayHandle = Arc<RwLock<Option<DisplaySnapshot>>>;

/// What a single tick accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The source failed; display unchanged.
    Skipped,
    /// Display updated; no history kept in this variant.
    Displayed,
    /// Display updated and the reading appended and persisted.
    Recorded,
    /// Display updated and appended in memory, but persisting failed.
    NotPersisted,
    /// Display updated; the reading is dated before the retention window
    /// and was not recorded.
    Rejected,
}

/// Snapshot of the updater's runtime state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdaterStatus {
    // ---
    pub poll_interval_secs: u64,
    pub uptime_secs: u64,
    /// `HH:MM:SS`; hours keep growing past 99.
    pub uptime: String,
    pub ticks: u64,
    pub failed_ticks: u64,
}

/// Handle shared by the updater loop and the HTTP layer.
#[derive(Debug, Clone)]
pub struct UpdaterControl {
    // ---
    period: Arc<watch::Sender<Duration>>,
    display: DisplayHandle,
    started: std::time::Instant,
    ticks: Arc<AtomicU64>,
    failed_ticks: Arc<AtomicU64>,
}

impl UpdaterControl {
    // ---
    fn new(period: Duration) -> Self {
        let (period, _) = watch::channel(period);
        Self {
            period: Arc::new(period),
            display: Arc::new(RwLock::new(None)),
            started: std::time::Instant::now(),
            ticks: Arc::new(AtomicU64::new(0)),
            failed_ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn display(&self) -> DisplayHandle {
        self.display.clone()
    }

    pub fn period(&self) -> Duration {
        *self.period.borrow()
    }

    /// Change the polling period. A running loop picks it up immediately;
    /// the next tick fires one new period from now.
    pub fn set_period(&self, period: Duration) -> Result<(), InvalidInterval> {
        // ---
        if period.is_zero() {
            return Err(InvalidInterval);
        }
        let previous = self.period.send_replace(period);
        tracing::info!(
            from_ms = previous.as_millis() as u64,
            to_ms = period.as_millis() as u64,
            "Poll interval changed"
        );
        Ok(())
    }

    pub fn status(&self) -> UpdaterStatus {
        // ---
        let uptime_secs = self.started.elapsed().as_secs();
        UpdaterStatus {
            poll_interval_secs: self.period().as_secs(),
            uptime_secs,
            uptime: format_uptime(uptime_secs),
            ticks: self.ticks.load(Ordering::Relaxed),
            failed_ticks: self.failed_ticks.load(Ordering::Relaxed),
        }
    }

    fn count(&self, failed: bool) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failed_ticks.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Zero-padded `HH:MM:SS` for a number of seconds.
pub fn format_uptime(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

pub struct LiveUpdater<S, K> {
    // ---
    source: Arc<S>,
    history: Option<SharedHistory<K>>,
    control: UpdaterControl,
}

impl<S, K> Clone for LiveUpdater<S, K> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            history: self.history.clone(),
            control: self.control.clone(),
        }
    }
}

impl<S: ReadingSource, K: KeyValueStore> LiveUpdater<S, K> {
    // ---
    /// `history` is `Some` in the local variant, where the dashboard keeps
    /// its own record; the remote device keeps history itself.
    pub fn new(source: S, history: Option<SharedHistory<K>>) -> Self {
        Self {
            source: Arc::new(source),
            history,
            control: UpdaterControl::new(DEFAULT_POLL_INTERVAL),
        }
    }

    /// Start with `period` instead of [`DEFAULT_POLL_INTERVAL`]. A zero
    /// period is ignored.
    pub fn with_period(self, period: Duration) -> Self {
        // ---
        if self.control.set_period(period).is_err() {
            tracing::warn!("Ignoring zero poll interval, keeping default");
        }
        self
    }

    pub fn display(&self) -> DisplayHandle {
        self.control.display()
    }

    pub fn control(&self) -> UpdaterControl {
        self.control.clone()
    }

    /// Run one update cycle. Never fails; problems are logged.
    pub async fn tick(&self) -> TickOutcome {
        let outcome = self.update().await;
        self.control.count(outcome == TickOutcome::Skipped);
        outcome
    }

    async fn update(&self) -> TickOutcome {
        // ---
        let reading = match self.source.latest().await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Failed to obtain reading, keeping previous display");
                return TickOutcome::Skipped;
            }
        };

        let snapshot = DisplaySnapshot::from_reading(reading, &Local);
        tracing::debug!(
            temperature = %snapshot.temperature,
            humidity = %snapshot.humidity,
            comfort = %snapshot.comfort,
            at = %snapshot.last_updated,
            "Display updated"
        );
        *self.control.display.write().await = Some(snapshot);

        let Some(history) = &self.history else {
            return TickOutcome::Displayed;
        };

        let Some(date) = DateKey::from_timestamp_ms(reading.timestamp, &Local) else {
            tracing::warn!(
                timestamp = reading.timestamp,
                "Reading timestamp out of range, not recorded"
            );
            return TickOutcome::Displayed;
        };

        let mut store = history.lock().await;
        match store.append(date, &reading).await {
            Ok(()) => {
                tracing::debug!(%date, ?reading, "Reading saved");
                TickOutcome::Recorded
            }
            Err(StorageError::OutsideRetention { cutoff, .. }) => {
                tracing::warn!(%date, %cutoff, "Reading older than retention window, not recorded");
                TickOutcome::Rejected
            }
            Err(e) => {
                tracing::error!(%date, error = %e, "Failed to persist history");
                TickOutcome::NotPersisted
            }
        }
    }

    /// Tick forever, starting immediately. Period changes made through
    /// [`UpdaterControl::set_period`] take effect without a restart.
    pub async fn run(self) {
        // ---
        let mut period_rx = self.control.period.subscribe();
        let period = *period_rx.borrow_and_update();
        tracing::info!(period_ms = period.as_millis() as u64, "Starting live display updater");

        let mut ticker = ticker_at(Instant::now(), period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let this = self.clone();
                    if let Err(e) = tokio::spawn(async move { this.tick().await }).await {
                        self.control.count(true);
                        tracing::error!(error = %e, "Tick aborted, continuing with next tick");
                    }
                }
                changed = period_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let period = *period_rx.borrow_and_update();
                    ticker = ticker_at(Instant::now() + period, period);
                }
            }
        }
    }
}

fn ticker_at(start: Instant, period: Duration) -> Interval {
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::error::{SourceError, StorageError};
    use crate::models::{Comfort, Reading};
    use crate::source::SimulatedSource;
    use crate::store::{HistoryStore, MemoryKv};

    /// Replays a fixed script of results, then fails with 503.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Reading, SourceError>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Reading, SourceError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
            }
        }
    }

    impl ReadingSource for ScriptedSource {
        async fn latest(&self) -> Result<Reading, SourceError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(SourceError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE)))
        }
    }

    /// Panics on its first call, then succeeds.
    struct FlakySource {
        calls: Arc<AtomicUsize>,
    }

    impl ReadingSource for FlakySource {
        async fn latest(&self) -> Result<Reading, SourceError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("sensor exploded");
            }
            Ok(sample(25.0, 50.0))
        }
    }

    /// Storage whose writes always fail.
    #[derive(Clone)]
    struct ReadOnlyKv;

    impl KeyValueStore for ReadOnlyKv {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    fn sample(temperature: f64, humidity: f64) -> Reading {
        Reading {
            temperature,
            humidity,
            timestamp: 1_700_000_000_000,
        }
    }

    fn http_500() -> SourceError {
        SourceError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR)
    }

    #[tokio::test]
    async fn test_tick_updates_display() {
        // ---
        let updater: LiveUpdater<_, MemoryKv> =
            LiveUpdater::new(ScriptedSource::new(vec![Ok(sample(22.34, 71.0))]), None);

        assert_eq!(updater.tick().await, TickOutcome::Displayed);

        let display = updater.display();
        let snapshot = display.read().await.clone().unwrap();
        assert_eq!(snapshot.temperature, "22.3");
        assert_eq!(snapshot.humidity, "71");
        assert_eq!(snapshot.comfort, Comfort::Humid);
        assert_eq!(snapshot.last_updated.len(), 8);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_display() {
        // ---
        let source = ScriptedSource::new(vec![Ok(sample(21.0, 40.0)), Err(http_500())]);
        let updater: LiveUpdater<_, MemoryKv> = LiveUpdater::new(source, None);

        assert_eq!(updater.tick().await, TickOutcome::Displayed);
        let before = updater.display().read().await.clone();

        assert_eq!(updater.tick().await, TickOutcome::Skipped);
        let after = updater.display().read().await.clone();

        assert_eq!(before, after);
        assert_eq!(after.unwrap().temperature, "21.0");
    }

    #[tokio::test]
    async fn test_failure_before_first_reading_leaves_display_empty() {
        // ---
        let updater: LiveUpdater<_, MemoryKv> =
            LiveUpdater::new(ScriptedSource::new(vec![Err(http_500())]), None);

        assert_eq!(updater.tick().await, TickOutcome::Skipped);
        assert!(updater.display().read().await.is_none());
    }

    #[tokio::test]
    async fn test_tick_records_reading_under_its_local_date() {
        // ---
        let history = HistoryStore::load(MemoryKv::new(), 0).into_shared();
        let reading = sample(22.3, 45.0);
        let updater = LiveUpdater::new(
            ScriptedSource::new(vec![Ok(reading)]),
            Some(history.clone()),
        );

        assert_eq!(updater.tick().await, TickOutcome::Recorded);

        let date = DateKey::from_timestamp_ms(reading.timestamp, &Local).unwrap();
        let store = history.lock().await;
        let day = store.query(date).unwrap();
        assert_eq!(day.last(), Some(reading));
    }

    #[tokio::test]
    async fn test_persist_failure_still_updates_display() {
        // ---
        let history = HistoryStore::load(ReadOnlyKv, 0).into_shared();
        let updater = LiveUpdater::new(
            ScriptedSource::new(vec![Ok(sample(19.0, 25.0))]),
            Some(history.clone()),
        );

        assert_eq!(updater.tick().await, TickOutcome::NotPersisted);

        let snapshot = updater.display().read().await.clone().unwrap();
        assert_eq!(snapshot.comfort, Comfort::Dry);
        assert_eq!(history.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_ticks_do_not_lose_appends() {
        // ---
        let history = HistoryStore::load(MemoryKv::new(), 0).into_shared();
        let updater = LiveUpdater::new(SimulatedSource, Some(history.clone()));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let u = updater.clone();
                tokio::spawn(async move { u.tick().await })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap(), TickOutcome::Recorded);
        }

        let store = history.lock().await;
        let total: usize = store.dates().map(|d| store.query(d).unwrap().len()).sum();
        assert_eq!(total, 20);
    }

    #[tokio::test]
    async fn test_run_survives_a_panicking_tick() {
        // ---
        let calls = Arc::new(AtomicUsize::new(0));
        let updater: LiveUpdater<_, MemoryKv> = LiveUpdater::new(
            FlakySource {
                calls: calls.clone(),
            },
            None,
        );
        let display = updater.display();
        let control = updater.control();

        let _ = tokio::time::timeout(
            Duration::from_millis(200),
            updater.with_period(Duration::from_millis(10)).run(),
        )
        .await;

        assert!(calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(display.read().await.clone().unwrap().temperature, "25.0");
        assert_eq!(control.status().failed_ticks, 1);
    }

    #[tokio::test]
    async fn test_stale_reading_is_rejected_not_lost_silently() {
        // ---
        let history = HistoryStore::load(MemoryKv::new(), 30).into_shared();
        history
            .lock()
            .await
            .append("2099-01-01".parse().unwrap(), &sample(20.0, 50.0))
            .await
            .unwrap();

        let updater = LiveUpdater::new(
            ScriptedSource::new(vec![Ok(sample(22.3, 45.0))]),
            Some(history.clone()),
        );

        assert_eq!(updater.tick().await, TickOutcome::Rejected);
        assert!(updater.display().read().await.is_some());
        assert_eq!(history.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_run_picks_up_new_period() {
        // ---
        let updater: LiveUpdater<_, MemoryKv> =
            LiveUpdater::new(SimulatedSource, None).with_period(Duration::from_secs(3600));
        let control = updater.control();
        let handle = tokio::spawn(updater.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(control.status().ticks, 1);

        control.set_period(Duration::from_millis(10)).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.abort();

        assert!(control.status().ticks >= 5, "{:?}", control.status());
        assert_eq!(control.status().failed_ticks, 0);
    }

    #[tokio::test]
    async fn test_status_reports_period_and_counters() {
        // ---
        let source = ScriptedSource::new(vec![Ok(sample(21.0, 40.0)), Err(http_500())]);
        let updater: LiveUpdater<_, MemoryKv> =
            LiveUpdater::new(source, None).with_period(Duration::from_secs(10));
        let control = updater.control();

        updater.tick().await;
        updater.tick().await;

        let status = control.status();
        assert_eq!(status.poll_interval_secs, 10);
        assert_eq!(status.ticks, 2);
        assert_eq!(status.failed_ticks, 1);
        assert_eq!(status.uptime, "00:00:00");

        assert!(control.set_period(Duration::ZERO).is_err());
        assert_eq!(control.period(), Duration::from_secs(10));
    }

    #[test]
    fn test_format_uptime() {
        // ---
        assert_eq!(format_uptime(0), "00:00:00");
        assert_eq!(format_uptime(3_723), "01:02:03");
        assert_eq!(format_uptime(360_000), "100:00:00");
    }
}
