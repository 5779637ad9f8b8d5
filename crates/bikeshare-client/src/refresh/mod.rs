// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Periodic station refresh.
//!
//! The scheduler polls a [`StationSource`] on a fixed period and swaps the
//! whole station layer on every successful fetch. The fetch is awaited inside
//! the polling loop, and a one-off [`RefreshScheduler::refresh_once`] claims
//! the same [`RefreshPhase::Fetching`] slot, so a scheduler never has two
//! fetches in flight. Every run
//! of the loop carries a generation number; [`RefreshScheduler::stop`] and a
//! restart through [`RefreshScheduler::start`] bump the generation, and results
//! from an older generation are dropped instead of applied.
//!
//! Failed fetches leave the current layer alone. The next tick tries again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::map::{MapSurface, SharedMapView};
use crate::marker::build_markers;
use crate::source::{FetchError, StationSource};

/// Default polling period.
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(60);

/// Where the scheduler is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPhase {
    /// Waiting for the next tick.
    #[default]
    Idle,
    /// A fetch is in flight.
    Fetching,
    /// Stopped; nothing will be applied until the next start.
    Stopped,
}

/// Observable outcome of past refreshes.
#[derive(Debug, Clone, Default)]
pub struct RefreshStatus {
    pub phase: RefreshPhase,
    /// Time the station layer was last replaced.
    pub last_success: Option<DateTime<Utc>>,
    /// Markers on the layer after the last successful refresh.
    pub station_count: usize,
    /// Entries dropped as malformed in the last successful refresh.
    pub dropped_records: usize,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub completed_refreshes: u64,
}

/// Why a one-off refresh did not replace the station layer.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("a station fetch is already in flight")]
    Busy,

    #[error("refresh result discarded, the scheduler was restarted")]
    Superseded,
}

#[derive(Debug, Default)]
struct Shared {
    generation: u64,
    status: RefreshStatus,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Polls a station source and keeps the station layer current.
pub struct RefreshScheduler<S, M> {
    source: Arc<S>,
    view: SharedMapView<M>,
    shared: Arc<Mutex<Shared>>,
    trigger: Arc<Notify>,
    cancel_token: CancellationToken,
    running: bool,
}

impl<S, M> std::fmt::Debug for RefreshScheduler<S, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("running", &self.running)
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl<S: StationSource, M: MapSurface + 'static> RefreshScheduler<S, M> {
    /// Create a scheduler that draws into the given view. Nothing is fetched
    /// until [`start`](Self::start).
    pub fn new(source: S, view: SharedMapView<M>) -> Self {
        Self {
            source: Arc::new(source),
            view,
            shared: Arc::new(Mutex::new(Shared::default())),
            trigger: Arc::new(Notify::new()),
            cancel_token: CancellationToken::new(),
            running: false,
        }
    }

    /// Start polling: fetch now, then once per `period`.
    ///
    /// Starting a running scheduler supersedes the previous timer; a fetch
    /// still in flight from it is abandoned and its result is never applied.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, period: Duration) {
        if self.running {
            info!("Restarting station refresh with period {:?}", period);
            self.cancel_token.cancel();
        } else {
            info!("Starting station refresh with period {:?}", period);
        }

        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.status.phase = RefreshPhase::Idle;
            shared.generation
        };

        self.cancel_token = CancellationToken::new();
        self.running = true;

        let task = RefreshTask {
            source: Arc::clone(&self.source),
            view: Arc::clone(&self.view),
            shared: Arc::clone(&self.shared),
            trigger: Arc::clone(&self.trigger),
            cancel_token: self.cancel_token.clone(),
            generation,
        };

        tokio::spawn(task.run(period));
    }

    /// Ask for an immediate refresh.
    ///
    /// Ignored while a fetch is in flight or when the scheduler is not running.
    pub fn refresh_now(&self) {
        if !self.running {
            return;
        }
        let shared = lock(&self.shared);
        if shared.status.phase == RefreshPhase::Fetching {
            debug!("Refresh already in flight, ignoring manual trigger");
            return;
        }
        self.trigger.notify_one();
    }

    /// Stop polling and drop any in-flight result. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.cancel_token.cancel();

        let mut shared = lock(&self.shared);
        if self.running {
            info!("Stopping station refresh");
            shared.generation += 1;
        }
        shared.status.phase = RefreshPhase::Stopped;
        self.running = false;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub fn status(&self) -> RefreshStatus {
        lock(&self.shared).status.clone()
    }

    /// Run a single fetch outside the timer and apply it.
    ///
    /// Works whether or not the timer is running, and leaves the phase as it
    /// found it. Returns the number of markers on the layer afterwards, or
    /// [`RefreshError::Busy`] if a timer fetch is already in flight. A timer
    /// tick that comes due meanwhile is skipped.
    pub async fn refresh_once(&self) -> Result<usize, RefreshError> {
        let claim = OneOffClaim::acquire(&self.shared)?;
        let generation = claim.generation;
        let resume = claim.resume;

        match self.source.fetch_stations().await {
            Ok(raw) => apply_stations(&self.shared, &self.view, generation, false, resume, &raw)
                .ok_or(RefreshError::Superseded),
            Err(e) => {
                record_failure(&self.shared, generation, false, resume, &e);
                Err(e.into())
            }
        }
    }
}

impl<S, M> Drop for RefreshScheduler<S, M> {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// The fetch slot held by a one-off refresh. Hands the phase back if the
/// refresh is dropped before its result is recorded.
struct OneOffClaim<'a> {
    shared: &'a Mutex<Shared>,
    generation: u64,
    resume: RefreshPhase,
}

impl<'a> OneOffClaim<'a> {
    fn acquire(shared: &'a Mutex<Shared>) -> Result<Self, RefreshError> {
        let mut guard = lock(shared);
        if guard.status.phase == RefreshPhase::Fetching {
            debug!("Station fetch already in flight, refusing one-off refresh");
            return Err(RefreshError::Busy);
        }
        let resume = guard.status.phase;
        guard.status.phase = RefreshPhase::Fetching;

        Ok(Self {
            shared,
            generation: guard.generation,
            resume,
        })
    }
}

impl Drop for OneOffClaim<'_> {
    fn drop(&mut self) {
        let mut shared = lock(self.shared);
        if shared.generation == self.generation && shared.status.phase == RefreshPhase::Fetching {
            shared.status.phase = self.resume;
        }
    }
}

enum FetchSlot {
    Claimed,
    Busy,
    Superseded,
}

struct RefreshTask<S, M> {
    source: Arc<S>,
    view: SharedMapView<M>,
    shared: Arc<Mutex<Shared>>,
    trigger: Arc<Notify>,
    cancel_token: CancellationToken,
    generation: u64,
}

impl<S: StationSource, M: MapSurface + 'static> RefreshTask<S, M> {
    async fn run(self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    debug!("Refresh loop (generation {}) cancelled", self.generation);
                    return;
                }
                _ = interval.tick() => {}
                () = self.trigger.notified() => {
                    debug!("Manual refresh requested");
                }
            }

            match self.begin_fetch() {
                FetchSlot::Claimed => {}
                FetchSlot::Busy => {
                    debug!("One-off refresh in flight, skipping tick");
                    continue;
                }
                FetchSlot::Superseded => return,
            }

            let result = tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    info!("Station fetch abandoned (generation {} superseded)", self.generation);
                    return;
                }
                result = self.source.fetch_stations() => result,
            };

            let cancelled = self.cancel_token.is_cancelled();
            let (shared, generation) = (&self.shared, self.generation);
            match result {
                Ok(raw) => {
                    apply_stations(shared, &self.view, generation, cancelled, RefreshPhase::Idle, &raw);
                }
                Err(e) => record_failure(shared, generation, cancelled, RefreshPhase::Idle, &e),
            }

            // A fetch may have outlasted the period; start the next one a full
            // period from now instead of immediately.
            interval.reset();
        }
    }

    fn begin_fetch(&self) -> FetchSlot {
        let mut shared = lock(&self.shared);
        if shared.generation != self.generation {
            return FetchSlot::Superseded;
        }
        if shared.status.phase == RefreshPhase::Fetching {
            return FetchSlot::Busy;
        }
        shared.status.phase = RefreshPhase::Fetching;
        FetchSlot::Claimed
    }
}

/// Build markers from a fetched payload and swap them in if the fetch is
/// still current, then hand the phase over to `resume`. Returns the marker
/// count when applied.
fn apply_stations<M: MapSurface>(
    shared: &Mutex<Shared>,
    view: &SharedMapView<M>,
    generation: u64,
    cancelled: bool,
    resume: RefreshPhase,
    raw: &[Value],
) -> Option<usize> {
    let batch = build_markers(raw);

    let mut shared = lock(shared);
    if cancelled || shared.generation != generation {
        info!(
            "Discarding station refresh from stale generation {} ({} stations)",
            generation,
            batch.markers.len()
        );
        return None;
    }

    let count = batch.markers.len();
    let dropped = batch.dropped.len();
    lock(view).replace_stations(batch.markers);

    let status = &mut shared.status;
    status.phase = resume;
    status.last_success = Some(Utc::now());
    status.station_count = count;
    status.dropped_records = dropped;
    status.consecutive_failures = 0;
    status.last_error = None;
    status.completed_refreshes += 1;

    if dropped > 0 {
        warn!("Refreshed {} stations, dropped {} malformed entries", count, dropped);
    } else {
        info!("Refreshed {} stations", count);
    }

    Some(count)
}

fn record_failure(
    shared: &Mutex<Shared>,
    generation: u64,
    cancelled: bool,
    resume: RefreshPhase,
    error: &FetchError,
) {
    let mut shared = lock(shared);
    if cancelled || shared.generation != generation {
        debug!("Ignoring failure from stale generation {}: {}", generation, error);
        return;
    }

    let status = &mut shared.status;
    status.phase = resume;
    status.consecutive_failures += 1;
    status.last_error = Some(error.to_string());

    warn!(
        "Station refresh failed ({} in a row), keeping current layer: {}",
        status.consecutive_failures, error
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::cluster::ClusterAggregator;
    use crate::map::testing::RecordingSurface;
    use crate::map::{LatLng, MapView};
    use crate::source::TransportError;

    #[derive(Debug, Clone)]
    enum Step {
        Stations(Vec<Value>),
        Fail,
    }

    /// Source that plays back a script, repeating the last step forever.
    #[derive(Debug)]
    struct ScriptedSource {
        steps: Mutex<VecDeque<Step>>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>, delay: Duration) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                delay,
                calls: Arc::new(AtomicUsize::new(0)),
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn next_step(&self) -> Step {
            let mut steps = lock(&self.steps);
            if steps.len() > 1 {
                steps.pop_front().unwrap()
            } else {
                steps.front().cloned().unwrap()
            }
        }
    }

    impl StationSource for ScriptedSource {
        fn fetch_stations(&self) -> impl Future<Output = Result<Vec<Value>, FetchError>> + Send {
            let step = self.next_step();
            let delay = self.delay;
            let calls = Arc::clone(&self.calls);
            let in_flight = Arc::clone(&self.in_flight);
            let max_in_flight = Arc::clone(&self.max_in_flight);

            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);

                match step {
                    Step::Stations(v) => Ok(v),
                    Step::Fail => Err(FetchError::Transport(TransportError::Io(
                        std::io::Error::other("network unreachable"),
                    ))),
                }
            }
        }
    }

    fn stations(n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| {
                json!({
                    "name": format!("Station {i}"),
                    "lat": 19.40 + 0.05 * i as f64,
                    "lon": -99.17,
                    "bikes": i,
                    "slots": 10
                })
            })
            .collect()
    }

    fn view() -> SharedMapView<RecordingSurface> {
        MapView::new(
            RecordingSurface::default(),
            LatLng::new(19.398_309, -99.173_708),
            17,
            ClusterAggregator::default(),
        )
        .into_shared()
    }

    async fn settle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_immediately_then_periodically() {
        let source = ScriptedSource::new(vec![Step::Stations(stations(3))], Duration::ZERO);
        let calls = Arc::clone(&source.calls);
        let view = view();
        let mut scheduler = RefreshScheduler::new(source, Arc::clone(&view));

        scheduler.start(Duration::from_secs(60));
        settle(10).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(lock(&view).stations().len(), 3);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(lock(&view).swap_count(), 2);
        assert_eq!(scheduler.status().completed_refreshes, 2);
        assert!(scheduler.status().last_success.is_some());

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_existing_layer() {
        let source = ScriptedSource::new(
            vec![Step::Stations(stations(4)), Step::Fail, Step::Stations(stations(2))],
            Duration::ZERO,
        );
        let view = view();
        let mut scheduler = RefreshScheduler::new(source, Arc::clone(&view));

        scheduler.start(Duration::from_secs(60));
        settle(10).await;
        assert_eq!(lock(&view).stations().len(), 4);

        tokio::time::sleep(Duration::from_secs(60)).await;
        let status = scheduler.status();
        assert_eq!(status.consecutive_failures, 1);
        assert!(status.last_error.as_deref().unwrap().contains("network unreachable"));
        assert_eq!(status.phase, RefreshPhase::Idle);
        assert_eq!(lock(&view).stations().len(), 4);
        assert_eq!(lock(&view).swap_count(), 1);

        // Self-heals on the next good poll
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(lock(&view).stations().len(), 2);
        assert_eq!(scheduler.status().consecutive_failures, 0);

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_record_is_isolated() {
        let mut raw = stations(3);
        raw[1]["bikes"] = json!("not a number");
        let source = ScriptedSource::new(vec![Step::Stations(raw)], Duration::ZERO);
        let view = view();
        let mut scheduler = RefreshScheduler::new(source, Arc::clone(&view));

        scheduler.start(Duration::from_secs(60));
        settle(10).await;

        assert_eq!(lock(&view).stations().len(), 2);
        assert_eq!(
            lock(&view).surface().stations.as_ref().map(Vec::len),
            Some(2)
        );
        let status = scheduler.status();
        assert_eq!(status.station_count, 2);
        assert_eq!(status.dropped_records, 1);

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_never_overlaps() {
        // Each fetch takes longer than the period
        let source = ScriptedSource::new(
            vec![Step::Stations(stations(2))],
            Duration::from_secs(150),
        );
        let calls = Arc::clone(&source.calls);
        let max_in_flight = Arc::clone(&source.max_in_flight);
        let view = view();
        let mut scheduler = RefreshScheduler::new(source, Arc::clone(&view));

        scheduler.start(Duration::from_secs(60));
        settle(10).await;
        scheduler.refresh_now();
        scheduler.refresh_now();

        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        let swaps = lock(&view).swap_count();
        assert!(swaps >= 2);
        assert_eq!(swaps, scheduler.status().completed_refreshes);
        let started = u64::try_from(calls.load(Ordering::SeqCst)).unwrap();
        assert!(started <= swaps + 1);

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_now_when_idle() {
        let source = ScriptedSource::new(vec![Step::Stations(stations(1))], Duration::ZERO);
        let calls = Arc::clone(&source.calls);
        let view = view();
        let mut scheduler = RefreshScheduler::new(source, view);

        scheduler.start(Duration::from_secs(60));
        settle(10).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        scheduler.refresh_now();
        settle(10).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_result() {
        let source = ScriptedSource::new(
            vec![Step::Stations(stations(3))],
            Duration::from_secs(10),
        );
        let view = view();
        let mut scheduler = RefreshScheduler::new(source, Arc::clone(&view));

        scheduler.start(Duration::from_secs(60));
        settle(1000).await;
        assert_eq!(scheduler.status().phase, RefreshPhase::Fetching);

        scheduler.stop();
        scheduler.stop();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(lock(&view).swap_count(), 0);
        assert!(lock(&view).surface().calls.is_empty());
        assert_eq!(scheduler.status().phase, RefreshPhase::Stopped);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_supersedes_previous_run() {
        let source = ScriptedSource::new(
            vec![Step::Stations(stations(3))],
            Duration::from_secs(10),
        );
        let calls = Arc::clone(&source.calls);
        let view = view();
        let mut scheduler = RefreshScheduler::new(source, Arc::clone(&view));

        scheduler.start(Duration::from_secs(60));
        settle(1000).await;
        scheduler.start(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(15)).await;

        // Two fetches started, only the second run's result was applied
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(lock(&view).swap_count(), 1);

        scheduler.stop();
    }

    #[test]
    fn test_late_result_after_stop_is_discarded() {
        let shared = Mutex::new(Shared::default());
        let view = view();
        let generation = lock(&shared).generation;

        // Stop bumps the generation while the fetch is still out
        lock(&shared).generation += 1;

        let applied =
            apply_stations(&shared, &view, generation, false, RefreshPhase::Idle, &stations(2));
        assert!(applied.is_none());
        assert_eq!(lock(&view).swap_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_once() {
        let source = ScriptedSource::new(vec![Step::Stations(stations(5))], Duration::ZERO);
        let view = view();
        let scheduler = RefreshScheduler::new(source, Arc::clone(&view));

        assert_eq!(scheduler.refresh_once().await.unwrap(), 5);
        assert_eq!(lock(&view).stations().len(), 5);
    }

    #[tokio::test]
    async fn test_refresh_once_failure() {
        let source = ScriptedSource::new(vec![Step::Fail], Duration::ZERO);
        let view = view();
        let scheduler = RefreshScheduler::new(source, Arc::clone(&view));

        assert!(scheduler.refresh_once().await.is_err());
        assert_eq!(scheduler.status().consecutive_failures, 1);
        assert_eq!(lock(&view).swap_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_off_refresh_shares_the_fetch_slot() {
        let source = ScriptedSource::new(
            vec![Step::Stations(stations(3))],
            Duration::from_secs(20),
        );
        let calls = Arc::clone(&source.calls);
        let max_in_flight = Arc::clone(&source.max_in_flight);
        let view = view();
        let mut scheduler = RefreshScheduler::new(source, Arc::clone(&view));

        scheduler.start(Duration::from_secs(30));
        settle(1000).await;
        assert_eq!(scheduler.status().phase, RefreshPhase::Fetching);
        assert!(matches!(scheduler.refresh_once().await, Err(RefreshError::Busy)));

        // The timer fetch lands at 20 s and the next tick is due at 50 s.
        // A one-off started at 40 s runs through that tick.
        tokio::time::sleep(Duration::from_secs(39)).await;
        assert_eq!(lock(&view).swap_count(), 1);
        assert_eq!(scheduler.refresh_once().await.unwrap(), 3);

        assert_eq!(lock(&view).swap_count(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.status().phase, RefreshPhase::Idle);

        // The timer carries on at 80 s
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_once_after_stop() {
        let source = ScriptedSource::new(vec![Step::Stations(stations(5))], Duration::ZERO);
        let view = view();
        let mut scheduler = RefreshScheduler::new(source, Arc::clone(&view));

        scheduler.start(Duration::from_secs(60));
        settle(10).await;
        scheduler.stop();
        assert_eq!(lock(&view).swap_count(), 1);

        assert_eq!(scheduler.refresh_once().await.unwrap(), 5);
        assert_eq!(lock(&view).swap_count(), 2);
        assert_eq!(scheduler.status().phase, RefreshPhase::Stopped);
        assert!(!scheduler.is_running());

        // Still no timer
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(lock(&view).swap_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_one_off_releases_the_slot() {
        let source = ScriptedSource::new(
            vec![Step::Stations(stations(2))],
            Duration::from_secs(10),
        );
        let view = view();
        let scheduler = RefreshScheduler::new(source, Arc::clone(&view));

        let timed_out =
            tokio::time::timeout(Duration::from_secs(1), scheduler.refresh_once()).await;
        assert!(timed_out.is_err());
        assert_eq!(scheduler.status().phase, RefreshPhase::Idle);

        assert_eq!(scheduler.refresh_once().await.unwrap(), 2);
    }
}
