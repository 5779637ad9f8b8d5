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

//! User location tracking.
//!
//! Consumes a push-based position stream and keeps one "you are here" marker
//! on the user sub-layer. The first fix also flies the view to the user;
//! later fixes only move and rotate the marker.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{error, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::map::{ImageIcon, LatLng, MapMarker, MapSurface, MarkerIcon, SharedMapView};

/// Zoom level used when centering on the first fix.
pub const DEFAULT_FLY_TO_ZOOM: u8 = 18;

/// One emission of the position stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Direction of travel in degrees clockwise from north, when known.
    pub heading: Option<f64>,
}

/// Position stream failures. Terminal for the tracker that sees them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("position source failed: {0}")]
    Source(String),

    #[error("position stream closed")]
    Closed,
}

/// Item type of a position stream.
pub type PositionEvent = Result<PositionFix, StreamError>;

/// A push-based source of position fixes.
///
/// Subscribing hands over the receiving end of the stream; dropping the
/// receiver unsubscribes.
pub trait PositionSource: Send + 'static {
    fn subscribe(self) -> mpsc::Receiver<PositionEvent>;
}

impl PositionSource for mpsc::Receiver<PositionEvent> {
    fn subscribe(self) -> mpsc::Receiver<PositionEvent> {
        self
    }
}

/// Last known user position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserPosition {
    pub lat: f64,
    pub lon: f64,
    pub heading_degrees: f64,
}

/// Tracker lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrackerState {
    /// Subscribed, no fix yet.
    #[default]
    Waiting,
    /// At least one fix received.
    Tracking,
    /// Stopped by the caller.
    Stopped,
    /// The stream failed; no further fixes are accepted.
    Failed(StreamError),
}

/// Configuration for the location tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub fly_to_zoom: u8,
    pub icon: ImageIcon,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            fly_to_zoom: DEFAULT_FLY_TO_ZOOM,
            icon: ImageIcon::default(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: TrackerState,
    position: Option<UserPosition>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct TrackerShared<M> {
    inner: Mutex<Inner>,
    view: SharedMapView<M>,
    config: TrackerConfig,
    cancel_token: CancellationToken,
}

impl<M: MapSurface> TrackerShared<M> {
    fn update(&self, fix: PositionFix) {
        let mut inner = lock(&self.inner);
        if self.cancel_token.is_cancelled()
            || matches!(inner.state, TrackerState::Stopped | TrackerState::Failed(_))
        {
            return;
        }

        let position = UserPosition {
            lat: fix.latitude,
            lon: fix.longitude,
            // Stationary devices report no heading, some report NaN
            heading_degrees: fix.heading.filter(|h| h.is_finite()).unwrap_or(0.0),
        };
        let first_fix = inner.position.is_none();
        inner.position = Some(position);
        inner.state = TrackerState::Tracking;

        let at = LatLng::new(position.lat, position.lon);
        let marker = MapMarker {
            position: at,
            icon: MarkerIcon::Image(self.config.icon.clone()),
            rotation_degrees: position.heading_degrees,
            popup: None,
        };

        let mut view = lock(&self.view);
        if first_fix {
            info!("First position fix at {:.5}, {:.5}", at.lat, at.lon);
            view.fly_to(at, self.config.fly_to_zoom);
        }
        view.set_user_marker(marker);
    }

    fn fail(&self, error: StreamError) {
        let mut inner = lock(&self.inner);
        if inner.state != TrackerState::Stopped {
            inner.state = TrackerState::Failed(error);
        }
    }

    async fn run(&self, mut rx: mpsc::Receiver<PositionEvent>) {
        loop {
            tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    return;
                }
                event = rx.recv() => match event {
                    Some(Ok(fix)) => self.update(fix),
                    Some(Err(e)) => {
                        error!("Position stream failed: {}", e);
                        self.fail(e);
                        return;
                    }
                    None => {
                        if !self.cancel_token.is_cancelled() {
                            warn!("Position stream closed unexpectedly");
                            self.fail(StreamError::Closed);
                        }
                        return;
                    }
                },
            }
        }
    }
}

/// Keeps the user marker in step with a position stream.
///
/// Dropping the handle stops tracking.
pub struct LocationTracker<M> {
    shared: Arc<TrackerShared<M>>,
}

impl<M> std::fmt::Debug for LocationTracker<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationTracker")
            .field("inner", &self.shared.inner)
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl<M: MapSurface + 'static> LocationTracker<M> {
    /// Subscribe to `source` and track it in a background task.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn<P: PositionSource>(source: P, view: SharedMapView<M>, config: TrackerConfig) -> Self {
        let shared = Arc::new(TrackerShared {
            inner: Mutex::new(Inner::default()),
            view,
            config,
            cancel_token: CancellationToken::new(),
        });

        let worker = Arc::clone(&shared);
        let rx = source.subscribe();
        tokio::spawn(async move {
            worker.run(rx).await;
        });

        Self { shared }
    }

    /// Apply one position fix.
    ///
    /// A no-op once the tracker is stopped or has failed.
    pub fn update(&self, fix: PositionFix) {
        self.shared.update(fix);
    }

    /// Unsubscribe from the stream. The last marker stays on the map.
    /// Safe to call repeatedly.
    pub fn stop(&self) {
        self.shared.cancel_token.cancel();
        let mut inner = lock(&self.shared.inner);
        if matches!(inner.state, TrackerState::Waiting | TrackerState::Tracking) {
            info!("Stopping location tracking");
            inner.state = TrackerState::Stopped;
        }
    }

    #[must_use]
    pub fn state(&self) -> TrackerState {
        lock(&self.shared.inner).state.clone()
    }

    #[must_use]
    pub fn position(&self) -> Option<UserPosition> {
        lock(&self.shared.inner).position
    }
}

impl<M> Drop for LocationTracker<M> {
    fn drop(&mut self) {
        self.shared.cancel_token.cancel();
    }
}
