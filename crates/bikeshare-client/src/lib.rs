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

//! Bike-share station map pipeline.
//!
//! This library turns a bike-share availability feed into map markers and
//! keeps them current. It is split into layers that can be used on their own
//! or wired together:
//!
//! - **Protocol layer**: payload parsing and per-station validation
//! - **Marker layer**: occupancy, icon resolution and station markers
//! - **Cluster layer**: zoom-dependent aggregation of nearby stations
//! - **Refresh layer**: periodic polling with atomic station layer swaps
//! - **Location layer**: a live "you are here" marker fed by a position stream
//!
//! The map itself is injected through the [`MapSurface`] trait.
//!
//! # Quick Start
//!
//! ```no_run
//! use bikeshare_client::{
//!     ClusterAggregator, HttpSourceConfig, HttpStationSource, LatLng, LayerId, MapMarker,
//!     MapSurface, MapView, RefreshScheduler,
//! };
//! use std::time::Duration;
//!
//! struct Console;
//!
//! impl MapSurface for Console {
//!     fn add_layer(&mut self, layer: LayerId, markers: &[MapMarker]) {
//!         println!("{layer:?}: {} markers", markers.len());
//!     }
//!     fn remove_layer(&mut self, _layer: LayerId) {}
//!     fn fly_to(&mut self, _position: LatLng, _zoom: u8) {}
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let view = MapView::new(
//!         Console,
//!         LatLng::new(19.398_309, -99.173_708),
//!         13,
//!         ClusterAggregator::default(),
//!     )
//!     .into_shared();
//!
//!     let source = HttpStationSource::new(HttpSourceConfig::default()).unwrap();
//!     let mut scheduler = RefreshScheduler::new(source, view);
//!     scheduler.start(Duration::from_secs(60));
//!
//!     tokio::time::sleep(Duration::from_secs(600)).await;
//!     scheduler.stop();
//! }
//! ```
//!
//! # Using Individual Layers
//!
//! ```
//! use bikeshare_client::{build_markers, parse_payload, ClusterAggregator};
//!
//! let body = br#"[
//!     {"name":"A","lat":"19.4300","lon":"-99.1600","bikes":"2","slots":"1"},
//!     {"name":"B","lat":"19.4302","lon":"-99.1603","bikes":"3","slots":"2"}
//! ]"#;
//!
//! let batch = build_markers(&parse_payload(body).unwrap());
//! let rendered = ClusterAggregator::default().render(&batch.markers, 13);
//! assert_eq!(rendered.len(), 1);
//! ```

pub mod cluster;
pub mod icon;
pub mod location;
pub mod map;
pub mod marker;
pub mod occupancy;
pub mod protocol;
pub mod refresh;
pub mod source;

pub use cluster::{ClusterAggregator, ClusterConfig, ClusterGroup, ClusterNode};
pub use icon::{render_icon, resolve_band, FillBand, IconDescriptor};
pub use location::{
    LocationTracker, PositionEvent, PositionFix, PositionSource, StreamError, TrackerConfig,
    TrackerState, UserPosition,
};
pub use map::{ImageIcon, LatLng, LayerId, MapMarker, MapSurface, MapView, MarkerIcon, SharedMapView};
pub use marker::{build_marker, build_markers, MarkerBatch, Popup, StationMarker, StationPayload};
pub use occupancy::fill_percentage;
pub use protocol::{parse_payload, PayloadError, RecordError, StationRecord};
pub use refresh::{
    RefreshError, RefreshPhase, RefreshScheduler, RefreshStatus, DEFAULT_REFRESH_PERIOD,
};
pub use source::{
    FetchError, FileStationSource, HttpSourceConfig, HttpStationSource, RequestMethod,
    StationSource, TransportError, DEFAULT_STATIONS_URL,
};
