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

//! Map view state shared by the refresh scheduler and the location tracker.
//!
//! A [`MapView`] wraps the injected surface together with the current station
//! markers, the zoom level and the user marker. It is shared behind a single
//! mutex, so a station layer swap, a zoom-triggered re-cluster and a user
//! marker update can never interleave.

use std::sync::{Arc, Mutex};

use log::debug;

use super::{LatLng, LayerId, MapMarker, MapSurface};
use crate::cluster::ClusterAggregator;
use crate::marker::StationMarker;

/// Map view shared between background tasks.
pub type SharedMapView<S> = Arc<Mutex<MapView<S>>>;

/// Station and user sub-layers over an injected map surface.
#[derive(Debug)]
pub struct MapView<S> {
    surface: S,
    center: LatLng,
    zoom: u8,
    aggregator: ClusterAggregator,
    stations: Vec<StationMarker>,
    rendered: Vec<MapMarker>,
    station_layer_added: bool,
    user_marker: Option<MapMarker>,
    swap_count: u64,
}

impl<S: MapSurface> MapView<S> {
    /// Create a view with no markers at the given initial position.
    pub fn new(surface: S, center: LatLng, zoom: u8, aggregator: ClusterAggregator) -> Self {
        Self {
            surface,
            center,
            zoom,
            aggregator,
            stations: Vec::new(),
            rendered: Vec::new(),
            station_layer_added: false,
            user_marker: None,
            swap_count: 0,
        }
    }

    /// Wrap the view for sharing between tasks.
    pub fn into_shared(self) -> SharedMapView<S> {
        Arc::new(Mutex::new(self))
    }

    /// Replace every station marker with a new generation.
    ///
    /// The old layer is removed and the new one added within this call, so
    /// callers holding the view lock never observe a mix of generations.
    pub fn replace_stations(&mut self, markers: Vec<StationMarker>) {
        if self.station_layer_added {
            self.surface.remove_layer(LayerId::Stations);
            self.station_layer_added = false;
        }

        self.stations = markers;
        self.rendered = self.aggregator.render(&self.stations, self.zoom);
        self.surface.add_layer(LayerId::Stations, &self.rendered);
        self.station_layer_added = true;
        self.swap_count += 1;

        debug!(
            "Station layer swapped: {} stations as {} markers at zoom {}",
            self.stations.len(),
            self.rendered.len(),
            self.zoom
        );
    }

    /// Change the zoom level, re-clustering stations if it changed.
    pub fn set_zoom(&mut self, zoom: u8) {
        if zoom == self.zoom {
            return;
        }
        self.zoom = zoom;
        self.recluster();
    }

    /// Re-run the cluster render pass over the current stations.
    pub fn recluster(&mut self) {
        if !self.station_layer_added {
            return;
        }
        self.rendered = self.aggregator.render(&self.stations, self.zoom);
        self.surface.remove_layer(LayerId::Stations);
        self.surface.add_layer(LayerId::Stations, &self.rendered);
    }

    /// Fly the view to a position, updating the zoom used for clustering.
    pub fn fly_to(&mut self, position: LatLng, zoom: u8) {
        self.surface.fly_to(position, zoom);
        self.center = position;
        self.set_zoom(zoom);
    }

    /// Replace the user marker.
    pub fn set_user_marker(&mut self, marker: MapMarker) {
        if self.user_marker.is_some() {
            self.surface.remove_layer(LayerId::UserLocation);
        }
        self.surface
            .add_layer(LayerId::UserLocation, std::slice::from_ref(&marker));
        self.user_marker = Some(marker);
    }

    #[must_use]
    pub fn stations(&self) -> &[StationMarker] {
        &self.stations
    }

    /// Markers currently drawn on the station layer.
    #[must_use]
    pub fn rendered(&self) -> &[MapMarker] {
        &self.rendered
    }

    #[must_use]
    pub fn user_marker(&self) -> Option<&MapMarker> {
        self.user_marker.as_ref()
    }

    #[must_use]
    pub fn center(&self) -> LatLng {
        self.center
    }

    #[must_use]
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Number of station layer swaps so far.
    #[must_use]
    pub fn swap_count(&self) -> u64 {
        self.swap_count
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }
}
