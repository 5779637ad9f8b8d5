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

//! Map surface contract and marker primitives.
//!
//! The map itself (tiles, animation, hit testing) lives outside this crate.
//! Everything here talks to it through [`MapSurface`], which only needs to
//! know how to add and remove whole sub-layers of markers and how to fly the
//! view somewhere. Station markers and the user marker live on disjoint
//! sub-layers so that a station refresh never touches the user marker.

mod view;

pub use view::{MapView, SharedMapView};

use serde::Serialize;

use crate::icon::IconDescriptor;
use crate::marker::Popup;

const TILE_SIZE: f64 = 256.0;

// Web Mercator is undefined at the poles
const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_78;

/// Geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lon: f64,
}

impl LatLng {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Sub-layers of the map owned by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerId {
    /// Station markers and clusters, replaced wholesale on every refresh.
    Stations,
    /// The single "you are here" marker.
    UserLocation,
}

/// A plain image icon, used for the user marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageIcon {
    /// Relative URL of the image asset.
    pub url: String,
    /// Rendered size in pixels (width, height).
    pub size: (u32, u32),
    /// Anchor point in pixels relative to the top-left corner.
    pub anchor: (i32, i32),
}

impl Default for ImageIcon {
    fn default() -> Self {
        Self {
            url: "assets/icon/location.png".to_string(),
            size: (18, 26),
            anchor: (0, 0),
        }
    }
}

/// What a marker looks like.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkerIcon {
    /// A single station glyph.
    Station(IconDescriptor),
    /// An aggregate glyph standing in for several stations.
    Cluster {
        icon: IconDescriptor,
        members: usize,
    },
    /// A static image.
    Image(ImageIcon),
}

/// A positioned marker as handed to the map surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub position: LatLng,
    pub icon: MarkerIcon,
    /// Clockwise rotation in degrees.
    pub rotation_degrees: f64,
    pub popup: Option<Popup>,
}

/// The map the pipeline draws on.
///
/// Implementations are injected; this crate never constructs a map.
pub trait MapSurface: Send {
    /// Add a sub-layer with the given markers. Replaces the layer if present.
    fn add_layer(&mut self, layer: LayerId, markers: &[MapMarker]);

    /// Remove a sub-layer. Removing an absent layer is a no-op.
    fn remove_layer(&mut self, layer: LayerId);

    /// Animate the view to a position and zoom level.
    fn fly_to(&mut self, position: LatLng, zoom: u8);
}

/// Web Mercator projection utilities.
#[derive(Debug)]
pub struct WebMercator;

impl WebMercator {
    /// Convert latitude to Web Mercator Y in tile units at the given zoom.
    #[must_use]
    pub fn lat_to_y(lat: f64, zoom: u8) -> f64 {
        let lat_rad = lat
            .clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE)
            .to_radians();
        let n = 2_f64.powi(i32::from(zoom));
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0;
        y * n
    }

    /// Convert longitude to Web Mercator X in tile units at the given zoom.
    #[must_use]
    pub fn lon_to_x(lon: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        ((lon + 180.0) / 360.0) * n
    }

    /// Project a position to world pixel coordinates at the given zoom.
    #[must_use]
    pub fn to_pixels(position: LatLng, zoom: u8) -> (f64, f64) {
        (
            Self::lon_to_x(position.lon, zoom) * TILE_SIZE,
            Self::lat_to_y(position.lat, zoom) * TILE_SIZE,
        )
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mercator_origin() {
        let (x, y) = WebMercator::to_pixels(LatLng::new(0.0, 0.0), 0);
        assert!((x - 128.0).abs() < 1e-9);
        assert!((y - 128.0).abs() < 1e-9);
    }

    #[test]
    fn test_mercator_scales_with_zoom() {
        let p = LatLng::new(19.398_309, -99.173_708);
        let (x13, y13) = WebMercator::to_pixels(p, 13);
        let (x14, y14) = WebMercator::to_pixels(p, 14);
        assert!((x14 - 2.0 * x13).abs() < 1e-6);
        assert!((y14 - 2.0 * y13).abs() < 1e-6);
    }

    #[test]
    fn test_mercator_pole_is_finite() {
        let (_, y) = WebMercator::to_pixels(LatLng::new(90.0, 0.0), 5);
        assert!(y.is_finite());
    }
}
