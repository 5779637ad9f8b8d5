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

//! GeoJSON snapshot map surface.
//!
//! The surface keeps the station and user sub-layers, plus the current view,
//! and publishes a GeoJSON FeatureCollection on every mutation. It does no
//! I/O itself: a [`SnapshotWriter`] task picks up the latest snapshot and
//! replaces the file atomically (write to a temporary file, then rename).
//! Snapshots published faster than the disk keeps up are coalesced.
//!
//! Removals are only published together with the next addition, so a station
//! layer swap never reaches disk half done.

use std::path::{Path, PathBuf};

use bikeshare_client::{LatLng, LayerId, MapMarker, MapSurface, MarkerIcon};
use chrono::Utc;
use log::{debug, warn};
use serde_json::{json, Value};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Map surface that mirrors its layers into a GeoJSON snapshot.
#[derive(Debug)]
pub struct GeoJsonSurface {
    center: LatLng,
    zoom: u8,
    stations: Vec<MapMarker>,
    user: Vec<MapMarker>,
    snapshots: watch::Sender<Value>,
}

impl GeoJsonSurface {
    /// Create a surface and the writer that persists its snapshots to `path`.
    pub fn new(path: PathBuf, center: LatLng, zoom: u8) -> (Self, SnapshotWriter) {
        let (snapshots, rx) = watch::channel(Value::Null);
        let surface = Self {
            center,
            zoom,
            stations: Vec::new(),
            user: Vec::new(),
            snapshots,
        };
        (surface, SnapshotWriter { path, rx })
    }

    /// Build the FeatureCollection for the current layers.
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .stations
            .iter()
            .map(|m| feature(LayerId::Stations, m))
            .chain(self.user.iter().map(|m| feature(LayerId::UserLocation, m)))
            .collect();

        json!({
            "type": "FeatureCollection",
            "view": {
                "center": [self.center.lon, self.center.lat],
                "zoom": self.zoom,
            },
            "updated": Utc::now().to_rfc3339(),
            "features": features,
        })
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.to_geojson());
    }
}

fn feature(layer: LayerId, marker: &MapMarker) -> Value {
    let (html, anchor) = match &marker.icon {
        MarkerIcon::Station(icon) | MarkerIcon::Cluster { icon, .. } => {
            (Some(icon.to_html()), icon.anchor)
        }
        MarkerIcon::Image(image) => (None, image.anchor),
    };

    json!({
        "type": "Feature",
        "geometry": {
            "type": "Point",
            "coordinates": [marker.position.lon, marker.position.lat],
        },
        "properties": {
            "layer": layer,
            "icon": marker.icon,
            "icon_html": html,
            "icon_anchor": [anchor.0, anchor.1],
            "rotation": marker.rotation_degrees,
            "popup": marker.popup,
            "popup_html": marker.popup.as_ref().map(bikeshare_client::Popup::to_html),
            "popup_offset": marker.popup.as_ref().map(|p| [p.offset.0, p.offset.1]),
        },
    })
}

impl MapSurface for GeoJsonSurface {
    fn add_layer(&mut self, layer: LayerId, markers: &[MapMarker]) {
        match layer {
            LayerId::Stations => self.stations = markers.to_vec(),
            LayerId::UserLocation => self.user = markers.to_vec(),
        }
        self.publish();
    }

    fn remove_layer(&mut self, layer: LayerId) {
        match layer {
            LayerId::Stations => self.stations.clear(),
            LayerId::UserLocation => self.user.clear(),
        }
    }

    fn fly_to(&mut self, position: LatLng, zoom: u8) {
        self.center = position;
        self.zoom = zoom;
        self.publish();
    }
}

/// Persists the latest surface snapshot to disk.
#[derive(Debug)]
pub struct SnapshotWriter {
    path: PathBuf,
    rx: watch::Receiver<Value>,
}

impl SnapshotWriter {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the writer on the current runtime.
    pub fn spawn(self) -> WriterHandle {
        let (shutdown, shutdown_rx) = oneshot::channel();
        WriterHandle {
            shutdown,
            task: tokio::spawn(self.run(shutdown_rx)),
        }
    }

    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        loop {
            let stopping = tokio::select! {
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    false
                }
                _ = &mut shutdown => true,
            };

            if stopping {
                if self.rx.has_changed().unwrap_or(false) {
                    self.write_latest().await;
                }
                return;
            }
            self.write_latest().await;
        }
    }

    async fn write_latest(&mut self) {
        let doc = self.rx.borrow_and_update().clone();
        if let Err(e) = write_snapshot(&self.path, &doc).await {
            warn!("Failed to write map snapshot to {}: {}", self.path.display(), e);
        }
    }
}

/// Handle on a running [`SnapshotWriter`].
#[derive(Debug)]
pub struct WriterHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl WriterHandle {
    /// Write any pending snapshot, then stop the writer.
    pub async fn finish(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            warn!("Snapshot writer stopped abnormally: {}", e);
        }
    }
}

async fn write_snapshot(
    path: &Path,
    doc: &Value,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let bytes = serde_json::to_vec_pretty(doc)?;
    let tmp = path.with_extension("geojson.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;

    debug!(
        "Wrote map snapshot ({} features) to {}",
        doc["features"].as_array().map_or(0, Vec::len),
        path.display()
    );
    Ok(())
}
