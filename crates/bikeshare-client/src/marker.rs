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

//! Station marker construction.
//!
//! One [`StationMarker`] is built per valid station entry. Its icon is
//! computed once at construction and never changes; only clusters recompute
//! their glyphs.

use log::warn;
use serde::Serialize;
use serde_json::Value;

use crate::icon::{render_icon, resolve_band, IconDescriptor};
use crate::map::{LatLng, MapMarker, MarkerIcon};
use crate::occupancy::fill_percentage;
use crate::protocol::{RecordError, StationRecord};

/// Pixel offset of the popup relative to the marker anchor.
pub const POPUP_OFFSET: (i32, i32) = (0, -50);

/// Counts carried by a station marker and summed by clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StationPayload {
    pub bikes: u32,
    pub slots: u32,
}

/// Popup content shown when a station is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Popup {
    pub name: String,
    pub slots: u32,
    pub bikes: u32,
    /// Pixel offset from the marker anchor, see [`POPUP_OFFSET`].
    pub offset: (i32, i32),
}

impl Popup {
    /// Render the popup markup.
    #[must_use]
    pub fn to_html(&self) -> String {
        format!(
            "<div>\n  <p style=\"color: red\">{}</p>\n  <p>Aparcamientos: <strong>{}</strong></p>\n  <p>Bicis disponibles: <strong>{}</strong></p>\n</div>",
            escape_html(&self.name),
            self.slots,
            self.bikes
        )
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// A map marker for one station, with its counts attached.
#[derive(Debug, Clone, PartialEq)]
pub struct StationMarker {
    position: LatLng,
    payload: StationPayload,
    icon: IconDescriptor,
    popup: Popup,
}

impl StationMarker {
    /// Build the marker for a validated record.
    #[must_use]
    pub fn from_record(record: &StationRecord) -> Self {
        let fill = fill_percentage(record.bikes, record.slots);
        let icon = render_icon(record.bikes, resolve_band(fill));

        Self {
            position: LatLng::new(record.lat, record.lon),
            payload: StationPayload {
                bikes: record.bikes,
                slots: record.slots,
            },
            icon,
            popup: Popup {
                name: record.name.clone(),
                slots: record.slots,
                bikes: record.bikes,
                offset: POPUP_OFFSET,
            },
        }
    }

    #[must_use]
    pub fn position(&self) -> LatLng {
        self.position
    }

    #[must_use]
    pub fn payload(&self) -> StationPayload {
        self.payload
    }

    #[must_use]
    pub fn icon(&self) -> &IconDescriptor {
        &self.icon
    }

    #[must_use]
    pub fn popup(&self) -> &Popup {
        &self.popup
    }

    /// Surface representation of this marker on its own.
    #[must_use]
    pub fn to_map_marker(&self) -> MapMarker {
        MapMarker {
            position: self.position,
            icon: MarkerIcon::Station(self.icon.clone()),
            rotation_degrees: 0.0,
            popup: Some(self.popup.clone()),
        }
    }
}

/// Validate one raw station entry and build its marker.
pub fn build_marker(raw: &Value) -> Result<StationMarker, RecordError> {
    StationRecord::from_value(raw).map(|record| StationMarker::from_record(&record))
}

/// Markers built from one payload, plus the entries that had to be dropped.
#[derive(Debug, Default)]
pub struct MarkerBatch {
    pub markers: Vec<StationMarker>,
    /// Index into the payload and the reason each dropped entry was rejected.
    pub dropped: Vec<(usize, RecordError)>,
}

/// Build markers for a whole payload.
///
/// A bad entry is logged and skipped; its siblings are still built.
#[must_use]
pub fn build_markers(raw: &[Value]) -> MarkerBatch {
    let mut batch = MarkerBatch {
        markers: Vec::with_capacity(raw.len()),
        dropped: Vec::new(),
    };

    for (index, entry) in raw.iter().enumerate() {
        match build_marker(entry) {
            Ok(marker) => batch.markers.push(marker),
            Err(e) => {
                let name = entry.get("name").and_then(Value::as_str).unwrap_or("?");
                warn!("Skipping station #{} ({}): {}", index, name, e);
                batch.dropped.push((index, e));
            }
        }
    }

    batch
}
