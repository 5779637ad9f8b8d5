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

//! Station and cluster iconography.
//!
//! Occupancy is classified into a [`FillBand`], and the band plus a bike count
//! become an [`IconDescriptor`]. Markup is produced in a separate step by
//! [`IconDescriptor::to_html`], so the map surface can render descriptors
//! however it likes.

use serde::Serialize;

/// Fill percentages at or below this value (and above zero) are "low".
pub const LOW_FILL_THRESHOLD: f64 = 20.0;

/// Pixel offset of the icon's tip relative to its top-left corner.
pub const STATION_ICON_ANCHOR: (i32, i32) = (25, 50);

/// Directory holding the station icon images.
const ICON_ASSET_DIR: &str = "assets/icon";

/// Occupancy classification used to pick icon images and border colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FillBand {
    /// No bikes available.
    Empty,
    /// Up to 20% of capacity available.
    Low,
    /// More than 20% of capacity available.
    Normal,
}

impl FillBand {
    /// Image asset name (without extension) for this band.
    #[must_use]
    pub fn image_key(self) -> &'static str {
        match self {
            FillBand::Empty => "ecobici-red",
            FillBand::Low => "ecobici-orange",
            FillBand::Normal => "ecobici-green",
        }
    }

    /// CSS border color for the count badge.
    #[must_use]
    pub fn border_color(self) -> &'static str {
        match self {
            FillBand::Empty => "#ee0000",
            FillBand::Low => "#ee9900",
            FillBand::Normal => "#6dc727",
        }
    }
}

/// Classify a fill percentage.
///
/// `0` is empty, `(0, 20]` is low, anything above is normal. A NaN input is
/// treated as empty.
#[must_use]
pub fn resolve_band(fill_percentage: f64) -> FillBand {
    if fill_percentage.is_nan() || fill_percentage <= 0.0 {
        FillBand::Empty
    } else if fill_percentage <= LOW_FILL_THRESHOLD {
        FillBand::Low
    } else {
        FillBand::Normal
    }
}

/// Everything needed to draw a station or cluster glyph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IconDescriptor {
    /// Image asset name, see [`FillBand::image_key`].
    pub image_key: &'static str,
    /// Badge border color, see [`FillBand::border_color`].
    pub border_color: &'static str,
    /// Bike count shown in the badge, regardless of band.
    pub count: u32,
    /// Band the icon was resolved from.
    pub band: FillBand,
    /// Pixel offset of the icon's tip, see [`STATION_ICON_ANCHOR`].
    pub anchor: (i32, i32),
}

impl IconDescriptor {
    /// Render the marker container markup.
    #[must_use]
    pub fn to_html(&self) -> String {
        format!(
            "<div class=\"cluster-marker-container\"><img src=\"{}\"/><p style=\"border-color: {} !important;\">{}</p></div>",
            self.image_path(),
            self.border_color,
            self.count
        )
    }

    /// Relative path of the icon image.
    #[must_use]
    pub fn image_path(&self) -> String {
        format!("{ICON_ASSET_DIR}/{}.png", self.image_key)
    }
}

/// Build the icon for an aggregate bike count in the given band.
#[must_use]
pub fn render_icon(aggregate_bikes: u32, band: FillBand) -> IconDescriptor {
    IconDescriptor {
        image_key: band.image_key(),
        border_color: band.border_color(),
        count: aggregate_bikes,
        band,
        anchor: STATION_ICON_ANCHOR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occupancy::fill_percentage;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(resolve_band(0.0), FillBand::Empty);
        assert_eq!(resolve_band(0.0001), FillBand::Low);
        assert_eq!(resolve_band(20.0), FillBand::Low);
        assert_eq!(resolve_band(20.0001), FillBand::Normal);
        assert_eq!(resolve_band(100.0), FillBand::Normal);
    }

    #[test]
    fn test_band_nan_is_empty() {
        assert_eq!(resolve_band(f64::NAN), FillBand::Empty);
    }

    #[test]
    fn test_empty_station_band() {
        assert_eq!(resolve_band(fill_percentage(0, 15)), FillBand::Empty);
        assert_eq!(resolve_band(fill_percentage(0, 0)), FillBand::Empty);
    }

    #[test]
    fn test_render_icon_mapping() {
        let empty = render_icon(0, FillBand::Empty);
        assert_eq!(empty.image_key, "ecobici-red");
        assert_eq!(empty.border_color, "#ee0000");

        let low = render_icon(2, FillBand::Low);
        assert_eq!(low.image_key, "ecobici-orange");
        assert_eq!(low.border_color, "#ee9900");
        assert_eq!(low.count, 2);

        let normal = render_icon(14, FillBand::Normal);
        assert_eq!(normal.image_key, "ecobici-green");
        assert_eq!(normal.border_color, "#6dc727");
        assert_eq!(normal.count, 14);
        assert_eq!(normal.anchor, (25, 50));
    }

    #[test]
    fn test_render_icon_is_idempotent() {
        let a = render_icon(9, resolve_band(fill_percentage(9, 3)));
        let b = render_icon(9, resolve_band(fill_percentage(9, 3)));
        assert_eq!(a, b);
        assert_eq!(a.to_html(), b.to_html());
    }

    #[test]
    fn test_icon_html() {
        let icon = render_icon(3, FillBand::Low);
        assert_eq!(
            icon.to_html(),
            "<div class=\"cluster-marker-container\"><img src=\"assets/icon/ecobici-orange.png\"/><p style=\"border-color: #ee9900 !important;\">3</p></div>"
        );
    }
}
