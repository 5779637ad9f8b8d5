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

//! Zoom-dependent station clustering.
//!
//! Markers that fall within a pixel radius of each other at the current zoom
//! are drawn as a single aggregate glyph. The glyph is recomputed from the
//! members every render pass: the count is the summed bikes, and the band
//! comes from the summed bikes and slots. Above the configured zoom every
//! station is drawn on its own.
//!
//! Grouping is greedy in input order, so the same markers at the same zoom
//! always produce the same clusters. Cluster seeds are kept in an R-tree of
//! world pixel coordinates, so each marker only looks at seeds within reach.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::icon::{render_icon, resolve_band, IconDescriptor};
use crate::map::{LatLng, MapMarker, MarkerIcon, WebMercator};
use crate::marker::StationMarker;
use crate::occupancy::fill_percentage;

/// Configuration for the cluster aggregator.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Maximum distance in screen pixels from a cluster's seed marker.
    pub radius_px: f64,
    /// Zoom level at and above which clustering is switched off.
    pub disable_at_zoom: Option<u8>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            radius_px: 80.0,
            disable_at_zoom: Some(17),
        }
    }
}

/// A transient group of nearby station markers.
#[derive(Debug, Clone)]
pub struct ClusterGroup<'a> {
    members: Vec<&'a StationMarker>,
}

impl<'a> ClusterGroup<'a> {
    fn new(first: &'a StationMarker) -> Self {
        Self {
            members: vec![first],
        }
    }

    #[must_use]
    pub fn members(&self) -> &[&'a StationMarker] {
        &self.members
    }

    /// Summed bikes across current members.
    #[must_use]
    pub fn bikes(&self) -> u32 {
        self.members
            .iter()
            .fold(0_u32, |acc, m| acc.saturating_add(m.payload().bikes))
    }

    /// Summed free slots across current members.
    #[must_use]
    pub fn slots(&self) -> u32 {
        self.members
            .iter()
            .fold(0_u32, |acc, m| acc.saturating_add(m.payload().slots))
    }

    /// Mean position of the members.
    #[must_use]
    pub fn center(&self) -> LatLng {
        #[allow(clippy::cast_precision_loss, reason = "member counts are small")]
        let n = self.members.len() as f64;
        let (lat, lon) = self.members.iter().fold((0.0, 0.0), |(lat, lon), m| {
            let p = m.position();
            (lat + p.lat, lon + p.lon)
        });
        LatLng::new(lat / n, lon / n)
    }

    /// Aggregate glyph for the current members.
    #[must_use]
    pub fn icon(&self) -> IconDescriptor {
        let bikes = self.bikes();
        render_icon(bikes, resolve_band(fill_percentage(bikes, self.slots())))
    }
}

/// First member of a cluster, placed in world pixel space.
#[derive(Debug, Clone, Copy)]
struct SeedNode {
    group: usize,
    point: [f64; 2],
}

impl RTreeObject for SeedNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for SeedNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Output of one render pass.
#[derive(Debug, Clone)]
pub enum ClusterNode<'a> {
    /// A station drawn on its own.
    Single(&'a StationMarker),
    /// Two or more stations drawn as one glyph.
    Group(ClusterGroup<'a>),
}

impl ClusterNode<'_> {
    /// Surface representation of this node.
    #[must_use]
    pub fn to_map_marker(&self) -> MapMarker {
        match self {
            ClusterNode::Single(marker) => marker.to_map_marker(),
            ClusterNode::Group(group) => MapMarker {
                position: group.center(),
                icon: MarkerIcon::Cluster {
                    icon: group.icon(),
                    members: group.members().len(),
                },
                rotation_degrees: 0.0,
                popup: None,
            },
        }
    }
}

/// Groups station markers by screen-space proximity.
#[derive(Debug, Clone, Default)]
pub struct ClusterAggregator {
    config: ClusterConfig,
}

impl ClusterAggregator {
    #[must_use]
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Whether markers are clustered at this zoom level.
    #[must_use]
    pub fn clusters_at(&self, zoom: u8) -> bool {
        self.config.radius_px > 0.0 && self.config.disable_at_zoom.map_or(true, |z| zoom < z)
    }

    /// Group markers for the given zoom level.
    #[must_use]
    pub fn group<'a>(&self, markers: &'a [StationMarker], zoom: u8) -> Vec<ClusterNode<'a>> {
        if !self.clusters_at(zoom) {
            return markers.iter().map(ClusterNode::Single).collect();
        }

        let radius_sq = self.config.radius_px * self.config.radius_px;
        let mut groups: Vec<ClusterGroup<'a>> = Vec::new();
        let mut seeds: RTree<SeedNode> = RTree::new();

        for marker in markers {
            let (x, y) = WebMercator::to_pixels(marker.position(), zoom);
            let point = [x, y];

            // Nearest seed in range; ties go to the older cluster
            let nearest = seeds
                .locate_within_distance(point, radius_sq)
                .map(|seed| (seed.group, seed.distance_2(&point)))
                .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

            match nearest {
                Some((i, _)) => groups[i].members.push(marker),
                None => {
                    seeds.insert(SeedNode {
                        group: groups.len(),
                        point,
                    });
                    groups.push(ClusterGroup::new(marker));
                }
            }
        }

        groups
            .into_iter()
            .map(|g| {
                if g.members.len() == 1 {
                    ClusterNode::Single(g.members[0])
                } else {
                    ClusterNode::Group(g)
                }
            })
            .collect()
    }

    /// Render markers for the given zoom level.
    #[must_use]
    pub fn render(&self, markers: &[StationMarker], zoom: u8) -> Vec<MapMarker> {
        self.group(markers, zoom)
            .iter()
            .map(ClusterNode::to_map_marker)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::FillBand;
    use crate::protocol::StationRecord;

    fn station(lat: f64, lon: f64, bikes: u32, slots: u32) -> StationMarker {
        StationMarker::from_record(&StationRecord {
            name: format!("{lat},{lon}"),
            lat,
            lon,
            bikes,
            slots,
        })
    }

    fn nearby_trio() -> Vec<StationMarker> {
        vec![
            station(19.4300, -99.1600, 2, 1),
            station(19.4302, -99.1603, 3, 2),
            station(19.4305, -99.1601, 0, 5),
        ]
    }

    #[test]
    fn test_cluster_sums_members() {
        let markers = nearby_trio();
        let aggregator = ClusterAggregator::default();

        let nodes = aggregator.group(&markers, 13);
        assert_eq!(nodes.len(), 1);

        let ClusterNode::Group(group) = &nodes[0] else {
            panic!("expected a cluster");
        };
        assert_eq!(group.members().len(), 3);
        assert_eq!(group.bikes(), 5);
        assert_eq!(group.slots(), 8);

        let icon = group.icon();
        assert_eq!(icon.count, 5);
        assert_eq!(icon.band, resolve_band(fill_percentage(5, 8)));
        assert_eq!(icon.band, FillBand::Normal);
    }

    #[test]
    fn test_cluster_of_empty_stations_is_red() {
        let markers = vec![
            station(19.4300, -99.1600, 0, 4),
            station(19.4301, -99.1601, 0, 6),
        ];
        let nodes = ClusterAggregator::default().group(&markers, 12);
        let ClusterNode::Group(group) = &nodes[0] else {
            panic!("expected a cluster");
        };
        assert_eq!(group.icon().band, FillBand::Empty);
        assert_eq!(group.icon().count, 0);
    }

    #[test]
    fn test_clustering_disabled_at_threshold() {
        let markers = nearby_trio();
        let aggregator = ClusterAggregator::default();

        let nodes = aggregator.group(&markers, 17);
        assert_eq!(nodes.len(), 3);
        assert!(nodes.iter().all(|n| matches!(n, ClusterNode::Single(_))));

        let rendered = aggregator.render(&markers, 18);
        assert_eq!(rendered.len(), 3);
        assert!(rendered
            .iter()
            .all(|m| matches!(m.icon, MarkerIcon::Station(_))));
    }

    #[test]
    fn test_distant_stations_stay_separate() {
        let markers = vec![
            station(19.4300, -99.1600, 2, 1),
            // Roughly 10 km east
            station(19.4300, -99.0650, 3, 2),
        ];
        let nodes = ClusterAggregator::default().group(&markers, 14);
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|n| matches!(n, ClusterNode::Single(_))));
    }

    #[test]
    fn test_zoom_changes_membership() {
        let markers = vec![
            station(19.4300, -99.1600, 2, 1),
            station(19.4300, -99.1560, 3, 2),
        ];
        let aggregator = ClusterAggregator::default();

        // ~420 m apart: about 12 px at zoom 12 and 93 px at zoom 15
        assert_eq!(aggregator.group(&markers, 12).len(), 1);
        assert_eq!(aggregator.group(&markers, 15).len(), 2);
    }

    #[test]
    fn test_render_is_idempotent() {
        let markers = nearby_trio();
        let aggregator = ClusterAggregator::default();

        let first = aggregator.render(&markers, 13);
        let second = aggregator.render(&markers, 13);
        assert_eq!(first, second);
    }

    #[test]
    fn test_cluster_marker_position_is_mean() {
        let markers = vec![
            station(19.4300, -99.1600, 1, 1),
            station(19.4310, -99.1610, 1, 1),
        ];
        let rendered = ClusterAggregator::default().render(&markers, 13);
        assert_eq!(rendered.len(), 1);
        assert!((rendered[0].position.lat - 19.4305).abs() < 1e-9);
        assert!((rendered[0].position.lon - (-99.1605)).abs() < 1e-9);
        assert!(rendered[0].popup.is_none());
        assert!(matches!(
            rendered[0].icon,
            MarkerIcon::Cluster { members: 2, .. }
        ));
    }

    #[test]
    fn test_no_threshold_always_clusters() {
        let aggregator = ClusterAggregator::new(ClusterConfig {
            disable_at_zoom: None,
            ..Default::default()
        });
        assert!(aggregator.clusters_at(20));
        assert_eq!(aggregator.group(&nearby_trio(), 17).len(), 1);
    }

    #[test]
    fn test_tiny_radius_keeps_stations_apart() {
        let aggregator = ClusterAggregator::new(ClusterConfig {
            radius_px: 1e-300,
            ..Default::default()
        });
        let markers = nearby_trio();
        let nodes = aggregator.group(&markers, 5);
        assert_eq!(nodes.len(), 3);
        assert!(nodes.iter().all(|n| matches!(n, ClusterNode::Single(_))));
    }

    #[test]
    fn test_joins_nearest_seed() {
        // 93 px apart at zoom 15; the third is 58 px from the first, 35 px from the second
        let markers = vec![
            station(19.4300, -99.1600, 1, 1),
            station(19.4300, -99.1560, 1, 1),
            station(19.4300, -99.1575, 1, 1),
        ];

        let nodes = ClusterAggregator::default().group(&markers, 15);
        assert_eq!(nodes.len(), 2);
        assert!(matches!(nodes[0], ClusterNode::Single(_)));
        let ClusterNode::Group(group) = &nodes[1] else {
            panic!("expected a cluster");
        };
        assert_eq!(group.members().len(), 2);
        assert!((group.members()[1].position().lon - (-99.1575)).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input() {
        assert!(ClusterAggregator::default().render(&[], 13).is_empty());
    }
}
