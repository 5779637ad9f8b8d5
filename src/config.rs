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

//! Application configuration management.
//!
//! Configuration is stored in TOML format via `confy`. Every field has a
//! serde default so that older or hand-edited files keep loading as new
//! options are added.

use std::path::PathBuf;
use std::time::Duration;

use bikeshare_client::{
    ClusterConfig, HttpSourceConfig, ImageIcon, LatLng, RequestMethod, TrackerConfig,
    DEFAULT_STATIONS_URL,
};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "ecobici-map";
const CONFIG_NAME: &str = "config";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Station availability endpoint
    #[serde(default = "default_stations_url")]
    pub stations_url: String,

    /// HTTP method used against the endpoint
    #[serde(default)]
    pub request_method: RequestMethod,

    /// Read stations from a saved response instead of the endpoint
    #[serde(default)]
    pub stations_file: Option<PathBuf>,

    /// Seconds between station refreshes
    #[serde(default = "default_refresh_period_secs")]
    pub refresh_period_secs: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Zoom level at which stations stop being clustered
    #[serde(default = "default_disable_clustering_at_zoom")]
    pub disable_clustering_at_zoom: u8,

    /// Cluster radius in screen pixels
    #[serde(default = "default_cluster_radius_px")]
    pub cluster_radius_px: f64,

    /// Initial map center latitude
    #[serde(default = "default_initial_latitude")]
    pub initial_latitude: f64,

    /// Initial map center longitude
    #[serde(default = "default_initial_longitude")]
    pub initial_longitude: f64,

    /// Initial map zoom level
    #[serde(default = "default_initial_zoom")]
    pub initial_zoom: u8,

    /// Zoom level used when centering on the user's first fix
    #[serde(default = "default_fly_to_zoom")]
    pub fly_to_zoom: u8,

    /// User location marker image
    #[serde(default = "default_user_marker_icon")]
    pub user_marker_icon: String,

    /// Override GPS latitude (for devices without GPS)
    #[serde(default)]
    pub override_latitude: Option<f64>,

    /// Override GPS longitude (for devices without GPS)
    #[serde(default)]
    pub override_longitude: Option<f64>,

    /// Seconds between IP geolocation lookups
    #[serde(default = "default_location_poll_secs")]
    pub location_poll_secs: u64,

    /// Where the GeoJSON map snapshot is written
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1 // Current schema version
}

fn default_stations_url() -> String {
    DEFAULT_STATIONS_URL.to_string()
}

fn default_refresh_period_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_disable_clustering_at_zoom() -> u8 {
    17
}

fn default_cluster_radius_px() -> f64 {
    80.0
}

// Approximate center of all Ecobici stations
fn default_initial_latitude() -> f64 {
    19.398_309
}

fn default_initial_longitude() -> f64 {
    -99.173_708
}

fn default_initial_zoom() -> u8 {
    13
}

fn default_fly_to_zoom() -> u8 {
    18
}

fn default_user_marker_icon() -> String {
    ImageIcon::default().url
}

fn default_location_poll_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            stations_url: default_stations_url(),
            request_method: RequestMethod::default(),
            stations_file: None,
            refresh_period_secs: default_refresh_period_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            disable_clustering_at_zoom: default_disable_clustering_at_zoom(),
            cluster_radius_px: default_cluster_radius_px(),
            initial_latitude: default_initial_latitude(),
            initial_longitude: default_initial_longitude(),
            initial_zoom: default_initial_zoom(),
            fly_to_zoom: default_fly_to_zoom(),
            user_marker_icon: default_user_marker_icon(),
            override_latitude: None,
            override_longitude: None,
            location_poll_secs: default_location_poll_secs(),
            output_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, creating it with defaults if missing
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    pub fn initial_center(&self) -> LatLng {
        LatLng::new(self.initial_latitude, self.initial_longitude)
    }

    /// Fixed user position, if both coordinates are overridden
    pub fn override_position(&self) -> Option<LatLng> {
        match (self.override_latitude, self.override_longitude) {
            (Some(lat), Some(lon)) => Some(LatLng::new(lat, lon)),
            _ => None,
        }
    }

    pub fn refresh_period(&self) -> Duration {
        // A zero period would spin the scheduler
        Duration::from_secs(self.refresh_period_secs.max(1))
    }

    pub fn location_poll_period(&self) -> Duration {
        Duration::from_secs(self.location_poll_secs.max(1))
    }

    pub fn http_source_config(&self) -> HttpSourceConfig {
        HttpSourceConfig {
            url: self.stations_url.clone(),
            method: self.request_method,
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            radius_px: self.cluster_radius_px,
            disable_at_zoom: Some(self.disable_clustering_at_zoom),
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            fly_to_zoom: self.fly_to_zoom,
            icon: ImageIcon {
                url: self.user_marker_icon.clone(),
                ..ImageIcon::default()
            },
        }
    }

    /// GeoJSON snapshot path, defaulting to the user cache directory
    pub fn output_path(&self) -> PathBuf {
        self.output_path.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join(APP_NAME)
                .join("stations.geojson")
        })
    }
}
