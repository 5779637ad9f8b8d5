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

mod config;
mod location;
mod surface;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use bikeshare_client::{
    ClusterAggregator, FileStationSource, HttpStationSource, LocationTracker, MapView,
    PositionSource, RefreshScheduler, SharedMapView, StationSource,
};
use clap::Parser;
use log::{info, warn};

use config::AppConfig;
use location::{FixedLocationSource, IpLocationSource};
use surface::GeoJsonSurface;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Ecobici station availability map
#[derive(Parser, Debug)]
#[command(name = "ecobici-map", version, about)]
struct Cli {
    /// Station availability endpoint
    #[arg(long)]
    url: Option<String>,

    /// Read stations from a saved JSON response instead of the endpoint
    #[arg(long, value_name = "FILE")]
    stations_file: Option<PathBuf>,

    /// Seconds between refreshes
    #[arg(long, value_name = "SECS")]
    period: Option<u64>,

    /// Where to write the GeoJSON map snapshot
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Refresh once, write the snapshot and exit
    #[arg(long)]
    once: bool,

    /// Print the configuration file path and exit
    #[arg(long)]
    print_config_path: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.url {
            config.stations_url.clone_from(url);
            config.stations_file = None;
        }
        if let Some(path) = &self.stations_file {
            config.stations_file = Some(path.clone());
        }
        if let Some(period) = self.period {
            config.refresh_period_secs = period;
        }
        if let Some(output) = &self.output {
            config.output_path = Some(output.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if cli.print_config_path {
        println!("{}", AppConfig::get_config_path()?.display());
        return Ok(());
    }

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load configuration, using defaults: {}", e);
        AppConfig::default()
    });
    cli.apply(&mut config);

    let (surface, writer) = GeoJsonSurface::new(
        config.output_path(),
        config.initial_center(),
        config.initial_zoom,
    );
    info!("Writing map snapshots to {}", writer.path().display());
    let writer = writer.spawn();

    let view = MapView::new(
        surface,
        config.initial_center(),
        config.initial_zoom,
        ClusterAggregator::new(config.cluster_config()),
    )
    .into_shared();

    let result = match config.stations_file.clone() {
        Some(path) => {
            info!("Reading stations from {}", path.display());
            run(FileStationSource::new(path), view, &config, cli.once).await
        }
        None => match HttpStationSource::new(config.http_source_config()) {
            Ok(source) => {
                info!("Fetching stations from {}", source.url());
                run(source, view, &config, cli.once).await
            }
            Err(e) => Err(e.into()),
        },
    };

    writer.finish().await;
    result
}

async fn run<S: StationSource>(
    source: S,
    view: SharedMapView<GeoJsonSurface>,
    config: &AppConfig,
    once: bool,
) -> Result<(), Box<dyn Error>> {
    let mut scheduler = RefreshScheduler::new(source, Arc::clone(&view));

    if once {
        let count = scheduler.refresh_once().await?;
        info!("Wrote {} station markers", count);
        return Ok(());
    }

    scheduler.start(config.refresh_period());

    let tracker = match config.override_position() {
        Some(position) => track(FixedLocationSource::new(position), &view, config),
        None => track(IpLocationSource::new(config.location_poll_period()), &view, config),
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    tracker.stop();
    scheduler.stop();

    Ok(())
}

fn track<P: PositionSource>(
    source: P,
    view: &SharedMapView<GeoJsonSurface>,
    config: &AppConfig,
) -> LocationTracker<GeoJsonSurface> {
    LocationTracker::spawn(source, Arc::clone(view), config.tracker_config())
}
