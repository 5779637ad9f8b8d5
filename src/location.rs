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

//! User position sources.
//!
//! Desktop machines rarely have a GPS, so the position stream is either a
//! fixed position from the configuration or a periodic IP geolocation lookup.
//! Neither reports a heading.

use std::time::Duration;

use bikeshare_client::{LatLng, PositionEvent, PositionFix, PositionSource, StreamError};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc;

// Give up after this many lookups in a row fail
const MAX_CONSECUTIVE_LOOKUP_FAILURES: u32 = 5;

/// Emits a single configured position and keeps the stream open.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocationSource {
    position: LatLng,
}

impl FixedLocationSource {
    pub fn new(position: LatLng) -> Self {
        Self { position }
    }
}

impl PositionSource for FixedLocationSource {
    fn subscribe(self) -> mpsc::Receiver<PositionEvent> {
        let (tx, rx) = mpsc::channel(1);
        let fix = PositionFix {
            latitude: self.position.lat,
            longitude: self.position.lon,
            heading: None,
        };

        tokio::spawn(async move {
            if tx.send(Ok(fix)).await.is_ok() {
                info!("Using configured location {:.5}, {:.5}", fix.latitude, fix.longitude);
                tx.closed().await;
            }
        });

        rx
    }
}

/// Polls IP geolocation services for an approximate position.
#[derive(Debug, Clone)]
pub struct IpLocationSource {
    client: reqwest::Client,
    period: Duration,
}

impl IpLocationSource {
    pub fn new(period: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            period,
        }
    }

    /// Try ipapi.co first, then ip-api.com (no API key needed).
    async fn lookup(&self) -> Option<(f64, f64)> {
        if let Some(value) = self.fetch_json("https://ipapi.co/json/").await {
            if let Some(location) = parse_ipapi(&value) {
                debug!("Location found via ipapi.co: {}, {}", location.0, location.1);
                return Some(location);
            }
        }

        if let Some(value) = self.fetch_json("http://ip-api.com/json/").await {
            if let Some(location) = parse_ip_api(&value) {
                debug!("Location found via ip-api.com: {}, {}", location.0, location.1);
                return Some(location);
            }
        }

        None
    }

    async fn fetch_json(&self, url: &str) -> Option<Value> {
        match self.client.get(url).send().await {
            Ok(response) => response.json::<Value>().await.ok(),
            Err(e) => {
                debug!("Geolocation lookup against {} failed: {}", url, e);
                None
            }
        }
    }

    async fn run(self, tx: mpsc::Sender<PositionEvent>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut failures = 0;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                () = tx.closed() => return,
            }

            match self.lookup().await {
                Some((latitude, longitude)) => {
                    failures = 0;
                    let fix = PositionFix {
                        latitude,
                        longitude,
                        heading: None,
                    };
                    if tx.send(Ok(fix)).await.is_err() {
                        return;
                    }
                }
                None => {
                    failures += 1;
                    warn!(
                        "Failed to fetch location from all sources ({} of {})",
                        failures, MAX_CONSECUTIVE_LOOKUP_FAILURES
                    );
                    if failures >= MAX_CONSECUTIVE_LOOKUP_FAILURES {
                        let error = StreamError::Source(format!(
                            "IP geolocation failed {failures} times in a row"
                        ));
                        let _ = tx.send(Err(error)).await;
                        return;
                    }
                }
            }
        }
    }
}

impl PositionSource for IpLocationSource {
    fn subscribe(self) -> mpsc::Receiver<PositionEvent> {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(self.run(tx));
        rx
    }
}

fn parse_ipapi(value: &Value) -> Option<(f64, f64)> {
    Some((
        value.get("latitude")?.as_f64()?,
        value.get("longitude")?.as_f64()?,
    ))
}

fn parse_ip_api(value: &Value) -> Option<(f64, f64)> {
    Some((value.get("lat")?.as_f64()?, value.get("lon")?.as_f64()?))
}
