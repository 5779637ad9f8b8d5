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

//! Station data sources.
//!
//! A [`StationSource`] answers one request with the raw station entries of the
//! feed. Two interchangeable transports are provided: [`HttpStationSource`]
//! for the live endpoint and [`FileStationSource`] for a saved response.
//! Picking one is left to the application.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use log::debug;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::protocol::{parse_payload, PayloadError};

/// Default availability endpoint.
pub const DEFAULT_STATIONS_URL: &str = "https://www.ecobici.cdmx.gob.mx/availability_map/getJsonObject";

/// Failures reaching the data source.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Status(StatusCode),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from a single fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("malformed payload: {0}")]
    Payload(#[from] PayloadError),
}

/// Something that can be asked for the current station list.
pub trait StationSource: Send + Sync + 'static {
    /// Fetch the raw station entries.
    ///
    /// The payload is checked to be a station array; individual entries are
    /// validated later so that one bad station does not fail the fetch.
    fn fetch_stations(&self) -> impl Future<Output = Result<Vec<Value>, FetchError>> + Send;
}

/// HTTP verb used to query the endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMethod {
    Get,
    /// The availability map endpoint expects an empty POST.
    #[default]
    Post,
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    pub url: String,
    pub method: RequestMethod,
    pub timeout: Duration,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STATIONS_URL.to_string(),
            method: RequestMethod::Post,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Station source backed by the live HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpStationSource {
    client: reqwest::Client,
    config: HttpSourceConfig,
}

impl HttpStationSource {
    pub fn new(config: HttpSourceConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }

    async fn request(&self) -> Result<Vec<Value>, FetchError> {
        let request = match self.config.method {
            RequestMethod::Get => self.client.get(&self.config.url),
            RequestMethod::Post => self.client.post(&self.config.url).body(Vec::new()),
        };

        let response = request.send().await.map_err(TransportError::from)?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status()).into());
        }

        let body = response.bytes().await.map_err(TransportError::from)?;
        debug!("Fetched {} bytes from {}", body.len(), self.config.url);

        Ok(parse_payload(&body)?)
    }
}

impl StationSource for HttpStationSource {
    fn fetch_stations(&self) -> impl Future<Output = Result<Vec<Value>, FetchError>> + Send {
        self.request()
    }
}

/// Station source that reads a saved response from disk on every fetch.
#[derive(Debug, Clone)]
pub struct FileStationSource {
    path: PathBuf,
}

impl FileStationSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<Vec<Value>, FetchError> {
        let body = tokio::fs::read(&self.path)
            .await
            .map_err(TransportError::from)?;
        Ok(parse_payload(&body)?)
    }
}

impl StationSource for FileStationSource {
    fn fetch_stations(&self) -> impl Future<Output = Result<Vec<Value>, FetchError>> + Send {
        self.read()
    }
}
