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

//! Station feed protocol layer.
//!
//! Turns a raw availability response into validated [`StationRecord`] values.
//! Validation happens here, at the parse boundary, so the rest of the pipeline
//! only ever sees well-typed counts and coordinates. A payload that is not a
//! station array fails as a whole; a single bad station fails on its own.

mod ecobici;

pub use ecobici::parse_payload;

use serde_json::Value;
use thiserror::Error;

/// Errors for a response body that cannot be read as a station list.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("expected a JSON array of stations, got {0}")]
    NotAnArray(&'static str),
}

/// Errors for a single station entry inside an otherwise valid payload.
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("station entry is not an object")]
    NotAnObject,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for field '{field}': {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// One station as reported by the feed, after validation.
///
/// Records carry no identity between refreshes; a new set is built on every
/// fetch and the previous one is discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRecord {
    /// Display name of the station.
    pub name: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Bikes currently docked.
    pub bikes: u32,
    /// Free docking slots.
    pub slots: u32,
}

impl StationRecord {
    /// Validate one entry of the station array.
    ///
    /// Coordinates and counts may arrive as JSON numbers or as numeric strings.
    /// A missing or null name becomes an empty string.
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        let obj = value.as_object().ok_or(RecordError::NotAnObject)?;

        let name = match obj.get("name") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        let lat = coordinate(obj.get("lat"), "lat", 90.0)?;
        let lon = coordinate(obj.get("lon"), "lon", 180.0)?;
        let bikes = count(obj.get("bikes"), "bikes")?;
        let slots = count(obj.get("slots"), "slots")?;

        Ok(Self {
            name,
            lat,
            lon,
            bikes,
            slots,
        })
    }
}

fn coordinate(value: Option<&Value>, field: &'static str, limit: f64) -> Result<f64, RecordError> {
    let value = present(value, field)?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() && v.abs() <= limit => Ok(v),
        _ => Err(invalid(field, value)),
    }
}

fn count(value: Option<&Value>, field: &'static str) -> Result<u32, RecordError> {
    let value = present(value, field)?;
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()).or_else(|| {
            // Whole floats like 4.0 show up in some feeds
            n.as_f64()
                .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0 && *v <= f64::from(u32::MAX))
                .map(whole_to_u32)
        }),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| invalid(field, value))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "caller checks the value is a whole number within u32 range"
)]
fn whole_to_u32(v: f64) -> u32 {
    v as u32
}

fn present<'a>(value: Option<&'a Value>, field: &'static str) -> Result<&'a Value, RecordError> {
    match value {
        None | Some(Value::Null) => Err(RecordError::MissingField(field)),
        Some(v) => Ok(v),
    }
}

fn invalid(field: &'static str, value: &Value) -> RecordError {
    RecordError::InvalidValue {
        field,
        value: value.to_string(),
    }
}
