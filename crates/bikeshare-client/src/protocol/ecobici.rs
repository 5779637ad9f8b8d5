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

//! Ecobici availability map payload.
//!
//! The availability endpoint answers with a JSON array of station objects:
//!
//! ```text
//! [{"name":"...","lat":"19.42","lon":"-99.17","bikes":"4","slots":"11",...}, ...]
//! ```
//!
//! Some clients receive the body as a JSON string that itself contains the
//! array, so one level of string encoding is unwrapped before giving up.

use serde_json::Value;

use super::PayloadError;

/// Parse a response body into the list of raw station entries.
///
/// Entries are returned unvalidated; see
/// [`StationRecord::from_value`](super::StationRecord::from_value).
pub fn parse_payload(body: &[u8]) -> Result<Vec<Value>, PayloadError> {
    let value: Value = serde_json::from_slice(body)?;

    let value = match value {
        Value::String(inner) => serde_json::from_str(&inner)?,
        other => other,
    };

    match value {
        Value::Array(stations) => Ok(stations),
        other => Err(PayloadError::NotAnArray(kind(&other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_array() {
        let body = br#"[{"name":"A","lat":"19.4","lon":"-99.1","bikes":"2","slots":"1"},{"name":"B"}]"#;
        let stations = parse_payload(body).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0]["name"], "A");
    }

    #[test]
    fn test_parse_string_encoded_array() {
        let body = br#""[{\"name\":\"A\",\"bikes\":2}]""#;
        let stations = parse_payload(body).unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0]["bikes"], 2);
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_payload(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_object_is_rejected() {
        let err = parse_payload(br#"{"error":"maintenance"}"#).unwrap_err();
        assert!(matches!(err, PayloadError::NotAnArray("an object")));
    }

    #[test]
    fn test_parse_garbage_is_rejected() {
        let err = parse_payload(b"<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, PayloadError::InvalidJson(_)));
    }
}
