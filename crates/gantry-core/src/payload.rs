//! The inbound payload envelope forwarded by the gateway proxy.
//!
//! ```json
//! {
//!   "type": "GUILD_CREATE",
//!   "data": { "id": "1", "name": "guild" },
//!   "extra": { "lazy": false, "unavailable": true },
//!   "metadata": { "application": "welcomer", "identifier": "welcomer-0" },
//!   "trace": [{ "stage": "gateway", "at": 1700000000000 }]
//! }
//! ```
//!
//! The body and every side-channel value are kept as raw JSON and only
//! decoded on demand, so an event nobody listens to is never parsed.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Identity of the application a payload was produced for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadMetadata {
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub identifier: String,
}

/// One timestamped hop the payload went through before reaching us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub stage: String,
    pub at: i64,
}

/// A decoded-envelope, raw-body payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Box<RawValue>,
    #[serde(default)]
    pub extra: HashMap<String, Box<RawValue>>,
    #[serde(default)]
    pub metadata: PayloadMetadata,
    #[serde(default)]
    pub trace: Vec<TraceEntry>,
}

impl Payload {
    /// Creates a payload with the given event type and body.
    pub fn new<T: Serialize>(kind: impl Into<String>, data: &T) -> serde_json::Result<Self> {
        Ok(Self {
            kind: kind.into(),
            data: serde_json::value::to_raw_value(data)?,
            extra: HashMap::new(),
            metadata: PayloadMetadata::default(),
            trace: Vec::new(),
        })
    }

    /// Parses a payload envelope from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Adds a side-channel value.
    pub fn with_extra<T: Serialize>(mut self, key: impl Into<String>, value: &T) -> serde_json::Result<Self> {
        self.extra
            .insert(key.into(), serde_json::value::to_raw_value(value)?);
        Ok(self)
    }

    /// Sets the producing application's metadata.
    pub fn with_metadata(mut self, application: impl Into<String>, identifier: impl Into<String>) -> Self {
        self.metadata = PayloadMetadata {
            application: application.into(),
            identifier: identifier.into(),
        };
        self
    }

    /// Decodes the payload body.
    pub fn decode_data<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(self.data.get())
    }

    /// Decodes a side-channel value.
    ///
    /// Returns `Ok(None)` when the key is absent or carries an empty value;
    /// a present but malformed value is an error.
    pub fn decode_extra<T: DeserializeOwned>(&self, key: &str) -> serde_json::Result<Option<T>> {
        match self.extra.get(key) {
            Some(raw) if !is_empty_json(raw.get()) => serde_json::from_str(raw.get()).map(Some),
            _ => Ok(None),
        }
    }
}

fn is_empty_json(raw: &str) -> bool {
    let raw = raw.trim();
    raw.is_empty() || raw == "null"
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_envelope() {
        let bytes = br#"{
            "type": "MESSAGE_CREATE",
            "data": {"content": "hi"},
            "extra": {"before": null},
            "metadata": {"application": "app", "identifier": "app-1"},
            "trace": [{"stage": "gateway", "at": 1}, {"stage": "proxy", "at": 2}]
        }"#;
        let payload = Payload::from_slice(bytes).unwrap();
        assert_eq!(payload.kind, "MESSAGE_CREATE");
        assert_eq!(payload.metadata.identifier, "app-1");
        assert_eq!(payload.trace.len(), 2);
        assert_eq!(payload.trace[1].stage, "proxy");
    }

    #[test]
    fn test_decode_extra_absent_and_null() {
        let payload = Payload::new("X", &json!({}))
            .unwrap()
            .with_extra("before", &serde_json::Value::Null)
            .unwrap();
        assert_eq!(payload.decode_extra::<bool>("missing").unwrap(), None);
        assert_eq!(payload.decode_extra::<bool>("before").unwrap(), None);
    }

    #[test]
    fn test_decode_extra_malformed_is_error() {
        let payload = Payload::new("X", &json!({}))
            .unwrap()
            .with_extra("lazy", &"not a bool")
            .unwrap();
        assert!(payload.decode_extra::<bool>("lazy").is_err());
    }

    #[test]
    fn test_envelope_defaults() {
        let payload = Payload::from_slice(br#"{"type": "READY", "data": {}}"#).unwrap();
        assert!(payload.extra.is_empty());
        assert!(payload.trace.is_empty());
        assert_eq!(payload.metadata, PayloadMetadata::default());
    }
}
