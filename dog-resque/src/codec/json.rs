use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{QueueError, QueueResult};

/// Serialize wrapper that writes object keys in sorted order at every depth,
/// whatever map representation `serde_json` was compiled with.
pub struct Canonical<'a>(pub &'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    out.serialize_entry(key, &Canonical(value))?;
                }
                out.end()
            }
            Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(&Canonical(item))?;
                }
                out.end()
            }
            scalar => scalar.serialize(serializer),
        }
    }
}

/// JSON codec for wire records.
///
/// Encoding is canonical: two values with the same content encode to the
/// same bytes regardless of key insertion order.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Canonical string form of a JSON value
    pub fn canonical(&self, value: &Value) -> QueueResult<String> {
        serde_json::to_string(&Canonical(value)).map_err(QueueError::from)
    }

    /// Encode any serializable record canonically
    pub fn encode<T: Serialize>(&self, record: &T) -> QueueResult<String> {
        self.canonical(&serde_json::to_value(record)?)
    }

    /// Decode a stored record; failures are decode errors naming `what`
    pub fn decode<T: DeserializeOwned>(&self, raw: &str, what: &str) -> QueueResult<T> {
        serde_json::from_str(raw).map_err(|e| QueueError::decode(what, e))
    }

    fn codec_id(&self) -> &'static str {
        "json"
    }
}

impl std::fmt::Display for JsonCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.codec_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Map};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestRecord {
        id: u32,
        name: String,
    }

    #[test]
    fn test_canonical_sorts_nested_keys() {
        let codec = JsonCodec;
        let value = json!({"b": {"z": 1, "a": [ {"y": 2, "x": 1} ]}, "a": null});
        assert_eq!(
            codec.canonical(&value).unwrap(),
            r#"{"a":null,"b":{"a":[{"x":1,"y":2}],"z":1}}"#
        );
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let codec = JsonCodec;
        let mut first = Map::new();
        first.insert("user_id".to_string(), json!(42));
        first.insert("locale".to_string(), json!("en"));
        let mut second = Map::new();
        second.insert("locale".to_string(), json!("en"));
        second.insert("user_id".to_string(), json!(42));

        assert_eq!(
            codec.canonical(&Value::Object(first)).unwrap(),
            codec.canonical(&Value::Object(second)).unwrap()
        );
    }

    #[test]
    fn test_decode_reports_record_kind() {
        let codec = JsonCodec;
        let record = TestRecord { id: 42, name: "test".to_string() };
        let raw = codec.encode(&record).unwrap();
        assert_eq!(codec.decode::<TestRecord>(&raw, "record").unwrap(), record);

        let err = codec.decode::<TestRecord>("[]", "failed job").unwrap_err();
        assert!(err.to_string().contains("failed job"));
    }

    #[test]
    fn test_codec_id() {
        assert_eq!(JsonCodec.to_string(), "json");
    }
}
