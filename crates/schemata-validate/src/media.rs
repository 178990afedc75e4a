//! # Content Media Types
//!
//! A table mapping `contentMediaType` strings to load/dump codecs. The
//! table is consumer-facing: validation never invokes it. Callers that want
//! to decode a `contentMediaType`-annotated string look the codec up here.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::MediaError;

type Loader = Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>;
type Dumper = Arc<dyn Fn(&Value) -> Result<String, String> + Send + Sync>;

/// A load/dump pair for one media type.
#[derive(Clone)]
pub struct MediaCodec {
    load: Loader,
    dump: Dumper,
}

impl MediaCodec {
    pub fn new<L, D>(load: L, dump: D) -> Self
    where
        L: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
        D: Fn(&Value) -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            load: Arc::new(load),
            dump: Arc::new(dump),
        }
    }
}

/// Media type → codec.
#[derive(Default)]
pub struct MediaTypeTable {
    codecs: RwLock<HashMap<String, MediaCodec>>,
}

impl MediaTypeTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// JSON, YAML (under its three common names) and plain text.
    pub fn with_defaults() -> Self {
        let table = Self::empty();
        let json = MediaCodec::new(
            |text| serde_json::from_str(text).map_err(|e| e.to_string()),
            |value| serde_json::to_string(value).map_err(|e| e.to_string()),
        );
        let yaml = MediaCodec::new(
            |text| {
                let parsed: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
                yaml_to_json_value(&parsed)
            },
            |value| serde_yaml::to_string(value).map_err(|e| e.to_string()),
        );
        let plain = MediaCodec::new(
            |text| Ok(Value::String(text.to_string())),
            |value| match value {
                Value::String(s) => Ok(s.clone()),
                other => Ok(other.to_string()),
            },
        );
        table.register("application/json", json);
        table.register("application/yaml", yaml.clone());
        table.register("application/x-yaml", yaml.clone());
        table.register("text/yaml", yaml);
        table.register("text/plain", plain);
        table
    }

    pub fn register(&self, media_type: impl Into<String>, codec: MediaCodec) {
        self.codecs.write().insert(media_type.into(), codec);
    }

    pub fn contains(&self, media_type: &str) -> bool {
        self.codecs.read().contains_key(media_type)
    }

    fn codec(&self, media_type: &str) -> Result<MediaCodec, MediaError> {
        self.codecs
            .read()
            .get(media_type)
            .cloned()
            .ok_or_else(|| MediaError::UnknownMediaType(media_type.to_string()))
    }

    /// Decode `text` as `media_type`.
    pub fn load(&self, media_type: &str, text: &str) -> Result<Value, MediaError> {
        let codec = self.codec(media_type)?;
        (codec.load)(text).map_err(|reason| MediaError::Decode {
            media_type: media_type.to_string(),
            reason,
        })
    }

    /// Encode `value` as `media_type`.
    pub fn dump(&self, media_type: &str, value: &Value) -> Result<String, MediaError> {
        let codec = self.codec(media_type)?;
        (codec.dump)(value).map_err(|reason| MediaError::Encode {
            media_type: media_type.to_string(),
            reason,
        })
    }

    /// Registered media types, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.codecs.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for MediaTypeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTypeTable").field("media_types", &self.names()).finish()
    }
}

/// Convert a `serde_yaml::Value` to a `serde_json::Value`.
///
/// Tags are dropped. Map keys must be strings, numbers or booleans.
pub fn yaml_to_json_value(yaml: &serde_yaml::Value) -> Result<Value, String> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number(serde_json::Number::from(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::Number(serde_json::Number::from(u)))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("cannot represent float {f} in JSON"))
            } else {
                Err(format!("unsupported YAML number: {n:?}"))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => {
            let items: Result<Vec<Value>, String> = seq.iter().map(yaml_to_json_value).collect();
            Ok(Value::Array(items?))
        }
        serde_yaml::Value::Mapping(map) => {
            let mut json_map = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported YAML map key type: {other:?}")),
                };
                json_map.insert(key, yaml_to_json_value(v)?);
            }
            Ok(Value::Object(json_map))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json_value(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemata_core::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_json_codec() {
        let table = MediaTypeTable::with_defaults();
        let value = table.load("application/json", r#"{"a": [1, 2]}"#).unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
        assert_eq!(table.dump("application/json", &value).unwrap(), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn test_yaml_codec() {
        let table = MediaTypeTable::with_defaults();
        let value = table.load("application/yaml", "a: 1\nb: [x, true]\n").unwrap();
        assert_eq!(value, json!({"a": 1, "b": ["x", true]}));
        let text = table.dump("text/yaml", &value).unwrap();
        assert_eq!(table.load("application/x-yaml", &text).unwrap(), value);
    }

    #[test]
    fn test_unknown_media_type() {
        let err = MediaTypeTable::with_defaults().load("image/png", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownKeyword);
    }

    #[test]
    fn test_decode_failure_kind() {
        let err = MediaTypeTable::with_defaults()
            .load("application/json", "{not json")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CoercionFailure);
    }

    #[test]
    fn test_yaml_numeric_keys() {
        let parsed: serde_yaml::Value = serde_yaml::from_str("1: one\ntrue: yes\n").unwrap();
        let value = yaml_to_json_value(&parsed).unwrap();
        assert_eq!(value["1"], json!("one"));
        assert_eq!(value["true"], json!("yes"));
    }
}
