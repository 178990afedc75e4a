//! # Frozen Values — Immutable, Hashable JSON
//!
//! `Frozen` is the engine's representation of schema data. It is a JSON
//! value tree that is immutable, cheaply cloneable (every container is
//! `Arc`-backed), and usable as a hash-map key.
//!
//! ## Invariant
//!
//! Freezing is idempotent and unfreezing restores an equal plain value:
//! `Frozen::from(&v).to_value() == v` for every `serde_json::Value`, and
//! freezing a `Frozen` yields the same `Frozen`.
//!
//! Numbers keep their integer-ness: `1` freezes to `Integer(1)` and `1.0`
//! to `Number(1.0)`. Canonical bytes render both as `1`, so they hash the
//! same, but the frozen values stay distinguishable.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::CoreError;

/// An object of frozen values, ordered by key.
pub type FrozenMap = BTreeMap<String, Frozen>;

/// A finite `f64` with total equality and hashing.
///
/// `-0.0` is normalized to `0.0` so that equal numbers hash equally.
#[derive(Debug, Clone, Copy)]
pub struct Finite(f64);

impl Finite {
    /// Wrap a float, rejecting NaN and infinities.
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() {
            Some(Self(if value == 0.0 { 0.0 } else { value }))
        } else {
            None
        }
    }

    /// The wrapped float.
    pub fn get(&self) -> f64 {
        self.0
    }
}

impl PartialEq for Finite {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Finite {}

impl Hash for Finite {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// An immutable JSON value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Frozen {
    Null,
    Bool(bool),
    Integer(i128),
    Number(Finite),
    Text(Arc<str>),
    Seq(Arc<[Frozen]>),
    Map(Arc<FrozenMap>),
}

impl Frozen {
    /// Freeze any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Unfreezable` when the value cannot be expressed
    /// as JSON (for example a map with non-string keys).
    pub fn freeze(value: &impl Serialize) -> Result<Self, CoreError> {
        let json = serde_json::to_value(value).map_err(|e| CoreError::Unfreezable {
            path: String::new(),
            reason: e.to_string(),
        })?;
        Ok(Self::from(&json))
    }

    /// An empty frozen object.
    pub fn empty_map() -> Self {
        Self::Map(Arc::new(FrozenMap::new()))
    }

    /// Build a frozen object from owned entries.
    pub fn map(entries: FrozenMap) -> Self {
        Self::Map(Arc::new(entries))
    }

    /// Build a frozen array from owned items.
    pub fn seq(items: Vec<Frozen>) -> Self {
        Self::Seq(items.into())
    }

    /// Build a frozen string.
    pub fn text(s: impl AsRef<str>) -> Self {
        Self::Text(Arc::from(s.as_ref()))
    }

    /// Restore the plain JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => integer_to_value(*i),
            Self::Number(n) => Number::from_f64(n.get()).map_or(Value::Null, Value::Number),
            Self::Text(s) => Value::String(s.to_string()),
            Self::Seq(items) => Value::Array(items.iter().map(Frozen::to_value).collect()),
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        }
    }

    /// The Draft-7 type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Number(_) => "number",
            Self::Text(_) => "string",
            Self::Seq(_) => "array",
            Self::Map(_) => "object",
        }
    }

    /// True for values usable as schemas: objects and booleans.
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Map(_) | Self::Bool(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The value as an integer. Integral floats count.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Number(n) if n.get().fract() == 0.0 && n.get().abs() < 1e30 => {
                Some(n.get() as i128)
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(n.get()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Frozen]> {
        match self {
            Self::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&FrozenMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Member lookup on objects.
    pub fn get(&self, key: &str) -> Option<&Frozen> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// JSON equality against a plain value, comparing numbers numerically.
    pub fn equals_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Null, Value::Null) => true,
            (Self::Bool(a), Value::Bool(b)) => a == b,
            (Self::Integer(a), Value::Number(b)) => match number_as_i128(b) {
                Some(b) => *a == b,
                None => b.as_f64() == Some(*a as f64),
            },
            (Self::Number(a), Value::Number(b)) => b.as_f64() == Some(a.get()),
            (Self::Text(a), Value::String(b)) => a.as_ref() == b.as_str(),
            (Self::Seq(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals_value(y))
            }
            (Self::Map(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.equals_value(w)))
            }
            _ => false,
        }
    }
}

impl From<&Value> for Frozen {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match number_as_i128(n) {
                Some(i) if !n.is_f64() => Self::Integer(i),
                _ => n
                    .as_f64()
                    .and_then(Finite::new)
                    .map_or(Self::Null, Self::Number),
            },
            Value::String(s) => Self::text(s),
            Value::Array(items) => Self::Seq(items.iter().map(Frozen::from).collect()),
            Value::Object(map) => Self::Map(Arc::new(
                map.iter()
                    .map(|(k, v)| (k.clone(), Frozen::from(v)))
                    .collect(),
            )),
        }
    }
}

impl From<Value> for Frozen {
    fn from(value: Value) -> Self {
        Self::from(&value)
    }
}

impl From<&Frozen> for Value {
    fn from(value: &Frozen) -> Self {
        value.to_value()
    }
}

impl Serialize for Frozen {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => {
                if let Ok(i) = i64::try_from(*i) {
                    serializer.serialize_i64(i)
                } else if let Ok(u) = u64::try_from(*i) {
                    serializer.serialize_u64(u)
                } else {
                    serializer.serialize_f64(*i as f64)
                }
            }
            Self::Number(n) => serializer.serialize_f64(n.get()),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Seq(items) => serializer.collect_seq(items.iter()),
            Self::Map(map) => serializer.collect_map(map.iter()),
        }
    }
}

impl<'de> Deserialize<'de> for Frozen {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|v| Frozen::from(&v))
    }
}

impl std::fmt::Display for Frozen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

fn integer_to_value(i: i128) -> Value {
    if let Ok(i) = i64::try_from(i) {
        Value::from(i)
    } else if let Ok(u) = u64::try_from(i) {
        Value::from(u)
    } else {
        Number::from_f64(i as f64).map_or(Value::Null, Value::Number)
    }
}

/// Integer view of a JSON number, if it is integral.
pub fn number_as_i128(n: &Number) -> Option<i128> {
    if let Some(i) = n.as_i64() {
        Some(i as i128)
    } else if let Some(u) = n.as_u64() {
        Some(u as i128)
    } else {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < 1e30)
            .map(|f| f as i128)
    }
}

/// True if the JSON value is an integer in the Draft-7 sense (`1.0` counts).
pub fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => number_as_i128(n).is_some(),
        _ => false,
    }
}

/// JSON equality with numeric comparison (`1 == 1.0`).
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (number_as_i128(x), number_as_i128(y)) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| json_equal(v, w)))
        }
        _ => a == b,
    }
}

/// The Draft-7 type name of a plain JSON value. Integral numbers report
/// `"integer"`.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) if is_integer(value) => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_freeze_unfreeze_restores_value() {
        let value = json!({
            "type": "object",
            "properties": {"a": {"type": "integer", "minimum": 0}},
            "enum": [1, 2.5, "x", null, true, [1, 2], {"k": "v"}]
        });
        let frozen = Frozen::from(&value);
        assert_eq!(frozen.to_value(), value);
    }

    #[test]
    fn test_freeze_is_idempotent() {
        let value = json!({"a": [1, 2.5, {"b": null}]});
        let once = Frozen::from(&value);
        let twice = Frozen::freeze(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_frozen_is_hashable() {
        let mut set = HashSet::new();
        set.insert(Frozen::from(&json!({"a": 1})));
        set.insert(Frozen::from(&json!({"a": 1})));
        set.insert(Frozen::from(&json!({"a": 2})));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_integer_and_float_stay_distinct() {
        assert_eq!(Frozen::from(&json!(1)), Frozen::Integer(1));
        assert!(matches!(Frozen::from(&json!(1.0)), Frozen::Number(_)));
        assert_eq!(Frozen::from(&json!(1.0)).to_value(), json!(1.0));
    }

    #[test]
    fn test_negative_zero_normalized() {
        assert_eq!(Finite::new(-0.0), Finite::new(0.0));
        assert!(Finite::new(f64::NAN).is_none());
        assert!(Finite::new(f64::INFINITY).is_none());
    }

    #[test]
    fn test_freeze_rejects_non_string_keys() {
        let mut map = std::collections::HashMap::new();
        map.insert(vec![1u8], 1);
        let err = Frozen::freeze(&map).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnfreezableValue);
    }

    #[test]
    fn test_equals_value_numeric() {
        assert!(Frozen::Integer(1).equals_value(&json!(1.0)));
        assert!(Frozen::from(&json!(2.5)).equals_value(&json!(2.5)));
        assert!(!Frozen::Integer(1).equals_value(&json!("1")));
        assert!(Frozen::from(&json!({"a": [1]})).equals_value(&json!({"a": [1.0]})));
    }

    #[test]
    fn test_json_equal() {
        assert!(json_equal(&json!(1), &json!(1.0)));
        assert!(!json_equal(&json!(1), &json!(true)));
        assert!(json_equal(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1.0})));
        assert!(!json_equal(&json!([1, 2]), &json!([2, 1])));
    }

    #[test]
    fn test_json_type_name() {
        assert_eq!(json_type_name(&json!(1.0)), "integer");
        assert_eq!(json_type_name(&json!(1.5)), "number");
        assert_eq!(json_type_name(&json!({})), "object");
    }

    #[test]
    fn test_as_i128_accepts_integral_float() {
        assert_eq!(Frozen::from(&json!(3.0)).as_i128(), Some(3));
        assert_eq!(Frozen::from(&json!(3.5)).as_i128(), None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_json() -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(Value::from),
                (-1.0e9f64..1.0e9).prop_map(|f| json!(f)),
                "[a-z]{0,8}".prop_map(Value::String),
            ];
            leaf.prop_recursive(3, 24, 4, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                    prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                        .prop_map(|m| Value::Object(m.into_iter().collect())),
                ]
            })
        }

        proptest! {
            #[test]
            fn freeze_roundtrip(value in arb_json()) {
                let frozen = Frozen::from(&value);
                prop_assert_eq!(frozen.to_value(), value);
            }

            #[test]
            fn freeze_idempotent(value in arb_json()) {
                let frozen = Frozen::from(&value);
                let again = Frozen::freeze(&frozen).unwrap();
                prop_assert_eq!(frozen, again);
            }
        }
    }
}
