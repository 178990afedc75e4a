//! # Primitive Carriers
//!
//! The JSON kind a descriptor's instances inhabit. A descriptor with a
//! single `type` has that carrier; one pinned by `const` or a homogeneous
//! `enum` takes the kind of those values; everything else (unions, type
//! sets, bare constraint schemas) has carrier [`Carrier::None`] and
//! passes its input through unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

use schemata_core::frozen::number_as_i128;
use schemata_core::{Frozen, Keyword, Schema};

use crate::error::BuildError;

/// The primitive kind of a descriptor's instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Carrier {
    Null,
    Boolean,
    Integer,
    Number,
    Text,
    Sequence,
    Mapping,
    /// No single primitive kind.
    None,
}

impl Carrier {
    pub fn all() -> &'static [Carrier] {
        &[
            Self::Null,
            Self::Boolean,
            Self::Integer,
            Self::Number,
            Self::Text,
            Self::Sequence,
            Self::Mapping,
            Self::None,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Text => "text",
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
            Self::None => "none",
        }
    }

    /// The carrier for a Draft-7 type name.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "null" => Some(Self::Null),
            "boolean" => Some(Self::Boolean),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "string" => Some(Self::Text),
            "array" => Some(Self::Sequence),
            "object" => Some(Self::Mapping),
            _ => None,
        }
    }

    /// The carrier of a plain value. Integral numbers are `Integer`.
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if number_as_i128(n).is_some() => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::Text,
            Value::Array(_) => Self::Sequence,
            Value::Object(_) => Self::Mapping,
        }
    }

    /// Infer the carrier of a schema.
    pub fn of_schema(schema: &Schema) -> Self {
        match schema.keyword(Keyword::Type) {
            Some(Frozen::Text(name)) => return Self::from_type_name(name).unwrap_or(Self::None),
            Some(_) => return Self::None,
            None => {}
        }
        if let Some(value) = schema.keyword(Keyword::Const) {
            return Self::of_value(&value.to_value());
        }
        if let Some(options) = schema.keyword(Keyword::Enum).and_then(Frozen::as_seq) {
            let mut kinds = options.iter().map(|v| Self::of_value(&v.to_value()));
            if let Some(first) = kinds.next() {
                if kinds.all(|k| k == first) {
                    return first;
                }
            }
        }
        Self::None
    }

    /// The value built when no input and no default is available.
    pub fn zero(&self) -> Value {
        match self {
            Self::Null | Self::None => Value::Null,
            Self::Boolean => Value::Bool(false),
            Self::Integer => Value::from(0),
            Self::Number => Value::from(0.0),
            Self::Text => Value::String(String::new()),
            Self::Sequence => Value::Array(Vec::new()),
            Self::Mapping => Value::Object(Map::new()),
        }
    }

    /// Convert `value` into this carrier.
    ///
    /// Integers accept integral floats and numeric text, narrowing floats
    /// that fit in 64 bits; numbers accept numeric text; text accepts
    /// numbers and booleans; mappings accept a sequence of `[key, value]`
    /// pairs. `None` accepts anything.
    ///
    /// # Errors
    ///
    /// `BuildError::Coercion` when no conversion applies.
    pub fn coerce(&self, value: Value) -> Result<Value, BuildError> {
        let fail = |value: &Value, reason: &str| Err(BuildError::coercion(self, value, reason));
        match (self, value) {
            (Self::None, v) => Ok(v),
            (Self::Null, Value::Null) => Ok(Value::Null),
            (Self::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
            (Self::Boolean, Value::String(s)) if s == "true" || s == "false" => Ok(Value::Bool(s == "true")),
            (Self::Integer, Value::Number(n)) => match number_as_i128(&n) {
                Some(_) if !n.is_f64() => Ok(Value::Number(n)),
                // Integral floats beyond the 64-bit range stay floats.
                Some(i) => Ok(integer_value(i).unwrap_or(Value::Number(n))),
                None => fail(&Value::Number(n), "not integral"),
            },
            (Self::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Ok(Value::from(i)),
                Err(_) => fail(&Value::String(s), "not an integer literal"),
            },
            (Self::Number, Value::Number(n)) => Ok(Value::Number(n)),
            (Self::Number, Value::String(s)) => match s.trim().parse::<f64>().ok().and_then(Number::from_f64) {
                Some(n) => Ok(Value::Number(n)),
                None => fail(&Value::String(s), "not a number literal"),
            },
            (Self::Text, Value::String(s)) => Ok(Value::String(s)),
            (Self::Text, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (Self::Text, Value::Bool(b)) => Ok(Value::String(b.to_string())),
            (Self::Sequence, Value::Array(items)) => Ok(Value::Array(items)),
            (Self::Mapping, Value::Object(map)) => Ok(Value::Object(map)),
            (Self::Mapping, Value::Array(pairs)) => pairs_to_map(&pairs)
                .map(Value::Object)
                .map_or_else(|| fail(&Value::Array(pairs.clone()), "expected [key, value] pairs"), Ok),
            (_, v) => {
                let found = Self::of_value(&v);
                fail(&v, &format!("no conversion from {found}"))
            }
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn integer_value(i: i128) -> Option<Value> {
    if let Ok(i) = i64::try_from(i) {
        Some(Value::from(i))
    } else {
        u64::try_from(i).ok().map(Value::from)
    }
}

fn pairs_to_map(pairs: &[Value]) -> Option<Map<String, Value>> {
    pairs
        .iter()
        .map(|pair| match pair.as_array().map(Vec::as_slice) {
            Some([Value::String(k), v]) => Some((k.clone(), v.clone())),
            _ => None,
        })
        .collect()
}
