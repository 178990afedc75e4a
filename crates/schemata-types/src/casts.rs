//! # Cast Table
//!
//! Named conversion functions referenced from a schema's `$cast` chain.
//! The instance factory runs the chain left to right before coercing into
//! the descriptor's carrier; each step receives the previous step's output.
//!
//! A chain entry that names neither a cast nor a defined descriptor fails
//! the build with `UnresolvedForward`.

use parking_lot::RwLock;
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use schemata_core::frozen::number_as_i128;

/// A cast function: one value in, one value (or a reason) out.
pub type CastFn = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Cast name → function.
pub struct CastTable {
    casts: RwLock<HashMap<String, CastFn>>,
}

impl CastTable {
    pub fn empty() -> Self {
        Self {
            casts: RwLock::new(HashMap::new()),
        }
    }

    /// The builtin casts: `trim`, `lowercase`, `uppercase`, `to_string`,
    /// `to_integer` and `to_number`.
    pub fn with_defaults() -> Self {
        let table = Self::empty();
        table.register("trim", |v| map_text(v, |s| s.trim().to_string()));
        table.register("lowercase", |v| map_text(v, |s| s.to_lowercase()));
        table.register("uppercase", |v| map_text(v, |s| s.to_uppercase()));
        table.register("to_string", to_string);
        table.register("to_integer", to_integer);
        table.register("to_number", to_number);
        table
    }

    /// Add or replace a cast.
    pub fn register<F>(&self, name: impl Into<String>, cast: F)
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(cast = %name, "registered cast");
        self.casts.write().insert(name, Arc::new(cast));
    }

    pub fn get(&self, name: &str) -> Option<CastFn> {
        self.casts.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.casts.read().contains_key(name)
    }

    /// Run the cast `name`; `None` if no such cast is registered.
    pub fn apply(&self, name: &str, value: Value) -> Option<Result<Value, String>> {
        // Clone the Arc out so a cast may itself consult the table.
        let cast = self.get(name)?;
        Some(cast(value))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.casts.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for CastTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for CastTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CastTable").field("casts", &self.names()).finish()
    }
}

fn map_text(value: Value, f: impl Fn(&str) -> String) -> Result<Value, String> {
    match value {
        Value::String(s) => Ok(Value::String(f(&s))),
        other => Err(format!("expected text, found {other}")),
    }
}

fn to_string(value: Value) -> Result<Value, String> {
    Ok(match value {
        Value::String(s) => Value::String(s),
        other => Value::String(other.to_string()),
    })
}

fn to_integer(value: Value) -> Result<Value, String> {
    match &value {
        Value::Number(n) => match (n.as_i64(), number_as_i128(n)) {
            (Some(i), _) => Ok(Value::from(i)),
            (None, Some(i)) => i64::try_from(i)
                .map(Value::from)
                .map_err(|_| format!("{value} is out of integer range")),
            (None, None) => Err(format!("{value} is not integral")),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| format!("{s:?} is not an integer: {e}")),
        Value::Bool(b) => Ok(Value::from(i64::from(*b))),
        other => Err(format!("cannot convert {other} to an integer")),
    }
}

fn to_number(value: Value) -> Result<Value, String> {
    match value {
        Value::Number(n) => Ok(Value::Number(n)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("{s:?} is not a number")),
        Value::Bool(b) => Ok(Value::from(if b { 1.0 } else { 0.0 })),
        other => Err(format!("cannot convert {other} to a number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_casts_present() {
        let table = CastTable::with_defaults();
        assert_eq!(
            table.names(),
            vec!["lowercase", "to_integer", "to_number", "to_string", "trim", "uppercase"]
        );
    }

    #[test]
    fn test_text_casts() {
        let table = CastTable::with_defaults();
        assert_eq!(table.apply("trim", json!("  a b ")).unwrap().unwrap(), json!("a b"));
        assert_eq!(table.apply("uppercase", json!("ab")).unwrap().unwrap(), json!("AB"));
        assert_eq!(table.apply("lowercase", json!("AB")).unwrap().unwrap(), json!("ab"));
        assert!(table.apply("trim", json!(3)).unwrap().is_err());
    }

    #[test]
    fn test_numeric_casts() {
        let table = CastTable::with_defaults();
        assert_eq!(table.apply("to_integer", json!(" 12 ")).unwrap().unwrap(), json!(12));
        assert_eq!(table.apply("to_integer", json!(4.0)).unwrap().unwrap(), json!(4));
        assert_eq!(table.apply("to_integer", json!(true)).unwrap().unwrap(), json!(1));
        assert!(table.apply("to_integer", json!(4.5)).unwrap().is_err());
        assert_eq!(table.apply("to_number", json!("2.5")).unwrap().unwrap(), json!(2.5));
        assert_eq!(table.apply("to_string", json!(12)).unwrap().unwrap(), json!("12"));
    }

    #[test]
    fn test_unknown_cast_is_none() {
        assert!(CastTable::with_defaults().apply("nope", json!(1)).is_none());
    }

    #[test]
    fn test_register_replaces() {
        let table = CastTable::empty();
        table.register("twice", |v: Value| Ok(json!([v.clone(), v])));
        assert_eq!(table.apply("twice", json!(1)).unwrap().unwrap(), json!([1, 1]));
        table.register("twice", |_| Err("disabled".to_string()));
        assert_eq!(table.apply("twice", json!(1)).unwrap().unwrap_err(), "disabled");
        assert_eq!(table.names().len(), 1);
    }
}
