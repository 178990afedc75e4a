//! # JSON Pointers and Error Paths
//!
//! [`JsonPointer`] is an RFC 6901 pointer used for `$ref` fragments, patch
//! operations, and `resolve` lookups. [`Path`] is the lighter structure the
//! validator threads through its scopes to record where an error occurred
//! in the schema and in the instance; it renders as a JSON Pointer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// An RFC 6901 JSON Pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JsonPointer(Vec<String>);

impl JsonPointer {
    /// The empty pointer, addressing the whole document.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse pointer text such as `/a/b~1c`.
    ///
    /// A leading `#` (URI fragment form) is accepted and ignored.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let body = text.strip_prefix('#').unwrap_or(text);
        if body.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = body.strip_prefix('/') else {
            return Err(CoreError::InvalidPointer {
                pointer: text.to_string(),
                reason: "must be empty or start with '/'".into(),
            });
        };
        rest.split('/')
            .map(|raw| unescape(raw, text))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Build a pointer from unescaped tokens.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// A new pointer with `token` appended.
    pub fn join(&self, token: impl Into<String>) -> Self {
        let mut tokens = self.0.clone();
        tokens.push(token.into());
        Self(tokens)
    }

    /// Split into the parent pointer and the final token.
    pub fn split_last(&self) -> Option<(JsonPointer, &str)> {
        let (last, init) = self.0.split_last()?;
        Some((Self(init.to_vec()), last.as_str()))
    }

    /// True if `self` is a proper prefix of `other`.
    pub fn is_ancestor_of(&self, other: &JsonPointer) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    /// Look up the addressed value.
    pub fn resolve<'v>(&self, document: &'v Value) -> Option<&'v Value> {
        self.0.iter().try_fold(document, |node, token| match node {
            Value::Object(map) => map.get(token),
            Value::Array(items) => parse_index(token).and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Mutable variant of [`JsonPointer::resolve`].
    pub fn resolve_mut<'v>(&self, document: &'v mut Value) -> Option<&'v mut Value> {
        self.0.iter().try_fold(document, |node, token| match node {
            Value::Object(map) => map.get_mut(token),
            Value::Array(items) => parse_index(token).and_then(move |i| items.get_mut(i)),
            _ => None,
        })
    }
}

impl std::fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for token in &self.0 {
            write!(f, "/{}", escape(token))?;
        }
        Ok(())
    }
}

impl std::str::FromStr for JsonPointer {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for JsonPointer {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<JsonPointer> for String {
    fn from(value: JsonPointer) -> Self {
        value.to_string()
    }
}

/// Parse an array index token: `0` or a digit string without leading zeros.
pub fn parse_index(token: &str) -> Option<usize> {
    if token.is_empty() || (token.len() > 1 && token.starts_with('0')) {
        return None;
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape(raw: &str, whole: &str) -> Result<String, CoreError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(CoreError::InvalidPointer {
                    pointer: whole.to_string(),
                    reason: "'~' must be followed by '0' or '1'".into(),
                })
            }
        }
    }
    Ok(out)
}

/// One step of an error path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(k) => f.write_str(&escape(k)),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(value: &str) -> Self {
        Self::Key(value.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(value: String) -> Self {
        Self::Key(value)
    }
}

impl From<usize> for PathSegment {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

/// A location inside a schema or an instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<PathSegment>);

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    /// A new path with `segment` appended.
    pub fn join(&self, segment: impl Into<PathSegment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The path without its last segment.
    pub fn parent(&self) -> Path {
        let mut segments = self.0.clone();
        segments.pop();
        Self(segments)
    }

    /// Convert a pointer; all-digit tokens become indices.
    pub fn from_pointer(pointer: &JsonPointer) -> Self {
        Self(
            pointer
                .tokens()
                .iter()
                .map(|t| match parse_index(t) {
                    Some(i) => PathSegment::Index(i),
                    None => PathSegment::Key(t.clone()),
                })
                .collect(),
        )
    }

    /// The equivalent JSON Pointer.
    pub fn to_pointer(&self) -> JsonPointer {
        JsonPointer::from_tokens(self.0.iter().map(|s| match s {
            PathSegment::Key(k) => k.clone(),
            PathSegment::Index(i) => i.to_string(),
        }))
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(root)");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_display() {
        let ptr = JsonPointer::parse("/a/b~1c/~0d").unwrap();
        assert_eq!(ptr.tokens(), &["a", "b/c", "~d"]);
        assert_eq!(ptr.to_string(), "/a/b~1c/~0d");
    }

    #[test]
    fn test_parse_fragment_form() {
        assert!(JsonPointer::parse("#").unwrap().is_root());
        let ptr = JsonPointer::parse("#/definitions/x").unwrap();
        assert_eq!(ptr.tokens(), &["definitions", "x"]);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(JsonPointer::parse("a/b").is_err());
        assert!(JsonPointer::parse("/a~2").is_err());
        assert!(JsonPointer::parse("/a~").is_err());
    }

    #[test]
    fn test_resolve() {
        let doc = json!({"a": [10, {"b": "x"}], "": 1});
        assert_eq!(JsonPointer::parse("/a/1/b").unwrap().resolve(&doc), Some(&json!("x")));
        assert_eq!(JsonPointer::parse("/").unwrap().resolve(&doc), Some(&json!(1)));
        assert_eq!(JsonPointer::parse("/a/01").unwrap().resolve(&doc), None);
        assert_eq!(JsonPointer::root().resolve(&doc), Some(&doc));
    }

    #[test]
    fn test_resolve_mut() {
        let mut doc = json!({"a": [1, 2]});
        if let Some(v) = JsonPointer::parse("/a/0").unwrap().resolve_mut(&mut doc) {
            *v = json!(5);
        }
        assert_eq!(doc, json!({"a": [5, 2]}));
    }

    #[test]
    fn test_split_last_and_ancestry() {
        let ptr = JsonPointer::parse("/a/b").unwrap();
        let (parent, last) = ptr.split_last().unwrap();
        assert_eq!(parent.to_string(), "/a");
        assert_eq!(last, "b");
        assert!(parent.is_ancestor_of(&ptr));
        assert!(!ptr.is_ancestor_of(&ptr));
        assert!(JsonPointer::root().split_last().is_none());
    }

    #[test]
    fn test_serde_as_string() {
        let ptr: JsonPointer = serde_json::from_value(json!("/x/0")).unwrap();
        assert_eq!(serde_json::to_value(&ptr).unwrap(), json!("/x/0"));
        assert!(serde_json::from_value::<JsonPointer>(json!("x")).is_err());
    }

    #[test]
    fn test_path_display() {
        assert_eq!(Path::root().to_string(), "(root)");
        let path = Path::root().join("items").join(2usize);
        assert_eq!(path.to_string(), "/items/2");
        assert_eq!(path.to_pointer().to_string(), "/items/2");
        assert_eq!(path.parent().to_string(), "/items");
    }

    #[test]
    fn test_path_from_pointer() {
        let ptr = JsonPointer::parse("/a/0/b").unwrap();
        let path = Path::from_pointer(&ptr);
        assert_eq!(path.segments()[1], PathSegment::Index(0));
        assert_eq!(path.to_string(), "/a/0/b");
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("12"), Some(12));
        assert_eq!(parse_index("012"), None);
        assert_eq!(parse_index("-"), None);
        assert_eq!(parse_index("+1"), None);
    }
}
