//! # Format Checkers
//!
//! The extensible table behind the `format` keyword. Each entry maps a
//! format name to a checker that accepts the text or explains why not.
//! A format without a checker is an annotation: it never fails.
//!
//! The default table covers `email`, `uri`, `uri-reference`,
//! `uri-template`, `uuid`, `json-pointer`, `regex`, `date`, `date-time`,
//! `time`, `hostname`, `ipv4` and `ipv6`.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use schemata_core::JsonPointer;
use url::Url;
use uuid::Uuid;

/// A format checker: `Ok(())` accepts, `Err(reason)` rejects.
pub type FormatChecker = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

/// Format name → checker.
#[derive(Default)]
pub struct FormatTable {
    checkers: RwLock<HashMap<String, FormatChecker>>,
}

impl FormatTable {
    /// A table with no checkers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A table seeded with the default checkers.
    pub fn with_defaults() -> Self {
        let table = Self::empty();
        table.register("email", check_email);
        table.register("uri", check_uri);
        table.register("uri-reference", check_uri_reference);
        table.register("uri-template", check_uri_template);
        table.register("uuid", check_uuid);
        table.register("json-pointer", check_json_pointer);
        table.register("regex", check_regex);
        table.register("date", check_date);
        table.register("date-time", check_date_time);
        table.register("time", check_time);
        table.register("hostname", check_hostname);
        table.register("ipv4", check_ipv4);
        table.register("ipv6", check_ipv6);
        tracing::debug!(formats = table.len(), "seeded format table");
        table
    }

    /// Add or replace the checker for `name`.
    pub fn register<F>(&self, name: impl Into<String>, checker: F)
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        self.checkers.write().insert(name.into(), Arc::new(checker));
    }

    /// Run the checker for `name`; `None` if no checker is registered.
    pub fn check(&self, name: &str, text: &str) -> Option<Result<(), String>> {
        let checker = self.checkers.read().get(name).cloned()?;
        Some(checker(text))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.checkers.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.checkers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.read().is_empty()
    }

    /// Registered format names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.checkers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for FormatTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatTable").field("formats", &self.names()).finish()
    }
}

fn check_email(text: &str) -> Result<(), String> {
    let (local, domain) = text.rsplit_once('@').ok_or("missing '@'")?;
    if local.is_empty() || local.len() > 64 {
        return Err("local part must be 1 to 64 characters".into());
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return Err("misplaced '.' in local part".into());
    }
    if local.chars().any(|c| c.is_whitespace() || c == '@') {
        return Err("invalid character in local part".into());
    }
    if domain.starts_with('[') && domain.ends_with(']') {
        let literal = &domain[1..domain.len() - 1];
        let literal = literal.strip_prefix("IPv6:").unwrap_or(literal);
        return check_ipv4(literal).or_else(|_| check_ipv6(literal));
    }
    check_hostname(domain)
}

fn check_uri(text: &str) -> Result<(), String> {
    Url::parse(text).map(|_| ()).map_err(|e| e.to_string())
}

fn check_uri_reference(text: &str) -> Result<(), String> {
    if text.chars().any(char::is_whitespace) {
        return Err("whitespace is not allowed".into());
    }
    let base = Url::parse("http://reference.invalid/").map_err(|e| e.to_string())?;
    base.join(text).map(|_| ()).map_err(|e| e.to_string())
}

fn check_uri_template(text: &str) -> Result<(), String> {
    let mut open = false;
    for c in text.chars() {
        match (c, open) {
            ('{', false) => open = true,
            ('}', true) => open = false,
            ('{', true) => return Err("nested '{'".into()),
            ('}', false) => return Err("unbalanced '}'".into()),
            _ => {}
        }
    }
    if open {
        return Err("unclosed '{'".into());
    }
    Ok(())
}

fn check_uuid(text: &str) -> Result<(), String> {
    if text.len() != 36 {
        return Err("expected the hyphenated 36-character form".into());
    }
    Uuid::parse_str(text).map(|_| ()).map_err(|e| e.to_string())
}

fn check_json_pointer(text: &str) -> Result<(), String> {
    if !text.is_empty() && !text.starts_with('/') {
        return Err("must be empty or start with '/'".into());
    }
    JsonPointer::parse(text).map(|_| ()).map_err(|e| e.to_string())
}

fn check_regex(text: &str) -> Result<(), String> {
    Regex::new(text).map(|_| ()).map_err(|e| e.to_string())
}

fn check_date(text: &str) -> Result<(), String> {
    if text.len() != 10 {
        return Err("expected YYYY-MM-DD".into());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn check_date_time(text: &str) -> Result<(), String> {
    DateTime::parse_from_rfc3339(text)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn check_time(text: &str) -> Result<(), String> {
    let full = format!("1970-01-01T{text}");
    match DateTime::parse_from_rfc3339(&full) {
        Ok(_) => Ok(()),
        Err(e) => DateTime::parse_from_rfc3339(&format!("{full}Z"))
            .map(|_| ())
            .map_err(|_| e.to_string()),
    }
}

fn check_hostname(text: &str) -> Result<(), String> {
    let host = text.strip_suffix('.').unwrap_or(text);
    if host.is_empty() || host.len() > 253 {
        return Err("hostname must be 1 to 253 characters".into());
    }
    for label in host.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(format!("label {label:?} must be 1 to 63 characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("label {label:?} starts or ends with '-'"));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(format!("label {label:?} has invalid characters"));
        }
    }
    Ok(())
}

fn check_ipv4(text: &str) -> Result<(), String> {
    text.parse::<Ipv4Addr>().map(|_| ()).map_err(|e| e.to_string())
}

fn check_ipv6(text: &str) -> Result<(), String> {
    text.parse::<Ipv6Addr>().map(|_| ()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(name: &str, text: &str) -> bool {
        matches!(FormatTable::with_defaults().check(name, text), Some(Ok(())))
    }

    #[test]
    fn test_default_formats_seeded() {
        let table = FormatTable::with_defaults();
        for name in [
            "email", "uri", "uri-reference", "uri-template", "uuid", "json-pointer", "regex", "date",
            "date-time", "time",
        ] {
            assert!(table.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_unknown_format_is_none() {
        assert!(FormatTable::with_defaults().check("color", "red").is_none());
    }

    #[test]
    fn test_email() {
        assert!(accepts("email", "user@example.com"));
        assert!(!accepts("email", "user.example.com"));
        assert!(!accepts("email", "@example.com"));
        assert!(!accepts("email", "a..b@example.com"));
    }

    #[test]
    fn test_uri_and_reference() {
        assert!(accepts("uri", "https://example.com/a?b=c"));
        assert!(!accepts("uri", "relative/path"));
        assert!(accepts("uri-reference", "relative/path"));
        assert!(accepts("uri-reference", "#/definitions/a"));
        assert!(!accepts("uri-reference", "has space"));
    }

    #[test]
    fn test_uri_template() {
        assert!(accepts("uri-template", "/users/{id}/posts{?page}"));
        assert!(!accepts("uri-template", "/users/{id"));
        assert!(!accepts("uri-template", "/users/id}"));
    }

    #[test]
    fn test_uuid() {
        assert!(accepts("uuid", "6fa459ea-ee8a-3ca4-894e-db77e160355e"));
        assert!(!accepts("uuid", "6fa459eaee8a3ca4894edb77e160355e"));
        assert!(!accepts("uuid", "not-a-uuid"));
    }

    #[test]
    fn test_json_pointer() {
        assert!(accepts("json-pointer", ""));
        assert!(accepts("json-pointer", "/a/0/b~1c"));
        assert!(!accepts("json-pointer", "a/b"));
        assert!(!accepts("json-pointer", "/a~2"));
    }

    #[test]
    fn test_dates_and_times() {
        assert!(accepts("date", "2024-02-29"));
        assert!(!accepts("date", "2023-02-29"));
        assert!(!accepts("date", "2024-2-9"));
        assert!(accepts("date-time", "2024-01-15T12:30:00Z"));
        assert!(accepts("date-time", "2024-01-15T12:30:00.5+02:00"));
        assert!(!accepts("date-time", "2024-01-15 12:30"));
        assert!(accepts("time", "12:30:00Z"));
        assert!(accepts("time", "12:30:00"));
        assert!(!accepts("time", "25:00:00Z"));
    }

    #[test]
    fn test_regex_hostname_ip() {
        assert!(accepts("regex", "^[a-z]+$"));
        assert!(!accepts("regex", "(unclosed"));
        assert!(accepts("hostname", "api.example.com"));
        assert!(!accepts("hostname", "-bad.example.com"));
        assert!(accepts("ipv4", "192.168.0.1"));
        assert!(!accepts("ipv4", "256.0.0.1"));
        assert!(accepts("ipv6", "::1"));
    }

    #[test]
    fn test_register_custom() {
        let table = FormatTable::empty();
        table.register("even-length", |s: &str| {
            if s.len() % 2 == 0 {
                Ok(())
            } else {
                Err("odd length".to_string())
            }
        });
        assert_eq!(table.check("even-length", "ab"), Some(Ok(())));
        assert!(matches!(table.check("even-length", "abc"), Some(Err(_))));
        assert_eq!(table.names(), vec!["even-length".to_string()]);
    }
}
