//! # Document Loading
//!
//! Reads JSON or YAML files into `serde_json::Value`. YAML goes through
//! the same YAML→JSON conversion the media table uses, so non-string keys
//! and non-finite numbers are rejected the same way.

use anyhow::{anyhow, Context};
use serde_json::Value;
use std::path::Path;

use schemata_types::{Descriptor, Engine};
use schemata_validate::yaml_to_json_value;

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml"))
}

/// Read a JSON or YAML document.
pub fn load_document(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if is_yaml(path) {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {} as YAML", path.display()))?;
        yaml_to_json_value(&yaml).map_err(|reason| anyhow!("converting {}: {reason}", path.display()))
    } else {
        serde_json::from_str(&text).with_context(|| format!("parsing {} as JSON", path.display()))
    }
}

/// Read and import a schema.
pub fn load_schema(engine: &Engine, path: &Path) -> anyhow::Result<Descriptor> {
    let document = load_document(path)?;
    let descriptor = engine
        .import(&document)
        .with_context(|| format!("importing schema {}", path.display()))?;
    tracing::debug!(path = %path.display(), digest = %descriptor.digest().short(), "loaded schema");
    Ok(descriptor)
}
