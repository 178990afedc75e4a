//! # JSON Patch — RFC 6902 Operations With Inverses
//!
//! Every successful [`PatchOperation::apply`] returns the operations that
//! undo it, in the order they must be applied. Mutable carriers keep these
//! on an undo stack so a rejected batch can restore the last valid value.
//!
//! ## Invariant
//!
//! A failed operation leaves the document unchanged. `move` removes and
//! then adds; if the add fails the removal is undone before the error is
//! returned. [`apply_patch`] extends this to a whole patch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use schemata_core::pointer::parse_index;
use schemata_core::{json_equal, JsonPointer};

use crate::error::PatchError;

/// One RFC 6902 operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: JsonPointer, value: Value },
    Remove { path: JsonPointer },
    Replace { path: JsonPointer, value: Value },
    Copy { from: JsonPointer, path: JsonPointer },
    Move { from: JsonPointer, path: JsonPointer },
    Test { path: JsonPointer, value: Value },
}

impl PatchOperation {
    pub fn add(path: JsonPointer, value: Value) -> Self {
        Self::Add { path, value }
    }

    pub fn remove(path: JsonPointer) -> Self {
        Self::Remove { path }
    }

    pub fn replace(path: JsonPointer, value: Value) -> Self {
        Self::Replace { path, value }
    }

    /// The `op` member as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::Copy { .. } => "copy",
            Self::Move { .. } => "move",
            Self::Test { .. } => "test",
        }
    }

    /// The target location.
    pub fn path(&self) -> &JsonPointer {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Copy { path, .. }
            | Self::Move { path, .. }
            | Self::Test { path, .. } => path,
        }
    }

    /// Apply to `document`, returning the undo operations.
    ///
    /// # Errors
    ///
    /// Returns a [`PatchError`] and leaves `document` untouched when the
    /// operation does not apply.
    pub fn apply(&self, document: &mut Value) -> Result<Vec<PatchOperation>, PatchError> {
        match self {
            Self::Add { path, value } => add(document, path, value.clone()),
            Self::Remove { path } => remove(document, path).map(|(_, undo)| undo),
            Self::Replace { path, value } => {
                let slot = path.resolve_mut(document).ok_or_else(|| not_found(path))?;
                let previous = std::mem::replace(slot, value.clone());
                Ok(vec![Self::replace(path.clone(), previous)])
            }
            Self::Copy { from, path } => {
                let value = from.resolve(document).cloned().ok_or_else(|| not_found(from))?;
                add(document, path, value)
            }
            Self::Move { from, path } => {
                if from == path {
                    return Ok(Vec::new());
                }
                if from.is_ancestor_of(path) {
                    return Err(PatchError::MoveIntoChild {
                        from: from.to_string(),
                        path: path.to_string(),
                    });
                }
                let (value, restore) = remove(document, from)?;
                match add(document, path, value) {
                    Ok(mut undo) => {
                        undo.extend(restore);
                        Ok(undo)
                    }
                    Err(err) => {
                        undo_all(document, &restore);
                        Err(err)
                    }
                }
            }
            Self::Test { path, value } => {
                let found = path.resolve(document).ok_or_else(|| not_found(path))?;
                if json_equal(found, value) {
                    Ok(Vec::new())
                } else {
                    Err(PatchError::TestFailed { path: path.to_string() })
                }
            }
        }
    }
}

/// Apply `operations` in order, atomically.
///
/// Returns the undo operations for the whole patch. On failure every
/// operation already applied is undone before the error is returned.
pub fn apply_patch(document: &mut Value, operations: &[PatchOperation]) -> Result<Vec<PatchOperation>, PatchError> {
    let mut applied: Vec<Vec<PatchOperation>> = Vec::with_capacity(operations.len());
    for (index, operation) in operations.iter().enumerate() {
        match operation.apply(document) {
            Ok(undo) => applied.push(undo),
            Err(err) => {
                tracing::debug!(index, op = operation.name(), path = %operation.path(), error = %err, "patch failed, undoing");
                for undo in applied.iter().rev() {
                    undo_all(document, undo);
                }
                return Err(err);
            }
        }
    }
    Ok(applied.into_iter().rev().flatten().collect())
}

/// Apply undo operations, which are expected to succeed.
pub(crate) fn undo_all(document: &mut Value, undo: &[PatchOperation]) {
    for operation in undo {
        if let Err(err) = operation.apply(document) {
            tracing::warn!(op = operation.name(), path = %operation.path(), error = %err, "undo operation failed");
        }
    }
}

fn not_found(path: &JsonPointer) -> PatchError {
    PatchError::PathNotFound { path: path.to_string() }
}

fn add(document: &mut Value, path: &JsonPointer, value: Value) -> Result<Vec<PatchOperation>, PatchError> {
    let Some((parent, token)) = path.split_last() else {
        let previous = std::mem::replace(document, value);
        return Ok(vec![PatchOperation::replace(JsonPointer::root(), previous)]);
    };
    match parent.resolve_mut(document) {
        Some(Value::Object(map)) => match map.insert(token.to_string(), value) {
            Some(previous) => Ok(vec![PatchOperation::replace(path.clone(), previous)]),
            None => Ok(vec![PatchOperation::remove(path.clone())]),
        },
        Some(Value::Array(items)) => {
            if token == "-" {
                let appended = parent.join(items.len().to_string());
                items.push(value);
                return Ok(vec![PatchOperation::remove(appended)]);
            }
            match parse_index(token) {
                Some(index) if index <= items.len() => {
                    items.insert(index, value);
                    Ok(vec![PatchOperation::remove(path.clone())])
                }
                _ => Err(PatchError::InvalidIndex {
                    path: parent.to_string(),
                    index: token.to_string(),
                }),
            }
        }
        _ => Err(not_found(&parent)),
    }
}

fn remove(document: &mut Value, path: &JsonPointer) -> Result<(Value, Vec<PatchOperation>), PatchError> {
    let Some((parent, token)) = path.split_last() else {
        return Err(PatchError::RootRemoval);
    };
    let removed = match parent.resolve_mut(document) {
        Some(Value::Object(map)) => map.remove(token).ok_or_else(|| not_found(path))?,
        Some(Value::Array(items)) => match parse_index(token) {
            Some(index) if index < items.len() => items.remove(index),
            _ => {
                return Err(PatchError::InvalidIndex {
                    path: parent.to_string(),
                    index: token.to_string(),
                })
            }
        },
        _ => return Err(not_found(path)),
    };
    let undo = vec![PatchOperation::add(path.clone(), removed.clone())];
    Ok((removed, undo))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ptr(text: &str) -> JsonPointer {
        JsonPointer::parse(text).unwrap()
    }

    fn ops(value: Value) -> Vec<PatchOperation> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_wire_format() {
        let parsed = ops(json!([
            {"op": "add", "path": "/a/-", "value": 1},
            {"op": "move", "from": "/b", "path": "/c"}
        ]));
        assert_eq!(parsed[0], PatchOperation::add(ptr("/a/-"), json!(1)));
        assert_eq!(parsed[1].name(), "move");
        let back = serde_json::to_value(&parsed[1]).unwrap();
        assert_eq!(back, json!({"op": "move", "from": "/b", "path": "/c"}));
        assert!(serde_json::from_value::<PatchOperation>(json!({"op": "add", "path": "x", "value": 1})).is_err());
    }

    #[test]
    fn test_add_and_undo() {
        let mut doc = json!({"list": [1, 3], "k": "v"});
        let original = doc.clone();
        let undo = apply_patch(
            &mut doc,
            &ops(json!([
                {"op": "add", "path": "/list/1", "value": 2},
                {"op": "add", "path": "/list/-", "value": 4},
                {"op": "add", "path": "/k", "value": "w"},
                {"op": "add", "path": "/n", "value": null}
            ])),
        )
        .unwrap();
        assert_eq!(doc, json!({"list": [1, 2, 3, 4], "k": "w", "n": null}));
        undo_all(&mut doc, &undo);
        assert_eq!(doc, original);
    }

    #[test]
    fn test_add_index_bounds() {
        let mut doc = json!([1]);
        let err = PatchOperation::add(ptr("/2"), json!(0)).apply(&mut doc).unwrap_err();
        assert!(matches!(err, PatchError::InvalidIndex { .. }));
        PatchOperation::add(ptr("/1"), json!(2)).apply(&mut doc).unwrap();
        assert_eq!(doc, json!([1, 2]));
    }

    #[test]
    fn test_add_root_replaces_document() {
        let mut doc = json!({"a": 1});
        let undo = PatchOperation::add(JsonPointer::root(), json!([1])).apply(&mut doc).unwrap();
        assert_eq!(doc, json!([1]));
        undo_all(&mut doc, &undo);
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn test_remove_and_replace() {
        let mut doc = json!({"a": [1, 2], "b": 1});
        let undo = apply_patch(
            &mut doc,
            &ops(json!([
                {"op": "remove", "path": "/a/0"},
                {"op": "replace", "path": "/b", "value": 2}
            ])),
        )
        .unwrap();
        assert_eq!(doc, json!({"a": [2], "b": 2}));
        undo_all(&mut doc, &undo);
        assert_eq!(doc, json!({"a": [1, 2], "b": 1}));

        let err = PatchOperation::remove(JsonPointer::root()).apply(&mut doc).unwrap_err();
        assert_eq!(err, PatchError::RootRemoval);
        let err = PatchOperation::replace(ptr("/missing"), json!(1)).apply(&mut doc).unwrap_err();
        assert!(matches!(err, PatchError::PathNotFound { .. }));
    }

    #[test]
    fn test_copy_and_move() {
        let mut doc = json!({"a": {"x": 1}, "b": []});
        let undo = apply_patch(
            &mut doc,
            &ops(json!([
                {"op": "copy", "from": "/a/x", "path": "/b/-"},
                {"op": "move", "from": "/a", "path": "/c"}
            ])),
        )
        .unwrap();
        assert_eq!(doc, json!({"b": [1], "c": {"x": 1}}));
        undo_all(&mut doc, &undo);
        assert_eq!(doc, json!({"a": {"x": 1}, "b": []}));
    }

    #[test]
    fn test_move_into_child_rejected() {
        let mut doc = json!({"a": {"b": 1}});
        let err = ops(json!([{"op": "move", "from": "/a", "path": "/a/b/c"}]))[0]
            .apply(&mut doc)
            .unwrap_err();
        assert!(matches!(err, PatchError::MoveIntoChild { .. }));
        assert_eq!(doc, json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_failed_move_restores_source() {
        let mut doc = json!({"a": 1, "b": 2});
        let err = ops(json!([{"op": "move", "from": "/a", "path": "/missing/x"}]))[0]
            .apply(&mut doc)
            .unwrap_err();
        assert!(matches!(err, PatchError::PathNotFound { .. }));
        assert_eq!(doc, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_test_operation_uses_numeric_equality() {
        let mut doc = json!({"n": 1});
        assert!(ops(json!([{"op": "test", "path": "/n", "value": 1.0}]))[0].apply(&mut doc).is_ok());
        let err = ops(json!([{"op": "test", "path": "/n", "value": 2}]))[0].apply(&mut doc).unwrap_err();
        assert_eq!(err, PatchError::TestFailed { path: "/n".into() });
    }

    #[test]
    fn test_patch_is_atomic() {
        let mut doc = json!({"a": [1]});
        let err = apply_patch(
            &mut doc,
            &ops(json!([
                {"op": "add", "path": "/a/-", "value": 2},
                {"op": "remove", "path": "/a/0"},
                {"op": "test", "path": "/a/0", "value": 1}
            ])),
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::TestFailed { .. }));
        assert_eq!(doc, json!({"a": [1]}));
    }
}
