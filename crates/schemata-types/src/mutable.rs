//! # Mutable Carriers — Validated Lists and Dicts
//!
//! [`MutableList`] and [`MutableDict`] hold a value that always validates
//! against their descriptor. Every change is a JSON Patch operation whose
//! inverse goes onto an undo stack.
//!
//! ## Batches
//!
//! A [`Batch`] groups changes under one validation. Batches nest; only the
//! outermost exit validates. While a batch is open the descriptor is held
//! on this thread, so builds of it defer validation too. On exit the value
//! is validated once: success commits, failure rolls back every change
//! since the outermost batch opened. Dropping a batch without calling
//! [`Batch::exit`] rolls back to where that batch opened.
//!
//! Single operations on the carriers run as one-operation batches. Values
//! are written as given; they are not coerced through item schemas.

use serde_json::Value;

use schemata_core::JsonPointer;

use crate::carrier::Carrier;
use crate::descriptor::Descriptor;
use crate::error::{BuildError, MutationError, PatchError};
use crate::hold::HoldGuard;
use crate::patch::{apply_patch, PatchOperation};

/// Value, descriptor and undo stack shared by both carriers.
#[derive(Debug)]
struct Tracked {
    descriptor: Descriptor,
    value: Value,
    /// Undo operations; popping from the end reverses the latest change.
    undo: Vec<PatchOperation>,
    depth: usize,
}

impl Tracked {
    fn new(descriptor: &Descriptor, carrier: Carrier, value: Value) -> Result<Self, BuildError> {
        if descriptor.carrier() != carrier {
            return Err(BuildError::coercion(
                carrier,
                &descriptor.to_value(),
                format!("descriptor carries {}", descriptor.carrier()),
            ));
        }
        let instance = descriptor.call(value)?;
        Ok(Self {
            descriptor: descriptor.clone(),
            value: instance.into_value(),
            undo: Vec::new(),
            depth: 0,
        })
    }

    fn record(&mut self, undo: Vec<PatchOperation>) {
        self.undo.extend(undo.into_iter().rev());
    }

    fn rollback(&mut self, mark: usize) {
        let undone = self.undo.len().saturating_sub(mark);
        while self.undo.len() > mark {
            if let Some(operation) = self.undo.pop() {
                if let Err(err) = operation.apply(&mut self.value) {
                    tracing::warn!(op = operation.name(), path = %operation.path(), error = %err, "undo operation failed");
                }
            }
        }
        if undone > 0 {
            tracing::debug!(digest = %self.descriptor.digest().short(), undone, "rolled back mutation");
        }
    }

    fn transact<F, T>(&mut self, change: F) -> Result<T, MutationError>
    where
        F: FnOnce(&mut Batch<'_>) -> Result<T, MutationError>,
    {
        let mut batch = Batch::open(self);
        let out = change(&mut batch)?;
        batch.exit()?;
        Ok(out)
    }
}

/// A group of changes validated once on exit.
#[must_use = "dropping a batch without exit() rolls it back"]
pub struct Batch<'a> {
    state: &'a mut Tracked,
    mark: usize,
    hold: Option<HoldGuard>,
    finished: bool,
}

impl<'a> Batch<'a> {
    fn open(state: &'a mut Tracked) -> Self {
        state.depth += 1;
        let hold = (state.depth == 1).then(|| state.descriptor.hold());
        let mark = state.undo.len();
        Self {
            state,
            mark,
            hold,
            finished: false,
        }
    }

    /// The value including changes made so far.
    pub fn value(&self) -> &Value {
        &self.state.value
    }

    /// Nesting depth of this batch, 1 for the outermost.
    pub fn depth(&self) -> usize {
        self.state.depth
    }

    /// Open a batch inside this one.
    pub fn nested(&mut self) -> Batch<'_> {
        Batch::open(self.state)
    }

    /// Apply one operation. A failed operation changes nothing.
    pub fn apply(&mut self, operation: &PatchOperation) -> Result<(), MutationError> {
        let undo = operation.apply(&mut self.state.value)?;
        self.state.record(undo);
        Ok(())
    }

    /// Apply a patch. A failed patch changes nothing.
    pub fn patch(&mut self, operations: &[PatchOperation]) -> Result<(), MutationError> {
        let undo = apply_patch(&mut self.state.value, operations)?;
        self.state.record(undo);
        Ok(())
    }

    pub fn add(&mut self, path: JsonPointer, value: Value) -> Result<(), MutationError> {
        self.apply(&PatchOperation::add(path, value))
    }

    pub fn remove(&mut self, path: JsonPointer) -> Result<(), MutationError> {
        self.apply(&PatchOperation::remove(path))
    }

    pub fn replace(&mut self, path: JsonPointer, value: Value) -> Result<(), MutationError> {
        self.apply(&PatchOperation::replace(path, value))
    }

    /// Append to the root sequence.
    pub fn append(&mut self, value: Value) -> Result<(), MutationError> {
        self.add(JsonPointer::root().join("-"), value)
    }

    /// Set a key of the root mapping.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Result<(), MutationError> {
        self.add(JsonPointer::root().join(key), value)
    }

    /// Close the batch. The outermost exit validates the value and either
    /// commits or rolls back everything since it opened.
    ///
    /// # Errors
    ///
    /// `MutationError::Rejected` when validation fails; the value is then
    /// back to what it was when the outermost batch opened.
    pub fn exit(mut self) -> Result<(), MutationError> {
        self.finished = true;
        self.state.depth -= 1;
        if self.state.depth > 0 {
            return Ok(());
        }
        drop(self.hold.take());
        let state = &mut *self.state;
        match state.descriptor.validate(&state.value) {
            Ok(()) => {
                state.undo.clear();
                Ok(())
            }
            Err(err) => {
                tracing::debug!(digest = %state.descriptor.digest().short(), error = %err, "batch rejected");
                state.rollback(self.mark);
                Err(MutationError::Rejected(err))
            }
        }
    }
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.state.rollback(self.mark);
        self.state.depth -= 1;
    }
}

/// A sequence that stays valid against its descriptor.
#[derive(Debug)]
pub struct MutableList {
    state: Tracked,
}

impl MutableList {
    /// Build the initial value through `descriptor`, which must carry a
    /// sequence.
    pub fn new(descriptor: &Descriptor, value: Value) -> Result<Self, BuildError> {
        Ok(Self {
            state: Tracked::new(descriptor, Carrier::Sequence, value)?,
        })
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.state.descriptor
    }

    pub fn value(&self) -> &Value {
        &self.state.value
    }

    pub fn into_value(self) -> Value {
        self.state.value
    }

    pub fn len(&self) -> usize {
        self.state.value.as_array().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.state.value.get(index)
    }

    /// Look up a nested value.
    pub fn resolve(&self, pointer: &JsonPointer) -> Option<&Value> {
        pointer.resolve(&self.state.value)
    }

    pub fn batch(&mut self) -> Batch<'_> {
        Batch::open(&mut self.state)
    }

    pub fn append(&mut self, value: Value) -> Result<(), MutationError> {
        self.state.transact(|batch| batch.append(value))
    }

    /// Append several values under one validation.
    pub fn extend<I>(&mut self, values: I) -> Result<(), MutationError>
    where
        I: IntoIterator<Item = Value>,
    {
        self.state.transact(|batch| values.into_iter().try_for_each(|value| batch.append(value)))
    }

    pub fn insert(&mut self, index: usize, value: Value) -> Result<(), MutationError> {
        self.state.transact(|batch| batch.add(index_pointer(index), value))
    }

    pub fn set(&mut self, index: usize, value: Value) -> Result<(), MutationError> {
        self.state.transact(|batch| batch.replace(index_pointer(index), value))
    }

    /// Remove and return the value at `index`.
    pub fn remove(&mut self, index: usize) -> Result<Value, MutationError> {
        let removed = self.get(index).cloned().ok_or_else(|| PatchError::InvalidIndex {
            path: String::new(),
            index: index.to_string(),
        })?;
        self.state.transact(|batch| batch.remove(index_pointer(index)))?;
        Ok(removed)
    }

    pub fn pop(&mut self) -> Result<Option<Value>, MutationError> {
        match self.len() {
            0 => Ok(None),
            n => self.remove(n - 1).map(Some),
        }
    }

    /// Apply a patch under one validation.
    pub fn patch(&mut self, operations: &[PatchOperation]) -> Result<(), MutationError> {
        self.state.transact(|batch| batch.patch(operations))
    }
}

/// A mapping that stays valid against its descriptor.
#[derive(Debug)]
pub struct MutableDict {
    state: Tracked,
}

impl MutableDict {
    /// Build the initial value through `descriptor`, which must carry a
    /// mapping.
    pub fn new(descriptor: &Descriptor, value: Value) -> Result<Self, BuildError> {
        Ok(Self {
            state: Tracked::new(descriptor, Carrier::Mapping, value)?,
        })
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.state.descriptor
    }

    pub fn value(&self) -> &Value {
        &self.state.value
    }

    pub fn into_value(self) -> Value {
        self.state.value
    }

    pub fn len(&self) -> usize {
        self.state.value.as_object().map_or(0, serde_json::Map::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.value.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn resolve(&self, pointer: &JsonPointer) -> Option<&Value> {
        pointer.resolve(&self.state.value)
    }

    pub fn batch(&mut self) -> Batch<'_> {
        Batch::open(&mut self.state)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Result<(), MutationError> {
        self.state.transact(|batch| batch.set(key, value))
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, MutationError> {
        let Some(removed) = self.get(key).cloned() else {
            return Ok(None);
        };
        self.state.transact(|batch| batch.remove(JsonPointer::root().join(key)))?;
        Ok(Some(removed))
    }

    /// Set several keys under one validation.
    pub fn update<I, K>(&mut self, entries: I) -> Result<(), MutationError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.state.transact(|batch| entries.into_iter().try_for_each(|(key, value)| batch.set(key, value)))
    }

    pub fn patch(&mut self, operations: &[PatchOperation]) -> Result<(), MutationError> {
        self.state.transact(|batch| batch.patch(operations))
    }
}

fn index_pointer(index: usize) -> JsonPointer {
    JsonPointer::root().join(index.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use crate::hold::is_held;
    use schemata_core::ErrorKind;
    use serde_json::json;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default())
    }

    #[test]
    fn test_requires_matching_carrier() {
        let engine = engine();
        let int = engine.integer().unwrap();
        assert!(MutableList::new(&int, json!(1)).is_err());
        assert!(MutableDict::new(&int, json!(1)).is_err());
        let texts = engine.list(&engine.text().unwrap()).unwrap();
        let err = MutableList::new(&texts, json!([[]])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_rejected_append_rolls_back() {
        let engine = engine();
        let texts = engine.list(&engine.text().unwrap()).unwrap();
        let mut list = MutableList::new(&texts, json!(["a", "b"])).unwrap();
        let err = list.append(json!(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(list.value(), &json!(["a", "b"]));
        list.append(json!("c")).unwrap();
        assert_eq!(list.value(), &json!(["a", "b", "c"]));
    }

    #[test]
    fn test_list_operations() {
        let engine = engine();
        let ints = engine.list(&engine.integer().unwrap()).unwrap();
        let mut list = MutableList::new(&ints, json!([])).unwrap();
        list.extend([json!(1), json!(3)]).unwrap();
        list.insert(1, json!(2)).unwrap();
        list.set(0, json!(0)).unwrap();
        assert_eq!(list.value(), &json!([0, 2, 3]));
        assert_eq!(list.remove(1).unwrap(), json!(2));
        assert_eq!(list.pop().unwrap(), Some(json!(3)));
        assert_eq!(list.len(), 1);
        assert_eq!(list.resolve(&JsonPointer::parse("/0").unwrap()), Some(&json!(0)));
        assert_eq!(list.remove(5).unwrap_err().kind(), ErrorKind::PatchFailed);
        assert_eq!(list.insert(9, json!(1)).unwrap_err().kind(), ErrorKind::PatchFailed);
        assert_eq!(list.into_value(), json!([0]));
    }

    #[test]
    fn test_extend_is_one_validation() {
        let engine = engine();
        let bounded = engine
            .descriptor(&json!({"type": "array", "items": {"type": "integer"}, "maxItems": 2}))
            .unwrap();
        let mut list = MutableList::new(&bounded, json!([1])).unwrap();
        let err = list.extend([json!(2), json!(3)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        assert_eq!(list.value(), &json!([1]));
    }

    #[test]
    fn test_batch_validates_once_on_exit() {
        let engine = engine();
        let pair = engine
            .descriptor(&json!({"type": "array", "items": {"type": "integer"}, "minItems": 2}))
            .unwrap();
        let mut list = MutableList::new(&pair, json!([1, 2])).unwrap();
        let mut batch = list.batch();
        batch.remove(JsonPointer::parse("/0").unwrap()).unwrap();
        assert_eq!(batch.value(), &json!([2]));
        assert!(is_held(pair.digest()));
        batch.append(json!(3)).unwrap();
        batch.exit().unwrap();
        assert!(!is_held(pair.digest()));
        assert_eq!(list.value(), &json!([2, 3]));
    }

    #[test]
    fn test_nested_batches_roll_back_together() {
        let engine = engine();
        let ints = engine.list(&engine.integer().unwrap()).unwrap();
        let mut list = MutableList::new(&ints, json!([1])).unwrap();
        let mut outer = list.batch();
        outer.append(json!(2)).unwrap();
        {
            let mut inner = outer.nested();
            assert_eq!(inner.depth(), 2);
            inner.append(json!("x")).unwrap();
            inner.exit().unwrap();
        }
        assert_eq!(outer.value(), &json!([1, 2, "x"]));
        let err = outer.exit().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(list.value(), &json!([1]));
    }

    #[test]
    fn test_dropped_batch_rolls_back() {
        let engine = engine();
        let ints = engine.list(&engine.integer().unwrap()).unwrap();
        let mut list = MutableList::new(&ints, json!([1])).unwrap();
        {
            let mut outer = list.batch();
            outer.append(json!(2)).unwrap();
            {
                let mut inner = outer.nested();
                inner.append(json!(3)).unwrap();
            }
            assert_eq!(outer.value(), &json!([1, 2]));
            outer.exit().unwrap();
        }
        assert_eq!(list.value(), &json!([1, 2]));
        {
            let mut abandoned = list.batch();
            abandoned.append(json!(9)).unwrap();
        }
        assert_eq!(list.value(), &json!([1, 2]));
        assert!(!is_held(ints.digest()));
    }

    #[test]
    fn test_failed_patch_changes_nothing() {
        let engine = engine();
        let ints = engine.list(&engine.integer().unwrap()).unwrap();
        let mut list = MutableList::new(&ints, json!([1, 2])).unwrap();
        let ops: Vec<PatchOperation> = serde_json::from_value(json!([
            {"op": "add", "path": "/-", "value": 3},
            {"op": "test", "path": "/0", "value": 5}
        ]))
        .unwrap();
        assert_eq!(list.patch(&ops).unwrap_err().kind(), ErrorKind::PatchFailed);
        assert_eq!(list.value(), &json!([1, 2]));
    }

    #[test]
    fn test_dict_operations() {
        let engine = engine();
        let config = engine
            .object()
            .property("name", &engine.text().unwrap())
            .property("port", &engine.integer().unwrap())
            .required("name")
            .intern()
            .unwrap();
        let mut dict = MutableDict::new(&config, json!({"name": "svc"})).unwrap();
        dict.set("port", json!(80)).unwrap();
        assert!(dict.contains_key("port"));
        assert_eq!(dict.set("port", json!("eighty")).unwrap_err().kind(), ErrorKind::TypeMismatch);
        assert_eq!(dict.get("port"), Some(&json!(80)));
        assert_eq!(dict.remove("name").unwrap_err().kind(), ErrorKind::RequiredMissing);
        assert_eq!(dict.remove("port").unwrap(), Some(json!(80)));
        assert_eq!(dict.remove("port").unwrap(), None);
        dict.update([("name", json!("api")), ("port", json!(8080))]).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.into_value(), json!({"name": "api", "port": 8080}));
    }
}
