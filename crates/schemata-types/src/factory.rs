//! # Instance Factory
//!
//! `Descriptor::build` turns arguments into a tagged [`Instance`]:
//!
//! 1. **Resolve input.** One positional value is the input; several build
//!    a sequence. With none, the default is resolved: `const`, `default`,
//!    the first `enum` value, a mapping composed from property defaults,
//!    the first union branch's default, then the carrier's zero value.
//!    Property defaults nest: an object property without its own default
//!    contributes the mapping composed from its properties, and a tuple
//!    takes the longest prefix of positions that declare a default.
//!    Named values merge into a mapping input.
//! 2. **Cast chain.** Each `$cast` step runs left to right: a registered
//!    cast function, a defined descriptor named by the step, or an inline
//!    schema. A name that is neither fails with `UnresolvedForward`.
//! 3. **Coerce.** `$ref` targets construct first, then the carrier coerces.
//!    Under Draft 7 a schema holding `$ref` stops there, since its other
//!    keywords are not in effect. Mappings gain the missing keys that
//!    `required` or the dependencies of present keys call for, where the
//!    property declares a default, inserted in dependency order. Property values and items
//!    are coerced by their own subschemas when possible.
//! 4. **Composites.** `allOf` branches chain, `if` picks `then` or `else`,
//!    and `anyOf`/`oneOf` prefer a branch that accepts the value unchanged
//!    before trying each branch's own construction. The accepting branch
//!    is recorded on the instance.
//! 5. **Validate**, unless a hold on the descriptor is active on this
//!    thread.
//!
//! Nested coercion is best effort: a subvalue that cannot be coerced is
//! left as it is, and the final validation reports it with its path.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use schemata_core::pointer::parse_index;
use schemata_core::{Draft, Frozen, JsonPointer, Keyword, Schema};
use schemata_validate::MAX_REFERENCE_DEPTH;

use crate::carrier::Carrier;
use crate::descriptor::Descriptor;
use crate::error::BuildError;
use crate::hold::is_held;
use crate::instance::Instance;

/// Positional and named construction arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    named: Map<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional value.
    pub fn arg(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    /// Set a named value.
    pub fn named(mut self, key: impl Into<String>, value: Value) -> Self {
        self.named.insert(key.into(), value);
        self
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn named_values(&self) -> &Map<String, Value> {
        &self.named
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

impl From<Value> for Args {
    fn from(value: Value) -> Self {
        Self::new().arg(value)
    }
}

impl Descriptor {
    /// Build an instance from `args`.
    ///
    /// # Errors
    ///
    /// `Coercion`/`Cast` when the input cannot be turned into the carrier,
    /// `UnresolvedForward` for unknown cast names or references,
    /// `CyclicDependency` when filling a mapping needs an ordering that
    /// does not exist, and `Invalid` when the result does not validate.
    pub fn build(&self, args: impl Into<Args>) -> Result<Instance, BuildError> {
        let input = self.resolve_input(args.into())?;
        let (value, branch) = self.construct(input, self, 0)?;
        self.check(&value)?;
        Ok(Instance::new(value, self, branch))
    }

    /// Build from a single value.
    pub fn call(&self, value: Value) -> Result<Instance, BuildError> {
        self.build(Args::from(value))
    }

    /// Build with validation deferred to a single check at the end.
    pub fn verified(&self, args: impl Into<Args>) -> Result<Instance, BuildError> {
        let instance = {
            let _hold = self.hold();
            self.build(args)?
        };
        self.validate(instance.value())?;
        Ok(instance)
    }

    /// Build from `value` and validate even if a hold is active.
    pub fn cast(&self, value: Value) -> Result<Instance, BuildError> {
        let instance = self.call(value)?;
        self.validate(instance.value())?;
        Ok(instance)
    }

    /// The value built when no input is given.
    pub fn default_value(&self) -> Result<Value, BuildError> {
        let schema = self.schema();
        if let Some(value) = schema.keyword(Keyword::Const).or_else(|| schema.keyword(Keyword::Default)) {
            return Ok(value.to_value());
        }
        if let Some(first) = schema.keyword(Keyword::Enum).and_then(Frozen::as_seq).and_then(<[Frozen]>::first) {
            return Ok(first.to_value());
        }
        if let Some(composed) = self.composed_default()? {
            return Ok(composed);
        }
        for keyword in [Keyword::AnyOf, Keyword::OneOf] {
            if let Some(first) = self.branches_of(keyword)?.first() {
                return first.default_value();
            }
        }
        Ok(self.carrier().zero())
    }

    /// The default a schema declares, directly or through its properties
    /// or tuple positions. `None` when nothing below it declares one.
    fn declared_default(&self) -> Result<Option<Value>, BuildError> {
        let schema = self.schema();
        if let Some(value) = schema.keyword(Keyword::Const).or_else(|| schema.keyword(Keyword::Default)) {
            return Ok(Some(value.to_value()));
        }
        self.composed_default()
    }

    fn composed_default(&self) -> Result<Option<Value>, BuildError> {
        let schema = self.schema();
        match self.carrier() {
            Carrier::Mapping => {
                let seed = properties(schema).map(|props| props.keys().cloned().collect()).unwrap_or_default();
                let mut map = Map::new();
                self.fill_mapping(&mut map, seed)?;
                Ok((!map.is_empty()).then_some(Value::Object(map)))
            }
            Carrier::Sequence => {
                let Some(positions) = schema.keyword(Keyword::Items).and_then(Frozen::as_seq) else {
                    return Ok(None);
                };
                let mut items = Vec::new();
                for position in positions {
                    match self.engine().intern_frozen(position)?.declared_default()? {
                        Some(item) => items.push(item),
                        None => break,
                    }
                }
                Ok((!items.is_empty()).then_some(Value::Array(items)))
            }
            _ => Ok(None),
        }
    }

    fn check(&self, value: &Value) -> Result<(), BuildError> {
        if is_held(self.digest()) {
            tracing::trace!(digest = %self.digest().short(), "validation deferred by hold");
            return Ok(());
        }
        Ok(self.validate(value)?)
    }

    fn resolve_input(&self, args: Args) -> Result<Value, BuildError> {
        let Args { mut positional, named } = args;
        let base = match positional.len() {
            0 => None,
            1 => positional.pop(),
            _ if self.carrier() == Carrier::Sequence => Some(Value::Array(positional)),
            n => {
                return Err(BuildError::coercion(
                    self.carrier(),
                    &Value::Array(positional),
                    format!("expected one positional value, found {n}"),
                ))
            }
        };
        if named.is_empty() {
            return match base {
                Some(value) => Ok(value),
                None => self.default_value(),
            };
        }
        let start = match base {
            Some(value) => value,
            None => self.default_value()?,
        };
        match start {
            Value::Object(mut map) => {
                map.extend(named);
                Ok(Value::Object(map))
            }
            Value::Null if matches!(self.carrier(), Carrier::Mapping | Carrier::None) => Ok(Value::Object(named)),
            other => Err(BuildError::coercion(self.carrier(), &other, "named values need a mapping")),
        }
    }

    /// Construct and validate without an instance wrapper.
    fn build_value(&self, value: Value, root: &Descriptor, depth: usize) -> Result<Value, BuildError> {
        let (value, _) = self.construct(value, root, depth)?;
        self.check(&value)?;
        Ok(value)
    }

    /// Everything `build` does except the final validation. Local
    /// references resolve against `root`.
    pub(crate) fn construct(&self, value: Value, root: &Descriptor, depth: usize) -> Result<(Value, Option<Descriptor>), BuildError> {
        if depth > MAX_REFERENCE_DEPTH {
            tracing::warn!(digest = %self.digest().short(), "construction nests too deeply, passing value through");
            return Ok((value, None));
        }
        let schema = self.schema();
        let mut value = value;

        if let Some(chain) = schema.keyword(Keyword::Cast).and_then(Frozen::as_seq) {
            for step in chain {
                value = self.cast_step(step, value, root, depth)?;
            }
        }

        if let Some(reference) = schema.keyword(Keyword::Ref).and_then(Frozen::as_str) {
            if let Some((target, scope)) = self.reference_target(reference, root)? {
                value = target.construct(value, &scope, depth + 1)?.0;
            }
            if self.engine().config().draft == Draft::Draft7 {
                return Ok((value, None));
            }
        }

        value = match self.carrier().coerce(value)? {
            Value::Object(mut map) => {
                let missing: BTreeSet<String> = schema
                    .keyword(Keyword::Required)
                    .and_then(Frozen::as_seq)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Frozen::as_str)
                    .filter(|name| !map.contains_key(*name))
                    .map(str::to_string)
                    .collect();
                self.fill_mapping(&mut map, missing)?;
                self.construct_properties(&mut map, root, depth)?;
                Value::Object(map)
            }
            Value::Array(mut items) => {
                self.construct_items(&mut items, root, depth)?;
                Value::Array(items)
            }
            other => other,
        };

        self.construct_composites(value, root, depth)
    }

    fn cast_step(&self, step: &Frozen, value: Value, root: &Descriptor, depth: usize) -> Result<Value, BuildError> {
        let engine = self.engine();
        let Some(name) = step.as_str() else {
            return engine.intern_frozen(step)?.build_value(value, root, depth + 1);
        };
        if let Some(cast) = engine.casts().get(name) {
            return cast(value).map_err(|reason| BuildError::Cast {
                name: name.to_string(),
                reason,
            });
        }
        match engine.resolve_named(name)? {
            Some(target) => target.build_value(value, &target, depth + 1),
            None => Err(BuildError::UnresolvedForward { name: name.to_string() }),
        }
    }

    /// The descriptor a `$ref` points at, with the root its own local
    /// references resolve against. A local pointer that does not resolve
    /// yields `None`.
    fn reference_target(&self, reference: &str, root: &Descriptor) -> Result<Option<(Descriptor, Descriptor)>, BuildError> {
        let engine = self.engine();
        let (base, fragment) = reference.split_once('#').unwrap_or((reference, ""));
        let pointer = JsonPointer::parse(fragment)?;
        let root = if base.is_empty() {
            root.clone()
        } else {
            engine
                .resolve_named(base)?
                .ok_or_else(|| BuildError::UnresolvedForward { name: base.to_string() })?
        };
        if pointer.is_root() {
            return Ok(Some((root.clone(), root)));
        }
        match follow(&root.schema().to_frozen(), &pointer) {
            Some(target) => Ok(Some((engine.intern_frozen(&target)?, root))),
            None => Ok(None),
        }
    }

    fn construct_properties(&self, map: &mut Map<String, Value>, root: &Descriptor, depth: usize) -> Result<(), BuildError> {
        let schema = self.schema();
        let declared = properties(schema);
        let additional = schema
            .keyword(Keyword::AdditionalProperties)
            .filter(|_| !schema.contains(Keyword::PatternProperties.as_str()));
        for (key, slot) in map.iter_mut() {
            let Some(subschema) = declared.and_then(|p| p.get(key)).or(additional) else {
                continue;
            };
            let target = self.engine().intern_frozen(subschema)?;
            *slot = attempt(&target, std::mem::take(slot), root, depth)?;
        }
        Ok(())
    }

    fn construct_items(&self, items: &mut [Value], root: &Descriptor, depth: usize) -> Result<(), BuildError> {
        let schema = self.schema();
        let engine = self.engine();
        match schema.keyword(Keyword::Items) {
            Some(Frozen::Seq(positions)) => {
                let rest = schema.keyword(Keyword::AdditionalItems).map(|s| engine.intern_frozen(s)).transpose()?;
                for (index, item) in items.iter_mut().enumerate() {
                    let target = match positions.get(index) {
                        Some(subschema) => engine.intern_frozen(subschema)?,
                        None => match &rest {
                            Some(rest) => rest.clone(),
                            None => break,
                        },
                    };
                    *item = attempt(&target, std::mem::take(item), root, depth)?;
                }
            }
            Some(subschema) => {
                let target = engine.intern_frozen(subschema)?;
                for item in items.iter_mut() {
                    *item = attempt(&target, std::mem::take(item), root, depth)?;
                }
            }
            None => {}
        }
        Ok(())
    }

    fn construct_composites(&self, value: Value, root: &Descriptor, depth: usize) -> Result<(Value, Option<Descriptor>), BuildError> {
        let schema = self.schema();
        let engine = self.engine();
        let mut value = value;

        for branch in self.branches_of(Keyword::AllOf)? {
            value = attempt(&branch, value, root, depth)?;
        }

        if let Some(condition) = schema.keyword(Keyword::If) {
            let selected = if engine.intern_frozen(condition)?.is_valid(&value) {
                Keyword::Then
            } else {
                Keyword::Else
            };
            if let Some(subschema) = schema.keyword(selected) {
                value = attempt(&engine.intern_frozen(subschema)?, value, root, depth)?;
            }
        }

        let mut accepted = None;
        for keyword in [Keyword::AnyOf, Keyword::OneOf] {
            let branches = self.branches_of(keyword)?;
            if branches.is_empty() {
                continue;
            }
            if let Some(branch) = branches.iter().find(|b| b.is_valid(&value)) {
                accepted = Some(branch.clone());
                continue;
            }
            for branch in branches {
                if let Ok((built, _)) = branch.construct(value.clone(), root, depth + 1) {
                    if branch.is_valid(&built) {
                        value = built;
                        accepted = Some(branch);
                        break;
                    }
                }
            }
        }
        Ok((value, accepted))
    }

    /// Insert declared defaults for the `seed` keys and for every key the
    /// dependencies of present or inserted keys require.
    fn fill_mapping(&self, map: &mut Map<String, Value>, seed: BTreeSet<String>) -> Result<(), BuildError> {
        let schema = self.schema();
        let Some(declared) = properties(schema) else {
            return Ok(());
        };
        let graph = dependency_graph(schema);
        let mut targets = seed;
        let mut visited = BTreeSet::new();
        let mut frontier: Vec<String> = map.keys().cloned().chain(targets.iter().cloned()).collect();
        while let Some(key) = frontier.pop() {
            if !visited.insert(key.clone()) {
                continue;
            }
            for dependency in graph.get(&key).into_iter().flatten() {
                if !map.contains_key(dependency) {
                    targets.insert(dependency.clone());
                }
                frontier.push(dependency.clone());
            }
        }

        let mut defaults: BTreeMap<String, Value> = BTreeMap::new();
        for key in targets {
            let Some(subschema) = declared.get(&key).filter(|_| !map.contains_key(&key)) else {
                continue;
            };
            if let Some(value) = self.engine().intern_frozen(subschema)?.declared_default()? {
                defaults.insert(key, value);
            }
        }
        if defaults.is_empty() {
            return Ok(());
        }
        let keys: BTreeSet<String> = defaults.keys().cloned().collect();
        for key in dependency_order(&graph, &keys)? {
            if let Some(value) = defaults.remove(&key) {
                tracing::trace!(key = %key, "filled mapping key from default");
                map.insert(key, value);
            }
        }
        Ok(())
    }
}

/// Construct `value` through `target`, keeping the input when it cannot
/// be coerced. Structural failures propagate.
fn attempt(target: &Descriptor, value: Value, root: &Descriptor, depth: usize) -> Result<Value, BuildError> {
    match target.construct(value.clone(), root, depth + 1) {
        Ok((built, _)) => Ok(built),
        Err(BuildError::Coercion { .. } | BuildError::Cast { .. }) => Ok(value),
        Err(other) => Err(other),
    }
}

fn properties(schema: &Schema) -> Option<&schemata_core::FrozenMap> {
    schema.keyword(Keyword::Properties).and_then(Frozen::as_map)
}

fn follow(root: &Frozen, pointer: &JsonPointer) -> Option<Frozen> {
    pointer
        .tokens()
        .iter()
        .try_fold(root, |node, token| match node {
            Frozen::Map(map) => map.get(token),
            Frozen::Seq(items) => parse_index(token).and_then(|i| items.get(i)),
            _ => None,
        })
        .cloned()
}

/// Key → keys it requires, from `dependencies` (list form, or the
/// `required` of schema form) and `dependentRequired`.
fn dependency_graph(schema: &Schema) -> BTreeMap<String, Vec<String>> {
    let mut graph: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for keyword in [Keyword::Dependencies, Keyword::DependentRequired] {
        let Some(entries) = schema.keyword(keyword).and_then(Frozen::as_map) else {
            continue;
        };
        for (key, dependency) in entries {
            let names = dependency
                .as_seq()
                .or_else(|| dependency.get(Keyword::Required.as_str()).and_then(Frozen::as_seq))
                .unwrap_or_default();
            let edges = graph.entry(key.clone()).or_default();
            for name in names.iter().filter_map(Frozen::as_str) {
                if name != key && !edges.iter().any(|e| e == name) {
                    edges.push(name.to_string());
                }
            }
        }
    }
    graph
}

/// Order `keys` and everything they transitively require so that every
/// key comes after its requirements.
fn dependency_order(graph: &BTreeMap<String, Vec<String>>, keys: &BTreeSet<String>) -> Result<Vec<String>, BuildError> {
    let mut nodes: BTreeSet<&str> = BTreeSet::new();
    let mut frontier: Vec<&str> = keys.iter().map(String::as_str).collect();
    while let Some(node) = frontier.pop() {
        if nodes.insert(node) {
            if let Some(edges) = graph.get(node) {
                frontier.extend(edges.iter().map(String::as_str));
            }
        }
    }

    let mut pending: BTreeMap<&str, BTreeSet<&str>> = nodes
        .iter()
        .map(|node| {
            let edges = graph
                .get(*node)
                .map(|edges| edges.iter().map(String::as_str).collect())
                .unwrap_or_default();
            (*node, edges)
        })
        .collect();

    let mut order = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready: Vec<&str> = pending
            .iter()
            .filter(|(_, edges)| edges.is_empty())
            .map(|(node, _)| *node)
            .collect();
        if ready.is_empty() {
            let keys: Vec<String> = pending.keys().map(|k| k.to_string()).collect();
            tracing::debug!(keys = ?keys, "dependency cycle");
            return Err(BuildError::CyclicDependency { keys });
        }
        for node in &ready {
            pending.remove(node);
        }
        for edges in pending.values_mut() {
            for node in &ready {
                edges.remove(node);
            }
        }
        order.extend(ready.into_iter().map(str::to_string));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::Engine;
    use schemata_core::ErrorKind;
    use serde_json::json;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default())
    }

    #[test]
    fn test_carrier_coercion() {
        let engine = engine();
        let int = engine.integer().unwrap();
        assert_eq!(int.call(json!("42")).unwrap(), json!(42));
        let err = int.call(json!("forty-two")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CoercionFailure);
    }

    #[test]
    fn test_default_resolution_order() {
        let engine = engine();
        let d = |v| engine.descriptor(&v).unwrap();
        assert_eq!(d(json!({"const": 3, "default": 4})).default_value().unwrap(), json!(3));
        assert_eq!(d(json!({"default": 4, "enum": [5, 4]})).default_value().unwrap(), json!(4));
        assert_eq!(d(json!({"enum": [5, 4]})).default_value().unwrap(), json!(5));
        assert_eq!(d(json!({"type": "string"})).default_value().unwrap(), json!(""));
        assert_eq!(
            d(json!({"anyOf": [{"type": "integer", "default": 9}, {"type": "string"}]}))
                .default_value()
                .unwrap(),
            json!(9)
        );
        assert_eq!(
            d(json!({
                "type": "object",
                "properties": {"a": {"default": 1}, "b": {"type": "string"}, "c": {"const": true}}
            }))
            .default_value()
            .unwrap(),
            json!({"a": 1, "c": true})
        );
    }

    #[test]
    fn test_nested_defaults_compose() {
        let engine = engine();
        let d = |v| engine.descriptor(&v).unwrap();
        let nested = d(json!({
            "type": "object",
            "properties": {"inner": {"type": "object", "properties": {"x": {"default": 1}}}}
        }));
        assert_eq!(nested.default_value().unwrap(), json!({"inner": {"x": 1}}));
        assert_eq!(nested.build(Args::new()).unwrap(), json!({"inner": {"x": 1}}));

        let empty_inner = d(json!({
            "type": "object",
            "properties": {"inner": {"type": "object", "properties": {"x": {"type": "integer"}}}}
        }));
        assert_eq!(empty_inner.default_value().unwrap(), json!({}));

        let pair = d(json!({
            "type": "array",
            "items": [{"type": "integer", "default": 4}, {"type": "object", "properties": {"k": {"const": "v"}}}]
        }));
        assert_eq!(pair.default_value().unwrap(), json!([4, {"k": "v"}]));
        let prefix = d(json!({"type": "array", "items": [{"default": 1}, {"type": "string"}, {"default": 3}]}));
        assert_eq!(prefix.default_value().unwrap(), json!([1]));

        let required = d(json!({
            "type": "object",
            "properties": {"inner": {"type": "object", "properties": {"x": {"default": 1}}}},
            "required": ["inner"]
        }));
        assert_eq!(required.call(json!({})).unwrap(), json!({"inner": {"x": 1}}));
    }

    #[test]
    fn test_draft7_reference_construction_ignores_siblings() {
        let engine = engine();
        let d = engine
            .descriptor(&json!({
                "definitions": {"n": {"type": "integer"}},
                "$ref": "#/definitions/n",
                "anyOf": [{"type": "string"}],
                "maximum": 0
            }))
            .unwrap();
        let built = d.call(json!("5")).unwrap();
        assert_eq!(built, json!(5));
        assert!(built.branch().is_none());
    }

    #[test]
    fn test_build_without_arguments_uses_default() {
        let engine = engine();
        let d = engine.descriptor(&json!({"type": "integer", "default": 7})).unwrap();
        let instance = d.build(Args::new()).unwrap();
        assert_eq!(instance, json!(7));
        assert!(instance.is_instance_of(&d));
    }

    #[test]
    fn test_named_arguments() {
        let engine = engine();
        let point = engine
            .object()
            .property("x", &engine.integer().unwrap())
            .property("y", &engine.integer().unwrap())
            .required("x")
            .required("y")
            .intern()
            .unwrap();
        let built = point.build(Args::new().named("x", json!(1)).named("y", json!("2"))).unwrap();
        assert_eq!(built, json!({"x": 1, "y": 2}));
        let merged = point.build(Args::new().arg(json!({"x": 5})).named("y", json!(6))).unwrap();
        assert_eq!(merged, json!({"x": 5, "y": 6}));

        let err = engine.integer().unwrap().build(Args::new().named("x", json!(1))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CoercionFailure);
    }

    #[test]
    fn test_positional_arguments() {
        let engine = engine();
        let ints = engine.list(&engine.integer().unwrap()).unwrap();
        assert_eq!(ints.build(Args::new().arg(json!(1)).arg(json!("2"))).unwrap(), json!([1, 2]));
        let err = engine
            .integer()
            .unwrap()
            .build(Args::new().arg(json!(1)).arg(json!(2)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CoercionFailure);
    }

    #[test]
    fn test_cast_chain() {
        let engine = engine();
        let d = engine
            .descriptor(&json!({"type": "integer", "$cast": ["trim", "to_integer"]}))
            .unwrap();
        assert_eq!(d.call(json!("  7 ")).unwrap(), json!(7));

        let failing = engine.descriptor(&json!({"$cast": ["trim"]})).unwrap();
        let err = failing.call(json!(1)).unwrap_err();
        assert!(matches!(err, BuildError::Cast { .. }));
        assert_eq!(err.kind(), ErrorKind::CoercionFailure);

        let unknown = engine.descriptor(&json!({"$cast": ["Shout"]})).unwrap();
        assert_eq!(unknown.call(json!("a")).unwrap_err().kind(), ErrorKind::UnresolvedForward);

        let shout = engine.descriptor(&json!({"type": "string", "$cast": ["uppercase"]})).unwrap();
        engine.define("Shout", &shout);
        assert_eq!(unknown.call(json!("a")).unwrap(), json!("A"));

        let inline = engine
            .descriptor(&json!({"$cast": [{"$cast": ["trim"]}, "uppercase"]}))
            .unwrap();
        assert_eq!(inline.call(json!(" b ")).unwrap(), json!("B"));
    }

    #[test]
    fn test_custom_cast() {
        let engine = engine();
        engine.register_cast("cents", |v: Value| {
            v.as_f64().map(|f| json!((f * 100.0).round() as i64)).ok_or_else(|| "not a number".to_string())
        });
        let d = engine.descriptor(&json!({"type": "integer", "$cast": ["cents"]})).unwrap();
        assert_eq!(d.call(json!(1.25)).unwrap(), json!(125));
    }

    #[test]
    fn test_forward_reference_construction() {
        let engine = engine();
        let forward = engine.forward("Count").unwrap();
        assert_eq!(forward.call(json!("5")).unwrap_err().kind(), ErrorKind::UnresolvedForward);
        engine.define("Count", &engine.integer().unwrap());
        assert_eq!(forward.call(json!("5")).unwrap(), json!(5));
    }

    #[test]
    fn test_local_reference_construction() {
        let engine = engine();
        let d = engine
            .descriptor(&json!({
                "definitions": {"n": {"type": "integer"}},
                "type": "object",
                "properties": {"a": {"$ref": "#/definitions/n"}}
            }))
            .unwrap();
        assert_eq!(d.call(json!({"a": "3"})).unwrap(), json!({"a": 3}));
        let err = d.call(json!({"a": "x"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_required_keys_filled_from_defaults() {
        let engine = engine();
        let d = engine
            .descriptor(&json!({
                "type": "object",
                "properties": {"a": {"type": "integer", "default": 1}, "b": {"type": "integer"}},
                "required": ["a", "b"]
            }))
            .unwrap();
        assert_eq!(d.call(json!({"b": 2})).unwrap(), json!({"a": 1, "b": 2}));
        let err = d.call(json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequiredMissing);
    }

    #[test]
    fn test_transitive_dependency_fill() {
        let engine = engine();
        let d = engine
            .descriptor(&json!({
                "type": "object",
                "properties": {
                    "a": {"type": "integer"},
                    "b": {"type": "integer", "default": 2},
                    "c": {"type": "integer", "default": 3}
                },
                "dependencies": {"a": ["b"], "b": ["c"]}
            }))
            .unwrap();
        assert_eq!(d.call(json!({"a": 1})).unwrap(), json!({"a": 1, "b": 2, "c": 3}));
        assert_eq!(d.call(json!({"c": 0})).unwrap(), json!({"c": 0}));
    }

    #[test]
    fn test_dependency_cycle_detected_only_when_filling() {
        let engine = engine();
        let d = engine
            .descriptor(&json!({
                "type": "object",
                "properties": {"a": {"default": 0}, "b": {"default": 0}},
                "dependencies": {"a": ["b"], "b": ["a"]}
            }))
            .unwrap();
        let err = d.call(json!({"a": 1})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CyclicDependency);
        assert_eq!(d.call(json!({"a": 1, "b": 2})).unwrap(), json!({"a": 1, "b": 2}));
        assert_eq!(d.call(json!({})).unwrap(), json!({}));
    }

    #[test]
    fn test_dependency_order() {
        let mut graph = BTreeMap::new();
        graph.insert("a".to_string(), vec!["b".to_string()]);
        graph.insert("b".to_string(), vec!["c".to_string()]);
        let keys: BTreeSet<String> = ["a".to_string()].into_iter().collect();
        assert_eq!(dependency_order(&graph, &keys).unwrap(), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_nested_coercion() {
        let engine = engine();
        let ints = engine.list(&engine.integer().unwrap()).unwrap();
        assert_eq!(ints.call(json!(["1", 2])).unwrap(), json!([1, 2]));
        let err = ints.call(json!(["x"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.report().unwrap().records()[0].instance_path.to_string(), "/0");

        let pair = engine.tuple(&[engine.text().unwrap(), engine.integer().unwrap()]).unwrap();
        assert_eq!(pair.call(json!([1, "2"])).unwrap(), json!(["1", 2]));
    }

    #[test]
    fn test_union_construction_records_branch() {
        let engine = engine();
        let int = engine.integer().unwrap();
        let list = engine.descriptor(&json!({"type": "array"})).unwrap();
        let d = (&int | &list).unwrap();
        let built = d.call(json!("3")).unwrap();
        assert_eq!(built, json!(3));
        assert!(built.branch().unwrap().ptr_eq(&int));
        let as_is = d.call(json!([1])).unwrap();
        assert!(as_is.branch().unwrap().ptr_eq(&list));
    }

    #[test]
    fn test_conditional_construction() {
        let engine = engine();
        let d = engine
            .descriptor(&json!({"if": {"type": "string"}, "then": {"$cast": ["trim"]}}))
            .unwrap();
        assert_eq!(d.call(json!(" a ")).unwrap(), json!("a"));
        assert_eq!(d.call(json!(4)).unwrap(), json!(4));
    }

    #[test]
    fn test_hold_defers_validation() {
        let engine = engine();
        let small = engine.descriptor(&json!({"type": "integer", "maximum": 3})).unwrap();
        {
            let _hold = small.hold();
            assert_eq!(small.call(json!(10)).unwrap(), json!(10));
            assert_eq!(small.cast(json!(10)).unwrap_err().kind(), ErrorKind::OutOfRange);
        }
        assert_eq!(small.call(json!(10)).unwrap_err().kind(), ErrorKind::OutOfRange);
        assert_eq!(small.verified(json!(10)).unwrap_err().kind(), ErrorKind::OutOfRange);
        assert_eq!(small.verified(json!("2")).unwrap(), json!(2));
    }
}
