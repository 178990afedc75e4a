//! # Type Algebra
//!
//! Combinators that derive new descriptors from existing ones:
//! intersection (`&`, `+`), union (`|`), exclusive or (`^`), difference
//! (binary `-`), negation (unary `-`), keyword parameterization and
//! slicing. Every result is interned, so structurally equal results are
//! the same descriptor.
//!
//! ## Intersection
//!
//! Intersection merges the two keyword maps. Each keyword's registered
//! [`MergeRule`] decides what happens when both sides carry it:
//!
//! | Rule | Result |
//! |------|--------|
//! | `TypeSet` | set intersection, `integer` counted inside `number` |
//! | `Equal` | the common value, else `IncompatibleMerge` |
//! | `Intersect` | ordered intersection of `enum` values, never empty |
//! | `Lower` / `Upper` | the tighter bound |
//! | `Union` | `required` names from both sides |
//! | `Either` | logical or (`uniqueItems`) |
//! | `PerKey` | per-key merge; shared keys merge recursively |
//! | `Dependencies` | per-key union of lists, merge of schemas |
//! | `Nested` | recursive merge of the subschemas |
//! | `Concat` | concatenation without repeats (`allOf`, `$cast`) |
//! | `Branch`, `Lift` | the right value moves into `allOf` |
//! | `Negate` | `not: {anyOf: [left, right]}` |
//! | `Override` | the right value |
//!
//! Keywords whose meaning depends on siblings are merged as families.
//! When both sides constrain the same family and the family's meaning is
//! positional or closed (`additionalProperties`, tuple `items`,
//! `contains` counts, `if`/`then`/`else`), the right side's members move
//! into one `allOf` entry together instead of merging keyword by keyword.
//!
//! After merging, an inclusive bound dominated by the exclusive bound on
//! the same side is dropped, and vice versa.
//!
//! ## References
//!
//! A Draft-7 reader ignores every keyword beside `$ref`, so an operand
//! holding `$ref` never has keywords merged into it: its keywords move
//! into one `allOf` branch first, and only `definitions`, `$defs`, `$id`
//! and `$schema` stay at the top where `#` pointers find them.
//!
//! Local references resolve against the root of the result, so when both
//! operands define the same definition name with different schemas, the
//! right operand's definition is renamed (`name_1`, `name_2`, ...) and
//! every `#/definitions/name` reference inside the right operand follows.
//!
//! ## Union and Exclusive Or
//!
//! Operands that are pure `anyOf` (resp. `oneOf`) schemas contribute their
//! branches, so composition never nests. Union drops a branch whose digest
//! repeats an earlier one and unwraps a single surviving branch; exclusive
//! or keeps repeats because `A ^ A` accepts nothing.

use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::ops::{Add, BitAnd, BitOr, BitXor, Neg, Sub};

use schemata_core::{
    CoreError, Frozen, FrozenMap, JsonPointer, Keyword, KeywordCatalog, MergeRule, Schema, SchemaDigest, ValueKind,
};
use schemata_validate::KeywordRegistry;

use crate::carrier::Carrier;
use crate::descriptor::Descriptor;
use crate::error::AlgebraError;

/// Keyword groups merged as a unit when both sides use them.
struct Family {
    members: &'static [&'static str],
    /// True if merging member by member would change the meaning.
    entangled: fn(&FrozenMap, &FrozenMap) -> bool,
}

const FAMILIES: &[Family] = &[
    Family {
        members: &[
            "properties",
            "patternProperties",
            "additionalProperties",
            "unevaluatedProperties",
        ],
        entangled: closed_properties,
    },
    Family {
        members: &["items", "additionalItems", "unevaluatedItems"],
        entangled: positional_items,
    },
    Family {
        members: &["contains", "minContains", "maxContains"],
        entangled: always,
    },
    Family {
        members: &["if", "then", "else"],
        entangled: always,
    },
];

fn has_any(map: &FrozenMap, names: &[&str]) -> bool {
    names.iter().any(|n| map.contains_key(*n))
}

fn closed_properties(left: &FrozenMap, right: &FrozenMap) -> bool {
    const CLOSERS: &[&str] = &["additionalProperties", "unevaluatedProperties"];
    has_any(left, CLOSERS) || has_any(right, CLOSERS)
}

fn positional_items(left: &FrozenMap, right: &FrozenMap) -> bool {
    const TAILS: &[&str] = &["additionalItems", "unevaluatedItems"];
    let tuple = |m: &FrozenMap| m.get("items").is_some_and(|i| i.as_seq().is_some());
    tuple(left) || tuple(right) || has_any(left, TAILS) || has_any(right, TAILS)
}

fn always(_: &FrozenMap, _: &FrozenMap) -> bool {
    true
}

impl Family {
    fn applies(&self, left: &FrozenMap, right: &FrozenMap) -> bool {
        has_any(left, self.members) && has_any(right, self.members) && (self.entangled)(left, right)
    }
}

/// Keyword-wise schema intersection over a registry's merge rules.
pub(crate) struct Merger<'r> {
    registry: &'r KeywordRegistry,
}

impl<'r> Merger<'r> {
    pub(crate) fn new(registry: &'r KeywordRegistry) -> Self {
        Self { registry }
    }

    fn rule(&self, name: &str) -> MergeRule {
        self.registry.lookup(name).map_or(MergeRule::Lift, |d| d.merge_rule())
    }

    /// Intersect two schema values (objects or booleans).
    pub(crate) fn merge_schemas(&self, left: &Frozen, right: &Frozen) -> Result<Frozen, AlgebraError> {
        match (left, right) {
            (Frozen::Bool(false), _) | (_, Frozen::Bool(false)) => Ok(Frozen::Bool(false)),
            (Frozen::Bool(true), other) | (other, Frozen::Bool(true)) => Ok(other.clone()),
            (Frozen::Map(l), Frozen::Map(r)) => Ok(Frozen::map(self.merge_maps(l, r)?)),
            (other, _) => Err(CoreError::NotASchema {
                path: String::new(),
                found: other.type_name().to_string(),
            }
            .into()),
        }
    }

    /// Intersect two root schemas, keeping each side's definitions apart.
    pub(crate) fn merge_roots(&self, left: &FrozenMap, right: &FrozenMap) -> Result<FrozenMap, AlgebraError> {
        let right = self.separate_definitions(left, right);
        self.merge_maps(left, &right)
    }

    /// Intersect two keyword maps.
    pub(crate) fn merge_maps(&self, left: &FrozenMap, right: &FrozenMap) -> Result<FrozenMap, AlgebraError> {
        if is_nothing(left) || is_nothing(right) {
            return Ok(Schema::nothing().to_map());
        }
        if left.is_empty() {
            return Ok(right.clone());
        }
        if right.is_empty() || left == right {
            return Ok(left.clone());
        }
        let left = isolate_reference(left);
        let right = isolate_reference(right);
        let (left, right) = (&*left, &*right);

        let mut out = left.clone();
        let mut lifted: Vec<Frozen> = Vec::new();
        let mut grouped: BTreeSet<&str> = BTreeSet::new();
        for family in FAMILIES.iter().filter(|f| f.applies(left, right)) {
            let part: FrozenMap = right
                .iter()
                .filter(|(k, _)| family.members.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            lifted.push(Frozen::map(part));
            grouped.extend(family.members.iter().copied());
        }

        for (name, rv) in right {
            if grouped.contains(name.as_str()) {
                continue;
            }
            let Some(lv) = out.get(name).cloned() else {
                out.insert(name.clone(), rv.clone());
                continue;
            };
            if &lv == rv {
                continue;
            }
            let merged = match self.rule(name) {
                MergeRule::TypeSet => intersect_types(name, &lv, rv)?,
                MergeRule::Equal if lv.equals_value(&rv.to_value()) => lv,
                MergeRule::Equal => return Err(incompatible(name, &lv, rv)),
                MergeRule::Intersect => intersect_values(name, &lv, rv)?,
                MergeRule::Lower => tighter(&lv, rv, |l, r| r > l),
                MergeRule::Upper => tighter(&lv, rv, |l, r| r < l),
                MergeRule::Union => union_texts(&lv, rv),
                MergeRule::Either => Frozen::Bool(lv.as_bool().unwrap_or(false) || rv.as_bool().unwrap_or(false)),
                MergeRule::PerKey => match (lv.as_map(), rv.as_map()) {
                    (Some(l), Some(r)) => Frozen::map(self.merge_per_key(l, r)?),
                    _ => {
                        lifted.push(single(name, rv));
                        continue;
                    }
                },
                MergeRule::Dependencies => match (lv.as_map(), rv.as_map()) {
                    (Some(l), Some(r)) => Frozen::map(self.merge_dependencies(l, r)?),
                    _ => {
                        lifted.push(single(name, rv));
                        continue;
                    }
                },
                MergeRule::Nested if lv.is_schema() && rv.is_schema() => self.merge_schemas(&lv, rv)?,
                MergeRule::Concat => concat(&lv, rv),
                MergeRule::Negate => {
                    let mut either = FrozenMap::new();
                    either.insert(Keyword::AnyOf.as_str().to_string(), Frozen::seq(vec![lv, rv.clone()]));
                    Frozen::map(either)
                }
                MergeRule::Override => rv.clone(),
                MergeRule::Nested | MergeRule::Branch | MergeRule::Lift => {
                    lifted.push(single(name, rv));
                    continue;
                }
            };
            out.insert(name.clone(), merged);
        }

        if !lifted.is_empty() {
            let all_of = Keyword::AllOf.as_str();
            let combined = match out.get(all_of) {
                Some(existing) => concat(existing, &Frozen::seq(lifted)),
                None => concat(&Frozen::seq(Vec::new()), &Frozen::seq(lifted)),
            };
            out.insert(all_of.to_string(), combined);
        }
        normalize_bounds(&mut out);
        Ok(out)
    }

    fn merge_per_key(&self, left: &FrozenMap, right: &FrozenMap) -> Result<FrozenMap, AlgebraError> {
        let mut out = left.clone();
        for (key, rv) in right {
            let merged = match out.get(key) {
                Some(lv) => self.merge_schemas(lv, rv)?,
                None => rv.clone(),
            };
            out.insert(key.clone(), merged);
        }
        Ok(out)
    }

    /// `right` with each definition that collides with a different one in
    /// `left` renamed, and its local references rewritten to match.
    fn separate_definitions(&self, left: &FrozenMap, right: &FrozenMap) -> FrozenMap {
        let mut out = right.clone();
        let mut renames: Vec<(String, String)> = Vec::new();
        for container in [Keyword::Definitions.as_str(), Keyword::Defs.as_str()] {
            let (Some(ours), Some(theirs)) = (
                left.get(container).and_then(Frozen::as_map),
                right.get(container).and_then(Frozen::as_map),
            ) else {
                continue;
            };
            let mut renamed = FrozenMap::new();
            for (name, schema) in theirs.iter() {
                let name = match ours.get(name) {
                    Some(existing) if existing != schema => {
                        let fresh = fresh_name(name, |n| {
                            ours.contains_key(n) || theirs.contains_key(n) || renamed.contains_key(n)
                        });
                        renames.push((definition_reference(container, name), definition_reference(container, &fresh)));
                        fresh
                    }
                    _ => name.clone(),
                };
                renamed.insert(name, schema.clone());
            }
            out.insert(container.to_string(), Frozen::map(renamed));
        }
        if renames.is_empty() {
            return right.clone();
        }
        tracing::debug!(renamed = renames.len(), "renamed colliding definitions");
        self.rewrite_references(&out, &renames)
    }

    fn rewrite_references(&self, map: &FrozenMap, renames: &[(String, String)]) -> FrozenMap {
        map.iter()
            .map(|(name, value)| {
                let value = match (name.as_str(), value.as_str()) {
                    ("$ref", Some(reference)) => Frozen::text(renamed_reference(reference, renames)),
                    _ => match self.registry.kind_of(name) {
                        Some(kind) => map_subschemas(kind, value, &|schema: &Frozen| match schema.as_map() {
                            Some(inner) => Frozen::map(self.rewrite_references(inner, renames)),
                            None => schema.clone(),
                        }),
                        None => value.clone(),
                    },
                };
                (name.clone(), value)
            })
            .collect()
    }

    fn merge_dependencies(&self, left: &FrozenMap, right: &FrozenMap) -> Result<FrozenMap, AlgebraError> {
        let mut out = left.clone();
        for (key, rv) in right {
            let merged = match out.get(key) {
                None => rv.clone(),
                Some(lv) => match (lv.as_seq().is_some(), rv.as_seq().is_some()) {
                    (true, true) => union_texts(lv, rv),
                    (false, false) => self.merge_schemas(lv, rv)?,
                    (true, false) => self.merge_schemas(&required_schema(lv), rv)?,
                    (false, true) => self.merge_schemas(lv, &required_schema(rv))?,
                },
            };
            out.insert(key.clone(), merged);
        }
        Ok(out)
    }
}

/// Keywords that stay beside `$ref` when its other keywords are wrapped.
const DOCUMENT_KEYWORDS: &[&str] = &["definitions", "$defs", "$id", "$schema"];

fn isolate_reference(map: &FrozenMap) -> Cow<'_, FrozenMap> {
    if !map.contains_key(Keyword::Ref.as_str()) {
        return Cow::Borrowed(map);
    }
    let (mut kept, body): (FrozenMap, FrozenMap) = map
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .partition(|(k, _)| DOCUMENT_KEYWORDS.contains(&k.as_str()));
    kept.insert(Keyword::AllOf.as_str().to_string(), Frozen::seq(vec![Frozen::map(body)]));
    Cow::Owned(kept)
}

fn definition_reference(container: &str, name: &str) -> String {
    format!("#{}", JsonPointer::from_tokens([container, name]))
}

fn fresh_name(name: &str, taken: impl Fn(&str) -> bool) -> String {
    (1..)
        .map(|n| format!("{name}_{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| name.to_string())
}

fn renamed_reference(reference: &str, renames: &[(String, String)]) -> String {
    for (old, new) in renames {
        match reference.strip_prefix(old.as_str()) {
            Some("") => return new.clone(),
            Some(rest) if rest.starts_with('/') => return format!("{new}{rest}"),
            _ => {}
        }
    }
    reference.to_string()
}

/// Rebuild a keyword value with `f` applied to each subschema it holds.
fn map_subschemas(kind: ValueKind, value: &Frozen, f: &dyn Fn(&Frozen) -> Frozen) -> Frozen {
    let nested = |v: &Frozen| if v.is_schema() { f(v) } else { v.clone() };
    match (kind, value) {
        (ValueKind::Schema, v) => f(v),
        (ValueKind::SchemaList | ValueKind::CastChain | ValueKind::ItemSchemas, Frozen::Seq(items)) => {
            Frozen::seq(items.iter().map(nested).collect())
        }
        (ValueKind::ItemSchemas, v) => f(v),
        (ValueKind::SchemaMap | ValueKind::DependencyMap, Frozen::Map(map)) => {
            Frozen::map(map.iter().map(|(k, v)| (k.clone(), nested(v))).collect())
        }
        (_, v) => v.clone(),
    }
}

fn is_nothing(map: &FrozenMap) -> bool {
    map.len() == 1
        && map
            .get(Keyword::Not.as_str())
            .is_some_and(|n| matches!(n, Frozen::Bool(true)) || n.as_map().is_some_and(|m| m.is_empty()))
}

fn incompatible(keyword: &str, left: &Frozen, right: &Frozen) -> AlgebraError {
    AlgebraError::IncompatibleMerge {
        keyword: keyword.to_string(),
        left: left.to_string(),
        right: right.to_string(),
    }
}

fn single(name: &str, value: &Frozen) -> Frozen {
    let mut map = FrozenMap::new();
    map.insert(name.to_string(), value.clone());
    Frozen::map(map)
}

fn required_schema(names: &Frozen) -> Frozen {
    single(Keyword::Required.as_str(), names)
}

fn type_names(value: &Frozen) -> Vec<&str> {
    match value.as_seq() {
        Some(items) => items.iter().filter_map(Frozen::as_str).collect(),
        None => value.as_str().into_iter().collect(),
    }
}

fn intersect_types(keyword: &str, left: &Frozen, right: &Frozen) -> Result<Frozen, AlgebraError> {
    let theirs = type_names(right);
    let mut kept: Vec<&str> = Vec::new();
    for name in type_names(left) {
        let common = if theirs.contains(&name) {
            Some(name)
        } else if (name == "integer" && theirs.contains(&"number")) || (name == "number" && theirs.contains(&"integer")) {
            Some("integer")
        } else {
            None
        };
        if let Some(common) = common.filter(|c| !kept.contains(c)) {
            kept.push(common);
        }
    }
    match kept.as_slice() {
        [] => Err(incompatible(keyword, left, right)),
        [only] => Ok(Frozen::text(only)),
        many => Ok(Frozen::seq(many.iter().map(Frozen::text).collect())),
    }
}

fn intersect_values(keyword: &str, left: &Frozen, right: &Frozen) -> Result<Frozen, AlgebraError> {
    let theirs: Vec<Value> = right.as_seq().unwrap_or_default().iter().map(Frozen::to_value).collect();
    let kept: Vec<Frozen> = left
        .as_seq()
        .unwrap_or_default()
        .iter()
        .filter(|v| theirs.iter().any(|t| v.equals_value(t)))
        .cloned()
        .collect();
    if kept.is_empty() {
        return Err(incompatible(keyword, left, right));
    }
    Ok(Frozen::seq(kept))
}

fn tighter(left: &Frozen, right: &Frozen, right_wins: fn(f64, f64) -> bool) -> Frozen {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) if right_wins(l, r) => right.clone(),
        _ => left.clone(),
    }
}

fn union_texts(left: &Frozen, right: &Frozen) -> Frozen {
    let mut names: Vec<Frozen> = left.as_seq().unwrap_or_default().to_vec();
    for name in right.as_seq().unwrap_or_default() {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    Frozen::seq(names)
}

fn concat(left: &Frozen, right: &Frozen) -> Frozen {
    // Same as `union_texts`, but over arbitrary entries.
    union_texts(left, right)
}

fn normalize_bounds(map: &mut FrozenMap) {
    drop_dominated(map, "minimum", "exclusiveMinimum", |inclusive, exclusive| exclusive >= inclusive);
    drop_dominated(map, "maximum", "exclusiveMaximum", |inclusive, exclusive| exclusive <= inclusive);
}

fn drop_dominated(map: &mut FrozenMap, inclusive: &str, exclusive: &str, exclusive_wins: fn(f64, f64) -> bool) {
    let bounds = (
        map.get(inclusive).and_then(Frozen::as_f64),
        map.get(exclusive).and_then(Frozen::as_f64),
    );
    if let (Some(i), Some(e)) = bounds {
        if exclusive_wins(i, e) {
            map.remove(inclusive);
        } else {
            map.remove(exclusive);
        }
    }
}

/// Branches an operand contributes to a union or exclusive or.
fn operand_branches(schema: &Schema, keyword: Keyword) -> Vec<Frozen> {
    if schema.len() == 1 {
        if let Some(items) = schema.keyword(keyword).and_then(Frozen::as_seq) {
            return items.to_vec();
        }
    }
    vec![schema.to_frozen()]
}

impl Descriptor {
    /// Values accepted by both descriptors.
    ///
    /// # Errors
    ///
    /// `IncompatibleMerge` when a keyword admits no common value.
    pub fn intersect(&self, other: &Descriptor) -> Result<Descriptor, AlgebraError> {
        if self == other {
            return Ok(self.clone());
        }
        let engine = self.engine();
        let merged = Merger::new(engine.registry()).merge_roots(self.schema().entries(), other.schema().entries())?;
        let schema = Schema::from_map(merged, engine.registry())?;
        let result = engine.intern_with(schema, vec![self.downgrade(), other.downgrade()])?;
        tracing::debug!(left = %self.digest().short(), right = %other.digest().short(), result = %result.digest().short(), "intersected");
        Ok(result)
    }

    /// Values accepted by at least one descriptor.
    pub fn union(&self, other: &Descriptor) -> Result<Descriptor, AlgebraError> {
        self.combine(other, Keyword::AnyOf)
    }

    /// Values accepted by exactly one descriptor.
    pub fn xor(&self, other: &Descriptor) -> Result<Descriptor, AlgebraError> {
        self.combine(other, Keyword::OneOf)
    }

    /// Values accepted by `self` and rejected by `other`.
    pub fn difference(&self, other: &Descriptor) -> Result<Descriptor, AlgebraError> {
        self.intersect(&other.negate()?)
    }

    /// Values rejected by `self`. Negating a negation returns its operand.
    pub fn negate(&self) -> Result<Descriptor, AlgebraError> {
        let engine = self.engine();
        let schema = self.schema();
        if schema.len() == 1 {
            if let Some(inner) = schema.keyword(Keyword::Not) {
                return Ok(engine.intern_frozen(inner)?);
            }
        }
        let mut map = FrozenMap::new();
        map.insert(Keyword::Not.as_str().to_string(), schema.to_frozen());
        let negated = Schema::from_map(map, engine.registry())?;
        Ok(engine.intern_with(negated, vec![self.downgrade()])?)
    }

    /// Set one keyword, replacing any existing value.
    ///
    /// # Errors
    ///
    /// `Schema` if the keyword is unknown or `value` has the wrong kind.
    pub fn parameterize(&self, keyword: &str, value: Value) -> Result<Descriptor, AlgebraError> {
        let engine = self.engine();
        let mut map = self.schema().to_map();
        map.insert(keyword.to_string(), Frozen::from(&value));
        let schema = Schema::from_map(map, engine.registry())?;
        Ok(engine.intern_with(schema, vec![self.downgrade()])?)
    }

    /// Add one keyword under intersection rules: an existing bound is only
    /// ever tightened.
    pub fn refine(&self, keyword: &str, value: Value) -> Result<Descriptor, AlgebraError> {
        let engine = self.engine();
        let mut map = FrozenMap::new();
        map.insert(keyword.to_string(), Frozen::from(&value));
        let constraint = engine.intern(Schema::from_map(map, engine.registry())?)?;
        self.intersect(&constraint)
    }

    /// Bound the descriptor by its carrier's natural measure.
    ///
    /// | Carrier | `lo` / `hi` | `step` |
    /// |---------|-------------|--------|
    /// | integer, number | `minimum` / `maximum` | `multipleOf` |
    /// | text | `minLength` / `maxLength` | rejected |
    /// | sequence | `minItems` / `maxItems` | `items` (a schema) |
    /// | mapping | `minProperties` / `maxProperties` | `additionalProperties` (a schema) |
    ///
    /// # Errors
    ///
    /// `InvalidSlice` for other carriers or a text step; `Schema` when a
    /// bound has the wrong kind.
    pub fn slice(&self, lo: Option<Value>, hi: Option<Value>, step: Option<Value>) -> Result<Descriptor, AlgebraError> {
        let carrier = self.carrier();
        let (lo_keyword, hi_keyword, step_keyword) = match carrier {
            Carrier::Integer | Carrier::Number => (Keyword::Minimum, Keyword::Maximum, Some(Keyword::MultipleOf)),
            Carrier::Text => (Keyword::MinLength, Keyword::MaxLength, None),
            Carrier::Sequence => (Keyword::MinItems, Keyword::MaxItems, Some(Keyword::Items)),
            Carrier::Mapping => (Keyword::MinProperties, Keyword::MaxProperties, Some(Keyword::AdditionalProperties)),
            other => {
                return Err(AlgebraError::InvalidSlice {
                    carrier: other.to_string(),
                    reason: "only numbers, text, sequences and mappings have bounds".into(),
                })
            }
        };
        let mut map = self.schema().to_map();
        for (keyword, value) in [(lo_keyword, lo), (hi_keyword, hi)] {
            if let Some(value) = value {
                map.insert(keyword.as_str().to_string(), Frozen::from(&value));
            }
        }
        match (step, step_keyword) {
            (Some(step), Some(keyword)) => {
                map.insert(keyword.as_str().to_string(), Frozen::from(&step));
            }
            (Some(_), None) => {
                return Err(AlgebraError::InvalidSlice {
                    carrier: carrier.to_string(),
                    reason: "text slices take no step".into(),
                })
            }
            (None, _) => {}
        }
        let engine = self.engine();
        let schema = Schema::from_map(map, engine.registry())?;
        Ok(engine.intern_with(schema, vec![self.downgrade()])?)
    }

    /// Flattening applies to exclusive or as well, so `(A ^ B) ^ C` means
    /// "exactly one of A, B, C", not the pairwise exclusive or of `A ^ B`
    /// and `C`.
    fn combine(&self, other: &Descriptor, keyword: Keyword) -> Result<Descriptor, AlgebraError> {
        let engine = self.engine();
        let dedup = keyword == Keyword::AnyOf;
        let mut branches: Vec<Frozen> = Vec::new();
        let mut seen: Vec<SchemaDigest> = Vec::new();
        for operand in [self, other] {
            for branch in operand_branches(operand.schema(), keyword) {
                if dedup {
                    let schema = Schema::from_frozen(&branch, engine.registry())?;
                    if schema.is_nothing() {
                        continue;
                    }
                    if schema.is_empty() {
                        return Ok(engine.any()?);
                    }
                    let digest = engine.digest_of(&schema)?;
                    if seen.contains(&digest) {
                        continue;
                    }
                    seen.push(digest);
                }
                branches.push(branch);
            }
        }
        if dedup {
            match branches.as_slice() {
                [] => return Ok(engine.nothing()?),
                [only] => return Ok(engine.intern_frozen(only)?),
                _ => {}
            }
        }
        let mut map = FrozenMap::new();
        map.insert(keyword.as_str().to_string(), Frozen::seq(branches));
        let schema = Schema::from_map(map, engine.registry())?;
        Ok(engine.intern_with(schema, vec![self.downgrade(), other.downgrade()])?)
    }
}

impl BitAnd for &Descriptor {
    type Output = Result<Descriptor, AlgebraError>;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.intersect(rhs)
    }
}

impl Add for &Descriptor {
    type Output = Result<Descriptor, AlgebraError>;

    fn add(self, rhs: Self) -> Self::Output {
        self.intersect(rhs)
    }
}

impl BitOr for &Descriptor {
    type Output = Result<Descriptor, AlgebraError>;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl BitXor for &Descriptor {
    type Output = Result<Descriptor, AlgebraError>;

    fn bitxor(self, rhs: Self) -> Self::Output {
        self.xor(rhs)
    }
}

impl Sub for &Descriptor {
    type Output = Result<Descriptor, AlgebraError>;

    fn sub(self, rhs: Self) -> Self::Output {
        self.difference(rhs)
    }
}

impl Neg for &Descriptor {
    type Output = Result<Descriptor, AlgebraError>;

    fn neg(self) -> Self::Output {
        self.negate()
    }
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

    fn merged(engine: &Engine, left: Value, right: Value) -> Result<Value, AlgebraError> {
        let l = engine.descriptor(&left).unwrap();
        let r = engine.descriptor(&right).unwrap();
        l.intersect(&r).map(|d| d.to_value())
    }

    #[test]
    fn test_type_sets_intersect() {
        let engine = engine();
        assert_eq!(
            merged(&engine, json!({"type": ["integer", "string"]}), json!({"type": "number"})).unwrap(),
            json!({"type": "integer"})
        );
        assert_eq!(
            merged(&engine, json!({"type": ["string", "null"]}), json!({"type": ["null", "string", "array"]})).unwrap(),
            json!({"type": ["string", "null"]})
        );
        let err = merged(&engine, json!({"type": "string"}), json!({"type": "integer"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleMerge);
    }

    #[test]
    fn test_bounds_tighten() {
        let engine = engine();
        assert_eq!(
            merged(&engine, json!({"type": "integer", "minimum": 1}), json!({"maximum": 10})).unwrap(),
            json!({"type": "integer", "minimum": 1, "maximum": 10})
        );
        assert_eq!(
            merged(&engine, json!({"minimum": 1, "maxLength": 9}), json!({"minimum": 3, "maxLength": 4})).unwrap(),
            json!({"minimum": 3, "maxLength": 4})
        );
        assert_eq!(
            merged(&engine, json!({"exclusiveMinimum": 0}), json!({"minimum": 0})).unwrap(),
            json!({"exclusiveMinimum": 0})
        );
        assert_eq!(
            merged(&engine, json!({"exclusiveMaximum": 10}), json!({"maximum": 5})).unwrap(),
            json!({"maximum": 5})
        );
    }

    #[test]
    fn test_equal_keywords_must_agree() {
        let engine = engine();
        assert_eq!(
            merged(&engine, json!({"const": 1}), json!({"const": 1.0})).unwrap(),
            json!({"const": 1})
        );
        let err = merged(&engine, json!({"const": 1}), json!({"const": 2})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleMerge);
        assert!(merged(&engine, json!({"format": "email"}), json!({"format": "uri"})).is_err());
    }

    #[test]
    fn test_enum_intersection() {
        let engine = engine();
        assert_eq!(
            merged(&engine, json!({"enum": [1, 2, 3]}), json!({"enum": [3, "a", 2]})).unwrap(),
            json!({"enum": [2, 3]})
        );
        assert!(merged(&engine, json!({"enum": [1]}), json!({"enum": [2]})).is_err());
    }

    #[test]
    fn test_object_keywords_merge_per_key() {
        let engine = engine();
        let result = merged(
            &engine,
            json!({"properties": {"a": {"type": "integer"}}, "required": ["a"]}),
            json!({"properties": {"a": {"minimum": 0}, "b": {"type": "string"}}, "required": ["b", "a"]}),
        )
        .unwrap();
        assert_eq!(
            result,
            json!({
                "properties": {"a": {"type": "integer", "minimum": 0}, "b": {"type": "string"}},
                "required": ["a", "b"]
            })
        );
    }

    #[test]
    fn test_closed_objects_lift_the_property_family() {
        let engine = engine();
        let result = merged(
            &engine,
            json!({"properties": {"a": {"type": "integer"}}, "additionalProperties": false}),
            json!({"properties": {"b": {"type": "string"}}}),
        )
        .unwrap();
        assert_eq!(
            result,
            json!({
                "properties": {"a": {"type": "integer"}},
                "additionalProperties": false,
                "allOf": [{"properties": {"b": {"type": "string"}}}]
            })
        );
    }

    #[test]
    fn test_lift_rules_move_into_all_of() {
        let engine = engine();
        assert_eq!(
            merged(&engine, json!({"pattern": "^a"}), json!({"pattern": "b$"})).unwrap(),
            json!({"pattern": "^a", "allOf": [{"pattern": "b$"}]})
        );
        assert_eq!(
            merged(
                &engine,
                json!({"anyOf": [{"type": "integer"}, {"type": "string"}], "allOf": [{"minimum": 0}]}),
                json!({"anyOf": [{"type": "null"}], "allOf": [{"minimum": 0}, {"maximum": 9}]})
            )
            .unwrap(),
            json!({
                "anyOf": [{"type": "integer"}, {"type": "string"}],
                "allOf": [{"minimum": 0}, {"maximum": 9}, {"anyOf": [{"type": "null"}]}]
            })
        );
    }

    #[test]
    fn test_not_and_override_rules() {
        let engine = engine();
        assert_eq!(
            merged(&engine, json!({"not": {"const": 1}}), json!({"not": {"const": 2}})).unwrap(),
            json!({"not": {"anyOf": [{"const": 1}, {"const": 2}]}})
        );
        assert_eq!(
            merged(&engine, json!({"default": 1, "uniqueItems": false}), json!({"default": 2, "uniqueItems": true})).unwrap(),
            json!({"default": 2, "uniqueItems": true})
        );
    }

    #[test]
    fn test_dependencies_merge() {
        let engine = engine();
        let result = merged(
            &engine,
            json!({"dependencies": {"a": ["b"], "c": {"required": ["d"]}}}),
            json!({"dependencies": {"a": ["e"], "c": ["f"]}}),
        )
        .unwrap();
        assert_eq!(
            result,
            json!({"dependencies": {"a": ["b", "e"], "c": {"required": ["d", "f"]}}})
        );
    }

    #[test]
    fn test_identity_elements() {
        let engine = engine();
        let int = engine.integer().unwrap();
        let any = engine.any().unwrap();
        let nothing = engine.nothing().unwrap();
        assert!((&int & &any).unwrap().ptr_eq(&int));
        assert!((&any & &int).unwrap().ptr_eq(&int));
        assert!((&int & &nothing).unwrap().ptr_eq(&nothing));
        assert!((&int & &int).unwrap().ptr_eq(&int));
    }

    #[test]
    fn test_union_flattens_and_dedups() {
        let engine = engine();
        let a = engine.integer().unwrap();
        let b = engine.text().unwrap();
        let c = engine.null().unwrap();
        let ab = (&a | &b).unwrap();
        let abc = (&ab | &c).unwrap();
        assert_eq!(abc.branches().unwrap().len(), 3);
        assert!((&a | &a).unwrap().ptr_eq(&a));
        let again = (&abc | &b).unwrap();
        assert!(again.ptr_eq(&abc));
        assert!((&a | &engine.nothing().unwrap()).unwrap().ptr_eq(&a));
        assert!((&a | &engine.any().unwrap()).unwrap().ptr_eq(&engine.any().unwrap()));
    }

    #[test]
    fn test_xor_keeps_repeats() {
        let engine = engine();
        let a = engine.integer().unwrap();
        let aa = (&a ^ &a).unwrap();
        assert_eq!(aa.to_value(), json!({"oneOf": [{"type": "integer"}, {"type": "integer"}]}));
        assert!(!aa.is_valid(&json!(1)));
        let abc = (&(&a ^ &engine.text().unwrap()).unwrap() ^ &engine.null().unwrap()).unwrap();
        assert_eq!(abc.branches().unwrap().len(), 3);
    }

    #[test]
    fn test_negation_and_difference() {
        let engine = engine();
        let int = engine.integer().unwrap();
        let not_int = (-&int).unwrap();
        assert_eq!(not_int.to_value(), json!({"not": {"type": "integer"}}));
        assert!((-&not_int).unwrap().ptr_eq(&int));
        assert!(not_int.is_valid(&json!("x")));

        let non_negative = engine.descriptor(&json!({"minimum": 0})).unwrap();
        let negative_ints = (&int - &non_negative).unwrap();
        assert!(negative_ints.is_valid(&json!(-1)));
        assert!(!negative_ints.is_valid(&json!(1)));
        assert!(!negative_ints.is_valid(&json!(-1.5)));
    }

    #[test]
    fn test_parameterize_and_refine() {
        let engine = engine();
        let int = engine.integer().unwrap();
        let at_least_one = int.parameterize("minimum", json!(1)).unwrap();
        assert_eq!(at_least_one.to_value(), json!({"type": "integer", "minimum": 1}));
        let replaced = at_least_one.parameterize("minimum", json!(-5)).unwrap();
        assert!(replaced.is_valid(&json!(-5)));
        let refined = at_least_one.refine("minimum", json!(-5)).unwrap();
        assert!(refined.ptr_eq(&at_least_one));
        assert!(int.parameterize("minimum", json!("one")).is_err());
        assert!(int.parameterize("frobnicate", json!(1)).is_err());
    }

    #[test]
    fn test_slices_per_carrier() {
        let engine = engine();
        let evens = engine.integer().unwrap().slice(Some(json!(0)), Some(json!(10)), Some(json!(2))).unwrap();
        assert_eq!(evens.to_value(), json!({"type": "integer", "minimum": 0, "maximum": 10, "multipleOf": 2}));

        let short = engine.text().unwrap().slice(None, Some(json!(3)), None).unwrap();
        assert!(short.is_valid(&json!("abc")));
        assert!(!short.is_valid(&json!("abcd")));
        let err = engine.text().unwrap().slice(None, None, Some(json!(2))).unwrap_err();
        assert!(matches!(err, AlgebraError::InvalidSlice { .. }));

        let pairs = engine
            .descriptor(&json!({"type": "array"}))
            .unwrap()
            .slice(Some(json!(2)), Some(json!(2)), Some(engine.integer().unwrap().to_value()))
            .unwrap();
        assert!(pairs.is_valid(&json!([1, 2])));
        assert!(!pairs.is_valid(&json!([1, "2"])));

        let small_maps = engine.descriptor(&json!({"type": "object"})).unwrap().slice(None, Some(json!(1)), None).unwrap();
        assert!(!small_maps.is_valid(&json!({"a": 1, "b": 2})));

        let err = engine.boolean().unwrap().slice(Some(json!(0)), None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_references_never_gain_siblings() {
        let engine = engine();
        engine.define("Pos", &engine.descriptor(&json!({"type": "integer", "minimum": 1})).unwrap());
        let forward = engine.forward("Pos").unwrap();
        let both = (&forward & &engine.integer().unwrap()).unwrap();
        assert_eq!(engine.ravel(&both), json!({"allOf": [{"$ref": "Pos"}], "type": "integer"}));
        assert!(both.is_valid(&json!(2)));
        assert!(!both.is_valid(&json!(0)));

        let local = merged(
            &engine,
            json!({"definitions": {"a": {"minimum": 10}}, "$ref": "#/definitions/a", "title": "A"}),
            json!({"type": "integer"}),
        )
        .unwrap();
        assert_eq!(
            local,
            json!({
                "definitions": {"a": {"minimum": 10}},
                "allOf": [{"$ref": "#/definitions/a", "title": "A"}],
                "type": "integer"
            })
        );
    }

    #[test]
    fn test_colliding_definitions_are_renamed() {
        let engine = engine();
        let a = engine
            .descriptor(&json!({"definitions": {"x": {"type": "integer"}}, "$ref": "#/definitions/x"}))
            .unwrap();
        let b = engine
            .descriptor(&json!({
                "definitions": {"x": {"minimum": 0}, "y": {"$ref": "#/definitions/x"}},
                "properties": {"p": {"$ref": "#/definitions/y"}, "q": {"$ref": "#/definitions/x/minimum"}}
            }))
            .unwrap();
        let both = (&a & &b).unwrap();
        assert_eq!(
            both.to_value(),
            json!({
                "definitions": {
                    "x": {"type": "integer"},
                    "x_1": {"minimum": 0},
                    "y": {"$ref": "#/definitions/x_1"}
                },
                "allOf": [{"$ref": "#/definitions/x"}],
                "properties": {"p": {"$ref": "#/definitions/y"}, "q": {"$ref": "#/definitions/x_1/minimum"}}
            })
        );
        for value in [json!(-1), json!(1.5), json!("s")] {
            assert_eq!(both.is_valid(&value), a.is_valid(&value) && b.is_valid(&value), "{value}");
        }
        assert!(both.is_valid(&json!(-1)));

        let same = engine.descriptor(&json!({"definitions": {"x": {"type": "integer"}}})).unwrap();
        assert_eq!(
            (&a & &same).unwrap().to_value(),
            json!({"definitions": {"x": {"type": "integer"}}, "allOf": [{"$ref": "#/definitions/x"}]})
        );
    }

    #[test]
    fn test_xor_flattening_counts_all_branches() {
        let engine = engine();
        let int = engine.integer().unwrap();
        let positive = engine.descriptor(&json!({"minimum": 1})).unwrap();
        let small = engine.descriptor(&json!({"maximum": 10})).unwrap();
        let d = (&(&int ^ &positive).unwrap() ^ &small).unwrap();
        assert_eq!(d.branches().unwrap().len(), 3);
        // 5 matches all three branches; pairwise xor would have accepted it.
        assert!(!d.is_valid(&json!(5)));
        assert!(d.is_valid(&json!(20.5)));
    }

    #[test]
    fn test_results_record_ancestors() {
        let engine = engine();
        let a = engine.descriptor(&json!({"minimum": 1})).unwrap();
        let b = engine.descriptor(&json!({"maximum": 2})).unwrap();
        let both = (&a & &b).unwrap();
        let ancestors = both.ancestors();
        assert_eq!(ancestors.len(), 2);
        assert!(ancestors[0].ptr_eq(&a));
        assert!(ancestors[1].ptr_eq(&b));
    }
}
