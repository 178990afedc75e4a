//! # Built-in Keyword Hooks
//!
//! One function per asserting keyword of the Draft-7 vocabulary plus the
//! 2019-09 additions. Keywords whose behavior belongs to a sibling (`then`
//! and `else` run from `if`; `minContains` and `maxContains` run from
//! `contains`) and annotation keywords have no hook.
//!
//! Every hook ignores instances of the wrong JSON type: `minimum` only
//! constrains numbers, `required` only constrains objects, and so on.

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use schemata_core::frozen::number_as_i128;
use schemata_core::{is_integer, json_equal, json_type_name, ErrorKind, Frozen, FrozenMap, Keyword, PathSegment};

use crate::registry::KeywordValidator;
use crate::scope::Scope;

/// The hook for a built-in keyword, if it asserts anything.
pub(crate) fn builtin_validator(keyword: Keyword) -> Option<Arc<dyn KeywordValidator>> {
    let hook: fn(&mut Scope<'_, '_>, &Frozen, &Value) = match keyword {
        Keyword::Type => validate_type,
        Keyword::Enum => validate_enum,
        Keyword::Const => validate_const,
        Keyword::Required => validate_required,
        Keyword::Ref => validate_ref,
        Keyword::AllOf => validate_all_of,
        Keyword::AnyOf => validate_any_of,
        Keyword::OneOf => validate_one_of,
        Keyword::Not => validate_not,
        Keyword::If => validate_if,
        Keyword::MultipleOf => validate_multiple_of,
        Keyword::Maximum => validate_maximum,
        Keyword::ExclusiveMaximum => validate_exclusive_maximum,
        Keyword::Minimum => validate_minimum,
        Keyword::ExclusiveMinimum => validate_exclusive_minimum,
        Keyword::MaxLength => validate_max_length,
        Keyword::MinLength => validate_min_length,
        Keyword::Pattern => validate_pattern,
        Keyword::Format => validate_format,
        Keyword::Items => validate_items,
        Keyword::AdditionalItems => validate_additional_items,
        Keyword::Contains => validate_contains,
        Keyword::MaxItems => validate_max_items,
        Keyword::MinItems => validate_min_items,
        Keyword::UniqueItems => validate_unique_items,
        Keyword::Properties => validate_properties,
        Keyword::PatternProperties => validate_pattern_properties,
        Keyword::AdditionalProperties => validate_additional_properties,
        Keyword::Dependencies => validate_dependencies,
        Keyword::DependentRequired => validate_dependencies,
        Keyword::DependentSchemas => validate_dependencies,
        Keyword::PropertyNames => validate_property_names,
        Keyword::MaxProperties => validate_max_properties,
        Keyword::MinProperties => validate_min_properties,
        Keyword::UnevaluatedItems => validate_unevaluated_items,
        Keyword::UnevaluatedProperties => validate_unevaluated_properties,
        _ => return None,
    };
    Some(Arc::new(hook))
}

// ---------------------------------------------------------------------------
// Structural
// ---------------------------------------------------------------------------

fn type_matches(name: &str, instance: &Value) -> bool {
    match name {
        "integer" => is_integer(instance),
        "number" => instance.is_number(),
        other => json_type_name(instance) == other,
    }
}

fn validate_type(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let accepted = match value {
        Frozen::Text(name) => type_matches(name, instance),
        Frozen::Seq(names) => names
            .iter()
            .filter_map(Frozen::as_str)
            .any(|name| type_matches(name, instance)),
        _ => true,
    };
    if !accepted {
        scope.fail(ErrorKind::TypeMismatch, format!("{instance} is not of type {value}"));
    }
}

fn validate_enum(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let options = value.as_seq().unwrap_or_default();
    if !options.iter().any(|option| option.equals_value(instance)) {
        scope.fail(ErrorKind::OutOfRange, format!("{instance} is not one of {value}"));
    }
}

fn validate_const(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    if !value.equals_value(instance) {
        scope.fail(ErrorKind::OutOfRange, format!("{value} was expected, found {instance}"));
    }
}

fn validate_required(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let Value::Object(object) = instance else { return };
    for name in value.as_seq().unwrap_or_default().iter().filter_map(Frozen::as_str) {
        if scope.is_full() {
            return;
        }
        if !object.contains_key(name) {
            scope.fail(ErrorKind::RequiredMissing, format!("{name:?} is a required property"));
        }
    }
}

// ---------------------------------------------------------------------------
// Composite
// ---------------------------------------------------------------------------

fn validate_ref(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    if let Some(reference) = value.as_str() {
        scope.descend_reference(reference, instance);
    }
}

fn validate_all_of(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    for (i, branch) in value.as_seq().unwrap_or_default().iter().enumerate() {
        if scope.is_full() {
            return;
        }
        scope.descend(Some(i.into()), branch, None, instance);
    }
}

fn validate_any_of(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let mut children = Vec::new();
    for (i, branch) in value.as_seq().unwrap_or_default().iter().enumerate() {
        let failures = scope.probe(Some(i.into()), branch, instance);
        if failures.is_empty() {
            return;
        }
        children.extend(failures);
    }
    scope.fail_with_children(
        ErrorKind::AnyOfFailed,
        format!("{instance} is not valid under any of the given schemas"),
        children,
    );
}

fn validate_one_of(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let mut children = Vec::new();
    let mut accepted = Vec::new();
    for (i, branch) in value.as_seq().unwrap_or_default().iter().enumerate() {
        let failures = scope.probe(Some(i.into()), branch, instance);
        if failures.is_empty() {
            accepted.push(i);
        } else {
            children.extend(failures);
        }
    }
    match accepted.len() {
        1 => {}
        0 => scope.fail_with_children(
            ErrorKind::Negation,
            format!("{instance} is not valid under any of the given schemas"),
            children,
        ),
        _ => scope.fail(
            ErrorKind::Negation,
            format!("{instance} is valid under more than one of the given schemas (branches {accepted:?})"),
        ),
    }
}

fn validate_not(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    if scope.probe(None, value, instance).is_empty() {
        scope.fail(ErrorKind::Negation, format!("{instance} should not be valid under {value}"));
    }
}

fn validate_if(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let holds = scope.probe(None, value, instance).is_empty();
    let branch = if holds { "then" } else { "else" };
    if let Some(subschema) = scope.sibling(branch) {
        scope.descend_sibling(branch, subschema, instance);
    }
}

// ---------------------------------------------------------------------------
// Numeric
// ---------------------------------------------------------------------------

fn compare(number: &Number, bound: &Frozen) -> Option<Ordering> {
    match (number_as_i128(number), bound) {
        (Some(n), Frozen::Integer(b)) => Some(n.cmp(b)),
        _ => number.as_f64()?.partial_cmp(&bound.as_f64()?),
    }
}

fn check_bound(
    scope: &mut Scope<'_, '_>,
    bound: &Frozen,
    instance: &Value,
    allowed: &[Ordering],
    relation: &str,
) {
    let Value::Number(number) = instance else { return };
    if let Some(ordering) = compare(number, bound) {
        if !allowed.contains(&ordering) {
            scope.fail(ErrorKind::OutOfRange, format!("{instance} is {relation} {bound}"));
        }
    }
}

fn validate_maximum(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    check_bound(scope, value, instance, &[Ordering::Less, Ordering::Equal], "greater than the maximum of");
}

fn validate_exclusive_maximum(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    check_bound(scope, value, instance, &[Ordering::Less], "greater than or equal to the exclusive maximum of");
}

fn validate_minimum(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    check_bound(scope, value, instance, &[Ordering::Greater, Ordering::Equal], "less than the minimum of");
}

fn validate_exclusive_minimum(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    check_bound(scope, value, instance, &[Ordering::Greater], "less than or equal to the exclusive minimum of");
}

fn validate_multiple_of(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let Value::Number(number) = instance else { return };
    let divides = match (number_as_i128(number), value) {
        (Some(n), Frozen::Integer(d)) if *d != 0 => n % d == 0,
        _ => match (number.as_f64(), value.as_f64()) {
            (Some(n), Some(d)) if d != 0.0 => {
                let quotient = n / d;
                quotient.is_finite() && (quotient - quotient.round()).abs() < 1e-9
            }
            _ => true,
        },
    };
    if !divides {
        scope.fail(ErrorKind::OutOfRange, format!("{instance} is not a multiple of {value}"));
    }
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

fn validate_max_length(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let (Value::String(s), Some(limit)) = (instance, value.as_i128()) else { return };
    if s.chars().count() as i128 > limit {
        scope.fail(ErrorKind::OutOfRange, format!("{instance} is longer than {limit} characters"));
    }
}

fn validate_min_length(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let (Value::String(s), Some(limit)) = (instance, value.as_i128()) else { return };
    if (s.chars().count() as i128) < limit {
        scope.fail(ErrorKind::OutOfRange, format!("{instance} is shorter than {limit} characters"));
    }
}

fn validate_pattern(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let (Value::String(s), Some(pattern)) = (instance, value.as_str()) else { return };
    match scope.regex(pattern) {
        Ok(regex) if regex.is_match(s) => {}
        Ok(_) => scope.fail(ErrorKind::PatternMismatch, format!("{instance} does not match {pattern:?}")),
        Err(reason) => scope.fail(ErrorKind::PatternMismatch, format!("pattern {pattern:?} is invalid: {reason}")),
    }
}

fn validate_format(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let (Value::String(s), Some(name)) = (instance, value.as_str()) else { return };
    if !scope.assert_formats() {
        return;
    }
    match scope.formats().check(name, s) {
        None => tracing::warn!(format = name, "unknown format, treated as annotation"),
        Some(Ok(())) => {}
        Some(Err(reason)) => {
            scope.fail(ErrorKind::PatternMismatch, format!("{instance} is not a valid {name}: {reason}"))
        }
    }
}

// ---------------------------------------------------------------------------
// Arrays
// ---------------------------------------------------------------------------

fn validate_items(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let Value::Array(items) = instance else { return };
    match value {
        Frozen::Seq(tuple) => {
            for (i, (schema, item)) in tuple.iter().zip(items).enumerate() {
                if scope.is_full() {
                    return;
                }
                scope.descend(Some(i.into()), schema, Some(i.into()), item);
            }
        }
        schema => {
            for (i, item) in items.iter().enumerate() {
                if scope.is_full() {
                    return;
                }
                scope.descend(None, schema, Some(i.into()), item);
            }
        }
    }
}

fn validate_additional_items(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let Value::Array(items) = instance else { return };
    let Some(Frozen::Seq(tuple)) = scope.sibling("items") else { return };
    let start = tuple.len();
    if items.len() <= start {
        return;
    }
    if matches!(value, Frozen::Bool(false)) {
        scope.fail(
            ErrorKind::OutOfRange,
            format!("additional items are not allowed ({} given, {start} declared)", items.len()),
        );
        return;
    }
    for (i, item) in items.iter().enumerate().skip(start) {
        if scope.is_full() {
            return;
        }
        scope.descend(None, value, Some(i.into()), item);
    }
}

fn validate_contains(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let Value::Array(items) = instance else { return };
    let root = scope.root();
    let matching = items.iter().filter(|item| scope.check(value, root, item)).count() as i128;
    let min = scope.sibling("minContains").and_then(Frozen::as_i128).unwrap_or(1);
    let max = scope.sibling("maxContains").and_then(Frozen::as_i128);
    if matching < min {
        scope.fail(
            ErrorKind::OutOfRange,
            format!("{instance} contains {matching} matching items, at least {min} required"),
        );
    } else if let Some(max) = max.filter(|max| matching > *max) {
        scope.fail(
            ErrorKind::OutOfRange,
            format!("{instance} contains {matching} matching items, at most {max} allowed"),
        );
    }
}

fn validate_max_items(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let (Value::Array(items), Some(limit)) = (instance, value.as_i128()) else { return };
    if items.len() as i128 > limit {
        scope.fail(ErrorKind::OutOfRange, format!("{instance} has more than {limit} items"));
    }
}

fn validate_min_items(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let (Value::Array(items), Some(limit)) = (instance, value.as_i128()) else { return };
    if (items.len() as i128) < limit {
        scope.fail(ErrorKind::OutOfRange, format!("{instance} has fewer than {limit} items"));
    }
}

fn validate_unique_items(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let (Value::Array(items), Some(true)) = (instance, value.as_bool()) else { return };
    for (i, a) in items.iter().enumerate() {
        if items[i + 1..].iter().any(|b| json_equal(a, b)) {
            scope.fail(ErrorKind::OutOfRange, format!("{instance} has non-unique elements"));
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

fn validate_properties(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let (Value::Object(object), Some(properties)) = (instance, value.as_map()) else { return };
    for (name, schema) in properties.iter() {
        if scope.is_full() {
            return;
        }
        if let Some(member) = object.get(name) {
            scope.descend(Some(name.as_str().into()), schema, Some(name.as_str().into()), member);
        }
    }
}

fn validate_pattern_properties(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let (Value::Object(object), Some(patterns)) = (instance, value.as_map()) else { return };
    for (pattern, schema) in patterns.iter() {
        let regex = match scope.regex(pattern) {
            Ok(regex) => regex,
            Err(reason) => {
                scope.fail(ErrorKind::PatternMismatch, format!("pattern {pattern:?} is invalid: {reason}"));
                continue;
            }
        };
        for (key, member) in object.iter().filter(|(k, _)| regex.is_match(k)) {
            if scope.is_full() {
                return;
            }
            scope.descend(Some(pattern.as_str().into()), schema, Some(key.as_str().into()), member);
        }
    }
}

/// Keys of `object` not covered by sibling `properties` or `patternProperties`.
fn additional_keys<'v>(scope: &Scope<'_, '_>, object: &'v Map<String, Value>) -> Vec<(&'v String, &'v Value)> {
    let declared = scope.sibling("properties").and_then(Frozen::as_map);
    let patterns: Vec<_> = scope
        .sibling("patternProperties")
        .and_then(Frozen::as_map)
        .map(|m| m.keys().filter_map(|p| scope.regex(p).ok()).collect())
        .unwrap_or_default();
    object
        .iter()
        .filter(|(k, _)| !declared.is_some_and(|d| d.contains_key(k.as_str())))
        .filter(|(k, _)| !patterns.iter().any(|r| r.is_match(k)))
        .collect()
}

fn validate_additional_properties(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let Value::Object(object) = instance else { return };
    let extras = additional_keys(scope, object);
    for (key, member) in extras {
        if scope.is_full() {
            return;
        }
        if matches!(value, Frozen::Bool(false)) {
            scope.fail_at(
                key.as_str(),
                ErrorKind::UnknownKey,
                format!("additional property {key:?} is not allowed"),
            );
        } else {
            scope.descend(None, value, Some(key.as_str().into()), member);
        }
    }
}

fn validate_dependencies(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let (Value::Object(object), Some(dependencies)) = (instance, value.as_map()) else { return };
    for (key, dependency) in dependencies.iter() {
        if scope.is_full() {
            return;
        }
        if !object.contains_key(key) {
            continue;
        }
        match dependency {
            Frozen::Seq(names) => {
                for name in names.iter().filter_map(Frozen::as_str) {
                    if !object.contains_key(name) {
                        scope.fail(
                            ErrorKind::RequiredMissing,
                            format!("{name:?} is a dependency of {key:?}"),
                        );
                    }
                }
            }
            schema => scope.descend(Some(key.as_str().into()), schema, None, instance),
        }
    }
}

fn validate_property_names(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let Value::Object(object) = instance else { return };
    for key in object.keys() {
        if scope.is_full() {
            return;
        }
        scope.descend(None, value, Some(key.as_str().into()), &Value::String(key.clone()));
    }
}

fn validate_max_properties(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let (Value::Object(object), Some(limit)) = (instance, value.as_i128()) else { return };
    if object.len() as i128 > limit {
        scope.fail(ErrorKind::OutOfRange, format!("object has more than {limit} properties"));
    }
}

fn validate_min_properties(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let (Value::Object(object), Some(limit)) = (instance, value.as_i128()) else { return };
    if (object.len() as i128) < limit {
        scope.fail(ErrorKind::OutOfRange, format!("object has fewer than {limit} properties"));
    }
}

// ---------------------------------------------------------------------------
// Unevaluated members
// ---------------------------------------------------------------------------

/// Keys of `object` evaluated by the applicators of `schema`, following
/// valid branches of composites and `$ref` targets.
///
/// Composites run in an earlier phase, so the branch checks here are
/// answered from the scope's memo.
fn evaluated_keys(
    scope: &Scope<'_, '_>,
    schema: &FrozenMap,
    root: &Frozen,
    object: &Map<String, Value>,
    instance: &Value,
    hops: usize,
) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    if schema.contains_key("additionalProperties") || schema.contains_key("unevaluatedProperties") {
        return object.keys().cloned().collect();
    }
    if let Some(properties) = schema.get("properties").and_then(Frozen::as_map) {
        keys.extend(object.keys().filter(|k| properties.contains_key(k.as_str())).cloned());
    }
    if let Some(patterns) = schema.get("patternProperties").and_then(Frozen::as_map) {
        for pattern in patterns.keys() {
            if let Ok(regex) = scope.regex(pattern) {
                keys.extend(object.keys().filter(|k| regex.is_match(k)).cloned());
            }
        }
    }
    let follow = |sub: &Frozen, root: &Frozen, keys: &mut BTreeSet<String>| {
        if let Some(map) = sub.as_map() {
            keys.extend(evaluated_keys(scope, map, root, object, instance, hops));
        } else if matches!(sub, Frozen::Bool(true)) {
            keys.extend(object.keys().cloned());
        }
    };
    for branch in schema.get("allOf").and_then(Frozen::as_seq).unwrap_or_default() {
        follow(branch, root, &mut keys);
    }
    for keyword in ["anyOf", "oneOf"] {
        for branch in schema.get(keyword).and_then(Frozen::as_seq).unwrap_or_default() {
            if scope.check(branch, root, instance) {
                follow(branch, root, &mut keys);
            }
        }
    }
    if let Some(condition) = schema.get("if") {
        if scope.check(condition, root, instance) {
            follow(condition, root, &mut keys);
            if let Some(then) = schema.get("then") {
                follow(then, root, &mut keys);
            }
        } else if let Some(otherwise) = schema.get("else") {
            follow(otherwise, root, &mut keys);
        }
    }
    if let Some(dependents) = schema.get("dependentSchemas").and_then(Frozen::as_map) {
        for (key, sub) in dependents.iter() {
            if object.contains_key(key) {
                follow(sub, root, &mut keys);
            }
        }
    }
    if let Some(reference) = schema.get("$ref").and_then(Frozen::as_str) {
        if hops < crate::scope::MAX_REFERENCE_DEPTH {
            if let Some((target, target_root)) = scope.resolve_reference(reference) {
                if let Some(map) = target.as_map() {
                    keys.extend(evaluated_keys(scope, map, &target_root, object, instance, hops + 1));
                }
            }
        }
    }
    keys
}

fn validate_unevaluated_properties(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let Value::Object(object) = instance else { return };
    let mut siblings = scope.schema().clone();
    siblings.remove("unevaluatedProperties");
    let root = scope.root();
    let evaluated = evaluated_keys(scope, &siblings, root, object, instance, scope.ref_depth());
    for (key, member) in object.iter().filter(|(k, _)| !evaluated.contains(k.as_str())) {
        if scope.is_full() {
            return;
        }
        if matches!(value, Frozen::Bool(false)) {
            scope.fail_at(
                key.as_str(),
                ErrorKind::UnknownKey,
                format!("unevaluated property {key:?} is not allowed"),
            );
        } else {
            scope.descend(None, value, Some(PathSegment::Key(key.clone())), member);
        }
    }
}

/// Number of leading items evaluated by the applicators of `schema`
/// (`usize::MAX` when every item is).
fn evaluated_prefix(scope: &Scope<'_, '_>, schema: &FrozenMap, root: &Frozen, instance: &Value, hops: usize) -> usize {
    match schema.get("items") {
        Some(Frozen::Seq(tuple)) => {
            if schema.contains_key("additionalItems") {
                return usize::MAX;
            }
            let mut prefix = tuple.len();
            prefix = prefix.max(nested_prefix(scope, schema, root, instance, hops));
            return prefix;
        }
        Some(_) => return usize::MAX,
        None => {}
    }
    if schema.contains_key("unevaluatedItems") {
        return usize::MAX;
    }
    nested_prefix(scope, schema, root, instance, hops)
}

fn nested_prefix(scope: &Scope<'_, '_>, schema: &FrozenMap, root: &Frozen, instance: &Value, hops: usize) -> usize {
    let mut prefix = 0;
    let follow = |sub: &Frozen, root: &Frozen| match sub {
        Frozen::Map(map) => evaluated_prefix(scope, map, root, instance, hops),
        Frozen::Bool(true) => usize::MAX,
        _ => 0,
    };
    for branch in schema.get("allOf").and_then(Frozen::as_seq).unwrap_or_default() {
        prefix = prefix.max(follow(branch, root));
    }
    for keyword in ["anyOf", "oneOf"] {
        for branch in schema.get(keyword).and_then(Frozen::as_seq).unwrap_or_default() {
            if scope.check(branch, root, instance) {
                prefix = prefix.max(follow(branch, root));
            }
        }
    }
    if let Some(condition) = schema.get("if") {
        if scope.check(condition, root, instance) {
            prefix = prefix.max(follow(condition, root));
            if let Some(then) = schema.get("then") {
                prefix = prefix.max(follow(then, root));
            }
        } else if let Some(otherwise) = schema.get("else") {
            prefix = prefix.max(follow(otherwise, root));
        }
    }
    if let Some(reference) = schema.get("$ref").and_then(Frozen::as_str) {
        if hops < crate::scope::MAX_REFERENCE_DEPTH {
            if let Some((target, target_root)) = scope.resolve_reference(reference) {
                if let Some(map) = target.as_map() {
                    prefix = prefix.max(evaluated_prefix(scope, map, &target_root, instance, hops + 1));
                }
            }
        }
    }
    prefix
}

fn validate_unevaluated_items(scope: &mut Scope<'_, '_>, value: &Frozen, instance: &Value) {
    let Value::Array(items) = instance else { return };
    let mut siblings = scope.schema().clone();
    siblings.remove("unevaluatedItems");
    let root = scope.root();
    let prefix = evaluated_prefix(scope, &siblings, root, instance, scope.ref_depth());
    if prefix >= items.len() {
        return;
    }
    if matches!(value, Frozen::Bool(false)) {
        scope.fail(
            ErrorKind::OutOfRange,
            format!("unevaluated items are not allowed ({} given, {prefix} evaluated)", items.len()),
        );
        return;
    }
    for (i, item) in items.iter().enumerate().skip(prefix) {
        if scope.is_full() {
            return;
        }
        scope.descend(None, value, Some(i.into()), item);
    }
}
