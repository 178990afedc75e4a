//! # End-to-End Scenarios
//!
//! Each test drives the public API the way a caller would: derive a
//! descriptor, build or mutate values through it, and check the error
//! kind and location on failure.

use schemata_core::ErrorKind;
use schemata_types::{Args, BuildError, Engine, EngineConfig, MutableList};
use serde_json::json;

fn engine() -> Engine {
    Engine::new(EngineConfig::default())
}

fn failing_keyword(err: &BuildError) -> String {
    let report = err.report().expect("validation failure carries a report");
    report.records()[0].schema_path.to_string()
}

#[test]
fn numeric_bound_intersection() {
    let engine = engine();
    let int = engine.integer().unwrap();
    let at_least_one = int.refine("minimum", json!(1)).unwrap();
    let d = at_least_one.refine("maximum", json!(10)).unwrap();

    assert_eq!(d.call(json!(5)).unwrap(), json!(5));

    let low = d.call(json!(0)).unwrap_err();
    assert_eq!(low.kind(), ErrorKind::OutOfRange);
    assert!(failing_keyword(&low).ends_with("minimum"));

    let high = d.call(json!(11)).unwrap_err();
    assert_eq!(high.kind(), ErrorKind::OutOfRange);
    assert!(failing_keyword(&high).ends_with("maximum"));
}

#[test]
fn string_pattern_with_length() {
    let engine = engine();
    let d = engine
        .descriptor(&json!({"type": "string", "pattern": "^[0-9]+$", "minLength": 2}))
        .unwrap();

    assert_eq!(d.call(json!("12")).unwrap(), json!("12"));
    assert_eq!(d.call(json!("1")).unwrap_err().kind(), ErrorKind::OutOfRange);
    assert_eq!(d.call(json!("ab")).unwrap_err().kind(), ErrorKind::PatternMismatch);
}

#[test]
fn union_dispatch_preserves_identity() {
    let engine = engine();
    let int = engine.integer().unwrap();
    let text = engine.text().unwrap();
    let d = (&int | &text).unwrap();

    let seven = d.call(json!(7)).unwrap();
    assert_eq!(seven, json!(7));
    assert!(seven.is_instance_of(&d));
    assert!(seven.branch().unwrap().ptr_eq(&int));

    let x = d.call(json!("x")).unwrap();
    assert_eq!(x, json!("x"));
    assert!(x.is_instance_of(&d));
    assert!(x.branch().unwrap().ptr_eq(&text));
}

#[test]
fn exactly_one_enforcement() {
    let engine = engine();
    let int = engine.integer().unwrap();
    let non_negative = int.refine("minimum", json!(0)).unwrap();
    let d = (&int ^ &non_negative).unwrap();

    assert_eq!(d.call(json!(-1)).unwrap(), json!(-1));
    assert_eq!(d.call(json!(5)).unwrap_err().kind(), ErrorKind::Negation);
}

#[test]
fn mapping_with_dependency_and_default() {
    let engine = engine();
    let int = engine.integer().unwrap();
    let zero_default = engine.descriptor(&json!({"type": "integer", "default": 0})).unwrap();
    let d = engine
        .object()
        .property("a", &int)
        .property("b", &zero_default)
        .dependency("a", ["b"])
        .intern()
        .unwrap();

    assert_eq!(d.call(json!({"a": 1})).unwrap(), json!({"a": 1, "b": 0}));
    assert_eq!(d.call(json!({"b": 0})).unwrap(), json!({"b": 0}));
    assert_eq!(d.call(json!({})).unwrap(), json!({}));
}

#[test]
fn deferred_update_rollback() {
    let engine = engine();
    let texts = engine.list(&engine.text().unwrap()).unwrap();
    let mut list = MutableList::new(&texts, json!(["a", "b"])).unwrap();

    let mut scope = list.batch();
    scope.append(json!(1)).unwrap();
    let err = scope.exit().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(list.value(), &json!(["a", "b"]));
}

#[test]
fn global_engine_is_shared() {
    let a = Engine::global().integer().unwrap();
    let b = Engine::global().descriptor(&json!({"type": "integer"})).unwrap();
    assert!(a.ptr_eq(&b));
    assert!(a.engine().ptr_eq(Engine::global()));
}

#[test]
fn nested_object_defaults() {
    let engine = engine();
    let d = engine
        .descriptor(&json!({
            "type": "object",
            "properties": {
                "inner": {"type": "object", "properties": {"x": {"default": 1}, "y": {"type": "string"}}},
                "pair": {"type": "array", "items": [{"default": "p"}, {"type": "integer", "default": 2}]}
            }
        }))
        .unwrap();

    let built = d.build(Args::new()).unwrap();
    assert_eq!(built, json!({"inner": {"x": 1}, "pair": ["p", 2]}));
    assert_eq!(d.call(json!({})).unwrap(), json!({}));
}

#[test]
fn large_integral_float_builds_as_integer() {
    let engine = engine();
    let int = engine.integer().unwrap();

    assert!(int.is_valid(&json!(1e20)));
    assert_eq!(int.call(json!(1e20)).unwrap(), json!(1e20));
    assert_eq!(int.call(json!(4.0)).unwrap(), json!(4));
    assert_eq!(int.call(json!(-1e20)).unwrap(), json!(-1e20));
}

#[test]
fn draft7_reference_siblings_are_inert() {
    let engine = engine();
    let d = engine
        .import(&json!({
            "definitions": {"count": {"type": "integer"}},
            "$ref": "#/definitions/count",
            "maximum": 0,
            "type": "string"
        }))
        .unwrap();

    assert_eq!(d.call(json!(5)).unwrap(), json!(5));
    assert_eq!(d.call(json!("5")).unwrap(), json!(5));
    assert_eq!(d.call(json!("x")).unwrap_err().kind(), ErrorKind::CoercionFailure);
}

#[test]
fn forward_intersection_keeps_reference_alone() {
    let engine = engine();
    let positive = engine.integer().unwrap().refine("minimum", json!(1)).unwrap();
    engine.define("Positive", &positive);
    let d = (&engine.forward("Positive").unwrap() & &engine.number().unwrap()).unwrap();

    let document = engine.ravel(&d);
    assert_eq!(document["allOf"], json!([{"$ref": "Positive"}]));
    assert_eq!(document["type"], json!("number"));
    assert_eq!(d.call(json!(3)).unwrap(), json!(3));
    assert_eq!(d.call(json!(0)).unwrap_err().kind(), ErrorKind::OutOfRange);
}

#[test]
fn shared_definition_names_survive_intersection() {
    let engine = engine();
    let small = engine
        .descriptor(&json!({"definitions": {"n": {"maximum": 10}}, "properties": {"a": {"$ref": "#/definitions/n"}}}))
        .unwrap();
    let positive = engine
        .descriptor(&json!({"definitions": {"n": {"minimum": 1}}, "properties": {"a": {"$ref": "#/definitions/n"}}}))
        .unwrap();
    let d = (&small & &positive).unwrap();

    assert_eq!(d.call(json!({"a": 5})).unwrap(), json!({"a": 5}));
    assert_eq!(d.call(json!({"a": 0})).unwrap_err().kind(), ErrorKind::OutOfRange);
    assert_eq!(d.call(json!({"a": 11})).unwrap_err().kind(), ErrorKind::OutOfRange);
}
