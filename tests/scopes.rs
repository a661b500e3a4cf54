use std::cell::RefCell;
use std::rc::Rc;

use flowvars::scope::{MapScopeChain, TableKey};
use flowvars::{NodeId, ScopeId, ScopeMeta, VariableEngine};
use serde_json::{json, Value};
use test_log::test;

fn declarations(declarations: Value) -> Value {
    json!({ "kind": "VariableDeclarationList", "declarations": declarations })
}

fn output(engine: &VariableEngine, scope: &ScopeId, key: &str) -> NodeId {
    engine.get_scope_by_id(scope).unwrap().output().get_variable_by_key(key).unwrap()
}

fn initializer(engine: &VariableEngine, field: NodeId) -> NodeId {
    engine.node(field).and_then(|node| node.field()).and_then(|field| field.initializer()).unwrap()
}

fn kind_of(engine: &VariableEngine, ty: Option<NodeId>) -> Option<String> {
    let ty = engine.to_json(ty?)?;
    Some(ty["kind"].as_str()?.to_string())
}

#[test]
fn available_variables_follow_dependencies() {
    let chain = MapScopeChain::default();
    chain.set_deps("s2", ["s1"]);
    let mut engine = VariableEngine::new(chain);
    let s1 = engine.create_scope("s1", ScopeMeta::default()).unwrap();
    engine.set_var(&s1, declarations(json!([{ "key": "str", "type": "String" }]))).unwrap();
    let s2 = engine.create_scope("s2", ScopeMeta::default()).unwrap();

    let available = engine.available_variables(&s2);
    assert_eq!(available.len(), 1);
    let key_path_owned = engine.key_path(available[0]);
    let key_path: Vec<&str> = key_path_owned.iter().map(|key| key.as_str()).collect();
    assert_eq!(key_path, vec!["str"]);
    assert_eq!(engine.get_scope_by_id(&s2).unwrap().available().variable_keys(), &["str"]);
    assert!(engine.available_variables(&s1).is_empty());
}

#[test]
fn outputs_are_sorted_by_order() {
    let mut engine = VariableEngine::new(MapScopeChain::default());
    let s = engine.create_scope("s", ScopeMeta::default()).unwrap();
    engine.set_var(&s, declarations(json!([
        { "key": "b", "type": "String", "order": 2 },
        { "key": "a", "type": "String", "order": 1 },
    ]))).unwrap();
    let keys = |engine: &VariableEngine| engine.output_variables(&s).iter()
        .map(|variable| engine.node(*variable).unwrap().key().to_string())
        .collect::<Vec<_>>();
    assert_eq!(keys(&engine), vec!["a", "b"]);

    engine.set_var(&s, declarations(json!([
        { "key": "b", "type": "String", "order": 0 },
        { "key": "a", "type": "String", "order": 1 },
    ]))).unwrap();
    assert_eq!(keys(&engine), vec!["b", "a"]);
}

#[test]
fn key_path_expressions_copy_the_referenced_type() {
    let chain = MapScopeChain::default();
    chain.set_deps("s2", ["s1"]);
    let mut engine = VariableEngine::new(chain);
    let s1 = engine.create_scope("s1", ScopeMeta::default()).unwrap();
    let s2 = engine.create_scope("s2", ScopeMeta::default()).unwrap();
    engine.set_var(&s1, declarations(json!([{ "key": "str", "type": "String" }]))).unwrap();
    engine.set_var(&s2, declarations(json!([{
        "key": "copy",
        "type": "Number",
        "initializer": { "kind": "KeyPathExpression", "keyPath": ["str"] }
    }]))).unwrap();

    let str_ = output(&engine, &s1, "str");
    let copy = output(&engine, &s2, "copy");
    let expression = initializer(&engine, copy);
    assert_eq!(engine.expression_refs(expression), &[Some(str_)]);
    assert_eq!(kind_of(&engine, engine.field_type(copy)).as_deref(), Some("String"));
    assert_ne!(engine.field_type(copy), engine.field_type(str_));

    engine.set_var(&s1, declarations(json!([{ "key": "str", "type": "Number" }]))).unwrap();
    assert_eq!(kind_of(&engine, engine.field_type(copy)).as_deref(), Some("Number"));

    engine.clear_var(&s1, None).unwrap();
    assert_eq!(engine.expression_refs(expression), &[] as &[Option<NodeId>]);
    assert_eq!(engine.field_type(copy), None);
}

#[test]
fn key_paths_drill_into_object_types() {
    let chain = MapScopeChain::default();
    chain.set_deps("s2", ["s1"]);
    let mut engine = VariableEngine::new(chain);
    let s1 = engine.create_scope("s1", ScopeMeta::default()).unwrap();
    let s2 = engine.create_scope("s2", ScopeMeta::default()).unwrap();
    engine.set_var(&s1, declarations(json!([{
        "key": "user",
        "type": {
            "kind": "Object",
            "properties": [{ "key": "name", "type": "String" }]
        }
    }]))).unwrap();

    let name = engine.available_get_by_key_path(&s2, &["user".into(), "name".into()]).unwrap();
    assert_eq!(engine.node(name).unwrap().key(), "name");
    assert_eq!(engine.key_path(name).len(), 2);
    assert_eq!(engine.available_get_by_key_path(&s1, &["user".into()]), None);
    assert_eq!(engine.table_get_by_key_path(&TableKey::Output(s1.clone()), &["user".into(), "name".into()]), Some(name));
}

#[test]
fn reference_cycle_is_refused() {
    let chain = MapScopeChain::default();
    chain.set_deps("a", ["b"]);
    chain.set_deps("b", ["a"]);
    let mut engine = VariableEngine::new(chain);
    let a = engine.create_scope("a", ScopeMeta::default()).unwrap();
    let b = engine.create_scope("b", ScopeMeta::default()).unwrap();
    engine.refresh_all_change();

    engine.set_var(&a, declarations(json!([{
        "key": "x",
        "initializer": { "kind": "KeyPathExpression", "keyPath": ["y"] }
    }]))).unwrap();
    engine.set_var(&b, declarations(json!([{
        "key": "y",
        "initializer": { "kind": "KeyPathExpression", "keyPath": ["x"] }
    }]))).unwrap();

    let x = output(&engine, &a, "x");
    let y = output(&engine, &b, "y");
    assert_eq!(engine.expression_refs(initializer(&engine, y)), &[Some(x)]);
    assert!(engine.expression_refs(initializer(&engine, x)).is_empty());
    assert!(engine.check_ref_cycle(initializer(&engine, x), &[Some(y)]));
}

#[test]
fn one_change_per_batch() {
    let mut engine = VariableEngine::new(MapScopeChain::default());
    let s = engine.create_scope("s", ScopeMeta::default()).unwrap();
    let list = engine.set_var(&s, declarations(json!([]))).unwrap();

    let changes = Rc::new(RefCell::new(0));
    let changes2 = changes.clone();
    engine.subscribe(list, move |_, _| *changes2.borrow_mut() += 1, Default::default()).unwrap();
    engine.set_var(&s, declarations(json!([
        { "key": "a", "type": "String" },
        { "key": "b", "type": "Number" },
        { "key": "c", "type": "Boolean" },
    ]))).unwrap();
    assert_eq!(*changes.borrow(), 1);
    assert_eq!(engine.output_variables(&s).len(), 3);

    engine.set_var(&s, declarations(json!([
        { "key": "a", "type": "String" },
        { "key": "b", "type": "Number" },
        { "key": "c", "type": "Boolean" },
    ]))).unwrap();
    assert_eq!(*changes.borrow(), 1);
}

#[test]
fn enumerate_yields_array_items() {
    let chain = MapScopeChain::default();
    chain.set_deps("s2", ["s1"]);
    let mut engine = VariableEngine::new(chain);
    let s1 = engine.create_scope("s1", ScopeMeta::default()).unwrap();
    let s2 = engine.create_scope("s2", ScopeMeta::default()).unwrap();
    engine.set_var(&s1, declarations(json!([
        { "key": "tags", "type": { "kind": "Array", "items": "String" } },
        { "key": "str", "type": "Number" },
    ]))).unwrap();
    let enumerate = |key: &str| json!({
        "kind": "EnumerateExpression",
        "enumerateFor": { "kind": "KeyPathExpression", "keyPath": [key] },
    });
    engine.set_var(&s2, declarations(json!([
        { "key": "tag", "initializer": enumerate("tags") },
        { "key": "nothing", "initializer": enumerate("str") },
    ]))).unwrap();

    let tag = output(&engine, &s2, "tag");
    assert_eq!(kind_of(&engine, engine.field_type(tag)).as_deref(), Some("String"));
    assert_eq!(engine.expression_return_type(initializer(&engine, tag)), engine.field_type(tag));
    let nothing = output(&engine, &s2, "nothing");
    assert_eq!(engine.field_type(nothing), None);
}

#[test]
fn wrap_array_follows_the_wrapped_type() {
    let chain = MapScopeChain::default();
    chain.set_deps("s2", ["s1"]);
    let mut engine = VariableEngine::new(chain);
    let s1 = engine.create_scope("s1", ScopeMeta::default()).unwrap();
    let s2 = engine.create_scope("s2", ScopeMeta::default()).unwrap();
    engine.set_var(&s1, declarations(json!([{ "key": "str", "type": "String" }]))).unwrap();
    engine.set_var(&s2, declarations(json!([{
        "key": "list",
        "initializer": {
            "kind": "WrapArrayExpression",
            "wrapFor": { "kind": "KeyPathExpression", "keyPath": ["str"] },
        },
    }]))).unwrap();

    let list = output(&engine, &s2, "list");
    let items_kind = |engine: &VariableEngine| {
        let ty = engine.to_json(engine.field_type(list)?)?;
        assert_eq!(ty["kind"], "Array");
        Some(ty["items"]["kind"].as_str()?.to_string())
    };
    assert_eq!(items_kind(&engine).as_deref(), Some("String"));

    engine.set_var(&s1, declarations(json!([{ "key": "str", "type": "Number" }]))).unwrap();
    assert_eq!(items_kind(&engine).as_deref(), Some("Number"));

    engine.clear_var(&s1, None).unwrap();
    assert_eq!(items_kind(&engine), None);
    assert_eq!(kind_of(&engine, engine.field_type(list)).as_deref(), Some("Array"));
}
