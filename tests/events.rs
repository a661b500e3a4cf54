use std::cell::RefCell;
use std::rc::Rc;

use flowvars::reactive::SubscribeOptions;
use flowvars::scope::{GlobalEventKind, MapScopeChain, ScopeChange, ScopeChangeKind};
use flowvars::{AstKind, NodeId, ScopeId, ScopeMeta, VariableEngine};
use serde_json::{json, Value};
use test_log::test;

fn declarations(declarations: Value) -> Value {
    json!({ "kind": "VariableDeclarationList", "declarations": declarations })
}

fn recorder<T>() -> (Rc<RefCell<Vec<T>>>, Rc<RefCell<Vec<T>>>) {
    let record = Rc::new(RefCell::new(Vec::new()));
    (record.clone(), record)
}

#[test]
fn list_updates_report_renames_and_removals() {
    let mut engine = VariableEngine::new(MapScopeChain::default());
    let s = engine.create_scope("s", ScopeMeta::default()).unwrap();
    engine.set_var(&s, declarations(json!([{ "key": "a", "type": "String" }, { "key": "b", "type": "Number" }]))).unwrap();

    let (renames, renames_out) = recorder::<(String, String)>();
    engine.on_rename(move |_, rename| {
        renames.borrow_mut().push((rename.before.key.to_string(), rename.after.key.to_string()))
    });
    let (removed, removed_out) = recorder::<String>();
    engine.on_dispose_in_list(move |_, field| removed.borrow_mut().push(field.key.to_string()));

    engine.set_var(&s, declarations(json!([{ "key": "c", "type": "String" }, { "key": "b", "type": "Number" }]))).unwrap();
    assert_eq!(*renames_out.borrow(), vec![("a".to_string(), "c".to_string())]);
    assert!(removed_out.borrow().is_empty());

    engine.set_var(&s, declarations(json!([{ "key": "c", "type": "String" }]))).unwrap();
    assert_eq!(*removed_out.borrow(), vec!["b"]);

    // same position, different type: not a rename
    engine.set_var(&s, declarations(json!([{ "key": "d", "type": "Number" }]))).unwrap();
    assert_eq!(*removed_out.borrow(), vec!["b", "c"]);
    assert_eq!(renames_out.borrow().len(), 1);
}

#[test]
fn tracked_key_path_follows_the_field() {
    let chain = MapScopeChain::default();
    chain.set_deps("s2", ["s1"]);
    let mut engine = VariableEngine::new(chain);
    let s1 = engine.create_scope("s1", ScopeMeta::default()).unwrap();
    let s2 = engine.create_scope("s2", ScopeMeta::default()).unwrap();

    let (tracked, tracked_out) = recorder::<Option<NodeId>>();
    engine.track_by_key_path(&s2, ["user", "name"], move |_, field| tracked.borrow_mut().push(field));
    assert_eq!(*tracked_out.borrow(), vec![None]);

    let user = |format: &str| declarations(json!([{
        "key": "user",
        "type": { "kind": "Object", "properties": [{ "key": "name", "type": { "kind": "String", "format": format } }] },
    }]));
    engine.set_var(&s1, user("email")).unwrap();
    let name = engine.available_get_by_key_path(&s2, &["user".into(), "name".into()]).unwrap();
    assert_eq!(*tracked_out.borrow(), vec![None, Some(name)]);

    engine.set_var(&s1, user("uri")).unwrap();
    assert_eq!(*tracked_out.borrow(), vec![None, Some(name), Some(name)]);

    engine.clear_var(&s1, None).unwrap();
    assert_eq!(*tracked_out.borrow(), vec![None, Some(name), Some(name), None]);
}

#[test]
fn scope_changes_are_announced() {
    let chain = MapScopeChain::default();
    chain.set_deps("s2", ["s1"]);
    let mut engine = VariableEngine::new(chain);
    let (changes, changes_out) = recorder::<ScopeChange>();
    engine.on_scope_change(move |_, change| changes.borrow_mut().push(change));

    let s1 = engine.create_scope("s1", ScopeMeta::default()).unwrap();
    let s2 = engine.create_scope("s2", ScopeMeta::default()).unwrap();
    let has = |kind: ScopeChangeKind, scope: &ScopeId| {
        changes_out.borrow().iter().any(|change| change.kind == kind && &change.scope == scope)
    };
    assert!(has(ScopeChangeKind::Add, &s1));
    assert!(has(ScopeChangeKind::Add, &s2));

    engine.set_var(&s1, declarations(json!([{ "key": "a", "type": "String" }]))).unwrap();
    assert!(has(ScopeChangeKind::Update, &s1));
    assert!(has(ScopeChangeKind::Available, &s2));
    assert!(!has(ScopeChangeKind::Available, &s1));

    assert!(engine.remove_scope_by_id(&s1));
    assert!(has(ScopeChangeKind::Delete, &s1));
    assert!(engine.available_variables(&s2).is_empty());
    assert!(!engine.remove_scope_by_id(&s1));
}

#[test]
fn scope_events_describe_the_ast() {
    let mut engine = VariableEngine::new(MapScopeChain::default());
    let s = engine.create_scope("s", ScopeMeta::default()).unwrap();
    let (created, created_out) = recorder::<String>();
    engine.on_scope_event(&s, Some(GlobalEventKind::NewAst), move |_, event| {
        if let Some(ast) = event.ast.filter(|ast| ast.is(AstKind::VariableDeclaration)) {
            created.borrow_mut().push(ast.key.to_string());
        }
    });
    let (disposed, disposed_out) = recorder::<String>();
    engine.on_global_event(Some(GlobalEventKind::DisposeAst), move |_, event| {
        if let Some(ast) = event.ast.filter(|ast| ast.is(AstKind::VariableDeclaration)) {
            disposed.borrow_mut().push(format!("{}:{}", event.scope, ast.key));
        }
    });

    engine.set_var(&s, declarations(json!([{ "key": "a", "type": "String" }, { "key": "b", "type": "Number" }]))).unwrap();
    assert_eq!(*created_out.borrow(), vec!["a", "b"]);

    engine.clear_var(&s, None).unwrap();
    assert_eq!(*disposed_out.borrow(), vec!["s:a", "s:b"]);
}

#[test]
fn subscriptions_end_with_their_scope() {
    let mut engine = VariableEngine::new(MapScopeChain::default());
    let s = engine.create_scope("s", ScopeMeta::default()).unwrap();
    let declaration = engine.set_var(&s, json!({ "kind": "VariableDeclaration", "key": "a", "type": "String" })).unwrap();
    let before = engine.subscription_count();

    engine.on_scope_event(&s, None, |_, _| {});
    engine.on_output_variable_list_change(&s, |_, _| {});
    engine.on_available_list_or_any_var_change(&s, |_, _| {});
    engine.on_type_change(declaration, |_, _| {}).unwrap();
    let global = engine.on_global_event(None, |_, _| {});
    assert_eq!(engine.subscription_count(), before + 5);

    engine.remove_scope_by_id(&s);
    assert_eq!(engine.subscription_count(), before + 1);
    assert!(engine.unsubscribe(global));
    assert!(!engine.unsubscribe(global));
}

#[test]
fn debounced_subscribers_see_one_change_per_flush() {
    let chain = MapScopeChain::default();
    chain.set_deps("s2", ["s1"]);
    let mut engine = VariableEngine::new(chain);
    let s1 = engine.create_scope("s1", ScopeMeta::default()).unwrap();
    let s2 = engine.create_scope("s2", ScopeMeta::default()).unwrap();
    engine.set_var(&s1, declarations(json!([{ "key": "str", "type": "String" }]))).unwrap();
    let copies = engine.set_var(&s2, declarations(json!([
        { "key": "x", "initializer": { "kind": "KeyPathExpression", "keyPath": ["str"] } },
        { "key": "y", "initializer": { "kind": "KeyPathExpression", "keyPath": ["str"] } },
    ]))).unwrap();

    let (every, every_out) = recorder::<NodeId>();
    engine.subscribe(copies, move |_, node| every.borrow_mut().push(node), SubscribeOptions::default()).unwrap();
    let (debounced, debounced_out) = recorder::<NodeId>();
    engine.subscribe(copies, move |_, node| debounced.borrow_mut().push(node), SubscribeOptions::debounce()).unwrap();

    // both copies re-type in the same flush
    engine.set_var(&s1, declarations(json!([{ "key": "str", "type": "Number" }]))).unwrap();
    assert!(every_out.borrow().len() > 1);
    assert_eq!(*debounced_out.borrow(), vec![copies]);
}

#[test]
fn trigger_on_init_delivers_the_current_value_once() {
    let mut engine = VariableEngine::new(MapScopeChain::default());
    let s = engine.create_scope("s", ScopeMeta::default()).unwrap();
    let json = json!({ "kind": "VariableDeclaration", "key": "a", "type": "String" });
    let declaration = engine.set_var(&s, json.clone()).unwrap();

    let (seen, seen_out) = recorder::<NodeId>();
    engine.subscribe(declaration, move |_, node| seen.borrow_mut().push(node), SubscribeOptions::trigger_on_init()).unwrap();
    assert_eq!(*seen_out.borrow(), vec![declaration]);

    engine.set_var(&s, json).unwrap();
    assert_eq!(seen_out.borrow().len(), 1);

    engine.set_var(&s, json!({ "kind": "VariableDeclaration", "key": "a", "type": "Number" })).unwrap();
    assert_eq!(*seen_out.borrow(), vec![declaration, declaration]);
}

#[test]
fn reapplying_own_json_changes_nothing() {
    let mut engine = VariableEngine::new(MapScopeChain::default());
    let s = engine.create_scope("s", ScopeMeta::default()).unwrap();
    let declaration = engine.set_var(&s, json!({
        "kind": "VariableDeclaration",
        "key": "user",
        "type": {
            "kind": "Object",
            "properties": [
                { "key": "name", "type": { "kind": "String", "format": "email" } },
                { "key": "tags", "type": { "kind": "Array", "items": "String" } },
            ],
        },
        "meta": { "title": "User" },
        "order": 2,
    })).unwrap();
    let hash = engine.node_hash(declaration);
    let (changes, changes_out) = recorder::<NodeId>();
    engine.subscribe(declaration, move |_, node| changes.borrow_mut().push(node), SubscribeOptions::default()).unwrap();

    let own_json = engine.to_json(declaration).unwrap();
    engine.from_json(declaration, &own_json).unwrap();
    assert_eq!(engine.node_hash(declaration), hash);
    assert!(changes_out.borrow().is_empty());
    assert_eq!(engine.to_json(declaration), Some(own_json));
}
