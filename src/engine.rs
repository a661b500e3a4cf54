use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use serde_json::{json, Value};
use smol_str::SmolStr;

use crate::ast::{AstArena, AstRegisters, NodeId};
use crate::misc::VecExtendNoDup;
use crate::reactive::{EventBus, Signal, Topic};
use crate::scope::{
    NodeScopes, Scope, ScopeChain, ScopeChainTransforms, ScopeChange, ScopeChangeKind, ScopeId, ScopeMeta, TableKey,
    VariableTable,
};
use crate::{EngineError, EngineResult, VariableEngineConfig};

/// Owns every scope, every AST node and every subscription.
///
/// All mutation goes through `&mut self`. Each public mutating operation delivers the
/// notifications it caused before returning, so observers always see a consistent engine.
pub struct VariableEngine {
    pub(crate) config: VariableEngineConfig,
    pub(crate) arena: AstArena,
    pub(crate) registers: AstRegisters,
    /// In creation order
    pub(crate) scopes: IndexMap<ScopeId, Scope>,
    /// Document node -> its public and private scope
    pub(crate) node_scopes: HashMap<SmolStr, NodeScopes>,
    pub(crate) chain: Box<dyn ScopeChain>,
    pub(crate) transforms: ScopeChainTransforms,
    pub(crate) global_table: VariableTable,
    pub(crate) watchers: Watchers,
    pub(crate) bus: EventBus,
    pub(crate) key_counter: u64,
}

/// Reverse indices used to propagate changes
#[derive(Debug, Default)]
pub(crate) struct Watchers {
    /// Field -> expressions referencing it
    pub refs: HashMap<NodeId, IndexSet<NodeId>>,
    /// Declaration -> scopes it's available to
    pub available: HashMap<NodeId, IndexSet<ScopeId>>,
}

impl VariableEngine {
    pub fn new(chain: impl ScopeChain + 'static) -> Self {
        Self::with_config(chain, VariableEngineConfig::default())
    }

    pub fn with_config(chain: impl ScopeChain + 'static, config: VariableEngineConfig) -> Self {
        VariableEngine {
            config,
            arena: AstArena::default(),
            registers: AstRegisters::new(),
            scopes: IndexMap::new(),
            node_scopes: HashMap::new(),
            chain: Box::new(chain),
            transforms: ScopeChainTransforms::default(),
            global_table: VariableTable::default(),
            watchers: Watchers::default(),
            bus: EventBus::default(),
            key_counter: 0,
        }
    }

    pub fn config(&self) -> &VariableEngineConfig {
        &self.config
    }

    pub fn registers(&self) -> &AstRegisters {
        &self.registers
    }

    /// Registers a host-defined type kind. Its nodes behave like `CustomType` nodes.
    pub fn register_custom_type(&mut self, kind: impl Into<SmolStr>) {
        self.registers.register_custom_type(kind)
    }

    /// Creates a scope, or returns the existing one with the same id.
    ///
    /// The new scope's dependencies are computed immediately. Existing scopes only see it once
    /// the chain is refreshed ([VariableEngine::refresh_all_change]).
    pub fn create_scope(&mut self, id: impl Into<ScopeId>, meta: ScopeMeta) -> EngineResult<ScopeId> {
        let id = id.into();
        if self.scopes.get(&id).map_or(false, |scope| !scope.disposed) {
            return Ok(id);
        }
        log::debug!("creating scope {}", id);

        let root = self.arena.next_id();
        let node = meta.node.clone().map(|node| (node, meta.scope_type));
        self.scopes.insert(id.clone(), Scope::new(id.clone(), meta, root));
        let created = self.create_ast(&json!({ "kind": "MapNode", "key": id.to_string() }), &id, None);
        match created {
            Ok(created) => debug_assert_eq!(created, root),
            Err(error) => {
                self.scopes.shift_remove(&id);
                return Err(error);
            }
        }
        if let Some((node, scope_type)) = node {
            *self.node_scopes.entry(node).or_default().slot_mut(scope_type) = Some(id.clone());
        }

        self.emit(Topic::ScopeChange, || Signal::ScopeChange(ScopeChange {
            kind: ScopeChangeKind::Add,
            scope: id.clone(),
        }));
        for scope in self.scopes.values_mut() {
            scope.covers.take();
        }
        self.refresh_deps(&id);
        self.flush();
        Ok(id)
    }

    /// The global scope, created (and the whole chain refreshed) if it doesn't exist yet
    pub fn global_scope(&mut self) -> EngineResult<ScopeId> {
        if self.scopes.contains_key(&ScopeId::Global) {
            return Ok(ScopeId::Global);
        }
        let id = self.create_scope(ScopeId::Global, ScopeMeta::default())?;
        self.refresh_all_change();
        Ok(id)
    }

    pub fn get_scope_by_id(&self, id: &ScopeId) -> Option<&Scope> {
        self.scopes.get(id).filter(|scope| !scope.disposed)
    }

    /// Scopes of a document node
    pub fn node_scopes(&self, node: &str) -> Option<&NodeScopes> {
        self.node_scopes.get(node)
    }

    /// Every scope in creation order, or if `sort`, the chain's order followed by the scopes the
    /// chain doesn't order
    pub fn get_all_scopes(&self, sort: bool) -> Vec<&Scope> {
        let mut ids: Vec<ScopeId> = Vec::new();
        if sort {
            ids.extend_no_dup(self.chain.sort_all(self).into_iter().filter(|id| self.scopes.contains_key(id)));
        }
        ids.extend_no_dup(self.scopes.keys().cloned());
        ids.iter()
            .filter_map(|id| self.get_scope_by_id(id))
            .collect()
    }

    /// Disposes a scope: its AST, its output, and its place in the chain. Returns `false` if it
    /// doesn't exist.
    pub fn remove_scope_by_id(&mut self, id: &ScopeId) -> bool {
        let removed = self.remove_scope_unflushed(id);
        self.flush();
        removed
    }

    fn remove_scope_unflushed(&mut self, id: &ScopeId) -> bool {
        let Some(scope) = self.get_scope_by_id(id) else {
            return false;
        };
        log::debug!("removing scope {}", id);
        let root = scope.ast;
        let had_output = !scope.output.table.is_empty();
        let covers = self.cover_scopes(id).to_vec();
        let deps = self.dep_scopes(id).to_vec();

        self.dispose_node(root);
        let Some(scope) = self.scopes.get_mut(id) else {
            return false;
        };
        scope.disposed = true;
        let leftovers: Vec<(SmolStr, NodeId)> = scope.output.table.table.drain(..).collect();
        let available = std::mem::take(&mut scope.available.variables);
        for (key, variable) in leftovers {
            self.remove_variable_from_table(&TableKey::Global, &key, variable);
        }
        if had_output {
            self.fire_table_change(&TableKey::Global);
        }

        for variable in available {
            if let Some(scopes) = self.watchers.available.get_mut(&variable) {
                scopes.shift_remove(id);
                if scopes.is_empty() {
                    self.watchers.available.remove(&variable);
                }
            }
        }
        if let Some(scope) = self.scopes.shift_remove(id) {
            if let Some(node) = &scope.meta.node {
                if let Some(node_scopes) = self.node_scopes.get_mut(node) {
                    let slot = node_scopes.slot_mut(scope.meta.scope_type);
                    if slot.as_ref() == Some(id) {
                        *slot = None;
                    }
                    if node_scopes.is_empty() {
                        self.node_scopes.remove(node);
                    }
                }
            }
        }
        for topic in [
            Topic::ScopeEvent(id.clone()),
            Topic::AvailableList(id.clone()),
            Topic::AvailableAnyVar(id.clone()),
            Topic::TableList(TableKey::Output(id.clone())),
            Topic::TableAnyVar(TableKey::Output(id.clone())),
        ] {
            self.bus.remove_topic(&topic);
        }

        self.emit(Topic::ScopeChange, || Signal::ScopeChange(ScopeChange {
            kind: ScopeChangeKind::Delete,
            scope: id.clone(),
        }));
        for cover in covers {
            self.refresh_deps(&cover);
        }
        for dep in deps {
            self.refresh_covers(&dep);
        }
        true
    }

    /// Sets the scope's variable slot `key` (creating, updating or replacing the node there)
    pub fn set_var_by_key(&mut self, scope: &ScopeId, key: &str, json: Value) -> EngineResult<NodeId> {
        let root = self.get_scope_by_id(scope)
            .map(|scope| scope.ast)
            .ok_or_else(|| EngineError::UnknownScope(scope.clone()))?;
        let result = self.map_node_set_unflushed(root, key, json);
        self.flush();
        result?.ok_or(EngineError::DisposedNode(root))
    }

    /// Sets the scope's default variable slot
    pub fn set_var(&mut self, scope: &ScopeId, json: Value) -> EngineResult<NodeId> {
        let key = self.config.default_var_key.clone();
        self.set_var_by_key(scope, &key, json)
    }

    /// Node in the variable slot `key` (default slot if `None`)
    pub fn get_var(&self, scope: &ScopeId, key: Option<&str>) -> Option<NodeId> {
        let root = self.get_scope_by_id(scope)?.ast;
        self.map_node_get(root, key.unwrap_or(&self.config.default_var_key))
    }

    /// Disposes the node in the variable slot `key` (default slot if `None`)
    pub fn clear_var(&mut self, scope: &ScopeId, key: Option<&str>) -> EngineResult<()> {
        let root = self.get_scope_by_id(scope)
            .map(|scope| scope.ast)
            .ok_or_else(|| EngineError::UnknownScope(scope.clone()))?;
        let key = SmolStr::new(key.unwrap_or(&self.config.default_var_key));
        self.map_node_remove_unflushed(root, &key);
        self.flush();
        Ok(())
    }

    /// Removes every scope and empties the global table
    pub fn dispose(&mut self) {
        let scopes: Vec<ScopeId> = self.scopes.keys().cloned().collect();
        log::debug!("disposing engine with {} scopes", scopes.len());
        for scope in scopes {
            self.remove_scope_unflushed(&scope);
        }
        if !self.global_table.is_empty() {
            self.global_table.table.clear();
            self.fire_table_change(&TableKey::Global);
        }
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;
    use test_log::test;

    use crate::scope::{MapScopeChain, ScopeChangeKind, ScopeId, ScopeMeta};
    use crate::{EngineError, VariableEngine};

    fn declaration(key: &str) -> serde_json::Value {
        json!({ "kind": "VariableDeclaration", "key": key, "type": "String" })
    }

    #[test]
    pub fn create_scope_is_idempotent() {
        let mut engine = VariableEngine::new(MapScopeChain::default());
        let changes = Rc::new(RefCell::new(Vec::new()));
        let changes2 = changes.clone();
        engine.on_scope_change(move |_, change| changes2.borrow_mut().push(change.kind));

        let a = engine.create_scope("a", ScopeMeta::public("n1")).unwrap();
        let ast = engine.get_scope_by_id(&a).unwrap().ast();
        assert_eq!(engine.create_scope("a", ScopeMeta::default()).unwrap(), a);
        assert_eq!(engine.get_scope_by_id(&a).unwrap().ast(), ast);
        assert_eq!(engine.node(ast).unwrap().key(), "a");
        assert_eq!(engine.node_scopes("n1").unwrap().public, Some(a.clone()));
        assert_eq!(*changes.borrow(), vec![ScopeChangeKind::Add]);
    }

    #[test]
    pub fn variable_slots() {
        let mut engine = VariableEngine::new(MapScopeChain::default());
        let a = engine.create_scope("a", ScopeMeta::default()).unwrap();

        let outputs = engine.set_var(&a, declaration("x")).unwrap();
        assert_eq!(engine.get_var(&a, None), Some(outputs));
        assert_eq!(engine.get_var(&a, Some("outputs")), Some(outputs));
        assert_eq!(engine.output_variables(&a), &[outputs]);

        let other = engine.set_var_by_key(&a, "other", declaration("y")).unwrap();
        assert_eq!(engine.get_var(&a, Some("other")), Some(other));
        assert_eq!(engine.output_variables(&a).len(), 2);

        engine.clear_var(&a, None).unwrap();
        assert_eq!(engine.get_var(&a, None), None);
        assert!(engine.is_disposed(outputs));
        assert_eq!(engine.output_variables(&a), &[other]);
        assert_eq!(engine.global_variable_table().get_variable_by_key("x"), None);
        assert_eq!(engine.global_variable_table().get_variable_by_key("y"), Some(other));
    }

    #[test]
    pub fn unknown_scope() {
        let mut engine = VariableEngine::new(MapScopeChain::default());
        let missing = ScopeId::from("missing");
        assert!(matches!(
            engine.set_var(&missing, declaration("x")),
            Err(EngineError::UnknownScope(scope)) if scope == missing
        ));
        assert!(!engine.remove_scope_by_id(&missing));
    }

    #[test]
    pub fn remove_scope_cleans_up() {
        let chain = MapScopeChain::default();
        chain.set_deps("b", ["a"]);
        let mut engine = VariableEngine::new(chain);
        let a = engine.create_scope("a", ScopeMeta::public("n1")).unwrap();
        let b = engine.create_scope("b", ScopeMeta::default()).unwrap();
        let x = engine.set_var(&a, declaration("x")).unwrap();
        assert_eq!(engine.available_variables(&b), &[x]);

        let deleted = Rc::new(RefCell::new(Vec::new()));
        let deleted2 = deleted.clone();
        engine.on_scope_change(move |_, change| {
            if change.kind == ScopeChangeKind::Delete {
                deleted2.borrow_mut().push(change.scope)
            }
        });
        assert!(engine.remove_scope_by_id(&a));
        assert!(engine.get_scope_by_id(&a).is_none());
        assert!(engine.is_disposed(x));
        assert!(engine.available_variables(&b).is_empty());
        assert!(engine.global_variable_table().is_empty());
        assert!(engine.node_scopes("n1").is_none());
        assert_eq!(*deleted.borrow(), vec![a]);
    }

    #[test]
    pub fn all_scopes_sorted_by_chain() {
        let chain = MapScopeChain::default();
        chain.set_deps("c", ["b"]);
        let mut engine = VariableEngine::new(chain);
        for id in ["c", "a", "b"] {
            engine.create_scope(id, ScopeMeta::default()).unwrap();
        }
        let ids = |scopes: Vec<&crate::Scope>| scopes.into_iter().map(|scope| scope.id().to_string()).collect::<Vec<_>>();
        assert_eq!(ids(engine.get_all_scopes(false)), vec!["c", "a", "b"]);
        assert_eq!(ids(engine.get_all_scopes(true)), vec!["b", "c", "a"]);
    }

    #[test]
    pub fn dispose_removes_everything() {
        let mut engine = VariableEngine::new(MapScopeChain::default());
        let global = engine.global_scope().unwrap();
        let a = engine.create_scope("a", ScopeMeta::default()).unwrap();
        engine.set_var(&global, declaration("g")).unwrap();
        engine.set_var(&a, declaration("x")).unwrap();
        assert_eq!(engine.global_variable_table().len(), 2);

        engine.dispose();
        assert!(engine.get_all_scopes(false).is_empty());
        assert!(engine.global_variable_table().is_empty());
    }
}
