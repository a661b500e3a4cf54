use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::misc::VecExtendNoDup;
use crate::scope::{Scope, ScopeId};
use crate::VariableEngine;

/// Decides which scopes see which.
///
/// Implementations must be pure functions of the host's topology: results are memoized per scope
/// until [VariableEngine::refresh_all_change] (or a scope being added / removed) invalidates them.
/// The global scope is handled by the engine: it's prepended to every other scope's dependencies,
/// and covered by every other scope.
pub trait ScopeChain {
    /// Scopes whose output is available to `scope`, in order
    fn get_deps(&self, engine: &VariableEngine, scope: &Scope) -> Vec<ScopeId>;

    /// Scopes which `scope`'s output is available to
    fn get_covers(&self, engine: &VariableEngine, scope: &Scope) -> Vec<ScopeId>;

    /// Every scope the chain can order, in dependency order
    fn sort_all(&self, _engine: &VariableEngine) -> Vec<ScopeId> {
        Vec::new()
    }
}

/// What a [ScopeTransformer] can inspect
pub struct TransformContext<'a> {
    pub scope: &'a Scope,
    pub engine: &'a VariableEngine,
}

pub type ScopeTransformer = Box<dyn Fn(Vec<ScopeId>, &TransformContext<'_>) -> Vec<ScopeId>>;

/// Rewrites the dependencies and/or covers computed by the chain
#[derive(Default)]
pub struct ScopeChainTransformer {
    pub transform_deps: Option<ScopeTransformer>,
    pub transform_covers: Option<ScopeTransformer>,
}

/// Named transformers, applied in registration order
#[derive(Default)]
pub struct ScopeChainTransforms {
    transformers: IndexMap<SmolStr, ScopeChainTransformer>,
}

impl ScopeChainTransformer {
    pub fn deps(transform: impl Fn(Vec<ScopeId>, &TransformContext<'_>) -> Vec<ScopeId> + 'static) -> Self {
        ScopeChainTransformer { transform_deps: Some(Box::new(transform)), transform_covers: None }
    }

    pub fn covers(transform: impl Fn(Vec<ScopeId>, &TransformContext<'_>) -> Vec<ScopeId> + 'static) -> Self {
        ScopeChainTransformer { transform_deps: None, transform_covers: Some(Box::new(transform)) }
    }

    pub fn with_covers(
        mut self,
        transform: impl Fn(Vec<ScopeId>, &TransformContext<'_>) -> Vec<ScopeId> + 'static,
    ) -> Self {
        self.transform_covers = Some(Box::new(transform));
        self
    }
}

impl ScopeChainTransforms {
    pub fn has_transformer(&self, id: &str) -> bool {
        self.transformers.contains_key(id)
    }

    /// Registers a transformer. A transformer with the same id is replaced in place.
    pub fn register_transformer(&mut self, id: impl Into<SmolStr>, transformer: ScopeChainTransformer) {
        self.transformers.insert(id.into(), transformer);
    }

    pub fn transform_deps(&self, scopes: Vec<ScopeId>, ctx: &TransformContext<'_>) -> Vec<ScopeId> {
        self.transformers.values()
            .filter_map(|transformer| transformer.transform_deps.as_ref())
            .fold(scopes, |scopes, transform| transform(scopes, ctx))
    }

    pub fn transform_covers(&self, scopes: Vec<ScopeId>, ctx: &TransformContext<'_>) -> Vec<ScopeId> {
        self.transformers.values()
            .filter_map(|transformer| transformer.transform_covers.as_ref())
            .fold(scopes, |scopes, transform| transform(scopes, ctx))
    }
}

/// Chain with explicitly listed dependencies. Covers are the inverse relation.
///
/// Clones share the same dependencies, so the host can keep one to edit them (then call
/// [VariableEngine::refresh_all_change]).
#[derive(Debug, Clone, Default)]
pub struct MapScopeChain {
    deps: Rc<RefCell<IndexMap<ScopeId, Vec<ScopeId>>>>,
}

impl MapScopeChain {
    pub fn set_deps(&self, scope: impl Into<ScopeId>, deps: impl IntoIterator<Item = impl Into<ScopeId>>) {
        self.deps.borrow_mut().insert(scope.into(), deps.into_iter().map(Into::into).collect());
    }

    pub fn remove_deps(&self, scope: &ScopeId) {
        self.deps.borrow_mut().shift_remove(scope);
    }
}

impl ScopeChain for MapScopeChain {
    fn get_deps(&self, _engine: &VariableEngine, scope: &Scope) -> Vec<ScopeId> {
        self.deps.borrow().get(scope.id()).cloned().unwrap_or_default()
    }

    fn get_covers(&self, _engine: &VariableEngine, scope: &Scope) -> Vec<ScopeId> {
        self.deps.borrow().iter()
            .filter(|(_, deps)| deps.contains(scope.id()))
            .map(|(covering, _)| covering.clone())
            .collect()
    }

    fn sort_all(&self, _engine: &VariableEngine) -> Vec<ScopeId> {
        let deps = self.deps.borrow();
        let mut sorted = Vec::new();
        for (scope, scope_deps) in deps.iter() {
            sorted.extend_no_dup(scope_deps.iter().cloned());
            sorted.extend_no_dup([scope.clone()]);
        }
        sorted
    }
}

impl VariableEngine {
    /// Scopes whose output is available to `scope` (memoized)
    pub fn dep_scopes(&self, scope: &ScopeId) -> &[ScopeId] {
        let Some(scope) = self.scopes.get(scope) else {
            return &[];
        };
        scope.deps.get_or_init(|| {
            let mut deps = Vec::new();
            if !scope.id.is_global() && self.scopes.contains_key(&ScopeId::Global) {
                deps.push(ScopeId::Global);
            }
            deps.extend_no_dup(self.chain.get_deps(self, scope));
            let deps = self.transforms.transform_deps(deps, &TransformContext { scope, engine: self });
            self.live_scopes(deps)
        })
    }

    /// Scopes `scope`'s output is available to (memoized)
    pub fn cover_scopes(&self, scope: &ScopeId) -> &[ScopeId] {
        let Some(scope) = self.scopes.get(scope) else {
            return &[];
        };
        scope.covers.get_or_init(|| {
            let covers = if scope.id.is_global() {
                self.get_all_scopes(true).into_iter()
                    .map(|scope| scope.id.clone())
                    .filter(|scope| !scope.is_global())
                    .collect()
            } else {
                let mut covers = Vec::new();
                covers.extend_no_dup(self.chain.get_covers(self, scope));
                covers
            };
            let covers = self.transforms.transform_covers(covers, &TransformContext { scope, engine: self });
            self.live_scopes(covers)
        })
    }

    fn live_scopes(&self, scopes: Vec<ScopeId>) -> Vec<ScopeId> {
        scopes.into_iter()
            .filter(|scope| self.scopes.get(scope).map_or(false, |scope| !scope.disposed))
            .collect()
    }

    /// Forgets `scope`'s memoized dependencies and recomputes its available variables
    pub(crate) fn refresh_deps(&mut self, scope: &ScopeId) {
        if let Some(state) = self.scopes.get_mut(scope) {
            state.deps.take();
        }
        self.refresh_available(scope);
    }

    /// Forgets `scope`'s memoized covers
    pub(crate) fn refresh_covers(&mut self, scope: &ScopeId) {
        if let Some(state) = self.scopes.get_mut(scope) {
            state.covers.take();
        }
    }

    /// Re-derives every scope's dependencies and covers. Call after any change of the host's
    /// topology.
    pub fn refresh_all_change(&mut self) {
        self.refresh_all_change_unflushed();
        self.flush();
    }

    pub(crate) fn refresh_all_change_unflushed(&mut self) {
        log::debug!("refreshing the chain of {} scopes", self.scopes.len());
        for scope in self.scopes.values_mut() {
            scope.deps.take();
            scope.covers.take();
        }
        let scopes: Vec<ScopeId> = self.scopes.keys().cloned().collect();
        for scope in scopes {
            self.refresh_available(&scope);
        }
    }

    pub fn scope_transforms(&self) -> &ScopeChainTransforms {
        &self.transforms
    }

    /// Registers a transformer of every chain result. Takes effect on the next refresh.
    pub fn register_scope_transformer(&mut self, id: impl Into<SmolStr>, transformer: ScopeChainTransformer) {
        self.transforms.register_transformer(id, transformer);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_log::test;

    use crate::scope::{MapScopeChain, ScopeChainTransformer, ScopeId, ScopeMeta};
    use crate::VariableEngine;

    fn declare(key: &str) -> serde_json::Value {
        json!({
            "kind": "VariableDeclarationList",
            "declarations": [{ "key": key, "type": "String" }]
        })
    }

    #[test]
    pub fn global_scope_is_a_dependency_of_every_scope() {
        let chain = MapScopeChain::default();
        chain.set_deps("b", ["a"]);
        let mut engine = VariableEngine::new(chain);
        let global = engine.global_scope().unwrap();
        let a = engine.create_scope("a", ScopeMeta::default()).unwrap();
        let b = engine.create_scope("b", ScopeMeta::default()).unwrap();

        assert_eq!(engine.dep_scopes(&b), &[global.clone(), a.clone()]);
        assert_eq!(engine.dep_scopes(&a), &[global.clone()]);
        assert!(engine.dep_scopes(&global).is_empty());
        assert_eq!(engine.cover_scopes(&global), &[a.clone(), b.clone()]);
        assert_eq!(engine.cover_scopes(&a), &[b]);
    }

    #[test]
    pub fn memoized_until_refreshed() {
        let chain = MapScopeChain::default();
        let mut engine = VariableEngine::new(chain.clone());
        let a = engine.create_scope("a", ScopeMeta::default()).unwrap();
        let b = engine.create_scope("b", ScopeMeta::default()).unwrap();
        engine.set_var(&a, declare("x")).unwrap();
        assert!(engine.available_variables(&b).is_empty());

        chain.set_deps("b", ["a"]);
        assert!(engine.dep_scopes(&b).is_empty());
        engine.refresh_all_change();
        assert_eq!(engine.dep_scopes(&b), &[a]);
        assert_eq!(engine.available_variables(&b).len(), 1);
    }

    #[test]
    pub fn transformers_apply_in_order() {
        let chain = MapScopeChain::default();
        chain.set_deps("c", ["a"]);
        let mut engine = VariableEngine::new(chain);
        let a = engine.create_scope("a", ScopeMeta::default()).unwrap();
        let b = engine.create_scope("b", ScopeMeta::default()).unwrap();
        let c = engine.create_scope("c", ScopeMeta::default()).unwrap();

        engine.register_scope_transformer("add-b", ScopeChainTransformer::deps(|mut deps, ctx| {
            if ctx.scope.id() == &ScopeId::from("c") {
                deps.push(ScopeId::from("b"));
            }
            deps
        }));
        engine.register_scope_transformer("drop-a", ScopeChainTransformer::deps(|deps, _| {
            deps.into_iter().filter(|dep| dep != &ScopeId::from("a")).collect()
        }));
        assert!(engine.scope_transforms().has_transformer("add-b"));
        engine.refresh_all_change();
        assert_eq!(engine.dep_scopes(&c), &[b]);
        assert!(engine.cover_scopes(&a).contains(&c));
    }

    #[test]
    pub fn removed_scopes_are_filtered() {
        let chain = MapScopeChain::default();
        chain.set_deps("b", ["a", "missing"]);
        let mut engine = VariableEngine::new(chain);
        let a = engine.create_scope("a", ScopeMeta::default()).unwrap();
        let b = engine.create_scope("b", ScopeMeta::default()).unwrap();
        engine.refresh_all_change();
        assert_eq!(engine.dep_scopes(&b), &[a.clone()]);

        engine.remove_scope_by_id(&a);
        assert!(engine.dep_scopes(&b).is_empty());
    }
}
