use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::ast::NodeId;
use crate::reactive::{NodeSnapshot, Select, Signal, SubscribeOptions, SubscriptionId, Topic};
use crate::scope::{ScopeChange, ScopeChangeKind, ScopeId, TableKey};
use crate::VariableEngine;

/// Variables visible from a scope: the outputs of its dependency scopes, in dependency order
#[derive(Debug, Clone, Default)]
pub struct ScopeAvailableData {
    pub(crate) variables: Vec<NodeId>,
    pub(crate) variable_keys: Vec<SmolStr>,
    pub(crate) version: u64,
}

impl ScopeAvailableData {
    pub fn variables(&self) -> &[NodeId] {
        &self.variables
    }

    pub fn variable_keys(&self) -> &[SmolStr] {
        &self.variable_keys
    }

    /// Incremented whenever the list or one of its variables changes
    pub fn version(&self) -> u64 {
        self.version
    }

    fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

impl VariableEngine {
    pub fn available_variables(&self, scope: &ScopeId) -> &[NodeId] {
        self.scopes.get(scope).map_or(&[], |scope| scope.available.variables())
    }

    /// Recomputes the variables available to `scope` from its dependencies. If they changed, the
    /// scope's expressions re-resolve and the new list is announced.
    pub(crate) fn refresh_available(&mut self, scope_id: &ScopeId) {
        match self.scopes.get(scope_id) {
            Some(scope) if !scope.disposed => {}
            _ => return,
        }
        let variables: Vec<NodeId> = self.dep_scopes(scope_id).to_vec().iter()
            .flat_map(|dep| self.output_variables(dep).iter().copied())
            .collect();
        let variable_keys: Vec<SmolStr> = variables.iter()
            .filter_map(|variable| self.node(*variable).map(|node| node.key.clone()))
            .collect();
        let Some(scope) = self.scopes.get_mut(scope_id) else {
            return;
        };
        if scope.available.variables == variables {
            return;
        }
        log::trace!("{} now has {} available variables", scope_id, variables.len());
        let prev = std::mem::replace(&mut scope.available.variables, variables.clone());
        scope.available.variable_keys = variable_keys;
        scope.available.bump_version();
        let expressions: Vec<NodeId> = scope.expressions.iter().copied().collect();

        for variable in prev {
            if let Some(scopes) = self.watchers.available.get_mut(&variable) {
                scopes.shift_remove(scope_id);
                if scopes.is_empty() {
                    self.watchers.available.remove(&variable);
                }
            }
        }
        for variable in &variables {
            self.watchers.available.entry(*variable).or_default().insert(scope_id.clone());
        }

        for expression in expressions {
            self.refresh_refs(expression);
        }
        self.emit(Topic::AvailableList(scope_id.clone()), move || Signal::VariableList(variables));
        self.emit(Topic::ScopeChange, || Signal::ScopeChange(ScopeChange {
            kind: ScopeChangeKind::Available,
            scope: scope_id.clone(),
        }));
    }

    /// An available variable of `scope` changed
    pub(crate) fn on_available_variable_change(&mut self, scope_id: &ScopeId, id: NodeId, key: &SmolStr) {
        let Some(scope) = self.scopes.get_mut(scope_id) else {
            return;
        };
        if scope.disposed {
            return;
        }
        scope.available.bump_version();
        let expressions: SmallVec<[NodeId; 4]> = scope.expressions.iter().copied().collect();
        let expressions: SmallVec<[NodeId; 4]> = expressions.into_iter()
            .filter(|expression| {
                self.node(*expression)
                    .and_then(|node| node.data.as_key_path())
                    .and_then(|expression| expression.key_path().first())
                    == Some(key)
            })
            .collect();
        for expression in expressions {
            self.refresh_refs(expression);
        }
        self.emit(Topic::AvailableAnyVar(scope_id.clone()), || Signal::VariableChanged(id));
        self.emit(Topic::ScopeChange, || Signal::ScopeChange(ScopeChange {
            kind: ScopeChangeKind::Available,
            scope: scope_id.clone(),
        }));
    }

    /// Field at `key_path` if its head is available to `scope`. Nested keys drill into the type of
    /// the variable.
    pub fn available_get_by_key_path(&self, scope: &ScopeId, key_path: &[SmolStr]) -> Option<NodeId> {
        let head = key_path.first()?;
        let available = &self.scopes.get(scope)?.available;
        if !available.variable_keys.contains(head) {
            return None;
        }
        self.table_get_by_key_path(&TableKey::Global, key_path)
    }

    /// Calls `observer` with the available variables whenever variables are added or removed
    pub fn on_available_variable_list_change(
        &mut self,
        scope: &ScopeId,
        observer: impl FnMut(&VariableEngine, Vec<NodeId>) + 'static,
    ) -> SubscriptionId {
        self.subscribe_listener([Topic::AvailableList(scope.clone())], Select::new(
            |_: &VariableEngine, signal: &Signal| match signal {
                Signal::VariableList(variables) => Some(variables.clone()),
                _ => None,
            },
            observer,
        ))
    }

    /// Calls `observer` with the changed variable whenever an available variable changes
    pub fn on_available_any_variable_change(
        &mut self,
        scope: &ScopeId,
        observer: impl FnMut(&VariableEngine, NodeId) + 'static,
    ) -> SubscriptionId {
        self.subscribe_listener([Topic::AvailableAnyVar(scope.clone())], Select::new(
            |_: &VariableEngine, signal: &Signal| match signal {
                Signal::VariableChanged(id) => Some(*id),
                _ => None,
            },
            observer,
        ))
    }

    /// Calls `observer` with the available variables on either of the above
    pub fn on_available_list_or_any_var_change(
        &mut self,
        scope: &ScopeId,
        observer: impl FnMut(&VariableEngine, Vec<NodeId>) + 'static,
    ) -> SubscriptionId {
        let scope_id = scope.clone();
        self.subscribe_listener(
            [Topic::AvailableList(scope.clone()), Topic::AvailableAnyVar(scope.clone())],
            Select::new(
                move |engine: &VariableEngine, signal: &Signal| match signal {
                    Signal::VariableList(_) | Signal::VariableChanged(_) => {
                        Some(engine.available_variables(&scope_id).to_vec())
                    }
                    _ => None,
                },
                observer,
            ),
        )
    }

    /// Calls `observer` with the field at `key_path` (see
    /// [VariableEngine::available_get_by_key_path]) now, and whenever it's replaced or changes.
    pub fn track_by_key_path(
        &mut self,
        scope: &ScopeId,
        key_path: impl IntoIterator<Item = impl Into<SmolStr>>,
        mut observer: impl FnMut(&VariableEngine, Option<NodeId>) + 'static,
    ) -> SubscriptionId {
        self.track_by_key_path_with(
            scope,
            key_path,
            |engine, field| field.and_then(|field| engine.snapshot(field)),
            move |engine, snapshot: Option<NodeSnapshot>| observer(engine, snapshot.map(|snapshot| snapshot.id)),
            SubscribeOptions::trigger_on_init(),
        )
    }

    /// Calls `observer` with `selector`'s result on the field at `key_path` whenever the
    /// available variables change and the result differs from the previous one
    pub fn track_by_key_path_with<T: PartialEq + Clone + 'static>(
        &mut self,
        scope: &ScopeId,
        key_path: impl IntoIterator<Item = impl Into<SmolStr>>,
        mut selector: impl FnMut(&VariableEngine, Option<NodeId>) -> T + 'static,
        observer: impl FnMut(&VariableEngine, T) + 'static,
        options: SubscribeOptions,
    ) -> SubscriptionId {
        let key_path: Vec<SmolStr> = key_path.into_iter().map(Into::into).collect();
        let scope_id = scope.clone();
        let initial = selector(&*self, self.available_get_by_key_path(scope, &key_path));
        let mut listener = Select::new(
            move |engine: &VariableEngine, signal: &Signal| match signal {
                Signal::VariableList(_) | Signal::VariableChanged(_) => {
                    Some(selector(engine, engine.available_get_by_key_path(&scope_id, &key_path)))
                }
                _ => None,
            },
            observer,
        )
            .distinct(options.trigger_on_init.then(|| initial.clone()))
            .debounce(options.debounce);
        if options.trigger_on_init {
            listener.observe_now(self, initial);
        }
        self.subscribe_listener(
            [Topic::AvailableList(scope.clone()), Topic::AvailableAnyVar(scope.clone())],
            listener,
        )
    }
}
