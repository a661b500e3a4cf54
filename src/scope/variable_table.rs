use derive_more::Display;
use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::ast::NodeId;
use crate::reactive::{Select, Signal, SubscriptionId, Topic};
use crate::scope::ScopeId;
use crate::VariableEngine;

/// Identifies a variable table: a scope's output table, or the global table every output table
/// forwards to
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
pub enum TableKey {
    #[display(fmt = "global")]
    Global,
    #[display(fmt = "output of {}", _0)]
    Output(ScopeId),
}

/// Variable declarations by key, in insertion order
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    pub(crate) table: IndexMap<SmolStr, NodeId>,
    pub(crate) version: u64,
}

impl TableKey {
    /// Output tables forward additions and removals to the global table
    pub fn parent(&self) -> Option<TableKey> {
        match self {
            TableKey::Global => None,
            TableKey::Output(_) => Some(TableKey::Global),
        }
    }
}

impl VariableTable {
    pub fn variables(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.table.values().copied()
    }

    pub fn variable_keys(&self) -> impl Iterator<Item = &SmolStr> + '_ {
        self.table.keys()
    }

    pub fn get_variable_by_key(&self, key: &str) -> Option<NodeId> {
        self.table.get(key).copied()
    }

    pub fn contains(&self, key: &str, id: NodeId) -> bool {
        self.get_variable_by_key(key) == Some(id)
    }

    /// Incremented whenever the table or one of its variables changes
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl VariableEngine {
    pub fn global_variable_table(&self) -> &VariableTable {
        &self.global_table
    }

    pub fn variable_table(&self, key: &TableKey) -> Option<&VariableTable> {
        match key {
            TableKey::Global => Some(&self.global_table),
            TableKey::Output(scope) => self.scopes.get(scope).map(|scope| &scope.output.table),
        }
    }

    fn variable_table_mut(&mut self, key: &TableKey) -> Option<&mut VariableTable> {
        match key {
            TableKey::Global => Some(&mut self.global_table),
            TableKey::Output(scope) => self.scopes.get_mut(scope).map(|scope| &mut scope.output.table),
        }
    }

    pub(crate) fn add_variable_to_table(&mut self, key: &TableKey, variable_key: &SmolStr, id: NodeId) {
        if let Some(table) = self.variable_table_mut(key) {
            table.table.insert(variable_key.clone(), id);
        }
        if let Some(parent) = key.parent() {
            self.add_variable_to_table(&parent, variable_key, id);
        }
    }

    /// Removes `variable_key` if it still maps to `id` (another declaration may have taken the
    /// key since)
    pub(crate) fn remove_variable_from_table(&mut self, key: &TableKey, variable_key: &str, id: NodeId) {
        if let Some(table) = self.variable_table_mut(key) {
            if table.contains(variable_key, id) {
                table.table.shift_remove(variable_key);
            }
        }
        if let Some(parent) = key.parent() {
            self.remove_variable_from_table(&parent, variable_key, id);
        }
    }

    /// Announces that a table's variable list changed, then does the same for its parent
    pub(crate) fn fire_table_change(&mut self, key: &TableKey) {
        let Some(table) = self.variable_table_mut(key) else {
            return;
        };
        table.version = table.version.wrapping_add(1);
        let variables = self.table_signal_variables(key);
        self.emit(Topic::TableList(key.clone()), move || Signal::VariableList(variables));
        if let Some(parent) = key.parent() {
            self.fire_table_change(&parent);
        }
    }

    fn table_signal_variables(&self, key: &TableKey) -> Vec<NodeId> {
        match key {
            TableKey::Output(scope) => self.output_variables(scope).to_vec(),
            TableKey::Global => self.global_table.variables().collect(),
        }
    }

    /// A declaration in `key` changed
    pub(crate) fn on_table_variable_change(&mut self, key: &TableKey, id: NodeId) {
        let Some(table) = self.variable_table_mut(key) else {
            return;
        };
        table.version = table.version.wrapping_add(1);
        self.emit(Topic::TableAnyVar(key.clone()), || Signal::VariableChanged(id));
    }

    /// `[variable key, ...property keys]`: the variable, or a property nested in its type
    pub fn table_get_by_key_path(&self, key: &TableKey, key_path: &[SmolStr]) -> Option<NodeId> {
        let (variable_key, property_keys) = key_path.split_first()?;
        let variable = self.variable_table(key)?.get_variable_by_key(variable_key)?;
        if property_keys.is_empty() {
            Some(variable)
        } else {
            self.field_get_by_key_path(variable, property_keys)
        }
    }

    /// Calls `observer` with the table's variables whenever variables are added or removed
    pub fn on_table_variable_list_change(
        &mut self,
        key: &TableKey,
        observer: impl FnMut(&VariableEngine, Vec<NodeId>) + 'static,
    ) -> SubscriptionId {
        self.subscribe_listener([Topic::TableList(key.clone())], Select::new(
            |_: &VariableEngine, signal: &Signal| match signal {
                Signal::VariableList(variables) => Some(variables.clone()),
                _ => None,
            },
            observer,
        ))
    }

    /// Calls `observer` with the changed declaration whenever a declaration in the table changes
    pub fn on_table_any_variable_change(
        &mut self,
        key: &TableKey,
        observer: impl FnMut(&VariableEngine, NodeId) + 'static,
    ) -> SubscriptionId {
        self.subscribe_listener([Topic::TableAnyVar(key.clone())], Select::new(
            |_: &VariableEngine, signal: &Signal| match signal {
                Signal::VariableChanged(id) => Some(*id),
                _ => None,
            },
            observer,
        ))
    }

    /// Calls `observer` on either of the above
    pub fn on_table_list_or_any_var_change(
        &mut self,
        key: &TableKey,
        mut observer: impl FnMut(&VariableEngine) + 'static,
    ) -> SubscriptionId {
        self.subscribe_listener([Topic::TableList(key.clone()), Topic::TableAnyVar(key.clone())], Select::new(
            |_: &VariableEngine, signal: &Signal| match signal {
                Signal::VariableList(_) | Signal::VariableChanged(_) => Some(()),
                _ => None,
            },
            move |engine: &VariableEngine, ()| observer(engine),
        ))
    }
}
