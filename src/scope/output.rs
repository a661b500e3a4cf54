use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::ast::{AstKind, NodeId};
use crate::reactive::{Signal, SubscriptionId, Topic};
use crate::scope::{GlobalEvent, GlobalEventKind, ScopeChange, ScopeChangeKind, ScopeId, TableKey, VariableTable};
use crate::VariableEngine;

/// Variables a scope declares
#[derive(Debug, Clone, Default)]
pub struct ScopeOutputData {
    pub(crate) table: VariableTable,
    /// Table variables sorted by order, recomputed when the scope's AST changes
    pub(crate) variables: Vec<NodeId>,
    pub(crate) has_changes: bool,
}

impl ScopeOutputData {
    /// Declarations sorted by their order
    pub fn variables(&self) -> &[NodeId] {
        &self.variables
    }

    pub fn variable_keys(&self) -> impl Iterator<Item = &SmolStr> + '_ {
        self.table.variable_keys()
    }

    pub fn get_variable_by_key(&self, key: &str) -> Option<NodeId> {
        self.table.get_variable_by_key(key)
    }

    pub fn version(&self) -> u64 {
        self.table.version()
    }

    pub fn table(&self) -> &VariableTable {
        &self.table
    }
}

impl VariableEngine {
    /// Declarations output by `scope`, sorted by order
    pub fn output_variables(&self, scope: &ScopeId) -> &[NodeId] {
        self.scopes.get(scope).map_or(&[], |scope| scope.output.variables())
    }

    /// Keeps the output table in sync with the declarations of the scope's AST
    pub(crate) fn output_on_event(&mut self, event: &GlobalEvent) {
        let Some(ast) = &event.ast else {
            return;
        };
        let table = TableKey::Output(event.scope.clone());
        match event.kind {
            GlobalEventKind::NewAst if ast.is(AstKind::VariableDeclaration) => {
                if self.node(ast.id).map_or(true, |node| node.scope != event.scope) {
                    log::warn!("declaration {} is not a node of {}, not adding it to its output", ast, event.scope);
                    return;
                }
                self.add_variable_to_table(&table, &ast.key, ast.id);
            }
            GlobalEventKind::DisposeAst if ast.is(AstKind::VariableDeclaration) => {
                self.remove_variable_from_table(&table, &ast.key, ast.id);
            }
            GlobalEventKind::ReSortVariableDeclarations => {}
            _ => return,
        }
        if let Some(scope) = self.scopes.get_mut(&event.scope) {
            scope.output.has_changes = true;
        }
    }

    /// The root AST of `scope` changed. Pending output changes are applied (sorting the
    /// variables, refreshing covering scopes, then announcing the new list).
    pub(crate) fn on_scope_ast_change(&mut self, scope_id: &ScopeId, root: NodeId) {
        let Some(scope) = self.scopes.get_mut(scope_id) else {
            return;
        };
        if scope.ast != root || scope.disposed {
            return;
        }
        if std::mem::take(&mut scope.output.has_changes) {
            let mut variables: Vec<NodeId> = scope.output.table.variables().collect();
            variables.sort_by_key(|variable| self.declaration_order(*variable).unwrap_or(0));
            if let Some(scope) = self.scopes.get_mut(scope_id) {
                scope.output.variables = variables;
            }
            self.notify_covers_change(scope_id);
            self.fire_table_change(&TableKey::Output(scope_id.clone()));
        }
        self.emit(Topic::ScopeChange, || Signal::ScopeChange(ScopeChange {
            kind: ScopeChangeKind::Update,
            scope: scope_id.clone(),
        }));
    }

    /// Refreshes the available variables of every scope covering `scope`
    pub(crate) fn notify_covers_change(&mut self, scope: &ScopeId) {
        let covers = self.cover_scopes(scope).to_vec();
        log::trace!("{} output changed, refreshing {} covering scopes", scope, covers.len());
        for cover in covers {
            self.refresh_available(&cover);
        }
    }

    /// A declaration changed: its tables and every scope it's available in are notified
    pub(crate) fn on_declaration_change(&mut self, id: NodeId) {
        let Some(node) = self.node(id) else {
            return;
        };
        let key = node.key.clone();
        for table in [TableKey::Output(node.scope.clone()), TableKey::Global] {
            if self.variable_table(&table).map_or(false, |table| table.contains(&key, id)) {
                self.on_table_variable_change(&table, id);
            }
        }

        let scopes: SmallVec<[ScopeId; 4]> = self.watchers.available.get(&id)
            .map(|scopes| scopes.iter().cloned().collect())
            .unwrap_or_default();
        for scope in scopes {
            self.on_available_variable_change(&scope, id, &key);
        }
    }

    /// Calls `observer` with the scope's sorted output whenever declarations are added, removed or
    /// re-sorted
    pub fn on_output_variable_list_change(
        &mut self,
        scope: &ScopeId,
        observer: impl FnMut(&VariableEngine, Vec<NodeId>) + 'static,
    ) -> SubscriptionId {
        self.on_table_variable_list_change(&TableKey::Output(scope.clone()), observer)
    }

    pub fn on_output_any_variable_change(
        &mut self,
        scope: &ScopeId,
        observer: impl FnMut(&VariableEngine, NodeId) + 'static,
    ) -> SubscriptionId {
        self.on_table_any_variable_change(&TableKey::Output(scope.clone()), observer)
    }

    pub fn on_output_list_or_any_var_change(
        &mut self,
        scope: &ScopeId,
        observer: impl FnMut(&VariableEngine) + 'static,
    ) -> SubscriptionId {
        self.on_table_list_or_any_var_change(&TableKey::Output(scope.clone()), observer)
    }
}
