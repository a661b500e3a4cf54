use derive_more::Display;
use smol_str::SmolStr;

use crate::ast::{AstKind, KeyPath, NodeId};
use crate::reactive::{Signal, Topic};
use crate::scope::ScopeId;
use crate::VariableEngine;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalEventKind {
    #[display(fmt = "NewAST")]
    NewAst,
    #[display(fmt = "UpdateAST")]
    UpdateAst,
    #[display(fmt = "DisposeAST")]
    DisposeAst,
    /// A declaration list was updated (payload: previous and next declarations)
    #[display(fmt = "VariableListChange")]
    VariableListChange,
    /// An object type was updated (payload: previous and next properties)
    #[display(fmt = "ObjectPropertiesChange")]
    ObjectPropertiesChange,
    /// A declaration's order changed
    #[display(fmt = "ReSortVariableDeclarations")]
    ReSortVariableDeclarations,
}

/// The node an event is about. Still valid after the node is disposed.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
#[display(fmt = "{} {} ({})", kind, key, id)]
pub struct AstRef {
    pub id: NodeId,
    pub kind: SmolStr,
    pub key: SmolStr,
}

/// A property or declaration as it was when an event was dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSnapshot {
    pub id: NodeId,
    pub key: SmolStr,
    pub key_path: KeyPath,
    /// Kind of the field's effective type
    pub type_kind: Option<SmolStr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    FieldListChange {
        prev: Vec<FieldSnapshot>,
        next: Vec<FieldSnapshot>,
    },
}

/// Event about a node of a scope's AST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalEvent {
    pub kind: GlobalEventKind,
    pub scope: ScopeId,
    pub ast: Option<AstRef>,
    pub payload: Option<EventPayload>,
}

impl AstRef {
    pub fn is(&self, kind: AstKind) -> bool {
        self.kind == kind.as_str()
    }
}

impl VariableEngine {
    /// Dispatches an event about `id` on its scope
    pub(crate) fn dispatch_ast_event(&mut self, id: NodeId, kind: GlobalEventKind, payload: Option<EventPayload>) {
        let Some(node) = self.node(id) else {
            return;
        };
        let scope = node.scope.clone();
        let ast = AstRef { id, kind: node.kind.clone(), key: node.key.clone() };
        self.dispatch_event(&scope, kind, Some(ast), payload);
    }

    /// Dispatches an event on `scope`: the scope's output and the engine's services react first,
    /// then scope and global subscribers are staged. Events of removed scopes are dropped.
    pub(crate) fn dispatch_event(
        &mut self,
        scope: &ScopeId,
        kind: GlobalEventKind,
        ast: Option<AstRef>,
        payload: Option<EventPayload>,
    ) {
        match self.scopes.get(scope) {
            Some(state) if !state.disposed => {}
            _ => return,
        }
        let event = GlobalEvent { kind, scope: scope.clone(), ast, payload };

        self.output_on_event(&event);
        self.rename_on_event(&event);
        self.emit(Topic::ScopeEvent(scope.clone()), || Signal::Global(event.clone()));
        self.emit(Topic::GlobalEvent, || Signal::Global(event.clone()));
    }
}
