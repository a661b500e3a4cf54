use crate::ast::NodeId;
use crate::scope::{FieldSnapshot, GlobalEvent, ScopeChange, ScopeId, TableKey};
use crate::services::RenameInfo;

/// What a subscription listens to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Topic {
    /// A node changed
    Node(NodeId),
    /// Any AST event of any scope
    GlobalEvent,
    /// AST events of one scope
    ScopeEvent(ScopeId),
    /// A variable table's variables were added / removed
    TableList(TableKey),
    /// A variable of a table changed
    TableAnyVar(TableKey),
    /// A scope's available variables were added / removed
    AvailableList(ScopeId),
    /// One of a scope's available variables changed
    AvailableAnyVar(ScopeId),
    /// A scope was added, removed or updated
    ScopeChange,
    /// A field was renamed
    Rename,
    /// A field was removed from its list
    DisposeInList,
}

/// Payload staged on the listeners of a [Topic]
#[derive(Debug, Clone)]
pub(crate) enum Signal {
    NodeChanged(NodeId),
    Global(GlobalEvent),
    VariableList(Vec<NodeId>),
    VariableChanged(NodeId),
    ScopeChange(ScopeChange),
    Rename(RenameInfo),
    DisposeInList(FieldSnapshot),
}
