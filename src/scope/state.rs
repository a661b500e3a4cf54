use derive_more::Display;
use indexmap::IndexSet;
use once_cell::unsync::OnceCell;

use crate::ast::NodeId;
use crate::scope::{ScopeAvailableData, ScopeId, ScopeMeta, ScopeOutputData};

/// A visibility boundary: owns a root AST (a map node whose entries are the scope's
/// declarations), the variables it outputs and the variables available to it
#[derive(Debug)]
pub struct Scope {
    pub(crate) id: ScopeId,
    pub(crate) meta: ScopeMeta,
    pub(crate) ast: NodeId,
    pub(crate) output: ScopeOutputData,
    pub(crate) available: ScopeAvailableData,
    /// Key-path expressions of this scope, which re-resolve when the available variables change
    pub(crate) expressions: IndexSet<NodeId>,
    /// Memoized dependency scopes
    pub(crate) deps: OnceCell<Vec<ScopeId>>,
    /// Memoized covering scopes
    pub(crate) covers: OnceCell<Vec<ScopeId>>,
    pub(crate) disposed: bool,
}

/// What happened to a scope
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeChangeKind {
    #[display(fmt = "add")]
    Add,
    #[display(fmt = "delete")]
    Delete,
    /// Its AST changed
    #[display(fmt = "update")]
    Update,
    /// Its available variables changed
    #[display(fmt = "available")]
    Available,
}

#[derive(Debug, Display, Clone, PartialEq, Eq)]
#[display(fmt = "{} {}", kind, scope)]
pub struct ScopeChange {
    pub kind: ScopeChangeKind,
    pub scope: ScopeId,
}

impl Scope {
    pub(crate) fn new(id: ScopeId, meta: ScopeMeta, ast: NodeId) -> Self {
        Scope {
            id,
            meta,
            ast,
            output: ScopeOutputData::default(),
            available: ScopeAvailableData::default(),
            expressions: IndexSet::new(),
            deps: OnceCell::new(),
            covers: OnceCell::new(),
            disposed: false,
        }
    }

    pub fn id(&self) -> &ScopeId {
        &self.id
    }

    pub fn meta(&self) -> &ScopeMeta {
        &self.meta
    }

    /// Root map node
    pub fn ast(&self) -> NodeId {
        self.ast
    }

    pub fn output(&self) -> &ScopeOutputData {
        &self.output
    }

    pub fn available(&self) -> &ScopeAvailableData {
        &self.available
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
