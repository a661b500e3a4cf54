/// Tree topology and its host implementation
mod tree;
/// Scope chain over a tree
mod fixed;
/// Graph topology and its host implementation
mod graph;
/// Scope chain over a graph
mod free;

pub use tree::*;
pub use fixed::*;
pub use graph::*;
pub use free::*;

use smallvec::SmallVec;

use crate::scope::{NodeScopes, ScopeId};
use crate::VariableEngine;

/// Scopes of a document node, empty if it has none
fn scopes_of(engine: &VariableEngine, node: &str) -> NodeScopes {
    engine.node_scopes(node).cloned().unwrap_or_default()
}

/// Public and private scope of `node`
fn all_scopes_of(engine: &VariableEngine, node: &str) -> SmallVec<[ScopeId; 2]> {
    scopes_of(engine, node).all()
}

/// Whether `node` is a system node (id starts with `$`), which never has private children
pub fn is_system_node(node: &str) -> bool {
    node.starts_with('$')
}
