use std::collections::VecDeque;

use indexmap::IndexSet;
use smol_str::SmolStr;

use crate::layout::{all_scopes_of, scopes_of, GraphTopology};
use crate::misc::uniq;
use crate::scope::{Scope, ScopeChain, ScopeId, ScopeType};
use crate::VariableEngine;

/// Scope chain of a graph-shaped flow.
///
/// A node sees every upstream node of its own layer (with their public descendants, unless the
/// upstream node's children are private), then does the same from its parent's layer, and so on.
/// It also sees the private scopes of its ancestors.
pub struct FreeLayoutScopeChain<G: GraphTopology> {
    graph: G,
}

impl<G: GraphTopology> FreeLayoutScopeChain<G> {
    pub fn new(graph: G) -> Self {
        FreeLayoutScopeChain { graph }
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Parent of `node`, skipping groups
    pub fn node_parent(&self, node: &str) -> Option<SmolStr> {
        let mut parent = self.graph.parent(node);
        while let Some(group) = parent.as_deref().filter(|parent| self.graph.is_group(parent)) {
            parent = self.graph.parent(group);
        }
        parent
    }

    /// Upstream nodes with the same parent as `node`, farthest first
    fn all_input_layer_nodes(&self, node: &str) -> Vec<SmolStr> {
        let parent = self.node_parent(node);
        let mut result = IndexSet::new();
        let mut queue = VecDeque::from([SmolStr::new(node)]);
        while let Some(curr) = queue.pop_front() {
            for input in self.graph.input_nodes(&curr) {
                if self.node_parent(&input) == parent && result.insert(input.clone()) {
                    queue.push_back(input);
                }
            }
        }
        result.into_iter().rev().collect()
    }

    /// Downstream nodes with the same parent as `node`
    fn all_output_layer_nodes(&self, node: &str) -> Vec<SmolStr> {
        let parent = self.node_parent(node);
        self.graph.all_output_nodes(node).into_iter()
            .filter(|output| self.node_parent(output) == parent)
            .collect()
    }

    /// Public scopes of `node`'s descendants, unless its children are private
    fn all_public_child_scopes(&self, engine: &VariableEngine, node: &str) -> Vec<ScopeId> {
        if self.graph.is_node_children_private(node) {
            return Vec::new();
        }
        self.graph.children(node).into_iter()
            .flat_map(|child| {
                let mut scopes: Vec<ScopeId> = scopes_of(engine, &child).public.into_iter().collect();
                scopes.extend(self.all_public_child_scopes(engine, &child));
                scopes
            })
            .collect()
    }
}

impl<G: GraphTopology> ScopeChain for FreeLayoutScopeChain<G> {
    fn get_deps(&self, engine: &VariableEngine, scope: &Scope) -> Vec<ScopeId> {
        let Some(node) = scope.meta().node.as_deref().filter(|node| self.graph.contains(node)) else {
            return Vec::new();
        };
        let mut deps = VecDeque::new();
        let mut curr = Some(SmolStr::new(node));
        while let Some(c) = curr {
            let layer: Vec<ScopeId> = self.all_input_layer_nodes(&c).into_iter()
                .flat_map(|input| {
                    let mut scopes: Vec<ScopeId> = scopes_of(engine, &input).public.into_iter().collect();
                    scopes.extend(self.all_public_child_scopes(engine, &input));
                    scopes
                })
                .collect();
            let private = scopes_of(engine, &c).private.filter(|private| private != scope.id());
            for dep in layer.into_iter().chain(private).rev() {
                deps.push_front(dep);
            }
            curr = self.node_parent(&c);
        }
        uniq(deps)
    }

    fn get_covers(&self, engine: &VariableEngine, scope: &Scope) -> Vec<ScopeId> {
        let Some(node) = scope.meta().node.as_deref().filter(|node| self.graph.contains(node)) else {
            return Vec::new();
        };
        let is_private = scope.meta().scope_type == ScopeType::Private;

        let mut queue: VecDeque<SmolStr> = VecDeque::new();
        if is_private {
            queue.extend(self.graph.children(node));
        } else {
            queue.extend(self.all_output_layer_nodes(node));
            let mut parent = self.node_parent(node);
            while let Some(p) = parent {
                if self.graph.is_node_children_private(&p) {
                    break;
                }
                queue.extend(self.all_output_layer_nodes(&p));
                parent = self.node_parent(&p);
            }
        }

        let mut covers = Vec::new();
        while let Some(covered) = queue.pop_front() {
            covers.extend(all_scopes_of(engine, &covered));
            queue.extend(self.graph.children(&covered));
        }
        if is_private {
            covers.extend(scopes_of(engine, node).public);
        }
        uniq(covers)
    }

    /// Breadth-first from the top-level nodes without inputs, each node followed by its
    /// descendants
    fn sort_all(&self, engine: &VariableEngine) -> Vec<ScopeId> {
        let sources = self.graph.nodes().into_iter()
            .filter(|node| self.node_parent(node).is_none() && self.graph.input_nodes(node).is_empty());
        let mut visited = IndexSet::new();
        let mut queue: VecDeque<SmolStr> = sources.collect();
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node.clone()) {
                continue;
            }
            queue.extend(self.graph.children(&node));
            queue.extend(self.graph.output_nodes(&node));
        }
        uniq(visited.iter().flat_map(|node| all_scopes_of(engine, node)))
    }
}
