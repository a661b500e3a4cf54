use std::collections::VecDeque;

use smol_str::SmolStr;

use crate::layout::{all_scopes_of, scopes_of, TreeTopology};
use crate::misc::uniq;
use crate::scope::{Scope, ScopeChain, ScopeId, ScopeType};
use crate::VariableEngine;

/// Scope chain of a tree-shaped flow.
///
/// A node sees its preceding siblings, their non-private descendants, and its ancestors (both
/// their public and private scopes), recursively. A node's public scope also sees its own private
/// scope.
pub struct FixedLayoutScopeChain<T: TreeTopology> {
    tree: T,
}

impl<T: TreeTopology> FixedLayoutScopeChain<T> {
    pub fn new(tree: T) -> Self {
        FixedLayoutScopeChain { tree }
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    /// Public scopes of `node` and its descendants, in tree order.
    ///
    /// - `ignore_children_private`: don't descend into a node whose children are private
    /// - `add_private`: include private scopes
    fn all_sorted_child_scopes(
        &self,
        engine: &VariableEngine,
        node: &str,
        ignore_children_private: bool,
        add_private: bool,
    ) -> Vec<ScopeId> {
        let node_scopes = scopes_of(engine, node);
        let mut scopes: Vec<ScopeId> = node_scopes.public.iter().cloned().collect();
        if ignore_children_private && self.tree.is_node_children_private(node) {
            return scopes;
        }
        if add_private {
            scopes.extend(node_scopes.private);
        }
        for child in self.tree.children(node) {
            scopes.extend(self.all_sorted_child_scopes(engine, &child, ignore_children_private, add_private));
        }
        scopes
    }
}

fn prepend(deps: &mut VecDeque<ScopeId>, scopes: impl IntoIterator<Item = ScopeId>) {
    let scopes: Vec<ScopeId> = scopes.into_iter().collect();
    for scope in scopes.into_iter().rev() {
        deps.push_front(scope);
    }
}

impl<T: TreeTopology> ScopeChain for FixedLayoutScopeChain<T> {
    fn get_deps(&self, engine: &VariableEngine, scope: &Scope) -> Vec<ScopeId> {
        let Some(node) = scope.meta().node.as_deref().filter(|node| self.tree.contains(node)) else {
            return Vec::new();
        };
        let mut deps = VecDeque::new();
        let mut curr = Some(SmolStr::new(node));
        while let Some(c) = curr {
            let node_scopes = scopes_of(engine, &c);
            if c == node {
                if scope.meta().scope_type == ScopeType::Public {
                    prepend(&mut deps, node_scopes.private.clone());
                }
            } else {
                if self.tree.has_children(&c) && !self.tree.is_node_children_private(&c) {
                    prepend(&mut deps, self.all_sorted_child_scopes(engine, &c, true, false));
                }
                prepend(&mut deps, node_scopes.public.clone());
            }

            if let Some(prev) = self.tree.prev(&c) {
                curr = Some(prev);
                continue;
            }
            let mut parent = self.tree.parent(&c);
            let mut parent_prev = parent.as_deref().and_then(|parent| self.tree.prev(parent));
            while let Some(p) = parent {
                prepend(&mut deps, all_scopes_of(engine, &p));
                if parent_prev.is_some() {
                    break;
                }
                parent = self.tree.parent(&p);
                parent_prev = parent.as_deref().and_then(|parent| self.tree.prev(parent));
            }
            curr = parent_prev;
        }
        uniq(deps)
    }

    fn get_covers(&self, engine: &VariableEngine, scope: &Scope) -> Vec<ScopeId> {
        let Some(node) = scope.meta().node.as_deref().filter(|node| self.tree.contains(node)) else {
            return Vec::new();
        };
        if scope.meta().scope_type == ScopeType::Private {
            let covers = self.all_sorted_child_scopes(engine, node, false, true).into_iter()
                .filter(|cover| cover != scope.id());
            return uniq(covers);
        }

        let mut covers = Vec::new();
        let mut curr = Some(SmolStr::new(node));
        while let Some(c) = curr {
            if c != node {
                if self.tree.has_children(&c) {
                    covers.extend(self.all_sorted_child_scopes(engine, &c, false, true));
                } else {
                    covers.extend(all_scopes_of(engine, &c));
                }
            }

            if let Some(next) = self.tree.next(&c) {
                curr = Some(next);
                continue;
            }
            let mut parent = self.tree.parent(&c);
            let mut parent_next = parent.as_deref().and_then(|parent| self.tree.next(parent));
            while let Some(p) = parent {
                if self.tree.is_node_children_private(&p) {
                    return uniq(covers);
                }
                if parent_next.is_some() {
                    break;
                }
                parent = self.tree.parent(&p);
                parent_next = parent.as_deref().and_then(|parent| self.tree.next(parent));
            }
            curr = parent_next;
        }
        uniq(covers)
    }

    /// Dependencies of the start node, the start node, then what it covers
    fn sort_all(&self, engine: &VariableEngine) -> Vec<ScopeId> {
        let Some(start) = self.tree.nodes().into_iter().find(|node| self.tree.is_start(node)) else {
            return Vec::new();
        };
        let Some(start_scope) = scopes_of(engine, &start).public.and_then(|id| engine.get_scope_by_id(&id)) else {
            return Vec::new();
        };
        let deps = self.get_deps(engine, start_scope);
        let covers: Vec<ScopeId> = self.get_covers(engine, start_scope).into_iter()
            .filter(|cover| !deps.contains(cover) && cover != start_scope.id())
            .collect();
        let mut sorted = deps;
        sorted.push(start_scope.id().clone());
        sorted.extend(covers);
        sorted
    }
}
