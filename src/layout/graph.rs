use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;

use crate::layout::is_system_node;

/// A directed graph of document nodes with nesting (sub-canvases), as seen by
/// [FreeLayoutScopeChain](crate::layout::FreeLayoutScopeChain)
pub trait GraphTopology {
    fn contains(&self, node: &str) -> bool;
    /// Sources of the edges into `node`
    fn input_nodes(&self, node: &str) -> Vec<SmolStr>;
    /// Targets of the edges out of `node`
    fn output_nodes(&self, node: &str) -> Vec<SmolStr>;
    /// Node `node` is nested in
    fn parent(&self, node: &str) -> Option<SmolStr>;
    /// Nodes nested in `node`
    fn children(&self, node: &str) -> Vec<SmolStr>;
    /// Every node
    fn nodes(&self) -> Vec<SmolStr>;

    /// Groups are transparent: their children belong to the group's parent
    fn is_group(&self, _node: &str) -> bool {
        false
    }

    /// Every node reachable by following edges out of `node`, breadth-first
    fn all_output_nodes(&self, node: &str) -> Vec<SmolStr> {
        let mut visited = IndexSet::new();
        let mut queue: VecDeque<SmolStr> = self.output_nodes(node).into();
        while let Some(curr) = queue.pop_front() {
            if visited.insert(curr.clone()) {
                queue.extend(self.output_nodes(&curr));
            }
        }
        visited.into_iter().collect()
    }

    /// Whether the declarations of `node`'s descendants are invisible to downstream nodes. By
    /// default every node except system nodes and groups.
    fn is_node_children_private(&self, node: &str) -> bool {
        !is_system_node(node) && !self.is_group(node)
    }
}

#[derive(Debug, Default)]
struct GraphNode {
    parent: Option<SmolStr>,
    children: Vec<SmolStr>,
    group: bool,
}

#[derive(Debug, Default)]
struct WorkflowGraphInner {
    nodes: IndexMap<SmolStr, GraphNode>,
    edges: IndexSet<(SmolStr, SmolStr)>,
    children_private: HashMap<SmolStr, bool>,
}

/// Editable [GraphTopology]. Clones share the same graph, so the host can edit it while a chain
/// reads it (then call [VariableEngine::refresh_all_change](crate::VariableEngine::refresh_all_change)).
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    inner: Rc<RefCell<WorkflowGraphInner>>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `node`, nested in `parent` if given
    pub fn add_node(&self, parent: Option<&str>, node: impl Into<SmolStr>) {
        self.insert_node(parent, node.into(), false)
    }

    /// Adds a group: a node whose children belong to its parent
    pub fn add_group(&self, parent: Option<&str>, group: impl Into<SmolStr>) {
        self.insert_node(parent, group.into(), true)
    }

    fn insert_node(&self, parent: Option<&str>, node: SmolStr, group: bool) {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let parent = match parent.map(|parent| (parent, inner.nodes.get_mut(parent))) {
            Some((_, Some(parent_node))) => {
                parent_node.children.push(node.clone());
                parent.map(SmolStr::new)
            }
            Some((parent, None)) => {
                log::warn!("parent {} of {} isn't in the graph, adding it at the top level", parent, node);
                None
            }
            None => None,
        };
        inner.nodes.insert(node, GraphNode { parent, children: Vec::new(), group });
    }

    /// Removes `node`, its descendants and their edges
    pub fn remove_node(&self, node: &str) {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let Some(removed) = inner.nodes.shift_remove(node) else {
            return;
        };
        if let Some(parent) = removed.parent.as_ref().and_then(|parent| inner.nodes.get_mut(parent)) {
            parent.children.retain(|child| child != node);
        }
        let mut gone = vec![SmolStr::new(node)];
        let mut orphans = removed.children;
        while let Some(orphan) = orphans.pop() {
            if let Some(orphan_node) = inner.nodes.shift_remove(&orphan) {
                orphans.extend(orphan_node.children);
            }
            gone.push(orphan);
        }
        inner.edges.retain(|(from, to)| !gone.contains(from) && !gone.contains(to));
    }

    pub fn add_edge(&self, from: impl Into<SmolStr>, to: impl Into<SmolStr>) {
        self.inner.borrow_mut().edges.insert((from.into(), to.into()));
    }

    pub fn remove_edge(&self, from: &str, to: &str) -> bool {
        self.inner.borrow_mut().edges.shift_remove(&(SmolStr::new(from), SmolStr::new(to)))
    }

    /// Overrides the default privacy rule for `node`
    pub fn set_children_private(&self, node: impl Into<SmolStr>, private: bool) {
        self.inner.borrow_mut().children_private.insert(node.into(), private);
    }
}

impl GraphTopology for WorkflowGraph {
    fn contains(&self, node: &str) -> bool {
        self.inner.borrow().nodes.contains_key(node)
    }

    fn input_nodes(&self, node: &str) -> Vec<SmolStr> {
        self.inner.borrow().edges.iter()
            .filter(|(_, to)| to == node)
            .map(|(from, _)| from.clone())
            .collect()
    }

    fn output_nodes(&self, node: &str) -> Vec<SmolStr> {
        self.inner.borrow().edges.iter()
            .filter(|(from, _)| from == node)
            .map(|(_, to)| to.clone())
            .collect()
    }

    fn parent(&self, node: &str) -> Option<SmolStr> {
        self.inner.borrow().nodes.get(node)?.parent.clone()
    }

    fn children(&self, node: &str) -> Vec<SmolStr> {
        self.inner.borrow().nodes.get(node).map(|node| node.children.clone()).unwrap_or_default()
    }

    fn nodes(&self) -> Vec<SmolStr> {
        self.inner.borrow().nodes.keys().cloned().collect()
    }

    fn is_group(&self, node: &str) -> bool {
        self.inner.borrow().nodes.get(node).map_or(false, |node| node.group)
    }

    fn is_node_children_private(&self, node: &str) -> bool {
        let overridden = self.inner.borrow().children_private.get(node).copied();
        overridden.unwrap_or_else(|| !is_system_node(node) && !self.is_group(node))
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::layout::{GraphTopology, WorkflowGraph};

    #[test]
    pub fn edges_and_nesting() {
        let graph = WorkflowGraph::new();
        for node in ["a", "b", "c", "loop"] {
            graph.add_node(None, node);
        }
        graph.add_node(Some("loop"), "body");
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_edge("c", "a");
        graph.add_edge("b", "loop");

        assert_eq!(graph.input_nodes("b"), vec!["a"]);
        assert_eq!(graph.all_output_nodes("a"), vec!["b", "c", "loop", "a"]);
        assert_eq!(graph.children("loop"), vec!["body"]);
        assert!(graph.is_node_children_private("loop"));

        graph.remove_node("loop");
        assert!(!graph.contains("body"));
        assert_eq!(graph.output_nodes("b"), vec!["c"]);
        assert!(graph.remove_edge("a", "b"));
        assert!(!graph.remove_edge("a", "b"));
    }
}
