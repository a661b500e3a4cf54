use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::layout::is_system_node;

/// An ordered tree of document nodes, as seen by [FixedLayoutScopeChain](crate::layout::FixedLayoutScopeChain)
pub trait TreeTopology {
    fn contains(&self, node: &str) -> bool;
    fn parent(&self, node: &str) -> Option<SmolStr>;
    /// In order
    fn children(&self, node: &str) -> Vec<SmolStr>;
    /// Previous sibling
    fn prev(&self, node: &str) -> Option<SmolStr>;
    /// Next sibling
    fn next(&self, node: &str) -> Option<SmolStr>;
    /// Every node, parents before children
    fn nodes(&self) -> Vec<SmolStr>;
    /// Whether the flow starts at `node`
    fn is_start(&self, node: &str) -> bool;

    fn has_children(&self, node: &str) -> bool {
        !self.children(node).is_empty()
    }

    /// Whether the declarations of `node`'s descendants are invisible outside of it. By default
    /// every non-system node with children.
    fn is_node_children_private(&self, node: &str) -> bool {
        !is_system_node(node) && self.has_children(node)
    }
}

#[derive(Debug, Default)]
struct TreeNode {
    parent: Option<SmolStr>,
    children: Vec<SmolStr>,
}

#[derive(Debug, Default)]
struct VirtualTreeInner {
    nodes: IndexMap<SmolStr, TreeNode>,
    roots: Vec<SmolStr>,
    start: Option<SmolStr>,
    children_private: HashMap<SmolStr, bool>,
}

/// Editable [TreeTopology]. Clones share the same tree, so the host can edit it while a chain
/// reads it (then call [VariableEngine::refresh_all_change](crate::VariableEngine::refresh_all_change)).
#[derive(Debug, Clone, Default)]
pub struct VirtualTree {
    inner: Rc<RefCell<VirtualTreeInner>>,
}

impl VirtualTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `node` to `parent`'s children, or to the roots. The first root is the start node
    /// unless another is set.
    pub fn add_node(&self, parent: Option<&str>, node: impl Into<SmolStr>) {
        let node = node.into();
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        match parent {
            Some(parent) => {
                if let Some(parent) = inner.nodes.get_mut(parent) {
                    parent.children.push(node.clone());
                } else {
                    log::warn!("parent {} of {} isn't in the tree, adding it as a root", parent, node);
                    inner.roots.push(node.clone());
                }
            }
            None => inner.roots.push(node.clone()),
        }
        if inner.start.is_none() && parent.is_none() {
            inner.start = Some(node.clone());
        }
        let parent = parent.filter(|parent| inner.nodes.contains_key(*parent)).map(SmolStr::new);
        inner.nodes.insert(node, TreeNode { parent, children: Vec::new() });
    }

    /// Removes `node` and its subtree
    pub fn remove_node(&self, node: &str) {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let Some(removed) = inner.nodes.shift_remove(node) else {
            return;
        };
        match &removed.parent {
            Some(parent) => {
                if let Some(parent) = inner.nodes.get_mut(parent) {
                    parent.children.retain(|child| child != node);
                }
            }
            None => inner.roots.retain(|root| root != node),
        }
        if inner.start.as_deref() == Some(node) {
            inner.start = None;
        }
        let mut orphans = removed.children;
        while let Some(orphan) = orphans.pop() {
            if let Some(orphan) = inner.nodes.shift_remove(&orphan) {
                orphans.extend(orphan.children);
            }
        }
    }

    pub fn set_start(&self, node: impl Into<SmolStr>) {
        self.inner.borrow_mut().start = Some(node.into());
    }

    /// Overrides the default privacy rule for `node`
    pub fn set_children_private(&self, node: impl Into<SmolStr>, private: bool) {
        self.inner.borrow_mut().children_private.insert(node.into(), private);
    }

    fn siblings(&self, node: &str) -> Vec<SmolStr> {
        let inner = self.inner.borrow();
        match inner.nodes.get(node).and_then(|node| node.parent.as_ref()) {
            Some(parent) => inner.nodes.get(parent).map(|parent| parent.children.clone()).unwrap_or_default(),
            None => inner.roots.clone(),
        }
    }

    fn sibling(&self, node: &str, offset: isize) -> Option<SmolStr> {
        let siblings = self.siblings(node);
        let idx = siblings.iter().position(|sibling| sibling == node)?;
        let idx = idx.checked_add_signed(offset)?;
        siblings.get(idx).cloned()
    }
}

impl TreeTopology for VirtualTree {
    fn contains(&self, node: &str) -> bool {
        self.inner.borrow().nodes.contains_key(node)
    }

    fn parent(&self, node: &str) -> Option<SmolStr> {
        self.inner.borrow().nodes.get(node)?.parent.clone()
    }

    fn children(&self, node: &str) -> Vec<SmolStr> {
        self.inner.borrow().nodes.get(node).map(|node| node.children.clone()).unwrap_or_default()
    }

    fn prev(&self, node: &str) -> Option<SmolStr> {
        self.sibling(node, -1)
    }

    fn next(&self, node: &str) -> Option<SmolStr> {
        self.sibling(node, 1)
    }

    fn nodes(&self) -> Vec<SmolStr> {
        self.inner.borrow().nodes.keys().cloned().collect()
    }

    fn is_start(&self, node: &str) -> bool {
        self.inner.borrow().start.as_deref() == Some(node)
    }

    fn is_node_children_private(&self, node: &str) -> bool {
        let overridden = self.inner.borrow().children_private.get(node).copied();
        overridden.unwrap_or_else(|| !is_system_node(node) && self.has_children(node))
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::layout::{TreeTopology, VirtualTree};

    #[test]
    pub fn siblings_and_parents() {
        let tree = VirtualTree::new();
        tree.add_node(None, "start");
        tree.add_node(None, "loop");
        tree.add_node(Some("loop"), "body");
        tree.add_node(None, "end");

        assert!(tree.is_start("start"));
        assert_eq!(tree.prev("loop").as_deref(), Some("start"));
        assert_eq!(tree.next("loop").as_deref(), Some("end"));
        assert_eq!(tree.prev("start"), None);
        assert_eq!(tree.parent("body").as_deref(), Some("loop"));
        assert!(tree.is_node_children_private("loop"));
        assert!(!tree.is_node_children_private("end"));

        tree.set_children_private("loop", false);
        assert!(!tree.is_node_children_private("loop"));

        tree.remove_node("loop");
        assert!(!tree.contains("body"));
        assert_eq!(tree.next("start").as_deref(), Some("end"));
    }
}
