use derive_more::Display;

use crate::ast::AstNode;

/// Identifies an AST node inside its engine. Ids are never reused, so a stale id of a disposed
/// node simply resolves to nothing.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display(fmt = "#{}", _0)]
pub struct NodeId(u32);

/// Storage for every AST node of an engine. Disposed nodes leave an empty slot behind.
#[derive(Default)]
pub(crate) struct AstArena {
    nodes: Vec<Option<AstNode>>,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u32) -> Self {
        NodeId(raw)
    }
}

impl AstArena {
    /// The id the next inserted node will get
    pub fn next_id(&self) -> NodeId {
        NodeId(self.nodes.len() as u32)
    }

    pub fn insert(&mut self, node: AstNode) -> NodeId {
        let id = self.next_id();
        self.nodes.push(Some(node));
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&AstNode> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut AstNode> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<AstNode> {
        self.nodes.get_mut(id.index()).and_then(Option::take)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use smol_str::SmolStr;
    use test_log::test;

    use super::*;
    use crate::ast::{AstNodeFlags, NodeData};
    use crate::scope::ScopeId;

    fn node(key: &str) -> AstNode {
        AstNode::new(
            SmolStr::new(key),
            SmolStr::new_inline("Number"),
            ScopeId::Global,
            None,
            AstNodeFlags::BASIC_TYPE,
            NodeData::Number,
        )
    }

    #[test]
    pub fn ids_are_not_reused() {
        let mut arena = AstArena::default();
        let a = arena.insert(node("a"));
        assert!(arena.remove(a).is_some());
        let b = arena.insert(node("b"));
        assert_ne!(a, b);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b).map(|node| node.key().as_str()), Some("b"));
        assert_eq!(arena.len(), 1);
    }
}
