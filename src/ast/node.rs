use indexmap::IndexSet;
use smol_str::SmolStr;

use crate::ast::{
    ArrayType, AstKind, AstNodeFlags, CustomType, DataNode, EnumerateExpression, KeyPathExpression,
    ListNode, MapNode, MapType, NodeId, ObjectType, StringType, VariableDeclaration,
    VariableDeclarationList, VariableField, WrapArrayExpression,
};
use crate::scope::ScopeId;

/// A node of a scope's variable AST.
///
/// The node's generic state (identity, flags, version, tree links) lives here; everything specific
/// to its kind lives in [NodeData]. Nodes are owned by the engine's arena and only ever referred to
/// by [NodeId].
#[derive(Debug)]
pub struct AstNode {
    pub(crate) key: SmolStr,
    pub(crate) kind: SmolStr,
    pub(crate) scope: ScopeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) flags: AstNodeFlags,
    pub(crate) version: u64,
    pub(crate) children: IndexSet<NodeId>,
    /// While set, changes don't propagate (set during construction)
    pub(crate) change_locked: bool,
    pub(crate) batch: BatchState,
    /// Set as soon as disposal begins, so nothing fires from a node being torn down
    pub(crate) disposed: bool,
    pub(crate) data: NodeData,
}

/// Batched-update state: nested changes inside a batch are coalesced into one change at its end
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BatchState {
    pub batching: bool,
    pub has_changes: bool,
}

/// Kind-specific node state
#[derive(Debug, Clone)]
pub enum NodeData {
    String(StringType),
    Number,
    Integer,
    Boolean,
    Object(ObjectType),
    Array(ArrayType),
    Map(MapType),
    /// Also used for every kind registered by the host
    CustomType(CustomType),
    Property(VariableField),
    VariableDeclaration(VariableDeclaration),
    VariableDeclarationList(VariableDeclarationList),
    KeyPathExpression(KeyPathExpression),
    EnumerateExpression(EnumerateExpression),
    WrapArrayExpression(WrapArrayExpression),
    MapNode(MapNode),
    DataNode(DataNode),
    ListNode(ListNode),
}

impl AstNode {
    pub(crate) fn new(
        key: SmolStr,
        kind: SmolStr,
        scope: ScopeId,
        parent: Option<NodeId>,
        flags: AstNodeFlags,
        data: NodeData,
    ) -> Self {
        AstNode {
            key,
            kind,
            scope,
            parent,
            flags,
            version: 0,
            children: IndexSet::new(),
            change_locked: false,
            batch: BatchState::default(),
            disposed: false,
            data,
        }
    }

    /// Identifier of the node, unique among its siblings (and, for declarations, within the scope)
    pub fn key(&self) -> &SmolStr {
        &self.key
    }

    pub fn kind(&self) -> &SmolStr {
        &self.kind
    }

    pub fn is(&self, kind: AstKind) -> bool {
        self.kind == kind.as_str()
    }

    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn flags(&self) -> AstNodeFlags {
        self.flags
    }

    pub fn has_flags(&self, flags: AstNodeFlags) -> bool {
        self.flags.intersects(flags)
    }

    /// Incremented on every propagated change
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().copied()
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    /// Property or variable declaration state, if this node is either
    pub fn field(&self) -> Option<&VariableField> {
        self.data.field()
    }
}

impl NodeData {
    /// The built-in kind whose behavior this data follows
    pub fn behavior(&self) -> AstKind {
        match self {
            NodeData::String(_) => AstKind::String,
            NodeData::Number => AstKind::Number,
            NodeData::Integer => AstKind::Integer,
            NodeData::Boolean => AstKind::Boolean,
            NodeData::Object(_) => AstKind::Object,
            NodeData::Array(_) => AstKind::Array,
            NodeData::Map(_) => AstKind::Map,
            NodeData::CustomType(_) => AstKind::CustomType,
            NodeData::Property(_) => AstKind::Property,
            NodeData::VariableDeclaration(_) => AstKind::VariableDeclaration,
            NodeData::VariableDeclarationList(_) => AstKind::VariableDeclarationList,
            NodeData::KeyPathExpression(_) => AstKind::KeyPathExpression,
            NodeData::EnumerateExpression(_) => AstKind::EnumerateExpression,
            NodeData::WrapArrayExpression(_) => AstKind::WrapArrayExpression,
            NodeData::MapNode(_) => AstKind::MapNode,
            NodeData::DataNode(_) => AstKind::DataNode,
            NodeData::ListNode(_) => AstKind::ListNode,
        }
    }

    pub fn field(&self) -> Option<&VariableField> {
        match self {
            NodeData::Property(field) => Some(field),
            NodeData::VariableDeclaration(declaration) => Some(&declaration.field),
            _ => None,
        }
    }

    pub(crate) fn field_mut(&mut self) -> Option<&mut VariableField> {
        match self {
            NodeData::Property(field) => Some(field),
            NodeData::VariableDeclaration(declaration) => Some(&mut declaration.field),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectType> {
        match self {
            NodeData::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayType> {
        match self {
            NodeData::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_map_type(&self) -> Option<&MapType> {
        match self {
            NodeData::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_declaration(&self) -> Option<&VariableDeclaration> {
        match self {
            NodeData::VariableDeclaration(declaration) => Some(declaration),
            _ => None,
        }
    }

    pub fn as_declaration_list(&self) -> Option<&VariableDeclarationList> {
        match self {
            NodeData::VariableDeclarationList(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_key_path(&self) -> Option<&KeyPathExpression> {
        match self {
            NodeData::KeyPathExpression(expression) => Some(expression),
            _ => None,
        }
    }

    pub fn as_map_node(&self) -> Option<&MapNode> {
        match self {
            NodeData::MapNode(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_data_node(&self) -> Option<&DataNode> {
        match self {
            NodeData::DataNode(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_list_node(&self) -> Option<&ListNode> {
        match self {
            NodeData::ListNode(list) => Some(list),
            _ => None,
        }
    }
}
