use join_lazy_fmt::Join;
use serde_json::Value;
use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::ast::{
    json_key, json_kind, without_key_and_kind, AstKind, AstNode, AstNodeFlags, BatchState, KeyPath,
    NodeData, NodeId,
};
use crate::reactive::{Signal, Topic};
use crate::scope::{AstRef, GlobalEventKind, ScopeId};
use crate::{EngineError, EngineResult, VariableEngine};

/// A single-child position inside a node's data
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChildSlot {
    /// Declared type of a property / declaration
    Type,
    Initializer,
    /// `Array.items`
    Items,
    KeyType,
    ValueType,
    EnumerateFor,
    WrapFor,
    /// Resolved type of a key-path or wrap-array expression
    ReturnType,
    /// Entry of a map node
    MapEntry(SmolStr),
}

impl NodeData {
    pub(crate) fn slot(&self, slot: &ChildSlot) -> Option<NodeId> {
        match (self, slot) {
            (_, ChildSlot::Type) => self.field().and_then(|field| field.ty),
            (_, ChildSlot::Initializer) => self.field().and_then(|field| field.initializer),
            (NodeData::Array(array), ChildSlot::Items) => array.items,
            (NodeData::Map(map), ChildSlot::KeyType) => map.key_type,
            (NodeData::Map(map), ChildSlot::ValueType) => map.value_type,
            (NodeData::EnumerateExpression(expression), ChildSlot::EnumerateFor) => expression.enumerate_for,
            (NodeData::WrapArrayExpression(expression), ChildSlot::WrapFor) => expression.wrap_for,
            (NodeData::KeyPathExpression(expression), ChildSlot::ReturnType) => expression.return_type,
            (NodeData::WrapArrayExpression(expression), ChildSlot::ReturnType) => expression.return_type,
            (NodeData::MapNode(map), ChildSlot::MapEntry(key)) => map.map.get(key).copied(),
            _ => None,
        }
    }

    pub(crate) fn set_slot(&mut self, slot: &ChildSlot, value: Option<NodeId>) {
        match (self, slot) {
            (NodeData::MapNode(map), ChildSlot::MapEntry(key)) => match value {
                Some(value) => {
                    map.map.insert(key.clone(), value);
                }
                None => {
                    map.map.shift_remove(key);
                }
            },
            (data, slot) => {
                if let Some(target) = data.slot_mut(slot) {
                    *target = value;
                }
            }
        }
    }

    fn slot_mut(&mut self, slot: &ChildSlot) -> Option<&mut Option<NodeId>> {
        match (self, slot) {
            (NodeData::Property(field), ChildSlot::Type) => Some(&mut field.ty),
            (NodeData::Property(field), ChildSlot::Initializer) => Some(&mut field.initializer),
            (NodeData::VariableDeclaration(declaration), ChildSlot::Type) => Some(&mut declaration.field.ty),
            (NodeData::VariableDeclaration(declaration), ChildSlot::Initializer) => Some(&mut declaration.field.initializer),
            (NodeData::Array(array), ChildSlot::Items) => Some(&mut array.items),
            (NodeData::Map(map), ChildSlot::KeyType) => Some(&mut map.key_type),
            (NodeData::Map(map), ChildSlot::ValueType) => Some(&mut map.value_type),
            (NodeData::EnumerateExpression(expression), ChildSlot::EnumerateFor) => Some(&mut expression.enumerate_for),
            (NodeData::WrapArrayExpression(expression), ChildSlot::WrapFor) => Some(&mut expression.wrap_for),
            (NodeData::KeyPathExpression(expression), ChildSlot::ReturnType) => Some(&mut expression.return_type),
            (NodeData::WrapArrayExpression(expression), ChildSlot::ReturnType) => Some(&mut expression.return_type),
            _ => None,
        }
    }
}

impl VariableEngine {
    pub fn node(&self, id: NodeId) -> Option<&AstNode> {
        self.arena.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut AstNode> {
        self.arena.get_mut(id)
    }

    pub fn is_disposed(&self, id: NodeId) -> bool {
        self.arena.get(id).map_or(true, |node| node.disposed)
    }

    pub(crate) fn node_behavior(&self, id: NodeId) -> Option<AstKind> {
        self.arena.get(id).map(|node| node.data.behavior())
    }

    pub(crate) fn generate_key(&mut self) -> SmolStr {
        self.key_counter += 1;
        SmolStr::new(format!("{}{}", self.config.generated_key_prefix, self.key_counter))
    }

    /// Creates a node from `json` (which must have a registered `kind`).
    ///
    /// The node is populated with change propagation locked, then announced with a `NewAST` event.
    pub(crate) fn create_ast(
        &mut self,
        json: &Value,
        scope: &ScopeId,
        parent: Option<NodeId>,
    ) -> EngineResult<NodeId> {
        let kind = json_kind(json).ok_or_else(|| EngineError::MissingKind { json: json.clone() })?;
        let registry = self.registers.get(kind)
            .ok_or_else(|| EngineError::UnregisteredKind { kind: SmolStr::new(kind) })?;
        let (kind, flags, data) = (registry.kind.clone(), registry.flags, (registry.init)());
        let key = match json_key(json) {
            Some(key) => SmolStr::new(key),
            None => self.generate_key(),
        };

        let mut node = AstNode::new(key, kind, scope.clone(), parent, flags, data);
        node.change_locked = true;
        let id = self.arena.insert(node);
        if let Some(parent) = parent.and_then(|parent| self.arena.get_mut(parent)) {
            parent.children.insert(id);
        }
        self.on_node_constructed(id);

        if let Err(error) = self.from_json_batched(id, &without_key_and_kind(json)) {
            self.dispose_node(id);
            return Err(error);
        }
        if let Some(node) = self.arena.get_mut(id) {
            node.change_locked = false;
        }

        self.dispatch_ast_event(id, GlobalEventKind::NewAst, None);
        self.post_construct(id);
        Ok(id)
    }

    /// Runs `update` as one batch on `id`: every change of `id` inside it (including bubbled-up
    /// child changes) is coalesced into a single change at the end. Nested batches on the same node
    /// join the outer one.
    pub(crate) fn with_batch<R>(&mut self, id: NodeId, update: impl FnOnce(&mut Self) -> R) -> R {
        let starts_batch = match self.arena.get_mut(id) {
            Some(node) if !node.batch.batching => {
                node.batch = BatchState { batching: true, has_changes: false };
                true
            }
            _ => false,
        };
        if !starts_batch {
            return update(self);
        }

        let result = update(self);

        let has_changes = match self.arena.get_mut(id) {
            Some(node) => std::mem::take(&mut node.batch).has_changes,
            None => false,
        };
        if has_changes {
            self.fire_change(id);
        }
        result
    }

    /// Propagates a change of `id`: bumps its version, runs everything watching it, announces an
    /// `UpdateAST` event and then propagates to its parent (or the scope, if it's a root).
    ///
    /// Does nothing while the node is locked or being disposed; only marks the batch while batching.
    pub(crate) fn fire_change(&mut self, id: NodeId) {
        let Some(node) = self.arena.get_mut(id) else {
            return;
        };
        if node.change_locked || node.disposed {
            return;
        }
        if node.batch.batching {
            node.batch.has_changes = true;
            return;
        }

        node.version = node.version.wrapping_add(1);
        let parent = node.parent;
        let scope = node.scope.clone();
        log::trace!("{} {} changed (version {})", node.kind, node.key, node.version);

        self.after_node_change(id);
        self.emit(Topic::Node(id), || Signal::NodeChanged(id));
        self.dispatch_ast_event(id, GlobalEventKind::UpdateAst, None);

        match parent {
            Some(parent) => self.fire_change(parent),
            None => self.on_scope_ast_change(&scope, id),
        }
    }

    /// Internal reactions to a node's change, run before external subscribers are staged
    fn after_node_change(&mut self, id: NodeId) {
        match self.node_behavior(id) {
            Some(AstKind::WrapArrayExpression) => self.check_wrap_array_return_type(id),
            Some(AstKind::VariableDeclaration) => self.on_declaration_change(id),
            _ => {}
        }
        let watching_expressions: SmallVec<[NodeId; 4]> = self.watchers.refs.get(&id)
            .map(|expressions| expressions.iter().copied().collect())
            .unwrap_or_default();
        for expression in watching_expressions {
            self.emit_refs(expression);
        }
    }

    /// Replaces, updates or removes the child in `slot`.
    ///
    /// The child is replaced (disposed and re-created) when the kind changes or `next` carries a
    /// different explicit key; otherwise it's updated in place. Returns the child now in the slot.
    pub(crate) fn update_child_node(
        &mut self,
        parent: NodeId,
        slot: ChildSlot,
        next: Option<Value>,
    ) -> EngineResult<Option<NodeId>> {
        self.with_batch(parent, |this| this.update_child_node_unbatched(parent, &slot, next))
    }

    fn update_child_node_unbatched(
        &mut self,
        parent: NodeId,
        slot: &ChildSlot,
        next: Option<Value>,
    ) -> EngineResult<Option<NodeId>> {
        let Some(parent_node) = self.arena.get(parent) else {
            return Err(EngineError::DisposedNode(parent));
        };
        let scope = parent_node.scope.clone();
        let curr = parent_node.data.slot(slot);
        let curr_node = curr.and_then(|curr| self.arena.get(curr));

        let next_kind = next.as_ref().and_then(json_kind);
        let is_new_kind = curr_node.map(|node| node.kind.as_str()) != next_kind;
        let is_new_key = next.as_ref()
            .and_then(json_key)
            .map_or(false, |key| curr_node.map(|node| node.key.as_str()) != Some(key));

        if !is_new_kind && !is_new_key {
            if let (Some(curr), Some(next)) = (curr, next) {
                self.from_json_batched(curr, &next)?;
            }
            return Ok(curr);
        }

        if let Some(curr) = curr {
            self.dispose_node(curr);
            self.set_slot(parent, slot, None);
        }
        match next {
            Some(next) => {
                let child = self.create_ast(&next, &scope, Some(parent))?;
                self.set_slot(parent, slot, Some(child));
                self.fire_change(parent);
                Ok(Some(child))
            }
            None => {
                self.fire_change(parent);
                Ok(None)
            }
        }
    }

    fn set_slot(&mut self, parent: NodeId, slot: &ChildSlot, value: Option<NodeId>) {
        if let Some(parent) = self.arena.get_mut(parent) {
            parent.data.set_slot(slot, value);
        }
    }

    /// Creates a child of `parent` in its scope, without placing it in any slot
    pub(crate) fn create_child_node(&mut self, parent: NodeId, json: &Value) -> EngineResult<NodeId> {
        let scope = self.arena.get(parent)
            .map(|node| node.scope.clone())
            .ok_or(EngineError::DisposedNode(parent))?;
        self.create_ast(json, &scope, Some(parent))
    }

    /// Disposes `id` and its whole subtree. The parent is notified first, then children are
    /// disposed, then a `DisposeAST` event is dispatched and subscriptions to the node are dropped.
    /// Disposing twice does nothing.
    pub(crate) fn dispose_node(&mut self, id: NodeId) {
        let Some(node) = self.arena.get_mut(id) else {
            return;
        };
        if node.disposed {
            return;
        }
        node.disposed = true;
        let parent = node.parent;
        let children: SmallVec<[NodeId; 4]> = node.children.iter().copied().collect();
        let ast = AstRef { id, kind: node.kind.clone(), key: node.key.clone() };
        let scope = node.scope.clone();

        if let Some(parent) = parent {
            self.fire_change(parent);
        }
        for child in children {
            self.dispose_node(child);
        }
        if let Some(parent) = parent.and_then(|parent| self.arena.get_mut(parent)) {
            parent.children.shift_remove(&id);
        }
        self.on_node_disposed(id, &scope);

        self.dispatch_event(&scope, GlobalEventKind::DisposeAst, Some(ast), None);
        self.bus.remove_topic(&Topic::Node(id));
        self.arena.remove(id);
    }

    /// Variable fields enclosing `id`, nearest first
    pub fn parent_fields(&self, id: NodeId) -> Vec<NodeId> {
        let mut fields = Vec::new();
        let mut curr = self.arena.get(id).and_then(|node| node.parent);
        while let Some(parent) = curr {
            let Some(node) = self.arena.get(parent) else {
                break;
            };
            if node.flags.contains(AstNodeFlags::VARIABLE_FIELD) {
                fields.push(parent);
            }
            curr = node.parent;
        }
        fields
    }

    /// Keys of the enclosing fields from outermost to `id` itself
    pub fn key_path(&self, id: NodeId) -> KeyPath {
        let mut key_path: KeyPath = self.parent_fields(id).into_iter()
            .rev()
            .filter_map(|field| self.arena.get(field).map(|node| node.key.clone()))
            .collect();
        if let Some(node) = self.arena.get(id) {
            key_path.push(node.key.clone());
        }
        key_path
    }

    /// Identity + version of a node: changes whenever the node (or anything under it) changes
    pub fn node_hash(&self, id: NodeId) -> Option<String> {
        let node = self.arena.get(id)?;
        Some(if node.flags.contains(AstNodeFlags::VARIABLE_FIELD) {
            format!("[{}]{}", node.version, ".".join(self.key_path(id)))
        } else {
            format!("{}{}{}", node.version, node.kind, node.key)
        })
    }

    /// Every descendant of `id` (children before grandchildren)
    pub fn all_children(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.arena.get(id) else {
            return Vec::new();
        };
        let children: Vec<NodeId> = node.children.iter().copied().collect();
        let descendants: Vec<NodeId> = children.iter()
            .flat_map(|child| self.all_children(*child))
            .collect();
        children.into_iter().chain(descendants).collect()
    }
}
