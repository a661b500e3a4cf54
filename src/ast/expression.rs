use std::collections::VecDeque;

use indexmap::IndexSet;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::ast::{json_array, json_get, AstKind, AstNodeFlags, ChildSlot, JsonOut, NodeData, NodeId};
use crate::scope::ScopeId;
use crate::{EngineResult, VariableEngine};

/// Field names from the outermost declaration down, e.g. `["start", "body", "0", "title"]`
pub type KeyPath = SmallVec<[SmolStr; 4]>;

/// Resolved references of an expression
#[derive(Debug, Clone, Default)]
pub struct ExpressionRefs {
    /// Last delivered references
    pub(crate) refs: Vec<Option<NodeId>>,
    /// Last resolved references, `None` until the first resolution
    pub(crate) resolved: Option<Vec<Option<NodeId>>>,
    /// Fields whose changes re-deliver the references
    pub(crate) watching: Vec<NodeId>,
}

/// References a visible variable (or a property nested inside one) by key path
#[derive(Debug, Clone, Default)]
pub struct KeyPathExpression {
    pub(crate) key_path: KeyPath,
    /// JSON this expression was last built from, returned verbatim by `to_json`
    pub(crate) raw_json: Map<String, Value>,
    /// Copy of the referenced field's type
    pub(crate) return_type: Option<NodeId>,
    /// Hash of the referenced field's type when `return_type` was last copied. `None` until then.
    pub(crate) last_type_hash: Option<Option<String>>,
    pub(crate) refs: ExpressionRefs,
}

/// Evaluates to the item type of an array-returning expression
#[derive(Debug, Clone, Default)]
pub struct EnumerateExpression {
    pub(crate) enumerate_for: Option<NodeId>,
    pub(crate) refs: ExpressionRefs,
}

/// Evaluates to an array of another expression's return type
#[derive(Debug, Clone, Default)]
pub struct WrapArrayExpression {
    pub(crate) wrap_for: Option<NodeId>,
    pub(crate) return_type: Option<NodeId>,
    /// Hash of the wrapped expression's return type at the last refresh. `None` until the
    /// expression is fully constructed.
    pub(crate) last_wrapped_hash: Option<Option<String>>,
    pub(crate) refs: ExpressionRefs,
}

impl KeyPathExpression {
    pub fn key_path(&self) -> &[SmolStr] {
        &self.key_path
    }

    pub fn return_type(&self) -> Option<NodeId> {
        self.return_type
    }

    pub fn raw_json(&self) -> &Map<String, Value> {
        &self.raw_json
    }
}

impl EnumerateExpression {
    pub fn enumerate_for(&self) -> Option<NodeId> {
        self.enumerate_for
    }
}

impl WrapArrayExpression {
    pub fn wrap_for(&self) -> Option<NodeId> {
        self.wrap_for
    }
}

impl NodeData {
    pub(crate) fn expression_refs(&self) -> Option<&ExpressionRefs> {
        match self {
            NodeData::KeyPathExpression(expression) => Some(&expression.refs),
            NodeData::EnumerateExpression(expression) => Some(&expression.refs),
            NodeData::WrapArrayExpression(expression) => Some(&expression.refs),
            _ => None,
        }
    }

    pub(crate) fn expression_refs_mut(&mut self) -> Option<&mut ExpressionRefs> {
        match self {
            NodeData::KeyPathExpression(expression) => Some(&mut expression.refs),
            NodeData::EnumerateExpression(expression) => Some(&mut expression.refs),
            NodeData::WrapArrayExpression(expression) => Some(&mut expression.refs),
            _ => None,
        }
    }
}

impl VariableEngine {
    /// Type an expression evaluates to
    pub fn expression_return_type(&self, id: NodeId) -> Option<NodeId> {
        match &self.node(id)?.data {
            NodeData::KeyPathExpression(expression) => expression.return_type,
            NodeData::WrapArrayExpression(expression) => expression.return_type,
            NodeData::EnumerateExpression(expression) => {
                let child_return_type = self.expression_return_type(expression.enumerate_for?)?;
                match &self.node(child_return_type)?.data {
                    NodeData::Array(array) => array.items,
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Fields an expression currently references (a reference may be unresolved)
    pub fn expression_refs(&self, id: NodeId) -> &[Option<NodeId>] {
        self.node(id)
            .and_then(|node| node.data.expression_refs())
            .map_or(&[], |refs| refs.refs.as_slice())
    }

    /// References of every expression under `id`
    pub fn all_refs(&self, id: NodeId) -> Vec<NodeId> {
        self.all_children(id).into_iter()
            .filter(|child| self.node(*child).map_or(false, |node| node.flags.contains(AstNodeFlags::EXPRESSION)))
            .flat_map(|expression| self.expression_refs(expression).iter().flatten().copied().collect::<Vec<_>>())
            .collect()
    }

    /// Whether making `expression` reference `refs` would close a reference cycle: some field
    /// reachable through the references (and, transitively, their own expressions) encloses
    /// `expression`.
    ///
    /// Only possible when one of the referenced fields lives in a scope that covers the
    /// expression's scope.
    pub fn check_ref_cycle(&self, expression: NodeId, refs: &[Option<NodeId>]) -> bool {
        let Some(node) = self.node(expression) else {
            return false;
        };
        let covers = self.cover_scopes(&node.scope);
        let may_cycle = refs.iter()
            .flatten()
            .filter_map(|field| self.node(*field))
            .any(|field| covers.contains(&field.scope));
        if !may_cycle {
            return false;
        }

        let mut visited = IndexSet::new();
        let mut queue: VecDeque<NodeId> = refs.iter().flatten().copied().collect();
        while let Some(curr) = queue.pop_front() {
            visited.insert(curr);
            queue.extend(self.all_refs(curr).into_iter().filter(|field| !visited.contains(field)));
        }
        self.parent_fields(expression).iter().any(|field| visited.contains(field))
    }

    /// The field `id`'s key path resolves to. An unresolved path (or one refused as a cycle)
    /// yields no reference rather than a `None` entry.
    fn key_path_ref_fields(&self, id: NodeId) -> Vec<Option<NodeId>> {
        let Some((scope, key_path)) = self.node(id).and_then(|node| {
            node.data.as_key_path().map(|expression| (node.scope.clone(), expression.key_path.clone()))
        }) else {
            return Vec::new();
        };
        let field = self.available_get_by_key_path(&scope, &key_path);
        if self.check_ref_cycle(id, &[field]) {
            let enclosing = self.parent_fields(id).into_iter()
                .rev()
                .filter_map(|field| self.node(field).map(|node| node.key.clone()))
                .collect::<Vec<_>>();
            log::warn!(
                "reference cycle in key path expression {} of {:?}, not referencing {:?}",
                id,
                enclosing,
                key_path
            );
            return Vec::new();
        }
        field.map(|field| vec![Some(field)]).unwrap_or_default()
    }

    /// Re-resolves the references of `id`. When they differ from the last resolution, the watched
    /// fields are switched over and the references are delivered.
    pub(crate) fn refresh_refs(&mut self, id: NodeId) {
        let fields = match self.node_behavior(id) {
            Some(AstKind::KeyPathExpression) => self.key_path_ref_fields(id),
            Some(AstKind::EnumerateExpression | AstKind::WrapArrayExpression) => Vec::new(),
            _ => return,
        };
        let watching: Vec<NodeId> = fields.iter().flatten().copied().collect();
        let Some(state) = self.node_mut(id).and_then(|node| node.data.expression_refs_mut()) else {
            return;
        };
        if state.resolved.as_ref() == Some(&fields) {
            return;
        }
        state.resolved = Some(fields);
        let unwatched = std::mem::replace(&mut state.watching, watching.clone());

        for field in unwatched {
            if let Some(expressions) = self.watchers.refs.get_mut(&field) {
                expressions.shift_remove(&id);
                if expressions.is_empty() {
                    self.watchers.refs.remove(&field);
                }
            }
        }
        for field in watching {
            self.watchers.refs.entry(field).or_default().insert(id);
        }
        self.emit_refs(id);
    }

    /// Delivers the current references of `id`: the expression changes, and a key-path expression
    /// re-copies its return type if the referenced type changed
    pub(crate) fn emit_refs(&mut self, id: NodeId) {
        let Some(state) = self.node_mut(id).and_then(|node| node.data.expression_refs_mut()) else {
            return;
        };
        state.refs = state.resolved.clone().unwrap_or_default();
        self.fire_change(id);
        if self.node_behavior(id) == Some(AstKind::KeyPathExpression) {
            self.sync_key_path_return_type(id);
        }
    }

    fn sync_key_path_return_type(&mut self, id: NodeId) {
        let ref_type = self.expression_refs(id).first()
            .copied()
            .flatten()
            .and_then(|field| self.field_type(field));
        let type_hash = ref_type.and_then(|ty| self.node_hash(ty));
        let Some(NodeData::KeyPathExpression(expression)) = self.node_mut(id).map(|node| &mut node.data) else {
            return;
        };
        if expression.last_type_hash.as_ref() == Some(&type_hash) {
            return;
        }
        expression.last_type_hash = Some(type_hash);

        let return_type_json = ref_type.and_then(|ty| self.to_json(ty));
        if let Err(error) = self.update_child_node(id, ChildSlot::ReturnType, return_type_json) {
            log::error!("failed to copy the return type of {}: {}", id, error);
        }
    }

    pub(crate) fn key_path_from_json(&mut self, id: NodeId, json: &Value) -> EngineResult<()> {
        let key_path: KeyPath = json_array(json, "keyPath").iter()
            .filter_map(Value::as_str)
            .map(SmolStr::new)
            .collect();
        let Some(NodeData::KeyPathExpression(expression)) = self.node_mut(id).map(|node| &mut node.data) else {
            return Ok(());
        };
        if expression.key_path != key_path {
            expression.key_path = key_path;
            expression.raw_json = json.as_object().cloned().unwrap_or_default();
            self.refresh_refs(id);
        }
        Ok(())
    }

    pub(crate) fn enumerate_from_json(&mut self, id: NodeId, json: &Value) -> EngineResult<()> {
        self.update_child_node(id, ChildSlot::EnumerateFor, json_get(json, "enumerateFor").cloned())?;
        Ok(())
    }

    pub(crate) fn wrap_array_from_json(&mut self, id: NodeId, json: &Value) -> EngineResult<()> {
        self.update_child_node(id, ChildSlot::WrapFor, json_get(json, "wrapFor").cloned())?;
        Ok(())
    }

    /// Re-wraps the return type when the wrapped expression's return type changed. Does nothing
    /// until the expression is fully constructed.
    pub(crate) fn check_wrap_array_return_type(&mut self, id: NodeId) {
        let wrapped_hash = self.wrapped_return_type_hash(id);
        let Some(NodeData::WrapArrayExpression(expression)) = self.node_mut(id).map(|node| &mut node.data) else {
            return;
        };
        match &expression.last_wrapped_hash {
            Some(last) if *last != wrapped_hash => {}
            _ => return,
        }
        expression.last_wrapped_hash = Some(wrapped_hash);
        self.refresh_wrap_array_return_type(id);
    }

    fn wrapped_return_type_hash(&self, id: NodeId) -> Option<String> {
        let wrap_for = self.node(id)?.data.slot(&ChildSlot::WrapFor)?;
        self.node_hash(self.expression_return_type(wrap_for)?)
    }

    fn refresh_wrap_array_return_type(&mut self, id: NodeId) {
        let items = self.node(id)
            .and_then(|node| node.data.slot(&ChildSlot::WrapFor))
            .and_then(|wrap_for| self.expression_return_type(wrap_for))
            .and_then(|ty| self.to_json(ty));
        let return_type = JsonOut::new(AstKind::Array.as_str()).put_opt("items", items).finish();
        if let Err(error) = self.update_child_node(id, ChildSlot::ReturnType, Some(return_type)) {
            log::error!("failed to wrap the return type of {}: {}", id, error);
        }
    }

    /// Registration which needs the node to exist but happens before it's populated
    pub(crate) fn on_node_constructed(&mut self, id: NodeId) {
        let Some(node) = self.node(id) else {
            return;
        };
        if node.data.behavior() == AstKind::KeyPathExpression {
            let scope = node.scope.clone();
            if let Some(scope) = self.scopes.get_mut(&scope) {
                scope.expressions.insert(id);
            }
        }
    }

    /// Runs after the node is populated and announced
    pub(crate) fn post_construct(&mut self, id: NodeId) {
        if self.node_behavior(id) != Some(AstKind::WrapArrayExpression) {
            return;
        }
        let wrapped_hash = self.wrapped_return_type_hash(id);
        if let Some(NodeData::WrapArrayExpression(expression)) = self.node_mut(id).map(|node| &mut node.data) {
            expression.last_wrapped_hash = Some(wrapped_hash);
        }
        self.refresh_wrap_array_return_type(id);
    }

    /// Drops everything that watches or is watched by `id`
    pub(crate) fn on_node_disposed(&mut self, id: NodeId, scope: &ScopeId) {
        let watching = self.node(id)
            .and_then(|node| node.data.expression_refs())
            .map(|refs| refs.watching.clone())
            .unwrap_or_default();
        for field in watching {
            if let Some(expressions) = self.watchers.refs.get_mut(&field) {
                expressions.shift_remove(&id);
                if expressions.is_empty() {
                    self.watchers.refs.remove(&field);
                }
            }
        }
        self.watchers.refs.remove(&id);
        self.watchers.available.remove(&id);
        if let Some(scope) = self.scopes.get_mut(scope) {
            scope.expressions.shift_remove(&id);
        }
    }
}
