use indexmap::IndexMap;
use serde_json::{Map, Value};
use smol_str::SmolStr;

use crate::ast::{
    json_array, json_get, json_key, parse_type_json_or_kind, with_kind, AstKind, ChildSlot,
    NodeData, NodeId,
};
use crate::scope::{EventPayload, FieldSnapshot, GlobalEventKind};
use crate::{EngineResult, VariableEngine};

/// State shared by properties and variable declarations
#[derive(Debug, Clone, Default)]
pub struct VariableField {
    /// Declared type. Ignored while there's an initializer (see
    /// [VariableEngine::field_type](crate::VariableEngine::field_type)).
    pub(crate) ty: Option<NodeId>,
    pub(crate) initializer: Option<NodeId>,
    /// Opaque host metadata
    pub(crate) meta: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct VariableDeclaration {
    pub(crate) field: VariableField,
    /// Sort rank inside the scope's output
    pub(crate) order: i64,
}

/// Ordered declarations, matched by key across updates
#[derive(Debug, Clone, Default)]
pub struct VariableDeclarationList {
    pub(crate) declarations: Vec<NodeId>,
    pub(crate) declaration_table: IndexMap<SmolStr, NodeId>,
}

impl VariableField {
    pub fn declared_type(&self) -> Option<NodeId> {
        self.ty
    }

    pub fn initializer(&self) -> Option<NodeId> {
        self.initializer
    }

    pub fn meta(&self) -> Option<&Value> {
        self.meta.as_ref()
    }
}

impl VariableDeclaration {
    pub fn field(&self) -> &VariableField {
        &self.field
    }

    pub fn order(&self) -> i64 {
        self.order
    }
}

impl VariableDeclarationList {
    pub fn declarations(&self) -> &[NodeId] {
        &self.declarations
    }

    pub fn declaration(&self, key: &str) -> Option<NodeId> {
        self.declaration_table.get(key).copied()
    }
}

fn json_order(json: &Value, field: &str) -> Option<i64> {
    json_get(json, field).and_then(|order| order.as_i64().or_else(|| order.as_f64().map(|order| order as i64)))
}

impl VariableEngine {
    /// Effective type of a property / declaration: the initializer's return type when there's an
    /// initializer (even if it hasn't resolved), otherwise the declared type
    pub fn field_type(&self, id: NodeId) -> Option<NodeId> {
        let field = self.node(id)?.field()?;
        match field.initializer {
            Some(initializer) => self.expression_return_type(initializer),
            None => field.ty,
        }
    }

    pub fn field_meta(&self, id: NodeId) -> Option<&Value> {
        self.node(id)?.field()?.meta.as_ref()
    }

    pub fn declaration_order(&self, id: NodeId) -> Option<i64> {
        self.node(id)?.data.as_declaration().map(|declaration| declaration.order)
    }

    /// Resolves `key_path` inside the field's type, if that type can be drilled into
    pub fn field_get_by_key_path(&self, id: NodeId, key_path: &[SmolStr]) -> Option<NodeId> {
        let ty = self.field_type(id).filter(|ty| self.is_drilldown_type(*ty))?;
        self.type_get_by_key_path(ty, key_path)
    }

    pub(crate) fn field_snapshot(&self, id: NodeId) -> Option<FieldSnapshot> {
        let node = self.node(id)?;
        Some(FieldSnapshot {
            id,
            key: node.key.clone(),
            key_path: self.key_path(id),
            type_kind: self.field_type(id)
                .and_then(|ty| self.node(ty))
                .map(|ty| ty.kind.clone()),
        })
    }

    /// Type, then initializer, then meta. Declarations update their order first.
    pub(crate) fn field_from_json(&mut self, id: NodeId, json: &Value) -> EngineResult<()> {
        if self.node_behavior(id) == Some(AstKind::VariableDeclaration) {
            self.update_order(id, json_order(json, "order").unwrap_or(0));
        }
        self.update_child_node(id, ChildSlot::Type, parse_type_json_or_kind(json_get(json, "type")))?;
        self.update_child_node(id, ChildSlot::Initializer, json_get(json, "initializer").cloned())?;
        self.update_meta(id, json_get(json, "meta").cloned());
        Ok(())
    }

    fn update_order(&mut self, id: NodeId, order: i64) {
        let Some(NodeData::VariableDeclaration(declaration)) = self.node_mut(id).map(|node| &mut node.data) else {
            return;
        };
        if declaration.order != order {
            declaration.order = order;
            self.dispatch_ast_event(id, GlobalEventKind::ReSortVariableDeclarations, None);
            self.fire_change(id);
        }
    }

    fn update_meta(&mut self, id: NodeId, meta: Option<Value>) {
        let Some(field) = self.node_mut(id).and_then(|node| node.data.field_mut()) else {
            return;
        };
        if field.meta != meta {
            field.meta = meta;
            self.fire_change(id);
        }
    }

    /// Declarations are matched by key (falling back to the key of the previous declaration at the
    /// same index). Orders are `startOrder + index` unless given. Dispatches `VariableListChange`.
    pub(crate) fn declaration_list_from_json(&mut self, id: NodeId, json: &Value) -> EngineResult<()> {
        let Some(list) = self.node(id).and_then(|node| node.data.as_declaration_list()) else {
            return Ok(());
        };
        let prev_declarations = list.declarations.clone();
        let mut table = list.declaration_table.clone();
        let mut removed_keys: Vec<SmolStr> = table.keys().cloned().collect();
        let prev = self.field_snapshots(&prev_declarations);
        let start_order = json_order(json, "startOrder").unwrap_or(0);

        let mut declarations = Vec::new();
        for (idx, declaration) in json_array(json, "declarations").iter().enumerate() {
            let declaration_json = with_order(declaration, start_order + idx as i64);
            let key = json_key(declaration).map(SmolStr::new).or_else(|| {
                prev_declarations.get(idx)
                    .and_then(|prev| self.node(*prev))
                    .map(|prev| prev.key.clone())
            });
            let existing = key.as_ref().and_then(|key| table.get(key).copied());
            if let Some(key) = &key {
                removed_keys.retain(|removed| removed != key);
            }

            match existing {
                Some(existing) => {
                    self.from_json_batched(existing, &declaration_json)?;
                    declarations.push(existing);
                }
                None => {
                    let created = self.create_child_node(
                        id,
                        &with_kind(&declaration_json, AstKind::VariableDeclaration.as_str()),
                    )?;
                    self.fire_change(id);
                    if let Some(node) = self.node(created) {
                        table.insert(node.key.clone(), created);
                    }
                    declarations.push(created);
                }
            }
        }

        for key in removed_keys {
            if let Some(declaration) = table.shift_remove(&key) {
                self.dispose_node(declaration);
            }
        }

        let next = self.field_snapshots(&declarations);
        if let Some(NodeData::VariableDeclarationList(list)) = self.node_mut(id).map(|node| &mut node.data) {
            list.declarations = declarations;
            list.declaration_table = table;
        }
        self.dispatch_ast_event(
            id,
            GlobalEventKind::VariableListChange,
            Some(EventPayload::FieldListChange { prev, next }),
        );
        Ok(())
    }
}

/// `{ order, ...declaration }`: an explicit order in the declaration wins
fn with_order(declaration: &Value, order: i64) -> Value {
    let mut object = Map::new();
    object.insert("order".to_string(), Value::from(order));
    if let Value::Object(declaration) = declaration {
        for (field, value) in declaration {
            object.insert(field.clone(), value.clone());
        }
    }
    Value::Object(object)
}
