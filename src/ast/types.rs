use indexmap::IndexMap;
use serde_json::Value;
use smol_str::SmolStr;

use crate::ast::{
    json_array, json_get, json_key, json_kind, json_str, parse_type_json_or_kind, with_kind, AstKind,
    AstNodeFlags, ChildSlot, NodeData, NodeId,
};
use crate::scope::{FieldSnapshot, EventPayload, GlobalEventKind};
use crate::{EngineResult, VariableEngine};

/// `String`, optionally with a format (`uri`, `date-time`, ...)
#[derive(Debug, Clone, Default)]
pub struct StringType {
    pub(crate) format: Option<SmolStr>,
}

/// `Object` with ordered properties
#[derive(Debug, Clone, Default)]
pub struct ObjectType {
    pub(crate) properties: Vec<NodeId>,
    pub(crate) property_table: IndexMap<SmolStr, NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct ArrayType {
    pub(crate) items: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct MapType {
    pub(crate) key_type: Option<NodeId>,
    pub(crate) value_type: Option<NodeId>,
}

/// `CustomType` and host-registered type kinds
#[derive(Debug, Clone, Default)]
pub struct CustomType {
    pub(crate) type_name: Option<SmolStr>,
}

impl StringType {
    pub fn format(&self) -> Option<&SmolStr> {
        self.format.as_ref()
    }
}

impl ObjectType {
    pub fn properties(&self) -> &[NodeId] {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<NodeId> {
        self.property_table.get(key).copied()
    }
}

impl ArrayType {
    pub fn items(&self) -> Option<NodeId> {
        self.items
    }
}

impl MapType {
    pub fn key_type(&self) -> Option<NodeId> {
        self.key_type
    }

    pub fn value_type(&self) -> Option<NodeId> {
        self.value_type
    }
}

impl CustomType {
    pub fn type_name(&self) -> Option<&SmolStr> {
        self.type_name.as_ref()
    }
}

// region from_json
impl VariableEngine {
    pub(crate) fn string_from_json(&mut self, id: NodeId, json: &Value) {
        let format = json_str(json, "format").map(SmolStr::new);
        let Some(NodeData::String(string)) = self.node_mut(id).map(|node| &mut node.data) else {
            return;
        };
        if string.format != format {
            string.format = format;
            self.fire_change(id);
        }
    }

    /// Host-registered kinds name their own type unless `typeName` is given
    pub(crate) fn custom_type_from_json(&mut self, id: NodeId, json: &Value) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let type_name = json_str(json, "typeName").map(SmolStr::new)
            .or_else(|| (node.kind != AstKind::CustomType.as_str()).then(|| node.kind.clone()));
        let NodeData::CustomType(custom) = &mut node.data else {
            return;
        };
        if custom.type_name != type_name {
            custom.type_name = type_name;
            self.fire_change(id);
        }
    }

    pub(crate) fn array_from_json(&mut self, id: NodeId, json: &Value) -> EngineResult<()> {
        self.update_child_node(id, ChildSlot::Items, parse_type_json_or_kind(json_get(json, "items")))?;
        Ok(())
    }

    pub(crate) fn map_type_from_json(&mut self, id: NodeId, json: &Value) -> EngineResult<()> {
        let key_type = json_get(json, "keyType").cloned()
            .unwrap_or_else(|| Value::String(AstKind::String.as_str().to_string()));
        self.update_child_node(id, ChildSlot::KeyType, parse_type_json_or_kind(Some(&key_type)))?;
        self.update_child_node(id, ChildSlot::ValueType, parse_type_json_or_kind(json_get(json, "valueType")))?;
        Ok(())
    }

    /// Properties are matched by key: existing ones are updated in place, new ones created,
    /// missing ones disposed. Dispatches `ObjectPropertiesChange` with both lists.
    pub(crate) fn object_from_json(&mut self, id: NodeId, json: &Value) -> EngineResult<()> {
        let Some(object) = self.node(id).and_then(|node| node.data.as_object()) else {
            return Ok(());
        };
        let mut removed_keys: Vec<SmolStr> = object.property_table.keys().cloned().collect();
        let mut table = object.property_table.clone();
        let prev = self.field_snapshots(&object.properties.clone());

        let mut properties = Vec::new();
        for property in json_array(json, "properties") {
            let key = json_key(property).map(SmolStr::new);
            let existing = key.as_ref().and_then(|key| table.get(key).copied());
            if let Some(key) = &key {
                removed_keys.retain(|removed| removed != key);
            }
            match existing {
                Some(existing) => {
                    self.from_json_batched(existing, property)?;
                    properties.push(existing);
                }
                None => {
                    let created = self.create_child_node(id, &with_kind(property, AstKind::Property.as_str()))?;
                    self.fire_change(id);
                    if let Some(node) = self.node(created) {
                        table.insert(node.key.clone(), created);
                    }
                    properties.push(created);
                }
            }
        }

        for key in removed_keys {
            if let Some(property) = table.shift_remove(&key) {
                self.dispose_node(property);
            }
            self.fire_change(id);
        }

        let next = self.field_snapshots(&properties);
        if let Some(NodeData::Object(object)) = self.node_mut(id).map(|node| &mut node.data) {
            object.properties = properties;
            object.property_table = table;
        }
        self.dispatch_ast_event(
            id,
            GlobalEventKind::ObjectPropertiesChange,
            Some(EventPayload::FieldListChange { prev, next }),
        );
        Ok(())
    }

    pub(crate) fn field_snapshots(&self, fields: &[NodeId]) -> Vec<FieldSnapshot> {
        fields.iter().filter_map(|field| self.field_snapshot(*field)).collect()
    }
}
// endregion

// region type queries
impl VariableEngine {
    /// Whether the type node `id` equals the type described by `target` (JSON or a bare kind).
    ///
    /// A `Union` target matches if any member does. A `weak` target (or a union member) only needs
    /// the kind to match; otherwise structured types compare their structure too.
    pub fn is_type_equal(&self, id: NodeId, target: Option<&Value>) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        let Some(target) = parse_type_json_or_kind(target) else {
            return false;
        };
        let target_kind = json_kind(&target);

        if target_kind == Some(AstKind::Union.as_str()) {
            return json_array(&target, "types").iter()
                .any(|member| self.is_type_equal(id, Some(member)));
        }

        let is_kind_equal = target_kind == Some(node.kind.as_str());
        match &node.data {
            NodeData::CustomType(custom) => {
                let target_type_name = json_str(&target, "typeName")
                    .or(target_kind.filter(|kind| *kind != AstKind::CustomType.as_str()));
                is_kind_equal && target_type_name == custom.type_name.as_deref()
            }
            NodeData::Object(_) | NodeData::Array(_) | NodeData::Map(_) => {
                let is_weak = json_get(&target, "weak").and_then(Value::as_bool).unwrap_or(false);
                if is_weak {
                    return is_kind_equal;
                }
                is_kind_equal && self.is_type_strong_equal(id, &target)
            }
            _ => is_kind_equal,
        }
    }

    fn is_type_strong_equal(&self, id: NodeId, target: &Value) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        match &node.data {
            NodeData::Object(object) => {
                let target_properties = json_array(target, "properties");
                let target_keys: Vec<Option<&str>> = target_properties.iter().map(json_key).collect();
                let source_keys_in_target = object.property_table.keys()
                    .all(|key| target_keys.contains(&Some(key.as_str())));
                let target_keys_in_source = target_keys.iter()
                    .all(|key| key.map_or(false, |key| object.property_table.contains_key(key)));
                source_keys_in_target && target_keys_in_source && target_properties.iter().all(|target_property| {
                    json_key(target_property)
                        .and_then(|key| object.property_table.get(key))
                        .and_then(|property| self.field_type(*property))
                        .map_or(false, |ty| self.is_type_equal(ty, json_get(target_property, "type")))
                })
            }
            NodeData::Array(array) => match array.items {
                None => json_get(target, "items").is_none(),
                Some(items) => self.is_type_equal(items, json_get(target, "items")),
            },
            NodeData::Map(map) => {
                let target_key_type = json_get(target, "keyType").cloned()
                    .unwrap_or_else(|| Value::String(AstKind::String.as_str().to_string()));
                let target_value_type = json_get(target, "valueType");
                let is_value_type_equal = match map.value_type {
                    None => target_value_type.is_none(),
                    Some(value_type) => self.is_type_equal(value_type, target_value_type),
                };
                is_value_type_equal && map.key_type.map_or(false, |key_type| {
                    self.is_type_equal(key_type, Some(&target_key_type))
                })
            }
            _ => true,
        }
    }

    pub fn is_drilldown_type(&self, id: NodeId) -> bool {
        self.node(id).map_or(false, |node| node.flags.contains(AstNodeFlags::DRILLDOWN_TYPE))
    }

    /// Drills into a type: `Object` by property key, `Array` by `"0"` into its items
    pub fn type_get_by_key_path(&self, id: NodeId, key_path: &[SmolStr]) -> Option<NodeId> {
        let node = self.node(id)?;
        match &node.data {
            NodeData::Object(object) => {
                let (curr, rest) = key_path.split_first()?;
                let property = object.property_table.get(curr).copied()?;
                if rest.is_empty() {
                    return Some(property);
                }
                let ty = self.field_type(property).filter(|ty| self.is_drilldown_type(*ty))?;
                self.type_get_by_key_path(ty, rest)
            }
            NodeData::Array(array) => {
                let (curr, rest) = key_path.split_first()?;
                let items = array.items.filter(|items| self.is_drilldown_type(*items))?;
                if curr != "0" {
                    return None;
                }
                self.type_get_by_key_path(items, rest)
            }
            _ => {
                log::debug!("{} can't be drilled into", node.kind);
                None
            }
        }
    }
}
// endregion

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_log::test;

    use crate::ast::AstKind;
    use crate::scope::{MapScopeChain, ScopeMeta};
    use crate::VariableEngine;

    fn declare(engine: &mut VariableEngine, ty: serde_json::Value) -> crate::ast::NodeId {
        let scope = engine.create_scope("s", ScopeMeta::default()).expect("scope");
        let declaration = engine.set_var(&scope, json!({
            "kind": "VariableDeclaration",
            "key": "v",
            "type": ty,
        })).expect("declaration");
        engine.field_type(declaration).expect("type")
    }

    #[test]
    pub fn basic_kinds() {
        let mut engine = VariableEngine::new(MapScopeChain::default());
        let ty = declare(&mut engine, json!("String"));
        assert!(engine.is_type_equal(ty, Some(&json!("String"))));
        assert!(engine.is_type_equal(ty, Some(&json!({ "kind": "String" }))));
        assert!(!engine.is_type_equal(ty, Some(&json!("Number"))));
        assert!(!engine.is_type_equal(ty, None));
        assert!(engine.is_type_equal(ty, Some(&json!({ "kind": "Union", "types": ["Number", "String"] }))));
    }

    #[test]
    pub fn structured_types() {
        let mut engine = VariableEngine::new(MapScopeChain::default());
        let ty = declare(&mut engine, json!({
            "kind": "Object",
            "properties": [
                { "key": "a", "type": "String" },
                { "key": "b", "type": { "kind": "Array", "items": "Number" } },
            ],
        }));
        assert!(engine.is_type_equal(ty, Some(&json!({
            "kind": "Object",
            "properties": [
                { "key": "b", "type": { "kind": "Array", "items": "Number" } },
                { "key": "a", "type": "String" },
            ],
        }))));
        assert!(!engine.is_type_equal(ty, Some(&json!({
            "kind": "Object",
            "properties": [{ "key": "a", "type": "String" }],
        }))));
        assert!(!engine.is_type_equal(ty, Some(&json!({
            "kind": "Object",
            "properties": [
                { "key": "a", "type": "String" },
                { "key": "b", "type": { "kind": "Array", "items": "String" } },
            ],
        }))));
        assert!(engine.is_type_equal(ty, Some(&json!({ "kind": "Object", "weak": true }))));
        assert!(engine.is_type_equal(ty, Some(&json!({ "kind": "Union", "types": ["Object"] }))));
    }

    #[test]
    pub fn map_key_defaults_to_string() {
        let mut engine = VariableEngine::new(MapScopeChain::default());
        let ty = declare(&mut engine, json!({ "kind": "Map", "valueType": "Number" }));
        let map = engine.node(ty).and_then(|node| node.data().as_map_type()).cloned().expect("map");
        let key_type = map.key_type().and_then(|key_type| engine.node(key_type)).expect("key type");
        assert!(key_type.is(AstKind::String));
        assert!(engine.is_type_equal(ty, Some(&json!({ "kind": "Map", "valueType": "Number" }))));
        assert!(!engine.is_type_equal(ty, Some(&json!({ "kind": "Map", "keyType": "Number", "valueType": "Number" }))));
        assert!(!engine.is_type_equal(ty, Some(&json!({ "kind": "Map" }))));
    }

    #[test]
    pub fn custom_types_compare_type_name() {
        let mut engine = VariableEngine::new(MapScopeChain::default());
        let ty = declare(&mut engine, json!({ "kind": "CustomType", "typeName": "Date" }));
        assert!(engine.is_type_equal(ty, Some(&json!({ "kind": "CustomType", "typeName": "Date" }))));
        assert!(!engine.is_type_equal(ty, Some(&json!({ "kind": "CustomType", "typeName": "Time" }))));
    }

    #[test]
    pub fn host_kinds_name_their_type() {
        let mut engine = VariableEngine::new(MapScopeChain::default());
        engine.register_custom_type("Date");
        let ty = declare(&mut engine, json!("Date"));
        assert!(engine.is_type_equal(ty, Some(&json!("Date"))));
        assert!(!engine.is_type_equal(ty, Some(&json!({ "kind": "CustomType", "typeName": "Date" }))));
        assert_eq!(engine.to_json(ty), Some(json!({ "kind": "Date", "typeName": "Date" })));
    }

    #[test]
    pub fn drill_into_array_items() {
        let mut engine = VariableEngine::new(MapScopeChain::default());
        let ty = declare(&mut engine, json!({
            "kind": "Array",
            "items": { "kind": "Object", "properties": [{ "key": "name", "type": "String" }] },
        }));
        let name = engine.type_get_by_key_path(ty, &["0".into(), "name".into()]).expect("name");
        assert_eq!(engine.node(name).map(|node| node.key().as_str()), Some("name"));
        assert_eq!(engine.type_get_by_key_path(ty, &["1".into(), "name".into()]), None);
        assert_eq!(engine.type_get_by_key_path(ty, &["0".into()]), None);
    }
}
