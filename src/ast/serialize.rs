use serde_json::Value;

use crate::ast::{AstKind, JsonOut, NodeData, NodeId};
use crate::{EngineError, EngineResult, VariableEngine};

impl VariableEngine {
    /// Updates a node from JSON and delivers the resulting notifications
    pub fn from_json(&mut self, id: NodeId, json: &Value) -> EngineResult<()> {
        let result = self.from_json_batched(id, json);
        self.flush();
        result
    }

    /// Updates a node from JSON as a single batch (see [VariableEngine::with_batch])
    pub(crate) fn from_json_batched(&mut self, id: NodeId, json: &Value) -> EngineResult<()> {
        let behavior = self.node_behavior(id).ok_or(EngineError::DisposedNode(id))?;
        self.with_batch(id, |this| match behavior {
            AstKind::String => {
                this.string_from_json(id, json);
                Ok(())
            }
            AstKind::CustomType => {
                this.custom_type_from_json(id, json);
                Ok(())
            }
            AstKind::Number | AstKind::Integer | AstKind::Boolean | AstKind::Union | AstKind::Any => Ok(()),
            AstKind::Object => this.object_from_json(id, json),
            AstKind::Array => this.array_from_json(id, json),
            AstKind::Map => this.map_type_from_json(id, json),
            AstKind::Property | AstKind::VariableDeclaration => this.field_from_json(id, json),
            AstKind::VariableDeclarationList => this.declaration_list_from_json(id, json),
            AstKind::KeyPathExpression => this.key_path_from_json(id, json),
            AstKind::EnumerateExpression => this.enumerate_from_json(id, json),
            AstKind::WrapArrayExpression => this.wrap_array_from_json(id, json),
            AstKind::MapNode => this.map_node_from_json(id, json),
            AstKind::DataNode => {
                this.data_node_from_json(id, json);
                Ok(())
            }
            AstKind::ListNode => this.list_node_from_json(id, json),
        })
    }

    /// Serializes a node. `kind` is always included and absent fields are omitted; a property or
    /// declaration serializes its effective type.
    pub fn to_json(&self, id: NodeId) -> Option<Value> {
        let node = self.node(id)?;
        let mut out = JsonOut::new(&node.kind);
        let child = |child: Option<NodeId>| child.and_then(|child| self.to_json(child));
        match &node.data {
            NodeData::String(string) => {
                out.put_opt("format", string.format.as_ref().map(|format| format.to_string()));
            }
            NodeData::Number | NodeData::Integer | NodeData::Boolean => {}
            NodeData::Object(object) => {
                out.put("properties", object.properties.iter()
                    .filter_map(|property| self.to_json(*property))
                    .collect::<Vec<_>>());
            }
            NodeData::Array(array) => {
                out.put_opt("items", child(array.items));
            }
            NodeData::Map(map) => {
                out.put_opt("keyType", child(map.key_type));
                out.put_opt("valueType", child(map.value_type));
            }
            NodeData::CustomType(custom) => {
                out.put_opt("typeName", custom.type_name.as_ref().map(|name| name.to_string()));
            }
            NodeData::Property(field) => {
                out.put("key", node.key.as_str())
                    .put_opt("type", child(self.field_type(id)))
                    .put_opt("initializer", child(field.initializer))
                    .put_opt("meta", field.meta.clone());
            }
            NodeData::VariableDeclaration(declaration) => {
                out.put("key", node.key.as_str())
                    .put_opt("type", child(self.field_type(id)))
                    .put_opt("initializer", child(declaration.field.initializer))
                    .put_opt("meta", declaration.field.meta.clone())
                    .put("order", declaration.order);
            }
            NodeData::VariableDeclarationList(list) => {
                out.put("declarations", list.declarations.iter()
                    .filter_map(|declaration| self.to_json(*declaration))
                    .collect::<Vec<_>>());
            }
            NodeData::KeyPathExpression(expression) => {
                out.extend(&expression.raw_json);
            }
            NodeData::EnumerateExpression(expression) => {
                out.put_opt("enumerateFor", child(expression.enumerate_for));
            }
            NodeData::WrapArrayExpression(expression) => {
                out.put_opt("wrapFor", child(expression.wrap_for));
            }
            NodeData::MapNode(map) => {
                out.put("map", map.map.iter()
                    .filter_map(|(key, item)| {
                        self.to_json(*item).map(|item| Value::Array(vec![Value::from(key.as_str()), item]))
                    })
                    .collect::<Vec<_>>());
            }
            NodeData::DataNode(data) => {
                out.extend(&data.data);
            }
            NodeData::ListNode(list) => {
                out.put("list", list.list.iter()
                    .filter_map(|item| self.to_json(*item))
                    .collect::<Vec<_>>());
            }
        }
        Some(out.finish())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_log::test;

    use crate::scope::{MapScopeChain, ScopeMeta};
    use crate::VariableEngine;

    #[test]
    pub fn declaration_round_trip() {
        let mut engine = VariableEngine::new(MapScopeChain::default());
        let scope = engine.create_scope("s", ScopeMeta::default()).expect("scope");
        let json = json!({
            "kind": "VariableDeclaration",
            "key": "user",
            "type": {
                "kind": "Object",
                "properties": [
                    { "kind": "Property", "key": "name", "type": { "kind": "String", "format": "email" } },
                    { "kind": "Property", "key": "tags", "type": { "kind": "Array", "items": { "kind": "String" } } },
                    { "kind": "Property", "key": "scores", "type": {
                        "kind": "Map",
                        "keyType": { "kind": "String" },
                        "valueType": { "kind": "Number" },
                    } },
                ],
            },
            "meta": { "title": "User" },
            "order": 3,
        });
        let declaration = engine.set_var(&scope, json.clone()).expect("declaration");
        assert_eq!(engine.to_json(declaration), Some(json));
    }

    #[test]
    pub fn kind_only_types_expand() {
        let mut engine = VariableEngine::new(MapScopeChain::default());
        let scope = engine.create_scope("s", ScopeMeta::default()).expect("scope");
        let declaration = engine.set_var(&scope, json!({
            "kind": "VariableDeclaration",
            "key": "ids",
            "type": { "kind": "Array", "items": "Integer" },
            "meta": null,
        })).expect("declaration");
        assert_eq!(engine.to_json(declaration), Some(json!({
            "kind": "VariableDeclaration",
            "key": "ids",
            "type": { "kind": "Array", "items": { "kind": "Integer" } },
            "order": 0,
        })));
    }

    #[test]
    pub fn data_and_list_nodes() {
        let mut engine = VariableEngine::new(MapScopeChain::default());
        let scope = engine.create_scope("s", ScopeMeta::default()).expect("scope");
        let data = engine.set_var_by_key(&scope, "data", json!({ "kind": "DataNode", "a": 1 })).expect("data");
        assert_eq!(engine.to_json(data), Some(json!({ "kind": "DataNode", "a": 1 })));
        let version = engine.node(data).map(|node| node.version()).unwrap_or_default();
        engine.data_node_partial_update(data, json!({ "b": 2 }).as_object().cloned().unwrap_or_default());
        assert_eq!(engine.to_json(data), Some(json!({ "kind": "DataNode", "a": 1, "b": 2 })));
        assert_eq!(engine.node(data).map(|node| node.version()), Some(version + 1));

        let list = engine.set_var_by_key(&scope, "list", json!({
            "kind": "ListNode",
            "list": [{ "kind": "String" }, { "kind": "Number" }],
        })).expect("list");
        let items = engine.node(list).and_then(|node| node.data().as_list_node()).map(|list| list.list().to_vec()).unwrap_or_default();
        engine.from_json(list, &json!({ "list": [{ "kind": "String", "format": "uri" }] })).expect("update");
        let next = engine.node(list).and_then(|node| node.data().as_list_node()).map(|list| list.list().to_vec()).unwrap_or_default();
        assert_eq!(next, vec![items[0]]);
        assert!(engine.is_disposed(items[1]));
        assert_eq!(engine.to_json(list), Some(json!({
            "kind": "ListNode",
            "list": [{ "kind": "String", "format": "uri" }],
        })));
    }
}
