use indexmap::IndexMap;
use serde_json::{Map, Value};
use smol_str::SmolStr;

use crate::ast::{json_array, json_kind, ChildSlot, NodeData, NodeId};
use crate::{EngineResult, VariableEngine};

/// Keyed children. Every scope's root is one of these.
#[derive(Debug, Clone, Default)]
pub struct MapNode {
    pub(crate) map: IndexMap<SmolStr, NodeId>,
}

/// Plain JSON data
#[derive(Debug, Clone, Default)]
pub struct DataNode {
    pub(crate) data: Map<String, Value>,
}

/// Positional children
#[derive(Debug, Clone, Default)]
pub struct ListNode {
    pub(crate) list: Vec<NodeId>,
}

impl MapNode {
    pub fn get(&self, key: &str) -> Option<NodeId> {
        self.map.get(key).copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&SmolStr, NodeId)> + '_ {
        self.map.iter().map(|(key, id)| (key, *id))
    }
}

impl DataNode {
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }
}

impl ListNode {
    pub fn list(&self) -> &[NodeId] {
        &self.list
    }
}

impl VariableEngine {
    /// `map` is a list of `[key, json]` pairs. Keys missing from it are removed.
    pub(crate) fn map_node_from_json(&mut self, id: NodeId, json: &Value) -> EngineResult<()> {
        let Some(map) = self.node(id).and_then(|node| node.data.as_map_node()) else {
            return Ok(());
        };
        let mut removed_keys: Vec<SmolStr> = map.map.keys().cloned().collect();
        for entry in json_array(json, "map") {
            let Some([key, item]) = entry.as_array().map(Vec::as_slice) else {
                log::warn!("ignoring malformed map entry {}", entry);
                continue;
            };
            let Some(key) = key.as_str() else {
                log::warn!("ignoring map entry with non-string key {}", key);
                continue;
            };
            removed_keys.retain(|removed| removed != key);
            self.map_node_set_unflushed(id, key, item.clone())?;
        }
        for key in removed_keys {
            self.map_node_remove_unflushed(id, &key);
        }
        Ok(())
    }

    /// Sets (creating, updating or replacing) the child at `key`
    pub(crate) fn map_node_set_unflushed(&mut self, id: NodeId, key: &str, json: Value) -> EngineResult<Option<NodeId>> {
        self.update_child_node(id, ChildSlot::MapEntry(SmolStr::new(key)), Some(json))
    }

    pub(crate) fn map_node_remove_unflushed(&mut self, id: NodeId, key: &str) {
        let child = self.node(id).and_then(|node| node.data.as_map_node()).and_then(|map| map.get(key));
        if let Some(child) = child {
            self.dispose_node(child);
        }
        if let Some(NodeData::MapNode(map)) = self.node_mut(id).map(|node| &mut node.data) {
            map.map.shift_remove(key);
        }
        self.fire_change(id);
    }

    /// Sets (creating, updating or replacing) the child of a map node at `key`
    pub fn map_node_set(&mut self, id: NodeId, key: &str, json: Value) -> EngineResult<Option<NodeId>> {
        let result = self.map_node_set_unflushed(id, key, json);
        self.flush();
        result
    }

    /// Disposes the child of a map node at `key`
    pub fn map_node_remove(&mut self, id: NodeId, key: &str) {
        self.map_node_remove_unflushed(id, key);
        self.flush();
    }

    pub fn map_node_get(&self, id: NodeId, key: &str) -> Option<NodeId> {
        self.node(id)?.data.as_map_node()?.get(key)
    }

    pub(crate) fn data_node_from_json(&mut self, id: NodeId, json: &Value) {
        let data: Map<String, Value> = json.as_object()
            .map(|object| object.iter()
                .filter(|(field, _)| field.as_str() != "kind")
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect())
            .unwrap_or_default();
        let Some(NodeData::DataNode(node)) = self.node_mut(id).map(|node| &mut node.data) else {
            return;
        };
        if node.data != data {
            node.data = data;
            self.fire_change(id);
        }
    }

    /// Merges `data` into a data node's data, changing it only if `data` differs from the current
    pub fn data_node_partial_update(&mut self, id: NodeId, data: Map<String, Value>) {
        if let Some(NodeData::DataNode(node)) = self.node_mut(id).map(|node| &mut node.data) {
            if node.data != data {
                node.data.extend(data);
                self.fire_change(id);
            }
        }
        self.flush();
    }

    /// Items are matched by position: same kind updates in place, another kind replaces
    pub(crate) fn list_node_from_json(&mut self, id: NodeId, json: &Value) -> EngineResult<()> {
        let Some(list) = self.node(id).and_then(|node| node.data.as_list_node()) else {
            return Ok(());
        };
        let prev_list = list.list.clone();
        let items = json_array(json, "list");

        for overflow in prev_list.iter().skip(items.len()) {
            self.dispose_node(*overflow);
            self.fire_change(id);
        }

        let mut next_list = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let prev = prev_list.get(idx).copied().filter(|prev| !self.is_disposed(*prev));
            let prev_kind = prev.and_then(|prev| self.node(prev)).map(|prev| prev.kind.clone());
            match prev {
                Some(prev) if prev_kind.as_deref() == json_kind(item) => {
                    self.from_json_batched(prev, item)?;
                    next_list.push(prev);
                }
                _ => {
                    if let Some(prev) = prev {
                        self.dispose_node(prev);
                    }
                    let created = self.create_child_node(id, item)?;
                    self.fire_change(id);
                    next_list.push(created);
                }
            }
        }

        if let Some(NodeData::ListNode(list)) = self.node_mut(id).map(|node| &mut node.data) {
            list.list = next_list;
        }
        Ok(())
    }
}
