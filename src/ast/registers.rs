use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::ast::{
    ArrayType, AstKind, AstNodeFlags, CustomType, DataNode, EnumerateExpression, KeyPathExpression,
    ListNode, MapNode, MapType, NodeData, ObjectType, StringType, VariableDeclaration,
    VariableDeclarationList, VariableField, WrapArrayExpression,
};

/// How to construct nodes of one kind
#[derive(Debug, Clone)]
pub struct AstRegistry {
    pub kind: SmolStr,
    pub flags: AstNodeFlags,
    /// Initial (empty) data, filled in by `from_json` right after construction
    pub init: fn() -> NodeData,
}

/// Kind → [AstRegistry] table. Creating a node whose kind isn't here fails.
#[derive(Debug, Clone)]
pub struct AstRegisters {
    registries: IndexMap<SmolStr, AstRegistry>,
}

impl AstRegisters {
    /// Registers every built-in kind except the JSON-only markers (`Union`, `Any`)
    pub fn new() -> Self {
        let mut registers = AstRegisters { registries: IndexMap::new() };
        registers.register(AstKind::String, AstNodeFlags::BASIC_TYPE, || NodeData::String(StringType::default()));
        registers.register(AstKind::Number, AstNodeFlags::BASIC_TYPE, || NodeData::Number);
        registers.register(AstKind::Integer, AstNodeFlags::BASIC_TYPE, || NodeData::Integer);
        registers.register(AstKind::Boolean, AstNodeFlags::BASIC_TYPE, || NodeData::Boolean);
        registers.register(AstKind::Object, AstNodeFlags::DRILLDOWN_TYPE, || NodeData::Object(ObjectType::default()));
        registers.register(
            AstKind::Array,
            AstNodeFlags::DRILLDOWN_TYPE | AstNodeFlags::ENUMERATE_TYPE,
            || NodeData::Array(ArrayType::default())
        );
        registers.register(AstKind::Map, AstNodeFlags::BASIC_TYPE, || NodeData::Map(MapType::default()));
        registers.register(AstKind::CustomType, AstNodeFlags::BASIC_TYPE, || NodeData::CustomType(CustomType::default()));
        registers.register(AstKind::Property, AstNodeFlags::VARIABLE_FIELD, || NodeData::Property(VariableField::default()));
        registers.register(
            AstKind::VariableDeclaration,
            AstNodeFlags::VARIABLE_FIELD,
            || NodeData::VariableDeclaration(VariableDeclaration::default())
        );
        registers.register(
            AstKind::VariableDeclarationList,
            AstNodeFlags::empty(),
            || NodeData::VariableDeclarationList(VariableDeclarationList::default())
        );
        registers.register(
            AstKind::KeyPathExpression,
            AstNodeFlags::EXPRESSION,
            || NodeData::KeyPathExpression(KeyPathExpression::default())
        );
        registers.register(
            AstKind::EnumerateExpression,
            AstNodeFlags::EXPRESSION,
            || NodeData::EnumerateExpression(EnumerateExpression::default())
        );
        registers.register(
            AstKind::WrapArrayExpression,
            AstNodeFlags::EXPRESSION,
            || NodeData::WrapArrayExpression(WrapArrayExpression::default())
        );
        registers.register(AstKind::MapNode, AstNodeFlags::empty(), || NodeData::MapNode(MapNode::default()));
        registers.register(AstKind::DataNode, AstNodeFlags::empty(), || NodeData::DataNode(DataNode::default()));
        registers.register(AstKind::ListNode, AstNodeFlags::empty(), || NodeData::ListNode(ListNode::default()));
        registers
    }

    fn register(&mut self, kind: AstKind, flags: AstNodeFlags, init: fn() -> NodeData) {
        self.register_ast(AstRegistry { kind: SmolStr::new_inline(kind.as_str()), flags, init });
    }

    /// Registers (or replaces) the registry of `registry.kind`
    pub fn register_ast(&mut self, registry: AstRegistry) {
        self.registries.insert(registry.kind.clone(), registry);
    }

    /// Registers a host type kind. Nodes of it behave like `CustomType`: basic, compared by kind
    /// and `typeName`.
    pub fn register_custom_type(&mut self, kind: impl Into<SmolStr>) {
        self.register_ast(AstRegistry {
            kind: kind.into(),
            flags: AstNodeFlags::BASIC_TYPE,
            init: || NodeData::CustomType(CustomType::default()),
        });
    }

    pub fn get(&self, kind: &str) -> Option<&AstRegistry> {
        self.registries.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &SmolStr> + '_ {
        self.registries.keys()
    }
}

impl Default for AstRegisters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    pub fn builtins_registered() {
        let registers = AstRegisters::new();
        for kind in AstKind::ALL {
            let registered = registers.get(kind.as_str()).is_some();
            assert_eq!(registered, !matches!(kind, AstKind::Union | AstKind::Any), "{}", kind);
        }
        assert!(registers.get("Date").is_none());
    }

    #[test]
    pub fn custom_type_registry() {
        let mut registers = AstRegisters::new();
        registers.register_custom_type("Date");
        let registry = registers.get("Date").expect("registered");
        assert_eq!(registry.flags, AstNodeFlags::BASIC_TYPE);
        assert!(matches!((registry.init)(), NodeData::CustomType(_)));
    }
}
