use derive_more::Display;

/// Built-in AST kinds. Hosts can register more with
/// [VariableEngine::register_custom_type](crate::VariableEngine::register_custom_type); those are
/// only ever identified by their kind string.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AstKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Map,
    Union,
    Any,
    CustomType,
    Property,
    VariableDeclaration,
    VariableDeclarationList,
    KeyPathExpression,
    EnumerateExpression,
    WrapArrayExpression,
    MapNode,
    DataNode,
    ListNode,
}

impl AstKind {
    pub const ALL: [AstKind; 19] = [
        AstKind::String,
        AstKind::Number,
        AstKind::Integer,
        AstKind::Boolean,
        AstKind::Object,
        AstKind::Array,
        AstKind::Map,
        AstKind::Union,
        AstKind::Any,
        AstKind::CustomType,
        AstKind::Property,
        AstKind::VariableDeclaration,
        AstKind::VariableDeclarationList,
        AstKind::KeyPathExpression,
        AstKind::EnumerateExpression,
        AstKind::WrapArrayExpression,
        AstKind::MapNode,
        AstKind::DataNode,
        AstKind::ListNode,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            AstKind::String => "String",
            AstKind::Number => "Number",
            AstKind::Integer => "Integer",
            AstKind::Boolean => "Boolean",
            AstKind::Object => "Object",
            AstKind::Array => "Array",
            AstKind::Map => "Map",
            AstKind::Union => "Union",
            AstKind::Any => "Any",
            AstKind::CustomType => "CustomType",
            AstKind::Property => "Property",
            AstKind::VariableDeclaration => "VariableDeclaration",
            AstKind::VariableDeclarationList => "VariableDeclarationList",
            AstKind::KeyPathExpression => "KeyPathExpression",
            AstKind::EnumerateExpression => "EnumerateExpression",
            AstKind::WrapArrayExpression => "WrapArrayExpression",
            AstKind::MapNode => "MapNode",
            AstKind::DataNode => "DataNode",
            AstKind::ListNode => "ListNode",
        }
    }

    pub fn from_str(kind: &str) -> Option<AstKind> {
        AstKind::ALL.into_iter().find(|k| k.as_str() == kind)
    }
}

impl PartialEq<AstKind> for str {
    fn eq(&self, other: &AstKind) -> bool {
        self == other.as_str()
    }
}

impl PartialEq<AstKind> for &str {
    fn eq(&self, other: &AstKind) -> bool {
        *self == other.as_str()
    }
}
