//! Predicates over optional nodes, so lookups like `engine.node(id)` can be tested directly

use crate::ast::{AstKind, AstNode, AstNodeFlags};

macro_rules! kind_predicates {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            pub fn $name(node: Option<&AstNode>) -> bool {
                is(node, AstKind::$kind)
            }
        )*
    };
}

pub fn is(node: Option<&AstNode>, kind: AstKind) -> bool {
    node.map_or(false, |node| node.is(kind))
}

kind_predicates! {
    is_string => String,
    is_number => Number,
    is_integer => Integer,
    is_boolean => Boolean,
    is_object => Object,
    is_array => Array,
    is_map => Map,
    is_custom_type => CustomType,
    is_property => Property,
    is_variable_declaration => VariableDeclaration,
    is_variable_declaration_list => VariableDeclarationList,
    is_key_path_expression => KeyPathExpression,
    is_enumerate_expression => EnumerateExpression,
    is_wrap_array_expression => WrapArrayExpression,
}

/// Property or variable declaration
pub fn is_variable_field(node: Option<&AstNode>) -> bool {
    node.map_or(false, |node| node.flags.contains(AstNodeFlags::VARIABLE_FIELD))
}

pub fn is_type(node: Option<&AstNode>) -> bool {
    node.map_or(false, |node| node.flags.intersects(AstNodeFlags::VARIABLE_TYPE))
}

pub fn is_expression(node: Option<&AstNode>) -> bool {
    node.map_or(false, |node| node.flags.contains(AstNodeFlags::EXPRESSION))
}
