/// Node ids and the arena which stores every live node
mod arena;
/// Node flags
mod flags;
/// Built-in AST kinds
mod kind;
/// Node storage: [AstNode] and its kind-specific [NodeData]
mod node;
/// JSON helpers shared by every node kind
mod json;
/// Kind registry: maps a kind to its flags and initial data
mod registers;
/// Creation, batching, change propagation, child replacement and disposal
mod lifecycle;
/// `fromJSON` / `toJSON` dispatch over every node kind
mod serialize;
/// Type nodes and type equality
mod types;
/// Variable fields: properties, declarations and declaration lists
mod declaration;
/// Expressions and reference resolution
mod expression;
/// Generic container nodes: map, list and data
mod common;
/// Kind predicates
pub mod matcher;

pub use arena::*;
pub use flags::*;
pub use kind::*;
pub use node::*;
pub(crate) use json::*;
pub use registers::*;
pub use types::*;
pub use declaration::*;
pub use expression::*;
pub use common::*;
pub(crate) use lifecycle::ChildSlot;
