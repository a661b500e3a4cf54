#![doc = include_str!("../README.md")]

/// Variable AST: nodes, kinds, registry, lifecycle, types, declarations and expressions
pub mod ast;
/// Engine configuration
mod config;
/// The engine which owns every scope and AST node
mod engine;
/// Error type
mod error;
/// Scope chain implementations for fixed (tree) and free (graph) layouts
pub mod layout;
/// Utilities which could go in any crate
mod misc;
/// Subscriptions, staged signals and delivery
pub mod reactive;
/// Scopes, variable tables, output / available data and scope chains
pub mod scope;
/// Engine-level services which listen to AST events
pub mod services;

pub use config::*;
pub use engine::*;
pub use error::*;
pub use ast::{AstKind, AstNode, AstNodeFlags, KeyPath, NodeData, NodeId};
pub use scope::{Scope, ScopeChain, ScopeId, ScopeMeta, ScopeType};
