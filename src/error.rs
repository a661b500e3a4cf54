use smol_str::SmolStr;
use thiserror::Error;

use crate::ast::NodeId;
use crate::scope::ScopeId;

/// Errors raised by [VariableEngine](crate::VariableEngine) operations.
///
/// Reactive delivery never fails: subscribers only ever see successfully-applied changes.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("AST kind {kind} has no registry, register it before creating nodes of it")]
    UnregisteredKind { kind: SmolStr },
    #[error("AST JSON has no kind: {json}")]
    MissingKind { json: serde_json::Value },
    #[error("scope {0} does not exist")]
    UnknownScope(ScopeId),
    #[error("AST node {0} was disposed")]
    DisposedNode(NodeId),
}

pub type EngineResult<T> = Result<T, EngineError>;
