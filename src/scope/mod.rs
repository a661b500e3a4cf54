/// Scope identity and placement metadata
mod id;
/// Per-scope state
mod state;
/// AST events and their dispatch
mod event;
/// Variable tables (per-scope output tables and the global table)
mod variable_table;
/// Variables a scope declares
mod output;
/// Variables a scope can see
mod available;
/// Which scopes see which
mod chain;

pub use id::*;
pub use state::*;
pub use event::*;
pub use variable_table::*;
pub use output::*;
pub use available::*;
pub use chain::*;
