/// Detects renamed fields of declaration lists and object types
mod rename;

pub use rename::*;
