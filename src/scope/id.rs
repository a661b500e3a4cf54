use derive_more::Display;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use smol_str::SmolStr;

/// Identifies a scope. There's at most one [ScopeId::Global] scope, which every other scope
/// depends on.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeId {
    #[display(fmt = "GlobalScope")]
    Global,
    #[display(fmt = "{}", _0)]
    Name(SmolStr),
}

/// Whether a scope is visible outside its node
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ScopeType {
    /// Visible to later / downstream nodes
    #[default]
    Public,
    /// Only visible inside the node (to its children and its own public scope)
    Private,
}

/// Where a scope sits in the host document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeMeta {
    /// Document node which owns the scope, if any
    pub node: Option<SmolStr>,
    pub scope_type: ScopeType,
    /// Host data
    pub extra: Map<String, Value>,
}

/// The public and private scope of one document node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeScopes {
    pub public: Option<ScopeId>,
    pub private: Option<ScopeId>,
}

impl ScopeId {
    pub fn is_global(&self) -> bool {
        matches!(self, ScopeId::Global)
    }
}

impl From<&str> for ScopeId {
    fn from(name: &str) -> Self {
        ScopeId::Name(SmolStr::new(name))
    }
}

impl From<String> for ScopeId {
    fn from(name: String) -> Self {
        ScopeId::Name(SmolStr::new(name))
    }
}

impl From<SmolStr> for ScopeId {
    fn from(name: SmolStr) -> Self {
        ScopeId::Name(name)
    }
}

impl From<&ScopeId> for ScopeId {
    fn from(id: &ScopeId) -> Self {
        id.clone()
    }
}

impl ScopeMeta {
    pub fn public(node: impl Into<SmolStr>) -> Self {
        ScopeMeta { node: Some(node.into()), scope_type: ScopeType::Public, extra: Map::new() }
    }

    pub fn private(node: impl Into<SmolStr>) -> Self {
        ScopeMeta { node: Some(node.into()), scope_type: ScopeType::Private, extra: Map::new() }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn is_private(&self) -> bool {
        self.scope_type == ScopeType::Private
    }
}

impl NodeScopes {
    /// Public then private
    pub fn all(&self) -> SmallVec<[ScopeId; 2]> {
        self.public.iter().chain(self.private.iter()).cloned().collect()
    }

    pub fn get(&self, scope_type: ScopeType) -> Option<&ScopeId> {
        match scope_type {
            ScopeType::Public => self.public.as_ref(),
            ScopeType::Private => self.private.as_ref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, scope_type: ScopeType) -> &mut Option<ScopeId> {
        match scope_type {
            ScopeType::Public => &mut self.public,
            ScopeType::Private => &mut self.private,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.public.is_none() && self.private.is_none()
    }
}
