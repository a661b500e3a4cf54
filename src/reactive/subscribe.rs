use crate::ast::NodeId;
use crate::reactive::{Select, Signal, SubscriptionId, Topic};
use crate::scope::{FieldSnapshot, GlobalEvent, GlobalEventKind, ScopeChange, ScopeId};
use crate::services::RenameInfo;
use crate::VariableEngine;

/// How a subscription delivers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Deliver the current value once when subscribing
    pub trigger_on_init: bool,
    /// Deliver only the latest value of each flush
    pub debounce: bool,
}

impl SubscribeOptions {
    pub fn trigger_on_init() -> Self {
        SubscribeOptions { trigger_on_init: true, debounce: false }
    }

    pub fn debounce() -> Self {
        SubscribeOptions { trigger_on_init: false, debounce: true }
    }
}

/// A node at one version. Two snapshots are equal iff they're the same node, unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub hash: String,
}

impl VariableEngine {
    pub fn snapshot(&self, id: NodeId) -> Option<NodeSnapshot> {
        Some(NodeSnapshot { id, hash: self.node_hash(id)? })
    }

    /// Calls `observer` whenever `node` changes. Returns `None` if the node doesn't exist.
    ///
    /// The subscription ends when the node is disposed.
    pub fn subscribe(
        &mut self,
        node: NodeId,
        mut observer: impl FnMut(&VariableEngine, NodeId) + 'static,
        options: SubscribeOptions,
    ) -> Option<SubscriptionId> {
        self.subscribe_with(
            node,
            |engine, node| engine.snapshot(node),
            move |engine, snapshot| {
                if let Some(snapshot) = snapshot {
                    observer(engine, snapshot.id)
                }
            },
            options,
        )
    }

    /// Calls `observer` with `selector`'s result whenever `node` changes and the result differs
    /// from the previous one. Select [NodeSnapshot]s to observe other nodes.
    pub fn subscribe_with<T: PartialEq + Clone + 'static>(
        &mut self,
        node: NodeId,
        mut selector: impl FnMut(&VariableEngine, NodeId) -> T + 'static,
        observer: impl FnMut(&VariableEngine, T) + 'static,
        options: SubscribeOptions,
    ) -> Option<SubscriptionId> {
        if self.is_disposed(node) {
            return None;
        }
        let initial = selector(&*self, node);
        let mut listener = Select::new(
            move |engine: &VariableEngine, signal: &Signal| match signal {
                Signal::NodeChanged(_) => Some(selector(engine, node)),
                _ => None,
            },
            observer,
        )
            .distinct(Some(initial.clone()))
            .debounce(options.debounce);
        if options.trigger_on_init {
            listener.observe_now(self, initial);
        }
        Some(self.subscribe_listener([Topic::Node(node)], listener))
    }

    /// Calls `observer` with the effective type of a property / declaration whenever it changes
    pub fn on_type_change(
        &mut self,
        field: NodeId,
        mut observer: impl FnMut(&VariableEngine, Option<NodeId>) + 'static,
    ) -> Option<SubscriptionId> {
        self.subscribe_with(
            field,
            |engine, field| engine.field_type(field).and_then(|ty| engine.snapshot(ty)),
            move |engine, ty| observer(engine, ty.map(|ty| ty.id)),
            SubscribeOptions::default(),
        )
    }

    /// Calls `observer` on every AST event of every scope, optionally only of one kind
    pub fn on_global_event(
        &mut self,
        kind: Option<GlobalEventKind>,
        observer: impl FnMut(&VariableEngine, GlobalEvent) + 'static,
    ) -> SubscriptionId {
        self.subscribe_listener([Topic::GlobalEvent], Select::new(
            move |_: &VariableEngine, signal: &Signal| match signal {
                Signal::Global(event) if kind.map_or(true, |kind| kind == event.kind) => Some(event.clone()),
                _ => None,
            },
            observer,
        ))
    }

    /// Calls `observer` on the AST events of one scope, optionally only of one kind.
    ///
    /// The subscription ends when the scope is removed.
    pub fn on_scope_event(
        &mut self,
        scope: &ScopeId,
        kind: Option<GlobalEventKind>,
        observer: impl FnMut(&VariableEngine, GlobalEvent) + 'static,
    ) -> SubscriptionId {
        self.subscribe_listener([Topic::ScopeEvent(scope.clone())], Select::new(
            move |_: &VariableEngine, signal: &Signal| match signal {
                Signal::Global(event) if kind.map_or(true, |kind| kind == event.kind) => Some(event.clone()),
                _ => None,
            },
            observer,
        ))
    }

    /// Calls `observer` when a scope is added, removed or updated, or its available variables
    /// change
    pub fn on_scope_change(
        &mut self,
        observer: impl FnMut(&VariableEngine, ScopeChange) + 'static,
    ) -> SubscriptionId {
        self.subscribe_listener([Topic::ScopeChange], Select::new(
            |_: &VariableEngine, signal: &Signal| match signal {
                Signal::ScopeChange(change) => Some(change.clone()),
                _ => None,
            },
            observer,
        ))
    }

    /// Calls `observer` when a field of a declaration list or object is detected as renamed
    pub fn on_rename(
        &mut self,
        observer: impl FnMut(&VariableEngine, RenameInfo) + 'static,
    ) -> SubscriptionId {
        self.subscribe_listener([Topic::Rename], Select::new(
            |_: &VariableEngine, signal: &Signal| match signal {
                Signal::Rename(info) => Some(info.clone()),
                _ => None,
            },
            observer,
        ))
    }

    /// Calls `observer` for each field removed from a declaration list or object (and not
    /// detected as renamed)
    pub fn on_dispose_in_list(
        &mut self,
        observer: impl FnMut(&VariableEngine, FieldSnapshot) + 'static,
    ) -> SubscriptionId {
        self.subscribe_listener([Topic::DisposeInList], Select::new(
            |_: &VariableEngine, signal: &Signal| match signal {
                Signal::DisposeInList(field) => Some(field.clone()),
                _ => None,
            },
            observer,
        ))
    }
}
