//! Subscriptions.
//!
//! Engine mutations never call subscribers directly. While a mutation runs, every signal is
//! *staged* on the listeners of its topic: a listener selects what it cares about from the signal
//! (possibly deduplicating against its last value) and queues a delivery. Deliveries run in order
//! when the public operation finishes (see [VariableEngine::flush](crate::VariableEngine::flush)),
//! with shared access to the engine.

/// Subscription registry and delivery queue
mod bus;
/// What listeners are staged with
mod signal;
/// Listener trait and the selecting listener
mod listener;
/// Subscribing to nodes and engine events
mod subscribe;

pub(crate) use bus::*;
pub use bus::SubscriptionId;
pub(crate) use signal::*;
pub(crate) use listener::*;
pub use subscribe::*;
