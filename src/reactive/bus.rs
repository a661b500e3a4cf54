use std::collections::{BTreeMap, HashMap, VecDeque};

use derive_more::Display;
use indexmap::IndexSet;
use smallvec::SmallVec;

use crate::reactive::{Listener, Signal, Topic};
use crate::VariableEngine;

/// Handle of a subscription, used to unsubscribe
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display(fmt = "subscription {}", _0)]
pub struct SubscriptionId(u64);

struct Entry {
    topics: SmallVec<[Topic; 2]>,
    /// Taken out while the listener is being staged or delivered
    listener: Option<Box<dyn Listener>>,
}

/// Every live subscription, indexed by topic in subscription order, and the queue of pending
/// deliveries
#[derive(Default)]
pub(crate) struct EventBus {
    next_id: u64,
    entries: BTreeMap<SubscriptionId, Entry>,
    by_topic: HashMap<Topic, IndexSet<SubscriptionId>>,
    queue: VecDeque<SubscriptionId>,
}

impl EventBus {
    pub fn insert(&mut self, topics: impl IntoIterator<Item = Topic>, listener: Box<dyn Listener>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let topics: SmallVec<[Topic; 2]> = topics.into_iter().collect();
        for topic in &topics {
            self.by_topic.entry(topic.clone()).or_default().insert(id);
        }
        self.entries.insert(id, Entry { topics, listener: Some(listener) });
        id
    }

    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        for topic in &entry.topics {
            if let Some(subscribers) = self.by_topic.get_mut(topic) {
                subscribers.shift_remove(&id);
                if subscribers.is_empty() {
                    self.by_topic.remove(topic);
                }
            }
        }
        true
    }

    /// Removes every subscription listening to `topic`
    pub fn remove_topic(&mut self, topic: &Topic) {
        let Some(subscribers) = self.by_topic.remove(topic) else {
            return;
        };
        for id in subscribers {
            self.remove(id);
        }
    }

    fn subscribers(&self, topic: &Topic) -> SmallVec<[SubscriptionId; 8]> {
        self.by_topic.get(topic)
            .map(|subscribers| subscribers.iter().copied().collect())
            .unwrap_or_default()
    }

    fn take(&mut self, id: SubscriptionId) -> Option<Box<dyn Listener>> {
        self.entries.get_mut(&id).and_then(|entry| entry.listener.take())
    }

    fn restore(&mut self, id: SubscriptionId, listener: Box<dyn Listener>) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.listener = Some(listener);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl VariableEngine {
    /// Stages a signal on every listener of `topic`. The signal is only built if there are any.
    pub(crate) fn emit(&mut self, topic: Topic, signal: impl FnOnce() -> Signal) {
        let subscribers = self.bus.subscribers(&topic);
        if subscribers.is_empty() {
            return;
        }
        let signal = signal();
        for id in subscribers {
            let Some(mut listener) = self.bus.take(id) else {
                continue;
            };
            let queue = listener.stage(self, &signal);
            self.bus.restore(id, listener);
            if queue {
                self.bus.queue.push_back(id);
            }
        }
    }

    /// Delivers every staged value, in staging order. Public operations call this before
    /// returning.
    pub fn flush(&mut self) {
        while let Some(id) = self.bus.queue.pop_front() {
            let Some(mut listener) = self.bus.take(id) else {
                continue;
            };
            listener.deliver(self);
            self.bus.restore(id, listener);
        }
    }

    pub(crate) fn subscribe_listener(
        &mut self,
        topics: impl IntoIterator<Item = Topic>,
        listener: impl Listener + 'static,
    ) -> SubscriptionId {
        self.bus.insert(topics, Box::new(listener))
    }

    /// Stops a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.remove(id)
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.bus.len()
    }
}
