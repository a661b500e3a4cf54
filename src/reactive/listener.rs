use std::collections::VecDeque;

use crate::reactive::Signal;
use crate::VariableEngine;

/// Something staged with signals during a mutation and delivered afterwards
pub(crate) trait Listener {
    /// Reacts to `signal`. Returns `true` if a delivery must be queued.
    fn stage(&mut self, engine: &VariableEngine, signal: &Signal) -> bool;
    /// Delivers the oldest staged value
    fn deliver(&mut self, engine: &VariableEngine);
}

/// Listener which selects a value from each signal and passes it to an observer.
///
/// - `distinct`: values equal to the last selected one are dropped
/// - `debounce`: of the values staged before a flush only the latest is delivered
pub(crate) struct Select<T, S, F> {
    select: S,
    observer: F,
    distinct: bool,
    debounce: bool,
    last: Option<T>,
    pending: VecDeque<T>,
}

impl<T, S, F> Select<T, S, F>
where
    T: PartialEq + Clone,
    S: FnMut(&VariableEngine, &Signal) -> Option<T>,
    F: FnMut(&VariableEngine, T),
{
    pub fn new(select: S, observer: F) -> Self {
        Select {
            select,
            observer,
            distinct: false,
            debounce: false,
            last: None,
            pending: VecDeque::new(),
        }
    }

    /// Drops values equal to the previous one. `initial` is the value to compare the first one
    /// against, if any.
    pub fn distinct(mut self, initial: Option<T>) -> Self {
        self.distinct = true;
        self.last = initial;
        self
    }

    pub fn debounce(mut self, debounce: bool) -> Self {
        self.debounce = debounce;
        self
    }

    /// Calls the observer immediately, bypassing staging
    pub fn observe_now(&mut self, engine: &VariableEngine, value: T) {
        (self.observer)(engine, value)
    }
}

impl<T, S, F> Listener for Select<T, S, F>
where
    T: PartialEq + Clone,
    S: FnMut(&VariableEngine, &Signal) -> Option<T>,
    F: FnMut(&VariableEngine, T),
{
    fn stage(&mut self, engine: &VariableEngine, signal: &Signal) -> bool {
        let Some(value) = (self.select)(engine, signal) else {
            return false;
        };
        if self.distinct {
            if self.last.as_ref() == Some(&value) {
                return false;
            }
            self.last = Some(value.clone());
        }
        if self.debounce {
            let idle = self.pending.is_empty();
            self.pending.clear();
            self.pending.push_back(value);
            idle
        } else {
            self.pending.push_back(value);
            true
        }
    }

    fn deliver(&mut self, engine: &VariableEngine) {
        if let Some(value) = self.pending.pop_front() {
            (self.observer)(engine, value)
        }
    }
}
