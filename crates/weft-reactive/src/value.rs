#![forbid(unsafe_code)]

//! Settable leaf observable.
//!
//! [`Value`] is the plain mutable cell of the reactive layer: no upstream,
//! no recompute hook, just comparer-gated writes over a [`LazyWatcher`].

use std::fmt;

use crate::observable::{BoxedListener, Observable, Subscription};
use crate::watcher::{BroadcastMode, Comparer, LazyWatcher, WatcherHooks, default_comparer};

/// Construction options for [`Value`].
pub struct ValueOptions<T> {
    mode: BroadcastMode,
    comparer: Option<Comparer<T>>,
}

impl<T> ValueOptions<T> {
    /// Immediate broadcasts, `PartialEq` comparison.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: BroadcastMode::Immediate,
            comparer: None,
        }
    }

    /// Broadcast mode for this value.
    #[must_use]
    pub fn mode(mut self, mode: BroadcastMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the change comparer (returns true when values are the same).
    #[must_use]
    pub fn comparer(mut self, comparer: impl Fn(&T, &T) -> bool + 'static) -> Self {
        self.comparer = Some(std::rc::Rc::new(comparer));
        self
    }
}

impl<T> Default for ValueOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// Shared mutable observable value. Clones share the cell.
pub struct Value<T: Clone + 'static> {
    watcher: LazyWatcher<T>,
    comparer: Comparer<T>,
}

impl<T: Clone + 'static> Clone for Value<T> {
    fn clone(&self) -> Self {
        Self {
            watcher: self.watcher.clone(),
            comparer: std::rc::Rc::clone(&self.comparer),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Value<T> {
    /// New value with immediate broadcasts and `PartialEq` gating.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self::with_options(initial, ValueOptions::new())
    }

    /// New value with explicit options.
    #[must_use]
    pub fn with_options(initial: T, options: ValueOptions<T>) -> Self {
        let comparer = options.comparer.unwrap_or_else(default_comparer);
        Self {
            watcher: LazyWatcher::with_comparer(
                initial,
                WatcherHooks::inert(),
                options.mode,
                std::rc::Rc::clone(&comparer),
            ),
            comparer,
        }
    }
}

impl<T: Clone + 'static> Value<T> {
    /// Current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.watcher.get()
    }

    /// Borrowing read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.watcher.with(f)
    }

    /// Write. No-op when the comparer says the value is unchanged.
    pub fn set(&self, value: T) {
        self.watcher.set(value);
    }

    /// Mutate in place; broadcasts only when the comparer sees a change.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let comparer = std::rc::Rc::clone(&self.comparer);
        self.watcher.mutate(move |value| {
            let before = value.clone();
            f(value);
            !comparer(&before, value)
        });
    }

    /// Register a listener.
    pub fn observe(&self, listener: impl FnMut(&T) + 'static) -> Subscription {
        self.watcher.add_listener(listener)
    }

    /// Batch several writes into at most one broadcast.
    pub fn transaction(&self, f: impl FnOnce()) {
        self.watcher.transaction(f);
    }

    /// True while at least one listener is registered.
    #[must_use]
    pub fn live(&self) -> bool {
        self.watcher.live()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.watcher.listener_count()
    }
}

impl<T: Clone + 'static> Observable for Value<T> {
    type Output = T;

    fn get(&self) -> T {
        Value::get(self)
    }

    fn observe_boxed(&self, listener: BoxedListener<T>) -> Subscription {
        self.watcher.add_boxed_listener(listener)
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("value", &self.get())
            .field("live", &self.live())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::{DynObservable, watch};
    use crate::schedule::Scheduler;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn get_set_roundtrip() {
        let value = Value::new(1);
        assert_eq!(value.get(), 1);
        value.set(2);
        assert_eq!(value.get(), 2);
    }

    #[test]
    fn clones_share_the_cell() {
        let a = Value::new(String::from("x"));
        let b = a.clone();
        b.set(String::from("y"));
        assert_eq!(a.get(), "y");
    }

    #[test]
    fn observe_fires_on_change_only() {
        let value = Value::new(3);
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let _sub = value.observe(move |_| f.set(f.get() + 1));

        value.set(3);
        assert_eq!(fired.get(), 0, "equal write must not notify");
        value.set(4);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn update_mutates_in_place() {
        let value = Value::new(vec![1, 2]);
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let _sub = value.observe(move |_| f.set(f.get() + 1));

        value.update(|v| v.push(3));
        assert_eq!(value.get(), vec![1, 2, 3]);
        assert_eq!(fired.get(), 1);

        value.update(|_| {});
        assert_eq!(fired.get(), 1, "no-op update must not notify");
    }

    #[test]
    fn custom_comparer_gates_writes() {
        let value = Value::with_options(
            String::from("Hello"),
            ValueOptions::new().comparer(|a: &String, b: &String| a.eq_ignore_ascii_case(b)),
        );
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let _sub = value.observe(move |_| f.set(f.get() + 1));

        value.set(String::from("HELLO"));
        assert_eq!(fired.get(), 0, "case-insensitive comparer treats this as same");
        value.set(String::from("world"));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn deferred_value_flushes_on_tick() {
        let sched = Scheduler::new();
        let value = Value::with_options(
            0,
            ValueOptions::new().mode(BroadcastMode::NextTick(sched.clone())),
        );
        let seen = Rc::new(Cell::new(-1));
        let s = Rc::clone(&seen);
        let _sub = value.observe(move |v| s.set(*v));

        value.set(5);
        value.set(6);
        assert_eq!(seen.get(), -1);
        sched.tick();
        assert_eq!(seen.get(), 6, "coalesced to the final value");
    }

    #[test]
    fn watch_delivers_current_value_first() {
        let value = Value::new(10);
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let _sub = watch(&value, move |v| s.set(*v));
        assert_eq!(seen.get(), 10, "watch invokes synchronously on attach");

        value.set(11);
        assert_eq!(seen.get(), 11);
    }

    #[test]
    fn erased_handle_behaves_like_the_source() {
        let value = Value::new(7);
        let erased = DynObservable::new(value.clone());
        assert_eq!(erased.get(), 7);

        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let _sub = erased.observe(move |v| s.set(*v));
        value.set(8);
        assert_eq!(seen.get(), 8);
        assert_eq!(value.listener_count(), 1);
    }

    #[test]
    fn listener_count_tracks_subscriptions() {
        let value = Value::new(0);
        assert_eq!(value.listener_count(), 0);
        let a = value.observe(|_| {});
        let b = value.observe(|_| {});
        assert_eq!(value.listener_count(), 2);
        drop(a);
        drop(b);
        assert_eq!(value.listener_count(), 0);
        assert!(!value.live());
    }
}
