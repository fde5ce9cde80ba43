#![forbid(unsafe_code)]

//! Lazy watcher: the listener-lifecycle and broadcast state machine under
//! every observable.
//!
//! A [`LazyWatcher`] owns a cached value plus three hooks supplied by the
//! observable built on top of it:
//!
//! - `update(&mut value) -> bool` recomputes the cached value from upstream
//!   state and reports whether it changed,
//! - `listen()` engages upstream sources (subscribe),
//! - `unlisten()` disengages them (release every upstream subscription).
//!
//! # Architecture
//!
//! The watcher is live iff it has at least one listener. The 0→1 listener
//! edge runs `listen` exactly once, then resyncs the cached value without
//! counting a change, so the first live flush compares against the state
//! the listener attached to; the 1→0 edge runs `unlisten` exactly once.
//! While idle, no upstream subscriptions exist and no recomputation happens
//! on upstream change; reads pull through `update` on demand. This is the
//! laziness contract: no upstream work while nobody observes.
//!
//! Broadcasts are requests, not notifications. A request while suspended
//! (inside a transaction) is dropped; the transaction issues one trailing
//! request. Depending on [`BroadcastMode`] the flush runs synchronously or
//! is queued once on a [`Scheduler`] lane. The flush recomputes via
//! `update` and notifies listeners only when the value actually changed.
//!
//! # Invariants
//!
//! 1. `listen`/`unlisten` fire exactly once per liveness edge.
//! 2. Listeners are notified in subscription order, against a value
//!    snapshot committed before the first callback runs.
//! 3. A listener released mid-broadcast does not fire in that broadcast; a
//!    listener added mid-broadcast first fires on the next one.
//! 4. At most one scheduled flush is in flight per watcher.
//! 5. Transactions nest; only the outermost boundary requests a broadcast.
//! 6. Equal-value writes (per the comparer) request nothing.
//!
//! # Failure Modes
//!
//! - Listener panic mid-broadcast: watcher state is already committed;
//!   remaining listeners are skipped for that broadcast; the watcher stays
//!   usable.
//! - Listener that writes back on every delivery: immediate mode loops
//!   (recursive-delivery semantics); deferred modes coalesce per turn.
//! - `update` hook that re-enters its own watcher: borrow panic. Hooks
//!   must only touch upstream state.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::observable::{BoxedListener, Subscription};
use crate::schedule::Scheduler;

/// Equality used to gate value writes. Returns true when the two values
/// are the same (no broadcast needed).
pub type Comparer<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// Comparer backed by `PartialEq`.
#[must_use]
pub fn default_comparer<T: PartialEq>() -> Comparer<T> {
    Rc::new(|a: &T, b: &T| a == b)
}

type SharedListener<T> = Rc<RefCell<dyn FnMut(&T)>>;

// ---------------------------------------------------------------------------
// BroadcastMode
// ---------------------------------------------------------------------------

/// When a requested broadcast actually flushes.
///
/// The deferred variants carry the scheduler lane they queue on, so a
/// deferred watcher cannot exist without somewhere to flush.
#[derive(Clone, Debug, Default)]
pub enum BroadcastMode {
    /// Flush synchronously inside the request.
    #[default]
    Immediate,
    /// Queue one flush on the tick lane.
    NextTick(Scheduler),
    /// Queue one flush on the idle lane.
    Idle(Scheduler),
}

// ---------------------------------------------------------------------------
// WatcherHooks
// ---------------------------------------------------------------------------

/// Upstream hooks bundled at construction.
pub struct WatcherHooks<T> {
    update: Box<dyn FnMut(&mut T) -> bool>,
    listen: Option<Box<dyn FnMut()>>,
    unlisten: Option<Box<dyn FnMut()>>,
}

impl<T> WatcherHooks<T> {
    /// Hooks for a watcher with no upstream: `update` never changes
    /// anything, liveness edges do nothing.
    #[must_use]
    pub fn inert() -> Self {
        Self {
            update: Box::new(|_| false),
            listen: None,
            unlisten: None,
        }
    }

    /// Hooks with the given `update` recompute function.
    #[must_use]
    pub fn new(update: impl FnMut(&mut T) -> bool + 'static) -> Self {
        Self {
            update: Box::new(update),
            listen: None,
            unlisten: None,
        }
    }

    /// Run `hook` on every 0→1 listener edge.
    #[must_use]
    pub fn on_listen(mut self, hook: impl FnMut() + 'static) -> Self {
        self.listen = Some(Box::new(hook));
        self
    }

    /// Run `hook` on every 1→0 listener edge.
    #[must_use]
    pub fn on_unlisten(mut self, hook: impl FnMut() + 'static) -> Self {
        self.unlisten = Some(Box::new(hook));
        self
    }
}

impl<T> fmt::Debug for WatcherHooks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherHooks")
            .field("listen", &self.listen.is_some())
            .field("unlisten", &self.unlisten.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LazyWatcher
// ---------------------------------------------------------------------------

struct ListenerEntry<T> {
    id: u64,
    /// Cleared on release so an in-flight broadcast skips this entry.
    active: Rc<Cell<bool>>,
    callback: SharedListener<T>,
}

struct WatcherInner<T> {
    value: T,
    comparer: Comparer<T>,
    update: Box<dyn FnMut(&mut T) -> bool>,
    listen: Option<Box<dyn FnMut()>>,
    unlisten: Option<Box<dyn FnMut()>>,
    listeners: Vec<ListenerEntry<T>>,
    next_id: u64,
    live: bool,
    /// Value changed since the last notification (direct-write path and
    /// accumulated `update` results).
    changed: bool,
    /// Transaction nesting depth; > 0 suppresses broadcast requests.
    depth: u32,
    mode: BroadcastMode,
    flush_queued: bool,
    /// A notify pass is running further up the stack.
    notifying: bool,
}

impl<T> WatcherInner<T> {
    /// Refresh the cached value through the update hook, folding the
    /// result into the sticky change flag.
    fn refresh(&mut self) {
        let updated = (self.update)(&mut self.value);
        self.changed |= updated;
    }

    /// Catch the cache up without counting a change. Runs on the 0→1 edge
    /// so the first live flush compares against the state the first
    /// listener attached to, not against a stale idle cache.
    fn resync(&mut self) {
        let _ = (self.update)(&mut self.value);
        self.changed = false;
    }

    /// True when a read cannot trust the cache: idle (nobody keeps it
    /// fresh), mid-transaction, or with an unflushed broadcast pending.
    fn needs_refresh(&self) -> bool {
        !self.live || self.depth > 0 || self.flush_queued
    }
}

/// Handle to one watcher. Clones share state.
pub struct LazyWatcher<T> {
    inner: Rc<RefCell<WatcherInner<T>>>,
}

impl<T> Clone for LazyWatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Non-owning watcher handle. Upstream listener closures hold these so a
/// dropped observable is not kept alive by its own subscriptions.
pub struct WeakWatcher<T> {
    inner: std::rc::Weak<RefCell<WatcherInner<T>>>,
}

impl<T> WeakWatcher<T> {
    /// Recover a strong handle while the watcher is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<LazyWatcher<T>> {
        self.inner.upgrade().map(|inner| LazyWatcher { inner })
    }
}

impl<T> Clone for WeakWatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: std::rc::Weak::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for WeakWatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakWatcher")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> LazyWatcher<T> {
    /// Immediate-mode watcher with `PartialEq` change detection.
    #[must_use]
    pub fn new(initial: T, hooks: WatcherHooks<T>) -> Self {
        Self::with_comparer(initial, hooks, BroadcastMode::Immediate, default_comparer())
    }

    /// Watcher with an explicit broadcast mode.
    #[must_use]
    pub fn with_mode(initial: T, hooks: WatcherHooks<T>, mode: BroadcastMode) -> Self {
        Self::with_comparer(initial, hooks, mode, default_comparer())
    }
}

impl<T: Clone + 'static> LazyWatcher<T> {
    /// Fully explicit constructor; the only one that does not require
    /// `T: PartialEq`.
    #[must_use]
    pub fn with_comparer(
        initial: T,
        hooks: WatcherHooks<T>,
        mode: BroadcastMode,
        comparer: Comparer<T>,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(WatcherInner {
                value: initial,
                comparer,
                update: hooks.update,
                listen: hooks.listen,
                unlisten: hooks.unlisten,
                listeners: Vec::new(),
                next_id: 0,
                live: false,
                changed: false,
                depth: 0,
                mode,
                flush_queued: false,
                notifying: false,
            })),
        }
    }

    /// Current value (clone). Pulls through `update` when the cache cannot
    /// be trusted; while live and fresh this is cache-only.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Borrowing read of the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let mut inner = self.inner.borrow_mut();
        if inner.needs_refresh() {
            inner.refresh();
        }
        f(&inner.value)
    }

    /// Write a value directly. No-op (no broadcast request) when the
    /// comparer says it equals the current value.
    pub fn set(&self, value: T) {
        let wrote = {
            let mut inner = self.inner.borrow_mut();
            if (inner.comparer)(&inner.value, &value) {
                false
            } else {
                inner.value = value;
                inner.changed = true;
                true
            }
        };
        if wrote {
            self.broadcast();
        }
    }

    /// Mutate the value in place; `f` reports whether it changed anything.
    pub fn mutate(&self, f: impl FnOnce(&mut T) -> bool) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let changed = f(&mut inner.value);
            inner.changed |= changed;
            changed
        };
        if changed {
            self.broadcast();
        }
    }

    /// Register a listener. The first listener flips the watcher live and
    /// runs the `listen` hook; releasing the last runs `unlisten`.
    pub fn add_listener(&self, listener: impl FnMut(&T) + 'static) -> Subscription {
        let callback: SharedListener<T> = Rc::new(RefCell::new(listener));
        self.register(callback)
    }

    /// Boxed-listener form, used behind the [`Observable`] object seam.
    ///
    /// [`Observable`]: crate::Observable
    pub fn add_boxed_listener(&self, mut listener: BoxedListener<T>) -> Subscription {
        let callback: SharedListener<T> = Rc::new(RefCell::new(move |value: &T| listener(value)));
        self.register(callback)
    }

    fn register(&self, callback: SharedListener<T>) -> Subscription {
        let active = Rc::new(Cell::new(true));
        let (id, listen_hook, edge) = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push(ListenerEntry {
                id,
                active: Rc::clone(&active),
                callback,
            });
            if inner.live {
                (id, None, false)
            } else {
                inner.live = true;
                (id, inner.listen.take(), true)
            }
        };
        if let Some(mut hook) = listen_hook {
            hook();
            self.inner.borrow_mut().listen = Some(hook);
        }
        if edge {
            #[cfg(feature = "tracing")]
            tracing::trace!(live = true, "watcher liveness edge");
            self.inner.borrow_mut().resync();
        }
        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            active.set(false);
            if let Some(handle) = weak.upgrade() {
                remove_listener(&handle, id);
            }
        })
    }

    /// Request a broadcast. Dropped while suspended; otherwise flushes now
    /// or queues one flush per the mode.
    pub fn broadcast(&self) {
        enum Plan {
            Skip,
            Now,
            Tick(Scheduler),
            Idle(Scheduler),
        }
        let plan = {
            let mut inner = self.inner.borrow_mut();
            if inner.depth > 0 {
                Plan::Skip
            } else {
                match &inner.mode {
                    BroadcastMode::Immediate => Plan::Now,
                    BroadcastMode::NextTick(sched) => {
                        if inner.flush_queued {
                            Plan::Skip
                        } else {
                            let sched = sched.clone();
                            inner.flush_queued = true;
                            Plan::Tick(sched)
                        }
                    }
                    BroadcastMode::Idle(sched) => {
                        if inner.flush_queued {
                            Plan::Skip
                        } else {
                            let sched = sched.clone();
                            inner.flush_queued = true;
                            Plan::Idle(sched)
                        }
                    }
                }
            }
        };
        match plan {
            Plan::Skip => {}
            Plan::Now => flush(&self.inner),
            Plan::Tick(sched) => {
                let weak = Rc::downgrade(&self.inner);
                sched.schedule(move || {
                    if let Some(handle) = weak.upgrade() {
                        flush(&handle);
                    }
                });
            }
            Plan::Idle(sched) => {
                let weak = Rc::downgrade(&self.inner);
                sched.schedule_idle(move || {
                    if let Some(handle) = weak.upgrade() {
                        flush(&handle);
                    }
                });
            }
        }
    }

    /// Run `f` with broadcasts suppressed, then issue one trailing request
    /// reflecting the net effect. Nests; only the outermost boundary
    /// requests.
    pub fn transaction(&self, f: impl FnOnce()) {
        struct DepthGuard<'a, T>(&'a Rc<RefCell<WatcherInner<T>>>);
        impl<T> Drop for DepthGuard<'_, T> {
            fn drop(&mut self) {
                self.0.borrow_mut().depth -= 1;
            }
        }

        self.inner.borrow_mut().depth += 1;
        {
            let _guard = DepthGuard(&self.inner);
            f();
        }
        if self.inner.borrow().depth == 0 {
            self.broadcast();
        }
    }

    /// True while at least one listener is registered.
    #[must_use]
    pub fn live(&self) -> bool {
        self.inner.borrow().live
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Non-owning handle for upstream trigger closures.
    #[must_use]
    pub fn downgrade(&self) -> WeakWatcher<T> {
        WeakWatcher {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl<T> fmt::Debug for LazyWatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let mode = match inner.mode {
            BroadcastMode::Immediate => "immediate",
            BroadcastMode::NextTick(_) => "next-tick",
            BroadcastMode::Idle(_) => "idle",
        };
        f.debug_struct("LazyWatcher")
            .field("live", &inner.live)
            .field("listeners", &inner.listeners.len())
            .field("depth", &inner.depth)
            .field("mode", &mode)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Flush machinery
// ---------------------------------------------------------------------------

/// Recompute and, when changed, notify. State is committed before any
/// callback runs; immediate-mode write-backs from listeners loop here
/// until quiescent instead of recursing.
fn flush<T: Clone + 'static>(handle: &Rc<RefCell<WatcherInner<T>>>) {
    struct NotifyGuard<'a, T>(&'a Rc<RefCell<WatcherInner<T>>>);
    impl<T> Drop for NotifyGuard<'_, T> {
        fn drop(&mut self) {
            self.0.borrow_mut().notifying = false;
        }
    }

    loop {
        let (snapshot, listeners) = {
            let mut inner = handle.borrow_mut();
            inner.flush_queued = false;
            if inner.depth > 0 || inner.notifying || !inner.live {
                return;
            }
            inner.refresh();
            if !inner.changed {
                return;
            }
            inner.changed = false;
            inner.notifying = true;
            let snapshot = inner.value.clone();
            let listeners: Vec<(Rc<Cell<bool>>, SharedListener<T>)> = inner
                .listeners
                .iter()
                .map(|entry| (Rc::clone(&entry.active), Rc::clone(&entry.callback)))
                .collect();
            (snapshot, listeners)
        };

        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("watcher_flush", listeners = listeners.len()).entered();

        {
            let _guard = NotifyGuard(handle);
            for (active, callback) in listeners {
                if active.get() {
                    (callback.borrow_mut())(&snapshot);
                }
            }
        }

        // A listener may have written back. Immediate mode re-notifies in
        // this loop; deferred modes already queued their own flush.
        let again = {
            let inner = handle.borrow();
            inner.changed && inner.live && matches!(inner.mode, BroadcastMode::Immediate)
        };
        if !again {
            return;
        }
    }
}

fn remove_listener<T: Clone + 'static>(handle: &Rc<RefCell<WatcherInner<T>>>, id: u64) {
    let unlisten_hook = {
        let mut inner = handle.borrow_mut();
        let before = inner.listeners.len();
        inner.listeners.retain(|entry| entry.id != id);
        if inner.listeners.len() == before {
            return;
        }
        if inner.live && inner.listeners.is_empty() {
            inner.live = false;
            inner.unlisten.take()
        } else {
            None
        }
    };
    if let Some(mut hook) = unlisten_hook {
        #[cfg(feature = "tracing")]
        tracing::trace!(live = false, "watcher liveness edge");
        hook();
        handle.borrow_mut().unlisten = Some(hook);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_hooks(
        updates: &Rc<Cell<u32>>,
        listens: &Rc<Cell<u32>>,
        unlistens: &Rc<Cell<u32>>,
    ) -> WatcherHooks<i32> {
        let u = Rc::clone(updates);
        let l = Rc::clone(listens);
        let ul = Rc::clone(unlistens);
        WatcherHooks::new(move |_| {
            u.set(u.get() + 1);
            false
        })
        .on_listen(move || l.set(l.get() + 1))
        .on_unlisten(move || ul.set(ul.get() + 1))
    }

    #[test]
    fn idle_watcher_never_engages_listen_hook() {
        let updates = Rc::new(Cell::new(0));
        let listens = Rc::new(Cell::new(0));
        let unlistens = Rc::new(Cell::new(0));
        let watcher = LazyWatcher::new(0, counting_hooks(&updates, &listens, &unlistens));

        let _ = watcher.get();
        watcher.broadcast();
        assert_eq!(listens.get(), 0, "no listener, no upstream engagement");
        assert_eq!(unlistens.get(), 0);
    }

    #[test]
    fn liveness_edges_fire_hooks_exactly_once() {
        let updates = Rc::new(Cell::new(0));
        let listens = Rc::new(Cell::new(0));
        let unlistens = Rc::new(Cell::new(0));
        let watcher = LazyWatcher::new(0, counting_hooks(&updates, &listens, &unlistens));

        let mut a = watcher.add_listener(|_| {});
        let mut b = watcher.add_listener(|_| {});
        assert_eq!(listens.get(), 1, "only the 0→1 edge engages");

        a.release();
        assert_eq!(unlistens.get(), 0, "one listener still registered");
        b.release();
        assert_eq!(unlistens.get(), 1);

        // Re-entry engages again, no double subscription.
        let _c = watcher.add_listener(|_| {});
        assert_eq!(listens.get(), 2);
        assert_eq!(watcher.listener_count(), 1);
    }

    #[test]
    fn reads_while_idle_pull_every_time() {
        let updates = Rc::new(Cell::new(0));
        let watcher = LazyWatcher::new(
            0,
            WatcherHooks::new({
                let u = Rc::clone(&updates);
                move |_| {
                    u.set(u.get() + 1);
                    false
                }
            }),
        );

        let _ = watcher.get();
        let _ = watcher.get();
        assert_eq!(updates.get(), 2, "idle reads cannot trust the cache");
    }

    #[test]
    fn live_fresh_reads_use_the_cache() {
        let updates = Rc::new(Cell::new(0));
        let watcher = LazyWatcher::new(
            7,
            WatcherHooks::new({
                let u = Rc::clone(&updates);
                move |_| {
                    u.set(u.get() + 1);
                    false
                }
            }),
        );

        let _sub = watcher.add_listener(|_| {});
        assert_eq!(updates.get(), 1, "liveness edge resyncs the cache once");
        assert_eq!(watcher.get(), 7);
        let _ = watcher.get();
        assert_eq!(updates.get(), 1, "live and fresh: no recompute on read");
    }

    #[test]
    fn broadcast_without_change_notifies_nobody() {
        let watcher = LazyWatcher::new(0, WatcherHooks::inert());
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let _sub = watcher.add_listener(move |_| f.set(f.get() + 1));

        watcher.broadcast();
        watcher.broadcast();
        assert_eq!(fired.get(), 0, "update reported no change");
    }

    #[test]
    fn set_notifies_with_new_value() {
        let watcher = LazyWatcher::new(0, WatcherHooks::inert());
        let seen = Rc::new(Cell::new(-1));
        let s = Rc::clone(&seen);
        let _sub = watcher.add_listener(move |v| s.set(*v));

        watcher.set(42);
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn equal_set_is_a_no_op() {
        let watcher = LazyWatcher::new(5, WatcherHooks::inert());
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let _sub = watcher.add_listener(move |_| f.set(f.get() + 1));

        watcher.set(5);
        assert_eq!(fired.get(), 0, "comparer-equal write requests nothing");
    }

    #[test]
    fn listeners_notified_in_subscription_order() {
        let watcher = LazyWatcher::new(0, WatcherHooks::inert());
        let order = Rc::new(RefCell::new(Vec::new()));

        let o = Rc::clone(&order);
        let _a = watcher.add_listener(move |_| o.borrow_mut().push("a"));
        let o = Rc::clone(&order);
        let _b = watcher.add_listener(move |_| o.borrow_mut().push("b"));

        watcher.set(1);
        assert_eq!(*order.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn panicking_listener_leaves_state_committed_and_watcher_usable() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let watcher = LazyWatcher::new(0, WatcherHooks::inert());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let _bomb = watcher.add_listener(|v: &i32| {
            if *v == 1 {
                panic!("listener failure");
            }
        });
        let s = Rc::clone(&seen);
        let _tail = watcher.add_listener(move |v| s.borrow_mut().push(*v));

        let w = watcher.clone();
        let outcome = catch_unwind(AssertUnwindSafe(move || w.set(1)));
        assert!(outcome.is_err(), "the panic propagates to the caller");
        assert_eq!(watcher.get(), 1, "state committed before callbacks ran");
        assert!(seen.borrow().is_empty(), "later listeners were skipped");

        watcher.set(2);
        assert_eq!(*seen.borrow(), vec![2], "watcher broadcasts again after the panic");
        assert_eq!(watcher.listener_count(), 2);
    }

    #[test]
    fn transaction_coalesces_to_one_notification() {
        let watcher = LazyWatcher::new(0, WatcherHooks::inert());
        let fired = Rc::new(Cell::new(0));
        let last = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let l = Rc::clone(&last);
        let _sub = watcher.add_listener(move |v| {
            f.set(f.get() + 1);
            l.set(*v);
        });

        let w = watcher.clone();
        watcher.transaction(move || {
            w.set(1);
            w.set(2);
            w.set(3);
        });
        assert_eq!(fired.get(), 1, "three writes, one notification");
        assert_eq!(last.get(), 3, "notification reflects the final state");
    }

    #[test]
    fn nested_transactions_broadcast_once_at_the_outermost_boundary() {
        let watcher = LazyWatcher::new(0, WatcherHooks::inert());
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let _sub = watcher.add_listener(move |_| f.set(f.get() + 1));

        let outer = watcher.clone();
        let fired_inside = Rc::clone(&fired);
        watcher.transaction(move || {
            outer.set(1);
            let inner = outer.clone();
            outer.transaction(move || inner.set(2));
            assert_eq!(fired_inside.get(), 0, "inner boundary must not flush");
        });
        assert_eq!(fired.get(), 1, "one notification at the outermost boundary");
    }

    #[test]
    fn reads_inside_a_transaction_see_latest_writes() {
        let watcher = LazyWatcher::new(0, WatcherHooks::inert());
        let w = watcher.clone();
        watcher.transaction(move || {
            w.set(9);
            assert_eq!(w.get(), 9);
        });
    }

    #[test]
    fn next_tick_mode_defers_and_coalesces() {
        let sched = Scheduler::new();
        let watcher = LazyWatcher::with_mode(
            0,
            WatcherHooks::inert(),
            BroadcastMode::NextTick(sched.clone()),
        );
        let fired = Rc::new(Cell::new(0));
        let last = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let l = Rc::clone(&last);
        let _sub = watcher.add_listener(move |v| {
            f.set(f.get() + 1);
            l.set(*v);
        });

        watcher.set(1);
        watcher.set(2);
        assert_eq!(fired.get(), 0, "nothing flushes before the tick");
        assert_eq!(sched.pending_ticks(), 1, "second request coalesced");
        assert_eq!(watcher.get(), 2, "reads see unflushed writes");

        sched.tick();
        assert_eq!(fired.get(), 1);
        assert_eq!(last.get(), 2);
    }

    #[test]
    fn idle_mode_flushes_on_idle_lane() {
        let sched = Scheduler::new();
        let watcher =
            LazyWatcher::with_mode(0, WatcherHooks::inert(), BroadcastMode::Idle(sched.clone()));
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let _sub = watcher.add_listener(move |_| f.set(f.get() + 1));

        watcher.set(1);
        sched.tick();
        assert_eq!(fired.get(), 0, "idle work must not run on the tick lane");
        sched.run_idle();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn listener_released_mid_broadcast_is_skipped() {
        let watcher = LazyWatcher::new(0, WatcherHooks::inert());
        let b_fired = Rc::new(Cell::new(false));

        let sub_b: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&sub_b);
        let _a = watcher.add_listener(move |_| {
            if let Some(sub) = slot.borrow_mut().as_mut() {
                sub.release();
            }
        });
        let bf = Rc::clone(&b_fired);
        *sub_b.borrow_mut() = Some(watcher.add_listener(move |_| bf.set(true)));

        watcher.set(1);
        assert!(!b_fired.get(), "a released b before b's turn");
    }

    #[test]
    fn listener_added_mid_broadcast_waits_for_the_next_one() {
        let watcher = LazyWatcher::new(0, WatcherHooks::inert());
        let late_fired = Rc::new(Cell::new(0));

        let w = watcher.clone();
        let lf = Rc::clone(&late_fired);
        let late_sub: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&late_sub);
        let _a = watcher.add_listener(move |v| {
            if *v == 1 && slot.borrow().is_none() {
                let lf = Rc::clone(&lf);
                *slot.borrow_mut() = Some(w.add_listener(move |_| lf.set(lf.get() + 1)));
            }
        });

        watcher.set(1);
        assert_eq!(late_fired.get(), 0, "added mid-broadcast, not invoked yet");
        watcher.set(2);
        assert_eq!(late_fired.get(), 1);
    }

    #[test]
    fn write_back_from_listener_renotifies_with_final_value() {
        let watcher = LazyWatcher::new(0, WatcherHooks::inert());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let w = watcher.clone();
        let s = Rc::clone(&seen);
        let _sub = watcher.add_listener(move |v| {
            s.borrow_mut().push(*v);
            if *v == 1 {
                w.set(2);
            }
        });

        watcher.set(1);
        assert_eq!(*seen.borrow(), vec![1, 2], "write-back delivered next round");
    }

    #[test]
    fn each_liveness_edge_resyncs_exactly_once() {
        let updates = Rc::new(Cell::new(0));
        let listens = Rc::new(Cell::new(0));
        let unlistens = Rc::new(Cell::new(0));
        let watcher = LazyWatcher::new(0, counting_hooks(&updates, &listens, &unlistens));

        let mut sub = watcher.add_listener(|_| {});
        let base = updates.get();
        let _ = watcher.get();
        assert_eq!(updates.get(), base, "live reads trust the resynced cache");
        sub.release();

        let _sub2 = watcher.add_listener(|_| {});
        assert_eq!(updates.get(), base + 1, "re-listen resyncs once");
        let _ = watcher.get();
        assert_eq!(updates.get(), base + 1);
    }

    #[test]
    fn dropping_subscription_releases_listener() {
        let watcher = LazyWatcher::new(0, WatcherHooks::inert());
        let fired = Rc::new(Cell::new(0));
        {
            let f = Rc::clone(&fired);
            let _sub = watcher.add_listener(move |_| f.set(f.get() + 1));
            watcher.set(1);
        }
        watcher.set(2);
        assert_eq!(fired.get(), 1, "no delivery after drop");
        assert_eq!(watcher.listener_count(), 0);
    }

    #[test]
    fn scheduled_flush_survives_watcher_drop() {
        let sched = Scheduler::new();
        {
            let watcher = LazyWatcher::with_mode(
                0,
                WatcherHooks::inert(),
                BroadcastMode::NextTick(sched.clone()),
            );
            let _sub = watcher.add_listener(|_| {});
            watcher.set(1);
        }
        // Watcher (and its subscription) dropped with a flush queued.
        assert_eq!(sched.tick(), 1, "task runs and upgrades to nothing");
    }
}
