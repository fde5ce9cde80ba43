#![forbid(unsafe_code)]

//! Lazily derived observables.
//!
//! A [`Computed`] applies a pure function over one or two upstream
//! observables. It inherits the watcher's laziness end to end: while nobody
//! listens, the upstreams are not subscribed to and the function only runs
//! when someone reads; while live, upstream changes trigger one recompute
//! and notify only when the derived output actually changed.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::observable::{BoxedListener, Observable, Subscription};
use crate::watcher::{LazyWatcher, WatcherHooks, WeakWatcher};

/// Derived observable over one or two sources.
pub struct Computed<T: Clone + 'static> {
    watcher: LazyWatcher<T>,
}

impl<T: Clone + 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            watcher: self.watcher.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
    /// Derive from one source.
    #[must_use]
    pub fn map<S, F>(source: &S, f: F) -> Self
    where
        S: Observable + Clone + 'static,
        F: Fn(&S::Output) -> T + 'static,
    {
        let src = source.clone();
        let initial = f(&src.get());

        let update = {
            let src = src.clone();
            move |value: &mut T| {
                let next = f(&src.get());
                if next == *value {
                    false
                } else {
                    *value = next;
                    true
                }
            }
        };

        let slot: Rc<RefCell<Option<WeakWatcher<T>>>> = Rc::new(RefCell::new(None));
        let releases: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));

        let listen = {
            let slot = Rc::clone(&slot);
            let releases = Rc::clone(&releases);
            move || {
                let Some(trigger) = slot.borrow().clone() else {
                    return;
                };
                releases
                    .borrow_mut()
                    .push(subscribe_trigger(&src, &trigger));
            }
        };
        let unlisten = {
            let releases = Rc::clone(&releases);
            move || releases.borrow_mut().clear()
        };

        let watcher = LazyWatcher::new(
            initial,
            WatcherHooks::new(update).on_listen(listen).on_unlisten(unlisten),
        );
        *slot.borrow_mut() = Some(watcher.downgrade());
        Self { watcher }
    }

    /// Derive from two sources.
    #[must_use]
    pub fn map2<S1, S2, F>(a: &S1, b: &S2, f: F) -> Self
    where
        S1: Observable + Clone + 'static,
        S2: Observable + Clone + 'static,
        F: Fn(&S1::Output, &S2::Output) -> T + 'static,
    {
        let src_a = a.clone();
        let src_b = b.clone();
        let initial = f(&src_a.get(), &src_b.get());

        let update = {
            let src_a = src_a.clone();
            let src_b = src_b.clone();
            move |value: &mut T| {
                let next = f(&src_a.get(), &src_b.get());
                if next == *value {
                    false
                } else {
                    *value = next;
                    true
                }
            }
        };

        let slot: Rc<RefCell<Option<WeakWatcher<T>>>> = Rc::new(RefCell::new(None));
        let releases: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));

        let listen = {
            let slot = Rc::clone(&slot);
            let releases = Rc::clone(&releases);
            move || {
                let Some(trigger) = slot.borrow().clone() else {
                    return;
                };
                let mut releases = releases.borrow_mut();
                releases.push(subscribe_trigger(&src_a, &trigger));
                releases.push(subscribe_trigger(&src_b, &trigger));
            }
        };
        let unlisten = {
            let releases = Rc::clone(&releases);
            move || releases.borrow_mut().clear()
        };

        let watcher = LazyWatcher::new(
            initial,
            WatcherHooks::new(update).on_listen(listen).on_unlisten(unlisten),
        );
        *slot.borrow_mut() = Some(watcher.downgrade());
        Self { watcher }
    }
}

/// Subscribe `source` so any upstream change requests a broadcast on the
/// derived watcher (which recomputes lazily in its flush).
fn subscribe_trigger<S, T>(source: &S, trigger: &WeakWatcher<T>) -> Subscription
where
    S: Observable,
    T: Clone + 'static,
{
    let trigger = trigger.clone();
    source.observe_boxed(Box::new(move |_| {
        if let Some(watcher) = trigger.upgrade() {
            watcher.broadcast();
        }
    }))
}

impl<T: Clone + 'static> Computed<T> {
    /// Current derived value. Recomputes on demand while idle.
    #[must_use]
    pub fn get(&self) -> T {
        self.watcher.get()
    }

    /// Register a listener.
    pub fn observe(&self, listener: impl FnMut(&T) + 'static) -> Subscription {
        self.watcher.add_listener(listener)
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

impl<T: Clone + 'static> Observable for Computed<T> {
    type Output = T;

    fn get(&self) -> T {
        Computed::get(self)
    }

    fn observe_boxed(&self, listener: BoxedListener<T>) -> Subscription {
        self.watcher.add_boxed_listener(listener)
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("value", &self.get())
            .field("live", &self.live())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
