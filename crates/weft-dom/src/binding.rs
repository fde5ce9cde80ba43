#![forbid(unsafe_code)]

//! Binding lifecycle: one subscription tying a document attachment point
//! to one observable.
//!
//! A binding starts *provisional*: it subscribes immediately at
//! construction (after the caller's synchronous initial render) and queues
//! a release check on the next scheduler turn. If nothing confirms the
//! binding by then — the owning node was built but never inserted into the
//! tracked document — the provisional subscription is released, so an
//! unused subtree leaks no listeners.
//!
//! # Invariants
//!
//! 1. At most one live subscription per binding at all times.
//! 2. `bind()` on a binding that still holds its subscription adopts it
//!    silently; only a binding whose subscription was already released
//!    re-acquires one, which re-renders exactly once with the latest value.
//! 3. `unbind()` does not release immediately: release is queued for the
//!    next turn, so a remove-plus-reinsert within one mutation batch keeps
//!    the subscription (and renders nothing).
//! 4. Releasing is idempotent and safe after the source is gone.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use weft_reactive::{Scheduler, Subscription};

/// Produces a fresh subscription on the plain observe path (no immediate
/// render).
pub type SubscribeFn = Box<dyn Fn() -> Subscription>;

/// Produces a fresh subscription on the watch path: renders once with the
/// current value, then subscribes.
pub type RewatchFn = Box<dyn Fn() -> Subscription>;

struct BindingInner {
    scheduler: Scheduler,
    bound: Cell<bool>,
    release: RefCell<Option<Subscription>>,
    subscribe: SubscribeFn,
    rewatch: RewatchFn,
}

/// One observable-to-node subscription with attachment-tracked lifecycle.
/// Clones share the binding.
pub struct Binding {
    inner: Rc<BindingInner>,
}

impl Clone for Binding {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Binding {
    /// Subscribe provisionally and queue the release check for the next
    /// turn. The caller renders the initial content synchronously before
    /// constructing the binding, so `subscribe` must not render.
    pub fn new(scheduler: Scheduler, subscribe: SubscribeFn, rewatch: RewatchFn) -> Self {
        let inner = Rc::new(BindingInner {
            scheduler,
            bound: Cell::new(false),
            release: RefCell::new(None),
            subscribe,
            rewatch,
        });
        *inner.release.borrow_mut() = Some((inner.subscribe)());
        let binding = Self { inner };
        binding.release_next_tick();
        binding
    }

    /// Confirm attachment. No-op while bound; adopts a still-held
    /// subscription silently; re-acquires via the watch path (one render
    /// with the latest value) when the subscription was already released.
    pub fn bind(&self) {
        if self.inner.bound.get() {
            return;
        }
        if self.inner.release.borrow().is_none() {
            let subscription = (self.inner.rewatch)();
            *self.inner.release.borrow_mut() = Some(subscription);
        }
        self.inner.bound.set(true);
    }

    /// Record detachment and queue the release check. A `bind()` before
    /// the next turn keeps the subscription alive.
    pub fn unbind(&self) {
        if self.inner.bound.replace(false) {
            self.release_next_tick();
        }
    }

    /// Release the subscription immediately, bound or not. Used on
    /// disposal.
    pub fn release_now(&self) {
        self.inner.bound.set(false);
        if let Some(mut subscription) = self.inner.release.borrow_mut().take() {
            subscription.release();
        }
    }

    /// True while attachment is confirmed.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.inner.bound.get()
    }

    /// True while a subscription (provisional or confirmed) is held.
    #[must_use]
    pub fn has_subscription(&self) -> bool {
        self.inner.release.borrow().is_some()
    }

    fn release_next_tick(&self) {
        let weak: Weak<BindingInner> = Rc::downgrade(&self.inner);
        self.inner.scheduler.schedule(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.bound.get() {
                if let Some(mut subscription) = inner.release.borrow_mut().take() {
                    subscription.release();
                }
            }
        });
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("bound", &self.inner.bound.get())
            .field("subscribed", &self.has_subscription())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
