#![forbid(unsafe_code)]

//! The observable seam: the [`Observable`] trait, the [`Subscription`]
//! capability, and the [`watch`] helper.
//!
//! Everything that can be read and listened to implements [`Observable`]:
//! `get()` returns the current resolved value, `observe()` registers a
//! listener and hands back a [`Subscription`]. The subscription is the only
//! way to release a listener; there is no unsubscribe-by-callback.
//!
//! # Invariants
//!
//! 1. `Subscription::release()` is idempotent and safe after the source is
//!    gone (the closure holds a weak back-edge, never a strong one).
//! 2. Dropping a `Subscription` releases it.
//! 3. `watch()` invokes the listener exactly once, synchronously, with the
//!    current value before subscribing it.

use std::fmt;
use std::rc::Rc;

/// Boxed listener callback, invoked with a borrow of the new value.
pub type BoxedListener<T> = Box<dyn FnMut(&T)>;

// ---------------------------------------------------------------------------
// Observable trait
// ---------------------------------------------------------------------------

/// A readable, listenable value.
///
/// Implementors: [`Value`](crate::Value), [`Dict`](crate::Dict),
/// [`List`](crate::List), [`Computed`](crate::Computed) and
/// [`DynObservable`].
pub trait Observable {
    /// The resolved value type handed to `get()` and listeners.
    type Output: Clone + 'static;

    /// Current resolved value.
    fn get(&self) -> Self::Output;

    /// Register a boxed listener. Object-safe form of [`observe`].
    ///
    /// [`observe`]: Observable::observe
    fn observe_boxed(&self, listener: BoxedListener<Self::Output>) -> Subscription;

    /// Register a listener, returning the release capability.
    ///
    /// The listener fires on every broadcast that carries a change, in
    /// subscription order relative to other listeners.
    fn observe(&self, listener: impl FnMut(&Self::Output) + 'static) -> Subscription
    where
        Self: Sized,
    {
        self.observe_boxed(Box::new(listener))
    }
}

/// Subscribe `listener` and synchronously invoke it once with the current
/// value first.
///
/// This is the rebind primitive: a consumer that may have missed updates
/// while detached catches up exactly once, then stays current.
pub fn watch<O: Observable>(
    source: &O,
    mut listener: impl FnMut(&O::Output) + 'static,
) -> Subscription {
    let current = source.get();
    listener(&current);
    source.observe_boxed(Box::new(listener))
}

// ---------------------------------------------------------------------------
// DynObservable — type-erased handle
// ---------------------------------------------------------------------------

/// Shared, type-erased observable handle.
///
/// Containers and the element engine accept any observable through this
/// type. Clones share the underlying source; [`DynObservable::ptr_eq`]
/// tests source identity.
pub struct DynObservable<T: Clone + 'static> {
    inner: Rc<dyn Observable<Output = T>>,
}

impl<T: Clone + 'static> DynObservable<T> {
    /// Erase a concrete observable.
    pub fn new(source: impl Observable<Output = T> + 'static) -> Self {
        Self {
            inner: Rc::new(source),
        }
    }

    /// Current resolved value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.get()
    }

    /// Register a listener.
    pub fn observe(&self, listener: impl FnMut(&T) + 'static) -> Subscription {
        self.inner.observe_boxed(Box::new(listener))
    }

    /// True when both handles point at the same underlying source.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + 'static> Clone for DynObservable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Observable for DynObservable<T> {
    type Output = T;

    fn get(&self) -> T {
        self.inner.get()
    }

    fn observe_boxed(&self, listener: BoxedListener<T>) -> Subscription {
        self.inner.observe_boxed(listener)
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for DynObservable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynObservable")
            .field("value", &self.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Subscription — release capability
// ---------------------------------------------------------------------------

/// Capability to release one registered listener.
///
/// Returned by every `observe()`. Release happens on [`release`] or on
/// drop, whichever comes first; both are safe to repeat and safe after the
/// source observable has been dropped.
///
/// [`release`]: Subscription::release
#[must_use = "dropping a Subscription immediately releases its listener"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Wrap an unregister closure.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription that releases nothing. Placeholder for sources that
    /// need no teardown (plain values held where an observable may sit).
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Release the listener now. Idempotent.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// True once released (or constructed as [`noop`]).
    ///
    /// [`noop`]: Subscription::noop
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.is_released())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn subscription_release_is_idempotent() {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let mut sub = Subscription::new(move || c.set(c.get() + 1));

        assert!(!sub.is_released());
        sub.release();
        sub.release();
        assert!(sub.is_released());
        assert_eq!(count.get(), 1, "release closure must run exactly once");
    }

    #[test]
    fn subscription_drop_releases() {
        let count = Rc::new(Cell::new(0));
        {
            let c = Rc::clone(&count);
            let _sub = Subscription::new(move || c.set(c.get() + 1));
        }
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn released_subscription_drop_does_nothing() {
        let count = Rc::new(Cell::new(0));
        {
            let c = Rc::clone(&count);
            let mut sub = Subscription::new(move || c.set(c.get() + 1));
            sub.release();
        }
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn noop_subscription_reports_released() {
        let sub = Subscription::noop();
        assert!(sub.is_released());
    }
}
