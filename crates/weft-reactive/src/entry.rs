#![forbid(unsafe_code)]

//! Container member inputs.
//!
//! [`Entry`] is what [`Dict`](crate::Dict) and [`List`](crate::List) accept
//! wherever a member may be either a plain value or an observable. Plain
//! members resolve to themselves and are never subscribed; observable
//! members are read through `get()` and hold one upstream subscription
//! while the owning container is live.

use std::fmt;

use crate::observable::{DynObservable, Observable, Subscription};
use crate::value::Value;
use crate::watcher::WeakWatcher;

/// A container member: plain value, shared observable handle, or settable
/// cell.
#[derive(Clone, Debug)]
pub enum Entry<V: Clone + 'static> {
    /// Resolves to itself.
    Plain(V),
    /// Externally owned observable, read through and subscribed while live.
    Observable(DynObservable<V>),
    /// Settable cell. Fixed-indexing containers write through retained
    /// cells on `set`, preserving member identity.
    Cell(Value<V>),
}

impl<V: Clone + 'static> Entry<V> {
    /// Erase any observable into a member entry.
    pub fn observable(source: impl Observable<Output = V> + 'static) -> Self {
        Entry::Observable(DynObservable::new(source))
    }
}

impl<V: Clone + 'static> From<V> for Entry<V> {
    fn from(value: V) -> Self {
        Entry::Plain(value)
    }
}

impl<V: Clone + 'static> From<Value<V>> for Entry<V> {
    fn from(cell: Value<V>) -> Self {
        Entry::Cell(cell)
    }
}

impl<V: Clone + 'static> From<DynObservable<V>> for Entry<V> {
    fn from(obs: DynObservable<V>) -> Self {
        Entry::Observable(obs)
    }
}

// ---------------------------------------------------------------------------
// Slot — stored member form
// ---------------------------------------------------------------------------

/// Stored form of one container member.
pub(crate) enum Slot<V: Clone + 'static> {
    Plain(V),
    Observable(DynObservable<V>),
    Cell(Value<V>),
}

impl<V: Clone + 'static> Slot<V> {
    pub(crate) fn from_entry(entry: Entry<V>) -> Self {
        match entry {
            Entry::Plain(value) => Slot::Plain(value),
            Entry::Observable(obs) => Slot::Observable(obs),
            Entry::Cell(cell) => Slot::Cell(cell),
        }
    }

    /// Current resolved value of this member.
    pub(crate) fn resolve(&self) -> V {
        match self {
            Slot::Plain(value) => value.clone(),
            Slot::Observable(obs) => obs.get(),
            Slot::Cell(cell) => cell.get(),
        }
    }

    /// Subscribe an observable member so its changes request a broadcast on
    /// the owning container's watcher. Plain members need none.
    pub(crate) fn subscribe<S: Clone + 'static>(
        &self,
        trigger: &WeakWatcher<S>,
    ) -> Option<Subscription> {
        let trigger = trigger.clone();
        let listener = move |_: &V| {
            if let Some(watcher) = trigger.upgrade() {
                watcher.broadcast();
            }
        };
        match self {
            Slot::Plain(_) => None,
            Slot::Observable(obs) => Some(obs.observe(listener)),
            Slot::Cell(cell) => Some(cell.observe(listener)),
        }
    }

    /// Hand the member back out as it would be re-inserted. Handles
    /// clone-share, so callers can observe or write through them.
    pub(crate) fn to_entry(&self) -> Entry<V> {
        match self {
            Slot::Plain(value) => Entry::Plain(value.clone()),
            Slot::Observable(obs) => Entry::Observable(obs.clone()),
            Slot::Cell(cell) => Entry::Cell(cell.clone()),
        }
    }

    /// The settable cell behind this member, when there is one.
    pub(crate) fn cell(&self) -> Option<Value<V>> {
        match self {
            Slot::Cell(cell) => Some(cell.clone()),
            _ => None,
        }
    }
}

impl<V: Clone + fmt::Debug + 'static> fmt::Debug for Slot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
            Slot::Observable(obs) => f.debug_tuple("Observable").field(obs).finish(),
            Slot::Cell(cell) => f.debug_tuple("Cell").field(cell).finish(),
        }
    }
}
