#![forbid(unsafe_code)]

//! Ordered observable container.
//!
//! A [`List`] holds members positionally, each a plain value or an
//! observable (see [`Entry`]). It shares the [`Dict`](crate::Dict)
//! foundation: the watcher's `update` hook rebuilds the resolved `Vec<V>`
//! snapshot from the member sources and diffs it element-wise with the
//! per-value comparer, and observable members hold exactly one upstream
//! subscription while the container is live, none while idle.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::entry::{Entry, Slot};
use crate::observable::{BoxedListener, Observable, Subscription};
use crate::watcher::{
    BroadcastMode, Comparer, LazyWatcher, WatcherHooks, WeakWatcher, default_comparer,
};

/// Construction options for [`List`].
pub struct ListOptions<V> {
    mode: BroadcastMode,
    comparer: Option<Comparer<V>>,
    on_listen: Option<Box<dyn FnMut() -> Option<Subscription>>>,
    on_unlisten: Option<Box<dyn FnMut()>>,
}

impl<V> ListOptions<V> {
    /// Immediate broadcasts, `PartialEq` comparison.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: BroadcastMode::Immediate,
            comparer: None,
            on_listen: None,
            on_unlisten: None,
        }
    }

    /// Broadcast mode for the container.
    #[must_use]
    pub fn mode(mut self, mode: BroadcastMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the per-value comparer (returns true when values are the
    /// same). Applied element-wise when diffing snapshots.
    #[must_use]
    pub fn comparer(mut self, comparer: impl Fn(&V, &V) -> bool + 'static) -> Self {
        self.comparer = Some(Rc::new(comparer));
        self
    }

    /// Run `hook` on every 0→1 listener edge. A returned subscription is
    /// held while the container is live and released on the 1→0 edge.
    #[must_use]
    pub fn on_listen(mut self, hook: impl FnMut() -> Option<Subscription> + 'static) -> Self {
        self.on_listen = Some(Box::new(hook));
        self
    }

    /// Run `hook` on every 1→0 listener edge.
    #[must_use]
    pub fn on_unlisten(mut self, hook: impl FnMut() + 'static) -> Self {
        self.on_unlisten = Some(Box::new(hook));
        self
    }
}

impl<V> Default for ListOptions<V> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

struct Member<V: Clone + 'static> {
    slot: Slot<V>,
    /// Upstream subscription, present only while the container is live.
    release: Option<Subscription>,
}

struct ListState<V: Clone + 'static> {
    members: Vec<Member<V>>,
    hook_release: Option<Subscription>,
}

/// Ordered container of values and observables. Clones share the container.
pub struct List<V: Clone + 'static> {
    watcher: LazyWatcher<Vec<V>>,
    state: Rc<RefCell<ListState<V>>>,
}

impl<V: Clone + 'static> Clone for List<V> {
    fn clone(&self) -> Self {
        Self {
            watcher: self.watcher.clone(),
            state: Rc::clone(&self.state),
        }
    }
}

impl<V: Clone + PartialEq + 'static> List<V> {
    /// Empty list with immediate broadcasts.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(ListOptions::new())
    }

    /// Empty list with explicit options.
    #[must_use]
    pub fn with_options(options: ListOptions<V>) -> Self {
        let ListOptions {
            mode,
            comparer,
            mut on_listen,
            mut on_unlisten,
        } = options;
        let comparer = comparer.unwrap_or_else(default_comparer);
        let state: Rc<RefCell<ListState<V>>> = Rc::new(RefCell::new(ListState {
            members: Vec::new(),
            hook_release: None,
        }));
        let slot: Rc<RefCell<Option<WeakWatcher<Vec<V>>>>> = Rc::new(RefCell::new(None));

        let update = {
            let state = Rc::clone(&state);
            let comparer = Rc::clone(&comparer);
            move |snapshot: &mut Vec<V>| {
                let next: Vec<V> = state
                    .borrow()
                    .members
                    .iter()
                    .map(|member| member.slot.resolve())
                    .collect();
                if same_sequence(&next, snapshot, &comparer) {
                    false
                } else {
                    *snapshot = next;
                    true
                }
            }
        };

        let listen = {
            let state = Rc::clone(&state);
            let slot = Rc::clone(&slot);
            move || {
                let Some(trigger) = slot.borrow().clone() else {
                    return;
                };
                {
                    let mut state = state.borrow_mut();
                    for member in &mut state.members {
                        member.release = member.slot.subscribe(&trigger);
                    }
                }
                let hook_release = on_listen.as_mut().and_then(|hook| hook());
                if hook_release.is_some() {
                    state.borrow_mut().hook_release = hook_release;
                }
            }
        };

        let unlisten = {
            let state = Rc::clone(&state);
            move || {
                let (releases, hook_release) = {
                    let mut state = state.borrow_mut();
                    let releases: Vec<Subscription> = state
                        .members
                        .iter_mut()
                        .filter_map(|member| member.release.take())
                        .collect();
                    (releases, state.hook_release.take())
                };
                drop(releases);
                drop(hook_release);
                if let Some(hook) = on_unlisten.as_mut() {
                    hook();
                }
            }
        };

        let snapshot_comparer: Comparer<Vec<V>> = {
            let comparer = Rc::clone(&comparer);
            Rc::new(move |a, b| same_sequence(a, b, &comparer))
        };
        let watcher = LazyWatcher::with_comparer(
            Vec::new(),
            WatcherHooks::new(update)
                .on_listen(listen)
                .on_unlisten(unlisten),
            mode,
            snapshot_comparer,
        );
        *slot.borrow_mut() = Some(watcher.downgrade());
        Self { watcher, state }
    }

    /// Append a member, then broadcast once.
    pub fn push(&self, entry: impl Into<Entry<V>>) {
        let index = self.state.borrow().members.len();
        self.insert_member(index, entry.into());
        self.watcher.broadcast();
    }

    /// Insert a member at `index` (clamped to the current length), then
    /// broadcast once.
    pub fn insert(&self, index: usize, entry: impl Into<Entry<V>>) {
        self.insert_member(index, entry.into());
        self.watcher.broadcast();
    }

    /// Remove the member at `index`, releasing its subscription. Removing
    /// out of range is a no-op with no broadcast.
    pub fn remove(&self, index: usize) -> bool {
        let removed = {
            let mut state = self.state.borrow_mut();
            if index >= state.members.len() {
                return false;
            }
            state.members.remove(index)
        };
        drop(removed);
        self.watcher.broadcast();
        true
    }

    /// Release every member and empty the list.
    pub fn clear(&self) {
        let old = std::mem::take(&mut self.state.borrow_mut().members);
        drop(old);
        self.watcher.broadcast();
    }

    /// Replace all members with at most one broadcast. Every existing
    /// member is released; the new ones are subscribed iff live.
    pub fn set<E: Into<Entry<V>>>(&self, entries: impl IntoIterator<Item = E>) {
        let entries: Vec<Entry<V>> = entries.into_iter().map(Into::into).collect();
        let this = self.clone();
        self.watcher.transaction(move || {
            let old = std::mem::take(&mut this.state.borrow_mut().members);
            drop(old);
            for entry in entries {
                let index = this.state.borrow().members.len();
                this.insert_member(index, entry);
            }
        });
    }

    /// Batch several mutations into at most one broadcast.
    pub fn transaction(&self, f: impl FnOnce()) {
        self.watcher.transaction(f);
    }

    /// Resolved snapshot of the whole list.
    #[must_use]
    pub fn get(&self) -> Vec<V> {
        self.watcher.get()
    }

    /// Resolved value of the member at `index`.
    #[must_use]
    pub fn value_at(&self, index: usize) -> Option<V> {
        self.state
            .borrow()
            .members
            .get(index)
            .map(|member| member.slot.resolve())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().members.is_empty()
    }

    /// Register a listener; it receives the resolved snapshot.
    pub fn observe(&self, listener: impl FnMut(&Vec<V>) + 'static) -> Subscription {
        self.watcher.add_listener(listener)
    }

    /// True while at least one listener is registered.
    #[must_use]
    pub fn live(&self) -> bool {
        self.watcher.live()
    }

    /// Number of registered listeners on the container itself.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.watcher.listener_count()
    }

    fn insert_member(&self, index: usize, entry: Entry<V>) {
        let slot = Slot::from_entry(entry);
        let release = if self.watcher.live() {
            slot.subscribe(&self.watcher.downgrade())
        } else {
            None
        };
        let mut state = self.state.borrow_mut();
        let index = index.min(state.members.len());
        state.members.insert(index, Member { slot, release });
    }
}

impl<V: Clone + PartialEq + 'static> Default for List<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + PartialEq + 'static> Observable for List<V> {
    type Output = Vec<V>;

    fn get(&self) -> Vec<V> {
        List::get(self)
    }

    fn observe_boxed(&self, listener: BoxedListener<Vec<V>>) -> Subscription {
        self.watcher.add_boxed_listener(listener)
    }
}

impl<V: Clone + 'static> fmt::Debug for List<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("len", &self.state.borrow().members.len())
            .field("live", &self.watcher.live())
            .finish()
    }
}

/// Element-wise sequence equality under the per-value comparer.
fn same_sequence<V>(a: &[V], b: &[V], comparer: &Comparer<V>) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| comparer(x, y))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
