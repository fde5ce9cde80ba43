#![forbid(unsafe_code)]

//! Keyed observable container.
//!
//! A [`Dict`] maps keys to members that are either plain values or
//! observables (see [`Entry`]). Reads resolve the members into a plain
//! snapshot map; listeners receive that snapshot whenever a member's value
//! or the membership itself changes.
//!
//! # Architecture
//!
//! Member sources live beside the watcher's cached snapshot. The watcher's
//! `update` hook rebuilds the snapshot from the sources and diffs it
//! key-by-key with the per-value comparer, so every mutation path (puts,
//! removals, member writes, wholesale `set`) funnels through one
//! change-gated flush. While live, each observable member holds exactly one
//! upstream subscription whose callback requests a broadcast; while idle no
//! upstream subscriptions exist and reads resolve members on demand.
//!
//! # Invariants
//!
//! 1. While idle, no member subscription exists.
//! 2. While live, exactly one subscription per observable member.
//! 3. Replacing or removing a member releases its subscription before the
//!    membership change broadcasts.
//! 4. A delivered snapshot reflects the most recent preceding write.
//! 5. Under fixed indexing, plain puts coerce to settable cells and `set`
//!    writes through retained cells, preserving member identity.

use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};

use crate::entry::{Entry, Slot};
use crate::observable::{BoxedListener, Observable, Subscription};
use crate::value::{Value, ValueOptions};
use crate::watcher::{
    BroadcastMode, Comparer, LazyWatcher, WatcherHooks, WeakWatcher, default_comparer,
};

/// Construction options for [`Dict`].
pub struct DictOptions<V> {
    mode: BroadcastMode,
    comparer: Option<Comparer<V>>,
    fixed_indexing: bool,
    on_listen: Option<Box<dyn FnMut() -> Option<Subscription>>>,
    on_unlisten: Option<Box<dyn FnMut()>>,
}

impl<V> DictOptions<V> {
    /// Immediate broadcasts, `PartialEq` comparison, dynamic indexing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: BroadcastMode::Immediate,
            comparer: None,
            fixed_indexing: false,
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
    /// same). Applied key-by-key when diffing snapshots.
    #[must_use]
    pub fn comparer(mut self, comparer: impl Fn(&V, &V) -> bool + 'static) -> Self {
        self.comparer = Some(Rc::new(comparer));
        self
    }

    /// Fixed indexing: plain puts coerce into settable cells and `set`
    /// writes through retained members instead of replacing them.
    #[must_use]
    pub fn fixed_indexing(mut self, fixed: bool) -> Self {
        self.fixed_indexing = fixed;
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

impl<V> Default for DictOptions<V> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Dict
// ---------------------------------------------------------------------------

struct DictState<K, V: Clone + 'static> {
    sources: AHashMap<K, Slot<V>>,
    /// One upstream subscription per observable member, present only while
    /// the container is live.
    releases: AHashMap<K, Subscription>,
    /// Extra subscription handed back by the on_listen hook.
    hook_release: Option<Subscription>,
    fixed_indexing: bool,
}

/// Keyed container of values and observables. Clones share the container.
pub struct Dict<K, V: Clone + 'static> {
    watcher: LazyWatcher<AHashMap<K, V>>,
    state: Rc<RefCell<DictState<K, V>>>,
    comparer: Comparer<V>,
}

impl<K, V: Clone + 'static> Clone for Dict<K, V> {
    fn clone(&self) -> Self {
        Self {
            watcher: self.watcher.clone(),
            state: Rc::clone(&self.state),
            comparer: Rc::clone(&self.comparer),
        }
    }
}

impl<K, V> Dict<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + PartialEq + 'static,
{
    /// Empty container with immediate broadcasts and dynamic indexing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(DictOptions::new())
    }

    /// Empty container with explicit options.
    #[must_use]
    pub fn with_options(options: DictOptions<V>) -> Self {
        let DictOptions {
            mode,
            comparer,
            fixed_indexing,
            mut on_listen,
            mut on_unlisten,
        } = options;
        let comparer = comparer.unwrap_or_else(default_comparer);
        let state: Rc<RefCell<DictState<K, V>>> = Rc::new(RefCell::new(DictState {
            sources: AHashMap::new(),
            releases: AHashMap::new(),
            hook_release: None,
            fixed_indexing,
        }));
        let slot: Rc<RefCell<Option<WeakWatcher<AHashMap<K, V>>>>> = Rc::new(RefCell::new(None));

        let update = {
            let state = Rc::clone(&state);
            let comparer = Rc::clone(&comparer);
            move |snapshot: &mut AHashMap<K, V>| {
                let next: AHashMap<K, V> = state
                    .borrow()
                    .sources
                    .iter()
                    .map(|(key, member)| (key.clone(), member.resolve()))
                    .collect();
                if same_snapshot(&next, snapshot, &comparer) {
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
                let subscriptions: Vec<(K, Subscription)> = {
                    let state = state.borrow();
                    state
                        .sources
                        .iter()
                        .filter_map(|(key, member)| {
                            member.subscribe(&trigger).map(|sub| (key.clone(), sub))
                        })
                        .collect()
                };
                state.borrow_mut().releases.extend(subscriptions);
                // User hook runs with no state borrow held; it may mutate
                // the container re-entrantly.
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
                    (
                        std::mem::take(&mut state.releases),
                        state.hook_release.take(),
                    )
                };
                drop(releases);
                drop(hook_release);
                if let Some(hook) = on_unlisten.as_mut() {
                    hook();
                }
            }
        };

        let snapshot_comparer: Comparer<AHashMap<K, V>> = {
            let comparer = Rc::clone(&comparer);
            Rc::new(move |a, b| same_snapshot(a, b, &comparer))
        };
        let watcher = LazyWatcher::with_comparer(
            AHashMap::new(),
            WatcherHooks::new(update)
                .on_listen(listen)
                .on_unlisten(unlisten),
            mode,
            snapshot_comparer,
        );
        *slot.borrow_mut() = Some(watcher.downgrade());
        Self {
            watcher,
            state,
            comparer,
        }
    }

    /// Insert or replace the member under `key`, then broadcast once.
    ///
    /// Any prior subscription for the key is released first; the new member
    /// is subscribed iff the container is live.
    pub fn put(&self, key: K, entry: impl Into<Entry<V>>) {
        self.insert_slot(key, entry.into());
        self.watcher.broadcast();
    }

    /// Remove the member under `key`. Removing an absent key is a no-op
    /// with no broadcast.
    pub fn remove(&self, key: &K) -> bool {
        let released = {
            let mut state = self.state.borrow_mut();
            if state.sources.remove(key).is_none() {
                return false;
            }
            state.releases.remove(key)
        };
        drop(released);
        self.watcher.broadcast();
        true
    }

    /// Release every member and empty the container.
    pub fn clear(&self) {
        let (sources, releases) = {
            let mut state = self.state.borrow_mut();
            (
                std::mem::take(&mut state.sources),
                std::mem::take(&mut state.releases),
            )
        };
        drop(sources);
        drop(releases);
        self.watcher.broadcast();
    }

    /// Replace the whole membership with at most one broadcast.
    ///
    /// Dynamic indexing releases every existing member and inserts the new
    /// ones. Fixed indexing writes plain values through retained settable
    /// cells (member identity survives), inserts new keys, and prunes keys
    /// absent from `entries`; a retained key occupied by a non-settable
    /// observable is replaced wholesale.
    pub fn set<E: Into<Entry<V>>>(&self, entries: impl IntoIterator<Item = (K, E)>) {
        let entries: Vec<(K, Entry<V>)> = entries
            .into_iter()
            .map(|(key, entry)| (key, entry.into()))
            .collect();
        let fixed = self.state.borrow().fixed_indexing;
        let this = self.clone();
        self.watcher.transaction(move || {
            if fixed {
                this.set_fixed(entries);
            } else {
                this.set_dynamic(entries);
            }
        });
    }

    /// Batch several mutations into at most one broadcast.
    pub fn transaction(&self, f: impl FnOnce()) {
        self.watcher.transaction(f);
    }

    /// Resolved snapshot of the whole container.
    #[must_use]
    pub fn get(&self) -> AHashMap<K, V> {
        self.watcher.get()
    }

    /// Resolved value of one member.
    #[must_use]
    pub fn value_of(&self, key: &K) -> Option<V> {
        self.state.borrow().sources.get(key).map(Slot::resolve)
    }

    /// The member under `key`, handed back as it would be re-inserted.
    /// Observable members come back as shared handles.
    #[must_use]
    pub fn entry_of(&self, key: &K) -> Option<Entry<V>> {
        self.state.borrow().sources.get(key).map(Slot::to_entry)
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.state.borrow().sources.contains_key(key)
    }

    /// Current keys, in no particular order.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.state.borrow().sources.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().sources.is_empty()
    }

    /// Register a listener; it receives the resolved snapshot.
    pub fn observe(&self, listener: impl FnMut(&AHashMap<K, V>) + 'static) -> Subscription {
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

    // ---
    // Internals
    // ---

    fn coerce(&self, entry: Entry<V>) -> Slot<V> {
        let fixed = self.state.borrow().fixed_indexing;
        match entry {
            Entry::Plain(value) if fixed => {
                let comparer = Rc::clone(&self.comparer);
                Slot::Cell(Value::with_options(
                    value,
                    ValueOptions::new().comparer(move |a: &V, b: &V| comparer(a, b)),
                ))
            }
            other => Slot::from_entry(other),
        }
    }

    fn insert_slot(&self, key: K, entry: Entry<V>) {
        let slot = self.coerce(entry);
        let prior = self.state.borrow_mut().releases.remove(&key);
        drop(prior);
        let subscription = if self.watcher.live() {
            slot.subscribe(&self.watcher.downgrade())
        } else {
            None
        };
        let mut state = self.state.borrow_mut();
        state.sources.insert(key.clone(), slot);
        if let Some(subscription) = subscription {
            state.releases.insert(key, subscription);
        }
    }

    fn set_dynamic(&self, entries: Vec<(K, Entry<V>)>) {
        let (old_sources, old_releases) = {
            let mut state = self.state.borrow_mut();
            (
                std::mem::take(&mut state.sources),
                std::mem::take(&mut state.releases),
            )
        };
        drop(old_sources);
        drop(old_releases);
        for (key, entry) in entries {
            self.insert_slot(key, entry);
        }
    }

    fn set_fixed(&self, entries: Vec<(K, Entry<V>)>) {
        let mut seen: AHashSet<K> = AHashSet::with_capacity(entries.len());
        for (key, entry) in entries {
            seen.insert(key.clone());
            match entry {
                Entry::Plain(value) => {
                    let retained = {
                        let state = self.state.borrow();
                        state.sources.get(&key).and_then(Slot::cell)
                    };
                    match retained {
                        Some(cell) => cell.set(value),
                        None => self.insert_slot(key, Entry::Plain(value)),
                    }
                }
                other => self.insert_slot(key, other),
            }
        }
        let pruned: Vec<K> = {
            let state = self.state.borrow();
            state
                .sources
                .keys()
                .filter(|key| !seen.contains(*key))
                .cloned()
                .collect()
        };
        for key in &pruned {
            self.remove(key);
        }
    }
}

impl<K, V> Default for Dict<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + PartialEq + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Observable for Dict<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + PartialEq + 'static,
{
    type Output = AHashMap<K, V>;

    fn get(&self) -> AHashMap<K, V> {
        Dict::get(self)
    }

    fn observe_boxed(&self, listener: BoxedListener<AHashMap<K, V>>) -> Subscription {
        self.watcher.add_boxed_listener(listener)
    }
}

impl<K, V> fmt::Debug for Dict<K, V>
where
    K: Clone + 'static,
    V: Clone + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Dict")
            .field("len", &state.sources.len())
            .field("fixed_indexing", &state.fixed_indexing)
            .field("live", &self.watcher.live())
            .finish()
    }
}

/// Key-by-key snapshot equality under the per-value comparer.
fn same_snapshot<K, V>(a: &AHashMap<K, V>, b: &AHashMap<K, V>, comparer: &Comparer<V>) -> bool
where
    K: Eq + Hash,
{
    a.len() == b.len()
        && a.iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| comparer(value, other)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
