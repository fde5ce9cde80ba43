#![forbid(unsafe_code)]

//! Element construction and the binding engine.
//!
//! An [`Engine`] owns everything the binding lifecycle needs: the tracked
//! [`Document`], the [`Scheduler`], the per-node binding side table, the
//! bind-confirmation queue, and the document-wide mutation observer
//! registered at construction. Elements are built through
//! [`Engine::element`]; observables appearing as children or dynamic
//! properties become [`Binding`]s whose subscriptions live exactly while
//! their nodes are attached (and, under viewport gating, visible).
//!
//! # Architecture
//!
//! Three independent triggers drive the bind/unbind walks:
//!
//! - the **bind queue**: every built element is queued; one flush per turn
//!   confirms nodes that got attached and leaves the rest to their
//!   bindings' release-next-tick checks;
//! - the **mutation sweep**: each delivered batch walks added subtrees to
//!   rebind them (skipping nodes whose tracked parent already carries a
//!   bound node) and removed subtrees to unbind them;
//! - **intersection callbacks**: descendants of a viewport-flagged element
//!   defer child-binding activation to visibility; entering at a ratio of
//!   at least 0.1 binds, leaving unbinds. Hook (property) bindings are
//!   never viewport-gated.
//!
//! Reconciliation ([`reconcile`]) is a greedy single pass over the
//! previous node list, not a minimal edit-distance diff: it is exact for
//! localized single insertions and deletions and may remove and reinsert
//! more nodes than strictly necessary for arbitrary reorderings.
//!
//! # Invariants
//!
//! 1. One side-table entry per built element, created at construction and
//!    removed only by [`Engine::dispose`].
//! 2. At most one bind-queue flush is scheduled at a time.
//! 3. A viewport-flagged element creates at most one intersection
//!    observer, shared by all descendants, created the first time a
//!    descendant rebind needs it.
//! 4. After `reconcile(old, new)`, the parent's children contain `new` in
//!    order; every inserted node's subtree is rebound, every stale node's
//!    subtree unbound.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use weft_reactive::{DynObservable, Observable, Scheduler, watch};

use crate::binding::Binding;
use crate::content::Content;
use crate::document::{
    Document, IntersectionEntry, IntersectionOptions, MutationObserver, MutationRecord,
};
use crate::node::NodeId;
use crate::tag::parse_tag;

/// Intersection ratio at or above which an entering node counts as
/// visible.
const ENTER_RATIO: f64 = 0.1;

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// What one [`reconcile`] pass did: nodes freshly placed into the tree
/// (their subtrees need rebinding) and stale nodes taken out (their
/// subtrees need unbinding).
#[derive(Debug, Default)]
pub struct ReplaceOutcome {
    pub inserted: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// Replace the previously rendered node list `old` with `new` in place,
/// mutating the document as little as the greedy pass allows.
///
/// Walks `new` position by position from `old`'s start index under
/// `old`'s parent: a node already in place is skipped; the expected node
/// sitting one position ahead removes the obsolete occupant (single
/// deletion); otherwise the new node is inserted before the occupant, or
/// appended past the end. Afterwards every old node absent from `new` is
/// detached. When `old`'s parent is already gone, the document is left
/// untouched and only the stale list is reported.
pub fn reconcile(document: &Document, old: &[NodeId], new: &[NodeId]) -> ReplaceOutcome {
    let mut outcome = ReplaceOutcome::default();
    let Some(&anchor) = old.last() else {
        return outcome;
    };
    let Some(parent) = document.parent(anchor) else {
        // Parent already gone: nothing to mutate, but stale nodes still
        // need their subtrees unbound.
        outcome.removed = old
            .iter()
            .copied()
            .filter(|node| !new.contains(node))
            .collect();
        return outcome;
    };

    #[cfg(feature = "tracing")]
    let _span =
        tracing::debug_span!("reconcile", old = old.len(), new = new.len()).entered();

    let start = document
        .children(parent)
        .iter()
        .position(|&node| node == old[0])
        .unwrap_or_else(|| document.child_count(parent));

    for (i, &expected) in new.iter().enumerate() {
        // The child list shifts as we mutate; re-read it every position.
        let children = document.children(parent);
        let current = children.get(start + i).copied();
        if current == Some(expected) {
            continue;
        }
        if children.get(start + i + 1).copied() == Some(expected) {
            // One obsolete node sits in front of the match: drop it and
            // the rest of the list falls into place.
            let _ = document.remove_child(parent, children[start + i]);
            continue;
        }
        match current {
            Some(occupant) => {
                let _ = document.insert_before(parent, expected, occupant);
            }
            None => {
                let _ = document.append_child(parent, expected);
            }
        }
        outcome.inserted.push(expected);
    }

    for &node in old {
        if !new.contains(&node) {
            document.detach(node);
            outcome.removed.push(node);
        }
    }
    outcome
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

struct NodeState {
    /// Binding id to the node list it currently has rendered.
    targets: AHashMap<u64, Vec<NodeId>>,
    bindings: Vec<Binding>,
    hook_bindings: Vec<Binding>,
    observing: bool,
    /// Present iff the element opted into viewport-gated binding.
    viewport_margin: Option<String>,
    /// Created lazily on the first descendant rebind that needs it.
    intersection: Option<crate::document::IntersectionObserver>,
}

struct EngineState {
    nodes: AHashMap<NodeId, NodeState>,
    next_binding: u64,
    bind_queue: VecDeque<NodeId>,
    bind_flush_queued: bool,
}

struct EngineShared {
    scheduler: Scheduler,
    document: Document,
    state: RefCell<EngineState>,
    observer: RefCell<Option<MutationObserver>>,
}

/// The binding engine. Clones share the engine; dropping the last handle
/// releases the document-wide mutation observer.
pub struct Engine {
    shared: Rc<EngineShared>,
}

impl Clone for Engine {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl Engine {
    /// Engine over a fresh scheduler and document.
    #[must_use]
    pub fn new() -> Self {
        let scheduler = Scheduler::new();
        let document = Document::new(scheduler.clone());
        Self::with_parts(scheduler, document)
    }

    /// Engine over injected parts. The document must deliver its batches
    /// on the given scheduler.
    #[must_use]
    pub fn with_parts(scheduler: Scheduler, document: Document) -> Self {
        let shared = Rc::new(EngineShared {
            scheduler,
            document: document.clone(),
            state: RefCell::new(EngineState {
                nodes: AHashMap::new(),
                next_binding: 0,
                bind_queue: VecDeque::new(),
                bind_flush_queued: false,
            }),
            observer: RefCell::new(None),
        });
        let weak = Rc::downgrade(&shared);
        let observer = document.observe_mutations(move |records| {
            if let Some(shared) = weak.upgrade() {
                on_mutations(&shared, records);
            }
        });
        *shared.observer.borrow_mut() = Some(observer);
        Self { shared }
    }

    /// The tracked document.
    #[must_use]
    pub fn document(&self) -> Document {
        self.shared.document.clone()
    }

    /// The scheduler all deferred engine work runs on.
    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        self.shared.scheduler.clone()
    }

    /// Drain the scheduler until nothing is pending. Test-side settling
    /// primitive.
    pub fn run_until_idle(&self) -> usize {
        self.shared.scheduler.run_until_idle()
    }

    /// Start building an element. The tag accepts `name#id.class`
    /// shorthand.
    #[must_use]
    pub fn element(&self, tag: &str) -> ElementBuilder {
        ElementBuilder {
            engine: Rc::clone(&self.shared),
            tag: tag.to_owned(),
            namespace: None,
            props: Vec::new(),
            dynamic_props: Vec::new(),
            children: Vec::new(),
            viewport_margin: None,
        }
    }

    /// Tear the subtree down for good: release every binding immediately,
    /// stop intersection observation, drop side-table entries, and free
    /// the subtree's arena nodes.
    pub fn dispose(&self, node: NodeId) {
        let nodes = subtree_nodes(&self.shared.document, node);
        for &current in &nodes {
            let observing = self
                .shared
                .state
                .borrow()
                .nodes
                .get(&current)
                .is_some_and(|entry| entry.observing);
            if observing {
                if let Some(ancestor) = governing_ancestor(&self.shared, current, false) {
                    let state = self.shared.state.borrow();
                    if let Some(observer) = state
                        .nodes
                        .get(&ancestor)
                        .and_then(|entry| entry.intersection.as_ref())
                    {
                        observer.unobserve(current);
                    }
                }
            }
            let removed = self.shared.state.borrow_mut().nodes.remove(&current);
            if let Some(entry) = removed {
                for binding in entry.bindings.iter().chain(entry.hook_bindings.iter()) {
                    binding.release_now();
                }
                // entry.intersection drops here and unregisters itself.
            }
        }
        self.shared.document.free_subtree(node);
    }

    /// True while the engine holds a side-table entry for `node`.
    #[must_use]
    pub fn is_tracked(&self, node: NodeId) -> bool {
        self.shared.state.borrow().nodes.contains_key(&node)
    }

    /// True while `node` carries any confirmed binding or is under
    /// intersection observation.
    #[must_use]
    pub fn is_bound(&self, node: NodeId) -> bool {
        is_bound_entry(&self.shared.state.borrow(), node)
    }

    /// Number of side-table entries. Test surface.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.shared.state.borrow().nodes.len()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("Engine")
            .field("tracked", &state.nodes.len())
            .field("bind_queue", &state.bind_queue.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ElementBuilder
// ---------------------------------------------------------------------------

/// Builder for one element node. Finish with [`ElementBuilder::build`].
#[must_use = "an element is only created by build()"]
pub struct ElementBuilder {
    engine: Rc<EngineShared>,
    tag: String,
    namespace: Option<String>,
    props: Vec<(String, String)>,
    dynamic_props: Vec<(String, DynObservable<String>)>,
    children: Vec<Content>,
    viewport_margin: Option<String>,
}

impl ElementBuilder {
    /// Namespaced element (for SVG and friends).
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Static property. Explicit properties win over tag shorthand.
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.push((key.into(), value.into()));
        self
    }

    /// Several static properties at once.
    pub fn props<K, V>(mut self, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.props
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Dynamic property: applied now and re-applied on every change while
    /// the node is attached. Never viewport-gated.
    pub fn prop_dynamic(
        mut self,
        key: impl Into<String>,
        source: impl Observable<Output = String> + 'static,
    ) -> Self {
        self.dynamic_props
            .push((key.into(), DynObservable::new(source)));
        self
    }

    /// One child. Observable content re-renders in place on change.
    pub fn child(mut self, content: impl Into<Content>) -> Self {
        self.children.push(content.into());
        self
    }

    /// Several children at once.
    pub fn children<C: Into<Content>>(mut self, contents: impl IntoIterator<Item = C>) -> Self {
        self.children.extend(contents.into_iter().map(Into::into));
        self
    }

    /// Opt this subtree into viewport-gated binding: descendants' child
    /// bindings activate only while intersecting this element.
    pub fn viewport_binding(mut self, margin: impl Into<String>) -> Self {
        self.viewport_margin = Some(margin.into());
        self
    }

    /// Create the node, register its side-table entry, attach provisional
    /// bindings, and queue it for bind confirmation.
    pub fn build(self) -> NodeId {
        let shared = self.engine;
        let document = shared.document.clone();

        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("element_build", tag = %self.tag).entered();

        let parsed = parse_tag(&self.tag);
        let node = match &self.namespace {
            Some(ns) => document.create_element_ns(ns, &parsed.name),
            None => document.create_element(&parsed.name),
        };

        // Props on a freshly created element cannot fail.
        let set = |key: &str, value: &str| {
            let _ = document.set_prop(node, key, value);
        };
        if let Some(id) = &parsed.id {
            set("id", id);
        }
        if !parsed.classes.is_empty() {
            set("class", &parsed.classes.join(" "));
        }
        for (key, value) in &self.props {
            set(key, value);
        }

        shared.state.borrow_mut().nodes.insert(
            node,
            NodeState {
                targets: AHashMap::new(),
                bindings: Vec::new(),
                hook_bindings: Vec::new(),
                observing: false,
                viewport_margin: self.viewport_margin,
                intersection: None,
            },
        );

        for (key, source) in self.dynamic_props {
            add_hook_binding(&shared, node, key, source);
        }
        for content in self.children {
            append_content(&shared, node, content);
        }

        queue_bind_confirmation(&shared, node);
        node
    }
}

// ---------------------------------------------------------------------------
// Construction internals
// ---------------------------------------------------------------------------

fn add_hook_binding(
    shared: &Rc<EngineShared>,
    node: NodeId,
    key: String,
    source: DynObservable<String>,
) {
    let apply: Rc<dyn Fn(&String)> = {
        let document = shared.document.clone();
        Rc::new(move |value: &String| {
            let _ = document.set_prop(node, &key, value);
        })
    };
    apply(&source.get());

    let subscribe = {
        let source = source.clone();
        let apply = Rc::clone(&apply);
        Box::new(move || {
            let apply = Rc::clone(&apply);
            source.observe(move |value| apply(value))
        })
    };
    let rewatch = {
        let apply = Rc::clone(&apply);
        Box::new(move || {
            let apply = Rc::clone(&apply);
            watch(&source, move |value| apply(value))
        })
    };
    let binding = Binding::new(shared.scheduler.clone(), subscribe, rewatch);
    if let Some(entry) = shared.state.borrow_mut().nodes.get_mut(&node) {
        entry.hook_bindings.push(binding);
    }
}

fn append_content(shared: &Rc<EngineShared>, parent: NodeId, content: Content) {
    match content {
        Content::Many(items) => {
            // Flatten: every entry is appended (and, if dynamic, bound)
            // independently.
            for item in items {
                append_content(shared, parent, item);
            }
        }
        Content::Dynamic(source) => add_child_binding(shared, parent, source),
        static_content => {
            for node in static_content.render(&shared.document) {
                let _ = shared.document.append_child(parent, node);
            }
        }
    }
}

fn add_child_binding(shared: &Rc<EngineShared>, owner: NodeId, source: DynObservable<Content>) {
    let document = shared.document.clone();
    let id = {
        let mut state = shared.state.borrow_mut();
        let id = state.next_binding;
        state.next_binding += 1;
        id
    };

    // Initial render is synchronous so content is visible before any
    // scheduler turn confirms attachment.
    let initial = source.get().render(&document);
    for &child in &initial {
        let _ = document.append_child(owner, child);
    }
    if let Some(entry) = shared.state.borrow_mut().nodes.get_mut(&owner) {
        entry.targets.insert(id, initial);
    }

    let update: Rc<dyn Fn(&Content)> = {
        let weak = Rc::downgrade(shared);
        Rc::new(move |value: &Content| {
            if let Some(shared) = weak.upgrade() {
                update_target(&shared, owner, id, value);
            }
        })
    };
    let subscribe = {
        let source = source.clone();
        let update = Rc::clone(&update);
        Box::new(move || {
            let update = Rc::clone(&update);
            source.observe(move |value| update(value))
        })
    };
    let rewatch = {
        let update = Rc::clone(&update);
        Box::new(move || {
            let update = Rc::clone(&update);
            watch(&source, move |value| update(value))
        })
    };
    let binding = Binding::new(shared.scheduler.clone(), subscribe, rewatch);
    if let Some(entry) = shared.state.borrow_mut().nodes.get_mut(&owner) {
        entry.bindings.push(binding);
    }
}

/// Re-render one binding's target list and reconcile it into the tree.
fn update_target(shared: &Rc<EngineShared>, owner: NodeId, id: u64, value: &Content) {
    let old = shared
        .state
        .borrow()
        .nodes
        .get(&owner)
        .and_then(|entry| entry.targets.get(&id))
        .cloned();
    let Some(old) = old else {
        return;
    };
    let new_nodes = value.render(&shared.document);
    let outcome = reconcile(&shared.document, &old, &new_nodes);
    if let Some(entry) = shared.state.borrow_mut().nodes.get_mut(&owner) {
        entry.targets.insert(id, new_nodes);
    }
    for node in outcome.inserted {
        rebind_subtree(shared, node);
    }
    for node in outcome.removed {
        unbind_subtree(shared, node);
    }
}

// ---------------------------------------------------------------------------
// Bind queue
// ---------------------------------------------------------------------------

fn queue_bind_confirmation(shared: &Rc<EngineShared>, node: NodeId) {
    let schedule = {
        let mut state = shared.state.borrow_mut();
        state.bind_queue.push_back(node);
        !std::mem::replace(&mut state.bind_flush_queued, true)
    };
    if schedule {
        let weak = Rc::downgrade(shared);
        shared.scheduler.schedule(move || {
            if let Some(shared) = weak.upgrade() {
                flush_bind_queue(&shared);
            }
        });
    }
}

fn flush_bind_queue(shared: &Rc<EngineShared>) {
    #[cfg(feature = "tracing")]
    tracing::trace!(
        queued = shared.state.borrow().bind_queue.len(),
        "bind queue flush"
    );
    shared.state.borrow_mut().bind_flush_queued = false;
    loop {
        let node = shared.state.borrow_mut().bind_queue.pop_front();
        let Some(node) = node else {
            return;
        };
        if shared.document.is_attached(node) {
            rebind_subtree(shared, node);
        }
        // Not attached: the node's bindings release themselves on their
        // own next-tick checks.
    }
}

// ---------------------------------------------------------------------------
// Mutation sweep
// ---------------------------------------------------------------------------

fn on_mutations(shared: &Rc<EngineShared>, records: &[MutationRecord]) {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("mutation_sweep", records = records.len()).entered();

    for record in records {
        for &added in &record.added {
            // A tracked parent with this node already bound means an
            // ancestor rebind covered the subtree; walking again would be
            // redundant.
            let skip = {
                let state = shared.state.borrow();
                state.nodes.contains_key(&record.target) && is_bound_entry(&state, added)
            };
            if !skip {
                rebind_subtree(shared, added);
            }
        }
        for &removed in &record.removed {
            unbind_subtree(shared, removed);
        }
    }
}

fn is_bound_entry(state: &EngineState, node: NodeId) -> bool {
    state.nodes.get(&node).is_some_and(|entry| {
        entry.observing
            || entry.bindings.iter().any(Binding::is_bound)
            || entry.hook_bindings.iter().any(Binding::is_bound)
    })
}

// ---------------------------------------------------------------------------
// Bind/unbind walks
// ---------------------------------------------------------------------------

fn subtree_nodes(document: &Document, root: NodeId) -> Vec<NodeId> {
    let mut nodes = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        nodes.push(node);
        stack.extend(document.children(node));
    }
    nodes
}

fn rebind_subtree(shared: &Rc<EngineShared>, root: NodeId) {
    for node in subtree_nodes(&shared.document, root) {
        rebind_one(shared, node);
    }
}

fn unbind_subtree(shared: &Rc<EngineShared>, root: NodeId) {
    for node in subtree_nodes(&shared.document, root) {
        unbind_one(shared, node);
    }
}

fn rebind_one(shared: &Rc<EngineShared>, node: NodeId) {
    if !shared.document.is_element(node) {
        return;
    }
    // Untracked elements never observe; skip before the ancestor walk so
    // it cannot create an observer nothing will use.
    if !shared.state.borrow().nodes.contains_key(&node) {
        return;
    }
    let governing = governing_ancestor(shared, node, true);
    let (observe_at, child_bindings, hook_bindings) = {
        let mut state = shared.state.borrow_mut();
        let Some(entry) = state.nodes.get_mut(&node) else {
            return;
        };
        let hooks = entry.hook_bindings.clone();
        match governing {
            Some(ancestor) if !entry.observing => {
                // Defer child bindings to visibility.
                entry.observing = true;
                (Some(ancestor), Vec::new(), hooks)
            }
            // Already observing: visibility callbacks own the child
            // bindings; a repeated walk must not bind them early.
            Some(_) => (None, Vec::new(), hooks),
            None => (None, entry.bindings.clone(), hooks),
        }
    };
    if let Some(ancestor) = observe_at {
        let state = shared.state.borrow();
        if let Some(observer) = state
            .nodes
            .get(&ancestor)
            .and_then(|entry| entry.intersection.as_ref())
        {
            observer.observe(node);
        }
    }
    // Bindings run outside the state borrow: a rebind may render.
    for binding in child_bindings {
        binding.bind();
    }
    for binding in hook_bindings {
        binding.bind();
    }
}

fn unbind_one(shared: &Rc<EngineShared>, node: NodeId) {
    if !shared.document.is_element(node) {
        return;
    }
    let governing = governing_ancestor(shared, node, false);
    let (unobserve_at, child_bindings, hook_bindings) = {
        let mut state = shared.state.borrow_mut();
        let Some(entry) = state.nodes.get_mut(&node) else {
            return;
        };
        // The flag clears even when the governing observer is gone (the
        // node may have been detached before this walk); a later rebind
        // then starts observation fresh wherever the node lands.
        let unobserve = match governing {
            Some(ancestor) if entry.observing => Some(ancestor),
            _ => None,
        };
        entry.observing = false;
        (unobserve, entry.bindings.clone(), entry.hook_bindings.clone())
    };
    if let Some(ancestor) = unobserve_at {
        let state = shared.state.borrow();
        if let Some(observer) = state
            .nodes
            .get(&ancestor)
            .and_then(|entry| entry.intersection.as_ref())
        {
            observer.unobserve(node);
        }
    }
    for binding in child_bindings {
        binding.unbind();
    }
    for binding in hook_bindings {
        binding.unbind();
    }
}

// ---------------------------------------------------------------------------
// Viewport gating
// ---------------------------------------------------------------------------

/// Nearest viewport-flagged strict ancestor of `node`. With `create`, the
/// flagged element's shared intersection observer is created on first
/// use; without it, only an ancestor whose observer already exists is
/// returned.
fn governing_ancestor(shared: &Rc<EngineShared>, node: NodeId, create: bool) -> Option<NodeId> {
    let mut current = shared.document.parent(node);
    while let Some(ancestor) = current {
        let flagged = {
            let state = shared.state.borrow();
            state.nodes.get(&ancestor).and_then(|entry| {
                entry
                    .viewport_margin
                    .clone()
                    .map(|margin| (margin, entry.intersection.is_some()))
            })
        };
        if let Some((margin, has_observer)) = flagged {
            if has_observer {
                return Some(ancestor);
            }
            if create {
                create_intersection_observer(shared, ancestor, &margin);
                return Some(ancestor);
            }
            return None;
        }
        current = shared.document.parent(ancestor);
    }
    None
}

fn create_intersection_observer(shared: &Rc<EngineShared>, flagged: NodeId, margin: &str) {
    let weak = Rc::downgrade(shared);
    let observer = shared.document.create_intersection_observer(
        IntersectionOptions::new(flagged)
            .margin(margin)
            .thresholds([0.0, ENTER_RATIO]),
        move |entries| {
            if let Some(shared) = weak.upgrade() {
                on_intersections(&shared, entries);
            }
        },
    );
    if let Some(entry) = shared.state.borrow_mut().nodes.get_mut(&flagged) {
        entry.intersection = Some(observer);
    }
}

fn on_intersections(shared: &Rc<EngineShared>, entries: &[IntersectionEntry]) {
    for entry in entries {
        if entry.is_intersecting {
            if entry.ratio >= ENTER_RATIO {
                set_viewport_bound(shared, entry.target, true);
            }
            // Intersecting below the enter ratio: no transition.
        } else {
            set_viewport_bound(shared, entry.target, false);
        }
    }
}

fn set_viewport_bound(shared: &Rc<EngineShared>, node: NodeId, bound: bool) {
    let bindings = {
        let state = shared.state.borrow();
        match state.nodes.get(&node) {
            Some(entry) if entry.observing => entry.bindings.clone(),
            _ => return,
        }
    };
    for binding in bindings {
        if bound {
            binding.bind();
        } else {
            binding.unbind();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
