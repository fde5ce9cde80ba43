#![forbid(unsafe_code)]

//! In-memory document: the tree capability the binding engine consumes.
//!
//! A [`Document`] is a cheap cloneable handle over a node arena plus two
//! observation registries. It provides exactly what the engine needs and
//! nothing more: element/text creation, child-list mutation, parent-chain
//! queries, batched child-list mutation observation, and host-driven
//! intersection observation.
//!
//! # Invariants
//!
//! 1. Mutation and intersection callbacks never run inside the mutating
//!    call; batches are delivered on the scheduler's tick lane.
//! 2. Per observer, at most one delivery task is queued at a time; a batch
//!    is delivered whole, in mutation order.
//! 3. A node moved between parents produces a removal record at the old
//!    parent before the insertion record at the new one.
//! 4. Releasing an observer handle (or dropping it) stops delivery; records
//!    already batched are dropped with it.
//!
//! # Failure Modes
//!
//! - Structural calls with a stale [`NodeId`] (freed subtree) fail with
//!   [`DomError::UnknownNode`]; queries return `None`/empty instead.
//! - Appending a node under one of its own descendants fails with
//!   [`DomError::WouldCycle`]; the tree is never corrupted.

use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::{AHashMap, AHashSet};
use weft_reactive::Scheduler;

use crate::node::{NodeData, NodeId, NodeKind};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structural preconditions a document call can fail on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DomError {
    /// The id does not name a live node in this document.
    UnknownNode(NodeId),
    /// The operation needs an element (text nodes have no children or
    /// properties).
    NotAnElement(NodeId),
    /// The operation needs a text node.
    NotText(NodeId),
    /// The reference node is not a child of the given parent.
    NotAChild { parent: NodeId, child: NodeId },
    /// Inserting `child` under `parent` would make a node its own ancestor.
    WouldCycle { parent: NodeId, child: NodeId },
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::UnknownNode(node) => write!(f, "unknown node {node:?}"),
            DomError::NotAnElement(node) => write!(f, "{node:?} is not an element"),
            DomError::NotText(node) => write!(f, "{node:?} is not a text node"),
            DomError::NotAChild { parent, child } => {
                write!(f, "{child:?} is not a child of {parent:?}")
            }
            DomError::WouldCycle { parent, child } => {
                write!(f, "inserting {child:?} under {parent:?} would create a cycle")
            }
        }
    }
}

impl Error for DomError {}

// ---------------------------------------------------------------------------
// Observation records
// ---------------------------------------------------------------------------

/// One child-list change: nodes added to / removed from `target`.
#[derive(Clone, Debug)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// One visibility change for an observed node, as driven by the host via
/// [`Document::set_intersection_ratio`].
#[derive(Clone, Copy, Debug)]
pub struct IntersectionEntry {
    pub target: NodeId,
    pub is_intersecting: bool,
    pub ratio: f64,
}

/// Construction options for an intersection observer.
#[derive(Clone, Debug)]
pub struct IntersectionOptions {
    root: NodeId,
    margin: String,
    thresholds: Vec<f64>,
}

impl IntersectionOptions {
    /// Observe relative to `root` with no margin and a single zero
    /// threshold.
    #[must_use]
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            margin: String::from("0px"),
            thresholds: vec![0.0],
        }
    }

    /// Root margin, CSS-style string.
    #[must_use]
    pub fn margin(mut self, margin: impl Into<String>) -> Self {
        self.margin = margin.into();
        self
    }

    /// Ratio thresholds. Stored for introspection; ratio gating is left to
    /// the consumer.
    #[must_use]
    pub fn thresholds(mut self, thresholds: impl Into<Vec<f64>>) -> Self {
        self.thresholds = thresholds.into();
        self
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }
}

// ---------------------------------------------------------------------------
// Observer internals
// ---------------------------------------------------------------------------

type MutationCallback = Box<dyn FnMut(&[MutationRecord])>;
type IntersectionCallback = Box<dyn FnMut(&[IntersectionEntry])>;

struct MutationShared {
    callback: RefCell<MutationCallback>,
    pending: RefCell<Vec<MutationRecord>>,
    delivery_queued: Cell<bool>,
}

struct IntersectionShared {
    options: IntersectionOptions,
    watched: RefCell<AHashSet<NodeId>>,
    callback: RefCell<IntersectionCallback>,
    pending: RefCell<Vec<IntersectionEntry>>,
    delivery_queued: Cell<bool>,
}

/// Handle to a registered child-list mutation observer. Dropping or
/// releasing it unregisters the callback.
#[must_use = "dropping a MutationObserver stops mutation delivery"]
pub struct MutationObserver {
    doc: Weak<RefCell<DocInner>>,
    id: u64,
    released: Cell<bool>,
}

impl MutationObserver {
    /// Unregister now. Idempotent.
    pub fn release(&self) {
        if self.released.replace(true) {
            return;
        }
        if let Some(inner) = self.doc.upgrade() {
            inner.borrow_mut().mutation_observers.remove(&self.id);
        }
    }
}

impl Drop for MutationObserver {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for MutationObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationObserver")
            .field("released", &self.released.get())
            .finish()
    }
}

/// Handle to a registered intersection observer. Observe/unobserve are
/// idempotent; dropping or releasing the handle unregisters it.
#[must_use = "dropping an IntersectionObserver stops intersection delivery"]
pub struct IntersectionObserver {
    doc: Weak<RefCell<DocInner>>,
    shared: Weak<IntersectionShared>,
    id: u64,
    released: Cell<bool>,
}

impl IntersectionObserver {
    /// Start watching `node`. A no-op when already watched.
    pub fn observe(&self, node: NodeId) {
        if let Some(shared) = self.shared.upgrade() {
            shared.watched.borrow_mut().insert(node);
        }
    }

    /// Stop watching `node`. A no-op when not watched.
    pub fn unobserve(&self, node: NodeId) {
        if let Some(shared) = self.shared.upgrade() {
            shared.watched.borrow_mut().remove(&node);
        }
    }

    /// True while `node` is watched.
    #[must_use]
    pub fn is_observing(&self, node: NodeId) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.watched.borrow().contains(&node))
    }

    /// The options this observer was created with, while it is registered.
    #[must_use]
    pub fn options(&self) -> Option<IntersectionOptions> {
        self.shared.upgrade().map(|shared| shared.options.clone())
    }

    /// Unregister now. Idempotent.
    pub fn release(&self) {
        if self.released.replace(true) {
            return;
        }
        if let Some(inner) = self.doc.upgrade() {
            inner.borrow_mut().intersection_observers.remove(&self.id);
        }
    }
}

impl Drop for IntersectionObserver {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for IntersectionObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntersectionObserver")
            .field("released", &self.released.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

struct DocInner {
    scheduler: Scheduler,
    nodes: AHashMap<NodeId, NodeData>,
    next_node: u64,
    root: NodeId,
    mutation_observers: AHashMap<u64, Rc<MutationShared>>,
    intersection_observers: AHashMap<u64, Rc<IntersectionShared>>,
    next_observer: u64,
}

/// Cheap cloneable handle to one document. Clones share the tree.
pub struct Document {
    inner: Rc<RefCell<DocInner>>,
}

impl Clone for Document {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Document {
    /// Empty document over `scheduler`. The root node is a pre-created
    /// element; anything reachable from it counts as attached.
    #[must_use]
    pub fn new(scheduler: Scheduler) -> Self {
        let root = NodeId(0);
        let mut nodes = AHashMap::new();
        nodes.insert(root, NodeData::element(String::from("#document"), None));
        Self {
            inner: Rc::new(RefCell::new(DocInner {
                scheduler,
                nodes,
                next_node: 1,
                root,
                mutation_observers: AHashMap::new(),
                intersection_observers: AHashMap::new(),
                next_observer: 0,
            })),
        }
    }

    /// The scheduler this document delivers observation batches on.
    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        self.inner.borrow().scheduler.clone()
    }

    /// The document root.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.inner.borrow().root
    }

    // ---
    // Creation
    // ---

    #[must_use]
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.alloc(NodeData::element(tag.to_owned(), None))
    }

    #[must_use]
    pub fn create_element_ns(&self, namespace: &str, tag: &str) -> NodeId {
        self.alloc(NodeData::element(
            tag.to_owned(),
            Some(namespace.to_owned()),
        ))
    }

    #[must_use]
    pub fn create_text(&self, text: &str) -> NodeId {
        self.alloc(NodeData::text(text.to_owned()))
    }

    fn alloc(&self, data: NodeData) -> NodeId {
        let mut inner = self.inner.borrow_mut();
        let id = NodeId(inner.next_node);
        inner.next_node += 1;
        inner.nodes.insert(id, data);
        id
    }

    // ---
    // Structure
    // ---

    /// Append `child` as the last child of `parent`. A child already in a
    /// tree is detached from its old parent first (one removal record,
    /// then one insertion record).
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert(parent, child, None)
    }

    /// Insert `child` immediately before `reference` under `parent`.
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> Result<(), DomError> {
        self.insert(parent, child, Some(reference))
    }

    fn insert(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        let removal = {
            let mut inner = self.inner.borrow_mut();
            let parent_data = inner.nodes.get(&parent).ok_or(DomError::UnknownNode(parent))?;
            if !parent_data.is_element() {
                return Err(DomError::NotAnElement(parent));
            }
            if !inner.nodes.contains_key(&child) {
                return Err(DomError::UnknownNode(child));
            }
            if child == parent || Self::is_ancestor(&inner, child, parent) {
                return Err(DomError::WouldCycle { parent, child });
            }
            if let Some(reference) = reference {
                if !inner.nodes[&parent].children.contains(&reference) {
                    return Err(DomError::NotAChild {
                        parent,
                        child: reference,
                    });
                }
            }
            // Inserting a node before itself targets its next sibling, so
            // the node keeps its position.
            let reference = match reference {
                Some(r) if r == child => {
                    let siblings = &inner.nodes[&parent].children;
                    siblings
                        .iter()
                        .position(|&c| c == r)
                        .and_then(|i| siblings.get(i + 1).copied())
                }
                other => other,
            };

            // Detach from the old parent first; a move is a removal there
            // plus an insertion here.
            let old_parent = inner.nodes[&child].parent;
            if let Some(old_parent) = old_parent {
                if let Some(data) = inner.nodes.get_mut(&old_parent) {
                    data.children.retain(|&c| c != child);
                }
            }

            let siblings = &mut inner
                .nodes
                .get_mut(&parent)
                .ok_or(DomError::UnknownNode(parent))?
                .children;
            let index = reference
                .and_then(|r| siblings.iter().position(|&c| c == r))
                .unwrap_or(siblings.len());
            siblings.insert(index, child);
            inner
                .nodes
                .get_mut(&child)
                .ok_or(DomError::UnknownNode(child))?
                .parent = Some(parent);
            old_parent
        };

        if let Some(old_parent) = removal {
            self.queue_mutation(MutationRecord {
                target: old_parent,
                added: Vec::new(),
                removed: vec![child],
            });
        }
        self.queue_mutation(MutationRecord {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Remove `child` from `parent`. The subtree stays alive (and
    /// reattachable) until freed.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.nodes.contains_key(&parent) {
                return Err(DomError::UnknownNode(parent));
            }
            let child_data = inner.nodes.get(&child).ok_or(DomError::UnknownNode(child))?;
            if child_data.parent != Some(parent) {
                return Err(DomError::NotAChild { parent, child });
            }
            if let Some(data) = inner.nodes.get_mut(&parent) {
                data.children.retain(|&c| c != child);
            }
            if let Some(data) = inner.nodes.get_mut(&child) {
                data.parent = None;
            }
        }
        self.queue_mutation(MutationRecord {
            target: parent,
            added: Vec::new(),
            removed: vec![child],
        });
        Ok(())
    }

    /// Remove `node` from its parent, wherever it is. A no-op for unknown
    /// or already-detached nodes.
    pub fn detach(&self, node: NodeId) {
        let parent = self.parent(node);
        if let Some(parent) = parent {
            // The parent link was just read; removal cannot fail.
            let _ = self.remove_child(parent, node);
        }
    }

    /// Detach `node` and drop its whole subtree from the arena. Ids in the
    /// subtree become stale; structural calls on them fail with
    /// [`DomError::UnknownNode`].
    pub fn free_subtree(&self, node: NodeId) {
        self.detach(node);
        let mut stack = vec![node];
        let mut inner = self.inner.borrow_mut();
        while let Some(current) = stack.pop() {
            if let Some(data) = inner.nodes.remove(&current) {
                stack.extend(data.children);
            }
        }
    }

    fn is_ancestor(inner: &DocInner, candidate: NodeId, node: NodeId) -> bool {
        let mut current = inner.nodes.get(&node).and_then(|data| data.parent);
        while let Some(parent) = current {
            if parent == candidate {
                return true;
            }
            current = inner.nodes.get(&parent).and_then(|data| data.parent);
        }
        false
    }

    // ---
    // Queries
    // ---

    /// True while the id names a live node in this document's arena.
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.inner.borrow().nodes.contains_key(&node)
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().nodes.get(&node).and_then(|data| data.parent)
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn child_count(&self, node: NodeId) -> usize {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .map_or(0, |data| data.children.len())
    }

    #[must_use]
    pub fn is_element(&self, node: NodeId) -> bool {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .is_some_and(NodeData::is_element)
    }

    #[must_use]
    pub fn tag(&self, node: NodeId) -> Option<String> {
        match &self.inner.borrow().nodes.get(&node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    #[must_use]
    pub fn namespace(&self, node: NodeId) -> Option<String> {
        match &self.inner.borrow().nodes.get(&node)?.kind {
            NodeKind::Element { namespace, .. } => namespace.clone(),
            NodeKind::Text(_) => None,
        }
    }

    #[must_use]
    pub fn text(&self, node: NodeId) -> Option<String> {
        match &self.inner.borrow().nodes.get(&node)?.kind {
            NodeKind::Text(text) => Some(text.clone()),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn set_text(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        let mut inner = self.inner.borrow_mut();
        let data = inner.nodes.get_mut(&node).ok_or(DomError::UnknownNode(node))?;
        match &mut data.kind {
            NodeKind::Text(current) => {
                *current = text.to_owned();
                Ok(())
            }
            NodeKind::Element { .. } => Err(DomError::NotText(node)),
        }
    }

    #[must_use]
    pub fn prop(&self, node: NodeId, key: &str) -> Option<String> {
        match &self.inner.borrow().nodes.get(&node)?.kind {
            NodeKind::Element { props, .. } => props.get(key).map(str::to_owned),
            NodeKind::Text(_) => None,
        }
    }

    pub fn set_prop(&self, node: NodeId, key: &str, value: &str) -> Result<(), DomError> {
        let mut inner = self.inner.borrow_mut();
        let data = inner.nodes.get_mut(&node).ok_or(DomError::UnknownNode(node))?;
        match &mut data.kind {
            NodeKind::Element { props, .. } => {
                props.set(key, value);
                Ok(())
            }
            NodeKind::Text(_) => Err(DomError::NotAnElement(node)),
        }
    }

    pub fn remove_prop(&self, node: NodeId, key: &str) -> Result<bool, DomError> {
        let mut inner = self.inner.borrow_mut();
        let data = inner.nodes.get_mut(&node).ok_or(DomError::UnknownNode(node))?;
        match &mut data.kind {
            NodeKind::Element { props, .. } => Ok(props.remove(key)),
            NodeKind::Text(_) => Err(DomError::NotAnElement(node)),
        }
    }

    /// True while walking the parent chain from `node` reaches the root.
    #[must_use]
    pub fn is_attached(&self, node: NodeId) -> bool {
        let inner = self.inner.borrow();
        if node == inner.root {
            return true;
        }
        let mut current = inner.nodes.get(&node).and_then(|data| data.parent);
        while let Some(parent) = current {
            if parent == inner.root {
                return true;
            }
            current = inner.nodes.get(&parent).and_then(|data| data.parent);
        }
        false
    }

    /// Number of live nodes, root included. Test surface.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    // ---
    // Mutation observation
    // ---

    /// Register a child-list observer over the whole document. Batches are
    /// delivered asynchronously on the scheduler's tick lane.
    pub fn observe_mutations(
        &self,
        callback: impl FnMut(&[MutationRecord]) + 'static,
    ) -> MutationObserver {
        let shared = Rc::new(MutationShared {
            callback: RefCell::new(Box::new(callback)),
            pending: RefCell::new(Vec::new()),
            delivery_queued: Cell::new(false),
        });
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_observer;
        inner.next_observer += 1;
        inner.mutation_observers.insert(id, shared);
        MutationObserver {
            doc: Rc::downgrade(&self.inner),
            id,
            released: Cell::new(false),
        }
    }

    fn queue_mutation(&self, record: MutationRecord) {
        let inner = self.inner.borrow();
        for shared in inner.mutation_observers.values() {
            shared.pending.borrow_mut().push(record.clone());
            if !shared.delivery_queued.replace(true) {
                let weak = Rc::downgrade(shared);
                inner.scheduler.schedule(move || {
                    let Some(shared) = weak.upgrade() else {
                        return;
                    };
                    shared.delivery_queued.set(false);
                    let batch = std::mem::take(&mut *shared.pending.borrow_mut());
                    if !batch.is_empty() {
                        (shared.callback.borrow_mut())(&batch);
                    }
                });
            }
        }
    }

    // ---
    // Intersection observation
    // ---

    /// Register an intersection observer. Geometry is host-driven through
    /// [`Document::set_intersection_ratio`]; threshold gating is left to
    /// the callback.
    pub fn create_intersection_observer(
        &self,
        options: IntersectionOptions,
        callback: impl FnMut(&[IntersectionEntry]) + 'static,
    ) -> IntersectionObserver {
        let shared = Rc::new(IntersectionShared {
            options,
            watched: RefCell::new(AHashSet::new()),
            callback: RefCell::new(Box::new(callback)),
            pending: RefCell::new(Vec::new()),
            delivery_queued: Cell::new(false),
        });
        let weak_shared = Rc::downgrade(&shared);
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_observer;
        inner.next_observer += 1;
        inner.intersection_observers.insert(id, shared);
        IntersectionObserver {
            doc: Rc::downgrade(&self.inner),
            shared: weak_shared,
            id,
            released: Cell::new(false),
        }
    }

    /// Drive `node`'s visibility: every observer watching it receives an
    /// asynchronous [`IntersectionEntry`] with `is_intersecting` true iff
    /// `ratio` is positive.
    pub fn set_intersection_ratio(&self, node: NodeId, ratio: f64) {
        let entry = IntersectionEntry {
            target: node,
            is_intersecting: ratio > 0.0,
            ratio,
        };
        let inner = self.inner.borrow();
        for shared in inner.intersection_observers.values() {
            if !shared.watched.borrow().contains(&node) {
                continue;
            }
            shared.pending.borrow_mut().push(entry);
            if !shared.delivery_queued.replace(true) {
                let weak = Rc::downgrade(shared);
                inner.scheduler.schedule(move || {
                    let Some(shared) = weak.upgrade() else {
                        return;
                    };
                    shared.delivery_queued.set(false);
                    let batch = std::mem::take(&mut *shared.pending.borrow_mut());
                    if !batch.is_empty() {
                        (shared.callback.borrow_mut())(&batch);
                    }
                });
            }
        }
    }

    /// Number of registered intersection observers. Test surface.
    #[must_use]
    pub fn intersection_observer_count(&self) -> usize {
        self.inner.borrow().intersection_observers.len()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Document")
            .field("nodes", &inner.nodes.len())
            .field("mutation_observers", &inner.mutation_observers.len())
            .field("intersection_observers", &inner.intersection_observers.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn doc() -> (Scheduler, Document) {
        let sched = Scheduler::new();
        (sched.clone(), Document::new(sched))
    }

    #[test]
    fn created_nodes_start_detached() {
        let (_, doc) = doc();
        let div = doc.create_element("div");
        assert!(!doc.is_attached(div));
        assert_eq!(doc.parent(div), None);
        assert_eq!(doc.tag(div).as_deref(), Some("div"));
    }

    #[test]
    fn append_attaches_through_the_root() {
        let (_, doc) = doc();
        let outer = doc.create_element("div");
        let inner = doc.create_element("span");
        doc.append_child(outer, inner).expect("append");
        assert!(!doc.is_attached(inner), "parent chain does not reach root yet");

        doc.append_child(doc.root(), outer).expect("append to root");
        assert!(doc.is_attached(outer));
        assert!(doc.is_attached(inner));
    }

    #[test]
    fn insert_before_orders_children() {
        let (_, doc) = doc();
        let parent = doc.create_element("ul");
        let a = doc.create_text("a");
        let c = doc.create_text("c");
        let b = doc.create_text("b");
        doc.append_child(parent, a).expect("append");
        doc.append_child(parent, c).expect("append");
        doc.insert_before(parent, b, c).expect("insert");
        assert_eq!(doc.children(parent), vec![a, b, c]);
    }

    #[test]
    fn insert_moves_a_node_already_in_a_tree() {
        let (_, doc) = doc();
        let first = doc.create_element("div");
        let second = doc.create_element("div");
        let child = doc.create_text("x");
        doc.append_child(first, child).expect("append");
        doc.append_child(second, child).expect("move");
        assert_eq!(doc.child_count(first), 0);
        assert_eq!(doc.children(second), vec![child]);
        assert_eq!(doc.parent(child), Some(second));
    }

    #[test]
    fn structural_preconditions_fail_cleanly() {
        let (_, doc) = doc();
        let parent = doc.create_element("div");
        let text = doc.create_text("t");
        let stranger = doc.create_element("span");
        doc.append_child(parent, text).expect("append");

        assert_eq!(
            doc.append_child(text, stranger),
            Err(DomError::NotAnElement(text))
        );
        assert_eq!(
            doc.remove_child(parent, stranger),
            Err(DomError::NotAChild {
                parent,
                child: stranger
            })
        );
        assert_eq!(
            doc.insert_before(parent, stranger, stranger),
            Err(DomError::NotAChild {
                parent,
                child: stranger
            })
        );
        assert_eq!(
            doc.append_child(parent, parent),
            Err(DomError::WouldCycle {
                parent,
                child: parent
            })
        );

        let outer = doc.create_element("div");
        doc.append_child(outer, parent).expect("append");
        assert_eq!(
            doc.append_child(parent, outer),
            Err(DomError::WouldCycle {
                parent,
                child: outer
            })
        );
    }

    #[test]
    fn insert_before_itself_keeps_the_node_in_place() {
        let (_, doc) = doc();
        let parent = doc.create_element("ul");
        let a = doc.create_text("a");
        let b = doc.create_text("b");
        let c = doc.create_text("c");
        doc.append_child(parent, a).expect("append");
        doc.append_child(parent, b).expect("append");
        doc.append_child(parent, c).expect("append");

        doc.insert_before(parent, b, b).expect("self reference is legal");
        assert_eq!(doc.children(parent), vec![a, b, c]);

        doc.insert_before(parent, c, c).expect("last child too");
        assert_eq!(doc.children(parent), vec![a, b, c]);
    }

    #[test]
    fn props_and_text_round_trip() {
        let (_, doc) = doc();
        let div = doc.create_element("div");
        doc.set_prop(div, "class", "card").expect("set prop");
        assert_eq!(doc.prop(div, "class").as_deref(), Some("card"));
        assert!(doc.remove_prop(div, "class").expect("remove prop"));

        let text = doc.create_text("before");
        doc.set_text(text, "after").expect("set text");
        assert_eq!(doc.text(text).as_deref(), Some("after"));
        assert_eq!(doc.set_text(div, "no"), Err(DomError::NotText(div)));
        assert_eq!(
            doc.set_prop(text, "k", "v"),
            Err(DomError::NotAnElement(text))
        );
    }

    #[test]
    fn free_subtree_invalidates_ids() {
        let (_, doc) = doc();
        let parent = doc.create_element("div");
        let child = doc.create_element("span");
        doc.append_child(parent, child).expect("append");
        doc.append_child(doc.root(), parent).expect("append");
        let before = doc.node_count();

        doc.free_subtree(parent);
        assert_eq!(doc.node_count(), before - 2);
        assert!(!doc.contains(parent));
        assert!(!doc.contains(child));
        assert_eq!(
            doc.append_child(doc.root(), child),
            Err(DomError::UnknownNode(child))
        );
    }

    #[test]
    fn mutations_are_delivered_asynchronously_in_batches() {
        let (sched, doc) = doc();
        let batches: Rc<RefCell<Vec<Vec<MutationRecord>>>> = Rc::new(RefCell::new(Vec::new()));
        let b = Rc::clone(&batches);
        let _observer = doc.observe_mutations(move |records| {
            b.borrow_mut().push(records.to_vec());
        });

        let a = doc.create_element("div");
        let x = doc.create_text("x");
        doc.append_child(doc.root(), a).expect("append");
        doc.append_child(a, x).expect("append");
        assert!(batches.borrow().is_empty(), "never delivered synchronously");

        sched.tick();
        let batches = batches.borrow();
        assert_eq!(batches.len(), 1, "one batch for one turn's mutations");
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0][0].target, doc.root());
        assert_eq!(batches[0][0].added, vec![a]);
        assert_eq!(batches[0][1].target, a);
        assert_eq!(batches[0][1].added, vec![x]);
    }

    #[test]
    fn a_move_records_removal_before_insertion() {
        let (sched, doc) = doc();
        let first = doc.create_element("div");
        let second = doc.create_element("div");
        let child = doc.create_text("x");
        doc.append_child(first, child).expect("append");
        sched.tick();

        let records: Rc<RefCell<Vec<MutationRecord>>> = Rc::new(RefCell::new(Vec::new()));
        let r = Rc::clone(&records);
        let _observer = doc.observe_mutations(move |batch| {
            r.borrow_mut().extend(batch.iter().cloned());
        });
        doc.append_child(second, child).expect("move");
        sched.tick();

        let records = records.borrow();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].target, first);
        assert_eq!(records[0].removed, vec![child]);
        assert_eq!(records[1].target, second);
        assert_eq!(records[1].added, vec![child]);
    }

    #[test]
    fn released_observer_receives_nothing() {
        let (sched, doc) = doc();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let observer = doc.observe_mutations(move |_| c.set(c.get() + 1));

        let a = doc.create_element("div");
        doc.append_child(doc.root(), a).expect("append");
        observer.release();
        sched.tick();
        assert_eq!(count.get(), 0, "records pending at release are dropped");
    }

    #[test]
    fn intersection_entries_reach_watching_observers_only() {
        let (sched, doc) = doc();
        let watched = doc.create_element("div");
        let ignored = doc.create_element("div");

        let seen: Rc<RefCell<Vec<IntersectionEntry>>> = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let observer = doc.create_intersection_observer(
            IntersectionOptions::new(doc.root()).thresholds([0.0, 0.1]),
            move |entries| s.borrow_mut().extend(entries.iter().copied()),
        );
        observer.observe(watched);
        observer.observe(watched);
        assert!(observer.is_observing(watched), "observe is idempotent");

        doc.set_intersection_ratio(ignored, 1.0);
        doc.set_intersection_ratio(watched, 0.5);
        assert!(seen.borrow().is_empty(), "never delivered synchronously");
        sched.tick();
        {
            let seen = seen.borrow();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].target, watched);
            assert!(seen[0].is_intersecting);
            assert!((seen[0].ratio - 0.5).abs() < f64::EPSILON);
        }

        doc.set_intersection_ratio(watched, 0.0);
        sched.tick();
        {
            let seen = seen.borrow();
            assert_eq!(seen.len(), 2);
            assert!(!seen[1].is_intersecting, "zero ratio means not intersecting");
        }

        observer.unobserve(watched);
        doc.set_intersection_ratio(watched, 1.0);
        sched.tick();
        assert_eq!(seen.borrow().len(), 2, "unobserved nodes deliver nothing");
    }
}
