#![forbid(unsafe_code)]

//! Node identity and per-node storage.
//!
//! A [`NodeId`] is an opaque handle assigned sequentially by its
//! [`Document`](crate::Document). It is the stable identity everything
//! else keys on: the document arena, the engine's binding side table,
//! mutation records. Ids are never reused within one document.

use std::fmt;

/// Opaque handle to one document node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    /// Raw id, useful for logging and deterministic test assertions.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Props — insertion-ordered string properties
// ---------------------------------------------------------------------------

/// Plain property map for element nodes. Keeps insertion order so a
/// rendered element reads back deterministically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Props {
    entries: Vec<(String, String)>,
}

impl Props {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing in place when it already exists.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_owned(),
            None => self.entries.push((key.to_owned(), value.to_owned())),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Remove `key`, reporting whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != key);
        self.entries.len() != before
    }

    /// All properties in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Arena storage
// ---------------------------------------------------------------------------

/// What one node is.
pub(crate) enum NodeKind {
    Element {
        tag: String,
        namespace: Option<String>,
        props: Props,
    },
    Text(String),
}

/// One arena slot: kind plus tree links.
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl NodeData {
    pub(crate) fn element(tag: String, namespace: Option<String>) -> Self {
        Self {
            kind: NodeKind::Element {
                tag,
                namespace,
                props: Props::new(),
            },
            parent: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn text(text: String) -> Self {
        Self {
            kind: NodeKind::Text(text),
            parent: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element { .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
