#![forbid(unsafe_code)]

//! Element child content.
//!
//! [`Content`] is everything the element builder accepts as a child: text,
//! an existing node, a list of further content (flattened), or an
//! observable resolving to any of those. Rendering turns content into a
//! node list; the list is never empty — an empty result renders as one
//! empty text node so a binding always keeps a stable anchor position for
//! future reconciliation.

use weft_reactive::{BoxedListener, DynObservable, Observable, Subscription};

use crate::document::Document;
use crate::node::NodeId;

/// One element child.
#[derive(Clone)]
pub enum Content {
    /// Rendered as a text node.
    Text(String),
    /// An existing node, adopted as-is.
    Node(NodeId),
    /// Flattened in place; each entry is rendered independently.
    Many(Vec<Content>),
    /// Re-rendered whenever the observable broadcasts a change.
    Dynamic(DynObservable<Content>),
}

impl Content {
    /// Text content from anything displayable.
    pub fn text(value: impl ToString) -> Self {
        Content::Text(value.to_string())
    }

    /// Dynamic content from any observable whose output converts into
    /// content.
    pub fn dynamic<O>(source: O) -> Self
    where
        O: Observable + 'static,
        O::Output: Into<Content>,
    {
        Content::Dynamic(DynObservable::new(IntoContent { source }))
    }

    /// Render into a node list. Never returns an empty list: empty
    /// [`Content::Many`] yields one empty text node.
    pub(crate) fn render(&self, document: &Document) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        self.collect(document, &mut nodes);
        if nodes.is_empty() {
            nodes.push(document.create_text(""));
        }
        nodes
    }

    fn collect(&self, document: &Document, nodes: &mut Vec<NodeId>) {
        match self {
            Content::Text(text) => nodes.push(document.create_text(text)),
            Content::Node(node) => nodes.push(*node),
            Content::Many(items) => {
                for item in items {
                    item.collect(document, nodes);
                }
            }
            Content::Dynamic(source) => source.get().collect(document, nodes),
        }
    }
}

/// Equality is structural for text, nodes, and lists; dynamic content
/// compares by source identity, which lets [`Content`] sit inside a
/// [`weft_reactive::Value`] without forcing the observable to be
/// comparable.
impl PartialEq for Content {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Content::Text(a), Content::Text(b)) => a == b,
            (Content::Node(a), Content::Node(b)) => a == b,
            (Content::Many(a), Content::Many(b)) => a == b,
            (Content::Dynamic(a), Content::Dynamic(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Content::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Content::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Content::Many(items) => f.debug_tuple("Many").field(&items.len()).finish(),
            Content::Dynamic(_) => f.write_str("Dynamic"),
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_owned())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<NodeId> for Content {
    fn from(node: NodeId) -> Self {
        Content::Node(node)
    }
}

impl From<Vec<Content>> for Content {
    fn from(items: Vec<Content>) -> Self {
        Content::Many(items)
    }
}

impl From<DynObservable<Content>> for Content {
    fn from(source: DynObservable<Content>) -> Self {
        Content::Dynamic(source)
    }
}

/// Adapter mapping an observable's output into [`Content`] on the fly.
struct IntoContent<O> {
    source: O,
}

impl<O> Observable for IntoContent<O>
where
    O: Observable,
    O::Output: Into<Content>,
{
    type Output = Content;

    fn get(&self) -> Content {
        self.source.get().into()
    }

    fn observe_boxed(&self, mut listener: BoxedListener<Content>) -> Subscription {
        self.source
            .observe_boxed(Box::new(move |value| listener(&value.clone().into())))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
