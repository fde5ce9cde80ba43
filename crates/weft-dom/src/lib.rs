#![forbid(unsafe_code)]

//! Tree binding for [`weft-reactive`] observables.
//!
//! This crate pairs an in-memory document tree with the reactive layer:
//! elements are declared once through [`Engine::element`], observables
//! appearing as children or properties become managed [`Binding`]s, and
//! the engine keeps each binding's subscription alive exactly while its
//! node is attached to the document (and, under viewport gating, while it
//! is visible).
//!
//! ```
//! use weft_dom::{Content, Engine};
//! use weft_reactive::Value;
//!
//! let engine = Engine::new();
//! let doc = engine.document();
//!
//! let label = Value::new(String::from("hello"));
//! let node = engine
//!     .element("p.greeting")
//!     .child(Content::dynamic(label.clone()))
//!     .build();
//! doc.append_child(doc.root(), node).unwrap();
//! engine.run_until_idle();
//!
//! label.set(String::from("world"));
//! engine.run_until_idle();
//! let text = doc.children(node)[0];
//! assert_eq!(doc.text(text).unwrap(), "world");
//! ```
//!
//! [`weft-reactive`]: weft_reactive

pub mod binding;
pub mod content;
pub mod document;
pub mod engine;
pub mod node;
pub mod tag;

pub use binding::{Binding, RewatchFn, SubscribeFn};
pub use content::Content;
pub use document::{
    Document, DomError, IntersectionEntry, IntersectionObserver, IntersectionOptions,
    MutationObserver, MutationRecord,
};
pub use engine::{Engine, ElementBuilder, ReplaceOutcome, reconcile};
pub use node::{NodeId, Props};
pub use tag::{ParsedTag, parse_tag};
