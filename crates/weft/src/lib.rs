#![forbid(unsafe_code)]

//! Weft: lazy observable state bound to a document tree.
//!
//! This facade re-exports the two layers under one roof:
//!
//! - [`reactive`]: values, containers, derived state, and the scheduler;
//! - [`dom`]: the document tree, element builder, and binding engine.
//!
//! Most programs only need the [`prelude`]:
//!
//! ```
//! use weft::prelude::*;
//!
//! let engine = Engine::new();
//! let doc = engine.document();
//!
//! let count = Value::new(0u32);
//! let label = Computed::map(&count, |n| format!("clicked {n} times"));
//! let button = engine
//!     .element("button.counter")
//!     .child(Content::dynamic(label))
//!     .build();
//! doc.append_child(doc.root(), button).unwrap();
//! engine.run_until_idle();
//!
//! count.set(3);
//! engine.run_until_idle();
//! let text = doc.children(button)[0];
//! assert_eq!(doc.text(text).unwrap(), "clicked 3 times");
//! ```

pub use weft_dom as dom;
pub use weft_reactive as reactive;

/// The common surface, glob-import friendly.
pub mod prelude {
    pub use weft_dom::{
        Binding, Content, Document, DomError, Engine, IntersectionOptions, MutationRecord,
        NodeId,
    };
    pub use weft_reactive::{
        BroadcastMode, Computed, Dict, DictOptions, Entry, LazyWatcher, List, ListOptions,
        Observable, Scheduler, Subscription, Value, ValueOptions, watch,
    };
}
