#![forbid(unsafe_code)]

//! Lazy observable primitives for weft.
//!
//! This crate is the reactive half of the workspace: values, derived
//! values, and containers that can be read at any time and listened to
//! while someone cares. The central contract is laziness — an observable
//! with no listeners performs no upstream work at all. Subscriptions are
//! engaged on the 0→1 listener edge and released on the 1→0 edge, all the
//! way up a chain of derived observables.
//!
//! - [`Value`] — settable leaf cell.
//! - [`Computed`] — lazily derived value over one or two sources.
//! - [`Dict`] / [`List`] — keyed and ordered containers whose members may
//!   themselves be observables.
//! - [`LazyWatcher`] — the listener-lifecycle state machine under all of
//!   the above, available for building custom observables.
//! - [`Scheduler`] — cooperative tick/idle task queues that deferred
//!   broadcast modes flush on.
//!
//! Everything is single-threaded: shared state is `Rc<RefCell<_>>`, and
//! listener closures hold weak back-edges so queues never keep dead
//! observables alive.
//!
//! # Example
//!
//! ```
//! use weft_reactive::{Computed, Value};
//!
//! let count = Value::new(1);
//! let label = Computed::map(&count, |c| format!("count: {c}"));
//!
//! // Nobody listens yet, so `count` has no subscribers.
//! assert_eq!(count.listener_count(), 0);
//!
//! let sub = label.observe(|text| println!("{text}"));
//! assert_eq!(count.listener_count(), 1);
//!
//! count.set(2);
//! assert_eq!(label.get(), "count: 2");
//!
//! drop(sub);
//! assert_eq!(count.listener_count(), 0);
//! ```

pub mod computed;
pub mod dict;
pub mod entry;
pub mod list;
pub mod observable;
pub mod schedule;
pub mod value;
pub mod watcher;

pub use computed::Computed;
pub use dict::{Dict, DictOptions};
pub use entry::Entry;
pub use list::{List, ListOptions};
pub use observable::{BoxedListener, DynObservable, Observable, Subscription, watch};
pub use schedule::Scheduler;
pub use value::{Value, ValueOptions};
pub use watcher::{BroadcastMode, Comparer, LazyWatcher, WatcherHooks, WeakWatcher, default_comparer};
