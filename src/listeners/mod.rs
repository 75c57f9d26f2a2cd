//! Listener wrapping and the per-type listener lists of a bus.
//!
//! ## Contents
//! - [`Handler`], [`Listener`] listeners as stored and invoked by the bus
//! - [`ListenerWrapper`], [`PlainWrapper`], [`wrapper_fn`] turning callables into listeners
//! - [`ListenerList`], [`Snapshot`], [`CacheTransform`] hierarchical lists with cached snapshots
//!
//! ## Quick reference
//! ```text
//! CallableRef ──ListenerWrapper──► Option<L> ──► ListenerList(param type).add
//! fire(type) ──► ListenerList(type).get_cache() ──► [own.., ancestors'..]
//! ```

mod list;
mod wrapper;

pub use list::{CacheTransform, ListenerList, Snapshot};
pub use wrapper::{wrapper_fn, FnWrapper, Handler, Listener, ListenerWrapper, PlainWrapper};

pub(crate) use list::ListenerTable;
