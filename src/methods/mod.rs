//! Listener methods and the subscriber types that declare them.
//!
//! ## Contents
//! - [`Subscriber`], [`Methods`] declaring listener methods (own and inherited)
//! - [`MethodTable`] memoized, override-resolved methods of a subscriber type
//! - [`Method`], [`MethodDescriptor`] one listener method and its identity
//! - [`Outcome`] return types accepted from listener methods
//!
//! ## Quick reference
//! ```text
//! Subscriber::declare ──► Methods { on, on_static, inherit }
//!                              │ resolve (nearest signature wins)
//!                              ▼
//!                         MethodTable ──► Method ──► MethodDescriptor (cache key)
//!                                            └─────► MethodBody (call / specialize)
//! ```

mod descriptor;
mod method;
mod table;

pub use descriptor::{MethodDescriptor, TypeKey};
pub use method::{Method, Outcome, Receiver};
pub use table::{MethodTable, Methods, Subscriber};

pub(crate) use method::{MethodBody, Path};
