//! Event types, their runtime classes and the type hierarchy.
//!
//! ## Contents
//! - [`EventType`], [`Supertypes`] declaring event types and their supertypes
//! - [`Event`] object-safe view of an event value
//! - [`Class`] runtime type handle with memoized ancestor closure
//! - [`cast`] viewing an event as one of its (super)types
//!
//! ## Quick reference
//! ```text
//! struct Child { base: Base }          Class::of::<Child>()
//! impl EventType for Child {             ├─ supertypes(): [Base]
//!   extends(|c| &c.base)                 ├─ ancestors():  [Base, ..Base's ancestors]
//! }                                      └─ is_assignable_from(..)
//! ```

mod class;
mod event;

pub use class::Class;
pub use event::{cast, Event, EventType, Supertypes};
