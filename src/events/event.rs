//! # Event types and event values.
//!
//! An event type is any `Send + Sync + 'static` type implementing
//! [`EventType`]. A type names its direct supertypes in
//! [`EventType::supertypes`]; each supertype comes with a projection that
//! borrows the supertype part out of a subtype value. Several supertypes may
//! be declared, which plays the role interfaces play in class hierarchies.
//!
//! [`Event`] is the object-safe view of an event value used when firing.
//!
//! ## Example
//! ```rust
//! use hierbus::{cast, Event, EventType, Supertypes};
//!
//! struct Message { text: String }
//! impl EventType for Message {}
//!
//! struct Reply { message: Message, to: u64 }
//! impl EventType for Reply {
//!     fn supertypes(types: &mut Supertypes<Self>) {
//!         types.extends(|r: &Reply| &r.message);
//!     }
//! }
//!
//! let reply = Reply { message: Message { text: "hi".into() }, to: 7 };
//! let event: &dyn Event = &reply;
//! assert_eq!(cast::<Message>(event).map(|m| m.text.as_str()), Some("hi"));
//! assert_eq!(cast::<Reply>(event).map(|r| r.to), Some(7));
//! ```

use std::any::{Any, TypeId};
use std::marker::PhantomData;

use super::class::{Class, Projection, SuperEdge};

/// A type that can be fired on a bus.
pub trait EventType: Any + Send + Sync + Sized {
    /// Declares the direct supertypes of this type.
    ///
    /// Called once per process, the first time the type's [`Class`] is needed.
    /// The default declares none.
    fn supertypes(types: &mut Supertypes<Self>) {
        let _ = types;
    }
}

/// Collects the direct supertypes of `T`.
pub struct Supertypes<T> {
    edges: Vec<SuperEdge>,
    _owner: PhantomData<fn(&T)>,
}

impl<T: EventType> Supertypes<T> {
    pub(crate) fn new() -> Self {
        Self {
            edges: Vec::new(),
            _owner: PhantomData,
        }
    }

    /// Declares `P` as a direct supertype; `project` borrows the `P` part of a `T`.
    ///
    /// Declaring `T` as its own supertype is ignored.
    pub fn extends<P: EventType>(&mut self, project: fn(&T) -> &P) -> &mut Self {
        if TypeId::of::<P>() != TypeId::of::<T>() {
            self.edges.push(SuperEdge {
                class: Class::of::<P>(),
                projection: Box::new(FieldProjection { project }),
            });
        }
        self
    }

    pub(crate) fn into_edges(self) -> Vec<SuperEdge> {
        self.edges
    }
}

struct FieldProjection<T, P> {
    project: fn(&T) -> &P,
}

impl<T: Any, P: Any> Projection for FieldProjection<T, P> {
    fn project<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any> {
        let value = value.downcast_ref::<T>()?;
        Some((self.project)(value))
    }
}

/// Object-safe view of an event value.
///
/// Implemented for every [`EventType`]; there is no need to implement it by hand.
pub trait Event: Any + Send + Sync {
    /// Runtime class of this value.
    fn class(&self) -> Class;

    /// The value as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
}

impl<T: EventType> Event for T {
    fn class(&self) -> Class {
        Class::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Views `event` as an `E`, following supertype projections when the
/// runtime type is a subtype of `E`.
pub fn cast<E: EventType>(event: &dyn Event) -> Option<&E> {
    let any = event.as_any();
    if let Some(direct) = any.downcast_ref::<E>() {
        return Some(direct);
    }
    event
        .class()
        .project(any, TypeId::of::<E>())?
        .downcast_ref::<E>()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Base {
        id: u32,
    }
    impl EventType for Base {}

    struct Named {
        name: &'static str,
    }
    impl EventType for Named {}

    struct Child {
        base: Base,
        named: Named,
    }
    impl EventType for Child {
        fn supertypes(types: &mut Supertypes<Self>) {
            types
                .extends(|c: &Child| &c.base)
                .extends(|c: &Child| &c.named)
                .extends(|c: &Child| c);
        }
    }

    struct Unrelated;
    impl EventType for Unrelated {}

    #[test]
    fn test_cast_direct_and_up() {
        let child = Child {
            base: Base { id: 3 },
            named: Named { name: "n" },
        };
        let ev: &dyn Event = &child;

        assert_eq!(cast::<Base>(ev).map(|b| b.id), Some(3));
        assert_eq!(cast::<Named>(ev).map(|n| n.name), Some("n"));
        assert!(cast::<Child>(ev).is_some());
        assert!(cast::<Unrelated>(ev).is_none());
    }

    #[test]
    fn test_cast_down_fails() {
        let base = Base { id: 1 };
        assert!(cast::<Child>(&base).is_none());
    }

    #[test]
    fn test_self_edge_is_ignored() {
        let class = Class::of::<Child>();
        assert_eq!(class.supertypes().len(), 2);
        assert!(!class.ancestors().contains(&class));
    }

    #[test]
    fn test_event_class() {
        let ev: &dyn Event = &Unrelated;
        assert_eq!(ev.class(), Class::of::<Unrelated>());
    }
}
