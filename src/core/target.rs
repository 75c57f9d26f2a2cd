//! # Registration targets.
//!
//! What can be registered on a bus, and how a target is identified.
//!
//! ```text
//! Target::Method(m)          static method m              key: descriptor
//! Target::Type(S)            static methods of S          key: TypeId of S
//! Target::Object(Arc<S>)     instance methods of S bound  key: TypeId of S + Arc address
//!                            to this value
//! ```
//! An object target keeps its `Arc` alive while registered, so its address
//! cannot be reused by another value in the meantime.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::methods::{Method, MethodDescriptor, MethodTable, Receiver, Subscriber, TypeKey};

type TableFn = fn() -> Result<Arc<MethodTable>>;

/// Something that can be registered on an [`EventBus`](crate::EventBus).
#[derive(Clone)]
pub enum Target {
    /// A single method; contributes a listener only if it is static.
    Method(Method),
    /// A subscriber type; contributes its static methods.
    Type(TypeTarget),
    /// A subscriber value; contributes its instance methods bound to it.
    Object(ObjectTarget),
}

/// A subscriber type, see [`Target::of_type`].
#[derive(Clone)]
pub struct TypeTarget {
    key: TypeKey,
    table: TableFn,
}

/// A subscriber value, see [`Target::object`].
#[derive(Clone)]
pub struct ObjectTarget {
    key: TypeKey,
    receiver: Receiver,
    table: TableFn,
}

/// Identity of a registration target.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum TargetKey {
    Method(MethodDescriptor),
    Type(TypeId),
    Object(TypeId, usize),
}

impl Target {
    /// Target registering the static methods of `S`.
    pub fn of_type<S: Subscriber>() -> Self {
        Target::Type(TypeTarget {
            key: TypeKey::of::<S>(),
            table: MethodTable::of::<S>,
        })
    }

    /// Target registering the instance methods of `object`.
    pub fn object<S: Subscriber>(object: Arc<S>) -> Self {
        Target::Object(ObjectTarget {
            key: TypeKey::of::<S>(),
            receiver: object,
            table: MethodTable::of::<S>,
        })
    }

    pub(crate) fn key(&self) -> TargetKey {
        match self {
            Target::Method(method) => TargetKey::Method(method.descriptor().clone()),
            Target::Type(ty) => TargetKey::Type(ty.key.id()),
            Target::Object(object) => TargetKey::Object(object.key.id(), object.address()),
        }
    }
}

impl TypeTarget {
    pub(crate) fn table(&self) -> Result<Arc<MethodTable>> {
        (self.table)()
    }
}

impl ObjectTarget {
    pub(crate) fn table(&self) -> Result<Arc<MethodTable>> {
        (self.table)()
    }

    pub(crate) fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    fn address(&self) -> usize {
        Arc::as_ptr(&self.receiver) as *const () as usize
    }
}

impl From<Method> for Target {
    fn from(method: Method) -> Self {
        Target::Method(method)
    }
}

impl From<&Method> for Target {
    fn from(method: &Method) -> Self {
        Target::Method(method.clone())
    }
}

impl<S: Subscriber> From<Arc<S>> for Target {
    fn from(object: Arc<S>) -> Self {
        Target::object(object)
    }
}

impl<S: Subscriber> From<&Arc<S>> for Target {
    fn from(object: &Arc<S>) -> Self {
        Target::object(Arc::clone(object))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Method(method) => write!(f, "method {method}"),
            Target::Type(ty) => write!(f, "type {}", ty.key.name()),
            Target::Object(object) => write!(f, "object {}@{:#x}", object.key.name(), object.address()),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;
    use crate::methods::Methods;

    struct Ping;
    impl EventType for Ping {}

    struct Probe;
    impl Subscriber for Probe {
        fn declare<S: Subscriber>(m: &mut Methods<'_, S, Self>) {
            m.on_static("on_ping", |_: &Ping| {});
        }
    }

    #[test]
    fn test_object_identity_by_allocation() {
        let a = Arc::new(Probe);
        let b = Arc::new(Probe);
        assert_eq!(Target::from(&a).key(), Target::from(a.clone()).key());
        assert_ne!(Target::from(&a).key(), Target::from(&b).key());
    }

    #[test]
    fn test_type_and_method_keys() {
        assert_eq!(Target::of_type::<Probe>().key(), Target::of_type::<Probe>().key());
        assert_ne!(Target::of_type::<Probe>().key(), Target::from(Arc::new(Probe)).key());

        let m = Method::from_fn("f", |_: &Ping| {});
        assert_eq!(Target::from(&m).key(), Target::from(m.clone()).key());
        assert_ne!(Target::from(&m).key(), Target::from(Method::from_fn("f", |_: &Ping| {})).key());
    }

    #[test]
    fn test_display() {
        assert!(Target::of_type::<Probe>().to_string().starts_with("type "));
        assert!(Target::from(Arc::new(Probe)).to_string().starts_with("object "));
    }
}
