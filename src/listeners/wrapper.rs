//! # Listener wrapping policy.
//!
//! The bus never stores raw callables. Each one goes through a
//! [`ListenerWrapper`], which turns it into the bus's listener type `L` or
//! rejects it. Rejection is a silent skip, typically used to drop methods
//! that an override shadows.
//!
//! ## Rules
//! - A wrapper must be deterministic for a fixed input.
//! - `wrap_object` receives the descriptors of the inherited methods the
//!   registered method overrides; `wrap_static` never has any.
//!
//! ## Example
//! ```rust
//! use hierbus::{wrapper_fn, CallableRef, Class, ListenerWrapper, Method, EventType};
//!
//! struct Ping;
//! impl EventType for Ping {}
//!
//! struct Tagged { tag: &'static str, callable: CallableRef }
//!
//! let wrapper = wrapper_fn(|callable| Tagged { tag: "app", callable });
//! let method = Method::from_fn("on_ping", |_: &Ping| {});
//! # let callable = hierbus::FactoryCache::with_strategy(hierbus::Strategy::Dynamic)
//! #     .get(&method).unwrap().get(None).unwrap();
//! let tagged = wrapper
//!     .wrap_static(&Class::of::<Ping>(), callable, method.descriptor())
//!     .unwrap();
//! assert_eq!(tagged.tag, "app");
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::events::{Class, Event};
use crate::factory::CallableRef;
use crate::methods::{MethodDescriptor, Receiver};

/// A listener stored by the bus.
pub trait Handler: Send + Sync + 'static {
    /// Reacts to `event`.
    fn handle(&self, event: &dyn Event) -> Result<()>;
}

/// Default listener: a callable plus the method it came from.
pub struct Listener {
    callable: CallableRef,
    method: MethodDescriptor,
}

impl Listener {
    pub fn new(callable: CallableRef, method: MethodDescriptor) -> Self {
        Self { callable, method }
    }

    /// Method this listener was built from.
    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    pub fn callable(&self) -> &CallableRef {
        &self.callable
    }
}

impl Handler for Listener {
    fn handle(&self, event: &dyn Event) -> Result<()> {
        self.callable.invoke(event)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("method", &self.method).finish()
    }
}

/// Converts raw callables into listeners of type `L`.
pub trait ListenerWrapper<L>: Send + Sync {
    /// Wraps the callable of a static method registered for `class`.
    fn wrap_static(&self, class: &Class, callable: CallableRef, method: &MethodDescriptor)
        -> Option<L>;

    /// Wraps the callable of an instance method bound to `receiver`.
    fn wrap_object(
        &self,
        class: &Class,
        callable: CallableRef,
        method: &MethodDescriptor,
        receiver: &Receiver,
        overridden: &[MethodDescriptor],
    ) -> Option<L>;
}

impl<L, W: ListenerWrapper<L> + ?Sized> ListenerWrapper<L> for Arc<W> {
    fn wrap_static(&self, class: &Class, callable: CallableRef, method: &MethodDescriptor) -> Option<L> {
        (**self).wrap_static(class, callable, method)
    }

    fn wrap_object(
        &self,
        class: &Class,
        callable: CallableRef,
        method: &MethodDescriptor,
        receiver: &Receiver,
        overridden: &[MethodDescriptor],
    ) -> Option<L> {
        (**self).wrap_object(class, callable, method, receiver, overridden)
    }
}

impl<L, W: ListenerWrapper<L> + ?Sized> ListenerWrapper<L> for Box<W> {
    fn wrap_static(&self, class: &Class, callable: CallableRef, method: &MethodDescriptor) -> Option<L> {
        (**self).wrap_static(class, callable, method)
    }

    fn wrap_object(
        &self,
        class: &Class,
        callable: CallableRef,
        method: &MethodDescriptor,
        receiver: &Receiver,
        overridden: &[MethodDescriptor],
    ) -> Option<L> {
        (**self).wrap_object(class, callable, method, receiver, overridden)
    }
}

/// Wraps every callable into a [`Listener`], ignoring the metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainWrapper;

impl ListenerWrapper<Listener> for PlainWrapper {
    fn wrap_static(&self, _class: &Class, callable: CallableRef, method: &MethodDescriptor) -> Option<Listener> {
        Some(Listener::new(callable, method.clone()))
    }

    fn wrap_object(
        &self,
        _class: &Class,
        callable: CallableRef,
        method: &MethodDescriptor,
        _receiver: &Receiver,
        _overridden: &[MethodDescriptor],
    ) -> Option<Listener> {
        Some(Listener::new(callable, method.clone()))
    }
}

/// Wrapper built from a mapping function; see [`wrapper_fn`].
pub struct FnWrapper<F> {
    map: F,
}

/// Creates a wrapper that maps every callable through `map`.
pub fn wrapper_fn<L, F>(map: F) -> FnWrapper<F>
where
    F: Fn(CallableRef) -> L + Send + Sync,
{
    FnWrapper { map }
}

impl<L, F> ListenerWrapper<L> for FnWrapper<F>
where
    F: Fn(CallableRef) -> L + Send + Sync,
{
    fn wrap_static(&self, _class: &Class, callable: CallableRef, _method: &MethodDescriptor) -> Option<L> {
        Some((self.map)(callable))
    }

    fn wrap_object(
        &self,
        _class: &Class,
        callable: CallableRef,
        _method: &MethodDescriptor,
        _receiver: &Receiver,
        _overridden: &[MethodDescriptor],
    ) -> Option<L> {
        Some((self.map)(callable))
    }
}

impl<F> fmt::Debug for FnWrapper<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnWrapper")
    }
}
