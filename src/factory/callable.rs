//! # Uniform invocation capability.
//!
//! Whatever backend built it, a listener is invoked through [`Callable`].
//! A [`ListenerFactory`] hands out callables: the same one for a static
//! method, a freshly bound one per receiver for an instance method.
//!
//! ## Rules
//! - Receivers are validated when the callable is constructed, never at
//!   invocation time.
//! - Errors from listener code pass through `invoke` untouched.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{BusError, Result};
use crate::events::{cast, Event, EventType};
use crate::methods::{MethodDescriptor, Receiver};

/// Normalized one-argument invocation of a listener method.
pub trait Callable: Send + Sync {
    /// Invokes the method with `event` as its argument.
    fn invoke(&self, event: &dyn Event) -> Result<()>;
}

/// Shared handle to a [`Callable`].
pub type CallableRef = Arc<dyn Callable>;

/// Builds a callable bound to one receiver.
pub trait Construct: Send + Sync {
    /// Binds the method to `receiver`.
    ///
    /// Fails with [`BusError::MissingReceiver`] or
    /// [`BusError::ReceiverMismatch`] if the receiver is absent or of the
    /// wrong type.
    fn construct(&self, receiver: Option<&Receiver>) -> Result<CallableRef>;
}

/// Produces callables for one method.
#[derive(Clone)]
pub enum ListenerFactory {
    /// Static method: the receiver is ignored.
    Constant(CallableRef),
    /// Instance method: each receiver gets its own callable.
    Bound(Arc<dyn Construct>),
}

impl ListenerFactory {
    /// Returns a callable for `receiver`.
    pub fn get(&self, receiver: Option<&Receiver>) -> Result<CallableRef> {
        match self {
            ListenerFactory::Constant(callable) => Ok(Arc::clone(callable)),
            ListenerFactory::Bound(constructor) => constructor.construct(receiver),
        }
    }

    /// True for the [`ListenerFactory::Bound`] shape.
    pub fn is_bound(&self) -> bool {
        matches!(self, ListenerFactory::Bound(_))
    }
}

impl fmt::Debug for ListenerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerFactory::Constant(_) => f.write_str("ListenerFactory::Constant"),
            ListenerFactory::Bound(_) => f.write_str("ListenerFactory::Bound"),
        }
    }
}

/// Monomorphized form of a method body, produced for the direct backend.
pub(crate) enum Specialized {
    Static(CallableRef),
    Instance(Arc<dyn Construct>),
}

/// Casts the invocation argument to the declared parameter type.
pub(crate) fn argument<E: EventType>(event: &dyn Event) -> Result<&E> {
    cast::<E>(event).ok_or_else(|| BusError::NotInstance {
        expected: std::any::type_name::<E>(),
        actual: event.class().name(),
    })
}

/// Checks that `receiver` is present and is a value of the method's owner type.
pub(crate) fn check_receiver<'r>(
    method: &MethodDescriptor,
    receiver: Option<&'r Receiver>,
) -> Result<&'r Receiver> {
    let receiver = receiver.ok_or_else(|| BusError::MissingReceiver {
        method: method.to_string(),
    })?;
    let actual = Any::type_id(&**receiver);
    if actual != method.owner().id() {
        return Err(BusError::ReceiverMismatch {
            method: method.to_string(),
            expected: method.owner().name(),
            actual: format!("{actual:?}"),
        });
    }
    Ok(receiver)
}

pub(crate) fn static_mismatch(method: &MethodDescriptor, wanted_static: bool) -> BusError {
    let reason = if wanted_static {
        "instance method cannot be built as a static callable"
    } else {
        "static method cannot be built as an instance constructor"
    };
    BusError::Synthesis {
        method: method.to_string(),
        reason: reason.to_string(),
    }
}
