//! # Direct backend.
//!
//! Specializes each method once into a dedicated callable type that embeds
//! the call: the argument is cast to the parameter type and the method body
//! is called without any further indirection. Instance callables hold the
//! receiver already downcast to its concrete type.
//!
//! ```text
//! Method ──specialize──► DirectStatic<E, R, F>              (static)
//!                    └─► DirectConstructor<S, D, E, R, F>   (instance)
//!                            └─construct(receiver)─► DirectCallable { Arc<S>, .. }
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{BusError, Result};
use crate::events::{Event, EventType};
use crate::methods::{Method, MethodDescriptor, Outcome, Path, Receiver};

use super::callable::{argument, check_receiver, static_mismatch, Callable, CallableRef, Construct, Specialized};
use super::CallableFactory;

/// Backend that builds a specialized callable type per method.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectFactory;

impl CallableFactory for DirectFactory {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn build_static(&self, method: &Method) -> Result<CallableRef> {
        match method.body().specialize(method.descriptor()) {
            Specialized::Static(callable) if method.is_static() => Ok(callable),
            _ => Err(static_mismatch(method.descriptor(), true)),
        }
    }

    fn build_instance(&self, method: &Method) -> Result<Arc<dyn Construct>> {
        match method.body().specialize(method.descriptor()) {
            Specialized::Instance(constructor) if !method.is_static() => Ok(constructor),
            _ => Err(static_mismatch(method.descriptor(), false)),
        }
    }
}

pub(crate) fn direct_static<E, R, F>(f: Arc<F>) -> CallableRef
where
    E: EventType,
    R: Outcome,
    F: Fn(&E) -> R + Send + Sync + 'static,
{
    Arc::new(DirectStatic {
        f,
        _sig: PhantomData::<fn(&E) -> R>,
    })
}

pub(crate) fn direct_constructor<S, D, E, R, F>(
    descriptor: MethodDescriptor,
    path: Arc<dyn Path<S, D>>,
    f: Arc<F>,
) -> Arc<dyn Construct>
where
    S: Send + Sync + 'static,
    D: 'static,
    E: EventType,
    R: Outcome,
    F: Fn(&D, &E) -> R + Send + Sync + 'static,
{
    Arc::new(DirectConstructor {
        descriptor,
        path,
        f,
        _sig: PhantomData::<fn(&E) -> R>,
    })
}

struct DirectStatic<E, R, F> {
    f: Arc<F>,
    _sig: PhantomData<fn(&E) -> R>,
}

impl<E, R, F> Callable for DirectStatic<E, R, F>
where
    E: EventType,
    R: Outcome,
    F: Fn(&E) -> R + Send + Sync + 'static,
{
    fn invoke(&self, event: &dyn Event) -> Result<()> {
        (self.f)(argument::<E>(event)?)
            .into_result()
            .map_err(BusError::Listener)
    }
}

struct DirectConstructor<S, D, E, R, F> {
    descriptor: MethodDescriptor,
    path: Arc<dyn Path<S, D>>,
    f: Arc<F>,
    _sig: PhantomData<fn(&E) -> R>,
}

impl<S, D, E, R, F> Construct for DirectConstructor<S, D, E, R, F>
where
    S: Send + Sync + 'static,
    D: 'static,
    E: EventType,
    R: Outcome,
    F: Fn(&D, &E) -> R + Send + Sync + 'static,
{
    fn construct(&self, receiver: Option<&Receiver>) -> Result<CallableRef> {
        let receiver = check_receiver(&self.descriptor, receiver)?;
        let receiver = Arc::clone(receiver).downcast::<S>().map_err(|_| {
            BusError::Internal(format!("receiver check passed for `{}`", self.descriptor))
        })?;
        Ok(Arc::new(DirectCallable {
            receiver,
            path: Arc::clone(&self.path),
            f: Arc::clone(&self.f),
            _sig: PhantomData::<fn(&E) -> R>,
        }))
    }
}

struct DirectCallable<S, D, E, R, F> {
    receiver: Arc<S>,
    path: Arc<dyn Path<S, D>>,
    f: Arc<F>,
    _sig: PhantomData<fn(&E) -> R>,
}

impl<S, D, E, R, F> Callable for DirectCallable<S, D, E, R, F>
where
    S: Send + Sync + 'static,
    D: 'static,
    E: EventType,
    R: Outcome,
    F: Fn(&D, &E) -> R + Send + Sync + 'static,
{
    fn invoke(&self, event: &dyn Event) -> Result<()> {
        let arg = argument::<E>(event)?;
        (self.f)(self.path.resolve(&self.receiver), arg)
            .into_result()
            .map_err(BusError::Listener)
    }
}
