//! # Listener methods.
//!
//! A [`Method`] is a descriptor plus a type-erased body. The body keeps the
//! concrete closure type alive behind [`MethodBody`], which offers the two
//! shapes the callable factories need:
//!
//! ```text
//!               ┌─ call(receiver?, event)   erased entry point (dynamic backend)
//! MethodBody ───┤
//!               └─ specialize(descriptor)   monomorphized unit (direct backend)
//! ```
//!
//! Instance bodies reach their declaring type through a [`Path`] from the
//! owner (receiver) type; for inherited methods the path follows the
//! projections given to `Methods::inherit`.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BoxError, BusError, Result};
use crate::events::{Class, Event, EventType};
use crate::factory::{self, ListenerFactory, Specialized};

use super::descriptor::{MethodDescriptor, TypeKey};

/// Erased receiver of an instance method.
pub type Receiver = Arc<dyn Any + Send + Sync>;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Return types accepted from listener methods.
///
/// Implemented for `()` and for `Result<(), E>` where `E` converts into a
/// boxed error; the error reaches the caller of `fire` unmodified.
pub trait Outcome: 'static {
    /// Converts the return value into the uniform result.
    fn into_result(self) -> std::result::Result<(), BoxError>;
}

impl Outcome for () {
    fn into_result(self) -> std::result::Result<(), BoxError> {
        Ok(())
    }
}

impl<E> Outcome for std::result::Result<(), E>
where
    E: Into<BoxError> + 'static,
{
    fn into_result(self) -> std::result::Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

/// Borrows the declaring-type part `D` out of an owner value `S`.
pub(crate) trait Path<S, D>: Send + Sync {
    fn resolve<'a>(&self, owner: &'a S) -> &'a D;
}

/// The owner itself.
pub(crate) struct Root;

impl<S> Path<S, S> for Root {
    fn resolve<'a>(&self, owner: &'a S) -> &'a S {
        owner
    }
}

/// One inheritance step below an existing path.
pub(crate) struct Step<S, M, D> {
    pub(crate) parent: Arc<dyn Path<S, M>>,
    pub(crate) project: fn(&M) -> &D,
}

impl<S: 'static, M: 'static, D: 'static> Path<S, D> for Step<S, M, D> {
    fn resolve<'a>(&self, owner: &'a S) -> &'a D {
        (self.project)(self.parent.resolve(owner))
    }
}

/// Type-erased listener method body.
pub(crate) trait MethodBody: Send + Sync {
    /// Invokes the method through the erased entry point.
    fn call(&self, receiver: Option<&(dyn Any + Send + Sync)>, event: &dyn Event) -> Result<()>;

    /// Produces the monomorphized form of the method.
    fn specialize(&self, descriptor: &MethodDescriptor) -> Specialized;
}

pub(crate) struct StaticBody<E, R, F> {
    f: Arc<F>,
    _sig: PhantomData<fn(&E) -> R>,
}

impl<E, R, F> StaticBody<E, R, F> {
    pub(crate) fn new(f: F) -> Self {
        Self {
            f: Arc::new(f),
            _sig: PhantomData,
        }
    }
}

impl<E, R, F> MethodBody for StaticBody<E, R, F>
where
    E: EventType,
    R: Outcome,
    F: Fn(&E) -> R + Send + Sync + 'static,
{
    fn call(&self, _receiver: Option<&(dyn Any + Send + Sync)>, event: &dyn Event) -> Result<()> {
        let arg = factory::argument::<E>(event)?;
        (self.f)(arg).into_result().map_err(BusError::Listener)
    }

    fn specialize(&self, _descriptor: &MethodDescriptor) -> Specialized {
        Specialized::Static(factory::direct_static::<E, R, F>(Arc::clone(&self.f)))
    }
}

pub(crate) struct InstanceBody<S, D, E, R, F> {
    path: Arc<dyn Path<S, D>>,
    f: Arc<F>,
    _sig: PhantomData<fn(&D, &E) -> R>,
}

impl<S, D, E, R, F> InstanceBody<S, D, E, R, F> {
    pub(crate) fn new(path: Arc<dyn Path<S, D>>, f: F) -> Self {
        Self {
            path,
            f: Arc::new(f),
            _sig: PhantomData,
        }
    }
}

impl<S, D, E, R, F> MethodBody for InstanceBody<S, D, E, R, F>
where
    S: Any + Send + Sync,
    D: 'static,
    E: EventType,
    R: Outcome,
    F: Fn(&D, &E) -> R + Send + Sync + 'static,
{
    fn call(&self, receiver: Option<&(dyn Any + Send + Sync)>, event: &dyn Event) -> Result<()> {
        let arg = factory::argument::<E>(event)?;
        let owner = receiver
            .and_then(|r| r.downcast_ref::<S>())
            .ok_or_else(|| {
                BusError::Internal(format!(
                    "receiver bound to `{}` lost its type",
                    std::any::type_name::<S>()
                ))
            })?;
        (self.f)(self.path.resolve(owner), arg)
            .into_result()
            .map_err(BusError::Listener)
    }

    fn specialize(&self, descriptor: &MethodDescriptor) -> Specialized {
        Specialized::Instance(factory::direct_constructor::<S, D, E, R, F>(
            descriptor.clone(),
            Arc::clone(&self.path),
            Arc::clone(&self.f),
        ))
    }
}

struct MethodInner {
    descriptor: MethodDescriptor,
    overridden: Box<[MethodDescriptor]>,
    body: Arc<dyn MethodBody>,
    /// Factories built for a free method, keyed by factory cache id.
    factories: Mutex<Vec<(u64, ListenerFactory)>>,
}

/// A listener method: descriptor plus invocable body.
///
/// Cheap to clone. Obtained from a subscriber's
/// [`MethodTable`](crate::MethodTable) or built from a free function with
/// [`Method::from_fn`].
#[derive(Clone)]
pub struct Method(Arc<MethodInner>);

impl Method {
    pub(crate) fn new(
        descriptor: MethodDescriptor,
        body: Arc<dyn MethodBody>,
        overridden: Vec<MethodDescriptor>,
    ) -> Self {
        Method(Arc::new(MethodInner {
            descriptor,
            overridden: overridden.into_boxed_slice(),
            body,
            factories: Mutex::new(Vec::new()),
        }))
    }

    /// Builds a static method from a free function or closure.
    ///
    /// Every call produces a method with its own identity, so registering
    /// two results of `from_fn` registers two listeners. Callables built for
    /// it are kept on the method and released with its last handle.
    ///
    /// # Example
    /// ```
    /// use hierbus::{EventType, Method};
    ///
    /// struct Ping;
    /// impl EventType for Ping {}
    ///
    /// let m = Method::from_fn("on_ping", |_: &Ping| {});
    /// assert!(m.is_static());
    /// assert_eq!(m.name(), "on_ping");
    /// ```
    pub fn from_fn<E, R, F>(name: &'static str, f: F) -> Method
    where
        E: EventType,
        R: Outcome,
        F: Fn(&E) -> R + Send + Sync + 'static,
    {
        let key = TypeKey::of::<F>();
        let descriptor = MethodDescriptor::new(
            key,
            key,
            name,
            Class::of::<E>(),
            true,
            std::any::type_name::<R>(),
        )
        .with_serial(NEXT_SERIAL.fetch_add(1, Ordering::Relaxed));
        Method::new(descriptor, Arc::new(StaticBody::<E, R, F>::new(f)), Vec::new())
    }

    /// Descriptor of this method.
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.0.descriptor
    }

    /// Descriptors of the inherited methods this one overrides.
    pub fn overridden(&self) -> &[MethodDescriptor] {
        &self.0.overridden
    }

    /// Method name.
    pub fn name(&self) -> &'static str {
        self.0.descriptor.name()
    }

    /// True for methods without a receiver.
    pub fn is_static(&self) -> bool {
        self.0.descriptor.is_static()
    }

    /// True if the method's owner is `T`.
    pub fn is_owned_by<T: ?Sized + 'static>(&self) -> bool {
        self.0.descriptor.owner().id() == TypeId::of::<T>()
    }

    pub(crate) fn body(&self) -> &Arc<dyn MethodBody> {
        &self.0.body
    }

    pub(crate) fn factories(&self) -> &Mutex<Vec<(u64, ListenerFactory)>> {
        &self.0.factories
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.0.descriptor == other.0.descriptor
    }
}

impl Eq for Method {}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("descriptor", &self.0.descriptor)
            .field("overridden", &self.0.overridden.len())
            .finish()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.descriptor, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Ping(u32);
    impl EventType for Ping {}

    struct Pong;
    impl EventType for Pong {}

    #[derive(Debug, thiserror::Error)]
    #[error("rejected {0}")]
    struct Rejected(u32);

    #[test]
    fn test_from_fn_identity() {
        let a = Method::from_fn("f", |_: &Ping| {});
        let b = a.clone();
        let c = Method::from_fn("f", |_: &Ping| {});
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.descriptor().param(), &Class::of::<Ping>());
        assert_eq!(a.descriptor().returns(), "()");
    }

    #[test]
    fn test_static_body_call() {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let m = Method::from_fn("count", move |p: &Ping| {
            seen.fetch_add(p.0 as usize, Ordering::SeqCst);
        });

        m.body().call(None, &Ping(4)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_body_rejects_wrong_argument() {
        let m = Method::from_fn("count", |_: &Ping| {});
        let err = m.body().call(None, &Pong).unwrap_err();
        assert_eq!(err.as_label(), "bus_not_instance");
    }

    #[test]
    fn test_listener_error_is_returned() {
        let m = Method::from_fn("reject", |p: &Ping| -> std::result::Result<(), Rejected> {
            Err(Rejected(p.0))
        });
        let err = m.body().call(None, &Ping(9)).unwrap_err();
        let inner = err.into_listener_error().unwrap();
        assert_eq!(inner.downcast_ref::<Rejected>().map(|r| r.0), Some(9));
    }

    #[test]
    fn test_path_steps() {
        struct Outer {
            inner: Inner,
        }
        struct Inner {
            value: u8,
        }

        let root: Arc<dyn Path<Outer, Outer>> = Arc::new(Root);
        let step: Step<Outer, Outer, Inner> = Step {
            parent: root,
            project: |o: &Outer| &o.inner,
        };
        let outer = Outer {
            inner: Inner { value: 5 },
        };
        assert_eq!(step.resolve(&outer).value, 5);
    }
}
