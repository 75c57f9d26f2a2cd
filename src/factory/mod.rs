//! Turning listener methods into uniform callables.
//!
//! ## Contents
//! - [`Callable`], [`CallableRef`] the normalized invocation capability
//! - [`ListenerFactory`], [`Construct`] per-method producers of callables
//! - [`CallableFactory`] backend interface with two implementations:
//!   [`DirectFactory`] and [`DynamicFactory`] (default), selected by [`Strategy`]
//! - [`FactoryCache`] at-most-once memoization of factories per method
//!
//! ## Quick reference
//! ```text
//! Method ──► FactoryCache::get ──► ListenerFactory::{Constant, Bound}
//!                 │ miss                     │ get(receiver?)
//!                 ▼                          ▼
//!        CallableFactory::build_*       CallableRef::invoke(event)
//! ```

mod cache;
mod callable;
mod direct;
mod dynamic;
mod strategy;

use std::sync::Arc;

use crate::error::Result;
use crate::methods::Method;

pub use cache::FactoryCache;
pub use callable::{Callable, CallableRef, Construct, ListenerFactory};
pub use direct::DirectFactory;
pub use dynamic::DynamicFactory;
pub use strategy::Strategy;

pub(crate) use callable::{argument, Specialized};
pub(crate) use direct::{direct_constructor, direct_static};

/// Backend that builds callables for listener methods.
///
/// Building happens once per method (see [`FactoryCache`]); failures are
/// configuration errors reported at registration time.
pub trait CallableFactory: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Builds the single callable of a static method.
    fn build_static(&self, method: &Method) -> Result<CallableRef>;

    /// Builds the receiver-binding constructor of an instance method.
    fn build_instance(&self, method: &Method) -> Result<Arc<dyn Construct>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::events::{EventType, Supertypes};
    use crate::methods::{MethodTable, Methods, Receiver, Subscriber};

    struct Base {
        n: usize,
    }
    impl EventType for Base {}

    struct Child {
        base: Base,
    }
    impl EventType for Child {
        fn supertypes(types: &mut Supertypes<Self>) {
            types.extends(|c: &Child| &c.base);
        }
    }

    #[derive(Default)]
    struct Sum {
        total: AtomicUsize,
    }
    impl Subscriber for Sum {
        fn declare<S: Subscriber>(m: &mut Methods<'_, S, Self>) {
            m.on("add", |this: &Sum, e: &Base| {
                this.total.fetch_add(e.n, Ordering::SeqCst);
            })
            .on_static("noop", |_: &Base| {});
        }
    }

    fn backends() -> [Arc<dyn CallableFactory>; 2] {
        [Arc::new(DirectFactory), Arc::new(DynamicFactory)]
    }

    #[test]
    fn test_backends_agree() {
        for backend in backends() {
            let table = MethodTable::of::<Sum>().unwrap();
            let add = table.find("add").unwrap();
            let sum = Arc::new(Sum::default());
            let receiver: Receiver = sum.clone();

            let callable = backend.build_instance(add).unwrap().construct(Some(&receiver)).unwrap();
            callable.invoke(&Base { n: 2 }).unwrap();
            callable.invoke(&Child { base: Base { n: 5 } }).unwrap();
            assert_eq!(sum.total.load(Ordering::SeqCst), 7, "{}", backend.name());
        }
    }

    #[test]
    fn test_backends_reject_shape_mismatch() {
        for backend in backends() {
            let table = MethodTable::of::<Sum>().unwrap();
            let add = table.find("add").unwrap();
            let noop = table.find("noop").unwrap();

            let err = backend.build_static(add).err().unwrap();
            assert_eq!(err.as_label(), "bus_synthesis_failed");
            let err = backend.build_instance(noop).err().unwrap();
            assert_eq!(err.as_label(), "bus_synthesis_failed");
        }
    }

    #[test]
    fn test_invoke_rejects_foreign_event() {
        struct Other;
        impl EventType for Other {}

        for backend in backends() {
            let table = MethodTable::of::<Sum>().unwrap();
            let callable = backend.build_static(table.find("noop").unwrap()).unwrap();
            let err = callable.invoke(&Other).unwrap_err();
            assert_eq!(err.as_label(), "bus_not_instance");
        }
    }
}
