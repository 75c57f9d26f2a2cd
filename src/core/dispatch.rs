//! # Bus abstraction.
//!
//! [`Bus`] is the surface of [`EventBus`] as a trait, so decorators can
//! stand in for a bus: wrap one, intercept what they need and forward the
//! rest. `Arc<B>`, `Box<B>` and `&B` forward to `B`.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use hierbus::{Bus, BusError, Class, Event, EventBus, EventType, ListenerList, Target};
//!
//! struct Ping;
//! impl EventType for Ping {}
//!
//! /// Counts fired events before forwarding them.
//! struct Counted<B> { inner: B, fired: AtomicUsize }
//!
//! impl<B: Bus> Bus for Counted<B> {
//!     type Listener = B::Listener;
//!
//!     fn register(&self, target: Target) -> Result<usize, BusError> { self.inner.register(target) }
//!     fn unregister(&self, target: Target) -> bool { self.inner.unregister(target) }
//!     fn fire(&self, class: &Class, event: &dyn Event) -> Result<(), BusError> {
//!         self.fired.fetch_add(1, Ordering::Relaxed);
//!         self.inner.fire(class, event)
//!     }
//!     fn get_list(&self, class: &Class) -> Result<ListenerList<'_, B::Listener>, BusError> {
//!         self.inner.get_list(class)
//!     }
//! }
//!
//! let bus = Counted { inner: EventBus::new(Class::of::<Ping>()), fired: AtomicUsize::new(0) };
//! bus.post(&Ping)?;
//! assert_eq!(bus.fired.load(Ordering::Relaxed), 1);
//! # Ok::<(), BusError>(())
//! ```

use std::sync::Arc;

use crate::error::Result;
use crate::events::{Class, Event, EventType};
use crate::listeners::{Handler, ListenerList};

use super::bus::EventBus;
use super::target::Target;

/// Registration and dispatch over an event type hierarchy.
pub trait Bus: Send + Sync {
    /// Listener type stored in the bus's lists.
    type Listener: Handler;

    /// Registers the listener methods of `target`; see [`EventBus::register`].
    fn register(&self, target: Target) -> Result<usize>;

    /// Removes every listener `target` contributed; see [`EventBus::unregister`].
    fn unregister(&self, target: Target) -> bool;

    /// Fires `event` as an event of type `class`; see [`EventBus::fire`].
    fn fire(&self, class: &Class, event: &dyn Event) -> Result<()>;

    /// Listener list of `class`; see [`EventBus::get_list`].
    fn get_list(&self, class: &Class) -> Result<ListenerList<'_, Self::Listener>>;

    /// Fires `event` as its own type.
    fn post<E: EventType>(&self, event: &E) -> Result<()>
    where
        Self: Sized,
    {
        self.fire(&Class::of::<E>(), event)
    }
}

impl<L: Handler> Bus for EventBus<L> {
    type Listener = L;

    fn register(&self, target: Target) -> Result<usize> {
        EventBus::register(self, target)
    }

    fn unregister(&self, target: Target) -> bool {
        EventBus::unregister(self, target)
    }

    fn fire(&self, class: &Class, event: &dyn Event) -> Result<()> {
        EventBus::fire(self, class, event)
    }

    fn get_list(&self, class: &Class) -> Result<ListenerList<'_, L>> {
        EventBus::get_list(self, class)
    }
}

impl<B: Bus + ?Sized> Bus for Arc<B> {
    type Listener = B::Listener;

    fn register(&self, target: Target) -> Result<usize> {
        (**self).register(target)
    }

    fn unregister(&self, target: Target) -> bool {
        (**self).unregister(target)
    }

    fn fire(&self, class: &Class, event: &dyn Event) -> Result<()> {
        (**self).fire(class, event)
    }

    fn get_list(&self, class: &Class) -> Result<ListenerList<'_, B::Listener>> {
        (**self).get_list(class)
    }
}

impl<B: Bus + ?Sized> Bus for Box<B> {
    type Listener = B::Listener;

    fn register(&self, target: Target) -> Result<usize> {
        (**self).register(target)
    }

    fn unregister(&self, target: Target) -> bool {
        (**self).unregister(target)
    }

    fn fire(&self, class: &Class, event: &dyn Event) -> Result<()> {
        (**self).fire(class, event)
    }

    fn get_list(&self, class: &Class) -> Result<ListenerList<'_, B::Listener>> {
        (**self).get_list(class)
    }
}

impl<B: Bus + ?Sized> Bus for &B {
    type Listener = B::Listener;

    fn register(&self, target: Target) -> Result<usize> {
        (**self).register(target)
    }

    fn unregister(&self, target: Target) -> bool {
        (**self).unregister(target)
    }

    fn fire(&self, class: &Class, event: &dyn Event) -> Result<()> {
        (**self).fire(class, event)
    }

    fn get_list(&self, class: &Class) -> Result<ListenerList<'_, B::Listener>> {
        (**self).get_list(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::BusError;
    use crate::listeners::Listener;
    use crate::methods::Method;

    struct Tick {
        n: usize,
    }
    impl EventType for Tick {}

    struct Other;
    impl EventType for Other {}

    /// Drops events whose `n` is odd, forwards everything else.
    struct EvenOnly<B> {
        inner: B,
        dropped: AtomicUsize,
    }

    impl<B: Bus> Bus for EvenOnly<B> {
        type Listener = B::Listener;

        fn register(&self, target: Target) -> Result<usize> {
            self.inner.register(target)
        }

        fn unregister(&self, target: Target) -> bool {
            self.inner.unregister(target)
        }

        fn fire(&self, class: &Class, event: &dyn Event) -> Result<()> {
            if crate::events::cast::<Tick>(event).is_some_and(|t| t.n % 2 == 1) {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                return Ok(());
            }
            self.inner.fire(class, event)
        }

        fn get_list(&self, class: &Class) -> Result<ListenerList<'_, B::Listener>> {
            self.inner.get_list(class)
        }
    }

    fn tally() -> (Method, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let method = Method::from_fn("tally", move |t: &Tick| {
            seen.fetch_add(t.n, Ordering::SeqCst);
        });
        (method, hits)
    }

    #[test]
    fn test_decorator_intercepts_fire() {
        let bus = EvenOnly {
            inner: EventBus::new(Class::of::<Tick>()),
            dropped: AtomicUsize::new(0),
        };
        let (method, hits) = tally();
        assert_eq!(bus.register(Target::from(&method)).unwrap(), 1);

        for n in 1..=4 {
            bus.post(&Tick { n }).unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2 + 4);
        assert_eq!(bus.dropped.load(Ordering::SeqCst), 2);
        assert_eq!(bus.get_list(&Class::of::<Tick>()).unwrap().len(), 1);

        assert!(bus.unregister(Target::from(&method)));
        bus.post(&Tick { n: 2 }).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_forwarding_through_pointers() {
        let shared: Arc<dyn Bus<Listener = Listener>> = Arc::new(EventBus::new(Class::of::<Tick>()));
        let boxed: Box<dyn Bus<Listener = Listener>> = Box::new(EventBus::new(Class::of::<Tick>()));
        let (method, hits) = tally();

        assert_eq!(shared.register(Target::from(&method)).unwrap(), 1);
        assert_eq!(boxed.register(Target::from(&method)).unwrap(), 1);
        shared.post(&Tick { n: 1 }).unwrap();
        boxed.post(&Tick { n: 10 }).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 11);

        let err = shared.fire(&Class::of::<Other>(), &Other).unwrap_err();
        assert!(matches!(err, BusError::OutsideBase { .. }));
    }
}
