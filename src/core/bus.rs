//! # Event bus - registration and synchronous dispatch.
//!
//! [`EventBus`] ties the pieces together: it enumerates a target's listener
//! methods, obtains callables from the [`FactoryCache`], wraps them with the
//! [`ListenerWrapper`], and files each listener under the event type its
//! method takes. `fire` reads the cached snapshot for the fired type and
//! invokes it in order on the calling thread.
//!
//! ## Architecture
//! ```text
//! register(target)                          (no-op if already registered)
//!   ├─► methods of target, param assignable to base
//!   │     └─► FactoryCache::get ─► ListenerFactory::get(receiver?)
//!   │           └─► ListenerWrapper::wrap_* ─► Option<L>
//!   └─► registry.insert_with(key)            (lost race: built listeners dropped)
//!         └─► ListenerList(param).add(listener) for each, then record
//!
//! fire(type, event)
//!   ├─► type.is_instance(event)?             (else NotInstance, nothing runs)
//!   └─► ListenerList(type).get_cache() ─► handle(event) in order, stop at first error
//! ```
//!
//! ## Rules
//! - Registration is idempotent per target identity.
//! - A target whose listeners cannot all be built contributes nothing.
//! - Methods whose parameter is not assignable to the base type are skipped.
//! - Listener errors are returned as-is and end the dispatch.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{BusError, Result};
use crate::events::{Class, Event, EventType};
use crate::factory::FactoryCache;
use crate::listeners::{CacheTransform, Handler, Listener, ListenerList, ListenerTable, ListenerWrapper};
use crate::methods::{Method, Receiver};

use super::builder::EventBusBuilder;
use super::config::BusConfig;
use super::registry::{Registration, Registry};
use super::target::Target;

/// In-process, synchronous event bus over a type hierarchy rooted at a
/// base event type.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use hierbus::{Class, EventBus, EventType, Methods, Subscriber, Supertypes};
///
/// struct AppEvent;
/// impl EventType for AppEvent {}
///
/// struct Login { app: AppEvent, user: &'static str }
/// impl EventType for Login {
///     fn supertypes(types: &mut Supertypes<Self>) {
///         types.extends(|l: &Login| &l.app);
///     }
/// }
///
/// #[derive(Default)]
/// struct Audit { seen: AtomicUsize }
/// impl Subscriber for Audit {
///     fn declare<S: Subscriber>(m: &mut Methods<'_, S, Self>) {
///         m.on("any", |this: &Audit, _: &AppEvent| {
///             this.seen.fetch_add(1, Ordering::SeqCst);
///         });
///     }
/// }
///
/// let bus = EventBus::new(Class::of::<AppEvent>());
/// let audit = Arc::new(Audit::default());
/// assert_eq!(bus.register(&audit).unwrap(), 1);
///
/// bus.post(&Login { app: AppEvent, user: "ann" }).unwrap();
/// assert_eq!(audit.seen.load(Ordering::SeqCst), 1);
/// ```
pub struct EventBus<L: Handler = Listener> {
    base: Class,
    config: BusConfig,
    factories: Arc<FactoryCache>,
    wrapper: Arc<dyn ListenerWrapper<L>>,
    table: ListenerTable<L>,
    registry: Registry<L>,
}

impl EventBus<Listener> {
    /// Creates a bus with the default configuration and policies.
    pub fn new(base: Class) -> Self {
        Self::builder(base).build()
    }

    /// Starts building a bus for events assignable to `base`.
    pub fn builder(base: Class) -> EventBusBuilder<Listener> {
        EventBusBuilder::new(base)
    }
}

impl<L: Handler> EventBus<L> {
    pub(crate) fn from_parts(
        base: Class,
        config: BusConfig,
        factories: Arc<FactoryCache>,
        wrapper: Arc<dyn ListenerWrapper<L>>,
        transform: CacheTransform<L>,
    ) -> Self {
        Self {
            table: ListenerTable::new(base.clone(), transform),
            base,
            config,
            factories,
            wrapper,
            registry: Registry::new(),
        }
    }

    /// Registers the listener methods of `target`.
    ///
    /// Returns how many listeners were added; `0` if the target is already
    /// registered. Fails with a configuration error if a callable cannot be
    /// built, in which case nothing is added.
    ///
    /// Listeners are built before any registry lock is taken, so
    /// subscriber declarations and wrappers may call back into the bus.
    pub fn register(&self, target: impl Into<Target>) -> Result<usize> {
        let target = target.into();
        let key = target.key();
        if self.registry.contains(&key) {
            tracing::trace!(registrant = %target, "target already registered");
            return Ok(0);
        }

        let pending = self.collect(&target)?;
        let added = self.registry.insert_with(key, || {
            for (class, listener) in &pending {
                self.table.list(class).add(Arc::clone(listener));
            }
            Registration {
                target: target.clone(),
                listeners: pending.iter().map(|(_, listener)| Arc::clone(listener)).collect(),
            }
        });

        match added {
            Some(count) => {
                tracing::debug!(registrant = %target, listeners = count, "target registered");
                Ok(count)
            }
            None => {
                tracing::trace!(registrant = %target, "target registered concurrently");
                Ok(0)
            }
        }
    }

    /// Builds every listener `target` contributes, paired with the event
    /// type it listens to.
    fn collect(&self, target: &Target) -> Result<Vec<(Class, Arc<L>)>> {
        let mut pending = Vec::new();
        match target {
            Target::Method(method) => {
                if method.is_static() {
                    self.collect_static(method, &mut pending)?;
                }
            }
            Target::Type(ty) => {
                for method in ty.table()?.statics() {
                    self.collect_static(method, &mut pending)?;
                }
            }
            Target::Object(object) => {
                for method in object.table()?.instances() {
                    self.collect_bound(method, object.receiver(), &mut pending)?;
                }
            }
        }
        Ok(pending)
    }

    fn qualifies(&self, method: &Method) -> bool {
        let ok = self.base.is_assignable_from(method.descriptor().param());
        if !ok {
            tracing::trace!(method = %method, base = self.base.name(), "method skipped");
        }
        ok
    }

    fn collect_static(&self, method: &Method, pending: &mut Vec<(Class, Arc<L>)>) -> Result<()> {
        if !self.qualifies(method) {
            return Ok(());
        }
        let class = method.descriptor().param();
        let callable = self.factories.get(method)?.get(None)?;
        if let Some(listener) = self.wrapper.wrap_static(class, callable, method.descriptor()) {
            pending.push((class.clone(), Arc::new(listener)));
        }
        Ok(())
    }

    fn collect_bound(
        &self,
        method: &Method,
        receiver: &Receiver,
        pending: &mut Vec<(Class, Arc<L>)>,
    ) -> Result<()> {
        if !self.qualifies(method) {
            return Ok(());
        }
        let class = method.descriptor().param();
        let callable = self.factories.get(method)?.get(Some(receiver))?;
        let wrapped = self.wrapper.wrap_object(
            class,
            callable,
            method.descriptor(),
            receiver,
            method.overridden(),
        );
        if let Some(listener) = wrapped {
            pending.push((class.clone(), Arc::new(listener)));
        }
        Ok(())
    }

    /// Removes every listener `target` contributed.
    ///
    /// Returns `false` if the target was not registered.
    pub fn unregister(&self, target: impl Into<Target>) -> bool {
        let target = target.into();
        let Some(record) = self.registry.remove(&target.key()) else {
            return false;
        };

        let doomed: HashSet<*const L> = record.listeners.iter().map(Arc::as_ptr).collect();
        let mut removed = 0;
        for list in self.table.lists() {
            if list.remove_if(|listener| doomed.contains(&Arc::as_ptr(listener))) {
                removed += 1;
            }
        }
        tracing::debug!(
            registrant = %record.target,
            listeners = record.listeners.len(),
            lists = removed,
            "target unregistered"
        );
        true
    }

    /// True if `target` is currently registered.
    pub fn is_registered(&self, target: impl Into<Target>) -> bool {
        self.registry.contains(&target.into().key())
    }

    /// Number of registered targets.
    pub fn registered_targets(&self) -> usize {
        self.registry.len()
    }

    /// Fires `event` as an event of type `class`.
    ///
    /// Every listener applicable to `class` runs in snapshot order on the
    /// calling thread. The first listener error stops the dispatch and is
    /// returned unchanged.
    ///
    /// # Errors
    /// - [`BusError::NotInstance`] if `event` is not a value of `class` (no
    ///   listener runs)
    /// - [`BusError::OutsideBase`] if `class` is not assignable to the base type
    /// - [`BusError::Listener`] from a failing listener
    pub fn fire(&self, class: &Class, event: &dyn Event) -> Result<()> {
        if !class.is_instance(event) {
            return Err(BusError::NotInstance {
                expected: class.name(),
                actual: event.class().name(),
            });
        }

        let listeners = self.get_list(class)?.get_cache();
        for listener in listeners.iter() {
            listener.handle(event)?;
        }
        Ok(())
    }

    /// Fires `event` as its own type.
    pub fn post<E: EventType>(&self, event: &E) -> Result<()> {
        self.fire(&Class::of::<E>(), event)
    }

    /// Listener list of `class`, created on first request.
    ///
    /// Fails with [`BusError::OutsideBase`] if `class` is not assignable to
    /// the base type.
    pub fn get_list(&self, class: &Class) -> Result<ListenerList<'_, L>> {
        if !self.base.is_assignable_from(class) {
            return Err(BusError::OutsideBase {
                ty: class.name(),
                base: self.base.name(),
            });
        }
        Ok(self.table.list(class))
    }

    /// Base event type of this bus.
    pub fn base(&self) -> &Class {
        &self.base
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Factory cache this bus builds callables through.
    pub fn factories(&self) -> &Arc<FactoryCache> {
        &self.factories
    }

    /// Number of event types with a listener list.
    pub fn materialized_lists(&self) -> usize {
        self.table.len()
    }
}

impl<L: Handler> fmt::Debug for EventBus<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("base", &self.base)
            .field("strategy", &self.config.strategy)
            .field("backend", &self.factories.backend())
            .field("lists", &self.table.len())
            .field("targets", &self.registry.len())
            .finish()
    }
}
