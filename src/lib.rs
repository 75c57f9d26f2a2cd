//! # hierbus
//!
//! **hierbus** is an in-process, synchronous event bus that dispatches
//! across an event type hierarchy: a listener registered for a supertype
//! also receives events of every subtype.
//!
//! Listeners are plain methods. A subscriber type declares them once; the
//! bus turns each one into a uniform callable (through one of two
//! interchangeable backends), wraps it with a pluggable policy and files it
//! under the event type it takes. Every event type keeps a cached, ordered
//! snapshot of the listeners that apply to it, which stays coherent as
//! listeners come and go and as new subtypes are discovered.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   Method / Subscriber type / Arc<Subscriber>
//!                      │ register
//!                      ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  EventBus                                                    │
//! │  - Registry        (target identity → contributed listeners) │
//! │  - FactoryCache    (method → ListenerFactory, built once)    │
//! │  - ListenerWrapper (callable → L, or skip)                   │
//! │  - ListenerTable   (event type → ListenerList node)          │
//! └──────────────┬───────────────────────────────────────────────┘
//!                │ fire(type, event)
//!                ▼
//!   ListenerList(type).get_cache() = [own listeners.., ancestors' listeners..]
//!                │ in order, on the calling thread
//!                ▼
//!   L::handle(event) ─► Callable::invoke ─► listener method
//! ```
//!
//! ### Callable backends
//! ```text
//! Strategy::Direct  ─► DirectFactory   specialized callable type per method
//! Strategy::Dynamic ─► DynamicFactory  erased body + adaptation layer (default)
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / traits                        |
//! |-------------------|-------------------------------------------------------------|-------------------------------------------|
//! | **Events**        | Event types, supertypes, runtime classes.                   | [`EventType`], [`Class`], [`Event`]       |
//! | **Listeners**     | Declare listener methods, own and inherited.                | [`Subscriber`], [`Methods`], [`Method`]   |
//! | **Backends**      | Turn methods into callables, memoized per method.           | [`CallableFactory`], [`FactoryCache`]     |
//! | **Wrapping**      | Policy from callable to stored listener.                    | [`ListenerWrapper`], [`Handler`]          |
//! | **Dispatch**      | Register, unregister, fire; decorators via a trait.         | [`EventBus`], [`Bus`], [`Target`]         |
//! | **Errors**        | Typed errors with coarse kinds and stable labels.           | [`BusError`], [`ErrorKind`]               |
//! | **Configuration** | Strategy selection from code or `HIERBUS_STRATEGY`.         | [`BusConfig`], [`Strategy`]               |
//!
//! ## Example
//! ```rust
//! use hierbus::{Class, EventBus, EventType, Methods, Subscriber, Supertypes, Target};
//!
//! struct Event { id: u64 }
//! impl EventType for Event {}
//!
//! struct ChildEvent { event: Event }
//! impl EventType for ChildEvent {
//!     fn supertypes(types: &mut Supertypes<Self>) {
//!         types.extends(|c: &ChildEvent| &c.event);
//!     }
//! }
//!
//! struct Handlers;
//! impl Subscriber for Handlers {
//!     fn declare<S: Subscriber>(m: &mut Methods<'_, S, Self>) {
//!         m.on_static("on_event", |e: &Event| println!("event {}", e.id))
//!             .on_static("on_child", |c: &ChildEvent| println!("child {}", c.event.id));
//!     }
//! }
//!
//! let bus = EventBus::new(Class::of::<Event>());
//! bus.register(Target::of_type::<Handlers>())?;
//!
//! bus.post(&ChildEvent { event: Event { id: 1 } })?; // on_child, then on_event
//! bus.post(&Event { id: 2 })?;                       // on_event
//! # Ok::<(), hierbus::BusError>(())
//! ```
mod core;
mod error;
mod events;
mod factory;
mod listeners;
mod methods;

// ---- Public re-exports ----

pub use self::core::{Bus, BusConfig, EventBus, EventBusBuilder, ObjectTarget, Target, TypeTarget, STRATEGY_ENV};
pub use error::{BoxError, BusError, ErrorKind, Result};
pub use events::{cast, Class, Event, EventType, Supertypes};
pub use factory::{
    Callable, CallableFactory, CallableRef, Construct, DirectFactory, DynamicFactory, FactoryCache,
    ListenerFactory, Strategy,
};
pub use listeners::{
    wrapper_fn, CacheTransform, FnWrapper, Handler, Listener, ListenerList, ListenerWrapper,
    PlainWrapper, Snapshot,
};
pub use methods::{Method, MethodDescriptor, MethodTable, Methods, Outcome, Receiver, Subscriber, TypeKey};
