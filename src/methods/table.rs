//! # Subscriber types and their method tables.
//!
//! A [`Subscriber`] lists its listener methods once, in
//! [`Subscriber::declare`]. The resulting [`MethodTable`] is computed on
//! first use and memoized for the life of the process.
//!
//! ## Inheritance
//! ```text
//! Counter::declare(m)            depth 0   on("on_ping"), on_static("on_any")
//!   └─ m.inherit(|c| &c.base)
//!        Base::declare(m')       depth 1   on("on_ping"), on("on_pong")
//! ```
//! Entries are resolved by distance: the nearest declaration of a
//! `(name, parameter, static)` signature wins and records the farther ones as
//! its overridden set. Own methods come first (declaration order), then
//! inherited ones by distance. The same method reached through two inherit
//! paths is kept once.
//!
//! ## Rules
//! - Two declarations of one signature at the same distance are ambiguous
//!   and fail with [`BusError::DuplicateMethod`]; the failure is not memoized.
//! - Inherited instance methods run against the projected part of the
//!   receiver; inherited static methods behave like own static methods.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::error::{BusError, Result};
use crate::events::{Class, EventType};

use super::descriptor::{MethodDescriptor, TypeKey};
use super::method::{InstanceBody, Method, MethodBody, Outcome, Path, Root, StaticBody, Step};

static TABLES: OnceLock<DashMap<TypeId, Arc<MethodTable>>> = OnceLock::new();

fn tables() -> &'static DashMap<TypeId, Arc<MethodTable>> {
    TABLES.get_or_init(DashMap::new)
}

/// A type whose methods can be registered as listeners.
///
/// # Example
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use hierbus::{EventType, MethodTable, Methods, Subscriber};
///
/// struct Ping;
/// impl EventType for Ping {}
///
/// #[derive(Default)]
/// struct Counter { hits: AtomicUsize }
///
/// impl Subscriber for Counter {
///     fn declare<S: Subscriber>(methods: &mut Methods<'_, S, Self>) {
///         methods.on("on_ping", |this: &Counter, _: &Ping| {
///             this.hits.fetch_add(1, Ordering::Relaxed);
///         });
///     }
/// }
///
/// let table = MethodTable::of::<Counter>().unwrap();
/// assert_eq!(table.len(), 1);
/// assert!(table.find("on_ping").is_some());
/// ```
pub trait Subscriber: Any + Send + Sync + Sized {
    /// Declares the listener methods of `Self`.
    ///
    /// `S` is the type the table is being built for: `Self` for own methods,
    /// a subtype when `Self` is being inherited.
    fn declare<S: Subscriber>(methods: &mut Methods<'_, S, Self>);
}

struct Entry {
    depth: usize,
    origin: TypeId,
    descriptor: MethodDescriptor,
    body: Arc<dyn MethodBody>,
}

/// Collects the listener methods declared by `D` on behalf of owner `S`.
pub struct Methods<'a, S, D> {
    path: Arc<dyn Path<S, D>>,
    depth: usize,
    chain: Vec<TypeId>,
    entries: &'a mut Vec<Entry>,
}

impl<'a, S: Subscriber, D: Subscriber> Methods<'a, S, D> {
    fn descriptor<E: EventType, R: Outcome>(name: &'static str, is_static: bool) -> MethodDescriptor {
        MethodDescriptor::new(
            TypeKey::of::<S>(),
            TypeKey::of::<D>(),
            name,
            Class::of::<E>(),
            is_static,
            std::any::type_name::<R>(),
        )
    }

    /// Declares an instance method taking `E`.
    pub fn on<E, R, F>(&mut self, name: &'static str, f: F) -> &mut Self
    where
        E: EventType,
        R: Outcome,
        F: Fn(&D, &E) -> R + Send + Sync + 'static,
    {
        let body = InstanceBody::<S, D, E, R, F>::new(Arc::clone(&self.path), f);
        self.entries.push(Entry {
            depth: self.depth,
            origin: TypeId::of::<F>(),
            descriptor: Self::descriptor::<E, R>(name, false),
            body: Arc::new(body),
        });
        self
    }

    /// Declares a static method taking `E`.
    pub fn on_static<E, R, F>(&mut self, name: &'static str, f: F) -> &mut Self
    where
        E: EventType,
        R: Outcome,
        F: Fn(&E) -> R + Send + Sync + 'static,
    {
        self.entries.push(Entry {
            depth: self.depth,
            origin: TypeId::of::<F>(),
            descriptor: Self::descriptor::<E, R>(name, true),
            body: Arc::new(StaticBody::<E, R, F>::new(f)),
        });
        self
    }

    /// Inherits the methods of `P`; `project` borrows the `P` part of a `D`.
    ///
    /// # Panics
    /// If `P` is already being declared on this path (cyclic inheritance).
    pub fn inherit<P: Subscriber>(&mut self, project: fn(&D) -> &P) -> &mut Self {
        let id = TypeId::of::<P>();
        assert!(
            !self.chain.contains(&id),
            "cyclic subscriber inheritance through `{}`",
            std::any::type_name::<P>()
        );

        let mut chain = self.chain.clone();
        chain.push(id);
        let path: Arc<dyn Path<S, P>> = Arc::new(Step {
            parent: Arc::clone(&self.path),
            project,
        });
        let mut inherited = Methods {
            path,
            depth: self.depth + 1,
            chain,
            entries: &mut *self.entries,
        };
        P::declare(&mut inherited);
        self
    }
}

/// The resolved listener methods of one subscriber type.
#[derive(Debug)]
pub struct MethodTable {
    owner: TypeKey,
    methods: Box<[Method]>,
}

impl MethodTable {
    /// Returns the memoized table of `S`, resolving it on first use.
    pub fn of<S: Subscriber>() -> Result<Arc<MethodTable>> {
        let id = TypeId::of::<S>();
        if let Some(found) = tables().get(&id) {
            return Ok(Arc::clone(found.value()));
        }

        let table = Arc::new(Self::resolve::<S>()?);
        tracing::trace!(owner = table.owner.name(), methods = table.len(), "method table resolved");
        let entry = tables().entry(id).or_insert(table);
        Ok(Arc::clone(entry.value()))
    }

    fn resolve<S: Subscriber>() -> Result<MethodTable> {
        let owner = TypeKey::of::<S>();
        let mut entries = Vec::new();
        let root: Arc<dyn Path<S, S>> = Arc::new(Root);
        S::declare(&mut Methods {
            path: root,
            depth: 0,
            chain: vec![TypeId::of::<S>()],
            entries: &mut entries,
        });
        entries.sort_by_key(|entry| entry.depth);

        let mut winners: Vec<(Entry, Vec<MethodDescriptor>)> = Vec::new();
        let mut by_signature = HashMap::new();
        let mut seen = HashSet::new();
        for entry in entries {
            if !seen.insert((entry.descriptor.clone(), entry.origin)) {
                continue;
            }
            let signature = entry.descriptor.signature();
            match by_signature.get(&signature) {
                None => {
                    by_signature.insert(signature, winners.len());
                    winners.push((entry, Vec::new()));
                }
                Some(&index) => {
                    let (winner, overridden) = &mut winners[index];
                    if winner.depth == entry.depth {
                        return Err(BusError::DuplicateMethod {
                            owner: owner.name(),
                            method: signature.to_string(),
                        });
                    }
                    overridden.push(entry.descriptor);
                }
            }
        }

        let methods = winners
            .into_iter()
            .map(|(entry, overridden)| Method::new(entry.descriptor, entry.body, overridden))
            .collect();
        Ok(MethodTable { owner, methods })
    }

    /// Subscriber type the table belongs to.
    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    /// All methods in table order.
    pub fn iter(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter()
    }

    /// Static methods in table order.
    pub fn statics(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter().filter(|m| m.is_static())
    }

    /// Instance methods in table order.
    pub fn instances(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter().filter(|m| !m.is_static())
    }

    /// First method named `name`.
    pub fn find(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name() == name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
