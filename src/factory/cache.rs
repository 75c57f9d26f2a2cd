//! # Factory cache.
//!
//! Maps method descriptors to [`ListenerFactory`] values, building each one
//! at most once.
//!
//! ## Architecture
//! ```text
//! get(method)
//!   ├─ read hit ───────────────────────────────► clone factory
//!   └─ miss → entry(descriptor)   (shard write lock)
//!               ├─ Occupied (another thread won) ► clone factory
//!               └─ Vacant → build via backend
//!                             ├─ static   → Constant(build_static)
//!                             └─ instance → Bound(build_instance)
//! ```
//!
//! Free methods ([`Method::from_fn`]) have a per-value identity, so they are
//! not entered in the map: their factory is kept on the method itself,
//! tagged with the cache id, and is released together with the method.
//!
//! ## Rules
//! - Concurrent first requests for one method build once and all observe
//!   the same factory.
//! - Failed builds are not cached; the next request retries.
//! - Map entries live as long as the cache; shared caches live for the process.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::Result;
use crate::methods::{Method, MethodDescriptor};

use super::{CallableFactory, ListenerFactory, Strategy};

static SHARED_DIRECT: OnceLock<Arc<FactoryCache>> = OnceLock::new();
static SHARED_DYNAMIC: OnceLock<Arc<FactoryCache>> = OnceLock::new();
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Memoizes listener factories per method descriptor.
pub struct FactoryCache {
    id: u64,
    factory: Arc<dyn CallableFactory>,
    entries: DashMap<MethodDescriptor, ListenerFactory>,
    builds: AtomicUsize,
}

impl FactoryCache {
    /// Creates an empty cache building through `factory`.
    pub fn new(factory: Arc<dyn CallableFactory>) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            factory,
            entries: DashMap::new(),
            builds: AtomicUsize::new(0),
        }
    }

    /// Creates an empty cache for `strategy`.
    pub fn with_strategy(strategy: Strategy) -> Self {
        Self::new(strategy.factory())
    }

    /// Process-wide cache for `strategy`, shared by every bus that does not
    /// bring its own.
    pub fn shared(strategy: Strategy) -> Arc<FactoryCache> {
        let slot = match strategy {
            Strategy::Direct => &SHARED_DIRECT,
            Strategy::Dynamic => &SHARED_DYNAMIC,
        };
        Arc::clone(slot.get_or_init(|| Arc::new(FactoryCache::with_strategy(strategy))))
    }

    /// Returns the factory for `method`, building it on first request.
    pub fn get(&self, method: &Method) -> Result<ListenerFactory> {
        if method.descriptor().is_free() {
            return self.get_free(method);
        }
        if let Some(found) = self.entries.get(method.descriptor()) {
            return Ok(found.value().clone());
        }

        match self.entries.entry(method.descriptor().clone()) {
            Entry::Occupied(occupied) => Ok(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let built = self.build(method)?;
                Ok(vacant.insert(built).value().clone())
            }
        }
    }

    fn get_free(&self, method: &Method) -> Result<ListenerFactory> {
        let mut slots = method.factories().lock();
        if let Some((_, found)) = slots.iter().find(|(id, _)| *id == self.id) {
            return Ok(found.clone());
        }
        let built = self.build(method)?;
        slots.push((self.id, built.clone()));
        Ok(built)
    }

    fn build(&self, method: &Method) -> Result<ListenerFactory> {
        let built = if method.is_static() {
            self.factory.build_static(method).map(ListenerFactory::Constant)
        } else {
            self.factory.build_instance(method).map(ListenerFactory::Bound)
        }?;
        self.builds.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            method = %method.descriptor(),
            backend = self.factory.name(),
            "listener factory built"
        );
        Ok(built)
    }

    /// Name of the backend this cache builds with.
    pub fn backend(&self) -> &'static str {
        self.factory.name()
    }

    /// Number of factories built so far.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Number of factories held in the map (free methods excluded).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for FactoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryCache")
            .field("backend", &self.factory.name())
            .field("entries", &self.entries.len())
            .field("builds", &self.builds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;

    use crate::error::BusError;
    use crate::events::EventType;
    use crate::factory::{Construct, DynamicFactory};
    use crate::methods::{MethodTable, Methods, Receiver, Subscriber};

    struct Tick;
    impl EventType for Tick {}

    #[derive(Default)]
    struct Meter {
        ticks: AtomicUsize,
    }

    impl Subscriber for Meter {
        fn declare<S: Subscriber>(m: &mut Methods<'_, S, Self>) {
            m.on("on_tick", |this: &Meter, _: &Tick| {
                this.ticks.fetch_add(1, Ordering::SeqCst);
            });
        }
    }

    /// Counts backend calls and fails the first `fail` of them.
    struct Counting {
        calls: AtomicUsize,
        fail: usize,
    }

    impl CallableFactory for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn build_static(&self, method: &Method) -> Result<crate::factory::CallableRef> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail {
                return Err(BusError::Synthesis {
                    method: method.to_string(),
                    reason: "injected".into(),
                });
            }
            thread::sleep(std::time::Duration::from_millis(5));
            DynamicFactory.build_static(method)
        }

        fn build_instance(&self, method: &Method) -> Result<Arc<dyn Construct>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            DynamicFactory.build_instance(method)
        }
    }

    #[test]
    fn test_static_is_constant() {
        let cache = FactoryCache::with_strategy(Strategy::Direct);
        let method = Method::from_fn("tick", |_: &Tick| {});

        let factory = cache.get(&method).unwrap();
        assert!(!factory.is_bound());
        let a = factory.get(None).unwrap();
        let b = cache.get(&method).unwrap().get(None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.builds(), 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_free_method_factory_released_with_method() {
        let first = FactoryCache::with_strategy(Strategy::Direct);
        let second = FactoryCache::with_strategy(Strategy::Dynamic);
        let payload = Arc::new(vec![1_u8, 2, 3]);

        let held = Arc::clone(&payload);
        let method = Method::from_fn("tick", move |_: &Tick| {
            let _ = held.len();
        });
        first.get(&method).unwrap().get(None).unwrap().invoke(&Tick).unwrap();
        first.get(&method).unwrap();
        second.get(&method).unwrap();
        assert_eq!((first.builds(), second.builds()), (1, 1));
        assert!(first.is_empty() && second.is_empty());

        drop(method);
        assert_eq!(Arc::strong_count(&payload), 1);
    }

    #[test]
    fn test_concurrent_first_requests_build_once() {
        const THREADS: usize = 8;

        let backend = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail: 0,
        });
        let cache = Arc::new(FactoryCache::new(backend.clone()));
        let method = Method::from_fn("tick", |_: &Tick| {});
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let method = method.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    match cache.get(&method).unwrap() {
                        ListenerFactory::Constant(callable) => callable,
                        ListenerFactory::Bound(_) => panic!("static method built as bound"),
                    }
                })
            })
            .collect();
        let callables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.builds(), 1);
        assert!(callables.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let backend = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail: 1,
        });
        let cache = FactoryCache::new(backend.clone());
        let method = Method::from_fn("tick", |_: &Tick| {});

        let err = cache.get(&method).unwrap_err();
        assert_eq!(err.as_label(), "bus_synthesis_failed");
        assert!(cache.is_empty());

        cache.get(&method).unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.builds(), 1);
    }

    #[test]
    fn test_bound_factory_per_receiver() {
        for strategy in [Strategy::Direct, Strategy::Dynamic] {
            let cache = FactoryCache::with_strategy(strategy);
            let table = MethodTable::of::<Meter>().unwrap();
            let method = table.find("on_tick").unwrap();

            let factory = cache.get(method).unwrap();
            assert!(factory.is_bound());

            let first = Arc::new(Meter::default());
            let second = Arc::new(Meter::default());
            let r1: Receiver = first.clone();
            let r2: Receiver = second.clone();

            factory.get(Some(&r1)).unwrap().invoke(&Tick).unwrap();
            factory.get(Some(&r2)).unwrap().invoke(&Tick).unwrap();
            factory.get(Some(&r2)).unwrap().invoke(&Tick).unwrap();

            assert_eq!(first.ticks.load(Ordering::SeqCst), 1, "{strategy}");
            assert_eq!(second.ticks.load(Ordering::SeqCst), 2, "{strategy}");
            assert_eq!(cache.builds(), 1);
        }
    }

    #[test]
    fn test_bound_factory_rejects_bad_receivers() {
        for strategy in [Strategy::Direct, Strategy::Dynamic] {
            let cache = FactoryCache::with_strategy(strategy);
            let table = MethodTable::of::<Meter>().unwrap();
            let factory = cache.get(table.find("on_tick").unwrap()).unwrap();

            let missing = factory.get(None).err().unwrap();
            assert_eq!(missing.as_label(), "bus_missing_receiver");

            let wrong: Receiver = Arc::new(17_u32);
            let mismatch = factory.get(Some(&wrong)).err().unwrap();
            assert!(matches!(mismatch, BusError::ReceiverMismatch { .. }));
            assert!(mismatch.is_configuration());
        }
    }

    #[test]
    fn test_shared_cache_per_strategy() {
        let a = FactoryCache::shared(Strategy::Direct);
        let b = FactoryCache::shared(Strategy::Direct);
        let c = FactoryCache::shared(Strategy::Dynamic);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.backend(), "direct");
        assert_eq!(c.backend(), "dynamic");
    }
}
