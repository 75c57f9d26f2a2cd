use std::sync::Arc;

use crate::events::Class;
use crate::factory::{FactoryCache, Strategy};
use crate::listeners::{CacheTransform, Handler, Listener, ListenerWrapper, PlainWrapper};

use super::{bus::EventBus, config::BusConfig};

fn identity<L: Handler>() -> CacheTransform<L> {
    Arc::new(|_: &mut Vec<Arc<L>>| {})
}

/// Builder for an [`EventBus`] with optional policies.
pub struct EventBusBuilder<L: Handler = Listener> {
    base: Class,
    config: BusConfig,
    factories: Option<Arc<FactoryCache>>,
    wrapper: Arc<dyn ListenerWrapper<L>>,
    transform: CacheTransform<L>,
}

impl EventBusBuilder<Listener> {
    /// Creates a builder for a bus whose events are all assignable to `base`.
    pub fn new(base: Class) -> Self {
        Self {
            base,
            config: BusConfig::default(),
            factories: None,
            wrapper: Arc::new(PlainWrapper),
            transform: identity(),
        }
    }
}

impl<L: Handler> EventBusBuilder<L> {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Selects the callable factory strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Uses `cache` instead of the shared cache of the configured strategy.
    ///
    /// The cache's own backend is used; the configured strategy is then
    /// informational only.
    pub fn factory_cache(mut self, cache: Arc<FactoryCache>) -> Self {
        self.factories = Some(cache);
        self
    }

    /// Sets the listener wrapping policy, which also fixes the listener type.
    ///
    /// Resets the cache transform to the identity.
    pub fn listener_wrapper<L2, W>(self, wrapper: W) -> EventBusBuilder<L2>
    where
        L2: Handler,
        W: ListenerWrapper<L2> + 'static,
    {
        EventBusBuilder {
            base: self.base,
            config: self.config,
            factories: self.factories,
            wrapper: Arc::new(wrapper),
            transform: identity(),
        }
    }

    /// Sets the hook applied to a list's merged listeners before each
    /// snapshot is frozen. It must be deterministic.
    pub fn cache_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&mut Vec<Arc<L>>) + Send + Sync + 'static,
    {
        self.transform = Arc::new(transform);
        self
    }

    /// Builds the bus.
    pub fn build(self) -> EventBus<L> {
        let factories = self
            .factories
            .unwrap_or_else(|| FactoryCache::shared(self.config.strategy));
        tracing::debug!(
            base = self.base.name(),
            strategy = %self.config.strategy,
            backend = factories.backend(),
            "event bus built"
        );
        EventBus::from_parts(self.base, self.config, factories, self.wrapper, self.transform)
    }
}
