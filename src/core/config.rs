//! # Bus configuration.
//!
//! Provides [`BusConfig`], the settings a bus is built with.
//!
//! Config is used in two ways:
//! 1. **Bus creation**: `EventBus::builder(base).config(config)`
//! 2. **Environment**: [`BusConfig::from_env`] reads [`STRATEGY_ENV`]
//!
//! ## Values
//! - `HIERBUS_STRATEGY` unset or blank → default strategy (`dynamic`)
//! - `HIERBUS_STRATEGY=direct|generated|dynamic|lambda` → that strategy
//! - anything else → [`BusError::UnknownStrategy`](crate::BusError::UnknownStrategy)

use crate::error::Result;
use crate::factory::Strategy;

/// Environment variable selecting the callable factory strategy.
pub const STRATEGY_ENV: &str = "HIERBUS_STRATEGY";

/// Configuration of an event bus.
///
/// ## Field semantics
/// - `strategy`: backend used to build callables when the bus is not given
///   an explicit [`FactoryCache`](crate::FactoryCache); buses with the same
///   strategy share the process-wide cache of that strategy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BusConfig {
    /// Callable factory strategy.
    pub strategy: Strategy,
}

impl BusConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup` (key → value).
    ///
    /// # Example
    /// ```
    /// use hierbus::{BusConfig, Strategy};
    ///
    /// let cfg = BusConfig::from_lookup(|_| Some("generated".to_string())).unwrap();
    /// assert_eq!(cfg.strategy, Strategy::Direct);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(STRATEGY_ENV).filter(|raw| !raw.trim().is_empty()) {
            config.strategy = raw.parse()?;
        }
        Ok(config)
    }

    /// Returns a copy using `strategy`.
    #[inline]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }
}
