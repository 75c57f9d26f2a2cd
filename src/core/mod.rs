//! Bus core: registration, dispatch and configuration.
//!
//! This module contains the orchestration layer of the crate. The public
//! API from this module is [`EventBus`], the [`Bus`] trait, its builder, its configuration and
//! the registration [`Target`].
//!
//! Internal modules:
//! - [`bus`]: registration protocol and synchronous dispatch;
//! - [`builder`]: assembling a bus from configuration and policies;
//! - [`config`]: strategy selection, from code or the environment;
//! - [`dispatch`]: the [`Bus`] trait, for decorators over a bus;
//! - [`registry`]: per-target records used by `unregister`;
//! - [`target`]: what can be registered and how it is identified.

mod builder;
mod bus;
mod config;
mod dispatch;
mod registry;
mod target;

pub use builder::EventBusBuilder;
pub use bus::EventBus;
pub use config::{BusConfig, STRATEGY_ENV};
pub use dispatch::Bus;
pub use target::{ObjectTarget, Target, TypeTarget};
