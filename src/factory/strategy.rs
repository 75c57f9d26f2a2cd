//! # Callable factory strategies.
//!
//! [`Strategy`] names the backend a bus builds its callables with.
//!
//! - [`Strategy::Direct`] specialized callable per method ([`DirectFactory`]).
//! - [`Strategy::Dynamic`] erased body plus adaptation layer ([`DynamicFactory`], default).
//!
//! ## Names
//! ```text
//! "direct"  | "generated" → Strategy::Direct
//! "dynamic" | "lambda"    → Strategy::Dynamic
//! ```
//! Parsing ignores ASCII case and surrounding whitespace.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::BusError;

use super::{CallableFactory, DirectFactory, DynamicFactory};

/// Backend used to turn listener methods into callables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// One specialized callable type per method.
    Direct,
    /// Erased method body bound at runtime (default).
    Dynamic,
}

impl Default for Strategy {
    /// Returns [`Strategy::Dynamic`].
    fn default() -> Self {
        Strategy::Dynamic
    }
}

impl Strategy {
    /// Returns a factory implementing this strategy.
    pub fn factory(self) -> Arc<dyn CallableFactory> {
        match self {
            Strategy::Direct => Arc::new(DirectFactory),
            Strategy::Dynamic => Arc::new(DynamicFactory),
        }
    }

    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Dynamic => "dynamic",
        }
    }
}

impl FromStr for Strategy {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "generated" => Ok(Strategy::Direct),
            "dynamic" | "lambda" => Ok(Strategy::Dynamic),
            _ => Err(BusError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
