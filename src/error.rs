//! Error types used by the event bus.
//!
//! Every fallible operation returns [`BusError`]. Variants fall into four
//! classes, reported by [`BusError::kind`]:
//!
//! - **Configuration**: raised at registration/setup time (a listener method
//!   that cannot be turned into a callable, a receiver of the wrong type,
//!   ambiguous method declarations, an unknown strategy name).
//! - **Argument**: the caller passed something invalid (firing an event that
//!   is not an instance of the declared type, a type outside the bus base type).
//! - **Listener**: an error returned by user listener code; it is carried
//!   unmodified and can be recovered with [`BusError::into_listener_error`].
//! - **Internal**: invariant violations that should not occur.
//!
//! Like the rest of the crate, errors provide `as_label` for logs/metrics.

use thiserror::Error;

/// Boxed error produced by listener code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias used across the crate.
pub type Result<T, E = BusError> = std::result::Result<T, E>;

/// Coarse classification of a [`BusError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Fatal setup-time error.
    Configuration,
    /// Caller supplied an invalid argument.
    Argument,
    /// Error returned by a listener.
    Listener,
    /// Broken internal invariant.
    Internal,
}

/// # Errors produced by the event bus.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// The fired event is not an instance of the type it was fired as.
    #[error("event of type `{actual}` is not an instance of `{expected}`")]
    NotInstance {
        /// Type the event was fired as (or cast to).
        expected: &'static str,
        /// Runtime type of the event.
        actual: &'static str,
    },

    /// The requested event type is not assignable to the bus base type.
    #[error("`{ty}` is not assignable to the bus base type `{base}`")]
    OutsideBase {
        /// Requested type.
        ty: &'static str,
        /// Bus base type.
        base: &'static str,
    },

    /// An instance method was bound without a receiver.
    #[error("instance method `{method}` requires a receiver")]
    MissingReceiver {
        /// Method being bound.
        method: String,
    },

    /// An instance method was bound to a receiver of another type.
    #[error("receiver of type `{actual}` cannot be bound to `{method}` (expects `{expected}`)")]
    ReceiverMismatch {
        /// Method being bound.
        method: String,
        /// Owner type of the method.
        expected: &'static str,
        /// Runtime type of the receiver.
        actual: String,
    },

    /// A callable could not be built for a method.
    #[error("failed to build callable for `{method}`: {reason}")]
    Synthesis {
        /// Method being built.
        method: String,
        /// Why the build failed.
        reason: String,
    },

    /// Two listener methods of a subscriber type share one signature.
    #[error("ambiguous listener method `{method}` on `{owner}`")]
    DuplicateMethod {
        /// Subscriber type declaring the methods.
        owner: &'static str,
        /// Conflicting signature.
        method: String,
    },

    /// Unknown callable factory strategy name.
    #[error("unknown callable factory strategy `{0}`")]
    UnknownStrategy(String),

    /// Error returned by listener code, passed through untouched.
    #[error(transparent)]
    Listener(BoxError),

    /// Broken internal invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BusError {
    /// Wraps an error returned by listener code.
    pub fn listener(err: impl Into<BoxError>) -> Self {
        BusError::Listener(err.into())
    }

    /// Returns the coarse class of this error.
    ///
    /// # Example
    /// ```
    /// use hierbus::{BusError, ErrorKind};
    ///
    /// let err = BusError::UnknownStrategy("asm".into());
    /// assert_eq!(err.kind(), ErrorKind::Configuration);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            BusError::NotInstance { .. } | BusError::OutsideBase { .. } => ErrorKind::Argument,
            BusError::MissingReceiver { .. }
            | BusError::ReceiverMismatch { .. }
            | BusError::Synthesis { .. }
            | BusError::DuplicateMethod { .. }
            | BusError::UnknownStrategy(_) => ErrorKind::Configuration,
            BusError::Listener(_) => ErrorKind::Listener,
            BusError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use hierbus::BusError;
    ///
    /// let err = BusError::NotInstance { expected: "Child", actual: "Base" };
    /// assert_eq!(err.as_label(), "bus_not_instance");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::NotInstance { .. } => "bus_not_instance",
            BusError::OutsideBase { .. } => "bus_outside_base",
            BusError::MissingReceiver { .. } => "bus_missing_receiver",
            BusError::ReceiverMismatch { .. } => "bus_receiver_mismatch",
            BusError::Synthesis { .. } => "bus_synthesis_failed",
            BusError::DuplicateMethod { .. } => "bus_duplicate_method",
            BusError::UnknownStrategy(_) => "bus_unknown_strategy",
            BusError::Listener(_) => "listener_failed",
            BusError::Internal(_) => "bus_internal",
        }
    }

    /// True for setup-time errors.
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Returns the listener's own error, if this is a listener failure.
    pub fn into_listener_error(self) -> Option<BoxError> {
        match self {
            BusError::Listener(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("disk on fire")]
    struct Custom;

    #[test]
    fn test_listener_error_passes_through() {
        let err = BusError::listener(Custom);
        assert_eq!(err.to_string(), "disk on fire");
        assert_eq!(err.kind(), ErrorKind::Listener);

        let inner = err.into_listener_error().expect("listener error");
        assert!(inner.downcast_ref::<Custom>().is_some());
    }

    #[test]
    fn test_kinds() {
        let arg = BusError::OutsideBase { ty: "A", base: "B" };
        assert_eq!(arg.kind(), ErrorKind::Argument);
        assert!(!arg.is_configuration());

        let cfg = BusError::MissingReceiver { method: "m".into() };
        assert!(cfg.is_configuration());
        assert_eq!(cfg.as_label(), "bus_missing_receiver");
        assert!(cfg.into_listener_error().is_none());
    }
}
