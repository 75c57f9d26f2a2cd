//! Value descriptors identifying listener methods.

use std::any::TypeId;
use std::fmt;

use crate::events::Class;

/// Identity of a Rust type: its `TypeId` plus its name for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// `TypeId` of the type.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Describes one listener method.
///
/// Immutable; equality and hashing cover every field, which makes the
/// descriptor usable as a cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    owner: TypeKey,
    declaring: TypeKey,
    name: &'static str,
    param: Class,
    is_static: bool,
    returns: &'static str,
    serial: u64,
}

/// Part of a descriptor that decides overriding: name, parameter, staticness.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Signature {
    name: &'static str,
    param: Class,
    is_static: bool,
}

impl MethodDescriptor {
    pub(crate) fn new(
        owner: TypeKey,
        declaring: TypeKey,
        name: &'static str,
        param: Class,
        is_static: bool,
        returns: &'static str,
    ) -> Self {
        Self {
            owner,
            declaring,
            name,
            param,
            is_static,
            returns,
            serial: 0,
        }
    }

    /// Gives a free-function descriptor its own identity.
    pub(crate) fn with_serial(mut self, serial: u64) -> Self {
        self.serial = serial;
        self
    }

    /// True for descriptors of [`Method::from_fn`](crate::Method::from_fn)
    /// methods, whose identity is per value rather than per type.
    pub(crate) fn is_free(&self) -> bool {
        self.serial != 0
    }

    /// Type the method is looked up on; for instance methods, the receiver type.
    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    /// Type that declared the method (differs from the owner for inherited methods).
    pub fn declaring(&self) -> TypeKey {
        self.declaring
    }

    /// Method name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Class of the single parameter.
    pub fn param(&self) -> &Class {
        &self.param
    }

    /// True for methods without a receiver.
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Name of the return type.
    pub fn returns(&self) -> &'static str {
        self.returns
    }

    pub(crate) fn signature(&self) -> Signature {
        Signature {
            name: self.name,
            param: self.param.clone(),
            is_static: self.is_static,
        }
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_static { "static " } else { "" };
        write!(
            f,
            "{kind}{}::{}({}) -> {}",
            self.declaring.name, self.name, self.param, self.returns
        )
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.param)
    }
}
