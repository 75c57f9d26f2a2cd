//! # Dynamic backend.
//!
//! Binds the method's erased entry point and, for instance methods, the
//! erased receiver. Each invocation goes through the generic adaptation
//! layer (receiver downcast, argument cast). Nothing is specialized, so
//! building is free; this is the default backend.

use std::sync::Arc;

use crate::error::Result;
use crate::events::Event;
use crate::methods::{Method, MethodBody, MethodDescriptor, Receiver};

use super::callable::{check_receiver, static_mismatch, Callable, CallableRef, Construct};
use super::CallableFactory;

/// Backend that adapts the erased method body at every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicFactory;

impl CallableFactory for DynamicFactory {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn build_static(&self, method: &Method) -> Result<CallableRef> {
        if !method.is_static() {
            return Err(static_mismatch(method.descriptor(), true));
        }
        Ok(Arc::new(DynamicCallable {
            body: Arc::clone(method.body()),
            receiver: None,
        }))
    }

    fn build_instance(&self, method: &Method) -> Result<Arc<dyn Construct>> {
        if method.is_static() {
            return Err(static_mismatch(method.descriptor(), false));
        }
        Ok(Arc::new(DynamicConstructor {
            descriptor: method.descriptor().clone(),
            body: Arc::clone(method.body()),
        }))
    }
}

struct DynamicConstructor {
    descriptor: MethodDescriptor,
    body: Arc<dyn MethodBody>,
}

impl Construct for DynamicConstructor {
    fn construct(&self, receiver: Option<&Receiver>) -> Result<CallableRef> {
        let receiver = check_receiver(&self.descriptor, receiver)?;
        Ok(Arc::new(DynamicCallable {
            body: Arc::clone(&self.body),
            receiver: Some(Arc::clone(receiver)),
        }))
    }
}

struct DynamicCallable {
    body: Arc<dyn MethodBody>,
    receiver: Option<Receiver>,
}

impl Callable for DynamicCallable {
    fn invoke(&self, event: &dyn Event) -> Result<()> {
        self.body.call(self.receiver.as_deref(), event)
    }
}
