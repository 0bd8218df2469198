//! Type-erased values passed around by the engine. Every constructed object, bound dependency and
//! supplied argument is an [Instance]: a shared pointer to the actual value along with a
//! description of its [RuntimeType], which is used to check assignability and to perform
//! `dyn Trait` casts.

use crate::error::ResolutionError;
use derivative::Derivative;
use std::any::{type_name, Any};
use std::error::Error;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

pub type InstancePtr<T> = Rc<T>;

/// Type-erased payload of an [Instance]. The erased value is always an `InstancePtr<T>`, where `T`
/// is the type the instance was created with.
pub type InstanceAnyPtr = InstancePtr<dyn Any>;

pub type ErrorPtr = Rc<dyn Error>;

pub type RuntimeTypePtr = Rc<RuntimeType>;

/// Converts a type-erased `InstancePtr<Source>` into a boxed `InstancePtr<Target>`, where `Target`
/// is usually a `dyn Trait` implemented by `Source`. Returns `None` if the payload is not of the
/// expected source type.
pub type CastFunction = Rc<dyn Fn(&dyn Any) -> Option<Box<dyn Any>>>;

/// Kinds of types known to the engine.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeKind {
    /// Plain data passed by value. Never null and never injected implicitly.
    Value,
    /// Concrete type passed by reference.
    Class,
    /// Abstract type (usually a `dyn Trait`), which can be implicitly injected.
    Interface,
}

impl TypeKind {
    /// Reference types accept null arguments.
    #[inline]
    pub fn is_reference(self) -> bool {
        !matches!(self, TypeKind::Value)
    }
}

/// A cast from the concrete type into one of the types it implements.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Upcast {
    pub target: String,

    #[derivative(Debug = "ignore")]
    pub cast: CastFunction,
}

/// Description of the actual type of an [Instance].
#[derive(Clone, Debug)]
pub struct RuntimeType {
    pub name: String,
    pub kind: TypeKind,
    pub upcasts: Vec<Upcast>,
}

impl RuntimeType {
    pub fn new<N: Into<String>>(name: N, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            upcasts: Default::default(),
        }
    }

    /// Creates a runtime type named after `T`.
    pub fn of<T: ?Sized + 'static>(kind: TypeKind) -> Self {
        Self::new(type_name::<T>(), kind)
    }

    /// Checks if values of this type can be passed where `target` is expected.
    pub fn is_assignable_to(&self, target: &str) -> bool {
        self.name == target || self.upcasts.iter().any(|upcast| upcast.target == target)
    }
}

/// Shared, type-erased value. Cloning an instance is cheap and yields a handle to the same value.
#[derive(Clone)]
pub struct Instance {
    runtime_type: RuntimeTypePtr,
    payload: InstanceAnyPtr,
}

impl Instance {
    /// Wraps given pointer, which will be described by the given runtime type.
    pub fn new<T: ?Sized + 'static>(runtime_type: RuntimeTypePtr, instance: InstancePtr<T>) -> Self {
        Self {
            runtime_type,
            payload: Rc::new(instance) as InstanceAnyPtr,
        }
    }

    /// Wraps a plain value.
    pub fn value<T: 'static>(value: T) -> Self {
        Self::new(
            RuntimeTypePtr::new(RuntimeType::of::<T>(TypeKind::Value)),
            InstancePtr::new(value),
        )
    }

    /// Wraps a concrete object.
    pub fn object<T: 'static>(instance: InstancePtr<T>) -> Self {
        Self::new(
            RuntimeTypePtr::new(RuntimeType::of::<T>(TypeKind::Class)),
            instance,
        )
    }

    /// Wraps an abstract object, e.g. `InstancePtr<dyn Trait>`.
    pub fn interface<T: ?Sized + 'static>(instance: InstancePtr<T>) -> Self {
        Self::new(
            RuntimeTypePtr::new(RuntimeType::of::<T>(TypeKind::Interface)),
            instance,
        )
    }

    pub(crate) fn from_payload(runtime_type: RuntimeTypePtr, payload: InstanceAnyPtr) -> Self {
        Self {
            runtime_type,
            payload,
        }
    }

    #[inline]
    pub fn runtime_type(&self) -> &RuntimeType {
        &self.runtime_type
    }

    #[inline]
    pub fn type_name(&self) -> &str {
        &self.runtime_type.name
    }

    /// Returns the wrapped value as `T`, which is either the type the instance was created with,
    /// or one of the types its runtime type can be cast to.
    pub fn downcast<T: ?Sized + 'static>(&self) -> Option<InstancePtr<T>> {
        if let Some(instance) = self.payload.downcast_ref::<InstancePtr<T>>() {
            return Some(instance.clone());
        }

        let target = type_name::<T>();
        self.runtime_type
            .upcasts
            .iter()
            .filter(|upcast| upcast.target == target)
            .find_map(|upcast| (upcast.cast)(&*self.payload))
            .and_then(|cast| cast.downcast::<InstancePtr<T>>().ok())
            .map(|instance| *instance)
    }

    /// Like [Instance::downcast], but returns an error on incompatible types.
    pub fn downcast_typed<T: ?Sized + 'static>(&self) -> Result<InstancePtr<T>, ResolutionError> {
        self.downcast::<T>()
            .ok_or_else(|| ResolutionError::IncompatibleInstance {
                actual: self.type_name().to_string(),
                expected: type_name::<T>().to_string(),
            })
    }

    /// Checks if both handles point to the same value.
    #[inline]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.payload, &other.payload)
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.runtime_type.name)
            .field("kind", &self.runtime_type.kind)
            .finish()
    }
}
