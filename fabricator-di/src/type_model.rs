//! A [TypeModel] describes how to construct a type and how to inject its dependencies. Since there
//! is no runtime reflection, models are built explicitly with a [TypeModelBuilder], which captures
//! typed closures and exposes them to the engine in a type-erased form.
//!
//! ## Describing a type
//!
//! ```
//! use fabricator_di::instance::InstancePtr;
//! use fabricator_di::type_model::{ParameterType, TypeModel};
//!
//! trait Logger {
//!     fn log(&self, message: &str);
//! }
//!
//! struct Service {
//!     logger: InstancePtr<dyn Logger>,
//!     prefix: u32,
//!     // injected after construction
//!     pub audit: Option<InstancePtr<dyn Logger>>,
//! }
//!
//! let model = TypeModel::builder::<Service>()
//!     // Service(logger)
//!     .constructor(vec![ParameterType::interface::<dyn Logger>()], |arguments| {
//!         Ok(Service {
//!             logger: arguments.get::<dyn Logger>(0)?,
//!             prefix: 0,
//!             audit: None,
//!         })
//!     })
//!     // Service(prefix, logger)
//!     .constructor(
//!         vec![
//!             ParameterType::value::<u32>(),
//!             ParameterType::interface::<dyn Logger>(),
//!         ],
//!         |arguments| {
//!             Ok(Service {
//!                 prefix: arguments.value::<u32>(0)?,
//!                 logger: arguments.get::<dyn Logger>(1)?,
//!                 audit: None,
//!             })
//!         },
//!     )
//!     .named_property::<dyn Logger>("audit", "audit_logger", |service| &mut service.audit)
//!     .build();
//!
//! assert_eq!(model.constructors().len(), 2);
//! ```
//!
//! ### Parameter kinds
//!
//! * [TypeKind::Value] - plain data, which must always be supplied explicitly and never is null
//! * [TypeKind::Class] - concrete types; can be supplied explicitly or as null
//! * [TypeKind::Interface] - abstract types; additionally eligible for implicit injection

use crate::error::ResolutionError;
use crate::instance::{
    Instance, InstanceAnyPtr, InstancePtr, RuntimeType, RuntimeTypePtr, TypeKind, Upcast,
};
use derivative::Derivative;
use itertools::Itertools;
use std::any::{type_name, Any};
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;
use std::rc::Rc;

pub type TypeModelPtr = Rc<TypeModel>;

type ConstructFunction = Rc<dyn Fn(&Arguments) -> Result<Box<dyn Any>, ResolutionError>>;
type SealFunction = fn(Box<dyn Any>) -> Result<InstanceAnyPtr, Box<dyn Any>>;
type ProbeFunction = Rc<dyn Fn(&mut dyn Any) -> bool>;
type AssignFunction = Rc<dyn Fn(&mut dyn Any, &Instance) -> Result<(), ResolutionError>>;

/// Declared type of a constructor parameter or a property.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ParameterType {
    pub name: String,
    pub kind: TypeKind,
}

impl ParameterType {
    pub fn new<N: Into<String>>(name: N, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn value<T: 'static>() -> Self {
        Self::new(type_name::<T>(), TypeKind::Value)
    }

    pub fn class<T: 'static>() -> Self {
        Self::new(type_name::<T>(), TypeKind::Class)
    }

    pub fn interface<T: ?Sized + 'static>() -> Self {
        Self::new(type_name::<T>(), TypeKind::Interface)
    }

    #[inline]
    pub fn is_reference(&self) -> bool {
        self.kind.is_reference()
    }
}

impl Display for ParameterType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Positional constructor arguments: explicitly supplied ones followed by injected ones.
#[derive(Clone, Debug, Default)]
pub struct Arguments {
    values: Vec<Option<Instance>>,
}

impl Arguments {
    pub fn new(values: Vec<Option<Instance>>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the raw argument, if present and not null.
    pub fn instance(&self, index: usize) -> Option<&Instance> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Returns a required argument.
    pub fn get<T: ?Sized + 'static>(&self, index: usize) -> Result<InstancePtr<T>, ResolutionError> {
        self.optional::<T>(index)?
            .ok_or_else(|| Self::incompatible::<T>(index))
    }

    /// Returns an argument which can be null.
    pub fn optional<T: ?Sized + 'static>(
        &self,
        index: usize,
    ) -> Result<Option<InstancePtr<T>>, ResolutionError> {
        self.instance(index)
            .map(|instance| {
                instance
                    .downcast::<T>()
                    .ok_or_else(|| Self::incompatible::<T>(index))
            })
            .transpose()
    }

    /// Returns a copy of a plain value argument.
    pub fn value<T: Clone + 'static>(&self, index: usize) -> Result<T, ResolutionError> {
        self.get::<T>(index).map(|value| (*value).clone())
    }

    fn incompatible<T: ?Sized>(index: usize) -> ResolutionError {
        ResolutionError::IncompatibleArgument {
            index,
            expected: type_name::<T>().to_string(),
        }
    }
}

/// One of the constructors of a type.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct ConstructorCandidate {
    pub parameters: Vec<ParameterType>,

    #[derivative(Debug = "ignore")]
    construct: ConstructFunction,
}

impl ConstructorCandidate {
    /// Calls the constructor. The result is an owned, not yet shared object, so properties can
    /// still be injected.
    pub fn invoke(&self, arguments: &Arguments) -> Result<Box<dyn Any>, ResolutionError> {
        (self.construct)(arguments)
    }

    /// Human-readable parameter list, e.g. `(u32, dyn app::Logger)`.
    pub fn signature(&self) -> String {
        format!("({})", self.parameters.iter().join(", "))
    }
}

/// A property marked for injection.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct PropertyModel {
    pub name: String,
    pub property_type: ParameterType,

    /// Name of the dependency to inject, if other than the name of the declared type.
    pub override_name: Option<String>,

    /// Injection into non-public properties is a configuration error.
    pub is_public: bool,

    #[derivative(Debug = "ignore")]
    probe: ProbeFunction,

    #[derivative(Debug = "ignore")]
    assign: AssignFunction,
}

impl PropertyModel {
    /// Name of the dependency which should be injected.
    #[inline]
    pub fn dependency_name(&self) -> &str {
        self.override_name
            .as_deref()
            .unwrap_or(&self.property_type.name)
    }

    /// Checks if the property of given object already holds a value.
    pub fn is_set(&self, object: &mut dyn Any) -> bool {
        (self.probe)(object)
    }

    pub fn assign(&self, object: &mut dyn Any, value: &Instance) -> Result<(), ResolutionError> {
        (self.assign)(object, value)
    }
}

/// Construction and injection metadata for a single type.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TypeModel {
    runtime_type: RuntimeTypePtr,
    constructors: Vec<ConstructorCandidate>,
    properties: Vec<PropertyModel>,

    #[derivative(Debug = "ignore")]
    seal: SealFunction,
}

impl TypeModel {
    pub fn builder<C: 'static>() -> TypeModelBuilder<C> {
        TypeModelBuilder::new()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.runtime_type.name
    }

    #[inline]
    pub fn runtime_type(&self) -> &RuntimeTypePtr {
        &self.runtime_type
    }

    #[inline]
    pub fn constructors(&self) -> &[ConstructorCandidate] {
        &self.constructors
    }

    #[inline]
    pub fn properties(&self) -> &[PropertyModel] {
        &self.properties
    }

    /// Turns a constructed object into a shared [Instance].
    pub(crate) fn seal(&self, object: Box<dyn Any>) -> Result<Instance, ResolutionError> {
        (self.seal)(object)
            .map(|payload| Instance::from_payload(self.runtime_type.clone(), payload))
            .map_err(|_| ResolutionError::IncompatibleInstance {
                actual: "<constructed object>".to_string(),
                expected: self.name().to_string(),
            })
    }
}

fn seal<C: 'static>(object: Box<dyn Any>) -> Result<InstanceAnyPtr, Box<dyn Any>> {
    object
        .downcast::<C>()
        .map(|object| Rc::new(InstancePtr::new(*object)) as InstanceAnyPtr)
}

/// Typed builder for [TypeModel]s describing type `C`.
pub struct TypeModelBuilder<C> {
    name: String,
    constructors: Vec<ConstructorCandidate>,
    properties: Vec<PropertyModel>,
    upcasts: Vec<Upcast>,
    _type: PhantomData<fn() -> C>,
}

impl<C: 'static> Default for TypeModelBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> TypeModelBuilder<C> {
    /// Creates a builder for a type named after `C`.
    pub fn new() -> Self {
        Self {
            name: type_name::<C>().to_string(),
            constructors: Default::default(),
            properties: Default::default(),
            upcasts: Default::default(),
            _type: PhantomData,
        }
    }

    /// Uses a custom logical type name instead of the Rust one.
    pub fn with_name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a constructor taking given parameters. Explicitly supplied arguments come first,
    /// followed by injected ones.
    pub fn constructor<F>(mut self, parameters: Vec<ParameterType>, constructor: F) -> Self
    where
        F: Fn(&Arguments) -> Result<C, ResolutionError> + 'static,
    {
        self.constructors.push(ConstructorCandidate {
            parameters,
            construct: Rc::new(move |arguments: &Arguments| {
                constructor(arguments).map(|object| Box::new(object) as Box<dyn Any>)
            }),
        });
        self
    }

    /// Adds a public property injected with a dependency named after `T`.
    pub fn property<T: ?Sized + 'static>(
        self,
        name: &str,
        accessor: fn(&mut C) -> &mut Option<InstancePtr<T>>,
    ) -> Self {
        self.push_property(name, None, true, accessor)
    }

    /// Adds a public property injected with a dependency named `dependency_name`.
    pub fn named_property<T: ?Sized + 'static>(
        self,
        name: &str,
        dependency_name: &str,
        accessor: fn(&mut C) -> &mut Option<InstancePtr<T>>,
    ) -> Self {
        self.push_property(name, Some(dependency_name.to_string()), true, accessor)
    }

    /// Marks a non-public property for injection. Creating instances of such type will fail with
    /// [ResolutionError::InvalidInjectionTarget].
    pub fn non_public_property<T: ?Sized + 'static>(
        self,
        name: &str,
        accessor: fn(&mut C) -> &mut Option<InstancePtr<T>>,
    ) -> Self {
        self.push_property(name, None, false, accessor)
    }

    /// Declares that `C` can be used as `I`, usually a `dyn Trait`.
    pub fn implements<I: ?Sized + 'static>(
        mut self,
        upcast: fn(InstancePtr<C>) -> InstancePtr<I>,
    ) -> Self {
        self.upcasts.push(Upcast {
            target: type_name::<I>().to_string(),
            cast: Rc::new(move |payload: &dyn Any| {
                payload
                    .downcast_ref::<InstancePtr<C>>()
                    .map(|instance| Box::new(upcast(instance.clone())) as Box<dyn Any>)
            }),
        });
        self
    }

    pub fn build(self) -> TypeModel {
        let mut runtime_type = RuntimeType::new(self.name, TypeKind::Class);
        runtime_type.upcasts = self.upcasts;

        TypeModel {
            runtime_type: RuntimeTypePtr::new(runtime_type),
            constructors: self.constructors,
            properties: self.properties,
            seal: seal::<C>,
        }
    }

    fn push_property<T: ?Sized + 'static>(
        mut self,
        name: &str,
        override_name: Option<String>,
        is_public: bool,
        accessor: fn(&mut C) -> &mut Option<InstancePtr<T>>,
    ) -> Self {
        let probe = move |object: &mut dyn Any| {
            object
                .downcast_mut::<C>()
                .map(|object| accessor(object).is_some())
                .unwrap_or(false)
        };

        let assign = move |object: &mut dyn Any, value: &Instance| -> Result<(), ResolutionError> {
            let object =
                object
                    .downcast_mut::<C>()
                    .ok_or_else(|| ResolutionError::IncompatibleInstance {
                        actual: "<unknown object>".to_string(),
                        expected: type_name::<C>().to_string(),
                    })?;

            *accessor(object) = Some(value.downcast_typed::<T>()?);
            Ok(())
        };

        self.properties.push(PropertyModel {
            name: name.to_string(),
            property_type: ParameterType::interface::<T>(),
            override_name,
            is_public,
            probe: Rc::new(probe),
            assign: Rc::new(assign),
        });
        self
    }
}
