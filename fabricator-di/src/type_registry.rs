//! Functionality related to registering constructible types under logical names. A registry can be
//! chained to a parent one, which is consulted when a name is not bound locally. Such override
//! registries can rebind names without affecting their parents, which is useful for scoped
//! configuration or tests.

use crate::error::TypeRegistryError;
use crate::type_model::{TypeModel, TypeModelPtr};
use fxhash::FxHashMap;
use std::any::type_name;
use std::rc::Rc;
use tracing::trace;

/// Registry of [TypeModel]s bound to logical names.
#[derive(Default, Clone, Debug)]
pub struct TypeRegistry {
    name: Option<String>,
    types: FxHashMap<String, TypeModelPtr>,
    parent: Option<Rc<TypeRegistry>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Binds given name to a type. Each name can be bound only once per registry level.
    pub fn register<N: Into<String>>(
        &mut self,
        name: N,
        model: TypeModelPtr,
    ) -> Result<(), TypeRegistryError> {
        let name = name.into();
        if let Some(existing) = self.types.get(&name) {
            return Err(TypeRegistryError::DuplicateRegistration {
                name,
                existing_type: existing.name().to_string(),
                new_type: model.name().to_string(),
            });
        }

        trace!(name = %name, type_name = model.name(), "Registering type");

        self.types.insert(name, model);
        Ok(())
    }

    /// Binds a type under its own name.
    pub fn register_type(&mut self, model: TypeModel) -> Result<TypeModelPtr, TypeRegistryError> {
        let model = TypeModelPtr::new(model);
        self.register(model.name().to_string(), model.clone())?;
        Ok(model)
    }

    /// Binds a type under the name of the interface `I`, so it can be injected wherever `I` is
    /// requested.
    pub fn register_interface<I: ?Sized + 'static>(
        &mut self,
        model: TypeModelPtr,
    ) -> Result<(), TypeRegistryError> {
        self.register(type_name::<I>(), model)
    }

    /// Looks up a type by name, falling back to parent registries.
    pub fn lookup(&self, name: &str) -> Option<TypeModelPtr> {
        let mut registry = Some(self);
        while let Some(current) = registry {
            if let Some(model) = current.types.get(name) {
                return Some(model.clone());
            }

            registry = current.parent.as_deref();
        }

        None
    }

    /// Looks up a type by name, without consulting parent registries.
    #[inline]
    pub fn lookup_local(&self, name: &str) -> Option<TypeModelPtr> {
        self.types.get(name).cloned()
    }

    #[inline]
    pub fn is_registered(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Creates a new, empty registry which falls back to this one.
    pub fn override_registry(self: &Rc<Self>, name: Option<&str>) -> TypeRegistry {
        TypeRegistry {
            name: name.map(str::to_string),
            types: Default::default(),
            parent: Some(self.clone()),
        }
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn parent(&self) -> Option<&Rc<TypeRegistry>> {
        self.parent.as_ref()
    }

    /// Names bound at this level.
    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}
