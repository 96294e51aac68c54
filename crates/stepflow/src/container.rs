//! Scoped, type-keyed resource containers.
//!
//! Containers nest global → test thread → feature → scenario. A lookup walks
//! from the receiving container towards the root and returns the instance
//! held by the nearest scope. Dropping or clearing a container releases the
//! instances it owns; instances owned by outer scopes are unaffected.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Instances = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Lifetime a container is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerScope {
    /// Lives as long as its runner registry.
    Global,
    /// Lives as long as one runner.
    TestThread,
    /// Lives for one feature.
    Feature,
    /// Lives for one scenario.
    Scenario,
}

/// Error returned when a required instance is not registered in any scope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no instance of {type_name} is registered in the {scope:?} container or its parents")]
pub struct ResolutionError {
    /// Name of the requested type.
    pub type_name: &'static str,
    /// Scope of the container the lookup started from.
    pub scope: ContainerScope,
}

/// A container of shared instances keyed by their concrete type.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use stepflow::{ContainerScope, ObjectContainer};
///
/// let feature = Arc::new(ObjectContainer::root(ContainerScope::Feature));
/// let scenario = ObjectContainer::child(&feature, ContainerScope::Scenario);
/// feature.register_instance(String::from("shared"));
///
/// assert_eq!(scenario.resolve::<String>().as_str(), "shared");
/// let counter = scenario.resolve::<u32>();
/// assert!(feature.try_get::<u32>().is_none());
/// assert!(Arc::ptr_eq(&counter, &scenario.resolve::<u32>()));
/// ```
#[derive(Debug)]
pub struct ObjectContainer {
    scope: ContainerScope,
    parent: Option<Arc<ObjectContainer>>,
    instances: Mutex<Instances>,
}

impl ObjectContainer {
    /// Create a container with no parent.
    #[must_use]
    pub fn root(scope: ContainerScope) -> Self {
        Self {
            scope,
            parent: None,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Create a container nested inside `parent`.
    #[must_use]
    pub fn child(parent: &Arc<Self>, scope: ContainerScope) -> Self {
        Self {
            scope,
            parent: Some(Arc::clone(parent)),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Scope this container is bound to.
    #[must_use]
    pub fn scope(&self) -> ContainerScope {
        self.scope
    }

    /// Parent container, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<Self>> {
        self.parent.as_ref()
    }

    fn lock(&self) -> MutexGuard<'_, Instances> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `value` in this scope, replacing any instance of the same type.
    pub fn register_instance<T>(&self, value: T) -> Arc<T>
    where
        T: Send + Sync + 'static,
    {
        let value = Arc::new(value);
        self.lock().insert(
            TypeId::of::<T>(),
            Arc::clone(&value) as Arc<dyn Any + Send + Sync>,
        );
        value
    }

    /// Look up an instance in this scope or any parent scope.
    #[must_use]
    pub fn try_get<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let own = self
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|value| Arc::clone(value).downcast::<T>().ok());
        own.or_else(|| self.parent.as_ref().and_then(|parent| parent.try_get::<T>()))
    }

    /// Look up an instance that must already be registered.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError`] when no scope holds an instance of `T`.
    pub fn get<T>(&self) -> Result<Arc<T>, ResolutionError>
    where
        T: Send + Sync + 'static,
    {
        self.try_get::<T>().ok_or(ResolutionError {
            type_name: std::any::type_name::<T>(),
            scope: self.scope,
        })
    }

    /// Return the nearest instance of `T`, creating one in this scope with
    /// `create` when no scope holds one.
    pub fn resolve_with<T, F>(&self, create: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let mut instances = self.lock();
        if let Some(value) = instances
            .get(&TypeId::of::<T>())
            .and_then(|value| Arc::clone(value).downcast::<T>().ok())
        {
            return value;
        }
        // Lock order is always child before parent.
        if let Some(value) = self.parent.as_ref().and_then(|parent| parent.try_get::<T>()) {
            return value;
        }
        let value = Arc::new(create());
        instances.insert(
            TypeId::of::<T>(),
            Arc::clone(&value) as Arc<dyn Any + Send + Sync>,
        );
        value
    }

    /// Return the nearest instance of `T`, default-constructing one in this
    /// scope when none exists.
    pub fn resolve<T>(&self) -> Arc<T>
    where
        T: Default + Send + Sync + 'static,
    {
        self.resolve_with(T::default)
    }

    /// Whether this scope itself holds an instance of `T`.
    #[must_use]
    pub fn is_registered<T: 'static>(&self) -> bool {
        self.lock().contains_key(&TypeId::of::<T>())
    }

    /// Number of instances owned by this scope.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether this scope owns no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Release every instance owned by this scope.
    pub fn clear(&self) {
        let released = std::mem::take(&mut *self.lock());
        drop(released);
    }
}
