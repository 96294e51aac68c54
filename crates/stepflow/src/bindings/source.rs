//! Named binding sources and their loaders.
//!
//! A source is a registration function published under a name with
//! [`binding_source!`](crate::binding_source). Registries load the source
//! named after their assembly first, then any configured additional sources.

use super::BindingCatalogBuilder;

/// Error raised while registering bindings.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BindingSourceError {
    /// A step or transformation pattern is not a valid regex.
    #[error("invalid binding pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// Pattern as written.
        pattern: String,
        /// Regex compilation error.
        source: regex::Error,
    },
    /// No source is published under the requested name.
    #[error("binding source {0:?} is not registered")]
    NotFound(String),
    /// A registration function reported a failure.
    #[error("binding source {name:?} failed to register: {message}")]
    Registration {
        /// Source name.
        name: String,
        /// Failure description.
        message: String,
    },
}

/// A named registration function collected through `inventory`.
#[derive(Debug)]
pub struct BindingSource {
    /// Name the source is loaded by.
    pub name: &'static str,
    /// Adds the source's bindings to the builder.
    pub register: fn(&mut BindingCatalogBuilder) -> Result<(), BindingSourceError>,
}

inventory::collect!(BindingSource);

/// Publish a binding source.
///
/// # Examples
///
/// ```
/// use stepflow::{
///     binding_source, BindingCatalogBuilder, BindingMethod, BindingSourceError,
///     BindingSourceLoader, InventorySourceLoader, StepBinding, StepDefinitionType,
/// };
///
/// fn register(builder: &mut BindingCatalogBuilder) -> Result<(), BindingSourceError> {
///     builder.add_step(StepBinding::new(
///         StepDefinitionType::Given,
///         "a clean basket",
///         BindingMethod::new("basket", |_ctx, _args| async { Ok(None) }),
///     )?);
///     Ok(())
/// }
///
/// binding_source!("shop-steps", register);
///
/// let mut builder = BindingCatalogBuilder::new();
/// assert_eq!(InventorySourceLoader.load("shop-steps", &mut builder).unwrap(), 1);
/// assert_eq!(builder.building_completed().step_bindings().len(), 1);
/// ```
#[macro_export]
macro_rules! binding_source {
    ($name:expr, $register:path $(,)?) => {
        $crate::submit! {
            $crate::BindingSource {
                name: $name,
                register: $register,
            }
        }
    };
}

/// Resolves source names to bindings.
pub trait BindingSourceLoader: Send + Sync {
    /// Register every source published under `name` into `builder`.
    ///
    /// Returns the number of sources found.
    ///
    /// # Errors
    ///
    /// Propagates failures raised by registration functions.
    fn load(
        &self,
        name: &str,
        builder: &mut BindingCatalogBuilder,
    ) -> Result<usize, BindingSourceError>;
}

/// Loader reading sources published with [`binding_source!`](crate::binding_source).
#[derive(Debug, Default, Clone, Copy)]
pub struct InventorySourceLoader;

impl BindingSourceLoader for InventorySourceLoader {
    fn load(
        &self,
        name: &str,
        builder: &mut BindingCatalogBuilder,
    ) -> Result<usize, BindingSourceError> {
        let mut found = 0;
        for source in inventory::iter::<BindingSource> {
            if source.name == name {
                builder.begin_source(name);
                (source.register)(builder)?;
                found += 1;
            }
        }
        log::debug!(target: "stepflow", "loaded {found} binding source(s) named {name:?}");
        Ok(found)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests fail loudly on unexpected errors")]
mod tests {
    use super::*;
    use crate::bindings::{BindingMethod, HookBinding, HookType};

    fn register_unit(builder: &mut BindingCatalogBuilder) -> Result<(), BindingSourceError> {
        builder.add_hook(HookBinding::new(
            HookType::BeforeScenario,
            BindingMethod::new("unit::before", |_ctx, _args| async { Ok(None) }),
        ));
        Ok(())
    }

    fn register_broken(_builder: &mut BindingCatalogBuilder) -> Result<(), BindingSourceError> {
        Err(BindingSourceError::Registration {
            name: "stepflow-unit-broken".into(),
            message: "database unavailable".into(),
        })
    }

    crate::binding_source!("stepflow-unit", register_unit);
    crate::binding_source!("stepflow-unit-broken", register_broken);

    #[test]
    fn loads_sources_by_name() {
        let mut builder = BindingCatalogBuilder::new();
        assert_eq!(InventorySourceLoader.load("stepflow-unit", &mut builder).unwrap(), 1);
        assert_eq!(InventorySourceLoader.load("no-such-source", &mut builder).unwrap(), 0);
        let catalog = builder.building_completed();
        assert_eq!(catalog.hooks(HookType::BeforeScenario).len(), 1);
        assert_eq!(catalog.sources(), ["stepflow-unit".to_string()]);
    }

    #[test]
    fn registration_failures_propagate() {
        let mut builder = BindingCatalogBuilder::new();
        let err = InventorySourceLoader
            .load("stepflow-unit-broken", &mut builder)
            .unwrap_err();
        assert!(err.to_string().contains("database unavailable"));
    }
}
