//! Building and sealing the binding catalog.

use std::collections::HashMap;

use super::{HookBinding, HookType, StepBinding, StepTransformation};

/// Mutable collector of bindings, sealed into a [`BindingCatalog`].
#[derive(Debug, Default)]
pub struct BindingCatalogBuilder {
    sources: Vec<String>,
    steps: Vec<StepBinding>,
    hooks: Vec<HookBinding>,
    transformations: Vec<StepTransformation>,
}

impl BindingCatalogBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the bindings added next come from `source`.
    pub fn begin_source(&mut self, source: impl Into<String>) -> &mut Self {
        self.sources.push(source.into());
        self
    }

    /// Add a step definition.
    pub fn add_step(&mut self, binding: StepBinding) -> &mut Self {
        self.steps.push(binding);
        self
    }

    /// Add a hook.
    pub fn add_hook(&mut self, hook: HookBinding) -> &mut Self {
        self.hooks.push(hook);
        self
    }

    /// Add a step argument transformation.
    pub fn add_transformation(&mut self, transformation: StepTransformation) -> &mut Self {
        self.transformations.push(transformation);
        self
    }

    /// Seal the collected bindings. Registration order is preserved.
    #[must_use]
    pub fn building_completed(self) -> BindingCatalog {
        let mut hooks: HashMap<HookType, Vec<HookBinding>> = HashMap::new();
        for hook in self.hooks {
            hooks.entry(hook.hook_type()).or_default().push(hook);
        }
        log::debug!(
            target: "stepflow",
            "binding catalog sealed: {} steps, {} transformations, sources {:?}",
            self.steps.len(),
            self.transformations.len(),
            self.sources
        );
        BindingCatalog {
            sources: self.sources,
            steps: self.steps,
            hooks,
            transformations: self.transformations,
        }
    }
}

/// Read-only set of bindings shared by every runner of a registry.
#[derive(Debug, Default)]
pub struct BindingCatalog {
    sources: Vec<String>,
    steps: Vec<StepBinding>,
    hooks: HashMap<HookType, Vec<HookBinding>>,
    transformations: Vec<StepTransformation>,
}

impl BindingCatalog {
    /// Step definitions in registration order.
    #[must_use]
    pub fn step_bindings(&self) -> &[StepBinding] {
        &self.steps
    }

    /// Hooks for `hook_type` in registration order.
    #[must_use]
    pub fn hooks(&self, hook_type: HookType) -> &[HookBinding] {
        self.hooks.get(&hook_type).map(Vec::as_slice).unwrap_or_default()
    }

    /// Transformations in registration order.
    #[must_use]
    pub fn step_transformations(&self) -> &[StepTransformation] {
        &self.transformations
    }

    /// Names of the sources the catalog was built from.
    #[must_use]
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Serialize the catalog to JSON for external tooling.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    #[cfg(feature = "diagnostics")]
    pub fn dump(&self) -> serde_json::Result<String> {
        dump::dump_catalog(self)
    }
}

#[cfg(feature = "diagnostics")]
mod dump {
    use serde::Serialize;

    use super::BindingCatalog;
    use crate::bindings::{BindingScope, HookType};
    use crate::keyword::StepDefinitionType;

    #[derive(Serialize)]
    struct DumpedStep<'a> {
        step_type: StepDefinitionType,
        pattern: &'a str,
        method: &'a str,
        parameters: Vec<&'static str>,
        scope: Option<&'a BindingScope>,
        obsolete: Option<&'a str>,
    }

    #[derive(Serialize)]
    struct DumpedHook<'a> {
        hook_type: HookType,
        order: i32,
        method: &'a str,
        scope: Option<&'a BindingScope>,
    }

    #[derive(Serialize)]
    struct DumpedTransformation<'a> {
        return_type: &'static str,
        regex: Option<&'a str>,
        method: &'a str,
    }

    #[derive(Serialize)]
    struct CatalogDump<'a> {
        sources: &'a [String],
        steps: Vec<DumpedStep<'a>>,
        hooks: Vec<DumpedHook<'a>>,
        transformations: Vec<DumpedTransformation<'a>>,
    }

    pub(super) fn dump_catalog(catalog: &BindingCatalog) -> serde_json::Result<String> {
        let steps = catalog
            .step_bindings()
            .iter()
            .map(|step| DumpedStep {
                step_type: step.step_type(),
                pattern: step.pattern(),
                method: step.method().name(),
                parameters: step.parameters().iter().map(|p| p.name()).collect(),
                scope: step.scope(),
                obsolete: step.obsolete_message(),
            })
            .collect();
        let hooks = HookType::ALL
            .iter()
            .flat_map(|hook_type| catalog.hooks(*hook_type))
            .map(|hook| DumpedHook {
                hook_type: hook.hook_type(),
                order: hook.order(),
                method: hook.method().name(),
                scope: hook.scope(),
            })
            .collect();
        let transformations = catalog
            .step_transformations()
            .iter()
            .map(|transformation| DumpedTransformation {
                return_type: transformation.return_type().name(),
                regex: transformation.regex().map(regex::Regex::as_str),
                method: transformation.method().name(),
            })
            .collect();
        serde_json::to_string_pretty(&CatalogDump {
            sources: catalog.sources(),
            steps,
            hooks,
            transformations,
        })
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    reason = "tests inspect the dumped JSON directly"
)]
mod tests {
    use super::*;
    use crate::bindings::BindingMethod;

    fn method(name: &str) -> BindingMethod {
        BindingMethod::new(name, |_ctx, _args| async { Ok(None) })
    }

    #[test]
    fn hooks_are_grouped_by_type_in_registration_order() {
        let mut builder = BindingCatalogBuilder::new();
        builder
            .add_hook(HookBinding::new(HookType::BeforeScenario, method("a")))
            .add_hook(HookBinding::new(HookType::AfterStep, method("b")))
            .add_hook(HookBinding::new(HookType::BeforeScenario, method("c")));
        let catalog = builder.building_completed();
        let names: Vec<_> = catalog
            .hooks(HookType::BeforeScenario)
            .iter()
            .map(|hook| hook.method().name())
            .collect();
        assert_eq!(names, ["a", "c"]);
        assert!(catalog.hooks(HookType::BeforeTestRun).is_empty());
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    fn dump_lists_every_binding() {
        use crate::bindings::BindingScope;
        use crate::keyword::StepDefinitionType;

        let mut builder = BindingCatalogBuilder::new();
        builder.begin_source("acceptance").add_step(
            StepBinding::new(StepDefinitionType::When, "I pay", method("pay"))
                .unwrap()
                .with_scope(BindingScope::new().with_tag("web")),
        );
        let json: serde_json::Value =
            serde_json::from_str(&builder.building_completed().dump().unwrap()).unwrap();
        assert_eq!(json["sources"][0], "acceptance");
        assert_eq!(json["steps"][0]["pattern"], "I pay");
        assert_eq!(json["steps"][0]["step_type"], "When");
        assert_eq!(json["steps"][0]["scope"]["tag"], "web");
    }
}
