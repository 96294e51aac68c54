//! Step bindings, hooks and transformations, and the catalog holding them.

use regex::Regex;
use std::fmt;

use crate::keyword::StepDefinitionType;

mod catalog;
mod invocation;
mod scope;
mod source;
mod types;

pub use catalog::{BindingCatalog, BindingCatalogBuilder};
pub use invocation::{
    ArgValue, Arguments, BindingContext, BindingFuture, BindingMethod, BindingResult, Invocable,
    RawArgument, StepFailure,
};
pub(crate) use scope::scope_weight;
pub use scope::{BindingScope, StepScope};
pub use source::{BindingSource, BindingSourceError, BindingSourceLoader, InventorySourceLoader};
pub use types::{BindingType, StepEnum};

/// Lifecycle event a hook is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize))]
pub enum HookType {
    /// Once, before the first runner starts.
    BeforeTestRun,
    /// Once, when the registry is disposed.
    AfterTestRun,
    /// Before each feature.
    BeforeFeature,
    /// After each feature.
    AfterFeature,
    /// Before each scenario.
    BeforeScenario,
    /// After each scenario that was not skipped.
    AfterScenario,
    /// When a Given, When or Then block opens.
    BeforeScenarioBlock,
    /// When a Given, When or Then block closes.
    AfterScenarioBlock,
    /// Before each executed step.
    BeforeStep,
    /// After each step whose `BeforeStep` hooks ran.
    AfterStep,
}

impl HookType {
    /// Every hook type, in lifecycle order.
    pub const ALL: [Self; 10] = [
        Self::BeforeTestRun,
        Self::AfterTestRun,
        Self::BeforeFeature,
        Self::AfterFeature,
        Self::BeforeScenario,
        Self::AfterScenario,
        Self::BeforeScenarioBlock,
        Self::AfterScenarioBlock,
        Self::BeforeStep,
        Self::AfterStep,
    ];
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn anchored(pattern: &str) -> Result<Regex, BindingSourceError> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| BindingSourceError::InvalidPattern {
        pattern: pattern.to_owned(),
        source,
    })
}

/// A step definition: a regex over step text bound to a method.
///
/// # Examples
///
/// ```
/// use stepflow::{BindingMethod, StepBinding, StepDefinitionType};
///
/// let binding = StepBinding::new(
///     StepDefinitionType::Given,
///     r"I have (\d+) cukes",
///     BindingMethod::new("cukes", |_ctx, _args| async { Ok(None) }),
/// )
/// .unwrap()
/// .with_parameter::<u32>();
/// assert!(binding.regex().is_match("I have 42 cukes"));
/// assert!(!binding.regex().is_match("I have 42 cukes today"));
/// ```
#[derive(Debug, Clone)]
pub struct StepBinding {
    step_type: StepDefinitionType,
    pattern: String,
    regex: Regex,
    parameters: Vec<BindingType>,
    method: BindingMethod,
    scope: Option<BindingScope>,
    obsolete: Option<String>,
}

impl StepBinding {
    /// Bind `pattern`, matched against the whole step text, to `method`.
    ///
    /// # Errors
    ///
    /// Returns [`BindingSourceError::InvalidPattern`] for an invalid regex.
    pub fn new(
        step_type: StepDefinitionType,
        pattern: &str,
        method: BindingMethod,
    ) -> Result<Self, BindingSourceError> {
        Ok(Self {
            step_type,
            pattern: pattern.to_owned(),
            regex: anchored(pattern)?,
            parameters: Vec::new(),
            method,
            scope: None,
            obsolete: None,
        })
    }

    /// Append a parameter of type `T`.
    #[must_use]
    pub fn with_parameter<T: Send + Sync + 'static>(self) -> Self {
        self.with_parameter_type(BindingType::of::<T>())
    }

    /// Append a parameter of an explicit [`BindingType`].
    #[must_use]
    pub fn with_parameter_type(mut self, parameter: BindingType) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Restrict the binding to `scope`.
    #[must_use]
    pub fn with_scope(mut self, scope: BindingScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Mark the binding obsolete with an explanatory message.
    #[must_use]
    pub fn obsolete(mut self, message: impl Into<String>) -> Self {
        self.obsolete = Some(message.into());
        self
    }

    /// Step type the binding applies to.
    #[must_use]
    pub fn step_type(&self) -> StepDefinitionType {
        self.step_type
    }

    /// Pattern as registered.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Anchored regex used for matching.
    #[must_use]
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Parameter types in call order.
    #[must_use]
    pub fn parameters(&self) -> &[BindingType] {
        &self.parameters
    }

    /// Bound method.
    #[must_use]
    pub fn method(&self) -> &BindingMethod {
        &self.method
    }

    /// Scope restriction, if any.
    #[must_use]
    pub fn scope(&self) -> Option<&BindingScope> {
        self.scope.as_ref()
    }

    /// Obsolescence message, if the binding is obsolete.
    #[must_use]
    pub fn obsolete_message(&self) -> Option<&str> {
        self.obsolete.as_deref()
    }
}

/// A method run at a lifecycle event.
#[derive(Debug, Clone)]
pub struct HookBinding {
    hook_type: HookType,
    order: i32,
    scope: Option<BindingScope>,
    method: BindingMethod,
}

impl HookBinding {
    /// Order used when none is given.
    pub const DEFAULT_ORDER: i32 = 10_000;

    /// Attach `method` to `hook_type` with the default order.
    #[must_use]
    pub fn new(hook_type: HookType, method: BindingMethod) -> Self {
        Self {
            hook_type,
            order: Self::DEFAULT_ORDER,
            scope: None,
            method,
        }
    }

    /// Set the order key; lower keys run first.
    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Restrict the hook to `scope`.
    #[must_use]
    pub fn with_scope(mut self, scope: BindingScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Event the hook runs at.
    #[must_use]
    pub fn hook_type(&self) -> HookType {
        self.hook_type
    }

    /// Order key.
    #[must_use]
    pub fn order(&self) -> i32 {
        self.order
    }

    /// Scope restriction, if any.
    #[must_use]
    pub fn scope(&self) -> Option<&BindingScope> {
        self.scope.as_ref()
    }

    /// Hook body.
    #[must_use]
    pub fn method(&self) -> &BindingMethod {
        &self.method
    }
}

/// A user conversion into a parameter type.
///
/// Without a regex the transformation receives the raw argument (a `String`
/// or a [`Table`](crate::Table)) as its single argument. With a regex it
/// applies only to matching text, and each capture group is converted into
/// the corresponding parameter type first.
#[derive(Debug, Clone)]
pub struct StepTransformation {
    return_type: BindingType,
    regex: Option<Regex>,
    parameters: Vec<BindingType>,
    method: BindingMethod,
}

impl StepTransformation {
    /// Transformation producing `return_type`.
    #[must_use]
    pub fn new(return_type: BindingType, method: BindingMethod) -> Self {
        Self {
            return_type,
            regex: None,
            parameters: Vec::new(),
            method,
        }
    }

    /// Apply only to text matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`BindingSourceError::InvalidPattern`] for an invalid regex.
    pub fn with_regex(mut self, pattern: &str) -> Result<Self, BindingSourceError> {
        self.regex = Some(anchored(pattern)?);
        Ok(self)
    }

    /// Append a capture parameter of type `T`.
    #[must_use]
    pub fn with_parameter<T: Send + Sync + 'static>(self) -> Self {
        self.with_parameter_type(BindingType::of::<T>())
    }

    /// Append a capture parameter of an explicit [`BindingType`].
    #[must_use]
    pub fn with_parameter_type(mut self, parameter: BindingType) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Produced type.
    #[must_use]
    pub fn return_type(&self) -> &BindingType {
        &self.return_type
    }

    /// Regex restricting the input text, if any.
    #[must_use]
    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    /// Capture parameter types.
    #[must_use]
    pub fn parameters(&self) -> &[BindingType] {
        &self.parameters
    }

    /// Transformation body.
    #[must_use]
    pub fn method(&self) -> &BindingMethod {
        &self.method
    }
}
