//! Error types for step and scenario execution.

use std::error::Error;
use std::sync::Arc;

use crate::bindings::StepFailure;
use crate::container::ResolutionError;
use crate::context::ContextError;
use crate::conversion::ConversionError;
use crate::status::ScenarioExecutionStatus;

/// A step could not be bound to its definition.
///
/// Binding errors raise the scenario status to
/// [`ScenarioExecutionStatus::BindingError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BindingError {
    /// Several definitions match the step equally well.
    #[error("ambiguous step definitions found for step '{step}': {}", .candidates.join(", "))]
    AmbiguousSteps {
        /// The step as written.
        step: String,
        /// Competing definitions.
        candidates: Vec<String>,
    },
    /// Definitions match the step text but none accepts its arguments.
    #[error(
        "multiple step definitions match step '{step}' but none accepts its arguments: {}",
        .candidates.join(", ")
    )]
    AmbiguousParameters {
        /// The step as written.
        step: String,
        /// Definitions rejected for their parameters.
        candidates: Vec<String>,
    },
    /// The step supplies a different number of arguments than the definition
    /// takes.
    #[error("binding method {method} takes {expected} parameters but the step supplies {actual}")]
    ParameterCount {
        /// Definition method name.
        method: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },
    /// The definition body rejected how it was called.
    #[error("binding invocation failed: {0}")]
    Invocation(String),
    /// The definition is obsolete and obsolete steps are errors.
    #[error("step definition {method} is obsolete: {message}")]
    ObsoleteStep {
        /// Definition method name.
        method: String,
        /// Obsolescence message.
        message: String,
    },
    /// A required instance is missing from the containers.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// Failure of a single step or hook.
///
/// # Examples
///
/// ```
/// use stepflow::{ScenarioExecutionStatus, StepError, StepFailure};
///
/// let error = StepError::from_failure(StepFailure::message("card declined"));
/// assert_eq!(error.to_string(), "card declined");
/// assert_eq!(error.status(), ScenarioExecutionStatus::TestError);
/// assert_eq!(
///     StepError::from_failure(StepFailure::Pending).status(),
///     ScenarioExecutionStatus::StepDefinitionPending
/// );
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum StepError {
    /// A definition signalled that it is not implemented yet.
    #[error("step definition is pending")]
    PendingStepDefinition,
    /// No definition matches the step.
    #[error("no matching step definition found")]
    MissingStepDefinition,
    /// The step could not be bound.
    #[error(transparent)]
    Binding(#[from] BindingError),
    /// An argument could not be converted.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    /// The step or hook body returned an error.
    #[error("{0}")]
    Failed(Arc<dyn Error + Send + Sync>),
    /// The step or hook body panicked.
    #[error("step panicked: {0}")]
    Panicked(String),
    /// The context stack was used out of order.
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl StepError {
    /// Classify a failure reported by a binding body.
    #[must_use]
    pub fn from_failure(failure: StepFailure) -> Self {
        match failure {
            StepFailure::Pending => Self::PendingStepDefinition,
            StepFailure::Failed(error) => Self::Failed(Arc::from(error)),
            StepFailure::Binding(message) => Self::Binding(BindingError::Invocation(message)),
        }
    }

    /// A body failure carrying only `message`.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        let error: Box<dyn Error + Send + Sync> = message.into().into();
        Self::Failed(Arc::from(error))
    }

    /// Scenario status this error raises to.
    #[must_use]
    pub fn status(&self) -> ScenarioExecutionStatus {
        match self {
            Self::PendingStepDefinition => ScenarioExecutionStatus::StepDefinitionPending,
            Self::MissingStepDefinition => ScenarioExecutionStatus::UndefinedStep,
            Self::Binding(_) => ScenarioExecutionStatus::BindingError,
            Self::Conversion(_) | Self::Failed(_) | Self::Panicked(_) | Self::Context(_) => {
                ScenarioExecutionStatus::TestError
            }
        }
    }

    /// The body error, when the step failed with one.
    #[must_use]
    pub fn failure(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        match self {
            Self::Failed(error) => Some(error.as_ref()),
            _ => None,
        }
    }
}

/// Terminal failure of a scenario, raised after its last step.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ScenarioError {
    /// Steps are pending or undefined. The message lists them.
    #[error("{0}")]
    Pending(String),
    /// Steps are pending or undefined and the outcome is configured as
    /// inconclusive.
    #[error("{0}")]
    Inconclusive(String),
    /// A step failed. The error is the first one recorded at the final
    /// status.
    #[error(transparent)]
    Failed(Arc<StepError>),
    /// The scenario failed but no error was recorded.
    #[error("test failed with an unknown error")]
    UnknownError,
}

impl ScenarioError {
    /// The recorded step error, for failed scenarios.
    #[must_use]
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            Self::Failed(error) => Some(error.as_ref()),
            _ => None,
        }
    }
}

impl From<StepError> for ScenarioError {
    fn from(error: StepError) -> Self {
        Self::Failed(Arc::new(error))
    }
}

impl From<ContextError> for ScenarioError {
    fn from(error: ContextError) -> Self {
        Self::from(StepError::Context(error))
    }
}

/// How a scenario ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioOutcome {
    /// Every step passed.
    Passed,
    /// The scenario was skipped, or its pending steps are configured to be
    /// ignored.
    Ignored,
}
