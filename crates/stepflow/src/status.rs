//! Scenario execution status.
//!
//! Status values form a severity scale. A scenario starts at
//! [`ScenarioExecutionStatus::Ok`] and every failure raises it; nothing lowers
//! it again. [`ExecutionStatus`] is the only place the scenario status lives,
//! and its sole mutator is [`ExecutionStatus::raise`].

use std::fmt;

/// Severity-ordered outcome of a scenario so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize))]
pub enum ScenarioExecutionStatus {
    /// Every step executed so far succeeded.
    #[default]
    Ok,
    /// The scenario was skipped before execution.
    Skipped,
    /// A step definition signalled that it is not implemented yet.
    StepDefinitionPending,
    /// No step definition matched a step.
    UndefinedStep,
    /// Invoking a binding failed for infrastructure reasons.
    BindingError,
    /// A step failed.
    TestError,
}

impl ScenarioExecutionStatus {
    /// Return the lowercase label for the status.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Skipped => "skipped",
            Self::StepDefinitionPending => "pending",
            Self::UndefinedStep => "undefined",
            Self::BindingError => "binding-error",
            Self::TestError => "test-error",
        }
    }

    /// Whether the status still permits steps to execute.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ScenarioExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Monotonic holder for a scenario's [`ScenarioExecutionStatus`].
///
/// # Examples
///
/// ```
/// use stepflow::{ExecutionStatus, ScenarioExecutionStatus};
///
/// let mut status = ExecutionStatus::default();
/// assert!(status.raise(ScenarioExecutionStatus::TestError));
/// assert!(!status.raise(ScenarioExecutionStatus::StepDefinitionPending));
/// assert_eq!(status.get(), ScenarioExecutionStatus::TestError);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionStatus(ScenarioExecutionStatus);

impl ExecutionStatus {
    /// The current status.
    #[must_use]
    pub const fn get(self) -> ScenarioExecutionStatus {
        self.0
    }

    /// Whether no failure has been recorded yet.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        self.0.is_ok()
    }

    /// Raise the status to `candidate` if it is more severe.
    ///
    /// Returns `true` when the status changed.
    pub fn raise(&mut self, candidate: ScenarioExecutionStatus) -> bool {
        if candidate > self.0 {
            self.0 = candidate;
            true
        } else {
            false
        }
    }
}
