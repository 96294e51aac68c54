//! Step keywords, step definition types and scenario blocks.
//!
//! A scenario step is written with one of five keywords. `And` and `But` are
//! conjunctions: they carry no semantic type of their own and inherit the type
//! of the preceding top-level step. Bindings are registered against the three
//! semantic [`StepDefinitionType`]s only.

use gherkin::StepType;
use std::fmt;
use std::str::FromStr;

/// Keyword used to introduce a step in a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepDefinitionKeyword {
    /// Setup preconditions for a scenario.
    Given,
    /// Perform an action when testing behaviour.
    When,
    /// Assert the expected outcome of a scenario.
    Then,
    /// Additional conditions that share context with the previous step.
    And,
    /// Negative or contrasting conditions.
    But,
}

impl StepDefinitionKeyword {
    /// Return the keyword as a string slice.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepflow::StepDefinitionKeyword;
    ///
    /// assert_eq!(StepDefinitionKeyword::Given.as_str(), "Given");
    /// assert_eq!(StepDefinitionKeyword::But.as_str(), "But");
    /// ```
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Given => "Given",
            Self::When => "When",
            Self::Then => "Then",
            Self::And => "And",
            Self::But => "But",
        }
    }

    /// Return the semantic type for primary keywords, `None` for conjunctions.
    #[must_use]
    pub const fn definition_type(self) -> Option<StepDefinitionType> {
        match self {
            Self::Given => Some(StepDefinitionType::Given),
            Self::When => Some(StepDefinitionType::When),
            Self::Then => Some(StepDefinitionType::Then),
            Self::And | Self::But => None,
        }
    }

    /// Resolve the keyword against the current top-level step type.
    ///
    /// Conjunctions inherit `current`, defaulting to `Given` when no
    /// top-level step has run yet.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepflow::{StepDefinitionKeyword, StepDefinitionType};
    ///
    /// let current = Some(StepDefinitionType::When);
    /// assert_eq!(
    ///     StepDefinitionKeyword::And.resolve(current),
    ///     StepDefinitionType::When
    /// );
    /// assert_eq!(
    ///     StepDefinitionKeyword::But.resolve(None),
    ///     StepDefinitionType::Given
    /// );
    /// ```
    #[must_use]
    pub fn resolve(self, current: Option<StepDefinitionType>) -> StepDefinitionType {
        self.definition_type()
            .or(current)
            .unwrap_or(StepDefinitionType::Given)
    }
}

impl fmt::Display for StepDefinitionKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a [`StepDefinitionKeyword`] from a string fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid step keyword: {0}")]
pub struct StepKeywordParseError(pub String);

impl FromStr for StepDefinitionKeyword {
    type Err = StepKeywordParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        [Self::Given, Self::When, Self::Then, Self::And, Self::But]
            .into_iter()
            .find(|kw| trimmed.eq_ignore_ascii_case(kw.as_str()))
            .ok_or_else(|| StepKeywordParseError(trimmed.to_string()))
    }
}

impl From<StepType> for StepDefinitionKeyword {
    fn from(ty: StepType) -> Self {
        match ty {
            StepType::Given => Self::Given,
            StepType::When => Self::When,
            StepType::Then => Self::Then,
        }
    }
}

/// Semantic type a step binding is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize))]
pub enum StepDefinitionType {
    /// Precondition steps.
    Given,
    /// Action steps.
    When,
    /// Assertion steps.
    Then,
}

impl StepDefinitionType {
    /// Return the type as a string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Given => "Given",
            Self::When => "When",
            Self::Then => "Then",
        }
    }

    /// The scenario block a step of this type belongs to.
    #[must_use]
    pub const fn to_scenario_block(self) -> ScenarioBlock {
        match self {
            Self::Given => ScenarioBlock::Given,
            Self::When => ScenarioBlock::When,
            Self::Then => ScenarioBlock::Then,
        }
    }
}

impl fmt::Display for StepDefinitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The Given/When/Then phase a scenario is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScenarioBlock {
    /// No step has run yet, or the last block has been closed.
    #[default]
    None,
    /// Precondition block.
    Given,
    /// Action block.
    When,
    /// Assertion block.
    Then,
}
