//! Resolving a step against the binding catalog.
//!
//! A binding is a candidate for a step when its step type equals the step's,
//! its regex matches the whole step text and its scope (if any) holds for the
//! running feature and scenario. Candidates survive when they take exactly as
//! many parameters as the step supplies arguments and every argument can be
//! converted. Among survivors, only those satisfying the most scope
//! conditions are kept; exactly one must remain.

use unic_langid::LanguageIdentifier;

use crate::bindings::{RawArgument, StepBinding, StepScope, scope_weight};
use crate::conversion::StepArgumentTypeConverter;
use crate::keyword::{StepDefinitionKeyword, StepDefinitionType};
use crate::table::Table;

/// A step as written in a scenario, with the scope it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInstance {
    step_type: StepDefinitionType,
    keyword: StepDefinitionKeyword,
    keyword_text: String,
    text: String,
    multiline_text: Option<String>,
    table: Option<Table>,
    scope: StepScope,
}

impl StepInstance {
    /// Describe a step.
    #[must_use]
    pub fn new(
        step_type: StepDefinitionType,
        keyword: StepDefinitionKeyword,
        keyword_text: impl Into<String>,
        text: impl Into<String>,
        scope: StepScope,
    ) -> Self {
        Self {
            step_type,
            keyword,
            keyword_text: keyword_text.into(),
            text: text.into(),
            multiline_text: None,
            table: None,
            scope,
        }
    }

    /// Attach a multiline text argument.
    #[must_use]
    pub fn with_multiline_text(mut self, text: Option<String>) -> Self {
        self.multiline_text = text;
        self
    }

    /// Attach a table argument.
    #[must_use]
    pub fn with_table(mut self, table: Option<Table>) -> Self {
        self.table = table;
        self
    }

    /// Resolved step type.
    #[must_use]
    pub fn step_type(&self) -> StepDefinitionType {
        self.step_type
    }

    /// Keyword the step was written with.
    #[must_use]
    pub fn keyword(&self) -> StepDefinitionKeyword {
        self.keyword
    }

    /// Keyword exactly as written, possibly localised.
    #[must_use]
    pub fn keyword_text(&self) -> &str {
        &self.keyword_text
    }

    /// Step text without the keyword.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Multiline text argument.
    #[must_use]
    pub fn multiline_text(&self) -> Option<&str> {
        self.multiline_text.as_deref()
    }

    /// Table argument.
    #[must_use]
    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    /// Scope the step runs in.
    #[must_use]
    pub fn scope(&self) -> &StepScope {
        &self.scope
    }
}

/// A binding whose regex and scope matched a step.
#[derive(Debug, Clone)]
pub struct MatchedBinding {
    binding: StepBinding,
    arguments: Vec<RawArgument>,
    scope_matches: u32,
}

impl MatchedBinding {
    /// The matched binding.
    #[must_use]
    pub fn binding(&self) -> &StepBinding {
        &self.binding
    }

    /// Raw arguments: captures, then multiline text, then table.
    #[must_use]
    pub fn arguments(&self) -> &[RawArgument] {
        &self.arguments
    }

    /// Number of scope conditions the binding satisfied.
    #[must_use]
    pub fn scope_matches(&self) -> u32 {
        self.scope_matches
    }

    pub(crate) fn into_arguments(self) -> Vec<RawArgument> {
        self.arguments
    }
}

/// Why matching did not produce a single binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbiguityReason {
    /// Nothing matched the step text.
    None,
    /// Several bindings matched equally well.
    AmbiguousSteps,
    /// Bindings matched the text but not the arguments.
    ParameterErrors,
}

/// Outcome of matching one step.
#[derive(Debug, Clone)]
pub enum BindingMatch {
    /// Exactly one binding applies.
    Success(MatchedBinding),
    /// No single binding applies.
    Failure {
        /// Classification of the failure.
        reason: AmbiguityReason,
        /// Bindings that were considered.
        candidates: Vec<MatchedBinding>,
    },
}

impl BindingMatch {
    /// Whether matching succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The ambiguity reason; [`AmbiguityReason::None`] on success.
    #[must_use]
    pub fn reason(&self) -> AmbiguityReason {
        match self {
            Self::Success(_) => AmbiguityReason::None,
            Self::Failure { reason, .. } => *reason,
        }
    }
}

/// Finds the binding for a step.
#[derive(Clone)]
pub struct StepDefinitionMatchService {
    converter: StepArgumentTypeConverter,
}

impl StepDefinitionMatchService {
    /// Match against the catalog the converter reads transformations from.
    #[must_use]
    pub fn new(converter: StepArgumentTypeConverter) -> Self {
        Self { converter }
    }

    /// Resolve `step` to its best binding.
    #[must_use]
    pub fn get_best_match(&self, step: &StepInstance, culture: &LanguageIdentifier) -> BindingMatch {
        let candidates: Vec<MatchedBinding> = self
            .converter
            .catalog()
            .step_bindings()
            .iter()
            .filter_map(|binding| text_match(binding, step))
            .collect();

        let mut survivors: Vec<MatchedBinding> = candidates
            .iter()
            .filter(|candidate| self.parameters_fit(candidate, culture))
            .cloned()
            .collect();
        if let Some(best) = survivors.iter().map(MatchedBinding::scope_matches).max() {
            survivors.retain(|candidate| candidate.scope_matches == best);
        }

        if survivors.len() > 1 {
            return BindingMatch::Failure {
                reason: AmbiguityReason::AmbiguousSteps,
                candidates: survivors,
            };
        }
        match survivors.pop() {
            Some(found) => BindingMatch::Success(found),
            None if candidates.is_empty() => BindingMatch::Failure {
                reason: AmbiguityReason::None,
                candidates,
            },
            None => BindingMatch::Failure {
                reason: AmbiguityReason::ParameterErrors,
                candidates,
            },
        }
    }

    fn parameters_fit(&self, candidate: &MatchedBinding, culture: &LanguageIdentifier) -> bool {
        let parameters = candidate.binding.parameters();
        parameters.len() == candidate.arguments.len()
            && candidate
                .arguments
                .iter()
                .zip(parameters)
                .all(|(argument, target)| self.converter.can_convert(argument, target, culture))
    }
}

fn text_match(binding: &StepBinding, step: &StepInstance) -> Option<MatchedBinding> {
    if binding.step_type() != step.step_type() {
        return None;
    }
    let captures = binding.regex().captures(step.text())?;
    let scope_matches = scope_weight(binding.scope(), step.scope())?;
    let mut arguments: Vec<RawArgument> = captures
        .iter()
        .skip(1)
        .map(|group| {
            RawArgument::Text(group.map_or_else(String::new, |found| found.as_str().to_owned()))
        })
        .collect();
    if let Some(text) = step.multiline_text() {
        arguments.push(RawArgument::Text(text.to_owned()));
    }
    if let Some(table) = step.table() {
        arguments.push(RawArgument::Table(table.clone()));
    }
    Some(MatchedBinding {
        binding: binding.clone(),
        arguments,
        scope_matches,
    })
}
