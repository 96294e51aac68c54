//! User-facing error construction and step rendering.
//!
//! The engine never formats diagnostic text itself: [`ErrorProvider`] builds
//! the errors and the pending/undefined messages, and [`StepFormatter`]
//! renders steps, match texts and snippet suggestions.

use crate::bindings::StepBinding;
use crate::engine::{BindingError, StepError};
use crate::info::FeatureInfo;
use crate::matching::{MatchedBinding, StepInstance};

/// Renders steps for traces and messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepFormatter;

impl StepFormatter {
    /// The step as written, optionally followed by its multiline text and
    /// table.
    #[must_use]
    pub fn step_text(step: &StepInstance, show_additional_arguments: bool) -> String {
        let mut text = format!("{} {}", step.keyword_text(), step.text());
        if show_additional_arguments {
            if let Some(multiline) = step.multiline_text() {
                text.push_str("\n  \"\"\"\n");
                for line in multiline.lines() {
                    text.push_str("  ");
                    text.push_str(line);
                    text.push('\n');
                }
                text.push_str("  \"\"\"");
            }
            if let Some(table) = step.table() {
                for line in table.to_string().lines() {
                    text.push_str("\n  ");
                    text.push_str(line);
                }
            }
        }
        text
    }

    /// The step followed by the call it resolved to.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepflow::{StepDefinitionKeyword, StepDefinitionType, StepFormatter, StepInstance, StepScope};
    ///
    /// let step = StepInstance::new(
    ///     StepDefinitionType::Given,
    ///     StepDefinitionKeyword::Given,
    ///     "Given",
    ///     "I have 3 cukes",
    ///     StepScope::default(),
    /// );
    /// assert_eq!(
    ///     StepFormatter::call_text(&step, "cukes", &["\"3\"".to_string()]),
    ///     "Given I have 3 cukes -> cukes(\"3\")"
    /// );
    /// ```
    #[must_use]
    pub fn call_text(step: &StepInstance, method: &str, arguments: &[String]) -> String {
        format!(
            "{} {} -> {method}({})",
            step.keyword_text(),
            step.text(),
            arguments.join(", ")
        )
    }

    /// Match text for a resolved step.
    #[must_use]
    pub fn match_text(step: &StepInstance, matched: &MatchedBinding) -> String {
        let arguments: Vec<String> = matched.arguments().iter().map(ToString::to_string).collect();
        Self::call_text(step, matched.binding().method().name(), &arguments)
    }

    /// A binding registration that would match `step`.
    #[must_use]
    pub fn snippet(step: &StepInstance) -> String {
        let mut parameters = String::new();
        if step.multiline_text().is_some() {
            parameters.push_str("\n.with_parameter::<String>()");
        }
        if step.table().is_some() {
            parameters.push_str("\n.with_parameter::<stepflow::Table>()");
        }
        format!(
            "builder.add_step(\n    StepBinding::new(\n        StepDefinitionType::{},\n        r#\"{}\"#,\n        BindingMethod::new(\"{}\", |_ctx, _args| async {{ Err(StepFailure::Pending) }}),\n    )?{}\n);",
            step.step_type(),
            regex::escape(step.text()),
            method_name(step),
            parameters.replace('\n', "\n    ")
        )
    }
}

fn method_name(step: &StepInstance) -> String {
    let words: Vec<String> = step
        .text()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect();
    format!("{}_{}", step.step_type().as_str().to_lowercase(), words.join("_"))
}

/// Builds the errors and messages reported to users.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorProvider;

impl ErrorProvider {
    /// Several bindings match the step equally well.
    #[must_use]
    pub fn ambiguous_match_error(candidates: &[MatchedBinding], step: &StepInstance) -> BindingError {
        BindingError::AmbiguousSteps {
            step: StepFormatter::step_text(step, false),
            candidates: candidate_names(candidates),
        }
    }

    /// Bindings match the step text but none accepts its arguments.
    #[must_use]
    pub fn ambiguous_because_param_check_error(
        candidates: &[MatchedBinding],
        step: &StepInstance,
    ) -> BindingError {
        BindingError::AmbiguousParameters {
            step: StepFormatter::step_text(step, false),
            candidates: candidate_names(candidates),
        }
    }

    /// The step supplies a different number of arguments than the binding
    /// takes.
    #[must_use]
    pub fn parameter_count_error(binding: &StepBinding, actual: usize) -> BindingError {
        BindingError::ParameterCount {
            method: binding.method().name().to_owned(),
            expected: binding.parameters().len(),
            actual,
        }
    }

    /// The binding is marked obsolete.
    #[must_use]
    pub fn obsolete_step_error(binding: &StepBinding) -> BindingError {
        BindingError::ObsoleteStep {
            method: binding.method().name().to_owned(),
            message: binding.obsolete_message().unwrap_or_default().to_owned(),
        }
    }

    /// No binding matches the step.
    #[must_use]
    pub fn missing_step_definition_error() -> StepError {
        StepError::MissingStepDefinition
    }

    /// A binding signalled that it is pending.
    #[must_use]
    pub fn pending_step_definition_error() -> StepError {
        StepError::PendingStepDefinition
    }

    /// Message for a scenario that ended with pending steps.
    #[must_use]
    pub fn pending_message(pending_steps: &[String]) -> String {
        let mut message = String::from("One or more step definitions are not implemented yet.");
        for step in pending_steps {
            message.push_str("\n  ");
            message.push_str(step);
        }
        message
    }

    /// Message for a scenario that ended with undefined steps, including a
    /// snippet for each distinct missing step.
    #[must_use]
    pub fn undefined_message(missing_steps: &[StepInstance], feature: Option<&FeatureInfo>) -> String {
        let language = feature.map_or("rust", FeatureInfo::target_language);
        let mut message = format!(
            "No matching step definition found for one or more steps.\nAdd {language} bindings such as:"
        );
        let mut seen: Vec<String> = Vec::new();
        for step in missing_steps {
            let snippet = StepFormatter::snippet(step);
            if seen.contains(&snippet) {
                continue;
            }
            message.push_str("\n\n// ");
            message.push_str(&StepFormatter::step_text(step, false));
            message.push('\n');
            message.push_str(&snippet);
            seen.push(snippet);
        }
        message
    }
}

fn candidate_names(candidates: &[MatchedBinding]) -> Vec<String> {
    candidates
        .iter()
        .map(|candidate| {
            format!(
                "{} ({})",
                candidate.binding().method().name(),
                candidate.binding().pattern()
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::StepScope;
    use crate::keyword::{StepDefinitionKeyword, StepDefinitionType};

    fn step(text: &str) -> StepInstance {
        StepInstance::new(
            StepDefinitionType::When,
            StepDefinitionKeyword::And,
            "And",
            text,
            StepScope::default(),
        )
    }

    #[test]
    fn snippets_escape_the_step_text() {
        let snippet = StepFormatter::snippet(&step("I pay 3.50 (cash)"));
        assert!(snippet.contains(r##"r#"I pay 3\.50 \(cash\)"#"##));
        assert!(snippet.contains("StepDefinitionType::When"));
        assert!(snippet.contains("\"when_i_pay_3_50_cash\""));
    }

    #[test]
    fn undefined_message_lists_each_step_once() {
        let missing = [step("I pay"), step("I pay"), step("I leave")];
        let message = ErrorProvider::undefined_message(&missing, None);
        assert_eq!(message.matches("// And I pay\n").count(), 1);
        assert!(message.contains("// And I leave"));
        assert!(message.contains("Add rust bindings"));
    }

    #[test]
    fn pending_message_enumerates_steps() {
        let message = ErrorProvider::pending_message(&["Given a -> a()".into(), "When b -> b()".into()]);
        assert!(message.ends_with("\n  Given a -> a()\n  When b -> b()"));
    }

    #[test]
    fn step_text_includes_multiline_text_on_request() {
        let instance = step("a note").with_multiline_text(Some("line one\nline two".into()));
        assert_eq!(StepFormatter::step_text(&instance, false), "And a note");
        assert!(StepFormatter::step_text(&instance, true).contains("  line two\n"));
    }
}
