//! Step execution: block switching, matching, argument conversion, invocation
//! and outcome classification.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use unic_langid::LanguageIdentifier;

use super::hooks::settle;
use super::{StepError, StepFailureEvent, TestExecutionEngine};
use crate::bindings::{Arguments, HookType, RawArgument, StepBinding};
use crate::config::ObsoleteBehavior;
use crate::context::ContextError;
use crate::diagnostics::{ErrorProvider, StepFormatter};
use crate::info::{StepInfo, StepMatchSummary};
use crate::keyword::{ScenarioBlock, StepDefinitionKeyword};
use crate::matching::{AmbiguityReason, BindingMatch, MatchedBinding, StepInstance};
use crate::status::ScenarioExecutionStatus;
use crate::table::Table;

/// How far a step got before it failed.
#[derive(Debug, Default)]
struct StepProgress {
    match_text: Option<String>,
    step_started: bool,
}

impl TestExecutionEngine {
    /// Execute one step of the running scenario.
    ///
    /// `And` and `But` take the type of the last top-level step. Failures are
    /// recorded in the scenario status rather than returned, except for:
    ///
    /// - body failures while `stop_at_first_error` is set;
    /// - block and `AfterStep` hook failures;
    /// - calling without a running scenario.
    ///
    /// # Errors
    ///
    /// Returns the failure that aborted the step, as listed above.
    pub async fn step(
        &mut self,
        keyword: StepDefinitionKeyword,
        keyword_text: &str,
        text: &str,
        multiline_text: Option<String>,
        table: Option<Table>,
    ) -> Result<(), StepError> {
        let step_type = keyword.resolve(self.contexts.current_top_level_step_type());
        self.contexts.initialize_step_context(StepInfo::new(
            step_type,
            text,
            multiline_text.clone(),
            table.clone(),
        ));
        let step = StepInstance::new(step_type, keyword, keyword_text, text, self.contexts.step_scope())
            .with_multiline_text(multiline_text)
            .with_table(table);
        let outcome = self.execute_step(&step).await;
        self.contexts.cleanup_step_context();
        outcome
    }

    async fn execute_step(&mut self, step: &StepInstance) -> Result<(), StepError> {
        self.handle_block_switch(step.step_type().to_scenario_block())
            .await?;
        self.tracer.trace_step(step, true);

        let skipped = !self.status().is_ok();
        let mut progress = StepProgress::default();
        let outcome = match self.run_step(step, skipped, &mut progress).await {
            Ok(()) => Ok(()),
            Err(error) => self.classify(step, error, progress.match_text),
        };
        if progress.step_started {
            self.fire_events(HookType::AfterStep).await?;
        }
        outcome
    }

    async fn run_step(
        &mut self,
        step: &StepInstance,
        skipped: bool,
        progress: &mut StepProgress,
    ) -> Result<(), StepError> {
        let culture = self.contexts.binding_culture();
        let matched = self.get_step_match(step, &culture)?;
        let match_text = StepFormatter::match_text(step, &matched);
        progress.match_text = Some(match_text.clone());
        if let Some(context) = self.contexts.step_context_mut() {
            context.info_mut().set_binding_match(StepMatchSummary {
                method: matched.binding().method().name().to_owned(),
                match_text: match_text.clone(),
                scope_matches: matched.scope_matches(),
            });
        }
        self.contexts.publish_step();

        let binding = matched.binding().clone();
        let arguments = self
            .convert_arguments(&binding, matched.into_arguments())
            .await?;

        if skipped {
            self.tracer.trace_step_skipped();
            return Ok(());
        }

        self.handle_obsolete(&binding)?;
        progress.step_started = true;
        self.fire_events(HookType::BeforeStep).await?;
        let duration = self.execute_step_match(&binding, step, arguments).await?;
        if self.config.trace_successful_steps() {
            self.tracer.trace_step_done(&match_text, duration);
        }
        Ok(())
    }

    fn get_step_match(
        &mut self,
        step: &StepInstance,
        culture: &LanguageIdentifier,
    ) -> Result<MatchedBinding, StepError> {
        let (reason, candidates) = match self.matcher.get_best_match(step, culture) {
            BindingMatch::Success(matched) => return Ok(matched),
            BindingMatch::Failure { reason, candidates } => (reason, candidates),
        };
        if !candidates.is_empty() {
            match reason {
                AmbiguityReason::AmbiguousSteps => {
                    return Err(ErrorProvider::ambiguous_match_error(&candidates, step).into());
                }
                AmbiguityReason::ParameterErrors => {
                    return Err(
                        ErrorProvider::ambiguous_because_param_check_error(&candidates, step).into(),
                    );
                }
                AmbiguityReason::None => {}
            }
        }

        let target_language = self
            .contexts
            .feature_context()
            .map_or("rust", |feature| feature.info().target_language())
            .to_owned();
        self.tracer
            .trace_no_matching_step_definition(step, &target_language, culture, &candidates);
        let scenario = self
            .contexts
            .scenario_context_mut()
            .ok_or(ContextError::NoScenario)?;
        scenario.add_missing_step(step.clone());
        Err(ErrorProvider::missing_step_definition_error())
    }

    async fn convert_arguments(
        &self,
        binding: &StepBinding,
        raw: Vec<RawArgument>,
    ) -> Result<Arguments, StepError> {
        let parameters = binding.parameters();
        if raw.len() != parameters.len() {
            return Err(ErrorProvider::parameter_count_error(binding, raw.len()).into());
        }
        let container = self
            .contexts
            .scenario_context()
            .map(|scenario| Arc::clone(scenario.container()))
            .ok_or(ContextError::NoScenario)?;
        let context = self.contexts.binding_context(container);
        let mut values = Vec::with_capacity(raw.len());
        for (argument, parameter) in raw.into_iter().zip(parameters) {
            values.push(self.converter.convert(argument, parameter, &context).await?);
        }
        Ok(Arguments::new(values))
    }

    fn handle_obsolete(&self, binding: &StepBinding) -> Result<(), StepError> {
        let Some(message) = binding.obsolete_message() else {
            return Ok(());
        };
        match self.config.obsolete_behavior() {
            ObsoleteBehavior::None => Ok(()),
            ObsoleteBehavior::Warn => {
                self.tracer.trace_warning(&format!(
                    "The step {} is obsolete: {message}",
                    binding.method().name()
                ));
                Ok(())
            }
            ObsoleteBehavior::Pending => Err(ErrorProvider::pending_step_definition_error()),
            ObsoleteBehavior::Error => Err(ErrorProvider::obsolete_step_error(binding).into()),
        }
    }

    async fn execute_step_match(
        &self,
        binding: &StepBinding,
        step: &StepInstance,
        arguments: Arguments,
    ) -> Result<Duration, StepError> {
        let container = self
            .contexts
            .scenario_context()
            .map(|scenario| Arc::clone(scenario.container()))
            .ok_or(ContextError::NoScenario)?;
        let context = self.contexts.binding_context(container);
        let started = Instant::now();
        let outcome = AssertUnwindSafe(binding.method().invoke(context, arguments))
            .catch_unwind()
            .await;
        let duration = started.elapsed();
        let Err(error) = settle(outcome) else {
            return Ok(duration);
        };
        if matches!(error, StepError::PendingStepDefinition) || self.step_error_handlers.is_empty() {
            return Err(error);
        }
        let mut event = StepFailureEvent::new(binding, step, &error);
        for handler in &self.step_error_handlers {
            handler.on_step_failure(&mut event);
        }
        if event.is_handled() {
            log::debug!(
                target: "stepflow",
                "failure of {} handled by a step error handler: {error}",
                binding.method().name()
            );
            return Ok(duration);
        }
        Err(error)
    }

    /// Record a step failure in the scenario status.
    ///
    /// Returns the error only when it must abort the scenario.
    fn classify(
        &mut self,
        step: &StepInstance,
        error: StepError,
        match_text: Option<String>,
    ) -> Result<(), StepError> {
        let stop_at_first_error = self.config.stop_at_first_error();
        let tracer = Arc::clone(&self.tracer);
        let scenario = self
            .contexts
            .scenario_context_mut()
            .ok_or(ContextError::NoScenario)?;
        match error {
            StepError::PendingStepDefinition => {
                let match_text = match_text.unwrap_or_else(|| StepFormatter::step_text(step, false));
                tracer.trace_step_pending(&match_text);
                scenario.add_pending_step(match_text);
                scenario.escalate(ScenarioExecutionStatus::StepDefinitionPending, None);
                Ok(())
            }
            StepError::MissingStepDefinition => {
                scenario.escalate(ScenarioExecutionStatus::UndefinedStep, None);
                Ok(())
            }
            StepError::Binding(_) => {
                tracer.trace_binding_error(&error);
                scenario.escalate(ScenarioExecutionStatus::BindingError, Some(Arc::new(error)));
                Ok(())
            }
            other => {
                tracer.trace_error(&other);
                let error = Arc::new(other);
                scenario.escalate(ScenarioExecutionStatus::TestError, Some(Arc::clone(&error)));
                if stop_at_first_error {
                    return Err(Arc::unwrap_or_clone(error));
                }
                Ok(())
            }
        }
    }

    /// Move the scenario to `block`, firing the block hooks while the
    /// scenario is still passing.
    pub(super) async fn handle_block_switch(&mut self, block: ScenarioBlock) -> Result<(), StepError> {
        let current = self
            .contexts
            .scenario_context()
            .ok_or(ContextError::NoScenario)?
            .current_block();
        if current == block {
            return Ok(());
        }
        if current != ScenarioBlock::None && self.status().is_ok() {
            self.fire_events(HookType::AfterScenarioBlock).await?;
        }
        if let Some(scenario) = self.contexts.scenario_context_mut() {
            scenario.set_block(block);
        }
        if block != ScenarioBlock::None && self.status().is_ok() {
            self.fire_events(HookType::BeforeScenarioBlock).await?;
        }
        Ok(())
    }
}
