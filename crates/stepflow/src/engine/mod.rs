//! The scenario and step state machine.
//!
//! A [`TestExecutionEngine`] drives one execution identity through the run,
//! feature, scenario and step lifecycle. It fires hooks, executes matched
//! bindings, records the scenario status and turns it into a single outcome
//! in [`TestExecutionEngine::on_after_last_step`].

use std::sync::Arc;

use crate::bindings::{BindingCatalog, HookType, StepBinding, StepFailure};
use crate::config::{MissingOrPendingStepsOutcome, RuntimeConfiguration};
use crate::container::ObjectContainer;
use crate::context::{ContextError, ContextManager, ContextSlots, FeatureContext, ScenarioContext};
use crate::conversion::StepArgumentTypeConverter;
use crate::diagnostics::ErrorProvider;
use crate::events::{EventSink, NoopEventSink, TestResult, report_failure};
use crate::info::{FeatureInfo, ScenarioInfo};
use crate::keyword::ScenarioBlock;
use crate::matching::{StepDefinitionMatchService, StepInstance};
use crate::status::ScenarioExecutionStatus;
use crate::tracer::{LogTracer, TestTracer};

mod error;
mod hooks;
mod step;

pub use error::{BindingError, ScenarioError, ScenarioOutcome, StepError};

/// A failure raised by a step body, offered to the step error handlers.
#[derive(Debug)]
pub struct StepFailureEvent<'a> {
    binding: &'a StepBinding,
    step: &'a StepInstance,
    error: &'a StepError,
    handled: bool,
}

impl<'a> StepFailureEvent<'a> {
    pub(crate) fn new(binding: &'a StepBinding, step: &'a StepInstance, error: &'a StepError) -> Self {
        Self {
            binding,
            step,
            error,
            handled: false,
        }
    }

    /// Binding whose body failed.
    #[must_use]
    pub fn binding(&self) -> &StepBinding {
        self.binding
    }

    /// The failing step.
    #[must_use]
    pub fn step(&self) -> &StepInstance {
        self.step
    }

    /// The failure.
    #[must_use]
    pub fn error(&self) -> &StepError {
        self.error
    }

    /// Swallow the failure: the step counts as passed.
    pub fn mark_handled(&mut self) {
        self.handled = true;
    }

    /// Whether a handler swallowed the failure.
    #[must_use]
    pub fn is_handled(&self) -> bool {
        self.handled
    }
}

/// Intercepts failures raised by step bodies.
///
/// Handlers see body failures only; matching, conversion and hook failures
/// never reach them.
///
/// # Examples
///
/// ```
/// use stepflow::{StepErrorHandler, StepFailureEvent};
///
/// struct IgnoreFlaky;
///
/// impl StepErrorHandler for IgnoreFlaky {
///     fn on_step_failure(&self, event: &mut StepFailureEvent<'_>) {
///         if event.error().to_string().contains("flaky") {
///             event.mark_handled();
///         }
///     }
/// }
/// ```
pub trait StepErrorHandler: Send + Sync {
    /// Inspect a failure and optionally mark it handled.
    fn on_step_failure(&self, event: &mut StepFailureEvent<'_>);
}

/// Executes the scenarios of one execution identity.
pub struct TestExecutionEngine {
    catalog: Arc<BindingCatalog>,
    config: Arc<RuntimeConfiguration>,
    tracer: Arc<dyn TestTracer>,
    events: Arc<dyn EventSink>,
    step_error_handlers: Vec<Arc<dyn StepErrorHandler>>,
    contexts: ContextManager,
    converter: StepArgumentTypeConverter,
    matcher: StepDefinitionMatchService,
    run_started: bool,
    run_ended: bool,
}

impl std::fmt::Debug for TestExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestExecutionEngine")
            .field("config", &self.config)
            .field("contexts", &self.contexts)
            .field("run_started", &self.run_started)
            .field("run_ended", &self.run_ended)
            .finish_non_exhaustive()
    }
}

impl TestExecutionEngine {
    /// Engine over a sealed `catalog`, nesting its contexts under
    /// `thread_container`. Traces go to [`LogTracer`] and events are
    /// discarded until replaced.
    #[must_use]
    pub fn new(
        catalog: Arc<BindingCatalog>,
        config: Arc<RuntimeConfiguration>,
        thread_container: Arc<ObjectContainer>,
    ) -> Self {
        let tracer: Arc<dyn TestTracer> = Arc::new(LogTracer);
        let converter = StepArgumentTypeConverter::new(Arc::clone(&catalog), Arc::clone(&tracer));
        let contexts = ContextManager::new(thread_container, config.binding_culture().cloned());
        Self {
            matcher: StepDefinitionMatchService::new(converter.clone()),
            converter,
            catalog,
            config,
            tracer,
            events: Arc::new(NoopEventSink),
            step_error_handlers: Vec::new(),
            contexts,
            run_started: false,
            run_ended: false,
        }
    }

    /// Send traces to `tracer`.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<dyn TestTracer>) -> Self {
        self.converter = StepArgumentTypeConverter::new(Arc::clone(&self.catalog), Arc::clone(&tracer));
        self.matcher = StepDefinitionMatchService::new(self.converter.clone());
        self.tracer = tracer;
        self
    }

    /// Send lifecycle events to `events`.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Offer step body failures to `handler`, after any handler added
    /// earlier.
    #[must_use]
    pub fn with_step_error_handler(mut self, handler: Arc<dyn StepErrorHandler>) -> Self {
        self.step_error_handlers.push(handler);
        self
    }

    /// Publish contexts into `slots`.
    #[must_use]
    pub fn with_context_slots(mut self, slots: Arc<ContextSlots>) -> Self {
        self.contexts = self.contexts.with_slots(slots);
        self
    }

    /// The context stack.
    #[must_use]
    pub fn contexts(&self) -> &ContextManager {
        &self.contexts
    }

    /// The running feature.
    #[must_use]
    pub fn feature_context(&self) -> Option<&FeatureContext> {
        self.contexts.feature_context()
    }

    /// The running scenario.
    #[must_use]
    pub fn scenario_context(&self) -> Option<&ScenarioContext> {
        self.contexts.scenario_context()
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfiguration {
        &self.config
    }

    /// Catalog steps and hooks are read from.
    #[must_use]
    pub fn catalog(&self) -> &Arc<BindingCatalog> {
        &self.catalog
    }

    /// Status of the running scenario; `Ok` when none runs.
    fn status(&self) -> ScenarioExecutionStatus {
        self.contexts
            .scenario_context()
            .map_or(ScenarioExecutionStatus::Ok, ScenarioContext::status)
    }

    /// Emit the run-started event and fire `BeforeTestRun` hooks, once.
    ///
    /// # Errors
    ///
    /// Returns the first hook failure.
    pub async fn on_test_run_start(&mut self) -> Result<(), StepError> {
        if self.run_started {
            return Ok(());
        }
        self.run_started = true;
        report_failure("test run started", self.events.test_run_started());
        self.fire_events(HookType::BeforeTestRun).await
    }

    /// Fire `AfterTestRun` hooks, once.
    ///
    /// # Errors
    ///
    /// Returns the first hook failure.
    pub async fn on_test_run_end(&mut self) -> Result<(), StepError> {
        if self.run_ended {
            return Ok(());
        }
        self.run_ended = true;
        self.fire_events(HookType::AfterTestRun).await
    }

    /// Open a feature and fire `BeforeFeature` hooks.
    ///
    /// With delayed fixture teardown a feature still open is ended first.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::FeatureAlreadyActive`] when a feature is open
    /// and teardown is not delayed, or the first hook failure.
    pub async fn on_feature_start(&mut self, info: FeatureInfo) -> Result<(), StepError> {
        if self.config.delayed_fixture_teardown() && self.contexts.feature_context().is_some() {
            self.on_feature_end().await?;
        }
        self.contexts.initialize_feature_context(info)?;
        self.fire_events(HookType::BeforeFeature).await
    }

    /// Fire `AfterFeature` hooks and close the feature.
    ///
    /// The feature is closed even when a hook fails. With delayed fixture
    /// teardown, ending a feature that was already closed does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::NoFeature`] when no feature is open, or the
    /// first hook failure.
    pub async fn on_feature_end(&mut self) -> Result<(), StepError> {
        let Some(feature) = self.contexts.feature_context() else {
            if self.config.delayed_fixture_teardown() {
                return Ok(());
            }
            return Err(ContextError::NoFeature.into());
        };
        let title = feature.info().title().to_owned();
        let hooks = self.fire_events(HookType::AfterFeature).await;
        if self.config.trace_timings() {
            if let Some(feature) = self.contexts.feature_context() {
                self.tracer
                    .trace_duration(feature.elapsed(), &format!("Feature: {title}"));
            }
        }
        self.contexts.cleanup_feature_context();
        hooks
    }

    /// Open a scenario.
    pub fn on_scenario_initialize(&mut self, info: ScenarioInfo) {
        self.contexts.initialize_scenario_context(info);
    }

    /// Emit the test-case-started event and fire `BeforeScenario` hooks.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::NoScenario`] before
    /// [`on_scenario_initialize`](Self::on_scenario_initialize), or the first
    /// hook failure.
    pub async fn on_scenario_start(&mut self) -> Result<(), StepError> {
        let scenario = self.contexts.scenario_context().ok_or(ContextError::NoScenario)?;
        report_failure(
            "test case started",
            self.events.test_case_started(scenario.info()),
        );
        self.fire_events(HookType::BeforeScenario).await
    }

    /// Close the last block and decide how the scenario ended.
    ///
    /// # Errors
    ///
    /// - [`ScenarioError::Pending`] or [`ScenarioError::Inconclusive`] for
    ///   pending or undefined steps, as configured;
    /// - [`ScenarioError::Failed`] with the recorded error otherwise;
    /// - [`ScenarioError::UnknownError`] when the scenario failed without a
    ///   recorded error.
    pub async fn on_after_last_step(&mut self) -> Result<ScenarioOutcome, ScenarioError> {
        self.handle_block_switch(ScenarioBlock::None).await?;
        let scenario = self.contexts.scenario_context().ok_or(ContextError::NoScenario)?;
        let status = scenario.status();
        let elapsed = scenario.elapsed();
        if self.config.trace_timings() {
            self.tracer
                .trace_duration(elapsed, &format!("Scenario: {}", scenario.info().title()));
        }

        let pending_message = match status {
            ScenarioExecutionStatus::StepDefinitionPending => {
                Some(ErrorProvider::pending_message(scenario.pending_steps()))
            }
            ScenarioExecutionStatus::UndefinedStep => Some(ErrorProvider::undefined_message(
                scenario.missing_steps(),
                self.contexts.feature_context().map(|feature| feature.info().as_ref()),
            )),
            _ => None,
        };
        let message = pending_message
            .clone()
            .or_else(|| scenario.test_error().map(ToString::to_string));
        let result = TestResult::new(status, elapsed, message);
        report_failure(
            "test case finished",
            self.events.test_case_finished(
                self.contexts.feature_context().map(|feature| feature.info().as_ref()),
                scenario.info(),
                &result,
            ),
        );

        match status {
            ScenarioExecutionStatus::Ok => Ok(ScenarioOutcome::Passed),
            ScenarioExecutionStatus::Skipped => Ok(ScenarioOutcome::Ignored),
            ScenarioExecutionStatus::StepDefinitionPending | ScenarioExecutionStatus::UndefinedStep => {
                let message = pending_message.unwrap_or_default();
                match self.config.missing_or_pending_steps_outcome() {
                    MissingOrPendingStepsOutcome::Pending => Err(ScenarioError::Pending(message)),
                    MissingOrPendingStepsOutcome::Inconclusive => {
                        Err(ScenarioError::Inconclusive(message))
                    }
                    MissingOrPendingStepsOutcome::Ignore => Ok(ScenarioOutcome::Ignored),
                    MissingOrPendingStepsOutcome::Error => {
                        Err(StepError::message(message).into())
                    }
                }
            }
            ScenarioExecutionStatus::BindingError | ScenarioExecutionStatus::TestError => {
                Err(scenario.test_error().map_or(ScenarioError::UnknownError, |error| {
                    ScenarioError::Failed(Arc::clone(error))
                }))
            }
        }
    }

    /// Fire `AfterScenario` hooks unless the scenario was skipped, then
    /// close it. Does nothing when no scenario is open.
    ///
    /// # Errors
    ///
    /// Returns the first hook failure; the scenario is closed regardless.
    pub async fn on_scenario_end(&mut self) -> Result<(), StepError> {
        let Some(scenario) = self.contexts.scenario_context() else {
            return Ok(());
        };
        let hooks = if scenario.status() == ScenarioExecutionStatus::Skipped {
            Ok(())
        } else {
            self.fire_events(HookType::AfterScenario).await
        };
        self.contexts.cleanup_scenario_context();
        hooks
    }

    /// Mark the scenario skipped without running its steps.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::NoScenario`] when no scenario is open.
    pub fn on_scenario_skipped(&mut self) -> Result<(), ContextError> {
        let scenario = self.contexts.scenario_context().ok_or(ContextError::NoScenario)?;
        report_failure(
            "test case started",
            self.events.test_case_started(scenario.info()),
        );
        if let Some(scenario) = self.contexts.scenario_context_mut() {
            scenario.escalate(ScenarioExecutionStatus::Skipped, None);
        }
        Ok(())
    }

    /// The signal a binding returns to report itself as pending.
    #[must_use]
    pub fn pending() -> StepFailure {
        StepFailure::Pending
    }
}
