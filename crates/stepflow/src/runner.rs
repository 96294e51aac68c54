//! Runner handles handed out per execution identity.
//!
//! A [`TestRunner`] owns one [`TestExecutionEngine`] behind an async mutex.
//! Generated test code drives the runner; every call is forwarded to the
//! engine.

use tokio::sync::{Mutex, MutexGuard};

use crate::bindings::StepFailure;
use crate::context::{ContextError, ScenarioContext};
use crate::engine::{ScenarioError, ScenarioOutcome, StepError, TestExecutionEngine};
use crate::identity::RunnerIdentity;
use crate::info::{FeatureInfo, ScenarioInfo};
use crate::keyword::StepDefinitionKeyword;
use crate::status::ScenarioExecutionStatus;
use crate::table::Table;

/// Handle driving the scenarios of one execution identity.
#[derive(Debug)]
pub struct TestRunner {
    identity: RunnerIdentity,
    engine: Mutex<TestExecutionEngine>,
}

impl TestRunner {
    /// Wrap `engine` for `identity`.
    #[must_use]
    pub fn new(identity: RunnerIdentity, engine: TestExecutionEngine) -> Self {
        Self {
            identity,
            engine: Mutex::new(engine),
        }
    }

    /// Identity the runner was created for.
    #[must_use]
    pub fn identity(&self) -> &RunnerIdentity {
        &self.identity
    }

    /// Exclusive access to the engine.
    pub async fn engine(&self) -> MutexGuard<'_, TestExecutionEngine> {
        self.engine.lock().await
    }

    /// Start the test run; later calls do nothing.
    ///
    /// # Errors
    ///
    /// Returns the first `BeforeTestRun` hook failure.
    pub async fn on_test_run_start(&self) -> Result<(), StepError> {
        self.engine().await.on_test_run_start().await
    }

    /// End the test run; later calls do nothing.
    ///
    /// # Errors
    ///
    /// Returns the first `AfterTestRun` hook failure.
    pub async fn on_test_run_end(&self) -> Result<(), StepError> {
        self.engine().await.on_test_run_end().await
    }

    /// Start a feature.
    ///
    /// # Errors
    ///
    /// See [`TestExecutionEngine::on_feature_start`].
    pub async fn on_feature_start(&self, info: FeatureInfo) -> Result<(), StepError> {
        self.engine().await.on_feature_start(info).await
    }

    /// End the running feature.
    ///
    /// # Errors
    ///
    /// See [`TestExecutionEngine::on_feature_end`].
    pub async fn on_feature_end(&self) -> Result<(), StepError> {
        self.engine().await.on_feature_end().await
    }

    /// Open a scenario.
    pub async fn on_scenario_initialize(&self, info: ScenarioInfo) {
        self.engine().await.on_scenario_initialize(info);
    }

    /// Start the open scenario.
    ///
    /// # Errors
    ///
    /// See [`TestExecutionEngine::on_scenario_start`].
    pub async fn on_scenario_start(&self) -> Result<(), StepError> {
        self.engine().await.on_scenario_start().await
    }

    /// Finish the last step and report how the scenario ended.
    ///
    /// # Errors
    ///
    /// See [`TestExecutionEngine::on_after_last_step`].
    pub async fn collect_scenario_errors(&self) -> Result<ScenarioOutcome, ScenarioError> {
        self.engine().await.on_after_last_step().await
    }

    /// End the scenario.
    ///
    /// # Errors
    ///
    /// See [`TestExecutionEngine::on_scenario_end`].
    pub async fn on_scenario_end(&self) -> Result<(), StepError> {
        self.engine().await.on_scenario_end().await
    }

    /// Skip the open scenario.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::NoScenario`] when no scenario is open.
    pub async fn skip_scenario(&self) -> Result<(), ContextError> {
        self.engine().await.on_scenario_skipped()
    }

    /// Status of the open scenario.
    pub async fn scenario_status(&self) -> Option<ScenarioExecutionStatus> {
        self.engine()
            .await
            .scenario_context()
            .map(ScenarioContext::status)
    }

    /// Execute a step written with `keyword`.
    ///
    /// # Errors
    ///
    /// See [`TestExecutionEngine::step`].
    pub async fn step(
        &self,
        keyword: StepDefinitionKeyword,
        keyword_text: &str,
        text: &str,
        multiline_text: Option<String>,
        table: Option<Table>,
    ) -> Result<(), StepError> {
        self.engine()
            .await
            .step(keyword, keyword_text, text, multiline_text, table)
            .await
    }

    /// Execute a `Given` step.
    ///
    /// # Errors
    ///
    /// See [`TestExecutionEngine::step`].
    pub async fn given(
        &self,
        text: &str,
        multiline_text: Option<String>,
        table: Option<Table>,
    ) -> Result<(), StepError> {
        self.step(StepDefinitionKeyword::Given, "Given", text, multiline_text, table)
            .await
    }

    /// Execute a `When` step.
    ///
    /// # Errors
    ///
    /// See [`TestExecutionEngine::step`].
    pub async fn when(
        &self,
        text: &str,
        multiline_text: Option<String>,
        table: Option<Table>,
    ) -> Result<(), StepError> {
        self.step(StepDefinitionKeyword::When, "When", text, multiline_text, table)
            .await
    }

    /// Execute a `Then` step.
    ///
    /// # Errors
    ///
    /// See [`TestExecutionEngine::step`].
    pub async fn then(
        &self,
        text: &str,
        multiline_text: Option<String>,
        table: Option<Table>,
    ) -> Result<(), StepError> {
        self.step(StepDefinitionKeyword::Then, "Then", text, multiline_text, table)
            .await
    }

    /// Execute an `And` step.
    ///
    /// # Errors
    ///
    /// See [`TestExecutionEngine::step`].
    pub async fn and(
        &self,
        text: &str,
        multiline_text: Option<String>,
        table: Option<Table>,
    ) -> Result<(), StepError> {
        self.step(StepDefinitionKeyword::And, "And", text, multiline_text, table)
            .await
    }

    /// Execute a `But` step.
    ///
    /// # Errors
    ///
    /// See [`TestExecutionEngine::step`].
    pub async fn but(
        &self,
        text: &str,
        multiline_text: Option<String>,
        table: Option<Table>,
    ) -> Result<(), StepError> {
        self.step(StepDefinitionKeyword::But, "But", text, multiline_text, table)
            .await
    }

    /// Execute a parsed Gherkin step.
    ///
    /// The written keyword decides conjunctions; `And` and `But` steps are
    /// recognised by their keyword text.
    ///
    /// # Errors
    ///
    /// See [`TestExecutionEngine::step`].
    pub async fn run_step(&self, step: &gherkin::Step) -> Result<(), StepError> {
        let keyword_text = step.keyword.trim();
        let keyword = keyword_text
            .parse::<StepDefinitionKeyword>()
            .unwrap_or_else(|_| StepDefinitionKeyword::from(step.ty));
        self.step(
            keyword,
            keyword_text,
            &step.value,
            step.docstring.clone(),
            step.table.as_ref().map(Table::from),
        )
        .await
    }

    /// Run a whole scenario: open it, execute `steps`, decide the outcome and
    /// close it.
    ///
    /// # Errors
    ///
    /// Returns the scenario's outcome error, or the first error that aborted
    /// it. `AfterScenario` hooks run in either case.
    pub async fn run_scenario(
        &self,
        info: ScenarioInfo,
        steps: &[gherkin::Step],
    ) -> Result<ScenarioOutcome, ScenarioError> {
        self.on_scenario_initialize(info).await;
        let outcome = self.drive_scenario(steps).await;
        let ended = self.on_scenario_end().await;
        let outcome = outcome?;
        ended?;
        Ok(outcome)
    }

    async fn drive_scenario(&self, steps: &[gherkin::Step]) -> Result<ScenarioOutcome, ScenarioError> {
        self.on_scenario_start().await?;
        for step in steps {
            self.run_step(step).await?;
        }
        self.collect_scenario_errors().await
    }

    /// The signal a binding returns to report itself as pending.
    #[must_use]
    pub fn pending() -> StepFailure {
        TestExecutionEngine::pending()
    }
}
