//! Feature, scenario and step contexts of one engine.
//!
//! At most one context of each level is live at a time. Each level owns a
//! container nested in the level above (test thread, feature, scenario), and
//! dropping a context drops its container along with whatever it holds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use unic_langid::LanguageIdentifier;

use crate::bindings::{BindingContext, StepScope};
use crate::container::{ContainerScope, ObjectContainer};
use crate::engine::StepError;
use crate::info::{FeatureInfo, ScenarioInfo, StepInfo};
use crate::keyword::{ScenarioBlock, StepDefinitionType};
use crate::matching::StepInstance;
use crate::status::{ExecutionStatus, ScenarioExecutionStatus};

mod directory;

pub use directory::{ContextDirectory, ContextSlots, PublishedContext};

/// Failure to reach or change a context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// A feature was started while another is still open.
    #[error("feature {0:?} is still running; end it before starting another")]
    FeatureAlreadyActive(String),
    /// An operation needs a running feature.
    #[error("no feature is running")]
    NoFeature,
    /// An operation needs a running scenario.
    #[error("no scenario is running")]
    NoScenario,
    /// Identity-less lookup was attempted while several runners exist.
    #[error("several runners are active; look contexts up by runner identity")]
    SingletonDisabled,
    /// Identity-less lookup was attempted before any runner exists.
    #[error("no runner is active")]
    NoRunner,
    /// No runner is registered under the identity.
    #[error("no runner is registered as {0:?}")]
    UnknownIdentity(String),
}

/// The running feature.
#[derive(Debug)]
pub struct FeatureContext {
    info: Arc<FeatureInfo>,
    binding_culture: LanguageIdentifier,
    started: Instant,
    container: Arc<ObjectContainer>,
}

impl FeatureContext {
    /// Feature description.
    #[must_use]
    pub fn info(&self) -> &Arc<FeatureInfo> {
        &self.info
    }

    /// Culture used to convert step arguments.
    #[must_use]
    pub fn binding_culture(&self) -> &LanguageIdentifier {
        &self.binding_culture
    }

    /// Time since the feature started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Feature-scoped container.
    #[must_use]
    pub fn container(&self) -> &Arc<ObjectContainer> {
        &self.container
    }
}

/// The running scenario and everything it has accumulated.
#[derive(Debug)]
pub struct ScenarioContext {
    info: Arc<ScenarioInfo>,
    block: ScenarioBlock,
    status: ExecutionStatus,
    pending_steps: Vec<String>,
    missing_steps: Vec<StepInstance>,
    test_error: Option<Arc<StepError>>,
    started: Instant,
    container: Arc<ObjectContainer>,
}

impl ScenarioContext {
    /// Scenario description.
    #[must_use]
    pub fn info(&self) -> &Arc<ScenarioInfo> {
        &self.info
    }

    /// Block the scenario is in.
    #[must_use]
    pub fn current_block(&self) -> ScenarioBlock {
        self.block
    }

    /// Status so far.
    #[must_use]
    pub fn status(&self) -> ScenarioExecutionStatus {
        self.status.get()
    }

    /// Match texts of steps whose definitions are pending.
    #[must_use]
    pub fn pending_steps(&self) -> &[String] {
        &self.pending_steps
    }

    /// Steps no definition matched.
    #[must_use]
    pub fn missing_steps(&self) -> &[StepInstance] {
        &self.missing_steps
    }

    /// Error recorded with the current status.
    #[must_use]
    pub fn test_error(&self) -> Option<&Arc<StepError>> {
        self.test_error.as_ref()
    }

    /// Time since the scenario was initialized.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Scenario-scoped container.
    #[must_use]
    pub fn container(&self) -> &Arc<ObjectContainer> {
        &self.container
    }

    pub(crate) fn set_block(&mut self, block: ScenarioBlock) {
        self.block = block;
    }

    /// Raise the status; `error` is recorded only when the status rose.
    pub(crate) fn escalate(&mut self, status: ScenarioExecutionStatus, error: Option<Arc<StepError>>) -> bool {
        let raised = self.status.raise(status);
        if raised && error.is_some() {
            self.test_error = error;
        }
        raised
    }

    pub(crate) fn add_pending_step(&mut self, match_text: String) {
        self.pending_steps.push(match_text);
    }

    pub(crate) fn add_missing_step(&mut self, step: StepInstance) {
        self.missing_steps.push(step);
    }
}

/// The running step.
#[derive(Debug)]
pub struct StepContext {
    info: StepInfo,
}

impl StepContext {
    /// Step description, including the binding it matched once known.
    #[must_use]
    pub fn info(&self) -> &StepInfo {
        &self.info
    }

    pub(crate) fn info_mut(&mut self) -> &mut StepInfo {
        &mut self.info
    }
}

/// Owner of one engine's context stack.
#[derive(Debug)]
pub struct ContextManager {
    thread_container: Arc<ObjectContainer>,
    culture_override: Option<LanguageIdentifier>,
    feature: Option<FeatureContext>,
    scenario: Option<ScenarioContext>,
    step: Option<StepContext>,
    current_top_level_step_type: Option<StepDefinitionType>,
    slots: Arc<ContextSlots>,
}

impl ContextManager {
    /// Manager nesting its containers under `thread_container`.
    ///
    /// `culture_override` replaces the feature language as binding culture.
    #[must_use]
    pub fn new(thread_container: Arc<ObjectContainer>, culture_override: Option<LanguageIdentifier>) -> Self {
        Self {
            thread_container,
            culture_override,
            feature: None,
            scenario: None,
            step: None,
            current_top_level_step_type: None,
            slots: Arc::default(),
        }
    }

    /// Publish contexts into `slots` instead of private ones.
    #[must_use]
    pub fn with_slots(mut self, slots: Arc<ContextSlots>) -> Self {
        self.slots = slots;
        self
    }

    /// Slots the contexts are published into.
    #[must_use]
    pub fn slots(&self) -> &Arc<ContextSlots> {
        &self.slots
    }

    /// Test-thread container.
    #[must_use]
    pub fn thread_container(&self) -> &Arc<ObjectContainer> {
        &self.thread_container
    }

    /// Open a feature.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::FeatureAlreadyActive`] while a feature is open.
    pub fn initialize_feature_context(&mut self, info: FeatureInfo) -> Result<(), ContextError> {
        if let Some(active) = &self.feature {
            return Err(ContextError::FeatureAlreadyActive(active.info.title().to_owned()));
        }
        let info = Arc::new(info);
        let container = Arc::new(ObjectContainer::child(&self.thread_container, ContainerScope::Feature));
        let binding_culture = self
            .culture_override
            .clone()
            .unwrap_or_else(|| info.language().clone());
        self.slots.publish_feature(Some(PublishedContext::new(
            Arc::clone(&info),
            Arc::clone(&container),
        )));
        self.feature = Some(FeatureContext {
            info,
            binding_culture,
            started: Instant::now(),
            container,
        });
        Ok(())
    }

    /// Close the feature, if any.
    pub fn cleanup_feature_context(&mut self) {
        if self.feature.take().is_some() {
            self.slots.publish_feature(None);
        }
    }

    /// Open a scenario, replacing any scenario still open.
    ///
    /// The scenario container nests in the feature container, or in the
    /// test-thread container when no feature is open.
    pub fn initialize_scenario_context(&mut self, info: ScenarioInfo) {
        if let Some(previous) = self.scenario.take() {
            log::debug!(
                target: "stepflow",
                "scenario {:?} replaced before it ended",
                previous.info.title()
            );
        }
        let parent = self
            .feature
            .as_ref()
            .map_or(&self.thread_container, |feature| &feature.container);
        let container = Arc::new(ObjectContainer::child(parent, ContainerScope::Scenario));
        let info = Arc::new(info);
        self.slots.publish_scenario(Some(PublishedContext::new(
            Arc::clone(&info),
            Arc::clone(&container),
        )));
        self.current_top_level_step_type = None;
        self.scenario = Some(ScenarioContext {
            info,
            block: ScenarioBlock::None,
            status: ExecutionStatus::default(),
            pending_steps: Vec::new(),
            missing_steps: Vec::new(),
            test_error: None,
            started: Instant::now(),
            container,
        });
    }

    /// Close the scenario, if any.
    pub fn cleanup_scenario_context(&mut self) {
        if self.scenario.take().is_some() {
            self.slots.publish_scenario(None);
        }
    }

    /// Open a step and make its type the current top-level step type.
    pub fn initialize_step_context(&mut self, info: StepInfo) {
        self.current_top_level_step_type = Some(info.step_type());
        self.slots.publish_step(Some(Arc::new(info.clone())));
        self.step = Some(StepContext { info });
    }

    /// Close the step, if any.
    pub fn cleanup_step_context(&mut self) {
        if self.step.take().is_some() {
            self.slots.publish_step(None);
        }
    }

    /// Type `And` and `But` steps inherit.
    #[must_use]
    pub fn current_top_level_step_type(&self) -> Option<StepDefinitionType> {
        self.current_top_level_step_type
    }

    /// The running feature.
    #[must_use]
    pub fn feature_context(&self) -> Option<&FeatureContext> {
        self.feature.as_ref()
    }

    /// The running scenario.
    #[must_use]
    pub fn scenario_context(&self) -> Option<&ScenarioContext> {
        self.scenario.as_ref()
    }

    pub(crate) fn scenario_context_mut(&mut self) -> Option<&mut ScenarioContext> {
        self.scenario.as_mut()
    }

    /// The running step.
    #[must_use]
    pub fn step_context(&self) -> Option<&StepContext> {
        self.step.as_ref()
    }

    pub(crate) fn step_context_mut(&mut self) -> Option<&mut StepContext> {
        self.step.as_mut()
    }

    /// Republish the step after its description changed.
    pub(crate) fn publish_step(&self) {
        self.slots
            .publish_step(self.step.as_ref().map(|step| Arc::new(step.info.clone())));
    }

    /// Culture for argument conversion: the override, else the feature
    /// language, else `en-US`.
    #[must_use]
    pub fn binding_culture(&self) -> LanguageIdentifier {
        self.feature.as_ref().map_or_else(
            || {
                self.culture_override
                    .clone()
                    .unwrap_or_else(|| unic_langid::langid!("en-US"))
            },
            |feature| feature.binding_culture.clone(),
        )
    }

    /// Scope the running step is matched in.
    #[must_use]
    pub fn step_scope(&self) -> StepScope {
        let mut tags: Vec<String> = Vec::new();
        if let Some(feature) = &self.feature {
            tags.extend(feature.info.tags().iter().cloned());
        }
        if let Some(scenario) = &self.scenario {
            tags.extend(scenario.info.tags().iter().cloned());
        }
        StepScope::new(
            self.feature.as_ref().map(|feature| feature.info.title().to_owned()),
            self.scenario.as_ref().map(|scenario| scenario.info.title().to_owned()),
            tags,
        )
    }

    /// Context handed to bindings resolving from `container`.
    #[must_use]
    pub fn binding_context(&self, container: Arc<ObjectContainer>) -> BindingContext {
        BindingContext::new(container, self.binding_culture())
            .with_feature(self.feature.as_ref().map(|feature| Arc::clone(&feature.info)))
            .with_scenario(self.scenario.as_ref().map(|scenario| Arc::clone(&scenario.info)))
            .with_step(self.step.as_ref().map(|step| Arc::new(step.info.clone())))
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests fail loudly on unexpected errors")]
mod tests {
    use super::*;
    use unic_langid::langid;

    fn manager() -> ContextManager {
        ContextManager::new(Arc::new(ObjectContainer::root(ContainerScope::TestThread)), None)
    }

    fn feature(title: &str) -> FeatureInfo {
        FeatureInfo::new(langid!("de-DE"), title, None).with_tags(["web"])
    }

    #[test]
    fn only_one_feature_at_a_time() {
        let mut contexts = manager();
        contexts.initialize_feature_context(feature("A")).unwrap();
        assert_eq!(
            contexts.initialize_feature_context(feature("B")),
            Err(ContextError::FeatureAlreadyActive("A".into()))
        );
        contexts.cleanup_feature_context();
        contexts.cleanup_feature_context();
        assert!(contexts.initialize_feature_context(feature("B")).is_ok());
    }

    #[test]
    fn containers_nest_and_are_released_with_their_context() {
        #[derive(Default)]
        struct Basket;

        let mut contexts = manager();
        contexts.initialize_feature_context(feature("A")).unwrap();
        contexts.initialize_scenario_context(ScenarioInfo::new("S", None));
        let scenario_container = Arc::clone(contexts.scenario_context().unwrap().container());
        let basket = scenario_container.resolve::<Basket>();
        assert_eq!(Arc::strong_count(&basket), 2);
        drop(scenario_container);
        contexts.cleanup_scenario_context();
        assert_eq!(Arc::strong_count(&basket), 1);
        assert!(contexts.feature_context().unwrap().container().try_get::<Basket>().is_none());
    }

    #[test]
    fn culture_follows_feature_language_unless_overridden() {
        let mut contexts = manager();
        contexts.initialize_feature_context(feature("A")).unwrap();
        assert_eq!(contexts.binding_culture(), langid!("de-DE"));

        let mut overridden = ContextManager::new(
            Arc::new(ObjectContainer::root(ContainerScope::TestThread)),
            Some(langid!("fr-FR")),
        );
        overridden.initialize_feature_context(feature("A")).unwrap();
        assert_eq!(overridden.binding_culture(), langid!("fr-FR"));
    }

    #[test]
    fn step_scope_combines_feature_and_scenario() {
        let mut contexts = manager();
        contexts.initialize_feature_context(feature("A")).unwrap();
        contexts.initialize_scenario_context(ScenarioInfo::new("S", None).with_tags(["@slow"]));
        let scope = contexts.step_scope();
        assert_eq!(scope.feature_title(), Some("A"));
        assert_eq!(scope.scenario_title(), Some("S"));
        assert_eq!(scope.tags(), ["web".to_string(), "slow".to_string()]);
    }

    #[test]
    fn errors_are_recorded_only_when_status_rises() {
        let mut contexts = manager();
        contexts.initialize_scenario_context(ScenarioInfo::new("S", None));
        let scenario = contexts.scenario_context_mut().unwrap();
        assert!(scenario.escalate(
            ScenarioExecutionStatus::TestError,
            Some(Arc::new(StepError::Panicked("first".into())))
        ));
        assert!(!scenario.escalate(
            ScenarioExecutionStatus::TestError,
            Some(Arc::new(StepError::Panicked("second".into())))
        ));
        assert_eq!(scenario.test_error().unwrap().to_string(), "step panicked: first");
    }

    #[test]
    fn scenario_init_resets_top_level_step_type() {
        let mut contexts = manager();
        contexts.initialize_scenario_context(ScenarioInfo::new("S", None));
        contexts.initialize_step_context(StepInfo::new(StepDefinitionType::When, "x", None, None));
        contexts.cleanup_step_context();
        assert_eq!(contexts.current_top_level_step_type(), Some(StepDefinitionType::When));
        contexts.initialize_scenario_context(ScenarioInfo::new("T", None));
        assert_eq!(contexts.current_top_level_step_type(), None);
    }
}
