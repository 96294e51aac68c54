//! Shared helpers for the integration tests.
#![expect(
    dead_code,
    reason = "each integration test binary uses a different subset of helpers"
)]
#![expect(
    clippy::expect_used,
    reason = "helpers fail the calling test on setup errors"
)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use stepflow::{
    BindingCatalogBuilder, BindingMethod, ContainerScope, FeatureInfo, MatchedBinding,
    ObjectContainer, RunnerIdentity, RuntimeConfiguration, ScenarioInfo, StepBinding,
    StepDefinitionType, StepError, StepFailure, StepInstance, TestExecutionEngine, TestRunner,
    TestTracer,
};
use unic_langid::LanguageIdentifier;

/// Names of the bindings that ran, in order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Snapshot of `log`.
pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().expect("call log poisoned").clone()
}

/// Binding body appending `name` to `log`.
pub fn recorder(log: &CallLog, name: &str) -> BindingMethod {
    let log = Arc::clone(log);
    let entry = name.to_owned();
    BindingMethod::new(name, move |_ctx, _args| {
        log.lock().expect("call log poisoned").push(entry.clone());
        async { Ok(None) }
    })
}

/// Binding body appending `name` to `log` and then failing.
pub fn failing(log: &CallLog, name: &str) -> BindingMethod {
    let log = Arc::clone(log);
    let entry = name.to_owned();
    BindingMethod::new(name, move |_ctx, _args| {
        log.lock().expect("call log poisoned").push(entry.clone());
        async { Err(StepFailure::message("step exploded")) }
    })
}

/// Build a runner over the bindings added by `build`.
pub fn runner(
    config: RuntimeConfiguration,
    build: impl FnOnce(&mut BindingCatalogBuilder),
) -> TestRunner {
    TestRunner::new(RunnerIdentity::new("integration"), engine(config, build))
}

/// Build an engine over the bindings added by `build`.
pub fn engine(
    config: RuntimeConfiguration,
    build: impl FnOnce(&mut BindingCatalogBuilder),
) -> TestExecutionEngine {
    let mut builder = BindingCatalogBuilder::new();
    build(&mut builder);
    TestExecutionEngine::new(
        Arc::new(builder.building_completed()),
        Arc::new(config),
        Arc::new(ObjectContainer::root(ContainerScope::TestThread)),
    )
}

/// An English feature titled `title`.
pub fn feature(title: &str) -> FeatureInfo {
    FeatureInfo::new(unic_langid::langid!("en-US"), title, None)
}

/// Open `feature` and start an untagged scenario titled `scenario`.
pub async fn open_scenario(runner: &TestRunner, feature: FeatureInfo, scenario: &str) {
    runner
        .on_feature_start(feature)
        .await
        .expect("feature starts");
    runner
        .on_scenario_initialize(ScenarioInfo::new(scenario, None))
        .await;
    runner.on_scenario_start().await.expect("scenario starts");
}

/// Tracer recording one line per event.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    lines: Mutex<Vec<String>>,
}

impl RecordingTracer {
    /// Recorded lines.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("tracer poisoned").clone()
    }

    fn push(&self, line: String) {
        self.lines.lock().expect("tracer poisoned").push(line);
    }
}

impl TestTracer for RecordingTracer {
    fn trace_step(&self, step: &StepInstance, _show_additional_arguments: bool) {
        self.push(format!("step: {} {}", step.keyword_text(), step.text()));
    }

    fn trace_warning(&self, text: &str) {
        self.push(format!("warning: {text}"));
    }

    fn trace_step_done(&self, match_text: &str, _duration: Duration) {
        self.push(format!("done: {match_text}"));
    }

    fn trace_step_skipped(&self) {
        self.push("skipped".to_owned());
    }

    fn trace_step_pending(&self, match_text: &str) {
        self.push(format!("pending: {match_text}"));
    }

    fn trace_binding_error(&self, error: &StepError) {
        self.push(format!("binding error: {error}"));
    }

    fn trace_error(&self, error: &StepError) {
        self.push(format!("error: {error}"));
    }

    fn trace_no_matching_step_definition(
        &self,
        step: &StepInstance,
        target_language: &str,
        culture: &LanguageIdentifier,
        candidates: &[MatchedBinding],
    ) {
        self.push(format!(
            "no match: {} ({target_language}, {culture}, {} candidates)",
            step.text(),
            candidates.len()
        ));
    }

    fn trace_duration(&self, _duration: Duration, label: &str) {
        self.push(format!("duration: {label}"));
    }
}

/// Given binding for `pattern`.
pub fn given(pattern: &str, method: BindingMethod) -> StepBinding {
    StepBinding::new(StepDefinitionType::Given, pattern, method)
        .expect("valid pattern")
}

/// When binding for `pattern`.
pub fn when(pattern: &str, method: BindingMethod) -> StepBinding {
    StepBinding::new(StepDefinitionType::When, pattern, method)
        .expect("valid pattern")
}

/// Then binding for `pattern`.
pub fn then(pattern: &str, method: BindingMethod) -> StepBinding {
    StepBinding::new(StepDefinitionType::Then, pattern, method)
        .expect("valid pattern")
}
