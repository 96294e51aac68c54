//! Behavioural tests for the feature, scenario and step lifecycle.
#![expect(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "tests fail loudly on unexpected errors"
)]

use std::sync::Arc;

use gherkin::GherkinEnv;
use rstest::rstest;
use stepflow::{
    BindingMethod, ContextError, FeatureInfo, HookBinding, HookType, MissingOrPendingStepsOutcome,
    ReportCollector, RuntimeConfiguration, ScenarioError, ScenarioExecutionStatus, ScenarioInfo,
    ScenarioOutcome, StepError, TestRunner, TestTracer,
};

mod common;
use common::{
    CallLog, RecordingTracer, calls, failing, feature, given, open_scenario, recorder, runner,
    then, when,
};

const BASKET: &str = "\
Feature: Basket

  Scenario: Adding items
    Given an empty basket
    When I add 2 apples
    And I add 3 pears
    Then the basket holds 5 items
";

fn basket_runner(log: &CallLog, config: RuntimeConfiguration) -> TestRunner {
    runner(config, |builder| {
        builder
            .add_hook(HookBinding::new(
                HookType::BeforeFeature,
                recorder(log, "before_feature"),
            ))
            .add_hook(HookBinding::new(
                HookType::AfterFeature,
                recorder(log, "after_feature"),
            ))
            .add_hook(HookBinding::new(
                HookType::BeforeScenario,
                recorder(log, "before_scenario"),
            ))
            .add_hook(HookBinding::new(
                HookType::AfterScenario,
                recorder(log, "after_scenario"),
            ))
            .add_step(given("an empty basket", recorder(log, "empty_basket")))
            .add_step(
                when(r"I add (\d+) (\w+)", recorder(log, "add_items"))
                    .with_parameter::<u32>()
                    .with_parameter::<String>(),
            )
            .add_step(
                then(r"the basket holds (\d+) items", recorder(log, "basket_holds"))
                    .with_parameter::<u32>(),
            );
    })
}

#[tokio::test]
async fn parsed_scenarios_run_end_to_end() {
    let parsed = gherkin::Feature::parse(BASKET, GherkinEnv::default()).expect("feature parses");
    let scenario = parsed.scenarios.first().expect("one scenario");
    let log = CallLog::default();
    let runner = basket_runner(&log, RuntimeConfiguration::default());

    runner.on_feature_start(feature(&parsed.name)).await.unwrap();
    let outcome = runner
        .run_scenario(ScenarioInfo::new(&scenario.name, None), &scenario.steps)
        .await
        .unwrap();
    runner.on_feature_end().await.unwrap();

    assert_eq!(outcome, ScenarioOutcome::Passed);
    assert_eq!(
        calls(&log),
        [
            "before_feature",
            "before_scenario",
            "empty_basket",
            "add_items",
            "add_items",
            "basket_holds",
            "after_scenario",
            "after_feature",
        ]
    );
}

#[tokio::test]
async fn failing_steps_skip_the_rest_and_still_close_the_scenario() {
    let log = CallLog::default();
    let runner = runner(RuntimeConfiguration::default(), |builder| {
        builder
            .add_hook(HookBinding::new(
                HookType::AfterScenario,
                recorder(&log, "after_scenario"),
            ))
            .add_step(given("an empty basket", failing(&log, "empty_basket")))
            .add_step(when("I add an apple", recorder(&log, "add_apple")));
    });
    open_scenario(&runner, feature("Basket"), "Broken").await;
    runner.given("an empty basket", None, None).await.unwrap();
    runner.when("I add an apple", None, None).await.unwrap();

    assert_eq!(
        runner.scenario_status().await,
        Some(ScenarioExecutionStatus::TestError)
    );
    let outcome = runner.collect_scenario_errors().await;
    assert!(matches!(outcome, Err(ScenarioError::Failed(_))));
    runner.on_scenario_end().await.unwrap();
    assert_eq!(calls(&log), ["empty_basket", "after_scenario"]);
    assert_eq!(runner.scenario_status().await, None);
}

#[tokio::test]
async fn steps_after_a_failure_are_traced_as_skipped() {
    let tracer = Arc::new(RecordingTracer::default());
    let log = CallLog::default();
    let runner = TestRunner::new(
        "skipping".into(),
        common::engine(RuntimeConfiguration::default(), |builder| {
            builder
                .add_step(given("a customer", recorder(&log, "customer")))
                .add_step(when("they pay", failing(&log, "pay")))
                .add_step(then("the order is placed", recorder(&log, "order_placed")));
        })
        .with_tracer(Arc::clone(&tracer) as Arc<dyn TestTracer>),
    );
    open_scenario(&runner, feature("Checkout"), "Declined card").await;
    runner.given("a customer", None, None).await.unwrap();
    runner.when("they pay", None, None).await.unwrap();
    runner.then("the order is placed", None, None).await.unwrap();

    assert_eq!(calls(&log), ["customer", "pay"]);
    assert_eq!(
        tracer.lines(),
        [
            "step: Given a customer",
            "done: Given a customer -> customer()",
            "step: When they pay",
            "error: step exploded",
            "step: Then the order is placed",
            "skipped",
        ]
    );
    assert!(matches!(
        runner.collect_scenario_errors().await,
        Err(ScenarioError::Failed(_))
    ));
}

#[rstest]
#[case(MissingOrPendingStepsOutcome::Pending, "pending")]
#[case(MissingOrPendingStepsOutcome::Inconclusive, "inconclusive")]
#[case(MissingOrPendingStepsOutcome::Ignore, "ignored")]
#[case(MissingOrPendingStepsOutcome::Error, "error")]
#[tokio::test]
async fn pending_steps_end_as_configured(
    #[case] policy: MissingOrPendingStepsOutcome,
    #[case] expected: &str,
) {
    let config = RuntimeConfiguration::default().with_missing_or_pending_steps_outcome(policy);
    let runner = runner(config, |builder| {
        builder.add_step(given(
            "a payment gateway",
            BindingMethod::new("gateway", |_ctx, _args| async { Err(TestRunner::pending()) }),
        ));
    });
    open_scenario(&runner, feature("Checkout"), "Paying").await;
    runner.given("a payment gateway", None, None).await.unwrap();

    let actual = match runner.collect_scenario_errors().await {
        Err(ScenarioError::Pending(_)) => "pending",
        Err(ScenarioError::Inconclusive(_)) => "inconclusive",
        Ok(ScenarioOutcome::Ignored) => "ignored",
        Err(ScenarioError::Failed(_)) => "error",
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn conjunctions_continue_the_previous_step_type() {
    let log = CallLog::default();
    let runner = runner(RuntimeConfiguration::default(), |builder| {
        builder
            .add_step(given("a customer", recorder(&log, "customer")))
            .add_step(given("a voucher", recorder(&log, "voucher")))
            .add_step(then("no discount applies", recorder(&log, "no_discount")));
    });
    open_scenario(&runner, feature("Vouchers"), "Expired voucher").await;
    runner.given("a customer", None, None).await.unwrap();
    runner.and("a voucher", None, None).await.unwrap();
    runner.then("no discount applies", None, None).await.unwrap();
    runner.but("a voucher", None, None).await.unwrap();

    assert_eq!(calls(&log), ["customer", "voucher", "no_discount"]);
    assert_eq!(
        runner.scenario_status().await,
        Some(ScenarioExecutionStatus::UndefinedStep)
    );
}

#[tokio::test]
async fn delayed_teardown_closes_the_previous_feature_on_the_next_start() {
    let log = CallLog::default();
    let config = RuntimeConfiguration::default().with_delayed_fixture_teardown(true);
    let runner = runner(config, |builder| {
        builder
            .add_hook(HookBinding::new(
                HookType::BeforeFeature,
                recorder(&log, "before_feature"),
            ))
            .add_hook(HookBinding::new(
                HookType::AfterFeature,
                recorder(&log, "after_feature"),
            ));
    });

    runner.on_feature_start(feature("First")).await.unwrap();
    runner.on_feature_start(feature("Second")).await.unwrap();
    runner.on_feature_end().await.unwrap();
    runner.on_feature_end().await.unwrap();

    assert_eq!(
        calls(&log),
        ["before_feature", "after_feature", "before_feature", "after_feature"]
    );
}

#[tokio::test]
async fn a_second_feature_needs_the_first_to_end() {
    let runner = runner(RuntimeConfiguration::default(), |_builder| {});
    runner.on_feature_start(feature("First")).await.unwrap();
    let error = runner.on_feature_start(feature("Second")).await.unwrap_err();
    assert!(matches!(
        error,
        StepError::Context(ContextError::FeatureAlreadyActive(_))
    ));
}

#[tokio::test]
async fn finished_scenarios_are_reported() {
    let collector = Arc::new(ReportCollector::new());
    let log = CallLog::default();
    let runner = TestRunner::new(
        "reporting".into(),
        common::engine(RuntimeConfiguration::default(), |builder| {
            builder.add_step(given("a customer", recorder(&log, "customer")));
        })
        .with_event_sink(Arc::clone(&collector) as Arc<dyn stepflow::EventSink>),
    );
    let accounts = FeatureInfo::new(unic_langid::langid!("en-GB"), "Accounts", None);
    runner.on_feature_start(accounts).await.unwrap();
    runner
        .on_scenario_initialize(ScenarioInfo::new("Sign in", None).with_tags(["smoke"]))
        .await;
    runner.on_scenario_start().await.unwrap();
    runner.given("a customer", None, None).await.unwrap();
    runner.given("an unknown step", None, None).await.unwrap();
    let _ = runner.collect_scenario_errors().await;
    runner.on_scenario_end().await.unwrap();

    let records = collector.snapshot();
    assert_eq!(records.len(), 1);
    let record = records.first().expect("one record");
    assert_eq!(record.feature_title(), Some("Accounts"));
    assert_eq!(record.scenario_title(), "Sign in");
    assert_eq!(record.tags(), ["smoke".to_owned()]);
    assert_eq!(record.status(), ScenarioExecutionStatus::UndefinedStep);
    assert!(record.message().is_some_and(|message| message.contains("an unknown step")));
}

#[tokio::test]
async fn timings_are_traced_when_enabled() {
    let tracer = Arc::new(RecordingTracer::default());
    let config = RuntimeConfiguration::default()
        .with_trace_timings(true)
        .with_trace_successful_steps(true);
    let log = CallLog::default();
    let runner = TestRunner::new(
        "timings".into(),
        common::engine(config, |builder| {
            builder.add_step(given("a customer", recorder(&log, "customer")));
        })
        .with_tracer(Arc::clone(&tracer) as Arc<dyn TestTracer>),
    );
    open_scenario(&runner, feature("Accounts"), "Sign in").await;
    runner.given("a customer", None, None).await.unwrap();
    runner.collect_scenario_errors().await.unwrap();
    runner.on_scenario_end().await.unwrap();
    runner.on_feature_end().await.unwrap();

    assert_eq!(
        tracer.lines(),
        [
            "step: Given a customer",
            "done: Given a customer -> customer()",
            "duration: Scenario: Sign in",
            "duration: Feature: Accounts",
        ]
    );
}
