//! Behavioural tests for binding selection.
#![expect(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "tests fail loudly on unexpected errors"
)]

use std::sync::Arc;

use stepflow::{
    BindingError, BindingScope, FeatureInfo, RuntimeConfiguration, ScenarioExecutionStatus,
    ScenarioInfo, StepError, TestRunner,
};

mod common;
use common::{CallLog, RecordingTracer, calls, feature, given, open_scenario, recorder, runner};

async fn binding_error(runner: &TestRunner) -> BindingError {
    let engine = runner.engine().await;
    let scenario = engine.scenario_context().expect("scenario running");
    assert_eq!(scenario.status(), ScenarioExecutionStatus::BindingError);
    match scenario.test_error().map(|error| &**error) {
        Some(StepError::Binding(error)) => error.clone(),
        other => panic!("expected a binding error, got {other:?}"),
    }
}

#[tokio::test]
async fn the_most_specific_scope_wins() {
    let log = CallLog::default();
    let runner = runner(RuntimeConfiguration::default(), |builder| {
        builder
            .add_step(given("a signed in user", recorder(&log, "any_user")))
            .add_step(
                given("a signed in user", recorder(&log, "web_user"))
                    .with_scope(BindingScope::new().with_tag("@web")),
            )
            .add_step(
                given("a signed in user", recorder(&log, "web_checkout_user")).with_scope(
                    BindingScope::new()
                        .with_tag("web")
                        .with_scenario_title("Checkout"),
                ),
            );
    });
    let tagged = FeatureInfo::new(unic_langid::langid!("en-US"), "Shop", None).with_tags(["WEB"]);
    runner.on_feature_start(tagged).await.unwrap();

    for title in ["Browsing", "Checkout"] {
        runner
            .on_scenario_initialize(ScenarioInfo::new(title, None))
            .await;
        runner.on_scenario_start().await.unwrap();
        runner.given("a signed in user", None, None).await.unwrap();
        runner.collect_scenario_errors().await.unwrap();
        runner.on_scenario_end().await.unwrap();
    }

    assert_eq!(calls(&log), ["web_user", "web_checkout_user"]);
}

#[tokio::test]
async fn equally_specific_matches_are_ambiguous() {
    let log = CallLog::default();
    let runner = runner(RuntimeConfiguration::default(), |builder| {
        builder
            .add_step(given("a signed in user", recorder(&log, "first")))
            .add_step(given("a signed in (.*)", recorder(&log, "second")).with_parameter::<String>());
    });
    open_scenario(&runner, feature("Shop"), "Browsing").await;
    runner.given("a signed in user", None, None).await.unwrap();

    let error = binding_error(&runner).await;
    assert!(matches!(
        &error,
        BindingError::AmbiguousSteps { step, candidates }
            if step == "Given a signed in user" && candidates.len() == 2
    ));
    assert!(calls(&log).is_empty());
}

#[tokio::test]
async fn unconvertible_arguments_rule_a_binding_out() {
    let log = CallLog::default();
    let runner = runner(RuntimeConfiguration::default(), |builder| {
        builder
            .add_step(given(r"(\w+) items in stock", recorder(&log, "counted")).with_parameter::<u32>())
            .add_step(given(r"(\w+) items in stock", recorder(&log, "named")).with_parameter::<String>());
    });
    open_scenario(&runner, feature("Stock"), "Counting").await;
    runner.given("many items in stock", None, None).await.unwrap();
    runner.given("12 items in stock", None, None).await.unwrap();

    assert_eq!(calls(&log), ["named"]);
    let error = binding_error(&runner).await;
    assert!(matches!(error, BindingError::AmbiguousSteps { .. }));
}

#[tokio::test]
async fn text_matches_without_fitting_parameters_are_reported() {
    let log = CallLog::default();
    let runner = runner(RuntimeConfiguration::default(), |builder| {
        builder.add_step(given(r"(\w+) items in stock", recorder(&log, "counted")).with_parameter::<u32>());
    });
    open_scenario(&runner, feature("Stock"), "Counting").await;
    runner.given("many items in stock", None, None).await.unwrap();

    let error = binding_error(&runner).await;
    assert!(matches!(
        error,
        BindingError::AmbiguousParameters { candidates, .. } if candidates == ["counted ((\\w+) items in stock)"]
    ));
}

#[tokio::test]
async fn patterns_match_the_whole_step_text() {
    let tracer = Arc::new(RecordingTracer::default());
    let log = CallLog::default();
    let runner = TestRunner::new(
        "anchors".into(),
        common::engine(RuntimeConfiguration::default(), |builder| {
            builder.add_step(given("a user", recorder(&log, "user")));
        })
        .with_tracer(Arc::clone(&tracer) as Arc<dyn stepflow::TestTracer>),
    );
    open_scenario(&runner, feature("Shop"), "Browsing").await;
    runner.given("a user with a basket", None, None).await.unwrap();

    assert!(calls(&log).is_empty());
    assert!(
        tracer
            .lines()
            .contains(&"no match: a user with a basket (rust, en-US, 0 candidates)".to_owned())
    );
    let engine = runner.engine().await;
    let scenario = engine.scenario_context().expect("scenario running");
    assert_eq!(scenario.status(), ScenarioExecutionStatus::UndefinedStep);
    assert_eq!(scenario.missing_steps().len(), 1);
}

#[tokio::test]
async fn multiline_text_and_tables_are_trailing_arguments() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let runner = runner(RuntimeConfiguration::default(), move |builder| {
        builder.add_step(
            given(
                r"an order for (\w+)",
                stepflow::BindingMethod::new("order", move |_ctx, mut args: stepflow::Arguments| {
                    let sink = Arc::clone(&sink);
                    async move {
                        let customer: String = args.take(0)?;
                        let note: String = args.take(1)?;
                        let lines: stepflow::Table = args.take(2)?;
                        sink.lock().expect("sink poisoned").push(format!(
                            "{customer}: {note} ({} lines, first {})",
                            lines.row_count(),
                            lines.cell(0, "item").unwrap_or_default()
                        ));
                        Ok(None)
                    }
                }),
            )
            .with_parameter::<String>()
            .with_parameter::<String>()
            .with_parameter::<stepflow::Table>(),
        );
    });
    open_scenario(&runner, feature("Orders"), "Placing").await;
    let mut table = stepflow::Table::new(["item", "quantity"]);
    table.add_row(["apple", "2"]).unwrap();
    runner
        .given("an order for ada", Some("leave at the door".to_owned()), Some(table))
        .await
        .unwrap();

    assert_eq!(
        runner.scenario_status().await,
        Some(ScenarioExecutionStatus::Ok)
    );
    assert_eq!(
        *seen.lock().unwrap(),
        ["ada: leave at the door (1 lines, first apple)"]
    );
}
