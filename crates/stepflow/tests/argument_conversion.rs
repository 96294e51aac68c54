//! Behavioural tests for step argument conversion.
#![expect(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "tests fail loudly on unexpected errors"
)]

use std::sync::{Arc, Mutex};

use rstest::rstest;
use stepflow::{
    ArgValue, Arguments, BindingMethod, BindingType, FeatureInfo, RuntimeConfiguration,
    ScenarioExecutionStatus, StepError, StepFailure, StepTransformation, TestRunner, TestTracer,
    step_enum,
};
use unic_langid::{LanguageIdentifier, langid};
use uuid::Uuid;

mod common;
use common::{RecordingTracer, feature, given, open_scenario, runner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
}

step_enum!(Weekday {
    Monday,
    Tuesday,
    Wednesday
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cents(u64);

type Seen<T> = Arc<Mutex<Vec<T>>>;

/// Binding taking one `T` argument and recording it.
fn capture<T: Clone + Send + Sync + 'static>(seen: &Seen<T>) -> BindingMethod {
    let seen = Arc::clone(seen);
    BindingMethod::new("capture", move |_ctx, mut args: Arguments| {
        let seen = Arc::clone(&seen);
        async move {
            let value: T = args.take(0)?;
            seen.lock().expect("capture poisoned").push(value);
            Ok(None)
        }
    })
}

fn cents_from_euros() -> StepTransformation {
    StepTransformation::new(
        BindingType::of::<Cents>(),
        BindingMethod::new("cents_from_euros", |_ctx, mut args: Arguments| async move {
            let euros: u64 = args.take(0)?;
            let cents: u64 = args.take(1)?;
            Ok(Some(Box::new(Cents(euros * 100 + cents)) as ArgValue))
        }),
    )
    .with_regex(r"(\d+)\.(\d\d) EUR")
    .expect("valid transformation pattern")
    .with_parameter::<u64>()
    .with_parameter::<u64>()
}

async fn single_step(runner: &TestRunner, language: LanguageIdentifier, text: &str) {
    let info = FeatureInfo::new(language, "Conversion", None);
    open_scenario(runner, info, "Converting").await;
    runner.given(text, None, None).await.unwrap();
}

#[rstest]
#[case("Tuesday", Weekday::Tuesday)]
#[case("tu esday", Weekday::Tuesday)]
#[case("WEDNESDAY", Weekday::Wednesday)]
#[tokio::test]
async fn enums_are_parsed_by_variant_name(#[case] text: &str, #[case] expected: Weekday) {
    let seen = Seen::<Weekday>::default();
    let runner = runner(RuntimeConfiguration::default(), |builder| {
        builder.add_step(
            given(r"the shop opens on (.+)", capture(&seen))
                .with_parameter_type(BindingType::enumeration::<Weekday>()),
        );
    });
    single_step(&runner, langid!("en-US"), &format!("the shop opens on {text}")).await;

    assert_eq!(*seen.lock().unwrap(), [expected]);
}

#[tokio::test]
async fn unknown_variants_leave_the_step_unbound() {
    let seen = Seen::<Weekday>::default();
    let runner = runner(RuntimeConfiguration::default(), |builder| {
        builder.add_step(
            given(r"the shop opens on (.+)", capture(&seen))
                .with_parameter_type(BindingType::enumeration::<Weekday>()),
        );
    });
    single_step(&runner, langid!("en-US"), "the shop opens on Caturday").await;

    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(
        runner.scenario_status().await,
        Some(ScenarioExecutionStatus::BindingError)
    );
}

#[rstest]
#[case("", None)]
#[case(
    "67e55044-10b1-426f-9247-bb680e5fe0c8",
    Some(Uuid::from_u128(0x67e5_5044_10b1_426f_9247_bb68_0e5f_e0c8))
)]
#[tokio::test]
async fn optional_uuids_accept_empty_text(#[case] text: &str, #[case] expected: Option<Uuid>) {
    let seen = Seen::<Option<Uuid>>::default();
    let runner = runner(RuntimeConfiguration::default(), |builder| {
        builder.add_step(
            given(r"an order referencing '(.*)'", capture(&seen)).with_parameter::<Option<Uuid>>(),
        );
    });
    single_step(&runner, langid!("en-US"), &format!("an order referencing '{text}'")).await;

    assert_eq!(*seen.lock().unwrap(), [expected]);
}

#[rstest]
#[case(langid!("en-US"), "1,234.5", 1234.5)]
#[case(langid!("de-DE"), "1.234,5", 1234.5)]
#[case(langid!("fr-FR"), "2,75", 2.75)]
#[case(langid!("de-CH"), "3.5", 3.5)]
#[tokio::test]
async fn numbers_follow_the_feature_language(
    #[case] language: LanguageIdentifier,
    #[case] text: &str,
    #[case] expected: f64,
) {
    let seen = Seen::<f64>::default();
    let runner = runner(RuntimeConfiguration::default(), |builder| {
        builder.add_step(given(r"a parcel of (\S+) kg", capture(&seen)).with_parameter::<f64>());
    });
    single_step(&runner, language, &format!("a parcel of {text} kg")).await;

    assert_eq!(*seen.lock().unwrap(), [expected]);
}

#[tokio::test]
async fn the_configured_culture_overrides_the_feature_language() {
    let seen = Seen::<f64>::default();
    let config = RuntimeConfiguration::default().with_binding_culture(langid!("de-DE"));
    let runner = runner(config, |builder| {
        builder.add_step(given(r"a parcel of (\S+) kg", capture(&seen)).with_parameter::<f64>());
    });
    single_step(&runner, langid!("en-US"), "a parcel of 2,5 kg").await;

    assert_eq!(*seen.lock().unwrap(), [2.5]);
}

#[tokio::test]
async fn transformations_convert_matching_text() {
    let seen = Seen::<Cents>::default();
    let runner = runner(RuntimeConfiguration::default(), |builder| {
        builder
            .add_transformation(cents_from_euros())
            .add_step(given(r"a price of (.+)", capture(&seen)).with_parameter::<Cents>());
    });
    single_step(&runner, langid!("en-US"), "a price of 12.50 EUR").await;
    runner.given("a price of twelve euros", None, None).await.unwrap();

    assert_eq!(*seen.lock().unwrap(), [Cents(1250)]);
    assert_eq!(
        runner.scenario_status().await,
        Some(ScenarioExecutionStatus::BindingError)
    );
}

fn flat_fee() -> StepTransformation {
    StepTransformation::new(
        BindingType::of::<Cents>(),
        BindingMethod::new("flat_fee", |_ctx, _args| async {
            Ok(Some(Box::new(Cents(7)) as ArgValue))
        }),
    )
}

#[rstest]
#[case(vec![cents_from_euros(), flat_fee()], Cents(1250))]
#[case(vec![flat_fee(), cents_from_euros()], Cents(7))]
#[tokio::test]
async fn the_first_matching_transformation_wins_with_a_warning(
    #[case] transformations: Vec<StepTransformation>,
    #[case] expected: Cents,
) {
    let seen = Seen::<Cents>::default();
    let tracer = Arc::new(RecordingTracer::default());
    let engine = common::engine(RuntimeConfiguration::default(), |builder| {
        for transformation in transformations {
            builder.add_transformation(transformation);
        }
        builder.add_step(given(r"a price of (.+)", capture(&seen)).with_parameter::<Cents>());
    })
    .with_tracer(Arc::clone(&tracer) as Arc<dyn TestTracer>);
    let runner = TestRunner::new("transformations".into(), engine);
    single_step(&runner, langid!("en-US"), "a price of 12.50 EUR").await;

    assert_eq!(*seen.lock().unwrap(), [expected]);
    let warnings: Vec<String> = tracer
        .lines()
        .into_iter()
        .filter(|line| line.starts_with("warning: "))
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings.iter().all(|line| {
        line.contains("Multiple step transformation matches") && line.contains("12.50 EUR")
    }));
}

#[tokio::test]
async fn failing_transformations_fail_the_step() {
    let seen = Seen::<Cents>::default();
    let runner = runner(RuntimeConfiguration::default(), |builder| {
        builder
            .add_transformation(StepTransformation::new(
                BindingType::of::<Cents>(),
                BindingMethod::new("broken_money", |_ctx, _args| async {
                    Err(StepFailure::message("exchange rate service unavailable"))
                }),
            ))
            .add_step(given(r"a price of (.+)", capture(&seen)).with_parameter::<Cents>());
    });
    single_step(&runner, langid!("en-US"), "a price of 12.50 EUR").await;

    assert!(seen.lock().unwrap().is_empty());
    let engine = runner.engine().await;
    let scenario = engine.scenario_context().expect("scenario running");
    assert_eq!(scenario.status(), ScenarioExecutionStatus::TestError);
    assert!(matches!(
        scenario.test_error().map(|error| &**error),
        Some(StepError::Conversion(error)) if error.to_string().contains("exchange rate service unavailable")
    ));
}

#[tokio::test]
async fn text_reaches_string_parameters_unchanged() {
    let seen = Seen::<String>::default();
    let runner = runner(RuntimeConfiguration::default(), |builder| {
        builder.add_step(given(r"a note saying '(.*)'", capture(&seen)).with_parameter::<String>());
    });
    open_scenario(&runner, feature("Notes"), "Writing").await;
    runner
        .given("a note saying ' 1,5 '", None, None)
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), [" 1,5 ".to_owned()]);
}
