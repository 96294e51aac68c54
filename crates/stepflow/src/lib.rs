//! Scenario execution engine for behaviour-driven tests.
//!
//! Step definitions, hooks and step argument transformations are collected
//! into a [`BindingCatalog`] from named binding sources. A
//! [`RunnerRegistry`] hands out one [`TestRunner`] per execution identity;
//! generated test code drives each runner through the feature, scenario and
//! step lifecycle, and the runner's [`TestExecutionEngine`] matches steps,
//! converts their arguments, fires hooks and decides each scenario's outcome.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use stepflow::{
//!     Arguments, BindingCatalogBuilder, BindingMethod, ContainerScope, FeatureInfo, ObjectContainer,
//!     RunnerIdentity, RuntimeConfiguration, ScenarioInfo, ScenarioOutcome, StepBinding,
//!     StepDefinitionType, TestExecutionEngine, TestRunner,
//! };
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut builder = BindingCatalogBuilder::new();
//! builder.add_step(
//!     StepBinding::new(
//!         StepDefinitionType::Given,
//!         r"a basket with (\d+) items",
//!         BindingMethod::new("basket", |_ctx, mut args: Arguments| async move {
//!             let items: u32 = args.take(0)?;
//!             assert_eq!(items, 3);
//!             Ok(None)
//!         }),
//!     )
//!     .unwrap()
//!     .with_parameter::<u32>(),
//! );
//! let engine = TestExecutionEngine::new(
//!     Arc::new(builder.building_completed()),
//!     Arc::new(RuntimeConfiguration::default()),
//!     Arc::new(ObjectContainer::root(ContainerScope::TestThread)),
//! );
//! let runner = TestRunner::new(RunnerIdentity::new("doc"), engine);
//!
//! runner
//!     .on_feature_start(FeatureInfo::new("en-US".parse().unwrap(), "Basket", None))
//!     .await
//!     .unwrap();
//! runner.on_scenario_initialize(ScenarioInfo::new("Counting", None)).await;
//! runner.on_scenario_start().await.unwrap();
//! runner.given("a basket with 3 items", None, None).await.unwrap();
//! assert_eq!(runner.collect_scenario_errors().await.unwrap(), ScenarioOutcome::Passed);
//! runner.on_scenario_end().await.unwrap();
//! runner.on_feature_end().await.unwrap();
//! # });
//! ```

pub use inventory::{iter, submit};

mod bindings;
mod config;
mod container;
mod context;
mod conversion;
mod diagnostics;
mod engine;
mod events;
mod identity;
mod info;
mod keyword;
mod matching;
mod panic;
mod registry;
mod reporting;
mod runner;
mod status;
mod table;
mod tracer;

pub use bindings::{
    ArgValue, Arguments, BindingCatalog, BindingCatalogBuilder, BindingContext, BindingFuture,
    BindingMethod, BindingResult, BindingScope, BindingSource, BindingSourceError,
    BindingSourceLoader, BindingType, HookBinding, HookType, Invocable, InventorySourceLoader,
    RawArgument, StepBinding, StepEnum, StepFailure, StepScope, StepTransformation,
};
pub use config::{
    ConfigParseError, MissingOrPendingStepsOutcome, ObsoleteBehavior, RuntimeConfiguration,
};
pub use container::{ContainerScope, ObjectContainer, ResolutionError};
pub use context::{
    ContextDirectory, ContextError, ContextManager, ContextSlots, FeatureContext,
    PublishedContext, ScenarioContext, StepContext,
};
pub use conversion::{ConversionError, StepArgumentTypeConverter};
pub use diagnostics::{ErrorProvider, StepFormatter};
pub use engine::{
    BindingError, ScenarioError, ScenarioOutcome, StepError, StepErrorHandler, StepFailureEvent,
    TestExecutionEngine,
};
pub use events::{EventSink, EventSinkError, NoopEventSink, TestResult};
pub use identity::RunnerIdentity;
pub use info::{FeatureInfo, ScenarioInfo, StepInfo, StepMatchSummary};
pub use keyword::{ScenarioBlock, StepDefinitionKeyword, StepDefinitionType, StepKeywordParseError};
pub use matching::{
    AmbiguityReason, BindingMatch, MatchedBinding, StepDefinitionMatchService, StepInstance,
};
pub use panic::panic_message;
pub use registry::{RegistryDirectory, RegistryError, RunnerRegistry};
pub use reporting::{ReportCollector, ScenarioRecord};
pub use runner::TestRunner;
pub use status::{ExecutionStatus, ScenarioExecutionStatus};
pub use table::{Table, TableShapeError};
pub use tracer::{LogTracer, TestTracer};
