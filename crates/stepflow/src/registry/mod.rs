//! Identity-keyed pools of runners.
//!
//! A [`RunnerRegistry`] hands out one [`TestRunner`] per execution identity.
//! The first runner it creates also builds the binding catalog and starts
//! the test run; disposing the registry ends the run exactly once.
//!
//! Two locks guard creation. The creation lock serializes runner creation
//! after a failed lock-free lookup; the catalog lock, taken inside it,
//! serializes test-run initialization. A failed initialization leaves the
//! catalog unset so the next lookup retries it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::bindings::{
    BindingCatalog, BindingCatalogBuilder, BindingSourceError, BindingSourceLoader,
    InventorySourceLoader,
};
use crate::config::RuntimeConfiguration;
use crate::container::{ContainerScope, ObjectContainer};
use crate::context::ContextDirectory;
use crate::engine::{StepError, StepErrorHandler, TestExecutionEngine};
use crate::events::{EventSink, NoopEventSink};
use crate::identity::RunnerIdentity;
use crate::runner::TestRunner;
use crate::tracer::TestTracer;

mod directory;

pub use directory::RegistryDirectory;

/// Failure to create runners or to start or end the test run.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// Loading a binding source failed.
    #[error(transparent)]
    Source(#[from] BindingSourceError),
    /// A `BeforeTestRun` hook failed.
    #[error("test run failed to start: {0}")]
    RunStart(#[source] Arc<StepError>),
    /// An `AfterTestRun` hook failed.
    #[error("test run failed to end: {0}")]
    RunEnd(#[source] Arc<StepError>),
    /// The registry was disposed.
    #[error("runner registry for {0:?} has been disposed")]
    Disposed(String),
    /// A registry is already installed for the assembly.
    #[error("a runner registry for {0:?} is already installed")]
    AlreadyRegistered(String),
}

/// Pool of runners for one test assembly.
///
/// # Examples
///
/// ```
/// use stepflow::{RunnerIdentity, RunnerRegistry, RuntimeConfiguration};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let registry = RunnerRegistry::new("doc-assembly", RuntimeConfiguration::default());
/// let first = registry.get_runner(Some(RunnerIdentity::new("w1"))).await.unwrap();
/// let again = registry.get_runner(Some(RunnerIdentity::new("w1"))).await.unwrap();
/// assert!(std::sync::Arc::ptr_eq(&first, &again));
/// registry.dispose().await.unwrap();
/// assert!(registry.is_disposed());
/// # });
/// ```
pub struct RunnerRegistry {
    assembly: String,
    config: Arc<RuntimeConfiguration>,
    loader: Arc<dyn BindingSourceLoader>,
    tracer: Option<Arc<dyn TestTracer>>,
    events: Arc<dyn EventSink>,
    step_error_handlers: Vec<Arc<dyn StepErrorHandler>>,
    global_container: Arc<ObjectContainer>,
    runners: DashMap<RunnerIdentity, Arc<TestRunner>>,
    creation: Mutex<()>,
    catalog: Mutex<Option<Arc<BindingCatalog>>>,
    contexts: Arc<ContextDirectory>,
    disposed: AtomicBool,
}

impl std::fmt::Debug for RunnerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerRegistry")
            .field("assembly", &self.assembly)
            .field("config", &self.config)
            .field("runners", &self.runners.len())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl RunnerRegistry {
    /// Registry loading the binding source named `assembly` through the
    /// inventory.
    #[must_use]
    pub fn new(assembly: impl Into<String>, config: RuntimeConfiguration) -> Self {
        Self {
            assembly: assembly.into(),
            config: Arc::new(config),
            loader: Arc::new(InventorySourceLoader),
            tracer: None,
            events: Arc::new(NoopEventSink),
            step_error_handlers: Vec::new(),
            global_container: Arc::new(ObjectContainer::root(ContainerScope::Global)),
            runners: DashMap::new(),
            creation: Mutex::new(()),
            catalog: Mutex::new(None),
            contexts: Arc::new(ContextDirectory::default()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Resolve binding sources with `loader`.
    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn BindingSourceLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Trace every runner's execution to `tracer`.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<dyn TestTracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Send every runner's lifecycle events to `events`.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Offer every runner's step body failures to `handler`.
    #[must_use]
    pub fn with_step_error_handler(mut self, handler: Arc<dyn StepErrorHandler>) -> Self {
        self.step_error_handlers.push(handler);
        self
    }

    /// Name of the primary binding source.
    #[must_use]
    pub fn assembly(&self) -> &str {
        &self.assembly
    }

    /// Configuration shared by the runners.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfiguration {
        &self.config
    }

    /// Container shared by every runner's test-thread container.
    #[must_use]
    pub fn global_container(&self) -> &Arc<ObjectContainer> {
        &self.global_container
    }

    /// Contexts published by the runners.
    #[must_use]
    pub fn contexts(&self) -> &Arc<ContextDirectory> {
        &self.contexts
    }

    /// Number of live runners.
    #[must_use]
    pub fn runner_count(&self) -> usize {
        self.runners.len()
    }

    /// Whether [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// The runner for `identity`, created on first use.
    ///
    /// Without an identity the calling thread's identity is used. When
    /// parallel execution is disabled every lookup maps to the fixed
    /// identity, so all callers share one runner. The first runner created
    /// builds the binding catalog and starts the test run.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Disposed`] after disposal;
    /// - [`RegistryError::Source`] when a binding source fails to load;
    /// - [`RegistryError::RunStart`] when a `BeforeTestRun` hook fails.
    pub async fn get_runner(
        &self,
        identity: Option<RunnerIdentity>,
    ) -> Result<Arc<TestRunner>, RegistryError> {
        if self.is_disposed() {
            return Err(RegistryError::Disposed(self.assembly.clone()));
        }
        let identity = if self.config.disable_parallel_execution() {
            RunnerIdentity::fixed()
        } else {
            identity.unwrap_or_else(RunnerIdentity::current_thread)
        };
        if let Some(runner) = self.runners.get(&identity) {
            return Ok(Arc::clone(runner.value()));
        }

        let _creation = self.creation.lock().await;
        if let Some(runner) = self.runners.get(&identity) {
            return Ok(Arc::clone(runner.value()));
        }
        if self.is_disposed() {
            return Err(RegistryError::Disposed(self.assembly.clone()));
        }
        let runner = self.create_runner(identity.clone()).await?;
        self.runners.insert(identity, Arc::clone(&runner));
        if self.is_disposed() {
            return Err(RegistryError::Disposed(self.assembly.clone()));
        }
        if self.runners.len() > 1 {
            self.contexts.disable_singleton();
        }
        Ok(runner)
    }

    async fn create_runner(&self, identity: RunnerIdentity) -> Result<Arc<TestRunner>, RegistryError> {
        let mut sealed = self.catalog.lock().await;
        let first_runner = sealed.is_none();
        let catalog = match sealed.as_ref() {
            Some(catalog) => Arc::clone(catalog),
            None => Arc::new(self.build_catalog()?),
        };

        let thread_container = Arc::new(ObjectContainer::child(
            &self.global_container,
            ContainerScope::TestThread,
        ));
        let mut engine = TestExecutionEngine::new(
            Arc::clone(&catalog),
            Arc::clone(&self.config),
            thread_container,
        )
        .with_event_sink(Arc::clone(&self.events))
        .with_context_slots(self.contexts.register(identity.clone()));
        if let Some(tracer) = &self.tracer {
            engine = engine.with_tracer(Arc::clone(tracer));
        }
        for handler in &self.step_error_handlers {
            engine = engine.with_step_error_handler(Arc::clone(handler));
        }
        let runner = Arc::new(TestRunner::new(identity.clone(), engine));

        if first_runner {
            if let Err(error) = runner.on_test_run_start().await {
                self.contexts.remove(&identity);
                log::warn!(
                    target: "stepflow",
                    "test run for {} failed to start: {error}",
                    self.assembly
                );
                return Err(RegistryError::RunStart(Arc::new(error)));
            }
            *sealed = Some(catalog);
            log::debug!(
                target: "stepflow",
                "test run for {} started by runner {identity}",
                self.assembly
            );
        }
        Ok(runner)
    }

    fn build_catalog(&self) -> Result<BindingCatalog, RegistryError> {
        let mut builder = BindingCatalogBuilder::new();
        if self.loader.load(&self.assembly, &mut builder)? == 0 {
            log::debug!(target: "stepflow", "no binding source is named {:?}", self.assembly);
        }
        for source in self.config.additional_binding_sources() {
            if self.loader.load(source, &mut builder)? == 0 {
                return Err(BindingSourceError::NotFound(source.clone()).into());
            }
        }
        let catalog = builder.building_completed();
        log::info!(
            target: "stepflow",
            "binding catalog for {} sealed with {} step bindings from {} sources",
            self.assembly,
            catalog.step_bindings().len(),
            catalog.sources().len()
        );
        Ok(catalog)
    }

    /// End the test run on one runner and release every runner.
    ///
    /// Only the first call does anything, however many callers race.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::RunEnd`] when an `AfterTestRun` hook fails;
    /// the registry is released regardless.
    pub async fn dispose(&self) -> Result<(), RegistryError> {
        if self
            .disposed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        // A runner still being created is inserted before the creation lock
        // is released, and later creations see the disposed flag.
        let survivor = {
            let _creation = self.creation.lock().await;
            self.runners.iter().next().map(|entry| Arc::clone(entry.value()))
        };
        let ended = match survivor {
            Some(runner) => runner
                .on_test_run_end()
                .await
                .map_err(|error| RegistryError::RunEnd(Arc::new(error))),
            None => Ok(()),
        };
        self.runners.clear();
        self.contexts.clear();
        self.global_container.clear();
        log::debug!(target: "stepflow", "runner registry for {} disposed", self.assembly);
        ended
    }
}
