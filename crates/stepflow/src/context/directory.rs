//! Identity-scoped access to the running contexts.
//!
//! Each engine publishes its feature, scenario and step into a
//! [`ContextSlots`] value registered under the runner's identity. Code that
//! does not know its identity may look up the only registered runner, until a
//! second runner appears and the shortcut is disabled for good.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;

use super::ContextError;
use crate::container::ObjectContainer;
use crate::identity::RunnerIdentity;
use crate::info::{FeatureInfo, ScenarioInfo, StepInfo};

/// A published context: its description and its container.
#[derive(Debug)]
pub struct PublishedContext<T> {
    info: Arc<T>,
    container: Arc<ObjectContainer>,
}

impl<T> PublishedContext<T> {
    pub(crate) fn new(info: Arc<T>, container: Arc<ObjectContainer>) -> Self {
        Self { info, container }
    }

    /// Description of the context.
    #[must_use]
    pub fn info(&self) -> &Arc<T> {
        &self.info
    }

    /// Container scoped to the context.
    #[must_use]
    pub fn container(&self) -> &Arc<ObjectContainer> {
        &self.container
    }
}

impl<T> Clone for PublishedContext<T> {
    fn clone(&self) -> Self {
        Self {
            info: Arc::clone(&self.info),
            container: Arc::clone(&self.container),
        }
    }
}

/// Contexts published by one engine.
#[derive(Debug, Default)]
pub struct ContextSlots {
    feature: RwLock<Option<PublishedContext<FeatureInfo>>>,
    scenario: RwLock<Option<PublishedContext<ScenarioInfo>>>,
    step: RwLock<Option<Arc<StepInfo>>>,
}

fn read<T: Clone>(slot: &RwLock<Option<T>>) -> Option<T> {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn write<T>(slot: &RwLock<Option<T>>, value: Option<T>) {
    *slot.write().unwrap_or_else(PoisonError::into_inner) = value;
}

impl ContextSlots {
    /// The running feature.
    #[must_use]
    pub fn feature(&self) -> Option<PublishedContext<FeatureInfo>> {
        read(&self.feature)
    }

    /// The running scenario.
    #[must_use]
    pub fn scenario(&self) -> Option<PublishedContext<ScenarioInfo>> {
        read(&self.scenario)
    }

    /// The running step.
    #[must_use]
    pub fn step(&self) -> Option<Arc<StepInfo>> {
        read(&self.step)
    }

    pub(crate) fn publish_feature(&self, feature: Option<PublishedContext<FeatureInfo>>) {
        write(&self.feature, feature);
    }

    pub(crate) fn publish_scenario(&self, scenario: Option<PublishedContext<ScenarioInfo>>) {
        write(&self.scenario, scenario);
    }

    pub(crate) fn publish_step(&self, step: Option<Arc<StepInfo>>) {
        write(&self.step, step);
    }
}

/// Map from runner identity to the contexts its engine publishes.
///
/// # Examples
///
/// ```
/// use stepflow::{ContextDirectory, ContextError, RunnerIdentity};
///
/// let directory = ContextDirectory::default();
/// directory.register(RunnerIdentity::new("a"));
/// assert!(directory.lookup(None).is_ok());
///
/// directory.register(RunnerIdentity::new("b"));
/// directory.disable_singleton();
/// assert_eq!(directory.lookup(None).unwrap_err(), ContextError::SingletonDisabled);
/// assert!(directory.lookup(Some(&RunnerIdentity::new("b"))).is_ok());
/// ```
#[derive(Debug)]
pub struct ContextDirectory {
    slots: DashMap<RunnerIdentity, Arc<ContextSlots>>,
    singleton_enabled: AtomicBool,
}

impl Default for ContextDirectory {
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
            singleton_enabled: AtomicBool::new(true),
        }
    }
}

impl ContextDirectory {
    /// Slots for `identity`, created on first use.
    pub fn register(&self, identity: RunnerIdentity) -> Arc<ContextSlots> {
        Arc::clone(self.slots.entry(identity).or_default().value())
    }

    /// Slots for `identity`, or for the only registered runner when no
    /// identity is given.
    ///
    /// # Errors
    ///
    /// - [`ContextError::UnknownIdentity`] when `identity` is not registered.
    /// - [`ContextError::SingletonDisabled`] for an identity-less lookup once
    ///   several runners exist.
    /// - [`ContextError::NoRunner`] for an identity-less lookup before any
    ///   runner exists.
    pub fn lookup(&self, identity: Option<&RunnerIdentity>) -> Result<Arc<ContextSlots>, ContextError> {
        if let Some(identity) = identity {
            return self
                .slots
                .get(identity)
                .map(|slots| Arc::clone(slots.value()))
                .ok_or_else(|| ContextError::UnknownIdentity(identity.to_string()));
        }
        if !self.is_singleton_enabled() || self.slots.len() > 1 {
            return Err(ContextError::SingletonDisabled);
        }
        self.slots
            .iter()
            .next()
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(ContextError::NoRunner)
    }

    /// Forget the runner registered as `identity`.
    pub fn remove(&self, identity: &RunnerIdentity) {
        self.slots.remove(identity);
    }

    /// Permanently turn off identity-less lookups.
    pub fn disable_singleton(&self) {
        if self.singleton_enabled.swap(false, Ordering::AcqRel) {
            log::debug!(target: "stepflow", "identity-less context lookup disabled");
        }
    }

    /// Whether identity-less lookups are still allowed.
    #[must_use]
    pub fn is_singleton_enabled(&self) -> bool {
        self.singleton_enabled.load(Ordering::Acquire)
    }

    /// Number of registered runners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no runner is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Forget every runner.
    pub fn clear(&self) {
        self.slots.clear();
    }
}
