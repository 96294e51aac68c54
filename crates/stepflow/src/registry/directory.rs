//! Process-wide map from test assembly to runner registry.
//!
//! Nothing here runs at process exit. Hosts end each assembly's run with
//! [`RegistryDirectory::on_test_run_end`] or [`RegistryDirectory::reset`];
//! a registry disposed directly is dropped from the directory on its next
//! lookup.

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use tokio::sync::Mutex;

use super::{RegistryError, RunnerRegistry};
use crate::config::RuntimeConfiguration;
use crate::identity::RunnerIdentity;
use crate::runner::TestRunner;

static GLOBAL: LazyLock<RegistryDirectory> = LazyLock::new(RegistryDirectory::default);

/// Registries keyed by test assembly, so unrelated assemblies in one process
/// share neither catalogs nor contexts.
///
/// Registries created on demand read their configuration from the
/// environment. Install a custom one with [`register`](Self::register).
#[derive(Debug, Default)]
pub struct RegistryDirectory {
    registries: DashMap<String, Arc<RunnerRegistry>>,
    creation: Mutex<()>,
}

impl RegistryDirectory {
    /// The process-wide directory.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// The registry for `assembly`, created when missing and
    /// `create_if_missing` is set.
    pub async fn get_registry(
        &self,
        assembly: &str,
        create_if_missing: bool,
    ) -> Option<Arc<RunnerRegistry>> {
        if let Some(registry) = self.live(assembly) {
            return Some(registry);
        }
        if !create_if_missing {
            return None;
        }
        let _creation = self.creation.lock().await;
        if let Some(registry) = self.live(assembly) {
            return Some(registry);
        }
        let registry = Arc::new(RunnerRegistry::new(
            assembly,
            RuntimeConfiguration::from_env(),
        ));
        self.registries
            .insert(assembly.to_owned(), Arc::clone(&registry));
        Some(registry)
    }

    /// The installed registry for `assembly`, forgetting it when it was
    /// disposed behind the directory's back.
    fn live(&self, assembly: &str) -> Option<Arc<RunnerRegistry>> {
        let registry = Arc::clone(self.registries.get(assembly)?.value());
        if registry.is_disposed() {
            self.registries
                .remove_if(assembly, |_, installed| Arc::ptr_eq(installed, &registry));
            log::debug!(
                target: "stepflow",
                "dropped disposed runner registry for {assembly}"
            );
            return None;
        }
        Some(registry)
    }

    /// Install `registry` for its assembly.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyRegistered`] when the assembly already
    /// has a registry.
    pub async fn register(
        &self,
        registry: RunnerRegistry,
    ) -> Result<Arc<RunnerRegistry>, RegistryError> {
        let _creation = self.creation.lock().await;
        let assembly = registry.assembly().to_owned();
        if self.live(&assembly).is_some() {
            return Err(RegistryError::AlreadyRegistered(assembly));
        }
        let registry = Arc::new(registry);
        self.registries.insert(assembly, Arc::clone(&registry));
        Ok(registry)
    }

    /// The runner for `identity` in the registry of `assembly`.
    ///
    /// # Errors
    ///
    /// See [`RunnerRegistry::get_runner`].
    pub async fn get_test_runner(
        &self,
        assembly: &str,
        identity: Option<RunnerIdentity>,
    ) -> Result<Arc<TestRunner>, RegistryError> {
        let registry = self.get_registry(assembly, true).await;
        match registry {
            Some(registry) => registry.get_runner(identity).await,
            None => Err(RegistryError::Disposed(assembly.to_owned())),
        }
    }

    /// Start the test run of `assembly`.
    ///
    /// Resolving the runner is enough: the registry's first runner starts
    /// the run, so later identities join the run already in progress.
    ///
    /// # Errors
    ///
    /// See [`RunnerRegistry::get_runner`].
    pub async fn on_test_run_start(
        &self,
        assembly: &str,
        identity: Option<RunnerIdentity>,
    ) -> Result<Arc<TestRunner>, RegistryError> {
        self.get_test_runner(assembly, identity).await
    }

    /// End the test run of `assembly` and forget its registry. Does nothing
    /// when the assembly has no registry.
    ///
    /// # Errors
    ///
    /// See [`RunnerRegistry::dispose`].
    pub async fn on_test_run_end(&self, assembly: &str) -> Result<(), RegistryError> {
        let removed = {
            let _creation = self.creation.lock().await;
            self.registries.remove(assembly)
        };
        match removed {
            Some((_, registry)) => registry.dispose().await,
            None => Ok(()),
        }
    }

    /// Dispose and forget every registry.
    ///
    /// # Errors
    ///
    /// Returns the first disposal failure; every registry is disposed
    /// regardless.
    pub async fn reset(&self) -> Result<(), RegistryError> {
        let registries: Vec<Arc<RunnerRegistry>> = {
            let _creation = self.creation.lock().await;
            let drained = self
                .registries
                .iter()
                .map(|entry| Arc::clone(entry.value()))
                .collect();
            self.registries.clear();
            drained
        };
        let mut first_error = None;
        for registry in registries {
            if let Err(error) = registry.dispose().await {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Number of installed registries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registries.len()
    }

    /// Whether no registry is installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests fail loudly on unexpected errors")]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registries_are_created_once_per_assembly() {
        let directory = RegistryDirectory::default();
        assert!(directory.get_registry("shop", false).await.is_none());
        let first = directory.get_registry("shop", true).await.unwrap();
        let again = directory.get_registry("shop", true).await.unwrap();
        let other = directory.get_registry("billing", true).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(directory.len(), 2);
    }

    #[tokio::test]
    async fn run_end_disposes_and_forgets_the_registry() {
        let directory = RegistryDirectory::default();
        let registry = directory
            .register(RunnerRegistry::new("shop", RuntimeConfiguration::default()))
            .await
            .unwrap();
        directory
            .on_test_run_start("shop", Some(RunnerIdentity::new("w1")))
            .await
            .unwrap();
        directory.on_test_run_end("shop").await.unwrap();
        directory.on_test_run_end("shop").await.unwrap();
        assert!(registry.is_disposed());
        assert!(directory.is_empty());
    }

    #[tokio::test]
    async fn installing_twice_is_rejected() {
        let directory = RegistryDirectory::default();
        directory
            .register(RunnerRegistry::new("shop", RuntimeConfiguration::default()))
            .await
            .unwrap();
        let error = directory
            .register(RunnerRegistry::new("shop", RuntimeConfiguration::default()))
            .await
            .unwrap_err();
        assert!(matches!(error, RegistryError::AlreadyRegistered(name) if name == "shop"));
    }

    #[tokio::test]
    async fn reset_disposes_everything() {
        let directory = RegistryDirectory::default();
        let shop = directory.get_registry("shop", true).await.unwrap();
        let billing = directory.get_registry("billing", true).await.unwrap();
        directory.reset().await.unwrap();
        assert!(shop.is_disposed() && billing.is_disposed());
        assert!(directory.is_empty());
    }
}
