//! External event stream notifications.
//!
//! The engine notifies an [`EventSink`] when the run starts and when each
//! test case starts and finishes. Sink failures are logged and never affect
//! the scenario.

use std::error::Error;
use std::time::Duration;

use crate::info::{FeatureInfo, ScenarioInfo};
use crate::status::ScenarioExecutionStatus;

/// Error type returned by sinks.
pub type EventSinkError = Box<dyn Error + Send + Sync>;

/// Result of a finished test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    status: ScenarioExecutionStatus,
    duration: Duration,
    message: Option<String>,
}

impl TestResult {
    /// Describe a finished test case.
    #[must_use]
    pub fn new(status: ScenarioExecutionStatus, duration: Duration, message: Option<String>) -> Self {
        Self {
            status,
            duration,
            message,
        }
    }

    /// Final status.
    #[must_use]
    pub fn status(&self) -> ScenarioExecutionStatus {
        self.status
    }

    /// Time from scenario initialization to the end of its last step.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Pending, undefined or failure message.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Receiver of run and test case events.
///
/// Every method defaults to doing nothing.
pub trait EventSink: Send + Sync {
    /// The test run started.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the engine logs the error.
    fn test_run_started(&self) -> Result<(), EventSinkError> {
        Ok(())
    }

    /// A test case started.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the engine logs the error.
    fn test_case_started(&self, scenario: &ScenarioInfo) -> Result<(), EventSinkError> {
        let _ = scenario;
        Ok(())
    }

    /// A test case finished.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the engine logs the error.
    fn test_case_finished(
        &self,
        feature: Option<&FeatureInfo>,
        scenario: &ScenarioInfo,
        result: &TestResult,
    ) -> Result<(), EventSinkError> {
        let _ = (feature, scenario, result);
        Ok(())
    }
}

/// Sink discarding every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {}

/// Log a sink failure without escalating it.
pub(crate) fn report_failure(event: &str, outcome: Result<(), EventSinkError>) {
    if let Err(err) = outcome {
        log::warn!(target: "stepflow", "event sink failed to handle {event}: {err}");
    }
}
