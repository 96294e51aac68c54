//! Scenario outcome collection.
//!
//! [`ReportCollector`] is an [`EventSink`] storing one [`ScenarioRecord`] per
//! finished scenario. Reporters read a snapshot to render summaries.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::events::{EventSink, EventSinkError, TestResult};
use crate::info::{FeatureInfo, ScenarioInfo};
use crate::status::ScenarioExecutionStatus;

/// Outcome recorded for one scenario.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioRecord {
    feature_title: Option<String>,
    scenario_title: String,
    tags: Vec<String>,
    status: ScenarioExecutionStatus,
    duration: Duration,
    message: Option<String>,
}

impl ScenarioRecord {
    /// Record `result` for `scenario`.
    #[must_use]
    pub fn new(feature: Option<&FeatureInfo>, scenario: &ScenarioInfo, result: &TestResult) -> Self {
        Self {
            feature_title: feature.map(|feature| feature.title().to_owned()),
            scenario_title: scenario.title().to_owned(),
            tags: scenario.tags().to_vec(),
            status: result.status(),
            duration: result.duration(),
            message: result.message().map(str::to_owned),
        }
    }

    /// Title of the feature the scenario belongs to.
    #[must_use]
    pub fn feature_title(&self) -> Option<&str> {
        self.feature_title.as_deref()
    }

    /// Scenario title.
    #[must_use]
    pub fn scenario_title(&self) -> &str {
        &self.scenario_title
    }

    /// Scenario tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Final status.
    #[must_use]
    pub fn status(&self) -> ScenarioExecutionStatus {
        self.status
    }

    /// Scenario duration.
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

/// Thread-safe store of scenario records.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use stepflow::{EventSink, ReportCollector, ScenarioExecutionStatus, ScenarioInfo, TestResult};
///
/// let collector = ReportCollector::new();
/// let result = TestResult::new(ScenarioExecutionStatus::Ok, Duration::ZERO, None);
/// collector
///     .test_case_finished(None, &ScenarioInfo::new("Pay", None), &result)
///     .unwrap();
/// assert_eq!(collector.snapshot()[0].scenario_title(), "Pay");
/// ```
#[derive(Debug, Default)]
pub struct ReportCollector {
    records: Mutex<Vec<ScenarioRecord>>,
}

impl ReportCollector {
    /// An empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ScenarioRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the records collected so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ScenarioRecord> {
        self.lock().clone()
    }

    /// Remove and return every record.
    pub fn drain(&self) -> Vec<ScenarioRecord> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Serialize the records as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    #[cfg(feature = "diagnostics")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        json::to_string(&self.snapshot())
    }
}

impl EventSink for ReportCollector {
    fn test_case_finished(
        &self,
        feature: Option<&FeatureInfo>,
        scenario: &ScenarioInfo,
        result: &TestResult,
    ) -> Result<(), EventSinkError> {
        self.lock().push(ScenarioRecord::new(feature, scenario, result));
        Ok(())
    }
}

#[cfg(feature = "diagnostics")]
mod json {
    use serde::Serialize;

    use super::ScenarioRecord;

    #[derive(Serialize)]
    struct JsonReport<'a> {
        scenarios: Vec<JsonScenario<'a>>,
    }

    #[derive(Serialize)]
    struct JsonScenario<'a> {
        feature: Option<&'a str>,
        scenario: &'a str,
        status: &'static str,
        duration_ms: u128,
        tags: &'a [String],
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<&'a str>,
    }

    impl<'a> From<&'a ScenarioRecord> for JsonScenario<'a> {
        fn from(record: &'a ScenarioRecord) -> Self {
            Self {
                feature: record.feature_title(),
                scenario: record.scenario_title(),
                status: record.status().label(),
                duration_ms: record.duration().as_millis(),
                tags: record.tags(),
                message: record.message(),
            }
        }
    }

    pub(super) fn to_string(records: &[ScenarioRecord]) -> serde_json::Result<String> {
        serde_json::to_string(&JsonReport {
            scenarios: records.iter().map(JsonScenario::from).collect(),
        })
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    reason = "tests inspect recorded scenarios directly"
)]
mod tests {
    use super::*;
    use unic_langid::langid;

    fn finish(collector: &ReportCollector, status: ScenarioExecutionStatus, message: Option<&str>) {
        let feature = FeatureInfo::new(langid!("en-US"), "Checkout", None);
        let scenario = ScenarioInfo::new("Pay", None).with_tags(["web"]);
        let result = TestResult::new(status, Duration::from_millis(5), message.map(str::to_owned));
        collector
            .test_case_finished(Some(&feature), &scenario, &result)
            .unwrap();
    }

    #[test]
    fn records_each_finished_scenario() {
        let collector = ReportCollector::new();
        finish(&collector, ScenarioExecutionStatus::Ok, None);
        finish(&collector, ScenarioExecutionStatus::TestError, Some("card declined"));
        let records = collector.drain();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].message(), Some("card declined"));
        assert_eq!(records[0].feature_title(), Some("Checkout"));
        assert!(collector.is_empty());
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    fn json_uses_status_labels() {
        let collector = ReportCollector::new();
        finish(&collector, ScenarioExecutionStatus::StepDefinitionPending, Some("pending"));
        let json: serde_json::Value = serde_json::from_str(&collector.to_json().unwrap()).unwrap();
        assert_eq!(json["scenarios"][0]["status"], "pending");
        assert_eq!(json["scenarios"][0]["tags"][0], "web");
        assert_eq!(json["scenarios"][0]["duration_ms"], 5);
    }
}
