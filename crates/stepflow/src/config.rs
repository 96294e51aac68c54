//! Runtime configuration for stepflow.
//!
//! [`RuntimeConfiguration::from_env`] reads the `STEPFLOW_*` environment
//! variables; the `with_*` methods override individual settings in process.

use std::str::FromStr;

use unic_langid::LanguageIdentifier;

const STOP_AT_FIRST_ERROR: &str = "STEPFLOW_STOP_AT_FIRST_ERROR";
const TRACE_SUCCESSFUL_STEPS: &str = "STEPFLOW_TRACE_SUCCESSFUL_STEPS";
const TRACE_TIMINGS: &str = "STEPFLOW_TRACE_TIMINGS";
const ADDITIONAL_BINDING_SOURCES: &str = "STEPFLOW_ADDITIONAL_BINDING_SOURCES";
const DELAYED_FIXTURE_TEARDOWN: &str = "STEPFLOW_DELAYED_FIXTURE_TEARDOWN";
const DISABLE_PARALLEL_EXECUTION: &str = "STEPFLOW_DISABLE_PARALLEL_EXECUTION";
const MISSING_OR_PENDING_STEPS_OUTCOME: &str = "STEPFLOW_MISSING_OR_PENDING_STEPS_OUTCOME";
const OBSOLETE_BEHAVIOR: &str = "STEPFLOW_OBSOLETE_BEHAVIOR";
const BINDING_CULTURE: &str = "STEPFLOW_BINDING_CULTURE";

fn parse_env_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "TRUE" | "True" | "yes" | "YES" | "Yes" | "on" | "ON" | "On" => Some(true),
        "0" | "false" | "FALSE" | "False" | "no" | "NO" | "No" | "off" | "OFF" | "Off" => {
            Some(false)
        }
        _ => None,
    }
}

fn lookup_bool(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<bool> {
    lookup(name).as_deref().and_then(parse_env_bool)
}

fn lookup_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let value = lookup(name)?;
    value.trim().parse().map_or_else(
        |_| {
            log::warn!(target: "stepflow", "ignoring unrecognised value {value:?} for {name}");
            None
        },
        Some,
    )
}

fn lookup_list(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Vec<String> {
    lookup(name)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Error returned when a configuration enum is parsed from an unknown value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised {setting} value: {value}")]
pub struct ConfigParseError {
    /// Setting being parsed.
    pub setting: &'static str,
    /// Rejected input.
    pub value: String,
}

/// How a scenario ending with pending or undefined steps is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingOrPendingStepsOutcome {
    /// Report the scenario as pending.
    #[default]
    Pending,
    /// Report the scenario as inconclusive.
    Inconclusive,
    /// Report the scenario as ignored.
    Ignore,
    /// Fail the scenario.
    Error,
}

impl FromStr for MissingOrPendingStepsOutcome {
    type Err = ConfigParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "inconclusive" => Ok(Self::Inconclusive),
            "ignore" => Ok(Self::Ignore),
            "error" => Ok(Self::Error),
            _ => Err(ConfigParseError {
                setting: "missing-or-pending steps outcome",
                value: value.to_owned(),
            }),
        }
    }
}

/// What happens when a step resolves to a binding marked obsolete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObsoleteBehavior {
    /// Run the step silently.
    None,
    /// Trace a warning and run the step.
    #[default]
    Warn,
    /// Treat the step as pending.
    Pending,
    /// Fail the step with a binding error.
    Error,
}

impl FromStr for ObsoleteBehavior {
    type Err = ConfigParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "warn" => Ok(Self::Warn),
            "pending" => Ok(Self::Pending),
            "error" => Ok(Self::Error),
            _ => Err(ConfigParseError {
                setting: "obsolete behaviour",
                value: value.to_owned(),
            }),
        }
    }
}

/// Settings shared by every engine a registry creates.
///
/// # Examples
///
/// ```
/// use stepflow::{MissingOrPendingStepsOutcome, RuntimeConfiguration};
///
/// let config = RuntimeConfiguration::default()
///     .with_stop_at_first_error(true)
///     .with_missing_or_pending_steps_outcome(MissingOrPendingStepsOutcome::Error);
/// assert!(config.stop_at_first_error());
/// assert!(config.trace_successful_steps());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfiguration {
    stop_at_first_error: bool,
    trace_successful_steps: bool,
    trace_timings: bool,
    additional_binding_sources: Vec<String>,
    delayed_fixture_teardown: bool,
    disable_parallel_execution: bool,
    missing_or_pending_steps_outcome: MissingOrPendingStepsOutcome,
    obsolete_behavior: ObsoleteBehavior,
    binding_culture: Option<LanguageIdentifier>,
}

impl Default for RuntimeConfiguration {
    fn default() -> Self {
        Self {
            stop_at_first_error: false,
            trace_successful_steps: true,
            trace_timings: false,
            additional_binding_sources: Vec::new(),
            delayed_fixture_teardown: false,
            disable_parallel_execution: false,
            missing_or_pending_steps_outcome: MissingOrPendingStepsOutcome::default(),
            obsolete_behavior: ObsoleteBehavior::default(),
            binding_culture: None,
        }
    }
}

impl RuntimeConfiguration {
    /// Build a configuration from the `STEPFLOW_*` environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepflow::RuntimeConfiguration;
    ///
    /// let config = RuntimeConfiguration::from_lookup(|name| {
    ///     (name == "STEPFLOW_TRACE_TIMINGS").then(|| "on".to_string())
    /// });
    /// assert!(config.trace_timings());
    /// ```
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            stop_at_first_error: lookup_bool(&lookup, STOP_AT_FIRST_ERROR)
                .unwrap_or(defaults.stop_at_first_error),
            trace_successful_steps: lookup_bool(&lookup, TRACE_SUCCESSFUL_STEPS)
                .unwrap_or(defaults.trace_successful_steps),
            trace_timings: lookup_bool(&lookup, TRACE_TIMINGS).unwrap_or(defaults.trace_timings),
            additional_binding_sources: lookup_list(&lookup, ADDITIONAL_BINDING_SOURCES),
            delayed_fixture_teardown: lookup_bool(&lookup, DELAYED_FIXTURE_TEARDOWN)
                .unwrap_or(defaults.delayed_fixture_teardown),
            disable_parallel_execution: lookup_bool(&lookup, DISABLE_PARALLEL_EXECUTION)
                .unwrap_or(defaults.disable_parallel_execution),
            missing_or_pending_steps_outcome: lookup_parsed(
                &lookup,
                MISSING_OR_PENDING_STEPS_OUTCOME,
            )
            .unwrap_or(defaults.missing_or_pending_steps_outcome),
            obsolete_behavior: lookup_parsed(&lookup, OBSOLETE_BEHAVIOR)
                .unwrap_or(defaults.obsolete_behavior),
            binding_culture: lookup_parsed(&lookup, BINDING_CULTURE),
        }
    }

    /// Abort the scenario on the first failing step.
    #[must_use]
    pub fn with_stop_at_first_error(mut self, enabled: bool) -> Self {
        self.stop_at_first_error = enabled;
        self
    }

    /// Trace every step that completes successfully.
    #[must_use]
    pub fn with_trace_successful_steps(mut self, enabled: bool) -> Self {
        self.trace_successful_steps = enabled;
        self
    }

    /// Trace feature and scenario durations.
    #[must_use]
    pub fn with_trace_timings(mut self, enabled: bool) -> Self {
        self.trace_timings = enabled;
        self
    }

    /// Binding sources loaded after the primary source.
    #[must_use]
    pub fn with_additional_binding_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_binding_sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Close an open feature automatically when the next one starts.
    #[must_use]
    pub fn with_delayed_fixture_teardown(mut self, enabled: bool) -> Self {
        self.delayed_fixture_teardown = enabled;
        self
    }

    /// Route every identity-less lookup to the fixed identity.
    #[must_use]
    pub fn with_disable_parallel_execution(mut self, disabled: bool) -> Self {
        self.disable_parallel_execution = disabled;
        self
    }

    /// Outcome for scenarios ending with pending or undefined steps.
    #[must_use]
    pub fn with_missing_or_pending_steps_outcome(
        mut self,
        outcome: MissingOrPendingStepsOutcome,
    ) -> Self {
        self.missing_or_pending_steps_outcome = outcome;
        self
    }

    /// Policy for obsolete step bindings.
    #[must_use]
    pub fn with_obsolete_behavior(mut self, behavior: ObsoleteBehavior) -> Self {
        self.obsolete_behavior = behavior;
        self
    }

    /// Culture used for argument conversion instead of the feature language.
    #[must_use]
    pub fn with_binding_culture(mut self, culture: LanguageIdentifier) -> Self {
        self.binding_culture = Some(culture);
        self
    }

    /// Whether the first failing step aborts the scenario.
    #[must_use]
    pub fn stop_at_first_error(&self) -> bool {
        self.stop_at_first_error
    }

    /// Whether successful steps are traced.
    #[must_use]
    pub fn trace_successful_steps(&self) -> bool {
        self.trace_successful_steps
    }

    /// Whether durations are traced.
    #[must_use]
    pub fn trace_timings(&self) -> bool {
        self.trace_timings
    }

    /// Names of the additional binding sources.
    #[must_use]
    pub fn additional_binding_sources(&self) -> &[String] {
        &self.additional_binding_sources
    }

    /// Whether feature teardown is deferred to the next feature start.
    #[must_use]
    pub fn delayed_fixture_teardown(&self) -> bool {
        self.delayed_fixture_teardown
    }

    /// Whether identity-less lookups share the fixed identity.
    #[must_use]
    pub fn disable_parallel_execution(&self) -> bool {
        self.disable_parallel_execution
    }

    /// Outcome for pending or undefined scenarios.
    #[must_use]
    pub fn missing_or_pending_steps_outcome(&self) -> MissingOrPendingStepsOutcome {
        self.missing_or_pending_steps_outcome
    }

    /// Obsolete binding policy.
    #[must_use]
    pub fn obsolete_behavior(&self) -> ObsoleteBehavior {
        self.obsolete_behavior
    }

    /// Culture override for argument conversion.
    #[must_use]
    pub fn binding_culture(&self) -> Option<&LanguageIdentifier> {
        self.binding_culture.as_ref()
    }
}
