//! Tracing of step execution.
//!
//! The engine reports progress through a [`TestTracer`]. [`LogTracer`] writes
//! through the `log` facade with the `stepflow` target; no logger is installed
//! by the library.

use std::time::Duration;

use unic_langid::LanguageIdentifier;

use crate::diagnostics::StepFormatter;
use crate::engine::StepError;
use crate::matching::{MatchedBinding, StepInstance};

/// Sink for execution trace events.
pub trait TestTracer: Send + Sync {
    /// A step is about to run. `show_additional_arguments` includes the
    /// multiline text and table.
    fn trace_step(&self, step: &StepInstance, show_additional_arguments: bool);

    /// A non-fatal problem.
    fn trace_warning(&self, text: &str);

    /// A step finished successfully.
    fn trace_step_done(&self, match_text: &str, duration: Duration);

    /// A step was skipped because of earlier failures.
    fn trace_step_skipped(&self);

    /// A step definition reported itself as pending.
    fn trace_step_pending(&self, match_text: &str);

    /// A step could not be bound.
    fn trace_binding_error(&self, error: &StepError);

    /// A step failed.
    fn trace_error(&self, error: &StepError);

    /// No step definition matched. `candidates` lists bindings that matched
    /// the text but not the arguments.
    fn trace_no_matching_step_definition(
        &self,
        step: &StepInstance,
        target_language: &str,
        culture: &LanguageIdentifier,
        candidates: &[MatchedBinding],
    );

    /// Time spent in a feature or scenario.
    fn trace_duration(&self, duration: Duration, label: &str);
}

/// Tracer writing through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracer;

impl TestTracer for LogTracer {
    fn trace_step(&self, step: &StepInstance, show_additional_arguments: bool) {
        log::info!(
            target: "stepflow",
            "{}",
            StepFormatter::step_text(step, show_additional_arguments)
        );
    }

    fn trace_warning(&self, text: &str) {
        log::warn!(target: "stepflow", "{text}");
    }

    fn trace_step_done(&self, match_text: &str, duration: Duration) {
        log::info!(target: "stepflow", "-> done: {match_text} ({duration:?})");
    }

    fn trace_step_skipped(&self) {
        log::info!(target: "stepflow", "-> skipped because of previous errors");
    }

    fn trace_step_pending(&self, match_text: &str) {
        log::warn!(target: "stepflow", "-> pending: {match_text}");
    }

    fn trace_binding_error(&self, error: &StepError) {
        log::error!(target: "stepflow", "-> binding error: {error}");
    }

    fn trace_error(&self, error: &StepError) {
        log::error!(target: "stepflow", "-> error: {error}");
    }

    fn trace_no_matching_step_definition(
        &self,
        step: &StepInstance,
        target_language: &str,
        culture: &LanguageIdentifier,
        candidates: &[MatchedBinding],
    ) {
        if !candidates.is_empty() {
            let listed: Vec<String> = candidates
                .iter()
                .map(|candidate| {
                    format!(
                        "{} ({} parameters)",
                        candidate.binding().method().name(),
                        candidate.binding().parameters().len()
                    )
                })
                .collect();
            log::warn!(
                target: "stepflow",
                "-> no step definition accepts the arguments of this step; candidates: {}",
                listed.join(", ")
            );
        }
        log::warn!(
            target: "stepflow",
            "-> no matching step definition found ({target_language}, {culture}); create one with:\n{}",
            StepFormatter::snippet(step)
        );
    }

    fn trace_duration(&self, duration: Duration, label: &str) {
        log::info!(target: "stepflow", "-> duration of {label}: {duration:?}");
    }
}
