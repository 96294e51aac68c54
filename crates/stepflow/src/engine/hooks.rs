//! Hook dispatch.
//!
//! Hooks applying to the running scope are deduplicated by method name (the
//! first registration wins) and run by ascending order; equal orders keep
//! catalog order. Run hooks resolve from the test-thread container, feature
//! hooks from the feature container and all others from the scenario
//! container.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use super::{StepError, TestExecutionEngine};
use crate::bindings::{
    ArgValue, Arguments, BindingResult, HookBinding, HookType, StepScope, scope_weight,
};
use crate::container::ObjectContainer;
use crate::context::ContextError;
use crate::panic::panic_message;

/// Outcome of an invocation guarded against panics.
pub(super) type Guarded = Result<BindingResult, Box<dyn std::any::Any + Send>>;

/// Turn a guarded invocation outcome into the engine's error type.
pub(super) fn settle(outcome: Guarded) -> Result<Option<ArgValue>, StepError> {
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(failure)) => Err(StepError::from_failure(failure)),
        Err(payload) => Err(StepError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Select the hooks of `hook_type` that apply and put them in run order.
pub(super) fn applicable_hooks<'a>(
    hooks: &'a [HookBinding],
    scope: &StepScope,
) -> Vec<&'a HookBinding> {
    let mut selected: Vec<&HookBinding> = Vec::new();
    for hook in hooks {
        if scope_weight(hook.scope(), scope).is_none() {
            continue;
        }
        if selected
            .iter()
            .any(|chosen| chosen.method().is_same_method(hook.method()))
        {
            log::debug!(
                target: "stepflow",
                "hook {} registered more than once for {}; running it once",
                hook.method().name(),
                hook.hook_type()
            );
            continue;
        }
        selected.push(hook);
    }
    selected.sort_by_key(|hook| hook.order());
    selected
}

impl TestExecutionEngine {
    fn hook_container(&self, hook_type: HookType) -> Result<Arc<ObjectContainer>, ContextError> {
        match hook_type {
            HookType::BeforeTestRun | HookType::AfterTestRun => {
                Ok(Arc::clone(self.contexts.thread_container()))
            }
            HookType::BeforeFeature | HookType::AfterFeature => self
                .contexts
                .feature_context()
                .map(|feature| Arc::clone(feature.container()))
                .ok_or(ContextError::NoFeature),
            _ => self
                .contexts
                .scenario_context()
                .map(|scenario| Arc::clone(scenario.container()))
                .ok_or(ContextError::NoScenario),
        }
    }

    /// Run every applicable hook of `hook_type`, stopping at the first
    /// failure.
    pub(super) async fn fire_events(&self, hook_type: HookType) -> Result<(), StepError> {
        let catalog = Arc::clone(&self.catalog);
        let hooks = applicable_hooks(catalog.hooks(hook_type), &self.contexts.step_scope());
        if hooks.is_empty() {
            return Ok(());
        }
        let container = self.hook_container(hook_type)?;
        for hook in hooks {
            log::trace!(target: "stepflow", "running {hook_type} hook {}", hook.method().name());
            let context = self.contexts.binding_context(Arc::clone(&container));
            let outcome = AssertUnwindSafe(hook.method().invoke(context, Arguments::empty()))
                .catch_unwind()
                .await;
            settle(outcome)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::{BindingMethod, BindingScope};

    fn hook(name: &str, order: i32) -> HookBinding {
        HookBinding::new(
            HookType::BeforeScenario,
            BindingMethod::new(name, |_ctx, _args| async { Ok(None) }),
        )
        .with_order(order)
    }

    fn names(hooks: &[&HookBinding]) -> Vec<String> {
        hooks.iter().map(|hook| hook.method().name().to_owned()).collect()
    }

    #[test]
    fn orders_ascending_and_keeps_ties_stable() {
        let hooks = [hook("late", 10), hook("first", 5), hook("tie", 10)];
        let ordered = applicable_hooks(&hooks, &StepScope::default());
        assert_eq!(names(&ordered), ["first", "late", "tie"]);
    }

    #[test]
    fn duplicate_methods_run_once() {
        let open_db = hook("open_db", 1);
        let again = HookBinding::new(HookType::BeforeScenario, open_db.method().clone()).with_order(0);
        let hooks = [open_db, again];
        let ordered = applicable_hooks(&hooks, &StepScope::default());
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered.first().map(|hook| hook.order()), Some(1));
    }

    #[test]
    fn distinct_methods_sharing_a_name_both_run() {
        let hooks = [hook("setup", 1), hook("setup", 0)];
        let ordered = applicable_hooks(&hooks, &StepScope::default());
        assert_eq!(ordered.len(), 2);
        assert_eq!(
            ordered.iter().map(|hook| hook.order()).collect::<Vec<_>>(),
            [0, 1]
        );
    }

    #[test]
    fn scoped_hooks_need_a_matching_tag() {
        let hooks = [hook("web_only", 1).with_scope(BindingScope::new().with_tag("web"))];
        let web = StepScope::new(None, None, vec!["web".into()]);
        assert_eq!(applicable_hooks(&hooks, &web).len(), 1);
        assert!(applicable_hooks(&hooks, &StepScope::default()).is_empty());
    }

    #[test]
    fn panics_settle_into_step_errors() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("hook exploded");
        let settled = settle(Err(payload));
        assert!(matches!(settled, Err(StepError::Panicked(message)) if message == "hook exploded"));
    }
}
