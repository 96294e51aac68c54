//! Binding scopes restricting where a binding applies.

/// Where a step is running: feature and scenario titles plus their tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepScope {
    feature_title: Option<String>,
    scenario_title: Option<String>,
    tags: Vec<String>,
}

impl StepScope {
    /// Build a scope from the running feature and scenario.
    #[must_use]
    pub fn new(
        feature_title: Option<String>,
        scenario_title: Option<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            feature_title,
            scenario_title,
            tags,
        }
    }

    /// Title of the running feature.
    #[must_use]
    pub fn feature_title(&self) -> Option<&str> {
        self.feature_title.as_deref()
    }

    /// Title of the running scenario.
    #[must_use]
    pub fn scenario_title(&self) -> Option<&str> {
        self.scenario_title.as_deref()
    }

    /// Feature and scenario tags, without `@`.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag.strip_prefix('@').unwrap_or(tag);
        self.tags.iter().any(|candidate| candidate.eq_ignore_ascii_case(wanted))
    }
}

/// Restriction of a binding to a tag, a feature or a scenario.
///
/// Every condition that is set must hold. The number of conditions set is the
/// scope's weight when several bindings match the same step.
///
/// # Examples
///
/// ```
/// use stepflow::{BindingScope, StepScope};
///
/// let scope = BindingScope::new().with_tag("@web").with_feature_title("Checkout");
/// let running = StepScope::new(Some("Checkout".into()), None, vec!["web".into()]);
/// assert_eq!(scope.matches(&running), Some(2));
/// assert_eq!(scope.matches(&StepScope::default()), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "diagnostics", derive(serde::Serialize))]
pub struct BindingScope {
    tag: Option<String>,
    feature_title: Option<String>,
    scenario_title: Option<String>,
}

impl BindingScope {
    /// A scope with no conditions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a tag on the feature or scenario.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag: String = tag.into();
        self.tag = Some(tag.strip_prefix('@').map(str::to_owned).unwrap_or(tag));
        self
    }

    /// Require a feature title.
    #[must_use]
    pub fn with_feature_title(mut self, title: impl Into<String>) -> Self {
        self.feature_title = Some(title.into());
        self
    }

    /// Require a scenario title.
    #[must_use]
    pub fn with_scenario_title(mut self, title: impl Into<String>) -> Self {
        self.scenario_title = Some(title.into());
        self
    }

    /// Required tag, without `@`.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Required feature title.
    #[must_use]
    pub fn feature_title(&self) -> Option<&str> {
        self.feature_title.as_deref()
    }

    /// Required scenario title.
    #[must_use]
    pub fn scenario_title(&self) -> Option<&str> {
        self.scenario_title.as_deref()
    }

    /// Number of satisfied conditions, or `None` when any condition fails.
    #[must_use]
    pub fn matches(&self, scope: &StepScope) -> Option<u32> {
        let mut matched = 0;
        if let Some(tag) = &self.tag {
            if !scope.has_tag(tag) {
                return None;
            }
            matched += 1;
        }
        if let Some(title) = &self.feature_title {
            if scope.feature_title() != Some(title.as_str()) {
                return None;
            }
            matched += 1;
        }
        if let Some(title) = &self.scenario_title {
            if scope.scenario_title() != Some(title.as_str()) {
                return None;
            }
            matched += 1;
        }
        Some(matched)
    }
}

/// Scope-match weight of an optionally scoped binding.
///
/// Unscoped bindings always match with weight zero.
pub(crate) fn scope_weight(scope: Option<&BindingScope>, running: &StepScope) -> Option<u32> {
    scope.map_or(Some(0), |scope| scope.matches(running))
}
