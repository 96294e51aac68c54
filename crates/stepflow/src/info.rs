//! Descriptions of features, scenarios and steps.

use unic_langid::LanguageIdentifier;

use crate::keyword::StepDefinitionType;
use crate::table::Table;

/// Description of a feature, fixed for the lifetime of its context.
///
/// # Examples
///
/// ```
/// use stepflow::FeatureInfo;
/// use unic_langid::langid;
///
/// let info = FeatureInfo::new(langid!("de-DE"), "Checkout", None)
///     .with_tags(["web", "slow"]);
/// assert_eq!(info.title(), "Checkout");
/// assert!(info.has_tag("web"));
/// assert_eq!(info.language().language.as_str(), "de");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureInfo {
    language: LanguageIdentifier,
    title: String,
    description: Option<String>,
    tags: Vec<String>,
    target_language: String,
}

impl FeatureInfo {
    /// Describe a feature written in `language`.
    #[must_use]
    pub fn new(
        language: LanguageIdentifier,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            language,
            title: title.into(),
            description,
            tags: Vec::new(),
            target_language: String::from("rust"),
        }
    }

    /// Attach tags, given with or without the leading `@`.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = normalise_tags(tags);
        self
    }

    /// Set the language snippets for missing steps are generated for.
    #[must_use]
    pub fn with_target_language(mut self, target_language: impl Into<String>) -> Self {
        self.target_language = target_language.into();
        self
    }

    /// Language the feature text is written in.
    #[must_use]
    pub fn language(&self) -> &LanguageIdentifier {
        &self.language
    }

    /// Feature title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Free-form description below the title.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Tags without the leading `@`.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Whether the feature carries `tag` (compared without `@`).
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        has_tag(&self.tags, tag)
    }

    /// Language snippets for missing steps are generated for.
    #[must_use]
    pub fn target_language(&self) -> &str {
        &self.target_language
    }
}

/// Description of a single scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioInfo {
    title: String,
    description: Option<String>,
    tags: Vec<String>,
}

impl ScenarioInfo {
    /// Describe a scenario.
    #[must_use]
    pub fn new(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: title.into(),
            description,
            tags: Vec::new(),
        }
    }

    /// Attach tags, given with or without the leading `@`.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = normalise_tags(tags);
        self
    }

    /// Scenario title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Free-form description below the title.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Tags without the leading `@`.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Whether the scenario carries `tag` (compared without `@`).
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        has_tag(&self.tags, tag)
    }
}

/// Summary of the binding a step resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepMatchSummary {
    /// Name of the matched binding method.
    pub method: String,
    /// Rendered call, as used in pending messages.
    pub match_text: String,
    /// Number of scope conditions the binding satisfied.
    pub scope_matches: u32,
}

/// Description of the step currently executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInfo {
    step_type: StepDefinitionType,
    text: String,
    multiline_text: Option<String>,
    table: Option<Table>,
    binding_match: Option<StepMatchSummary>,
}

impl StepInfo {
    /// Describe a step before it has been matched.
    #[must_use]
    pub fn new(
        step_type: StepDefinitionType,
        text: impl Into<String>,
        multiline_text: Option<String>,
        table: Option<Table>,
    ) -> Self {
        Self {
            step_type,
            text: text.into(),
            multiline_text,
            table,
            binding_match: None,
        }
    }

    /// Resolved step type.
    #[must_use]
    pub fn step_type(&self) -> StepDefinitionType {
        self.step_type
    }

    /// Step text without the keyword.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Multiline text argument.
    #[must_use]
    pub fn multiline_text(&self) -> Option<&str> {
        self.multiline_text.as_deref()
    }

    /// Table argument.
    #[must_use]
    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    /// The matched binding, once matching succeeded.
    #[must_use]
    pub fn binding_match(&self) -> Option<&StepMatchSummary> {
        self.binding_match.as_ref()
    }

    pub(crate) fn set_binding_match(&mut self, summary: StepMatchSummary) {
        self.binding_match = Some(summary);
    }
}

fn normalise_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    tags.into_iter()
        .map(|tag| {
            let tag: String = tag.into();
            tag.strip_prefix('@').map(str::to_owned).unwrap_or(tag)
        })
        .collect()
}

fn has_tag(tags: &[String], tag: &str) -> bool {
    let wanted = tag.strip_prefix('@').unwrap_or(tag);
    tags.iter().any(|candidate| candidate.eq_ignore_ascii_case(wanted))
}
