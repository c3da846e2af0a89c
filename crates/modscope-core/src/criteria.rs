//! Filter criteria: raw settings, validated snapshots and generations.

use std::fmt;
use std::sync::Arc;

use compact_str::CompactString;
use derive_builder::Builder;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{PatternField, ValidationError};

/// Constraint on a module's load state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
pub enum LoadedState {
    #[default]
    #[serde(rename = "ignore")]
    #[strum(serialize = "ignore")]
    Ignore,
    #[serde(rename = "not-loaded")]
    #[strum(serialize = "not-loaded")]
    RequireUnloaded,
    #[serde(rename = "is-loaded")]
    #[strum(serialize = "is-loaded")]
    RequireLoaded,
}

impl LoadedState {
    /// Required value of the "loaded" flag, `None` when ignored.
    pub fn expected(self) -> Option<bool> {
        match self {
            Self::Ignore => None,
            Self::RequireUnloaded => Some(false),
            Self::RequireLoaded => Some(true),
        }
    }

    /// Whether a module with the given loaded flag satisfies this clause.
    pub fn admits(self, loaded: bool) -> bool {
        self.expected().is_none_or(|want| want == loaded)
    }
}

/// Constraint on whether a module has a resolvable name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
pub enum NamedState {
    #[default]
    #[serde(rename = "ignore")]
    #[strum(serialize = "ignore")]
    Ignore,
    #[serde(rename = "no-name")]
    #[strum(serialize = "no-name")]
    RequireUnnamed,
    #[serde(rename = "has-name")]
    #[strum(serialize = "has-name")]
    RequireNamed,
}

impl NamedState {
    /// Required value of the "named" flag, `None` when ignored.
    pub fn expected(self) -> Option<bool> {
        match self {
            Self::Ignore => None,
            Self::RequireUnnamed => Some(false),
            Self::RequireNamed => Some(true),
        }
    }

    /// Whether a module with the given named flag satisfies this clause.
    pub fn admits(self, named: bool) -> bool {
        self.expected().is_none_or(|want| want == named)
    }
}

/// Constraint on whether a module exports a UI component.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
pub enum ComponentState {
    #[default]
    #[serde(rename = "ignore")]
    #[strum(serialize = "ignore")]
    Ignore,
    #[serde(rename = "not-component")]
    #[strum(serialize = "not-component")]
    RequireNot,
    #[serde(rename = "is-component")]
    #[strum(serialize = "is-component")]
    RequireIs,
}

impl ComponentState {
    /// Required value of the component flag, `None` when ignored.
    pub fn expected(self) -> Option<bool> {
        match self {
            Self::Ignore => None,
            Self::RequireNot => Some(false),
            Self::RequireIs => Some(true),
        }
    }

    /// Whether a module with the given component flag satisfies this clause.
    pub fn admits(self, component: bool) -> bool {
        self.expected().is_none_or(|want| want == component)
    }
}

/// Criteria as persisted by the settings layer, before validation.
///
/// Empty pattern strings mean "no pattern" and blank property names are
/// dropped when compiling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), default)]
#[serde(default)]
pub struct CriteriaSettings {
    /// Load state clause.
    #[serde(rename = "require-loaded")]
    pub loaded: LoadedState,

    /// Name presence clause.
    #[serde(rename = "require-name")]
    pub named: NamedState,

    /// Case-insensitive pattern matched against the resolved name.
    #[serde(rename = "name-search")]
    #[builder(setter(into, strip_option))]
    pub name_search: Option<String>,

    /// Case-insensitive pattern matched against the module source.
    #[serde(rename = "code-search")]
    #[builder(setter(into, strip_option))]
    pub code_search: Option<String>,

    /// Properties that must be defined on the exports.
    pub properties: Vec<String>,

    /// Fields that must be defined on the exports' prototype.
    #[serde(rename = "prototypes")]
    pub prototype_fields: Vec<String>,

    /// Component clause.
    #[serde(rename = "react-component")]
    pub component: ComponentState,
}

impl CriteriaSettings {
    /// Create a new settings builder.
    pub fn builder() -> CriteriaSettingsBuilder {
        CriteriaSettingsBuilder::default()
    }
}

/// A compiled, case-insensitive search pattern.
///
/// Equality compares the pattern text only.
#[derive(Clone)]
pub struct Pattern {
    text: CompactString,
    regex: Arc<Regex>,
}

impl Pattern {
    /// Compile a pattern for the given clause.
    pub fn new(field: PatternField, text: &str) -> Result<Self, ValidationError> {
        let regex = RegexBuilder::new(text)
            .case_insensitive(true)
            .build()
            .map_err(|source| ValidationError::InvalidPattern {
                field,
                pattern: text.to_string(),
                source,
            })?;

        Ok(Self {
            text: text.into(),
            regex: Arc::new(regex),
        })
    }

    /// The literal pattern text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Test the pattern against `haystack`.
    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }

    /// Whether both patterns share one compiled regex.
    pub fn shares_compiled(&self, other: &Pattern) -> bool {
        Arc::ptr_eq(&self.regex, &other.regex)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.text).finish()
    }
}

/// Immutable, validated predicate applied to module records.
///
/// Clauses are combined with logical AND. The default value ignores every
/// clause and so matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Constraint on the module's load state.
    pub loaded: LoadedState,
    /// Constraint on the presence of a resolved name.
    pub named: NamedState,
    /// Pattern the resolved name must match.
    pub name_pattern: Option<Pattern>,
    /// Pattern the rendered source must match.
    pub code_pattern: Option<Pattern>,
    /// Properties that must be defined on the exports.
    pub properties: Vec<CompactString>,
    /// Fields that must be defined on the exports' prototype.
    pub prototype_fields: Vec<CompactString>,
    /// Constraint on the component flag.
    pub component: ComponentState,
}

impl FilterCriteria {
    /// Validate settings into criteria.
    pub fn compile(settings: &CriteriaSettings) -> Result<Self, ValidationError> {
        Self::compile_with(settings, None)
    }

    /// Validate settings, reusing compiled patterns from `previous` when the
    /// pattern text is unchanged.
    pub fn compile_with(
        settings: &CriteriaSettings,
        previous: Option<&FilterCriteria>,
    ) -> Result<Self, ValidationError> {
        let name_pattern = compile_pattern(
            PatternField::Name,
            settings.name_search.as_deref(),
            previous.and_then(|p| p.name_pattern.as_ref()),
        )?;
        let code_pattern = compile_pattern(
            PatternField::Code,
            settings.code_search.as_deref(),
            previous.and_then(|p| p.code_pattern.as_ref()),
        )?;

        Ok(Self {
            loaded: settings.loaded,
            named: settings.named,
            name_pattern,
            code_pattern,
            properties: property_names(&settings.properties),
            prototype_fields: property_names(&settings.prototype_fields),
            component: settings.component,
        })
    }

    /// Whether every clause is vacuous.
    pub fn matches_everything(&self) -> bool {
        self.loaded == LoadedState::Ignore
            && self.named == NamedState::Ignore
            && self.component == ComponentState::Ignore
            && self.name_pattern.is_none()
            && self.code_pattern.is_none()
            && self.properties.is_empty()
            && self.prototype_fields.is_empty()
    }

    /// Convert back into persistable settings.
    pub fn to_settings(&self) -> CriteriaSettings {
        CriteriaSettings {
            loaded: self.loaded,
            named: self.named,
            name_search: self.name_pattern.as_ref().map(|p| p.as_str().to_string()),
            code_search: self.code_pattern.as_ref().map(|p| p.as_str().to_string()),
            properties: self.properties.iter().map(ToString::to_string).collect(),
            prototype_fields: self.prototype_fields.iter().map(ToString::to_string).collect(),
            component: self.component,
        }
    }
}

fn compile_pattern(
    field: PatternField,
    text: Option<&str>,
    previous: Option<&Pattern>,
) -> Result<Option<Pattern>, ValidationError> {
    let Some(text) = text.filter(|text| !text.is_empty()) else {
        return Ok(None);
    };

    if let Some(previous) = previous.filter(|p| p.as_str() == text) {
        return Ok(Some(previous.clone()));
    }

    Pattern::new(field, text).map(Some)
}

fn property_names(names: &[String]) -> Vec<CompactString> {
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(CompactString::from)
        .collect()
}

/// Monotonic version stamp of accepted criteria.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    /// Generation of the criteria an engine starts with.
    pub const INITIAL: Self = Self(0);

    /// The generation following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Criteria stamped with the generation that accepted them.
#[derive(Debug, Clone, Default)]
pub struct ActiveCriteria {
    /// Generation assigned when the criteria were accepted.
    pub generation: Generation,
    /// The accepted criteria.
    pub criteria: Arc<FilterCriteria>,
}

impl ActiveCriteria {
    /// Criteria at the initial generation.
    pub fn initial(criteria: FilterCriteria) -> Self {
        Self {
            generation: Generation::INITIAL,
            criteria: Arc::new(criteria),
        }
    }

    /// Criteria replacing these, one generation later.
    pub fn successor(&self, criteria: FilterCriteria) -> Self {
        Self {
            generation: self.generation.next(),
            criteria: Arc::new(criteria),
        }
    }
}
