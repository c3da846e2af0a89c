//! Known-module matchers used to name otherwise anonymous modules.

use std::fmt;
use std::sync::Arc;

use compact_str::CompactString;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::{has_properties, has_prototype_fields, HostValue};

/// Predicate deciding whether a module's exports are a particular known module.
pub type ModuleMatcher = Arc<dyn Fn(&dyn HostValue) -> bool + Send + Sync>;

/// Ordered set of named matchers. The first matcher to accept a module names it.
#[derive(Clone, Default)]
pub struct KnownModules {
    matchers: IndexMap<CompactString, ModuleMatcher>,
}

impl KnownModules {
    /// Create an empty matcher set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a matcher set from declarative specs, preserving their order.
    pub fn from_specs<I>(specs: I) -> Self
    where
        I: IntoIterator<Item = MatcherSpec>,
    {
        let mut known = Self::new();
        for spec in specs {
            let matcher = spec.matcher();
            known.matchers.insert(spec.name.into(), matcher);
        }
        known
    }

    /// Register a matcher. Re-registering a name replaces the matcher in place.
    pub fn insert<F>(&mut self, name: impl Into<CompactString>, matcher: F) -> &mut Self
    where
        F: Fn(&dyn HostValue) -> bool + Send + Sync + 'static,
    {
        self.matchers.insert(name.into(), Arc::new(matcher));
        self
    }

    /// Name of the first matcher accepting `target`.
    pub fn resolve(&self, target: &dyn HostValue) -> Option<&str> {
        self.matchers
            .iter()
            .find(|(_, matcher)| matcher(target))
            .map(|(name, _)| name.as_str())
    }

    /// Registered names in match order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.matchers.keys().map(CompactString::as_str)
    }

    /// Number of registered matchers.
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// Check if no matchers are registered.
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Matcher accepting values that define every listed property.
    pub fn by_properties(properties: Vec<String>) -> ModuleMatcher {
        Arc::new(move |value: &dyn HostValue| has_properties(value, &properties).unwrap_or(false))
    }

    /// Matcher accepting values whose prototype defines every listed field.
    pub fn by_prototype_fields(fields: Vec<String>) -> ModuleMatcher {
        Arc::new(move |value: &dyn HostValue| has_prototype_fields(value, &fields).unwrap_or(false))
    }

    /// Matcher accepting values whose `displayName` equals `name`.
    pub fn by_display_name(name: String) -> ModuleMatcher {
        Arc::new(move |value: &dyn HostValue| {
            matches!(
                value.property("displayName"),
                Ok(Some(display)) if display.as_str() == Some(name.as_str())
            )
        })
    }
}

impl fmt::Debug for KnownModules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.matchers.keys()).finish()
    }
}

/// Declarative description of a known module, as stored in configuration.
///
/// Every condition that is set must hold. A spec with no conditions never
/// matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MatcherSpec {
    /// Name assigned to matching modules.
    pub name: String,
    /// Properties that must be defined.
    #[serde(default)]
    pub properties: Vec<String>,
    /// Prototype fields that must be defined.
    #[serde(default)]
    pub prototype_fields: Vec<String>,
    /// Exact `displayName` to match.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl MatcherSpec {
    /// Compile this spec into a matcher.
    pub fn matcher(&self) -> ModuleMatcher {
        let mut checks: Vec<ModuleMatcher> = Vec::new();
        if !self.properties.is_empty() {
            checks.push(KnownModules::by_properties(self.properties.clone()));
        }
        if !self.prototype_fields.is_empty() {
            checks.push(KnownModules::by_prototype_fields(self.prototype_fields.clone()));
        }
        if let Some(name) = &self.display_name {
            checks.push(KnownModules::by_display_name(name.clone()));
        }

        Arc::new(move |value: &dyn HostValue| {
            !checks.is_empty() && checks.iter().all(|check| check(value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::StaticValue;
    use serde_json::json;

    #[test]
    fn test_first_match_wins() {
        let mut known = KnownModules::new();
        known
            .insert("React", |v| has_properties(v, &["createElement"]).unwrap_or(false))
            .insert("ReactDOM", |v| has_properties(v, &["render"]).unwrap_or(false))
            .insert("Anything", |_| true);

        let react = StaticValue::from(json!({ "createElement": {}, "render": {} }));
        assert_eq!(known.resolve(&react), Some("React"));

        let dom = StaticValue::from(json!({ "render": {} }));
        assert_eq!(known.resolve(&dom), Some("ReactDOM"));

        assert_eq!(known.names().collect::<Vec<_>>(), ["React", "ReactDOM", "Anything"]);
    }

    #[test]
    fn test_spec_conditions_are_conjunctive() {
        let spec = MatcherSpec {
            name: "hljs".into(),
            properties: vec!["highlight".into(), "highlightBlock".into()],
            ..Default::default()
        };
        let matcher = spec.matcher();

        assert!(matcher(&StaticValue::from(json!({ "highlight": 1, "highlightBlock": 1 }))));
        assert!(!matcher(&StaticValue::from(json!({ "highlight": 1 }))));
    }

    #[test]
    fn test_empty_spec_never_matches() {
        let spec = MatcherSpec {
            name: "nothing".into(),
            ..Default::default()
        };
        assert!(!(spec.matcher())(&StaticValue::from(json!({}))));
    }

    #[test]
    fn test_display_name_matcher() {
        let matcher = KnownModules::by_display_name("Button".into());
        assert!(matcher(&StaticValue::from(json!({ "displayName": "Button" }))));
        assert!(!matcher(&StaticValue::from(json!({ "displayName": "Link" }))));
    }
}
