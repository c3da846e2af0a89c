//! Opaque host values and module source text.
//!
//! Module exports are owned by the host. The engine only ever asks two
//! questions of them: "is this property defined?" and "is this value
//! truthy?". Both are expressed by [`HostValue`], so any host object model
//! can be plugged in. [`StaticValue`] is an in-memory implementation used by
//! snapshots and tests.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use compact_str::CompactString;
use indexmap::IndexMap;

use crate::error::IntrospectionError;

/// Shared reference to a host value.
pub type ValueRef = Arc<dyn HostValue>;

/// Shared reference to a module's source text.
pub type SourceRef = Arc<dyn ModuleSource>;

/// A structured value exposed by the host (module exports, prototypes, ...).
pub trait HostValue: fmt::Debug + Send + Sync {
    /// Look up a property.
    ///
    /// Returns `Ok(None)` when the property is undefined. Hosts whose
    /// property reads can fail (throwing getters, revoked proxies) report
    /// that as an [`IntrospectionError`].
    fn property(&self, name: &str) -> Result<Option<ValueRef>, IntrospectionError>;

    /// Whether the host considers this value truthy.
    fn is_truthy(&self) -> bool;

    /// The value as a string, if it is one.
    fn as_str(&self) -> Option<&str> {
        None
    }
}

/// Source text of a module, rendered on demand.
pub trait ModuleSource: fmt::Debug + Send + Sync {
    /// Render the source as a string.
    fn render(&self) -> Cow<'_, str>;
}

impl ModuleSource for String {
    fn render(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl ModuleSource for CompactString {
    fn render(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

/// Source text produced by a closure each time it is rendered.
pub struct LazySource<F>(pub F);

impl<F> LazySource<F>
where
    F: Fn() -> String + Send + Sync + 'static,
{
    /// Wrap a render closure into a shareable source reference.
    pub fn shared(render: F) -> SourceRef {
        Arc::new(Self(render))
    }
}

impl<F> fmt::Debug for LazySource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazySource(..)")
    }
}

impl<F> ModuleSource for LazySource<F>
where
    F: Fn() -> String + Send + Sync,
{
    fn render(&self) -> Cow<'_, str> {
        Cow::Owned((self.0)())
    }
}

/// Resolve the value that property checks run against.
///
/// A truthy `default` export takes precedence over the exports object.
pub fn introspection_target(exports: &ValueRef) -> Result<ValueRef, IntrospectionError> {
    match exports.property("default")? {
        Some(default) if default.is_truthy() => Ok(default),
        _ => Ok(Arc::clone(exports)),
    }
}

/// Check that every named property is defined on `value`.
pub fn has_properties<S: AsRef<str>>(
    value: &dyn HostValue,
    names: &[S],
) -> Result<bool, IntrospectionError> {
    for name in names {
        if value.property(name.as_ref())?.is_none() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Check that every named field is defined on the prototype of `value`.
///
/// A value without a truthy `prototype` never matches.
pub fn has_prototype_fields<S: AsRef<str>>(
    value: &dyn HostValue,
    names: &[S],
) -> Result<bool, IntrospectionError> {
    match value.property("prototype")? {
        Some(prototype) if prototype.is_truthy() => has_properties(prototype.as_ref(), names),
        _ => Ok(false),
    }
}

/// In-memory host value.
#[derive(Debug, Clone, Default)]
pub enum StaticValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(CompactString),
    List(Vec<ValueRef>),
    Object(IndexMap<CompactString, ValueRef>),
}

impl StaticValue {
    /// Build an object from key/value pairs.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<CompactString>,
        I: IntoIterator<Item = (K, StaticValue)>,
    {
        Self::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into_ref()))
                .collect(),
        )
    }

    /// Build a string value.
    pub fn string(value: impl Into<CompactString>) -> Self {
        Self::String(value.into())
    }

    /// Move this value behind a shared reference.
    pub fn into_ref(self) -> ValueRef {
        Arc::new(self)
    }
}

impl HostValue for StaticValue {
    fn property(&self, name: &str) -> Result<Option<ValueRef>, IntrospectionError> {
        Ok(match self {
            Self::Object(fields) => fields.get(name).cloned(),
            Self::List(items) => name
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index).cloned()),
            _ => None,
        })
    }

    fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(value) => *value,
            Self::Number(value) => *value != 0.0 && !value.is_nan(),
            Self::String(value) => !value.is_empty(),
            Self::List(_) | Self::Object(_) => true,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for StaticValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(value) => Self::Bool(value),
            Value::Number(value) => Self::Number(value.as_f64().unwrap_or(f64::NAN)),
            Value::String(value) => Self::String(value.into()),
            Value::Array(items) => Self::List(
                items
                    .into_iter()
                    .map(|item| StaticValue::from(item).into_ref())
                    .collect(),
            ),
            Value::Object(fields) => Self::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key.into(), StaticValue::from(value).into_ref()))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!StaticValue::Null.is_truthy());
        assert!(!StaticValue::Bool(false).is_truthy());
        assert!(!StaticValue::Number(0.0).is_truthy());
        assert!(!StaticValue::Number(f64::NAN).is_truthy());
        assert!(!StaticValue::string("").is_truthy());
        assert!(StaticValue::string("x").is_truthy());
        assert!(StaticValue::Object(IndexMap::new()).is_truthy());
    }

    #[test]
    fn test_default_export_takes_precedence() {
        let exports = StaticValue::from(json!({
            "default": { "render": 1 },
            "other": true
        }))
        .into_ref();

        let target = introspection_target(&exports).unwrap();
        assert!(has_properties(target.as_ref(), &["render"]).unwrap());
        assert!(!has_properties(target.as_ref(), &["other"]).unwrap());
    }

    #[test]
    fn test_falsy_default_is_ignored() {
        let exports = StaticValue::from(json!({ "default": null, "render": 1 })).into_ref();
        let target = introspection_target(&exports).unwrap();
        assert!(has_properties(target.as_ref(), &["render"]).unwrap());
    }

    #[test]
    fn test_null_property_counts_as_defined() {
        let value = StaticValue::from(json!({ "render": null }));
        assert!(has_properties(&value, &["render"]).unwrap());
        assert!(!has_properties(&value, &["render", "mount"]).unwrap());
    }

    #[test]
    fn test_prototype_fields() {
        let value = StaticValue::from(json!({
            "prototype": { "render": {}, "setState": {} }
        }));
        assert!(has_prototype_fields(&value, &["render", "setState"]).unwrap());
        assert!(!has_prototype_fields(&value, &["forceUpdate"]).unwrap());

        let bare = StaticValue::from(json!({ "render": {} }));
        assert!(!has_prototype_fields(&bare, &["render"]).unwrap());
    }

    #[test]
    fn test_lazy_source_renders_on_demand() {
        let source = LazySource::shared(|| "function(e,t,n){}".to_string());
        assert_eq!(source.render(), "function(e,t,n){}");
    }
}
