//! Module identifiers, load states and records.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::error::IntrospectionError;
use crate::known::KnownModules;
use crate::value::{introspection_target, SourceRef, ValueRef};

/// Identifier of a module within a registry.
///
/// Ids are assigned by the registry, append-only, and double as the index
/// into the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub usize);

impl ModuleId {
    /// Create a new ModuleId.
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Position of this id in the listing.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instantiation state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadState {
    /// The module factory has never run.
    #[default]
    NotLoaded,
    /// The module is in the cache but its factory has not finished.
    Loading,
    /// The module finished loading.
    Loaded,
}

impl LoadState {
    /// Whether the module has an entry in the host's module cache.
    pub fn is_instantiated(self) -> bool {
        !matches!(self, Self::NotLoaded)
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLoaded => write!(f, "Not loaded"),
            Self::Loading => write!(f, "Loading"),
            Self::Loaded => write!(f, "Loaded"),
        }
    }
}

/// The registry's current view of one module.
#[derive(Debug, Clone)]
pub struct ModuleEntry {
    /// Load state.
    pub load_state: LoadState,
    /// Module source, available regardless of load state.
    pub source: SourceRef,
    /// Exported value, present once the module is instantiated.
    pub exports: Option<ValueRef>,
}

impl ModuleEntry {
    /// Create an entry with no exports.
    pub fn new(load_state: LoadState, source: SourceRef) -> Self {
        Self {
            load_state,
            source,
            exports: None,
        }
    }

    /// Create an entry for a module that has not been loaded.
    pub fn unloaded(source: impl Into<String>) -> Self {
        let source: String = source.into();
        Self::new(LoadState::NotLoaded, Arc::new(source))
    }

    /// Create an entry for a loaded module.
    pub fn loaded(source: impl Into<String>, exports: ValueRef) -> Self {
        let source: String = source.into();
        Self::new(LoadState::Loaded, Arc::new(source)).with_exports(exports)
    }

    /// Attach an exports value.
    pub fn with_exports(mut self, exports: ValueRef) -> Self {
        self.exports = Some(exports);
        self
    }
}

/// A module as seen by the engine.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    /// Registry id.
    pub id: ModuleId,
    /// Load state at the time of observation.
    pub load_state: LoadState,
    /// The exports' own `displayName`, if any.
    pub display_name: Option<CompactString>,
    /// Name of the first known-module matcher accepting this module.
    pub known_name: Option<CompactString>,
    /// Module source.
    pub source: SourceRef,
    /// Exported value when instantiated.
    pub exports: Option<ValueRef>,
}

impl ModuleRecord {
    /// Build a record from a registry entry, resolving its names.
    ///
    /// Introspection failures while resolving names leave the name unset.
    pub fn observe(id: ModuleId, entry: ModuleEntry, known: &KnownModules) -> Self {
        let exports = entry
            .exports
            .filter(|_| entry.load_state.is_instantiated());

        let display_name = exports.as_ref().and_then(|exports| {
            match exports.property("displayName") {
                Ok(name) => name
                    .and_then(|name| name.as_str().map(CompactString::from))
                    .filter(|name| !name.is_empty()),
                Err(err) => {
                    tracing::debug!(module = %id, error = %err, "unreadable displayName");
                    None
                }
            }
        });

        let known_name = exports.as_ref().and_then(|exports| {
            match introspection_target(exports) {
                Ok(target) => known.resolve(target.as_ref()).map(CompactString::from),
                Err(err) => {
                    tracing::debug!(module = %id, error = %err, "unreadable default export");
                    None
                }
            }
        });

        Self {
            id,
            load_state: entry.load_state,
            display_name,
            known_name,
            source: entry.source,
            exports,
        }
    }

    /// Display name, falling back to the known-module name.
    pub fn resolved_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .or(self.known_name.as_deref())
    }

    /// Rendered source text.
    pub fn source_text(&self) -> Cow<'_, str> {
        self.source.render()
    }

    /// Value that property and prototype checks run against.
    ///
    /// `None` when the module is not instantiated.
    pub fn introspection_target(&self) -> Result<Option<ValueRef>, IntrospectionError> {
        self.exports.as_ref().map(introspection_target).transpose()
    }

    /// Whether the module exports a UI component.
    ///
    /// The own prototype is checked for a truthy `marker` field; when the
    /// exports carry no prototype, the `default` export's prototype is used.
    pub fn is_component(&self, marker: &str) -> Result<bool, IntrospectionError> {
        let Some(exports) = &self.exports else {
            return Ok(false);
        };

        let prototype = match truthy(exports.property("prototype")?) {
            Some(prototype) => Some(prototype),
            None => match truthy(exports.property("default")?) {
                Some(default) => truthy(default.property("prototype")?),
                None => None,
            },
        };

        match prototype {
            Some(prototype) => Ok(truthy(prototype.property(marker)?).is_some()),
            None => Ok(false),
        }
    }
}

fn truthy(value: Option<ValueRef>) -> Option<ValueRef> {
    value.filter(|value| value.is_truthy())
}
