//! Module registry access and the in-memory registry used by snapshots.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::module::{LoadState, ModuleEntry, ModuleId};
use crate::value::{StaticValue, ValueRef};

/// Highest module id accepted from a snapshot.
pub const MAX_SNAPSHOT_ID: usize = (1 << 20) - 1;

/// Read access to the host's module registry.
///
/// Reads are synchronous and cheap; the engine calls `get` once per id per
/// pass.
pub trait ModuleRegistry: Send + Sync {
    /// Number of id slots currently registered.
    fn size(&self) -> usize;

    /// Current view of a module, `None` if the slot is empty.
    fn get(&self, id: ModuleId) -> Option<ModuleEntry>;
}

/// Registry held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    modules: RwLock<Vec<Option<ModuleEntry>>>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module, returning its id.
    pub fn push(&self, entry: ModuleEntry) -> ModuleId {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        modules.push(Some(entry));
        ModuleId::new(modules.len() - 1)
    }

    /// Place a module at a specific id, growing the registry as needed.
    pub fn insert(&self, id: ModuleId, entry: ModuleEntry) {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        if id.index() >= modules.len() {
            modules.resize_with(id.index() + 1, || None);
        }
        modules[id.index()] = Some(entry);
    }

    /// Change a module's load state, optionally replacing its exports.
    ///
    /// Returns `false` if the id is not registered.
    pub fn set_load_state(&self, id: ModuleId, state: LoadState, exports: Option<ValueRef>) -> bool {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        let Some(Some(entry)) = modules.get_mut(id.index()) else {
            return false;
        };

        entry.load_state = state;
        if exports.is_some() {
            entry.exports = exports;
        }
        if !state.is_instantiated() {
            entry.exports = None;
        }
        true
    }

    /// Empty a slot, returning its previous entry.
    pub fn remove(&self, id: ModuleId) -> Option<ModuleEntry> {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        modules.get_mut(id.index()).and_then(Option::take)
    }

    /// Build a registry from a parsed snapshot.
    pub fn from_snapshot(snapshot: &RegistrySnapshot) -> Result<Self, RegistryError> {
        let registry = Self::new();
        {
            let mut modules = registry.modules.write().unwrap_or_else(PoisonError::into_inner);
            for fixture in &snapshot.modules {
                let index = fixture.id.index();
                if index > MAX_SNAPSHOT_ID {
                    return Err(RegistryError::IdOutOfRange {
                        id: fixture.id,
                        max: MAX_SNAPSHOT_ID,
                    });
                }
                if index >= modules.len() {
                    modules.resize_with(index + 1, || None);
                }
                if modules[index].is_some() {
                    return Err(RegistryError::DuplicateId { id: fixture.id });
                }
                modules[index] = Some(fixture.to_entry());
            }
        }
        Ok(registry)
    }
}

impl ModuleRegistry for MemoryRegistry {
    fn size(&self) -> usize {
        self.modules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn get(&self, id: ModuleId) -> Option<ModuleEntry> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id.index())
            .cloned()
            .flatten()
    }
}

/// Serialized registry contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Modules in any order; ids must be unique.
    #[serde(default)]
    pub modules: Vec<ModuleFixture>,
}

impl RegistrySnapshot {
    /// Load a snapshot from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RegistryError::io(path, e))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse a snapshot from any reader.
    pub fn from_reader(reader: impl Read) -> Result<Self, RegistryError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Find the fixture for an id.
    pub fn module(&self, id: ModuleId) -> Option<&ModuleFixture> {
        self.modules.iter().find(|fixture| fixture.id == id)
    }
}

/// One module in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleFixture {
    /// Registry id.
    pub id: ModuleId,
    /// Load state, `not-loaded` when omitted.
    #[serde(default)]
    pub state: LoadState,
    /// Module source text.
    #[serde(default)]
    pub source: String,
    /// Exported value, ignored unless the module is instantiated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exports: Option<serde_json::Value>,
}

impl ModuleFixture {
    /// Convert into a registry entry. Exports are dropped unless the module
    /// is instantiated.
    pub fn to_entry(&self) -> ModuleEntry {
        let entry = ModuleEntry::new(self.state, Arc::new(self.source.clone()));
        match &self.exports {
            Some(exports) if self.state.is_instantiated() => {
                entry.with_exports(StaticValue::from(exports.clone()).into_ref())
            }
            _ => entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let registry = MemoryRegistry::new();
        let id = registry.push(ModuleEntry::unloaded("function(){}"));
        assert_eq!(id, ModuleId(0));
        assert_eq!(registry.size(), 1);
        assert_eq!(
            registry.get(id).unwrap().source.render(),
            "function(){}"
        );
        assert!(registry.get(ModuleId(1)).is_none());
    }

    #[test]
    fn test_insert_leaves_gaps() {
        let registry = MemoryRegistry::new();
        registry.insert(ModuleId(3), ModuleEntry::unloaded(""));
        assert_eq!(registry.size(), 4);
        assert!(registry.get(ModuleId(2)).is_none());
        assert!(registry.remove(ModuleId(3)).is_some());
        assert!(registry.get(ModuleId(3)).is_none());
    }

    #[test]
    fn test_set_load_state() {
        let registry = MemoryRegistry::new();
        let id = registry.push(ModuleEntry::unloaded(""));
        let exports = StaticValue::from(serde_json::json!({ "render": 1 })).into_ref();

        assert!(registry.set_load_state(id, LoadState::Loaded, Some(exports)));
        let entry = registry.get(id).unwrap();
        assert_eq!(entry.load_state, LoadState::Loaded);
        assert!(entry.exports.is_some());

        assert!(registry.set_load_state(id, LoadState::NotLoaded, None));
        assert!(registry.get(id).unwrap().exports.is_none());
        assert!(!registry.set_load_state(ModuleId(9), LoadState::Loaded, None));
    }

    #[test]
    fn test_snapshot_rejects_duplicate_ids() {
        let json = r#"{"modules":[{"id":1},{"id":1}]}"#;
        let snapshot = RegistrySnapshot::from_reader(json.as_bytes()).unwrap();
        assert!(matches!(
            MemoryRegistry::from_snapshot(&snapshot),
            Err(RegistryError::DuplicateId { id: ModuleId(1) })
        ));
    }

    #[test]
    fn test_snapshot_rejects_huge_ids() {
        let json = r#"{"modules":[{"id":0},{"id":18446744073709551615}]}"#;
        let snapshot = RegistrySnapshot::from_reader(json.as_bytes()).unwrap();
        assert!(matches!(
            MemoryRegistry::from_snapshot(&snapshot),
            Err(RegistryError::IdOutOfRange { max: MAX_SNAPSHOT_ID, .. })
        ));

        let last = format!(r#"{{"modules":[{{"id":{MAX_SNAPSHOT_ID}}}]}}"#);
        let snapshot = RegistrySnapshot::from_reader(last.as_bytes()).unwrap();
        let registry = MemoryRegistry::from_snapshot(&snapshot).unwrap();
        assert_eq!(registry.size(), MAX_SNAPSHOT_ID + 1);
    }

    #[test]
    fn test_fixture_drops_exports_when_not_loaded() {
        let json = r#"{"modules":[{"id":0,"exports":{"a":1}},{"id":1,"state":"loading","exports":{"a":1}}]}"#;
        let snapshot = RegistrySnapshot::from_reader(json.as_bytes()).unwrap();
        let registry = MemoryRegistry::from_snapshot(&snapshot).unwrap();

        assert!(registry.get(ModuleId(0)).unwrap().exports.is_none());
        assert!(registry.get(ModuleId(1)).unwrap().exports.is_some());
    }
}
