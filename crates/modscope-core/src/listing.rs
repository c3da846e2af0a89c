//! The module listing and the visible subset derived from it.

use compact_str::CompactString;
use serde::Serialize;

use crate::criteria::Generation;
use crate::module::{LoadState, ModuleId, ModuleRecord};

/// Ordered sequence of observed module records, indexed by id.
///
/// Slots for ids that were never observed (or were vacated) stay empty, and
/// the listing never shrinks.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    slots: Vec<Option<ModuleRecord>>,
}

impl Listing {
    /// Create an empty listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the record for an id.
    pub fn get(&self, id: ModuleId) -> Option<&ModuleRecord> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Insert or replace a record, growing the listing as needed.
    pub fn upsert(&mut self, record: ModuleRecord) {
        let index = record.id.index();
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(record);
    }

    /// Empty the slot for an id, returning the previous record.
    pub fn vacate(&mut self, id: ModuleId) -> Option<ModuleRecord> {
        self.slots.get_mut(id.index()).and_then(Option::take)
    }

    /// Number of slots (one past the highest observed id).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no id has ever been observed.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of occupied slots.
    pub fn record_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Iterate over records in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.slots.iter().flatten()
    }
}

/// A module shown to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleEntry {
    /// Registry id.
    pub id: ModuleId,
    /// Display name, falling back to the known-module name.
    pub name: Option<CompactString>,
    /// Load state when the record was observed.
    pub load_state: LoadState,
    /// The module exports a UI component.
    pub component: bool,
}

impl VisibleEntry {
    /// Build the reader view of a record.
    pub fn from_record(record: &ModuleRecord, component: bool) -> Self {
        Self {
            id: record.id,
            name: record.resolved_name().map(CompactString::from),
            load_state: record.load_state,
            component,
        }
    }
}

/// Ids currently matching the active criteria, positioned like the listing.
#[derive(Debug, Clone, Default)]
pub struct VisibleSet {
    slots: Vec<Option<VisibleEntry>>,
}

impl VisibleSet {
    /// Create an empty visible set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Show or hide an id. Returns whether the set changed.
    pub fn set(&mut self, id: ModuleId, entry: Option<VisibleEntry>) -> bool {
        let index = id.index();
        if index >= self.slots.len() {
            if entry.is_none() {
                return false;
            }
            self.slots.resize_with(index + 1, || None);
        }

        let slot = &mut self.slots[index];
        if *slot == entry {
            return false;
        }
        *slot = entry;
        true
    }

    /// Hide an id. Returns whether it was visible.
    pub fn hide(&mut self, id: ModuleId) -> bool {
        self.set(id, None)
    }

    /// Check if an id is visible.
    pub fn contains(&self, id: ModuleId) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    /// Number of visible ids.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Check if nothing is visible.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Freeze the current contents for readers.
    pub fn snapshot(&self, generation: Generation, scan_epoch: u64, settled: bool) -> VisibleSnapshot {
        VisibleSnapshot {
            generation,
            scan_epoch,
            settled,
            entries: self.slots.iter().flatten().cloned().collect(),
        }
    }
}

/// Immutable view of the visible set handed to readers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VisibleSnapshot {
    /// Generation of the criteria the set was last classified under.
    pub generation: Generation,
    /// Scan pass counter at the time of the snapshot.
    pub scan_epoch: u64,
    /// No scan or filter pass was running.
    pub settled: bool,
    /// Visible modules in ascending id order.
    pub entries: Vec<VisibleEntry>,
}

impl VisibleSnapshot {
    /// Visible ids in ascending order.
    pub fn ids(&self) -> Vec<ModuleId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    /// Number of visible modules.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is visible.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if an id is visible.
    pub fn contains(&self, id: ModuleId) -> bool {
        self.entries
            .binary_search_by_key(&id, |entry| entry.id)
            .is_ok()
    }
}
