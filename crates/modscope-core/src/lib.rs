//! Core types and traits for modscope.
//!
//! This crate provides the fundamental data structures shared by the
//! scanning and filtering engine: module records and their host values,
//! filter criteria, the listing and visible set, and configuration.

mod config;
mod criteria;
mod error;
mod known;
mod listing;
mod module;
mod registry;
mod value;

pub use config::{EngineConfig, EngineConfigBuilder, DEFAULT_COMPONENT_MARKER};
pub use criteria::{
    ActiveCriteria, ComponentState, CriteriaSettings, CriteriaSettingsBuilder, FilterCriteria,
    Generation, LoadedState, NamedState, Pattern,
};
pub use error::{IntrospectionError, PatternField, RegistryError, ValidationError};
pub use known::{KnownModules, MatcherSpec, ModuleMatcher};
pub use listing::{Listing, VisibleEntry, VisibleSet, VisibleSnapshot};
pub use module::{LoadState, ModuleEntry, ModuleId, ModuleRecord};
pub use registry::{
    MemoryRegistry, ModuleFixture, ModuleRegistry, RegistrySnapshot, MAX_SNAPSHOT_ID,
};
pub use value::{
    has_properties, has_prototype_fields, introspection_target, HostValue, LazySource,
    ModuleSource, SourceRef, StaticValue, ValueRef,
};
