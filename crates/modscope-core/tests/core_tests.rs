use modscope_core::{
    CriteriaSettings, EngineConfig, FilterCriteria, KnownModules, LoadState, MatcherSpec,
    MemoryRegistry, ModuleEntry, ModuleId, ModuleRecord, ModuleRegistry, RegistryError,
    RegistrySnapshot, StaticValue,
};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

const SNAPSHOT: &str = r#"{
  "modules": [
    { "id": 0, "state": "loaded", "source": "function(e,t,n){}", "exports": { "displayName": "Foo" } },
    { "id": 1, "state": "not-loaded", "source": "function(e,t,n){ useState(0) }" },
    { "id": 3, "state": "loaded", "source": "", "exports": { "default": { "createElement": {} } } }
  ]
}"#;

#[test]
fn test_snapshot_load_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("registry.json");
    fs::write(&path, SNAPSHOT).unwrap();

    let snapshot = RegistrySnapshot::load(&path).unwrap();
    let registry = MemoryRegistry::from_snapshot(&snapshot).unwrap();

    assert_eq!(registry.size(), 4);
    assert!(registry.get(ModuleId(2)).is_none());
    assert_eq!(registry.get(ModuleId(0)).unwrap().load_state, LoadState::Loaded);
    assert_eq!(
        snapshot.module(ModuleId(1)).unwrap().state,
        LoadState::NotLoaded
    );
}

#[test]
fn test_snapshot_load_errors() {
    let temp = TempDir::new().unwrap();

    let missing = RegistrySnapshot::load(temp.path().join("missing.json"));
    assert!(matches!(missing, Err(RegistryError::NotFound { .. })));

    let path = temp.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        RegistrySnapshot::load(&path),
        Err(RegistryError::Json(_))
    ));
}

#[test]
fn test_known_module_resolution_uses_default_export() {
    let snapshot = RegistrySnapshot::from_reader(SNAPSHOT.as_bytes()).unwrap();
    let registry = MemoryRegistry::from_snapshot(&snapshot).unwrap();
    let known = KnownModules::from_specs([MatcherSpec {
        name: "React".into(),
        properties: vec!["createElement".into()],
        ..Default::default()
    }]);

    let record = ModuleRecord::observe(ModuleId(3), registry.get(ModuleId(3)).unwrap(), &known);
    assert_eq!(record.display_name, None);
    assert_eq!(record.resolved_name(), Some("React"));

    let named = ModuleRecord::observe(ModuleId(0), registry.get(ModuleId(0)).unwrap(), &known);
    assert_eq!(named.resolved_name(), Some("Foo"));
}

#[test]
fn test_known_modules_skip_unloaded() {
    let known = KnownModules::from_specs([MatcherSpec {
        name: "Anything".into(),
        properties: vec!["a".into()],
        ..Default::default()
    }]);
    let exports = StaticValue::from(json!({ "a": 1 })).into_ref();
    let entry = ModuleEntry::unloaded("").with_exports(exports);

    let record = ModuleRecord::observe(ModuleId(0), entry, &known);
    assert!(record.known_name.is_none());
}

#[test]
fn test_criteria_round_trip_through_settings() {
    let settings: CriteriaSettings = serde_json::from_value(json!({
        "require-loaded": "is-loaded",
        "name-search": "^Foo",
        "code-search": "",
        "properties": ["render", " "]
    }))
    .unwrap();

    let criteria = FilterCriteria::compile(&settings).unwrap();
    assert!(!criteria.matches_everything());
    assert!(criteria.code_pattern.is_none());

    let back = criteria.to_settings();
    assert_eq!(back.name_search.as_deref(), Some("^Foo"));
    assert_eq!(back.properties, vec!["render".to_string()]);
    assert_eq!(FilterCriteria::compile(&back).unwrap(), criteria);
}

#[test]
fn test_default_criteria_match_everything() {
    let criteria = FilterCriteria::compile(&CriteriaSettings::default()).unwrap();
    assert!(criteria.matches_everything());
    assert_eq!(criteria, FilterCriteria::default());
}

#[test]
fn test_engine_config_from_json() {
    let config: EngineConfig = serde_json::from_value(json!({
        "yield-every": 100,
        "component-marker": "isComponent",
        "scan-on-start": false
    }))
    .unwrap();

    assert_eq!(config.yield_every, 100);
    assert_eq!(config.component_marker, "isComponent");
    assert!(!config.scan_on_start);
    assert_eq!(config.filter_delay_ms, 10);
}
