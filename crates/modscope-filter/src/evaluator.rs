//! Pure predicate evaluation of module records against filter criteria.

use compact_str::CompactString;

use modscope_core::{
    has_properties, has_prototype_fields, EngineConfig, FilterCriteria, ModuleRecord,
    DEFAULT_COMPONENT_MARKER,
};

use crate::error::{Clause, EvaluationError};

/// Outcome of evaluating every clause against a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Rejected,
    /// `component` is set when the component clause had to compute it.
    Accepted { component: Option<bool> },
}

/// Decides whether a record satisfies a set of criteria.
///
/// Evaluation is deterministic for a fixed record and criteria, and
/// short-circuits on the first failing clause in this order: named, loaded,
/// component, name pattern, code pattern, properties, prototype fields.
#[derive(Debug, Clone)]
pub struct PredicateEvaluator {
    component_marker: CompactString,
}

impl Default for PredicateEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_COMPONENT_MARKER)
    }
}

impl PredicateEvaluator {
    /// Create an evaluator using the given component marker field.
    pub fn new(component_marker: impl Into<CompactString>) -> Self {
        Self {
            component_marker: component_marker.into(),
        }
    }

    /// Create an evaluator from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.component_marker.as_str())
    }

    /// Prototype field that marks a component.
    pub fn component_marker(&self) -> &str {
        &self.component_marker
    }

    /// Evaluate a record, folding introspection failures into `false`.
    pub fn matches(&self, record: &ModuleRecord, criteria: &FilterCriteria) -> bool {
        self.try_matches(record, criteria).unwrap_or(false)
    }

    /// Evaluate a record, surfacing introspection failures.
    pub fn try_matches(
        &self,
        record: &ModuleRecord,
        criteria: &FilterCriteria,
    ) -> Result<bool, EvaluationError> {
        self.verdict(record, criteria)
            .map(|verdict| matches!(verdict, Verdict::Accepted { .. }))
    }

    pub(crate) fn verdict(
        &self,
        record: &ModuleRecord,
        criteria: &FilterCriteria,
    ) -> Result<Verdict, EvaluationError> {
        let name = record.resolved_name();

        if !criteria.named.admits(name.is_some()) {
            return Ok(Verdict::Rejected);
        }

        if !criteria.loaded.admits(record.load_state.is_instantiated()) {
            return Ok(Verdict::Rejected);
        }

        let mut component = None;
        if criteria.component.expected().is_some() {
            let flag = self.is_component(record)?;
            if !criteria.component.admits(flag) {
                return Ok(Verdict::Rejected);
            }
            component = Some(flag);
        }

        if let Some(pattern) = &criteria.name_pattern {
            match name {
                Some(name) if pattern.is_match(name) => {}
                _ => return Ok(Verdict::Rejected),
            }
        }

        if let Some(pattern) = &criteria.code_pattern
            && !pattern.is_match(&record.source_text())
        {
            return Ok(Verdict::Rejected);
        }

        if !criteria.properties.is_empty() {
            let fail = |source| EvaluationError::new(record.id, Clause::Properties, source);
            let Some(target) = record.introspection_target().map_err(fail)? else {
                return Ok(Verdict::Rejected);
            };
            if !has_properties(target.as_ref(), &criteria.properties).map_err(fail)? {
                return Ok(Verdict::Rejected);
            }
        }

        if !criteria.prototype_fields.is_empty() {
            let fail = |source| EvaluationError::new(record.id, Clause::PrototypeFields, source);
            let Some(target) = record.introspection_target().map_err(fail)? else {
                return Ok(Verdict::Rejected);
            };
            if !has_prototype_fields(target.as_ref(), &criteria.prototype_fields).map_err(fail)? {
                return Ok(Verdict::Rejected);
            }
        }

        Ok(Verdict::Accepted { component })
    }

    /// Whether the record exports a component. Unloaded modules never do.
    pub fn is_component(&self, record: &ModuleRecord) -> Result<bool, EvaluationError> {
        record
            .is_component(&self.component_marker)
            .map_err(|source| EvaluationError::new(record.id, Clause::Component, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modscope_core::{
        ComponentState, CriteriaSettings, HostValue, IntrospectionError, KnownModules, LazySource,
        LoadState, LoadedState, ModuleEntry, ModuleId, NamedState, StaticValue, ValueRef,
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn loaded(id: usize, source: &str, exports: serde_json::Value) -> ModuleRecord {
        ModuleRecord::observe(
            ModuleId(id),
            ModuleEntry::loaded(source, StaticValue::from(exports).into_ref()),
            &KnownModules::new(),
        )
    }

    fn unloaded(id: usize, source: &str) -> ModuleRecord {
        ModuleRecord::observe(ModuleId(id), ModuleEntry::unloaded(source), &KnownModules::new())
    }

    fn criteria(settings: CriteriaSettings) -> FilterCriteria {
        FilterCriteria::compile(&settings).unwrap()
    }

    #[test]
    fn test_vacuous_criteria_match_everything() {
        let evaluator = PredicateEvaluator::default();
        let all = FilterCriteria::default();
        assert!(evaluator.matches(&unloaded(0, ""), &all));
        assert!(evaluator.matches(&loaded(1, "", json!({})), &all));
    }

    #[test]
    fn test_name_pattern_requires_a_name() {
        let evaluator = PredicateEvaluator::default();
        let c = criteria(CriteriaSettings {
            name_search: Some("foo".into()),
            ..Default::default()
        });
        assert!(evaluator.matches(&loaded(0, "", json!({ "displayName": "FooBar" })), &c));
        assert!(!evaluator.matches(&loaded(1, "", json!({})), &c));
    }

    #[test]
    fn test_loaded_clause() {
        let evaluator = PredicateEvaluator::default();
        let c = criteria(CriteriaSettings {
            loaded: LoadedState::RequireUnloaded,
            ..Default::default()
        });
        assert!(evaluator.matches(&unloaded(0, ""), &c));
        assert!(!evaluator.matches(&loaded(1, "", json!({})), &c));
    }

    #[test]
    fn test_component_clause() {
        let evaluator = PredicateEvaluator::default();
        let component = loaded(0, "", json!({ "prototype": { "isReactComponent": {} } }));
        let plain = loaded(1, "", json!({ "prototype": { "render": {} } }));

        let is = criteria(CriteriaSettings {
            component: ComponentState::RequireIs,
            ..Default::default()
        });
        let not = criteria(CriteriaSettings {
            component: ComponentState::RequireNot,
            ..Default::default()
        });

        assert!(evaluator.matches(&component, &is));
        assert!(!evaluator.matches(&plain, &is));
        assert!(evaluator.matches(&plain, &not));
        assert!(evaluator.matches(&unloaded(2, ""), &not));
    }

    #[test]
    fn test_custom_component_marker() {
        let evaluator = PredicateEvaluator::new("isComponent");
        let record = loaded(0, "", json!({ "prototype": { "isComponent": true } }));
        assert!(evaluator.is_component(&record).unwrap());
        assert!(!PredicateEvaluator::default().is_component(&record).unwrap());
    }

    #[test]
    fn test_prototype_fields_on_default_export() {
        let evaluator = PredicateEvaluator::default();
        let c = criteria(CriteriaSettings {
            prototype_fields: vec!["render".into()],
            ..Default::default()
        });
        let record = loaded(0, "", json!({ "default": { "prototype": { "render": {} } } }));
        assert!(evaluator.matches(&record, &c));
        assert!(!evaluator.matches(&unloaded(1, ""), &c));
    }

    /// Exports counting every property read.
    #[derive(Debug)]
    struct Counted(Arc<AtomicUsize>);

    impl HostValue for Counted {
        fn property(&self, _name: &str) -> Result<Option<ValueRef>, IntrospectionError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        fn is_truthy(&self) -> bool {
            true
        }
    }

    fn counted_record(load_state: LoadState) -> (ModuleRecord, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let renders = Arc::new(AtomicUsize::new(0));
        let reads = Arc::new(AtomicUsize::new(0));
        let source = LazySource::shared({
            let renders = Arc::clone(&renders);
            move || {
                renders.fetch_add(1, Ordering::SeqCst);
                "useState".to_string()
            }
        });
        let record = ModuleRecord {
            id: ModuleId(0),
            load_state,
            display_name: None,
            known_name: None,
            source,
            exports: Some(Arc::new(Counted(Arc::clone(&reads)))),
        };
        (record, renders, reads)
    }

    #[test]
    fn test_name_and_load_clauses_short_circuit() {
        let evaluator = PredicateEvaluator::default();
        let expensive = CriteriaSettings {
            component: ComponentState::RequireIs,
            code_search: Some("useState".into()),
            properties: vec!["render".into()],
            prototype_fields: vec!["render".into()],
            ..Default::default()
        };

        let (record, renders, reads) = counted_record(LoadState::Loaded);
        let c = criteria(CriteriaSettings {
            named: NamedState::RequireNamed,
            ..expensive.clone()
        });
        assert!(!evaluator.matches(&record, &c));
        assert_eq!(renders.load(Ordering::SeqCst), 0);
        assert_eq!(reads.load(Ordering::SeqCst), 0);

        let (record, renders, reads) = counted_record(LoadState::Loaded);
        let c = criteria(CriteriaSettings {
            loaded: LoadedState::RequireUnloaded,
            ..expensive
        });
        assert!(!evaluator.matches(&record, &c));
        assert_eq!(renders.load(Ordering::SeqCst), 0);
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_code_pattern_checked_before_exports() {
        let evaluator = PredicateEvaluator::default();
        let (record, renders, reads) = counted_record(LoadState::Loaded);
        let c = criteria(CriteriaSettings {
            code_search: Some("useEffect".into()),
            properties: vec!["render".into()],
            ..Default::default()
        });

        assert!(!evaluator.matches(&record, &c));
        assert_eq!(renders.load(Ordering::SeqCst), 1);
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_verdict_carries_component_only_when_checked() {
        let evaluator = PredicateEvaluator::default();
        let record = loaded(0, "", json!({ "prototype": { "isReactComponent": true } }));

        let vacuous = evaluator.verdict(&record, &FilterCriteria::default()).unwrap();
        assert_eq!(vacuous, Verdict::Accepted { component: None });

        let is = criteria(CriteriaSettings {
            component: ComponentState::RequireIs,
            ..Default::default()
        });
        let checked = evaluator.verdict(&record, &is).unwrap();
        assert_eq!(checked, Verdict::Accepted { component: Some(true) });
    }
}
