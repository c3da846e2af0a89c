//! Generation-aware maintenance of the visible set.

use modscope_core::{
    ActiveCriteria, FilterCriteria, Generation, Listing, ModuleId, ModuleRecord, VisibleEntry,
    VisibleSet, VisibleSnapshot,
};

use crate::error::EvaluationError;
use crate::evaluator::{PredicateEvaluator, Verdict};
use crate::token::GenerationToken;

/// State of the filter pass machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// No pass is running.
    Idle,
    /// Sweeping the listing under the given generation.
    Running(Generation),
    /// A newer generation exists; the pass stops before its next write.
    Cancelling(Generation),
}

/// Outcome of a single filter step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStep {
    /// A record was classified.
    Classified { id: ModuleId, visible: bool },
    /// The slot was empty and was hidden.
    Skipped(ModuleId),
    /// The pass was abandoned for a newer generation.
    Superseded(Generation),
    /// The pass swept the whole listing.
    Completed(Generation),
    /// No pass is running.
    Idle,
}

#[derive(Debug)]
struct FilterPass {
    token: GenerationToken,
    cursor: usize,
    end: usize,
}

/// Owner of the visible set.
///
/// Records are classified under the active generation, either one at a
/// time as the scanner observes them or in a full pass over the listing
/// when the criteria change.
#[derive(Debug)]
pub struct FilterCoordinator {
    evaluator: PredicateEvaluator,
    active: ActiveCriteria,
    visible: VisibleSet,
    pass: Option<FilterPass>,
    dirty: bool,
}

impl FilterCoordinator {
    /// Create a coordinator with an empty visible set.
    pub fn new(evaluator: PredicateEvaluator, active: ActiveCriteria) -> Self {
        Self {
            evaluator,
            active,
            visible: VisibleSet::new(),
            pass: None,
            dirty: false,
        }
    }

    /// Generation records are currently classified under.
    pub fn generation(&self) -> Generation {
        self.active.generation
    }

    /// Criteria records are currently classified under.
    pub fn criteria(&self) -> &FilterCriteria {
        &self.active.criteria
    }

    /// Adopt new criteria and start sweeping the listing, abandoning any
    /// running pass.
    pub fn begin(&mut self, active: ActiveCriteria, token: GenerationToken, listing: &Listing) {
        if let Some(previous) = self.pass.take() {
            tracing::debug!(
                generation = %previous.token.generation(),
                at = previous.cursor,
                "filter pass abandoned"
            );
        }

        let end = listing.len();
        tracing::info!(generation = %active.generation, items = end, "filter pass started");

        self.active = active;
        self.pass = Some(FilterPass {
            token,
            cursor: 0,
            end,
        });
    }

    /// Current pass state.
    pub fn state(&self) -> FilterState {
        match &self.pass {
            None => FilterState::Idle,
            Some(pass) if pass.token.is_superseded() => {
                FilterState::Cancelling(pass.token.generation())
            }
            Some(pass) => FilterState::Running(pass.token.generation()),
        }
    }

    /// Check if a pass is running or cancelling.
    pub fn is_running(&self) -> bool {
        self.pass.is_some()
    }

    /// `(processed, total)` of the running pass.
    pub fn pass_progress(&self) -> Option<(usize, usize)> {
        self.pass.as_ref().map(|pass| (pass.cursor, pass.end))
    }

    /// Classify one record under the active criteria, returning whether it
    /// is visible. Records whose exports refuse introspection for an active
    /// clause are hidden.
    pub fn classify(&mut self, record: &ModuleRecord) -> bool {
        let entry = match self.evaluate(record) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(error = %err, "module excluded");
                None
            }
        };

        let visible = entry.is_some();
        self.dirty |= self.visible.set(record.id, entry);
        visible
    }

    /// Hide an id whose record disappeared.
    pub fn hide(&mut self, id: ModuleId) {
        self.dirty |= self.visible.hide(id);
    }

    /// Advance the running pass by one listing slot.
    pub fn step(&mut self, listing: &Listing) -> FilterStep {
        let Some(pass) = &mut self.pass else {
            return FilterStep::Idle;
        };

        let generation = pass.token.generation();
        if pass.token.is_superseded() {
            tracing::debug!(%generation, at = pass.cursor, "filter pass superseded");
            self.pass = None;
            return FilterStep::Superseded(generation);
        }

        if pass.cursor >= pass.end {
            tracing::info!(%generation, items = pass.end, "filter pass completed");
            self.pass = None;
            return FilterStep::Completed(generation);
        }

        let id = ModuleId::new(pass.cursor);
        pass.cursor += 1;

        match listing.get(id) {
            Some(record) => FilterStep::Classified {
                id,
                visible: self.classify(record),
            },
            None => {
                self.hide(id);
                FilterStep::Skipped(id)
            }
        }
    }

    /// Whether the visible set changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// The visible set.
    pub fn visible(&self) -> &VisibleSet {
        &self.visible
    }

    /// Freeze the visible set for readers.
    pub fn snapshot(&self, scan_epoch: u64, settled: bool) -> VisibleSnapshot {
        self.visible.snapshot(self.active.generation, scan_epoch, settled)
    }

    fn evaluate(&self, record: &ModuleRecord) -> Result<Option<VisibleEntry>, EvaluationError> {
        let component = match self.evaluator.verdict(record, &self.active.criteria)? {
            Verdict::Rejected => return Ok(None),
            Verdict::Accepted { component: Some(component) } => component,
            Verdict::Accepted { component: None } => {
                self.evaluator.is_component(record).unwrap_or_else(|err| {
                    tracing::debug!(error = %err, "component flag unreadable");
                    false
                })
            }
        };
        Ok(Some(VisibleEntry::from_record(record, component)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::CriteriaPublisher;
    use modscope_core::{KnownModules, ModuleEntry, NamedState, StaticValue};
    use serde_json::json;

    fn listing(len: usize) -> Listing {
        let mut listing = Listing::new();
        for id in 0..len {
            let entry = if id % 2 == 0 {
                let exports = json!({ "displayName": format!("Module{id}") });
                ModuleEntry::loaded("", StaticValue::from(exports).into_ref())
            } else {
                ModuleEntry::unloaded("")
            };
            listing.upsert(ModuleRecord::observe(ModuleId(id), entry, &KnownModules::new()));
        }
        listing
    }

    fn named() -> FilterCriteria {
        FilterCriteria {
            named: NamedState::RequireNamed,
            ..Default::default()
        }
    }

    #[test]
    fn test_pass_runs_to_completion() {
        let publisher = CriteriaPublisher::new(FilterCriteria::default());
        let listing = listing(4);
        let mut filter = FilterCoordinator::new(PredicateEvaluator::default(), publisher.current());

        let generation = publisher.publish(named());
        filter.begin(publisher.current(), publisher.token(generation), &listing);
        assert_eq!(filter.state(), FilterState::Running(generation));
        assert_eq!(filter.pass_progress(), Some((0, 4)));
        filter.step(&listing);
        assert_eq!(filter.pass_progress(), Some((1, 4)));

        let mut steps = vec![FilterStep::Classified {
            id: ModuleId(0),
            visible: true,
        }];
        loop {
            match filter.step(&listing) {
                FilterStep::Completed(g) => {
                    assert_eq!(g, generation);
                    break;
                }
                step => steps.push(step),
            }
        }

        assert_eq!(steps.len(), 4);
        assert_eq!(filter.state(), FilterState::Idle);
        assert_eq!(filter.pass_progress(), None);
        assert_eq!(filter.snapshot(1, true).ids(), [ModuleId(0), ModuleId(2)]);
        assert!(filter.take_dirty());
        assert!(!filter.take_dirty());
    }

    #[test]
    fn test_superseded_pass_stops_writing() {
        let publisher = CriteriaPublisher::new(FilterCriteria::default());
        let listing = listing(4);
        let mut filter = FilterCoordinator::new(PredicateEvaluator::default(), publisher.current());

        let generation = publisher.publish(named());
        filter.begin(publisher.current(), publisher.token(generation), &listing);
        filter.step(&listing);

        publisher.publish(FilterCriteria::default());
        assert_eq!(filter.state(), FilterState::Cancelling(generation));
        assert_eq!(filter.step(&listing), FilterStep::Superseded(generation));
        assert_eq!(filter.visible().len(), 1);
        assert!(!filter.is_running());
    }

    #[test]
    fn test_empty_slots_are_hidden() {
        let publisher = CriteriaPublisher::new(FilterCriteria::default());
        let mut listing = listing(2);
        let mut filter = FilterCoordinator::new(PredicateEvaluator::default(), publisher.current());

        for record in listing.iter() {
            filter.classify(record);
        }
        assert_eq!(filter.visible().len(), 2);

        listing.vacate(ModuleId(1));
        let generation = publisher.publish(FilterCriteria::default());
        filter.begin(publisher.current(), publisher.token(generation), &listing);
        filter.step(&listing);
        assert_eq!(filter.step(&listing), FilterStep::Skipped(ModuleId(1)));
        assert!(!filter.visible().contains(ModuleId(1)));
    }
}
