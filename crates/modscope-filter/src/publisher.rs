//! Publication of criteria generations.

use std::sync::Arc;

use tokio::sync::watch;

use modscope_core::{ActiveCriteria, CriteriaSettings, FilterCriteria, Generation, ValidationError};

use crate::token::GenerationToken;

/// Single writer of criteria generations.
///
/// Every accepted change produces a new `ActiveCriteria` one generation
/// after the previous one, even when the criteria are identical.
#[derive(Debug, Clone)]
pub struct CriteriaPublisher {
    tx: Arc<watch::Sender<ActiveCriteria>>,
}

impl CriteriaPublisher {
    /// Create a publisher whose initial generation holds `criteria`.
    pub fn new(criteria: FilterCriteria) -> Self {
        let (tx, _rx) = watch::channel(ActiveCriteria::initial(criteria));
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to generation changes.
    pub fn subscribe(&self) -> watch::Receiver<ActiveCriteria> {
        self.tx.subscribe()
    }

    /// The most recently published criteria.
    pub fn current(&self) -> ActiveCriteria {
        self.tx.borrow().clone()
    }

    /// The most recently published generation.
    pub fn latest_generation(&self) -> Generation {
        self.tx.borrow().generation
    }

    /// Publish validated criteria, returning the generation assigned to them.
    pub fn publish(&self, criteria: FilterCriteria) -> Generation {
        let mut generation = Generation::INITIAL;
        self.tx.send_modify(|active| {
            *active = active.successor(criteria);
            generation = active.generation;
        });
        tracing::debug!(%generation, "criteria published");
        generation
    }

    /// Validate settings and publish them.
    ///
    /// Compiled patterns are reused from the current criteria when their
    /// text is unchanged. On error the current generation stays active.
    pub fn publish_settings(&self, settings: &CriteriaSettings) -> Result<Generation, ValidationError> {
        let criteria = {
            let current = self.tx.borrow();
            FilterCriteria::compile_with(settings, Some(&current.criteria))
        };

        match criteria {
            Ok(criteria) => Ok(self.publish(criteria)),
            Err(err) => {
                tracing::debug!(error = %err, "criteria rejected");
                Err(err)
            }
        }
    }

    /// A token for `generation`, superseded by any later publication.
    pub fn token(&self, generation: Generation) -> GenerationToken {
        GenerationToken::new(generation, self.subscribe())
    }
}
