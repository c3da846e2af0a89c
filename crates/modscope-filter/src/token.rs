//! Generation-scoped cancellation of filter passes.

use tokio::sync::watch;

use modscope_core::{ActiveCriteria, Generation};

/// Cancellation token scoped to one criteria generation.
///
/// A token is superseded as soon as any newer generation is published.
#[derive(Debug, Clone)]
pub struct GenerationToken {
    generation: Generation,
    latest: watch::Receiver<ActiveCriteria>,
}

impl GenerationToken {
    /// Creates a token for `generation`, watching `latest` for newer ones.
    pub fn new(generation: Generation, latest: watch::Receiver<ActiveCriteria>) -> Self {
        Self { generation, latest }
    }

    /// Returns the generation this token guards.
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns true once a newer generation has been published.
    pub fn is_superseded(&self) -> bool {
        self.latest.borrow().generation != self.generation
    }
}
