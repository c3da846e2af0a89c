//! Incremental walk of the module registry.

use modscope_core::{KnownModules, Listing, ModuleId, ModuleRecord, ModuleRegistry};

/// Outcome of a single scan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    /// A record was built or refreshed.
    Observed(ModuleId),
    /// The registry no longer has the id; its record was dropped.
    Vacated(ModuleId),
    /// The registry has no entry for an id that was never observed.
    Missing(ModuleId),
    /// The pass visited every id up to the sampled total.
    Finished { epoch: u64, total: usize },
    /// No pass is running.
    Idle,
}

#[derive(Debug, Clone, Copy)]
struct ScanPass {
    cursor: usize,
    total: usize,
}

/// Builds and refreshes the listing from the registry.
///
/// A pass visits ids `0..total` in ascending order, where `total` is the
/// registry size sampled when the pass starts. Every pass increments the
/// scan epoch. Records survive across passes and are refreshed in place.
#[derive(Debug, Default)]
pub struct ScanCoordinator {
    listing: Listing,
    pass: Option<ScanPass>,
    epoch: u64,
    loaded: usize,
    total: usize,
}

impl ScanCoordinator {
    /// Create a coordinator with an empty listing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a pass over `total` ids, restarting any running pass.
    pub fn start(&mut self, total: usize) {
        self.epoch += 1;
        self.pass = Some(ScanPass { cursor: 0, total });
        self.loaded = 0;
        self.total = total;
        tracing::info!(epoch = self.epoch, total, "scan pass started");
    }

    /// Restart from id 0 against the registry's current size, keeping
    /// known records.
    pub fn rescan<R: ModuleRegistry + ?Sized>(&mut self, registry: &R) {
        self.start(registry.size());
    }

    /// Abandon the running pass.
    pub fn stop(&mut self) {
        if let Some(pass) = self.pass.take() {
            tracing::info!(epoch = self.epoch, at = pass.cursor, "scan pass stopped");
        }
    }

    /// Check if a pass is in progress.
    pub fn is_scanning(&self) -> bool {
        self.pass.is_some()
    }

    /// `(loaded, total)` for the current or last pass.
    pub fn progress(&self) -> (usize, usize) {
        (self.loaded, self.total)
    }

    /// Number of passes started so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The listing built so far.
    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    /// Visit the next id of the running pass.
    pub fn step<R: ModuleRegistry + ?Sized>(
        &mut self,
        registry: &R,
        known: &KnownModules,
    ) -> ScanStep {
        let Some(pass) = &mut self.pass else {
            return ScanStep::Idle;
        };

        if pass.cursor >= pass.total {
            let total = pass.total;
            self.pass = None;
            tracing::info!(
                epoch = self.epoch,
                total,
                records = self.listing.record_count(),
                "scan pass finished"
            );
            return ScanStep::Finished {
                epoch: self.epoch,
                total,
            };
        }

        let id = ModuleId::new(pass.cursor);
        pass.cursor += 1;
        self.loaded = pass.cursor;
        self.observe(registry, known, id)
    }

    /// Read one id from the registry and update its record.
    ///
    /// Ids past the end of the listing are appended.
    pub fn observe<R: ModuleRegistry + ?Sized>(
        &mut self,
        registry: &R,
        known: &KnownModules,
        id: ModuleId,
    ) -> ScanStep {
        match registry.get(id) {
            Some(entry) => {
                self.listing.upsert(ModuleRecord::observe(id, entry, known));
                ScanStep::Observed(id)
            }
            None if self.listing.vacate(id).is_some() => {
                tracing::debug!(module = %id, "module disappeared from registry");
                ScanStep::Vacated(id)
            }
            None => ScanStep::Missing(id),
        }
    }
}
