//! Client handle to a running engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use modscope_core::{
    ActiveCriteria, CriteriaSettings, FilterCriteria, Generation, ModuleId, ValidationError,
    VisibleSnapshot,
};
use modscope_filter::CriteriaPublisher;

use crate::progress::{progress_stream, IndexProgress, ProgressStream};

/// Requests sent from handles to the engine loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Rescan,
    StopScan,
    Refresh(ModuleId),
}

/// Cloneable handle for driving and observing an [`Engine`](crate::Engine).
///
/// The engine stops once every handle has been dropped and its remaining
/// work is done, or immediately on [`shutdown`](Self::shutdown).
#[derive(Debug, Clone)]
pub struct EngineHandle {
    pub(crate) publisher: CriteriaPublisher,
    pub(crate) commands: mpsc::UnboundedSender<Command>,
    pub(crate) running: Arc<watch::Sender<bool>>,
    pub(crate) visible: watch::Receiver<Arc<VisibleSnapshot>>,
    pub(crate) progress: broadcast::Sender<IndexProgress>,
    pub(crate) requested_epoch: Arc<AtomicU64>,
    pub(crate) cancel: CancellationToken,
}

impl EngineHandle {
    /// Validate and activate new criteria.
    ///
    /// On error the previous criteria stay active and no generation is
    /// allocated.
    pub fn set_criteria(&self, settings: &CriteriaSettings) -> Result<Generation, ValidationError> {
        self.publisher.publish_settings(settings)
    }

    /// Activate already validated criteria.
    pub fn set_filter(&self, criteria: FilterCriteria) -> Generation {
        self.publisher.publish(criteria)
    }

    /// The most recently accepted criteria.
    pub fn criteria(&self) -> ActiveCriteria {
        self.publisher.current()
    }

    /// The most recently accepted generation.
    pub fn latest_generation(&self) -> Generation {
        self.publisher.latest_generation()
    }

    /// Pause the scan after the current item.
    pub fn pause(&self) {
        self.running.send_replace(false);
    }

    /// Resume a paused scan where it stopped.
    pub fn resume(&self) {
        self.running.send_replace(true);
    }

    /// Check if the scan is paused.
    pub fn is_paused(&self) -> bool {
        !*self.running.borrow()
    }

    /// Restart the scan from id 0, keeping known records.
    pub fn request_rescan(&self) {
        self.requested_epoch.fetch_add(1, Ordering::AcqRel);
        self.send(Command::Rescan);
    }

    /// Abandon the running scan pass.
    pub fn stop_scan(&self) {
        self.send(Command::StopScan);
    }

    /// Tell the engine a module changed. Unknown ids are appended.
    pub fn notify_changed(&self, id: ModuleId) {
        self.send(Command::Refresh(id));
    }

    /// The latest visible snapshot.
    pub fn visible(&self) -> Arc<VisibleSnapshot> {
        Arc::clone(&self.visible.borrow())
    }

    /// Subscribe to visible snapshots.
    pub fn watch_visible(&self) -> watch::Receiver<Arc<VisibleSnapshot>> {
        self.visible.clone()
    }

    /// Wait until the latest criteria have been fully applied and every
    /// requested scan pass has finished.
    ///
    /// Returns the last snapshot if the engine stops first.
    pub async fn settled(&self) -> Arc<VisibleSnapshot> {
        let mut rx = self.visible.clone();
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if self.is_settled(&snapshot) {
                    return Arc::clone(&snapshot);
                }
            }
            if rx.changed().await.is_err() {
                return Arc::clone(&rx.borrow());
            }
        }
    }

    /// Subscribe to progress updates.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<IndexProgress> {
        self.progress.subscribe()
    }

    /// Progress updates as a stream.
    pub fn progress_stream(&self) -> ProgressStream {
        progress_stream(self.subscribe_progress())
    }

    /// Stop the engine loop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn is_settled(&self, snapshot: &VisibleSnapshot) -> bool {
        snapshot.settled
            && snapshot.generation == self.publisher.latest_generation()
            && snapshot.scan_epoch >= self.requested_epoch.load(Ordering::Acquire)
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!(?command, "engine is not running");
        }
    }
}
