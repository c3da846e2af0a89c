//! Index progress reporting.

use std::pin::Pin;

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

/// Boxed stream of progress updates.
pub type ProgressStream = Pin<Box<dyn Stream<Item = IndexProgress> + Send>>;

/// Progress of the engine's current work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexProgress {
    /// Ids visited in the current scan pass.
    pub loaded: usize,
    /// Registry size sampled when the pass started.
    pub total: usize,
    /// A scan pass is in progress.
    pub scanning: bool,
    /// A filter pass is in progress.
    pub filtering: bool,
    /// Listing slots swept by the running filter pass.
    pub filtered: usize,
    /// Listing length when the running filter pass began.
    pub filter_total: usize,
}

impl IndexProgress {
    /// Completion of the scan pass, in percent.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.loaded as f64 / self.total as f64) * 100.0
        }
    }

    /// Completion of the running filter pass, in percent.
    pub fn filter_percentage(&self) -> f64 {
        if self.filter_total == 0 {
            100.0
        } else {
            (self.filtered as f64 / self.filter_total as f64) * 100.0
        }
    }

    /// Neither a scan nor a filter pass is running.
    pub fn is_idle(&self) -> bool {
        !self.scanning && !self.filtering
    }
}

/// Fan-out of progress updates to any number of subscribers.
///
/// Updates identical to the previous one are not sent. Slow subscribers
/// lag rather than block the engine.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: broadcast::Sender<IndexProgress>,
    latest: IndexProgress,
}

impl ProgressReporter {
    /// Create a reporter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            latest: IndexProgress::default(),
        }
    }

    /// Sender side, for handing out subscriptions elsewhere.
    pub fn sender(&self) -> broadcast::Sender<IndexProgress> {
        self.tx.clone()
    }

    /// Subscribe to progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<IndexProgress> {
        self.tx.subscribe()
    }

    /// Most recently reported progress.
    pub fn latest(&self) -> IndexProgress {
        self.latest
    }

    /// Report progress. Returns whether it differed from the last report.
    pub fn report(&mut self, progress: IndexProgress) -> bool {
        if progress == self.latest {
            return false;
        }
        self.latest = progress;
        // No subscribers is not an error.
        let _ = self.tx.send(progress);
        true
    }
}

/// Adapt a progress subscription into a stream, skipping lag notifications.
pub fn progress_stream(rx: broadcast::Receiver<IndexProgress>) -> ProgressStream {
    Box::pin(BroadcastStream::new(rx).filter_map(|message| message.ok()))
}
