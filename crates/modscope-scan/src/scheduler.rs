//! Suspension points between engine batches.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use modscope_core::EngineConfig;

/// Type alias for boxed futures returned by schedulers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Kind of batch that just finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scan,
    Filter,
}

/// Decides how the engine yields to its host between batches.
pub trait Scheduler: Send + Sync {
    /// Suspend after a batch of the given phase.
    fn suspend(&self, phase: Phase) -> BoxFuture<'_, ()>;
}

/// Production scheduler: sleeps for a per-phase delay on the tokio timer.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    scan_delay: Duration,
    filter_delay: Duration,
}

impl TokioScheduler {
    /// Create a scheduler with explicit delays. A zero delay only yields.
    pub fn new(scan_delay: Duration, filter_delay: Duration) -> Self {
        Self {
            scan_delay,
            filter_delay,
        }
    }

    /// Create a scheduler from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.scan_delay(), config.filter_delay())
    }
}

impl Scheduler for TokioScheduler {
    fn suspend(&self, phase: Phase) -> BoxFuture<'_, ()> {
        let delay = match phase {
            Phase::Scan => self.scan_delay,
            Phase::Filter => self.filter_delay,
        };

        Box::pin(async move {
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
        })
    }
}

/// Scheduler that never suspends.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Scheduler for Immediate {
    fn suspend(&self, _phase: Phase) -> BoxFuture<'_, ()> {
        Box::pin(std::future::ready(()))
    }
}
