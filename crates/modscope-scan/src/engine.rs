//! The cooperative scan/filter driver.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use modscope_core::{
    ActiveCriteria, EngineConfig, FilterCriteria, KnownModules, ModuleRegistry, VisibleSnapshot,
};
use modscope_filter::{
    CriteriaPublisher, FilterCoordinator, FilterStep, GenerationToken, PredicateEvaluator,
};

use crate::handle::{Command, EngineHandle};
use crate::progress::{IndexProgress, ProgressReporter};
use crate::scanner::{ScanCoordinator, ScanStep};
use crate::scheduler::{Phase, Scheduler, TokioScheduler};

/// Why the idle engine woke up.
enum Wake {
    Stop,
    Command(Command),
    Changed,
}

/// Single task owning the listing and the visible set.
///
/// Scan and filter work run in batches of `yield_every` items with a
/// scheduler suspension between batches. A filter pass always takes
/// priority over scanning, and the scan never advances while newer
/// criteria are waiting to be adopted.
pub struct Engine<R: ModuleRegistry + ?Sized, S: Scheduler = TokioScheduler> {
    registry: Arc<R>,
    known: KnownModules,
    config: EngineConfig,
    scheduler: S,
    scan: ScanCoordinator,
    filter: FilterCoordinator,
    criteria: watch::Receiver<ActiveCriteria>,
    commands: mpsc::UnboundedReceiver<Command>,
    running: watch::Receiver<bool>,
    visible: watch::Sender<Arc<VisibleSnapshot>>,
    progress: ProgressReporter,
    cancel: CancellationToken,
}

impl<R: ModuleRegistry + ?Sized> Engine<R> {
    /// Create an engine whose initial criteria match every module.
    pub fn new(registry: Arc<R>, known: KnownModules, config: EngineConfig) -> (Self, EngineHandle) {
        Self::with_criteria(registry, known, config, FilterCriteria::default())
    }

    /// Create an engine with the given initial criteria.
    pub fn with_criteria(
        registry: Arc<R>,
        known: KnownModules,
        config: EngineConfig,
        criteria: FilterCriteria,
    ) -> (Self, EngineHandle) {
        let config = sanitize(config);
        let publisher = CriteriaPublisher::new(criteria);
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (running_tx, running) = watch::channel(true);
        let (visible, visible_rx) = watch::channel(Arc::new(VisibleSnapshot::default()));
        let progress = ProgressReporter::new(config.progress_capacity);
        let cancel = CancellationToken::new();

        let handle = EngineHandle {
            publisher: publisher.clone(),
            commands: commands_tx,
            running: Arc::new(running_tx),
            visible: visible_rx,
            progress: progress.sender(),
            requested_epoch: Arc::new(AtomicU64::new(u64::from(config.scan_on_start))),
            cancel: cancel.clone(),
        };

        let engine = Self {
            registry,
            known,
            scheduler: TokioScheduler::from_config(&config),
            scan: ScanCoordinator::new(),
            filter: FilterCoordinator::new(
                PredicateEvaluator::from_config(&config),
                publisher.current(),
            ),
            criteria: publisher.subscribe(),
            commands,
            running,
            visible,
            progress,
            cancel,
            config,
        };

        (engine, handle)
    }
}

/// Raise zero batch sizes and channel capacities to 1.
fn sanitize(mut config: EngineConfig) -> EngineConfig {
    if let Err(reason) = config.validate() {
        tracing::warn!(%reason, "engine config rejected, clamping to minimums");
        config.yield_every = config.yield_every.max(1);
        config.progress_capacity = config.progress_capacity.max(1);
    }
    config
}

impl<R: ModuleRegistry + ?Sized, S: Scheduler> Engine<R, S> {
    /// Replace the scheduler used between batches.
    pub fn with_scheduler<T: Scheduler>(self, scheduler: T) -> Engine<R, T> {
        Engine {
            registry: self.registry,
            known: self.known,
            config: self.config,
            scheduler,
            scan: self.scan,
            filter: self.filter,
            criteria: self.criteria,
            commands: self.commands,
            running: self.running,
            visible: self.visible,
            progress: self.progress,
            cancel: self.cancel,
        }
    }

    /// Drive scanning and filtering until shut down or every handle is gone.
    pub async fn run(mut self) {
        tracing::info!(
            modules = self.registry.size(),
            known = self.known.len(),
            "engine started"
        );

        if self.config.scan_on_start {
            self.scan.rescan(self.registry.as_ref());
        }

        let mut detached = false;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            detached |= self.drain_commands();
            self.absorb_criteria();

            let phase = if self.filter.is_running() {
                self.filter_batch();
                Some(Phase::Filter)
            } else if self.scan.is_scanning() && *self.running.borrow() {
                self.scan_batch();
                Some(Phase::Scan)
            } else {
                None
            };

            self.report_progress();
            self.publish_snapshot();

            match phase {
                Some(phase) => self.scheduler.suspend(phase).await,
                None if detached => break,
                None => match self.wait_for_work().await {
                    Wake::Stop => break,
                    Wake::Command(command) => self.handle_command(command),
                    Wake::Changed => {}
                },
            }
        }

        tracing::info!(epoch = self.scan.epoch(), "engine stopped");
    }

    /// Handle queued commands. Returns true once every handle is gone.
    fn drain_commands(&mut self) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(command) => self.handle_command(command),
                Err(mpsc::error::TryRecvError::Empty) => return false,
                Err(mpsc::error::TryRecvError::Disconnected) => return true,
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Rescan => self.scan.rescan(self.registry.as_ref()),
            Command::StopScan => self.scan.stop(),
            Command::Refresh(id) => {
                let step = self.scan.observe(self.registry.as_ref(), &self.known, id);
                self.apply(step);
            }
        }
    }

    /// Start a filter pass if a newer generation was published.
    fn absorb_criteria(&mut self) {
        let active = self.criteria.borrow_and_update().clone();
        if active.generation == self.filter.generation() {
            return;
        }

        let token = GenerationToken::new(active.generation, self.criteria.clone());
        self.filter.begin(active, token, self.scan.listing());
    }

    fn criteria_pending(&self) -> bool {
        self.criteria.borrow().generation != self.filter.generation()
    }

    fn filter_batch(&mut self) {
        for _ in 0..self.config.yield_every {
            match self.filter.step(self.scan.listing()) {
                FilterStep::Classified { .. } | FilterStep::Skipped(_) => {}
                FilterStep::Superseded(_) | FilterStep::Completed(_) | FilterStep::Idle => break,
            }
        }
    }

    fn scan_batch(&mut self) {
        for _ in 0..self.config.yield_every {
            if self.criteria_pending() || !*self.running.borrow() {
                break;
            }

            match self.scan.step(self.registry.as_ref(), &self.known) {
                ScanStep::Finished { .. } | ScanStep::Idle => break,
                step => self.apply(step),
            }
            self.report_progress();
        }
    }

    /// Classify the record a scan step touched under the current criteria.
    fn apply(&mut self, step: ScanStep) {
        match step {
            ScanStep::Observed(id) => {
                if let Some(record) = self.scan.listing().get(id) {
                    self.filter.classify(record);
                }
            }
            ScanStep::Vacated(id) => self.filter.hide(id),
            ScanStep::Missing(_) | ScanStep::Finished { .. } | ScanStep::Idle => {}
        }
    }

    fn is_settled(&self) -> bool {
        !self.filter.is_running() && !self.scan.is_scanning() && !self.criteria_pending()
    }

    fn report_progress(&mut self) {
        let (loaded, total) = self.scan.progress();
        let (filtered, filter_total) = self.filter.pass_progress().unwrap_or_default();
        self.progress.report(IndexProgress {
            loaded,
            total,
            scanning: self.scan.is_scanning(),
            filtering: self.filter.is_running(),
            filtered,
            filter_total,
        });
    }

    fn publish_snapshot(&mut self) {
        let settled = self.is_settled();
        let epoch = self.scan.epoch();
        let dirty = self.filter.take_dirty();

        let stale = {
            let current = self.visible.borrow();
            current.generation != self.filter.generation()
                || current.scan_epoch != epoch
                || current.settled != settled
        };

        if dirty || stale {
            self.visible
                .send_replace(Arc::new(self.filter.snapshot(epoch, settled)));
        }
    }

    async fn wait_for_work(&mut self) -> Wake {
        tokio::select! {
            _ = self.cancel.cancelled() => Wake::Stop,
            command = self.commands.recv() => match command {
                Some(command) => Wake::Command(command),
                None => Wake::Stop,
            },
            changed = self.criteria.changed() => match changed {
                Ok(()) => Wake::Changed,
                Err(_) => Wake::Stop,
            },
            changed = self.running.changed() => match changed {
                Ok(()) => Wake::Changed,
                Err(_) => Wake::Stop,
            },
        }
    }
}
