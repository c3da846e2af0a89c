//! Incremental, cancellable module scanning engine for modscope.
//!
//! # Overview
//!
//! `modscope-scan` walks a host's module registry in small batches, builds
//! the listing of module records, and keeps a filtered visible subset up to
//! date as criteria change. Key features:
//!
//! - **Cooperative batching** with a pluggable [`Scheduler`] between batches
//! - **Generation-aware re-filtering** that abandons stale passes
//! - **Progress updates** via broadcast channels
//! - **Snapshots** of the visible set via a watch channel
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use modscope_scan::{Engine, EngineConfig, KnownModules, MemoryRegistry};
//!
//! # async fn demo() {
//! let registry = Arc::new(MemoryRegistry::new());
//! let (engine, handle) = Engine::new(registry, KnownModules::new(), EngineConfig::default());
//! tokio::spawn(engine.run());
//!
//! let snapshot = handle.settled().await;
//! println!("{} modules visible", snapshot.len());
//! # }
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! # async fn demo(handle: modscope_scan::EngineHandle) {
//! let mut progress_rx = handle.subscribe_progress();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("Indexed {}/{} modules", progress.loaded, progress.total);
//!     }
//! });
//! # }
//! ```

mod engine;
mod handle;
mod progress;
mod scanner;
mod scheduler;

pub use engine::Engine;
pub use handle::EngineHandle;
pub use progress::{progress_stream, IndexProgress, ProgressReporter, ProgressStream};
pub use scanner::{ScanCoordinator, ScanStep};
pub use scheduler::{BoxFuture, Immediate, Phase, Scheduler, TokioScheduler};

// Re-export core types for convenience
pub use modscope_core::{
    CriteriaSettings, EngineConfig, FilterCriteria, Generation, KnownModules, MemoryRegistry,
    ModuleId, ModuleRegistry, VisibleSnapshot,
};
