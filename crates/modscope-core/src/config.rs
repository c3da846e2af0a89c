//! Engine configuration types.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Prototype field identifying a UI component.
pub const DEFAULT_COMPONENT_MARKER: &str = "isReactComponent";

/// Configuration for the scan/filter engine.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Items processed per batch before yielding.
    #[builder(default = "25")]
    #[serde(default = "default_yield_every")]
    pub yield_every: usize,

    /// Pause between scan batches, in milliseconds (0 = yield only).
    #[builder(default = "5")]
    #[serde(default = "default_scan_delay_ms")]
    pub scan_delay_ms: u64,

    /// Pause between filter batches, in milliseconds (0 = yield only).
    #[builder(default = "10")]
    #[serde(default = "default_filter_delay_ms")]
    pub filter_delay_ms: u64,

    /// Capacity of the progress broadcast channel.
    #[builder(default = "100")]
    #[serde(default = "default_progress_capacity")]
    pub progress_capacity: usize,

    /// Prototype field whose truthiness marks a UI component.
    #[builder(default = "DEFAULT_COMPONENT_MARKER.to_string()")]
    #[serde(default = "default_component_marker")]
    pub component_marker: String,

    /// Start scanning as soon as the engine runs.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub scan_on_start: bool,
}

fn default_yield_every() -> usize {
    25
}

fn default_scan_delay_ms() -> u64 {
    5
}

fn default_filter_delay_ms() -> u64 {
    10
}

fn default_progress_capacity() -> usize {
    100
}

fn default_component_marker() -> String {
    DEFAULT_COMPONENT_MARKER.to_string()
}

fn default_true() -> bool {
    true
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        check_limits(
            self.yield_every,
            self.progress_capacity,
            self.component_marker.as_deref(),
        )
    }
}

fn check_limits(
    yield_every: Option<usize>,
    progress_capacity: Option<usize>,
    component_marker: Option<&str>,
) -> Result<(), String> {
    if yield_every == Some(0) {
        return Err("Batch size must be at least 1".to_string());
    }
    if progress_capacity == Some(0) {
        return Err("Progress channel capacity must be at least 1".to_string());
    }
    if component_marker == Some("") {
        return Err("Component marker cannot be empty".to_string());
    }
    Ok(())
}

impl EngineConfig {
    /// Create a new engine config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Apply the builder's checks to a config obtained some other way,
    /// such as deserialization.
    pub fn validate(&self) -> Result<(), String> {
        check_limits(
            Some(self.yield_every),
            Some(self.progress_capacity),
            Some(self.component_marker.as_str()),
        )
    }

    /// Delay between scan batches.
    pub fn scan_delay(&self) -> Duration {
        Duration::from_millis(self.scan_delay_ms)
    }

    /// Delay between filter batches.
    pub fn filter_delay(&self) -> Duration {
        Duration::from_millis(self.filter_delay_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            yield_every: default_yield_every(),
            scan_delay_ms: default_scan_delay_ms(),
            filter_delay_ms: default_filter_delay_ms(),
            progress_capacity: default_progress_capacity(),
            component_marker: default_component_marker(),
            scan_on_start: true,
        }
    }
}
