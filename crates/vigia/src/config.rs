//! Vigia configuration.
//!
//! Defaults reproduce the stock behaviour; a page can override any subset
//! from JSON or YAML.

use crate::result::{VigiaError, VigiaResult};
use serde::{Deserialize, Serialize};

/// Display name used when a page does not supply one
pub const DEFAULT_GAME_NAME: &str = "Unknown Game";

/// Bytes in one mebibyte
pub const MIB: u64 = 1024 * 1024;

/// Fault reporter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Maximum retained fault records
    pub capacity: usize,
    /// Number of records returned as "recent" in stats
    pub recent_count: usize,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            recent_count: 10,
        }
    }
}

/// Sampler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Maximum retained samples per series
    pub series_capacity: usize,
    /// Minimum elapsed time between FPS samples (ms)
    pub fps_report_interval_ms: f64,
    /// FPS below this logs a warning
    pub low_fps_warning: u32,
    /// Heap polling period (ms)
    pub memory_interval_ms: u32,
    /// used/limit ratio above this logs a warning
    pub memory_pressure_ratio: f64,
    /// Mean FPS below this suggests lowering quality
    pub suggest_quality_below_fps: u32,
    /// Mean FPS below this adds the critical frame-rate suggestion
    pub suggest_critical_below_fps: u32,
    /// Used heap above this suggests a restart
    pub suggest_restart_above_bytes: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            series_capacity: 60,
            fps_report_interval_ms: 1000.0,
            low_fps_warning: 30,
            memory_interval_ms: 5000,
            memory_pressure_ratio: 0.8,
            suggest_quality_below_fps: 30,
            suggest_critical_below_fps: 20,
            suggest_restart_above_bytes: 500 * MIB,
        }
    }
}

/// Accessibility annotator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessibilityConfig {
    /// Delay before a live-region announcement is cleared (ms)
    pub announcement_clear_ms: u32,
    /// Key (`KeyboardEvent.key`) that toggles the help overlay
    pub help_key: String,
    /// Media query tracked for forced-colors mode
    pub high_contrast_query: String,
}

impl Default for AccessibilityConfig {
    fn default() -> Self {
        Self {
            announcement_clear_ms: 1000,
            help_key: "F1".to_string(),
            high_contrast_query: "(forced-colors: active)".to_string(),
        }
    }
}

/// Top-level configuration shared by the three components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VigiaConfig {
    /// Display name reported in logs and performance reports
    pub game_name: String,
    /// Fault reporter settings
    pub faults: FaultConfig,
    /// Sampler settings
    pub sampler: SamplerConfig,
    /// Accessibility settings
    pub accessibility: AccessibilityConfig,
}

impl Default for VigiaConfig {
    fn default() -> Self {
        Self {
            game_name: DEFAULT_GAME_NAME.to_string(),
            faults: FaultConfig::default(),
            sampler: SamplerConfig::default(),
            accessibility: AccessibilityConfig::default(),
        }
    }
}

impl VigiaConfig {
    /// Create the default config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the game name
    #[must_use]
    pub fn with_game_name(mut self, name: impl Into<String>) -> Self {
        self.game_name = name.into();
        self
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> VigiaResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> VigiaResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the components cannot run with
    pub fn validate(&self) -> VigiaResult<()> {
        if self.faults.capacity == 0 {
            return Err(VigiaError::config("faults.capacity must be positive"));
        }
        if self.sampler.series_capacity == 0 {
            return Err(VigiaError::config(
                "sampler.series_capacity must be positive",
            ));
        }
        let interval = self.sampler.fps_report_interval_ms;
        if interval.is_nan() || interval <= 0.0 {
            return Err(VigiaError::config(
                "sampler.fps_report_interval_ms must be positive",
            ));
        }
        if self.sampler.memory_interval_ms == 0 {
            return Err(VigiaError::config(
                "sampler.memory_interval_ms must be positive",
            ));
        }
        let ratio = self.sampler.memory_pressure_ratio;
        if ratio.is_nan() || ratio <= 0.0 || ratio > 1.0 {
            return Err(VigiaError::config(format!(
                "sampler.memory_pressure_ratio {ratio} outside (0, 1]"
            )));
        }
        if self.sampler.suggest_critical_below_fps > self.sampler.suggest_quality_below_fps {
            return Err(VigiaError::config(
                "sampler.suggest_critical_below_fps exceeds suggest_quality_below_fps",
            ));
        }
        if self.accessibility.help_key.is_empty() {
            return Err(VigiaError::config("accessibility.help_key is empty"));
        }
        Ok(())
    }
}
