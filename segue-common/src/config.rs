//! Engine configuration loading
//!
//! Tuning parameters for batching, retries, crossfades, caches and metrics
//! windows. Resolution follows a fixed priority order:
//! 1. Explicit path handed in by the caller (highest priority)
//! 2. `SEGUE_ENGINE_CONFIG` environment variable
//! 3. Compiled defaults (fallback)
//!
//! Every field has a default, so a config file only needs the keys it wants
//! to override.

use crate::error::{Error, Result};
use crate::fade_curves::FadeCurve;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Environment variable pointing at a TOML config file
pub const CONFIG_ENV_VAR: &str = "SEGUE_ENGINE_CONFIG";

/// Engine tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum items per processing batch
    pub batch_size: usize,

    /// Whether processing passes reorder batches through the optimizer.
    /// Off, a pass only rewrites positions from the incoming snapshot order.
    pub reorder_batches: bool,

    /// Persistence write attempts per batch before decomposition
    pub retry_attempts: u32,

    /// Base retry delay in milliseconds; attempt n waits `base × n`
    pub retry_base_delay_ms: u64,

    /// Crossfade duration in milliseconds
    pub crossfade_duration_ms: u64,

    /// Number of discrete volume steps per crossfade
    pub crossfade_steps: u32,

    /// Volume curve applied to the incoming deck
    pub fade_in_curve: FadeCurve,

    /// Volume curve applied to the outgoing deck
    pub fade_out_curve: FadeCurve,

    /// Feature cache entries kept at most
    pub feature_cache_capacity: u64,

    /// Feature cache time-to-live in seconds; older entries are refetched
    pub feature_ttl_secs: u64,

    /// Batch-result cache entries kept at most
    pub batch_cache_capacity: u64,

    /// Batch-result cache time-to-live in seconds
    pub batch_cache_ttl_secs: u64,

    /// Rolling metrics windows in seconds, shortest first
    pub metrics_windows_secs: Vec<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            reorder_batches: true,
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            crossfade_duration_ms: 3000,
            crossfade_steps: 30,
            fade_in_curve: FadeCurve::Linear,
            fade_out_curve: FadeCurve::Linear,
            feature_cache_capacity: 1024,
            feature_ttl_secs: 600,
            batch_cache_capacity: 512,
            batch_cache_ttl_secs: 300,
            metrics_windows_secs: vec![60, 300],
        }
    }
}

impl EngineConfig {
    /// Load configuration following the priority order in the module docs
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }

        debug!("No engine config file given, using compiled defaults");
        Ok(Self::default())
    }

    /// Load and validate configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Loaded engine configuration");
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if self.retry_attempts == 0 {
            return Err(Error::Config("retry_attempts must be at least 1".into()));
        }
        if self.crossfade_steps == 0 {
            return Err(Error::Config("crossfade_steps must be at least 1".into()));
        }
        if self.crossfade_duration_ms == 0 {
            return Err(Error::Config(
                "crossfade_duration_ms must be positive".into(),
            ));
        }
        if self.metrics_windows_secs.is_empty() {
            return Err(Error::Config(
                "metrics_windows_secs needs at least one window".into(),
            ));
        }
        if self.metrics_windows_secs.iter().any(|w| *w == 0) {
            return Err(Error::Config("metrics windows must be positive".into()));
        }
        Ok(())
    }

    /// Duration of one crossfade step
    pub fn crossfade_step_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(
            self.crossfade_duration_ms / u64::from(self.crossfade_steps),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.crossfade_duration_ms, 3000);
        assert_eq!(config.crossfade_steps, 30);
        assert_eq!(config.metrics_windows_secs, vec![60, 300]);
    }

    #[test]
    fn partial_toml_overrides_only_named_keys() {
        let config = EngineConfig::from_toml_str(
            r#"
            batch_size = 25
            fade_in_curve = "equal_power"
            "#,
        )
        .unwrap();

        assert_eq!(config.batch_size, 25);
        assert_eq!(config.fade_in_curve, FadeCurve::EqualPower);
        assert_eq!(config.retry_attempts, 3);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = EngineConfig::from_toml_str("no_such_key = 1");
        assert!(result.is_err());
    }

    #[test]
    fn zero_batch_size_fails_validation() {
        let result = EngineConfig::from_toml_str("batch_size = 0");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn zero_crossfade_steps_fail_validation() {
        let result = EngineConfig::from_toml_str("crossfade_steps = 0");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn step_duration_divides_evenly() {
        let config = EngineConfig::default();
        assert_eq!(
            config.crossfade_step_duration(),
            std::time::Duration::from_millis(100)
        );
    }

    #[test]
    fn load_reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "batch_size = 7").unwrap();

        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.batch_size, 7);
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let result = EngineConfig::from_file(Path::new("/nonexistent/segue.toml"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
