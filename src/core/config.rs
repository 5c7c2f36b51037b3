//! Configuration for the resource registry, streaming scheduler and quality controller.
//!
//! Every field has a default, so a config file only needs the fields it overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::quality::lod::LodConfig;

/// Resource registry configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Resources unused for longer than this are eligible for cleanup (ms)
    pub cleanup_max_age_ms: u64,
    /// Interval between automatic cleanup passes (ms)
    pub auto_cleanup_interval_ms: u64,
    /// Whether automatic cleanup starts enabled
    pub auto_cleanup: bool,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            cleanup_max_age_ms: 5 * 60 * 1000,
            auto_cleanup_interval_ms: 60 * 1000,
            auto_cleanup: false,
        }
    }
}

impl ResourceConfig {
    pub fn cleanup_max_age(&self) -> Duration {
        Duration::from_millis(self.cleanup_max_age_ms)
    }

    pub fn auto_cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.auto_cleanup_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.auto_cleanup && self.auto_cleanup_interval_ms == 0 {
            return Err(Error::Config(
                "auto_cleanup_interval_ms must be positive when auto_cleanup is enabled".into(),
            ));
        }
        Ok(())
    }
}

/// Progressive loading configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Maximum estimated bytes per chunk (oversized single objects excepted)
    pub chunk_size_limit: u64,
    /// Maximum number of chunks activating at once
    pub max_concurrent_chunks: usize,
    /// Stagger delay per priority rank (ms)
    pub priority_delay_ms: u64,
    /// Medium-priority members farther than this are hidden
    pub medium_cull_distance: f32,
    /// Low-priority members farther than this are hidden
    pub low_cull_distance: f32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size_limit: 5 * 1024 * 1024,
            max_concurrent_chunks: 3,
            priority_delay_ms: 100,
            medium_cull_distance: 100.0,
            low_cull_distance: 50.0,
        }
    }
}

impl StreamingConfig {
    pub fn priority_delay(&self) -> Duration {
        Duration::from_millis(self.priority_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_chunks == 0 {
            return Err(Error::Config("max_concurrent_chunks must be at least 1".into()));
        }
        if self.chunk_size_limit == 0 {
            return Err(Error::Config("chunk_size_limit must be positive".into()));
        }
        for (name, value) in [
            ("medium_cull_distance", self.medium_cull_distance),
            ("low_cull_distance", self.low_cull_distance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!("{} must be a non-negative number", name)));
            }
        }
        Ok(())
    }
}

/// Adaptive quality configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Frame rate the control loop aims for
    pub target_fps: f32,
    /// Whether the global pixel-ratio/shadow axis is driven by metrics
    pub adaptive_quality: bool,
    /// Device pixel-ratio cap
    pub max_pixel_ratio: f32,
    /// Number of recent samples kept for smoothing
    pub sample_window: usize,
    /// Level-of-detail tables
    pub lod: LodConfig,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            adaptive_quality: true,
            max_pixel_ratio: 2.0,
            sample_window: 60,
            lod: LodConfig::default(),
        }
    }
}

impl QualityConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.target_fps.is_finite() || self.target_fps <= 0.0 {
            return Err(Error::Config("target_fps must be a positive number".into()));
        }
        if !self.max_pixel_ratio.is_finite() || self.max_pixel_ratio < 1.0 {
            return Err(Error::Config("max_pixel_ratio must be at least 1.0".into()));
        }
        if self.sample_window == 0 {
            return Err(Error::Config("sample_window must be at least 1".into()));
        }
        self.lod.validate()
    }
}

/// Top-level configuration for a [`SceneRuntime`](crate::runtime::SceneRuntime)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub resources: ResourceConfig,
    pub streaming: StreamingConfig,
    pub quality: QualityConfig,
}

impl ViewerConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        log::info!("Loading viewer config from {}", path.as_ref().display());
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        self.resources.validate()?;
        self.streaming.validate()?;
        self.quality.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ViewerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.streaming.max_concurrent_chunks, 3);
        assert_eq!(config.quality.target_fps, 60.0);
        assert_eq!(config.resources.cleanup_max_age(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ViewerConfig::from_json_str(
            r#"{ "streaming": { "max_concurrent_chunks": 5 }, "quality": { "target_fps": 30 } }"#,
        )
        .unwrap();
        assert_eq!(config.streaming.max_concurrent_chunks, 5);
        assert_eq!(config.streaming.chunk_size_limit, StreamingConfig::default().chunk_size_limit);
        assert_eq!(config.quality.target_fps, 30.0);
        assert_eq!(config.quality.lod, LodConfig::default());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let result = ViewerConfig::from_json_str(r#"{ "streaming": { "max_concurrent_chunks": 0 } }"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_negative_concurrency_fails_to_parse() {
        let result = ViewerConfig::from_json_str(r#"{ "streaming": { "max_concurrent_chunks": -1 } }"#);
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_invalid_quality_is_rejected() {
        let mut config = ViewerConfig::default();
        config.quality.target_fps = 0.0;
        assert!(config.validate().is_err());

        let mut config = ViewerConfig::default();
        config.quality.max_pixel_ratio = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "resources": {{ "cleanup_max_age_ms": 1000 }} }}"#).unwrap();

        let config = ViewerConfig::load(file.path()).unwrap();
        assert_eq!(config.resources.cleanup_max_age(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ViewerConfig::load("/nonexistent/scenekeeper.json");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
