//! Configuration management for the telemetry pipeline

use crate::{
    constants::{
        DEFAULT_OBSERVATION_NOISE, DEFAULT_PROCESS_NOISE, DEFAULT_SMOOTHING_WINDOW, DEFAULT_TELEMETRY_HOST,
        DEFAULT_TELEMETRY_PORT,
    },
    filters::WarmupPolicy,
    pnp::iterative::DEFAULT_MAX_ITERATIONS,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Landmark stabilization
    pub filter: FilterConfig,

    /// Fallback frame size for camera intrinsics
    pub camera: CameraConfig,

    /// Pose recovery
    pub pose: PoseConfig,

    /// Multi-face track management
    pub tracking: TrackingConfig,

    /// Telemetry destination
    pub telemetry: TelemetryConfig,

    /// Landmark source
    pub source: SourceConfig,
}

/// Filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Run the Kalman filter and smoother; raw landmarks pass through otherwise
    pub enabled: bool,

    /// Kalman process noise q
    pub process_noise: f64,

    /// Kalman observation noise r
    pub observation_noise: f64,

    /// Temporal smoothing window size
    pub window_size: usize,

    /// How the smoothing window behaves before it fills
    pub warmup: WarmupPolicy,
}

/// Camera fallback parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,
}

/// Which `PnP` implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    #[default]
    Iterative,
    Opencv,
}

/// Pose estimation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// `PnP` solver implementation
    pub solver: SolverKind,

    /// Solutions with a larger RMS reprojection error (pixels) are rejected
    pub max_reprojection_error: f64,

    /// Refinement iteration cap for the iterative solver
    pub max_iterations: usize,
}

/// Track management configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Maximum number of simultaneous face tracks
    pub max_tracks: usize,

    /// Frames a track may go unmatched before it is dropped
    pub max_missed_frames: u32,

    /// Association gate as a fraction of the track's face width
    pub max_match_distance: f64,
}

/// Telemetry destination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Destination host
    pub host: String,

    /// Destination UDP port
    pub port: u16,
}

/// Landmark source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Replay,
    Osf,
}

/// Landmark source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source kind
    pub kind: SourceKind,

    /// JSON-lines recording for the replay source
    pub replay_path: Option<PathBuf>,

    /// Listen address for `OpenSeeFace` packets
    pub osf_bind: String,

    /// Receive timeout so the loop can observe cancellation
    pub osf_timeout_ms: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            process_noise: DEFAULT_PROCESS_NOISE,
            observation_noise: DEFAULT_OBSERVATION_NOISE,
            window_size: DEFAULT_SMOOTHING_WINDOW,
            warmup: WarmupPolicy::default(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self { width: 640, height: 480 }
    }
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            solver: SolverKind::default(),
            max_reprojection_error: 20.0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_tracks: 4,
            max_missed_frames: 10,
            max_match_distance: 0.5,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TELEMETRY_HOST.to_string(),
            port: DEFAULT_TELEMETRY_PORT,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            replay_path: None,
            osf_bind: "127.0.0.1:11573".to_string(),
            osf_timeout_ms: 100,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the text is not a valid configuration
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Destination address as `host:port`
    #[must_use]
    pub fn telemetry_address(&self) -> String {
        format!("{}:{}", self.telemetry.host, self.telemetry.port)
    }

    /// Local address a telemetry listener binds: loopback on the telemetry port
    #[must_use]
    pub fn listen_address(&self) -> String {
        format!("{DEFAULT_TELEMETRY_HOST}:{}", self.telemetry.port)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` naming the first invalid value
    pub fn validate(&self) -> Result<()> {
        // Filter parameters
        if !(self.filter.process_noise > 0.0 && self.filter.process_noise.is_finite()) {
            return Err(Error::ConfigError("Process noise must be positive".to_string()));
        }
        if !(self.filter.observation_noise > 0.0 && self.filter.observation_noise.is_finite()) {
            return Err(Error::ConfigError("Observation noise must be positive".to_string()));
        }
        if self.filter.window_size == 0 {
            return Err(Error::ConfigError(
                "Smoothing window size must be greater than 0".to_string(),
            ));
        }

        // Camera fallback
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::ConfigError("Camera width and height must be greater than 0".to_string()));
        }

        // Pose
        if !(self.pose.max_reprojection_error > 0.0) {
            return Err(Error::ConfigError(
                "Maximum reprojection error must be positive".to_string(),
            ));
        }
        if self.pose.max_iterations == 0 {
            return Err(Error::ConfigError("Pose iteration count must be greater than 0".to_string()));
        }
        if self.pose.solver == SolverKind::Opencv && !cfg!(feature = "opencv") {
            return Err(Error::ConfigError(
                "The opencv solver requires building with the `opencv` feature".to_string(),
            ));
        }

        // Tracking
        if self.tracking.max_tracks == 0 {
            return Err(Error::ConfigError("Maximum tracks must be greater than 0".to_string()));
        }
        if !(self.tracking.max_match_distance > 0.0) {
            return Err(Error::ConfigError("Match distance must be positive".to_string()));
        }

        // Telemetry
        if self.telemetry.host.is_empty() {
            return Err(Error::ConfigError("Telemetry host must not be empty".to_string()));
        }
        if self.telemetry.port == 0 {
            return Err(Error::ConfigError("Telemetry port must not be 0".to_string()));
        }

        // Source
        if self.source.kind == SourceKind::Osf && self.source.osf_timeout_ms == 0 {
            return Err(Error::ConfigError("OSF timeout must be greater than 0".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Head Pose Telemetry Configuration

# Landmark stabilization
filter:
  enabled: true
  process_noise: 1.0
  observation_noise: 10.0
  window_size: 5
  warmup: zero_filled     # or occupied_only

# Fallback frame size used for camera intrinsics
camera:
  width: 640
  height: 480

# Pose recovery
pose:
  solver: iterative       # or opencv (requires the opencv feature)
  max_reprojection_error: 20.0
  max_iterations: 50

# Face tracks
tracking:
  max_tracks: 4
  max_missed_frames: 10
  max_match_distance: 0.5

# Telemetry destination
telemetry:
  host: "127.0.0.1"
  port: 5065

# Landmark source
source:
  kind: replay            # or osf
  replay_path: "recording.jsonl"
  osf_bind: "127.0.0.1:11573"
  osf_timeout_ms: 100
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.filter.window_size, 5);
        assert_eq!(config.filter.warmup, WarmupPolicy::ZeroFilled);
        assert_eq!(config.telemetry_address(), "127.0.0.1:5065");
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::from_yaml(EXAMPLE_CONFIG).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.source.replay_path, Some(PathBuf::from("recording.jsonl")));
        assert_eq!(config.pose.solver, SolverKind::Iterative);
        assert_eq!(config.tracking.max_tracks, 4);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = Config::from_yaml("filter:\n  warmup: occupied_only\ntelemetry:\n  port: 9000\n").unwrap();
        assert_eq!(config.filter.warmup, WarmupPolicy::OccupiedOnly);
        assert_eq!(config.filter.process_noise, 1.0);
        assert_eq!(config.telemetry.port, 9000);
        assert_eq!(config.telemetry.host, "127.0.0.1");
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();
        config.filter.window_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.filter.observation_noise = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.filter.process_noise = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.telemetry.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tracking.max_tracks = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pose.max_reprojection_error = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            Config::from_yaml("filter: [1, 2"),
            Err(Error::ConfigError(_))
        ));
    }
}
