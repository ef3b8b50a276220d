//! Head pose and facial expression telemetry from 68-point facial landmarks.
//!
//! Raw per-frame landmark detections are noisy. This library stabilizes
//! them and turns them into a compact telemetry stream for an avatar client:
//!
//! 1. Per-axis Kalman filtering of all 68 landmarks
//! 2. A short moving-average window over the filtered landmarks
//! 3. Eight normalized expression metrics (eye openness, mouth, brows)
//! 4. Head pose from six anatomical anchors via Perspective-n-Point
//! 5. Rotation vector to unit quaternion
//! 6. A 15-field ':'-delimited UDP message per face per frame
//!
//! Each face gets its own track with isolated filter state.
//!
//! # Examples
//!
//! ## Processing Frames
//!
//! ```no_run
//! use head_pose_telemetry::{
//!     config::Config,
//!     pipeline::{FaceOutcome, Pipeline},
//!     source::{FrameSource, ReplaySource},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let mut source = ReplaySource::open("recording.jsonl")?;
//! let mut pipeline = Pipeline::new(&config);
//!
//! while let Some(frame) = source.read()? {
//!     for result in pipeline.process_frame(&frame.faces, source.frame_size())? {
//!         if let FaceOutcome::Telemetry(telemetry) = result.outcome {
//!             println!("{}", telemetry.encode()?);
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Decoding Telemetry
//!
//! ```
//! use head_pose_telemetry::telemetry::TelemetryFrame;
//!
//! let frame: TelemetryFrame = "10:-5:1800:0:1:0:0:0.1:0.1:0.05:0.4:0.03:0.03:0.02:0.02"
//!     .parse()
//!     .unwrap();
//! assert_eq!(frame.quaternion.x, 1.0);
//! assert_eq!(frame.metrics.mouth_length, 0.4);
//! ```

/// Fixed-size 68-point landmark sets
pub mod landmarks;

/// Landmark stabilization filters
pub mod filters;

/// Normalized facial expression metrics
pub mod metrics;

/// Perspective-n-Point solvers
pub mod pnp;

/// Head pose estimation from landmark anchors
pub mod pose_estimation;

/// Axis-angle to quaternion conversion
pub mod rotation;

/// Telemetry wire format and transport
pub mod telemetry;

/// Per-face track management
pub mod tracker;

/// Per-frame processing pipeline
pub mod pipeline;

/// Frame sources and landmark detectors
pub mod source;

/// Error types and result handling
pub mod error;

/// Main application module
pub mod app;

/// Constants used throughout the application
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
