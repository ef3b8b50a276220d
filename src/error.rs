//! Error types for the head pose telemetry library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[cfg(feature = "opencv")]
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Recorded landmark data could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Landmark geometry collapsed (reference distance or rotation angle below epsilon)
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// The `PnP` solver did not produce a usable pose
    #[error("Pose solve failure: {0}")]
    PoseSolveFailure(String),

    /// Filter initialization or processing error
    #[error("Filter error: {0}")]
    FilterError(String),

    /// Telemetry datagram could not be sent
    #[error("Transport error: {0}")]
    Transport(String),

    /// Frame source exhausted or unreadable
    #[error("Capture error: {0}")]
    Capture(String),

    /// Malformed tracker packet or telemetry message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
