//! Frame sources and landmark detectors.
//!
//! The pipeline pulls frames from a [`FrameSource`] and asks a
//! [`LandmarkDetector`] for face regions and their 68-point landmarks. The
//! built-in sources deliver frames whose landmarks were already detected
//! upstream, so [`PreDetected`] simply enumerates and looks them up.

/// `OpenSeeFace` UDP receiver
pub mod osf;

/// JSON-lines recording playback
pub mod replay;

use crate::{
    config::{SourceConfig, SourceKind},
    landmarks::LandmarkSet,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use osf::OsfSource;
pub use replay::ReplaySource;

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// A frame whose faces have already been reduced to landmark sets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkFrame {
    pub faces: Vec<LandmarkSet>,
    pub size: Option<FrameSize>,
}

/// Blocking producer of frames
pub trait FrameSource {
    type Frame;

    /// Pull the next frame; `Ok(None)` at end of stream
    ///
    /// # Errors
    ///
    /// Returns `Capture` if the source fails
    fn read(&mut self) -> Result<Option<Self::Frame>>;

    /// Last known frame size
    fn frame_size(&self) -> Option<FrameSize>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    type Frame = S::Frame;

    fn read(&mut self) -> Result<Option<Self::Frame>> {
        (**self).read()
    }

    fn frame_size(&self) -> Option<FrameSize> {
        (**self).frame_size()
    }
}

/// Face localisation and landmark regression over frames of type `F`
pub trait LandmarkDetector<F> {
    type Region;

    /// Find face regions in a frame
    ///
    /// # Errors
    ///
    /// Returns an error if detection fails
    fn detect(&mut self, frame: &F) -> Result<Vec<Self::Region>>;

    /// Regress the landmarks of one detected region
    ///
    /// # Errors
    ///
    /// Returns an error if the region does not belong to the frame
    fn predict(&mut self, frame: &F, region: &Self::Region) -> Result<LandmarkSet>;
}

/// Detector for frames that already carry landmark sets
#[derive(Debug, Clone, Copy, Default)]
pub struct PreDetected;

impl LandmarkDetector<LandmarkFrame> for PreDetected {
    type Region = usize;

    fn detect(&mut self, frame: &LandmarkFrame) -> Result<Vec<usize>> {
        Ok((0..frame.faces.len()).collect())
    }

    fn predict(&mut self, frame: &LandmarkFrame, region: &usize) -> Result<LandmarkSet> {
        frame.faces.get(*region).cloned().ok_or_else(|| {
            Error::InvalidInput(format!(
                "Face {region} out of range for frame with {} faces",
                frame.faces.len()
            ))
        })
    }
}

/// Open the configured landmark source
///
/// # Errors
///
/// Returns `ConfigError` if a replay source has no path, or the underlying
/// open error
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource<Frame = LandmarkFrame>>> {
    match config.kind {
        SourceKind::Replay => {
            let path = config
                .replay_path
                .as_ref()
                .ok_or_else(|| Error::ConfigError("Replay source needs a replay_path".to_string()))?;
            Ok(Box::new(ReplaySource::open(path)?))
        }
        SourceKind::Osf => Ok(Box::new(OsfSource::bind(
            &config.osf_bind,
            Duration::from_millis(config.osf_timeout_ms),
        )?)),
    }
}
