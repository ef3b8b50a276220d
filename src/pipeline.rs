//! Per-frame processing: raw landmarks in, telemetry frames out.
//!
//! For each face: track association, stabilization, metric extraction,
//! pose recovery and quaternion encoding. Faces that cannot produce a
//! trustworthy message are reported as skipped with the reason.

use crate::{
    config::Config,
    landmarks::LandmarkSet,
    metrics::extract_metrics,
    pose_estimation::PoseEstimator,
    rotation::Quaternion,
    source::FrameSize,
    telemetry::TelemetryFrame,
    tracker::{TrackId, TrackManager},
    Error, Result,
};

/// What became of one detected face
#[derive(Debug)]
pub enum FaceOutcome {
    /// Ready to send
    Telemetry(TelemetryFrame),
    /// No message this frame
    Skipped(Error),
}

/// Result for one detected face, in detection order
#[derive(Debug)]
pub struct FaceResult {
    /// Owning track, `None` if the face was never tracked
    pub track: Option<TrackId>,
    pub outcome: FaceOutcome,
}

/// Landmark-to-telemetry pipeline state for a stream of frames
pub struct Pipeline {
    config: Config,
    tracks: TrackManager,
    estimator: Option<PoseEstimator>,
}

impl Pipeline {
    /// Create a pipeline; the pose estimator is built on the first frame
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            tracks: TrackManager::new(&config.tracking, &config.filter),
            estimator: None,
        }
    }

    /// Live face tracks
    #[must_use]
    pub fn tracks(&self) -> &TrackManager {
        &self.tracks
    }

    /// Pose estimator, once the first frame has fixed the intrinsics
    #[must_use]
    pub fn estimator(&self) -> Option<&PoseEstimator> {
        self.estimator.as_ref()
    }

    /// Build the pose estimator from the first known frame size
    fn ensure_estimator(&mut self, size: Option<FrameSize>) -> Result<&PoseEstimator> {
        if self.estimator.is_none() {
            let size = size.unwrap_or(FrameSize {
                width: self.config.camera.width,
                height: self.config.camera.height,
            });
            self.estimator = Some(PoseEstimator::from_config(&self.config.pose, size.width, size.height)?);
        }
        self.estimator
            .as_ref()
            .ok_or_else(|| Error::ConfigError("Pose estimator unavailable".to_string()))
    }

    /// Process the faces of one frame
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the pose estimator cannot be built; per-face
    /// failures are reported in the returned results instead
    pub fn process_frame(&mut self, faces: &[LandmarkSet], size: Option<FrameSize>) -> Result<Vec<FaceResult>> {
        self.ensure_estimator(size)?;

        // Non-finite detections would poison the filter state of whatever track they join
        let finite: Vec<usize> = (0..faces.len()).filter(|&i| faces[i].is_finite()).collect();
        let finite_faces: Vec<LandmarkSet> = finite.iter().map(|&i| faces[i].clone()).collect();
        let assignment = self.tracks.associate(&finite_faces);

        let mut track_of = vec![None; faces.len()];
        for (&index, track) in finite.iter().zip(assignment) {
            track_of[index] = track;
        }

        let mut results = Vec::with_capacity(faces.len());
        for (face, track) in faces.iter().zip(track_of) {
            let outcome = if !face.is_finite() {
                FaceOutcome::Skipped(Error::DegenerateGeometry("Non-finite landmarks".to_string()))
            } else if let Some(id) = track {
                match self.process_face(id, face) {
                    Ok(frame) => FaceOutcome::Telemetry(frame),
                    Err(e) => FaceOutcome::Skipped(e),
                }
            } else {
                FaceOutcome::Skipped(Error::InvalidInput("No free track for face".to_string()))
            };
            results.push(FaceResult { track, outcome });
        }
        Ok(results)
    }

    fn process_face(&mut self, id: TrackId, raw: &LandmarkSet) -> Result<TelemetryFrame> {
        let track = self
            .tracks
            .track_mut(id)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown track {id}")))?;
        let smoothed = track.stabilize(raw)?;

        let metrics = extract_metrics(&smoothed)?;

        let estimator = self
            .estimator
            .as_ref()
            .ok_or_else(|| Error::ConfigError("Pose estimator unavailable".to_string()))?;
        let pose = estimator.estimate(&smoothed);
        if !pose.success {
            return Err(Error::PoseSolveFailure(format!(
                "Track {id}: no acceptable pose (reprojection error {:.2}px)",
                pose.reprojection_error
            )));
        }

        let quaternion = Quaternion::from_rotation_vector(&pose.rotation);
        log::debug!(
            "Track {id}: t=({:.1}, {:.1}, {:.1}) q=({:.4}, {:.4}, {:.4}, {:.4}) err={:.2}px",
            pose.translation.x,
            pose.translation.y,
            pose.translation.z,
            quaternion.w,
            quaternion.x,
            quaternion.y,
            quaternion.z,
            pose.reprojection_error
        );
        Ok(TelemetryFrame::new(&pose.translation, &quaternion, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    #[test]
    fn test_estimator_uses_first_frame_size() {
        let mut pipeline = Pipeline::new(&Config::default());
        assert!(pipeline.estimator().is_none());
        pipeline
            .process_frame(&[], Some(FrameSize { width: 1280, height: 720 }))
            .unwrap();
        assert_eq!(pipeline.estimator().unwrap().intrinsics().focal_x, 1280.0);
        // Later sizes do not rebuild the intrinsics
        pipeline
            .process_frame(&[], Some(FrameSize { width: 320, height: 240 }))
            .unwrap();
        assert_eq!(pipeline.estimator().unwrap().intrinsics().focal_x, 1280.0);
    }

    #[test]
    fn test_estimator_falls_back_to_camera_config() {
        let mut pipeline = Pipeline::new(&Config::default());
        pipeline.process_frame(&[], None).unwrap();
        assert_eq!(pipeline.estimator().unwrap().intrinsics().center_x, 320.0);
    }

    #[test]
    fn test_non_finite_face_is_skipped_untracked() {
        let mut pipeline = Pipeline::new(&Config::default());
        let mut points = vec![Point2::new(1.0, 1.0); 68];
        points[5].x = f64::NAN;
        let results = pipeline.process_frame(&[LandmarkSet::new(points).unwrap()], None).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].track.is_none());
        assert!(matches!(
            results[0].outcome,
            FaceOutcome::Skipped(Error::DegenerateGeometry(_))
        ));
        assert!(pipeline.tracks().is_empty());
    }

    #[test]
    fn test_collapsed_face_is_degenerate() {
        let mut pipeline = Pipeline::new(&Config::default());
        let results = pipeline.process_frame(&[LandmarkSet::zeros()], None).unwrap();
        assert_eq!(results[0].track, Some(0));
        assert!(matches!(
            results[0].outcome,
            FaceOutcome::Skipped(Error::DegenerateGeometry(_))
        ));
    }
}
