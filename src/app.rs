//! Main application loop: pull frames, run the pipeline, send telemetry.

use crate::{
    config::Config,
    error::Result,
    pipeline::{FaceOutcome, FaceResult, Pipeline},
    source::{FrameSource, LandmarkDetector},
    telemetry::TelemetrySink,
    Error,
};
use log::{debug, info, warn};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Interval between statistics log lines
const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames: u64,
    pub faces: u64,
    pub sent: u64,
    /// Faces whose pose could not be solved
    pub pose_failures: u64,
    /// Faces skipped for degenerate geometry or filter failure
    pub degenerate: u64,
    /// Faces left without a track slot
    pub untracked: u64,
    pub transport_errors: u64,
}

impl RunStats {
    fn record(&mut self, result: &FaceResult) {
        match &result.outcome {
            FaceOutcome::Telemetry(_) => {}
            FaceOutcome::Skipped(Error::PoseSolveFailure(_)) => self.pose_failures += 1,
            FaceOutcome::Skipped(Error::DegenerateGeometry(_)) => self.degenerate += 1,
            FaceOutcome::Skipped(_) if result.track.is_none() => self.untracked += 1,
            FaceOutcome::Skipped(_) => self.degenerate += 1,
        }
    }
}

/// Frame-driven telemetry application
pub struct TelemetryApp<S, D, K>
where
    S: FrameSource,
    D: LandmarkDetector<S::Frame>,
    K: TelemetrySink,
{
    source: S,
    detector: D,
    sink: K,
    pipeline: Pipeline,
    stop: Arc<AtomicBool>,
    stats: RunStats,
}

impl<S, D, K> TelemetryApp<S, D, K>
where
    S: FrameSource,
    D: LandmarkDetector<S::Frame>,
    K: TelemetrySink,
{
    /// Create the application around its collaborators
    pub fn new(config: &Config, source: S, detector: D, sink: K) -> Self {
        info!("Initializing head pose telemetry application");
        Self {
            source,
            detector,
            sink,
            pipeline: Pipeline::new(config),
            stop: Arc::new(AtomicBool::new(false)),
            stats: RunStats::default(),
        }
    }

    /// Share an externally owned stop flag
    #[must_use]
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Flag that ends the loop before the next frame when set
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    #[must_use]
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Telemetry sink, e.g. to inspect what was sent
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Run until end of stream or cancellation
    ///
    /// # Errors
    ///
    /// Returns the first capture or detection error; transport errors are
    /// logged and counted only
    pub fn run(&mut self) -> Result<RunStats> {
        info!("Starting main application loop");
        let start_time = Instant::now();
        let mut last_report = Instant::now();

        while !self.stop.load(Ordering::Relaxed) {
            if !self.step()? {
                info!("End of stream reached");
                break;
            }

            if last_report.elapsed() >= STATS_INTERVAL {
                self.log_stats(start_time.elapsed());
                last_report = Instant::now();
            }
        }

        if self.stop.load(Ordering::Relaxed) {
            info!("Stop requested");
        }
        self.log_stats(start_time.elapsed());
        info!("Application shutting down");
        Ok(self.stats)
    }

    /// Process one frame; `Ok(false)` at end of stream
    ///
    /// # Errors
    ///
    /// Returns the source or detector error
    pub fn step(&mut self) -> Result<bool> {
        let Some(frame) = self.source.read()? else {
            return Ok(false);
        };
        self.stats.frames += 1;

        let regions = self.detector.detect(&frame)?;
        let mut faces = Vec::with_capacity(regions.len());
        for region in &regions {
            match self.detector.predict(&frame, region) {
                Ok(landmarks) => faces.push(landmarks),
                Err(e) => warn!("Landmark prediction failed: {e}"),
            }
        }
        self.stats.faces += faces.len() as u64;

        let results = self.pipeline.process_frame(&faces, self.source.frame_size())?;
        for result in results {
            self.stats.record(&result);
            match result.outcome {
                FaceOutcome::Telemetry(telemetry) => match telemetry.encode() {
                    Ok(message) => self.send(&message),
                    Err(e) => {
                        self.stats.degenerate += 1;
                        warn!("Dropping telemetry: {e}");
                    }
                },
                FaceOutcome::Skipped(reason) => debug!("Skipping face (track {:?}): {reason}", result.track),
            }
        }
        Ok(true)
    }

    fn send(&mut self, message: &str) {
        match self.sink.send(message) {
            Ok(()) => self.stats.sent += 1,
            Err(e) => {
                self.stats.transport_errors += 1;
                warn!("{e}");
            }
        }
    }

    fn log_stats(&self, elapsed: Duration) {
        let seconds = elapsed.as_secs_f64();
        let fps = if seconds > 0.0 {
            self.stats.frames as f64 / seconds
        } else {
            0.0
        };
        info!(
            "frames={} faces={} sent={} pose_failures={} degenerate={} untracked={} transport_errors={} tracks={} fps={:.1}",
            self.stats.frames,
            self.stats.faces,
            self.stats.sent,
            self.stats.pose_failures,
            self.stats.degenerate,
            self.stats.untracked,
            self.stats.transport_errors,
            self.pipeline.tracks().len(),
            fps
        );
    }
}
