//! Per-face track management.
//!
//! Every face track owns its own stabilizer so filter state never leaks
//! between faces. Detections are associated with tracks by greedy
//! nearest-centroid matching.

use crate::{
    config::{FilterConfig, TrackingConfig},
    filters::LandmarkStabilizer,
    landmarks::LandmarkSet,
    Result,
};
use nalgebra::Point2;

/// Identifier of a face track, unique for the manager's lifetime
pub type TrackId = u64;

/// One face followed across frames
pub struct Track {
    id: TrackId,
    stabilizer: LandmarkStabilizer,
    centroid: Point2<f64>,
    width: f64,
    missed: u32,
    age: u64,
}

impl Track {
    fn new(id: TrackId, landmarks: &LandmarkSet, filter: &FilterConfig) -> Self {
        Self {
            id,
            stabilizer: LandmarkStabilizer::from_config(filter),
            centroid: landmarks.centroid(),
            width: landmarks.width(),
            missed: 0,
            age: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> TrackId {
        self.id
    }

    /// Centroid of the last associated raw detection
    #[must_use]
    pub fn centroid(&self) -> Point2<f64> {
        self.centroid
    }

    /// Consecutive frames without a matching detection
    #[must_use]
    pub fn missed(&self) -> u32 {
        self.missed
    }

    /// Number of detections stabilized so far
    #[must_use]
    pub fn age(&self) -> u64 {
        self.age
    }

    /// Run a detection through this track's filter chain
    ///
    /// # Errors
    ///
    /// Returns the first filter stage error
    pub fn stabilize(&mut self, landmarks: &LandmarkSet) -> Result<LandmarkSet> {
        self.age += 1;
        self.stabilizer.apply(landmarks)
    }

    fn observe(&mut self, landmarks: &LandmarkSet) {
        self.centroid = landmarks.centroid();
        self.width = landmarks.width();
        self.missed = 0;
    }
}

/// Owns all live face tracks
pub struct TrackManager {
    tracking: TrackingConfig,
    filter: FilterConfig,
    tracks: Vec<Track>,
    next_id: TrackId,
}

impl TrackManager {
    #[must_use]
    pub fn new(tracking: &TrackingConfig, filter: &FilterConfig) -> Self {
        log::info!(
            "Initializing TrackManager (max {} tracks, eviction after {} missed frames)",
            tracking.max_tracks,
            tracking.max_missed_frames
        );
        Self {
            tracking: tracking.clone(),
            filter: filter.clone(),
            tracks: Vec::new(),
            next_id: 0,
        }
    }

    /// Number of live tracks
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Ids of live tracks in creation order
    #[must_use]
    pub fn ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(Track::id).collect()
    }

    /// Look up a live track
    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|track| track.id == id)
    }

    /// Associate this frame's detections with tracks
    ///
    /// Returns one entry per face: the id of the track that now owns it, or
    /// `None` if the face matched nothing and every track slot is taken.
    /// Tracks left unmatched for too long are evicted before new ones are
    /// created.
    pub fn associate(&mut self, faces: &[LandmarkSet]) -> Vec<Option<TrackId>> {
        let centroids: Vec<Point2<f64>> = faces.iter().map(LandmarkSet::centroid).collect();

        let mut candidates = Vec::new();
        for (t, track) in self.tracks.iter().enumerate() {
            let gate = self.tracking.max_match_distance * track.width;
            for (f, centroid) in centroids.iter().enumerate() {
                let distance = nalgebra::distance(&track.centroid, centroid);
                if distance.is_finite() && distance <= gate {
                    candidates.push((distance, t, f));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut assignment: Vec<Option<TrackId>> = vec![None; faces.len()];
        let mut track_taken = vec![false; self.tracks.len()];
        for (_, t, f) in candidates {
            if track_taken[t] || assignment[f].is_some() {
                continue;
            }
            track_taken[t] = true;
            self.tracks[t].observe(&faces[f]);
            assignment[f] = Some(self.tracks[t].id);
        }

        for (track, taken) in self.tracks.iter_mut().zip(&track_taken) {
            if !taken {
                track.missed += 1;
            }
        }
        let limit = self.tracking.max_missed_frames;
        self.tracks.retain(|track| {
            let keep = track.missed <= limit;
            if !keep {
                log::info!("Dropping track {} after {} missed frames", track.id, track.missed);
            }
            keep
        });

        for (f, face) in faces.iter().enumerate() {
            if assignment[f].is_some() {
                continue;
            }
            if self.tracks.len() >= self.tracking.max_tracks {
                log::debug!("No free track for face {f}");
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            self.tracks.push(Track::new(id, face, &self.filter));
            log::info!("Started track {id}");
            assignment[f] = Some(id);
        }

        assignment
    }

    /// Drop every track
    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}
