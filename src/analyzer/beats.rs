use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::beatroot::{event, peaks};
use crate::beatroot::{BeatTrack, BeatTracker, EventList};
use crate::config::AgentParameters;

/// Accumulates an onset detection function frame by frame, then tracks the beats in it.
pub struct BeatDetector {
    hop_time: f64,
    tracker: BeatTracker,
    seed_beats: EventList,

    features: Vec<f64>,
    processed_frame_count: u64,
}

impl BeatDetector {
    /// `hop_time` is the time in seconds between successive detection function frames.
    pub fn new(hop_time: f64, params: AgentParameters) -> Self {
        BeatDetector::with_tracker(hop_time, BeatTracker::new(params))
    }

    pub fn with_tracker(hop_time: f64, tracker: BeatTracker) -> Self {
        BeatDetector {
            hop_time,
            tracker,
            seed_beats: Vec::new(),

            features: Vec::new(),
            processed_frame_count: 0,
        }
    }

    /// Do not find beats after `stop` seconds.
    pub fn set_stop_time(&mut self, stop: f64) {
        self.tracker = self.tracker.clone().with_stop_time(stop);
    }

    /// `finalize` returns early once `flag` is set.
    pub fn set_interrupt(&mut self, flag: Arc<AtomicBool>) {
        self.tracker = self.tracker.clone().with_interrupt(flag);
    }

    /// Beats already known, in seconds. Tracking continues from the last of them.
    pub fn set_seed_beats(&mut self, times: &[f64]) {
        self.seed_beats = event::beats_at(times);
    }

    pub fn process_features(&mut self, features: &[f64]) {
        self.features.extend_from_slice(features);
        self.processed_frame_count += features.len() as u64;
    }

    /// The onsets picked from the frames processed so far.
    pub fn onsets(&self) -> EventList {
        peaks::onsets_from_features(&self.features, self.hop_time)
    }

    pub fn finalize(&mut self) -> BeatTrack {
        let onsets = self.onsets();
        debug!(
            "{} onsets in {} frames",
            onsets.len(),
            self.processed_frame_count
        );
        self.tracker.beat_track_from(&onsets, &self.seed_beats)
    }

    pub fn processed_frames(&self) -> u64 {
        self.processed_frame_count
    }

    pub fn processed_frames_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.processed_frame_count as f64 * self.hop_time)
            .unwrap_or_default()
    }
}
