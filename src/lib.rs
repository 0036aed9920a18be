#[cfg(test)]
#[macro_use]
extern crate approx;

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

pub mod analyzer;
pub mod beatroot;
pub mod config;
pub mod error;

pub use analyzer::BeatDetector;
pub use beatroot::{BeatTrack, BeatTracker, Event, EventList};
pub use config::AgentParameters;
pub use error::{Error, Result};

use wasm_bindgen::prelude::wasm_bindgen;

fn analyze(features: &[f64], hop_time: f64) -> BeatTrack {
    let mut detector = BeatDetector::new(hop_time, AgentParameters::default());
    detector.process_features(features);
    detector.finalize()
}

/// Tracks the beats in an onset detection function sampled every `hop_time` seconds, returning
/// the beat times in seconds.
#[wasm_bindgen]
pub fn track_beats(features: &[f64], hop_time: f64) -> Vec<f64> {
    analyze(features, hop_time).beat_times()
}

/// Like [`track_beats`], but returns the tempo in beats per minute, or 0 if no beats were found.
#[wasm_bindgen]
pub fn detect_bpm(features: &[f64], hop_time: f64) -> f64 {
    analyze(features, hop_time).bpm().unwrap_or(0.0)
}
