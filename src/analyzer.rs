mod beats;

pub use beats::BeatDetector;
