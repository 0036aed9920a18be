//! Multi-agent beat tracking after Dixon's BeatRoot.

pub mod agent;
pub mod agent_list;
pub mod beat_tracker;
pub mod event;
pub mod induction;
pub mod math;
pub mod peaks;

pub use beat_tracker::{BeatTrack, BeatTracker};
pub use event::{Event, EventList};
