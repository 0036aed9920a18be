use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::debug;

use crate::config::AgentParameters;

use super::agent::Agent;
use super::agent_list::AgentList;
use super::event::{Event, EventList};
use super::induction;

/// The outcome of beat tracking. `beats` is empty if no tempo hypothesis survived.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BeatTrack {
    /// The beats of the best agent, with gaps interpolated.
    pub beats: EventList,

    /// The beats of the best agent as tracked, before interpolation.
    pub unfilled: EventList,

    /// Final beat period of the best agent, in seconds.
    pub beat_interval: Option<f64>,

    /// Tracking was interrupted before all events were considered.
    pub interrupted: bool,
}

impl BeatTrack {
    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    pub fn beat_times(&self) -> Vec<f64> {
        self.beats.iter().map(|b| b.time).collect()
    }

    /// The mean tempo of the beat track in beats per minute.
    pub fn bpm(&self) -> Option<f64> {
        match (self.beats.first(), self.beats.last()) {
            (Some(first), Some(last)) if self.beats.len() > 1 && last.time > first.time => {
                Some(60.0 * (self.beats.len() - 1) as f64 / (last.time - first.time))
            }
            _ => None,
        }
    }
}

/// Runs tempo induction and beat tracking over a list of onsets.
#[derive(Clone, Debug, Default)]
pub struct BeatTracker {
    params: AgentParameters,
    stop: Option<f64>,
    interrupt: Option<Arc<AtomicBool>>,
}

impl BeatTracker {
    pub fn new(params: AgentParameters) -> Self {
        BeatTracker {
            params,
            stop: None,
            interrupt: None,
        }
    }

    /// Do not find beats after `stop` seconds.
    pub fn with_stop_time(mut self, stop: f64) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Stop tracking early once `flag` is set. The best beats found so far are still returned.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Creates the agents that tracking starts from.
    ///
    /// With at least two `seed_beats`, their mean spacing is taken as the tempo and induction is
    /// skipped. Otherwise the tempo is induced from `events`. Either way, every agent starts out
    /// with the seed beats as its beat history.
    fn seed_agents(&self, events: &[Event], seed_beats: &[Event]) -> AgentList {
        let count = seed_beats.len().saturating_sub(1);
        let mut agents = match (seed_beats.first(), seed_beats.last()) {
            (Some(first), Some(last)) if count > 0 => {
                let ibi = (last.time - first.time) / count as f64;
                debug!("tempo given by {} beats: interval {:.4}s", seed_beats.len(), ibi);
                let mut agents = AgentList::new();
                let id = agents.next_id();
                agents.push(Agent::new(self.params, ibi, id));
                agents
            }
            _ => induction::beat_induction(&self.params, events),
        };

        if let Some(last) = seed_beats.last() {
            for agent in agents.iter_mut() {
                agent.beat_time = last.time;
                agent.beat_count = count as i64;
                agent.events = seed_beats.to_vec();
            }
        }

        agents
    }

    /// Tracks beats through `events`, which must be in time order.
    pub fn beat_track(&self, events: &[Event]) -> BeatTrack {
        self.beat_track_from(events, &[])
    }

    /// Tracks beats through `events`, continuing from the given initial beats.
    pub fn beat_track_from(&self, events: &[Event], seed_beats: &[Event]) -> BeatTrack {
        let mut agents = self.seed_agents(events, seed_beats);
        let completed = agents.beat_track(events, self.stop, self.interrupt.as_deref());

        let Some(mut best) = agents.into_best_agent() else {
            return BeatTrack {
                interrupted: !completed,
                ..Default::default()
            };
        };

        let unfilled = best.events.clone();
        best.fill_beats(seed_beats.last().map_or(-1.0, |b| b.time));

        BeatTrack {
            beats: best.events,
            unfilled,
            beat_interval: Some(best.beat_interval),
            interrupted: !completed,
        }
    }
}
