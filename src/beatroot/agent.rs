use crate::config::AgentParameters;

use super::agent_list::AgentList;
use super::event::{Event, EventList};
use super::math;

/// A single tempo and phase hypothesis.
///
/// Each agent has a beat period, a history of tracked beats, and a score evaluating the
/// continuity, regularity and salience of its beat track. A negative `phase_score` marks the
/// agent as dead; it is removed from its [`AgentList`] on the next duplicate sweep.
#[derive(Clone, Debug)]
pub struct Agent {
    /// Unique within the `AgentList` that created it. Only used to tell agents apart in logs.
    pub id: usize,

    /// The size of the outer half-window before the predicted beat time.
    pub pre_margin: f64,

    /// The size of the outer half-window after the predicted beat time.
    pub post_margin: f64,

    /// Always zero for offline tracking.
    pub tempo_score: f64,

    /// Sum of salience values of the events interpreted as beats by this agent, weighted by
    /// their nearness to the predicted beat times.
    pub phase_score: f64,

    /// How long this agent has been the best. Only carried over by duplicate removal.
    pub top_score_time: f64,

    /// The number of beats found by this agent, including interpolated beats.
    pub beat_count: i64,

    /// The current tempo hypothesis, as a beat period in seconds.
    pub beat_interval: f64,

    /// The tempo hypothesis this agent was created with.
    pub initial_beat_interval: f64,

    /// The time of the most recent accepted beat, or negative before the first one.
    pub beat_time: f64,

    /// Events accepted as beats, plus interpolated beats after `fill_beats`.
    pub events: EventList,

    params: AgentParameters,
}

impl Agent {
    /// A fresh hypothesis with beat period `ibi` and no beats.
    pub fn new(params: AgentParameters, ibi: f64, id: usize) -> Self {
        Agent {
            id,
            pre_margin: params.pre_margin(ibi),
            post_margin: params.post_margin(ibi),
            tempo_score: 0.0,
            phase_score: 0.0,
            top_score_time: 0.0,
            beat_count: 0,
            beat_interval: ibi,
            initial_beat_interval: ibi,
            beat_time: -1.0,
            events: EventList::new(),
            params,
        }
    }

    /// An independent copy of this agent, including its beat history, under a new id.
    pub fn fork(&self, id: usize) -> Self {
        Agent { id, ..self.clone() }
    }

    pub fn params(&self) -> &AgentParameters {
        &self.params
    }

    pub fn is_expired(&self) -> bool {
        self.phase_score < 0.0
    }

    /// Marks the agent for removal.
    pub fn kill(&mut self) {
        self.phase_score = -1.0;
    }

    /// Accept `e` as a beat and update the state of the agent accordingly.
    ///
    /// `err` is the difference between the predicted and actual beat times, `beats` the number
    /// of beat periods since the last accepted beat.
    pub fn accept(&mut self, e: Event, err: f64, beats: i64) {
        self.beat_time = e.time;
        self.events.push(e);

        let correction = err / self.params.correction_factor;
        if (self.initial_beat_interval - self.beat_interval - correction).abs()
            < self.params.max_change * self.initial_beat_interval
        {
            self.beat_interval += correction;
        }
        self.beat_count += beats;

        let con_factor = 1.0
            - self.params.conf_factor * err
                / if err > 0.0 {
                    self.post_margin
                } else {
                    -self.pre_margin
                };

        if self.params.decay_factor > 0.0 {
            let mem_factor =
                1.0 - 1.0 / math::threshold(self.beat_count as f64, 1.0, self.params.decay_factor);
            self.phase_score =
                mem_factor * self.phase_score + (1.0 - mem_factor) * con_factor * e.salience;
        } else {
            self.phase_score += con_factor * e.salience;
        }
    }

    /// Tests `e` as a possible beat time. One of the following happens:
    ///
    /// 1. The agent has no beats yet; the event is accepted as the first beat.
    /// 2. The event is more than `expiry_time` after the last accepted beat; the agent is
    ///    killed.
    /// 3. The event is within the inner margin of a predicted beat; it is accepted.
    /// 4. The event is within the outer margins of a predicted beat; it is accepted, and a copy
    ///    of this agent which does not accept it is added to `agents` (this avoids committing to
    ///    a large phase jump).
    /// 5. The event lies outside the windows around every predicted beat and is ignored.
    ///
    /// Returns whether the event was accepted as a beat by this agent.
    pub fn consider_as_beat(&mut self, e: &Event, agents: &mut AgentList) -> bool {
        if self.beat_time < 0.0 {
            self.accept(*e, 0.0, 1);
            return true;
        }

        if let Some(last) = self.events.last() {
            if e.time - last.time > self.params.expiry_time {
                self.kill();
                return false;
            }
        }

        let beats = math::nearbyint((e.time - self.beat_time) / self.beat_interval);
        let err = e.time - self.beat_time - beats * self.beat_interval;
        if beats > 0.0 && -self.pre_margin <= err && err <= self.post_margin {
            let Some(beats) = math::round_to_count(beats) else {
                return false;
            };
            if err.abs() > self.params.inner_margin {
                let id = agents.next_id();
                agents.add(self.fork(id));
            }
            self.accept(*e, err, beats);
            return true;
        }

        false
    }

    /// Interpolates missing beats in the beat track.
    ///
    /// Wherever two consecutive beats are more than one beat period apart, the gap is split
    /// into evenly spaced beats. When in doubt, fewer beats are inserted. Interpolated beats
    /// at or before `start` are skipped, so beats that were given up front stay as they are.
    pub fn fill_beats(&mut self, start: f64) {
        if self.events.len() < 2 {
            return;
        }

        let mut filled = EventList::with_capacity(self.events.len());
        let mut prev_beat = self.events[0].time;
        filled.push(self.events[0]);

        for next in &self.events[1..] {
            let next_beat = next.time;
            let beats = math::round_to_count((next_beat - prev_beat) / self.beat_interval - 0.01)
                .unwrap_or(0);
            if beats > 1 {
                let current_interval = (next_beat - prev_beat) / beats as f64;
                for i in 1..beats {
                    let time = prev_beat + i as f64 * current_interval;
                    if time > start {
                        filled.push(Event::beat(time, 0));
                    }
                }
            }
            filled.push(*next);
            prev_beat = next_beat;
        }

        self.events = filled;
    }
}
