use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace, warn};

use super::agent::Agent;
use super::event::Event;

/// Events earlier than this (in seconds) may start new phase hypotheses for tempi whose agents
/// all rejected them.
const PHASE_SEARCH_TIME: f64 = 5.0;

/// The set of all agents involved in beat tracking a piece of music.
#[derive(Debug, Default)]
pub struct AgentList {
    list: Vec<Agent>,
    next_id: usize,
}

impl AgentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id for a new agent.
    pub fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Agent> {
        self.list.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Agent> {
        self.list.iter_mut()
    }

    /// Inserts `agent` in ascending order of beat interval, after any agents with the same
    /// interval.
    pub fn add(&mut self, agent: Agent) {
        let at = self
            .list
            .partition_point(|a| a.beat_interval <= agent.beat_interval);
        self.list.insert(at, agent);
    }

    /// Appends `agent` without regard to ordering.
    pub fn push(&mut self, agent: Agent) {
        self.list.push(agent);
    }

    /// Sorts by increasing beat interval. Agents with equal intervals keep their order.
    pub fn sort(&mut self) {
        self.list
            .sort_by(|a, b| a.beat_interval.total_cmp(&b.beat_interval));
    }

    /// Removes agents which duplicate another agent, i.e. those within `duplicate_interval` in
    /// beat period and `duplicate_phase` in beat time of a better scoring one. Of two agents with
    /// equal scores the earlier one (in beat interval order) is kept. Agents already marked for
    /// removal are dropped as well.
    pub fn remove_duplicates(&mut self) {
        self.sort();

        let len = self.list.len();
        for i in 0..len {
            if self.list[i].is_expired() {
                continue;
            }
            for j in i + 1..len {
                let (head, tail) = self.list.split_at_mut(j);
                let (a, b) = (&mut head[i], &mut tail[0]);

                let params = a.params();
                if b.beat_interval - a.beat_interval > params.duplicate_interval {
                    break;
                }
                if (a.beat_time - b.beat_time).abs() > params.duplicate_phase {
                    continue;
                }
                if a.phase_score < b.phase_score {
                    a.kill();
                    if b.top_score_time < a.top_score_time {
                        b.top_score_time = a.top_score_time;
                    }
                    break;
                } else {
                    b.kill();
                    if a.top_score_time < b.top_score_time {
                        a.top_score_time = b.top_score_time;
                    }
                }
            }
        }

        self.list.retain(|a| !a.is_expired());
        let removed = len - self.list.len();
        if removed > 0 {
            debug!(
                "removed {} duplicate or expired agent(s), {} remaining",
                removed,
                self.list.len()
            );
        }
    }

    /// Performs beat tracking on a list of events (onsets).
    ///
    /// Events after `stop` seconds are not considered. `interrupt` is checked once per event;
    /// when raised, tracking stops and the agents are left as they are.
    ///
    /// Returns `false` if tracking was interrupted.
    pub fn beat_track(
        &mut self,
        events: &[Event],
        stop: Option<f64>,
        interrupt: Option<&AtomicBool>,
    ) -> bool {
        // If the phase is given for one agent, assume it is given for all of them.
        let phase_given = self.list.first().is_some_and(|a| a.beat_time >= 0.0);

        for ev in events {
            if stop.is_some_and(|stop| ev.time > stop) {
                break;
            }
            if interrupt.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                warn!("beat tracking interrupted at {:.3}s", ev.time);
                return false;
            }

            // Agents forked while scanning go straight into the live list, so they don't see
            // this event twice.
            let mut current_agents = std::mem::take(&mut self.list);
            current_agents.sort_by(|a, b| a.beat_interval.total_cmp(&b.beat_interval));

            let mut created = phase_given;
            let mut prev_beat_interval = -1.0;
            for mut agent in current_agents {
                if agent.beat_interval != prev_beat_interval {
                    if prev_beat_interval >= 0.0 && !created && ev.time < PHASE_SEARCH_TIME {
                        // No agent at the previous tempo took this event; try it as a new phase.
                        let id = self.next_id();
                        let mut new_agent = Agent::new(*agent.params(), prev_beat_interval, id);
                        trace!(
                            "new phase agent #{} at {:.3}s, interval {:.3}",
                            id,
                            ev.time,
                            prev_beat_interval
                        );
                        new_agent.consider_as_beat(ev, self);
                        self.add(new_agent);
                    }
                    prev_beat_interval = agent.beat_interval;
                    created = phase_given;
                }
                if agent.consider_as_beat(ev, self) {
                    created = true;
                }
                self.add(agent);
            }

            self.remove_duplicates();
        }

        true
    }

    fn score(agent: &Agent) -> f64 {
        let score = agent.phase_score + agent.tempo_score;
        if agent.params().use_average_salience {
            score / agent.beat_count as f64
        } else {
            score
        }
    }

    fn best_index(&self) -> Option<usize> {
        let mut best = -1.0;
        let mut best_index = None;
        for (i, agent) in self.list.iter().enumerate() {
            if agent.events.is_empty() {
                continue;
            }
            let conf = Self::score(agent);
            if conf > best {
                best = conf;
                best_index = Some(i);
            }
        }

        match best_index {
            Some(i) => debug!(
                "best agent #{}: interval {:.4}s, score {:.3}",
                self.list[i].id, self.list[i].beat_interval, best
            ),
            None => debug!("no surviving agent, beat tracking failed"),
        }
        best_index
    }

    /// The agent with the highest score, or `None` if beat tracking has failed.
    pub fn best_agent(&self) -> Option<&Agent> {
        self.best_index().map(|i| &self.list[i])
    }

    /// Like [`AgentList::best_agent`], but takes the agent out of the list.
    pub fn into_best_agent(mut self) -> Option<Agent> {
        self.best_index().map(|i| self.list.swap_remove(i))
    }
}

impl<'a> IntoIterator for &'a AgentList {
    type Item = &'a Agent;
    type IntoIter = std::slice::Iter<'a, Agent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::AgentParameters;

    use super::*;

    fn spawn(agents: &mut AgentList, ibi: f64, beat_time: f64, score: f64) -> usize {
        let id = agents.next_id();
        let mut agent = Agent::new(AgentParameters::default(), ibi, id);
        agent.beat_time = beat_time;
        agent.phase_score = score;
        agent.events.push(Event::onset(beat_time, score));
        agents.push(agent);
        id
    }

    fn ids(agents: &AgentList) -> Vec<usize> {
        let mut ids: Vec<usize> = agents.iter().map(|a| a.id).collect();
        ids.sort();
        ids
    }

    #[test]
    fn add_keeps_interval_order() {
        let mut agents = AgentList::new();
        for ibi in [0.6, 0.4, 0.5, 0.4] {
            let id = agents.next_id();
            agents.add(Agent::new(AgentParameters::default(), ibi, id));
        }
        let order: Vec<usize> = agents.iter().map(|a| a.id).collect();
        assert_eq!(order, vec![1, 3, 2, 0]);
    }

    #[test]
    fn duplicates_keep_the_higher_score() {
        let mut agents = AgentList::new();
        let low = spawn(&mut agents, 0.50, 1.00, 1.0);
        let high = spawn(&mut agents, 0.51, 1.03, 2.0);
        // Same tempo, different phase.
        let other_phase = spawn(&mut agents, 0.50, 1.25, 0.5);
        // Same phase, different tempo.
        let other_tempo = spawn(&mut agents, 0.56, 1.00, 0.5);

        agents.remove_duplicates();
        assert_eq!(ids(&agents), vec![high, other_phase, other_tempo]);
        assert!(!ids(&agents).contains(&low));
    }

    #[test]
    fn equal_scores_keep_the_earlier_agent() {
        let mut agents = AgentList::new();
        let first = spawn(&mut agents, 0.50, 1.00, 1.0);
        spawn(&mut agents, 0.51, 1.00, 1.0);

        agents.remove_duplicates();
        assert_eq!(ids(&agents), vec![first]);
    }

    #[test]
    fn losers_pass_on_their_top_score_time() {
        let mut agents = AgentList::new();
        spawn(&mut agents, 0.50, 1.00, 1.0);
        spawn(&mut agents, 0.50, 1.00, 3.0);
        agents.iter_mut().next().unwrap().top_score_time = 7.0;

        agents.remove_duplicates();
        assert_eq!(agents.len(), 1);
        let survivor = agents.iter().next().unwrap();
        assert_eq!(survivor.phase_score, 3.0);
        assert_eq!(survivor.top_score_time, 7.0);
    }

    #[test]
    fn no_duplicates_survive_pruning() {
        let mut agents = AgentList::new();
        // A dense grid of hypotheses, most of them within both thresholds of a neighbour.
        for i in 0..12 {
            for j in 0..12 {
                let score = ((i * 7 + j * 13) % 11) as f64;
                spawn(&mut agents, 0.5 + 0.007 * i as f64, 2.0 + 0.015 * j as f64, score);
            }
        }

        agents.remove_duplicates();
        let survivors: Vec<&Agent> = agents.iter().collect();
        assert!(!survivors.is_empty());
        for (n, a) in survivors.iter().enumerate() {
            for b in &survivors[n + 1..] {
                let close_tempo = (a.beat_interval - b.beat_interval).abs() <= 0.02;
                let close_phase = (a.beat_time - b.beat_time).abs() <= 0.04;
                assert!(!(close_tempo && close_phase));
            }
        }
    }

    #[test]
    fn expired_agents_are_swept() {
        let mut agents = AgentList::new();
        spawn(&mut agents, 0.5, 1.0, 1.0);
        spawn(&mut agents, 0.8, 1.0, 1.0);
        agents.iter_mut().next().unwrap().kill();

        agents.remove_duplicates();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents.iter().next().unwrap().beat_interval, 0.8);
    }

    #[test]
    fn best_agent_ignores_agents_without_beats() {
        let mut agents = AgentList::new();
        assert!(agents.best_agent().is_none());

        let id = agents.next_id();
        agents.push(Agent::new(AgentParameters::default(), 0.5, id));
        assert!(agents.best_agent().is_none());

        let best = spawn(&mut agents, 0.6, 0.0, 0.0);
        assert_eq!(agents.best_agent().map(|a| a.id), Some(best));
    }

    #[test]
    fn average_salience_favours_slower_tempi() {
        let params = AgentParameters {
            use_average_salience: true,
            ..Default::default()
        };
        let events: Vec<Event> = (0..16)
            .map(|i| Event::onset(i as f64 * 0.4, if i % 2 == 0 { 1.0 } else { 0.2 }))
            .collect();

        let mut summed = AgentList::new();
        let mut averaged = AgentList::new();
        for ibi in [0.4, 0.8] {
            let id = summed.next_id();
            summed.push(Agent::new(AgentParameters::default(), ibi, id));
            let id = averaged.next_id();
            averaged.push(Agent::new(params, ibi, id));
        }
        summed.beat_track(&events, None, None);
        averaged.beat_track(&events, None, None);

        assert_relative_eq!(summed.best_agent().unwrap().initial_beat_interval, 0.4);
        assert_relative_eq!(averaged.best_agent().unwrap().initial_beat_interval, 0.8);
    }

    #[test]
    fn new_phase_agents_start_early_in_the_piece() {
        let mut agents = AgentList::new();
        for ibi in [0.5, 0.7] {
            let id = agents.next_id();
            agents.push(Agent::new(AgentParameters::default(), ibi, id));
        }
        // 0.25s is rejected by the 0.5s agent, so a second 0.5s agent starts from it.
        agents.beat_track(&[Event::onset(0.0, 1.0), Event::onset(0.25, 1.0)], None, None);

        let phases: Vec<f64> = agents
            .iter()
            .filter(|a| a.initial_beat_interval == 0.5)
            .map(|a| a.beat_time)
            .collect();
        assert_eq!(phases.len(), 2);
        assert!(phases.contains(&0.0));
        assert!(phases.contains(&0.25));
    }

    #[test]
    fn stop_time_ends_tracking() {
        let mut agents = AgentList::new();
        let id = agents.next_id();
        agents.push(Agent::new(AgentParameters::default(), 0.5, id));
        let events: Vec<Event> = (0..10).map(|i| Event::onset(i as f64 * 0.5, 1.0)).collect();

        assert!(agents.beat_track(&events, Some(2.0), None));
        let best = agents.best_agent().unwrap();
        assert_eq!(best.events.len(), 5);
        assert_eq!(best.beat_time, 2.0);
    }

    #[test]
    fn interrupt_leaves_agents_untouched() {
        let mut agents = AgentList::new();
        let id = agents.next_id();
        agents.push(Agent::new(AgentParameters::default(), 0.5, id));
        let flag = AtomicBool::new(true);

        assert!(!agents.beat_track(&[Event::onset(0.0, 1.0)], None, Some(&flag)));
        assert_eq!(agents.len(), 1);
        assert!(agents.best_agent().is_none());
    }

    #[test]
    fn into_best_agent_takes_the_winner() {
        let mut agents = AgentList::new();
        spawn(&mut agents, 0.5, 0.0, 1.0);
        let best = spawn(&mut agents, 0.7, 0.0, 4.0);
        spawn(&mut agents, 0.9, 0.0, 2.0);

        let agent = agents.into_best_agent().unwrap();
        assert_eq!(agent.id, best);
    }
}
