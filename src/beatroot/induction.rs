//! Tempo induction: clusters inter-onset intervals (IOIs), ranks the clusters by the number of
//! intervals they hold and by their harmonic relationships to each other, and seeds one agent
//! per top ranked tempo hypothesis.

use log::{debug, trace};

use crate::config::AgentParameters;

use super::agent::Agent;
use super::agent_list::AgentList;
use super::event::Event;
use super::math;

/// Integer ratios considered when relating two clusters.
const MIN_DEGREE: i64 = 2;
const MAX_DEGREE: i64 = 8;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Cluster {
    mean: f64,
    size: usize,
}

/// How two interval clusters relate.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Relation {
    /// The first mean is (about) `n` times shorter than the second.
    Submultiple(i64),
    /// The first mean is (about) `n` times longer than the second.
    Multiple(i64),
}

/// Whether `a` and `b` are related by an integer ratio in `MIN_DEGREE..=MAX_DEGREE`.
///
/// Multiples are allowed an error proportional to the ratio, submultiples are not.
fn relation(a: f64, b: f64, width: f64) -> Option<Relation> {
    let ratio = a / b;
    if ratio < 1.0 {
        let degree = math::round_to_count(1.0 / ratio)?;
        ((MIN_DEGREE..=MAX_DEGREE).contains(&degree) && (a * degree as f64 - b).abs() < width)
            .then_some(Relation::Submultiple(degree))
    } else {
        let degree = math::round_to_count(ratio)?;
        ((MIN_DEGREE..=MAX_DEGREE).contains(&degree)
            && (a - b * degree as f64).abs() < width * degree as f64)
            .then_some(Relation::Multiple(degree))
    }
}

/// Close harmonic relationships count for more than distant ones.
fn relation_weight(degree: i64) -> i64 {
    if degree >= 5 {
        1
    } else {
        6 - degree
    }
}

/// Groups every IOI in `[min_ioi, max_ioi]` into clusters of width `cluster_width`, sorted by
/// mean.
fn cluster_intervals(params: &AgentParameters, events: &[Event]) -> Vec<Cluster> {
    let width = params.cluster_width;
    let max_cluster_count = ((params.max_ioi - params.min_ioi) / width).ceil().max(0.0) as usize;
    let mut clusters: Vec<Cluster> = Vec::new();
    let mut dropped = 0;

    for (i, e1) in events.iter().enumerate() {
        for e2 in &events[i + 1..] {
            let ioi = e2.time - e1.time;
            if ioi < params.min_ioi {
                continue;
            }
            if ioi > params.max_ioi {
                break;
            }

            if let Some(mut b) = clusters.iter().position(|c| (c.mean - ioi).abs() < width) {
                if b + 1 < clusters.len()
                    && (clusters[b + 1].mean - ioi).abs() < (clusters[b].mean - ioi).abs()
                {
                    b += 1;
                }
                let c = &mut clusters[b];
                c.mean = (c.mean * c.size as f64 + ioi) / (c.size + 1) as f64;
                c.size += 1;
            } else if clusters.len() >= max_cluster_count {
                dropped += 1;
            } else {
                let at = clusters.partition_point(|c| c.mean <= ioi);
                clusters.insert(at, Cluster { mean: ioi, size: 1 });
            }
        }
    }

    if dropped > 0 {
        trace!("too many IOI clusters, dropped {} interval(s)", dropped);
    }

    // Running means may have drifted together; merge until no two are within a cluster width.
    let mut b = 0;
    while b < clusters.len() {
        let mut i = b + 1;
        while i < clusters.len() {
            if (clusters[b].mean - clusters[i].mean).abs() < width {
                let other = clusters.remove(i);
                let c = &mut clusters[b];
                c.mean = (c.mean * c.size as f64 + other.mean * other.size as f64)
                    / (c.size + other.size) as f64;
                c.size += other.size;
            } else {
                i += 1;
            }
        }
        b += 1;
    }

    clusters
}

/// Scores each cluster by its size and by the size of the clusters it is harmonically related to.
fn score_clusters(clusters: &[Cluster], width: f64) -> Vec<i64> {
    let mut scores: Vec<i64> = clusters.iter().map(|c| 10 * c.size as i64).collect();

    for b in 0..clusters.len() {
        for i in b + 1..clusters.len() {
            let degree = match relation(clusters[b].mean, clusters[i].mean, width) {
                Some(Relation::Submultiple(n)) | Some(Relation::Multiple(n)) => n,
                None => continue,
            };
            let weight = relation_weight(degree);
            scores[b] += weight * clusters[i].size as i64;
            scores[i] += weight * clusters[b].size as i64;
        }
    }

    scores
}

/// Indices of the `n` highest scoring clusters, best first. Ties go to the shorter interval.
fn top_clusters(scores: &[i64], n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*b].cmp(&scores[*a]));
    order.truncate(n);
    order
}

/// Refines the mean of cluster `b` using every cluster related to it, each scaled to the same
/// metrical level and weighted by its score.
fn refine(clusters: &[Cluster], scores: &[i64], b: usize, width: f64) -> f64 {
    let mut sum = clusters[b].mean * scores[b] as f64;
    let mut weight = scores[b];

    for (i, other) in clusters.iter().enumerate() {
        if i == b {
            continue;
        }
        let scaled = match relation(clusters[b].mean, other.mean, width) {
            Some(Relation::Submultiple(n)) => other.mean / n as f64,
            Some(Relation::Multiple(n)) => other.mean * n as f64,
            None => continue,
        };
        sum += scaled * scores[i] as f64;
        weight += scores[i];
    }

    sum / weight as f64
}

/// Performs tempo induction on `events`.
///
/// Returns a list of agents, each initialised with one of the top tempo hypotheses but no beats.
/// The list is empty if `events` contains no usable intervals.
pub fn beat_induction(params: &AgentParameters, events: &[Event]) -> AgentList {
    let mut agents = AgentList::new();

    let clusters = cluster_intervals(params, events);
    if clusters.is_empty() {
        debug!("tempo induction found no intervals in {} events", events.len());
        return agents;
    }

    let scores = score_clusters(&clusters, params.cluster_width);
    for b in top_clusters(&scores, params.top_n) {
        let mut beat = refine(&clusters, &scores, b, params.cluster_width);
        if !(beat > 0.0) {
            continue;
        }

        // Scale within range. This assumes binary rather than ternary metrical grouping.
        while beat < params.min_ibi {
            beat *= 2.0;
        }
        // A non-positive maximum halves the estimate down to zero, which is then dropped.
        while beat > params.max_ibi && beat > 0.0 {
            beat /= 2.0;
        }

        if beat > 0.0 && beat >= params.min_ibi {
            let id = agents.next_id();
            agents.push(Agent::new(*params, beat, id));
        }
    }

    debug!(
        "tempo induction: {} cluster(s), {} hypotheses: {:?}",
        clusters.len(),
        agents.len(),
        agents
            .iter()
            .map(|a| (a.beat_interval * 1000.0).round() / 1000.0)
            .collect::<Vec<_>>()
    );
    agents
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train(period: f64, count: usize, salience: f64) -> Vec<Event> {
        (0..count)
            .map(|i| Event::onset(i as f64 * period, salience))
            .collect()
    }

    #[test]
    fn relations() {
        assert_eq!(relation(0.5, 1.0, 0.025), Some(Relation::Submultiple(2)));
        assert_eq!(relation(1.5, 0.5, 0.025), Some(Relation::Multiple(3)));
        // Multiples get a wider tolerance than submultiples.
        assert_eq!(relation(1.56, 0.5, 0.025), Some(Relation::Multiple(3)));
        assert_eq!(relation(0.5, 1.56, 0.025), None);
        assert_eq!(relation(0.5, 0.75, 0.025), None);
        assert_eq!(relation(0.1, 1.0, 0.025), None);
        assert_eq!(relation(0.5, 0.5, 0.025), None);
    }

    #[test]
    fn weights() {
        assert_eq!(relation_weight(2), 4);
        assert_eq!(relation_weight(4), 2);
        assert_eq!(relation_weight(5), 1);
        assert_eq!(relation_weight(8), 1);
    }

    #[test]
    fn clusters_periodic_train() {
        let params = AgentParameters::default();
        let clusters = cluster_intervals(&params, &train(0.5, 20, 1.0));

        let means: Vec<f64> = clusters.iter().map(|c| c.mean).collect();
        let sizes: Vec<usize> = clusters.iter().map(|c| c.size).collect();
        assert_eq!(sizes, vec![19, 18, 17, 16, 15]);
        for (mean, expected) in means.iter().zip([0.5, 1.0, 1.5, 2.0, 2.5]) {
            assert_relative_eq!(*mean, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn short_intervals_are_ignored() {
        let params = AgentParameters::default();
        let events = vec![
            Event::onset(0.0, 1.0),
            Event::onset(0.02, 1.0),
            Event::onset(0.5, 1.0),
        ];
        let clusters = cluster_intervals(&params, &events);
        let sizes: Vec<usize> = clusters.iter().map(|c| c.size).collect();
        // 0.5 and 0.48 share a cluster, 0.02 is dropped.
        assert_eq!(sizes, vec![2]);
        assert_relative_eq!(clusters[0].mean, 0.49, epsilon = 1e-9);
    }

    #[test]
    fn nearby_clusters_merge() {
        let params = AgentParameters::default();
        // 0.50 and 0.53 start separate clusters. Three IOIs of 0.514, each closer to the first,
        // drag it to within a cluster width of the second.
        let events = vec![
            Event::onset(0.0, 1.0),
            Event::onset(0.5, 1.0),
            Event::onset(10.0, 1.0),
            Event::onset(10.53, 1.0),
            Event::onset(20.0, 1.0),
            Event::onset(20.514, 1.0),
            Event::onset(30.0, 1.0),
            Event::onset(30.514, 1.0),
            Event::onset(40.0, 1.0),
            Event::onset(40.514, 1.0),
        ];
        let clusters = cluster_intervals(&params, &events);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size, 5);
        assert_relative_eq!(clusters[0].mean, 0.5144, epsilon = 1e-9);
    }

    #[test]
    fn cluster_table_overflow_drops_intervals() {
        let params = AgentParameters {
            min_ioi: 0.125,
            max_ioi: 0.25,
            cluster_width: 0.0625,
            ..Default::default()
        };
        // IOIs of 0.125, 0.1875 and 0.25 need three clusters, only two fit.
        let events = vec![
            Event::onset(0.0, 1.0),
            Event::onset(0.125, 1.0),
            Event::onset(10.0, 1.0),
            Event::onset(10.1875, 1.0),
            Event::onset(20.0, 1.0),
            Event::onset(20.25, 1.0),
        ];
        let clusters = cluster_intervals(&params, &events);
        let means: Vec<f64> = clusters.iter().map(|c| c.mean).collect();
        assert_eq!(means, vec![0.125, 0.1875]);
    }

    #[test]
    fn harmonics_raise_scores() {
        let clusters = vec![
            Cluster { mean: 0.5, size: 4 },
            Cluster { mean: 0.7, size: 4 },
            Cluster { mean: 1.0, size: 2 },
        ];
        let scores = score_clusters(&clusters, 0.025);
        // 0.5 and 1.0 are related by a factor of 2 (weight 4), 0.7 is related to neither.
        assert_eq!(scores, vec![40 + 4 * 2, 40, 20 + 4 * 4]);
        assert_eq!(top_clusters(&scores, 2), vec![0, 1]);
    }

    #[test]
    fn top_clusters_is_stable() {
        assert_eq!(top_clusters(&[5, 9, 5, 9, 1], 3), vec![1, 3, 0]);
        assert_eq!(top_clusters(&[5, 9], 10), vec![1, 0]);
    }

    #[test]
    fn refinement_folds_in_related_clusters() {
        let clusters = vec![
            Cluster { mean: 0.49, size: 1 },
            Cluster { mean: 1.0, size: 1 },
        ];
        let scores = vec![10, 10];
        // (0.49 * 10 + 1.0 / 2 * 10) / 20
        assert_relative_eq!(refine(&clusters, &scores, 0, 0.025), 0.495, epsilon = 1e-9);
    }

    #[test]
    fn periodic_train_induces_its_period() {
        let params = AgentParameters::default();
        let agents = beat_induction(&params, &train(0.5, 20, 1.0));

        assert!(!agents.is_empty());
        assert!(agents.len() <= params.top_n);
        let first = agents.iter().next().unwrap();
        assert_relative_eq!(first.beat_interval, 0.5, epsilon = params.cluster_width);
        for agent in &agents {
            assert!(agent.beat_interval >= params.min_ibi);
            assert!(agent.beat_interval <= params.max_ibi);
            assert!(agent.beat_time < 0.0);
            assert!(agent.events.is_empty());
        }
    }

    #[test]
    fn fast_hypotheses_are_octave_corrected() {
        let params = AgentParameters::default();
        let agents = beat_induction(&params, &train(0.2, 30, 1.0));

        let first = agents.iter().next().unwrap();
        assert_relative_eq!(first.beat_interval, 0.4, epsilon = params.cluster_width);
    }

    #[test]
    fn negative_max_ibi_drops_every_hypothesis() {
        let params = AgentParameters {
            max_ibi: -1.0,
            ..Default::default()
        };
        assert!(beat_induction(&params, &train(0.5, 4, 1.0)).is_empty());
    }

    #[test]
    fn no_intervals_no_agents() {
        let params = AgentParameters::default();
        assert!(beat_induction(&params, &[]).is_empty());
        assert!(beat_induction(&params, &[Event::onset(1.0, 1.0)]).is_empty());
        assert!(beat_induction(&params, &train(5.0, 4, 1.0)).is_empty());
    }
}
