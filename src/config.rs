//! Tunable parameters for tempo induction and beat tracking.

use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

/// Parameters shared by tempo induction and every agent created from it.
///
/// The value is immutable once tracking starts; each agent keeps its own copy, so forked agents
/// track with exactly the parameters of their parent.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentParameters {
    /// The maximum amount by which a beat can be later than the predicted beat time, expressed
    /// as a fraction of the beat period.
    pub post_margin_factor: f64,

    /// The maximum amount by which a beat can be earlier than the predicted beat time,
    /// expressed as a fraction of the beat period.
    pub pre_margin_factor: f64,

    /// The maximum time (in seconds) that a beat can deviate from the predicted beat time
    /// without a fork occurring.
    pub inner_margin: f64,

    /// The maximum allowed deviation from the initial tempo, expressed as a fraction of the
    /// initial beat period.
    pub max_change: f64,

    /// The slope of the penalty function for onsets which do not coincide precisely with
    /// predicted beat times.
    pub conf_factor: f64,

    /// Reactiveness/inertia balance: the beat period moves by the prediction error divided by
    /// this factor on every accepted beat.
    pub correction_factor: f64,

    /// Time (in seconds) after which an agent with no matching event is destroyed.
    pub expiry_time: f64,

    /// Memory length for exponentially decaying scores. Zero sums saliences over the whole
    /// piece, which is what offline tracking wants.
    pub decay_factor: f64,

    /// The maximum difference in IOIs which are in the same cluster.
    pub cluster_width: f64,

    /// The minimum IOI for inclusion in a cluster.
    pub min_ioi: f64,

    /// The maximum IOI for inclusion in a cluster.
    pub max_ioi: f64,

    /// The minimum inter-beat interval, i.e. the fastest tempo hypothesis (0.3s == 200 BPM).
    pub min_ibi: f64,

    /// The maximum inter-beat interval, i.e. the slowest tempo hypothesis (1.0s == 60 BPM).
    pub max_ibi: f64,

    /// The maximum number of tempo hypotheses returned by induction.
    pub top_n: usize,

    /// Agents closer than this in beat period (seconds) may be duplicates.
    pub duplicate_interval: f64,

    /// Agents closer than this in beat phase (seconds) may be duplicates.
    pub duplicate_phase: f64,

    /// Score agents by average rather than summed salience. Summed saliences favour faster
    /// tempi (lower metrical levels).
    pub use_average_salience: bool,
}

impl Default for AgentParameters {
    fn default() -> Self {
        AgentParameters {
            post_margin_factor: 0.3,
            pre_margin_factor: 0.15,
            inner_margin: 0.040,
            max_change: 0.2,
            conf_factor: 0.5,
            correction_factor: 50.0,
            expiry_time: 10.0,
            decay_factor: 0.0,
            cluster_width: 0.025,
            min_ioi: 0.070,
            max_ioi: 2.500,
            min_ibi: 0.3,
            max_ibi: 1.0,
            top_n: 10,
            duplicate_interval: 0.02,
            duplicate_phase: 0.04,
            use_average_salience: false,
        }
    }
}

impl AgentParameters {
    /// Parses parameters from TOML. Keys that are not present keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Describes every value outside the range the tracker was tuned for.
    ///
    /// Nothing in the tracker refuses such values; they simply produce poor (or no) beats.
    /// Callers decide whether to warn or reject.
    pub fn range_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let non_negative = [
            ("post_margin_factor", self.post_margin_factor),
            ("pre_margin_factor", self.pre_margin_factor),
            ("inner_margin", self.inner_margin),
            ("max_change", self.max_change),
            ("conf_factor", self.conf_factor),
            ("decay_factor", self.decay_factor),
            ("duplicate_interval", self.duplicate_interval),
            ("duplicate_phase", self.duplicate_phase),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                warnings.push(format!("{} should not be negative (got {})", name, value));
            }
        }

        let positive = [
            ("correction_factor", self.correction_factor),
            ("expiry_time", self.expiry_time),
            ("cluster_width", self.cluster_width),
            ("min_ioi", self.min_ioi),
            ("min_ibi", self.min_ibi),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                warnings.push(format!("{} should be positive (got {})", name, value));
            }
        }

        if self.min_ioi > self.max_ioi {
            warnings.push(format!(
                "min_ioi ({}) is greater than max_ioi ({})",
                self.min_ioi, self.max_ioi
            ));
        }
        if self.min_ibi * 2.0 > self.max_ibi {
            warnings.push(format!(
                "[min_ibi, max_ibi] = [{}, {}] does not span an octave",
                self.min_ibi, self.max_ibi
            ));
        }
        if self.top_n == 0 {
            warnings.push("top_n is zero, induction will produce no hypotheses".to_string());
        }

        warnings
    }

    /// The size of the window before a predicted beat, for a given beat period.
    pub fn pre_margin(&self, beat_interval: f64) -> f64 {
        beat_interval * self.pre_margin_factor
    }

    /// The size of the window after a predicted beat, for a given beat period.
    pub fn post_margin(&self, beat_interval: f64) -> f64 {
        beat_interval * self.post_margin_factor
    }
}
