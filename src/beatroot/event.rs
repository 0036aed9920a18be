/// An onset (or beat) located in time.
///
/// `beat` is an optional label, used for the index of a beat when the event is a beat rather
/// than an onset. `salience` must not be negative: every score in the tracker is a weighted sum
/// of saliences and assumes as much.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    pub time: f64,
    pub beat: f64,
    pub salience: f64,
}

impl Event {
    pub fn new(time: f64, beat: f64, salience: f64) -> Self {
        Event {
            time,
            beat,
            salience,
        }
    }

    /// An onset with the given strength and no beat label.
    pub fn onset(time: f64, salience: f64) -> Self {
        Event::new(time, 0.0, salience)
    }

    /// A beat at `time`. Beats carry no salience of their own.
    pub fn beat(time: f64, beat_num: i32) -> Self {
        Event::new(time, beat_num as f64, 0.0)
    }
}

pub type EventList = Vec<Event>;

/// Numbered beats at the given times.
pub fn beats_at(times: &[f64]) -> EventList {
    times
        .iter()
        .zip(0..)
        .map(|(t, n)| Event::beat(*t, n))
        .collect()
}
