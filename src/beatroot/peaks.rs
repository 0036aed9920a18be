//! Peak picking over an onset detection function, and conversion of the peaks into onset
//! events for the beat tracker.

use super::event::{Event, EventList};
use super::math;

/// With a relative threshold, a peak is compared with the mean of the data from `PRE` widths
/// before it to `POST` widths after it.
const PRE: usize = 3;
const POST: usize = 1;

/// Spacing between onsets, in seconds, used to size the peak picking window.
const ONSET_SPACING: f64 = 0.06;
const ONSET_THRESHOLD: f64 = 0.35;
const ONSET_DECAY_RATE: f64 = 0.84;

/// Shifts and scales `data` to zero mean and unit standard deviation. Constant data becomes
/// all zeros.
pub fn normalise(data: &mut [f64]) {
    if data.is_empty() {
        return;
    }

    let n = data.len() as f64;
    let (sx, sxx) = data
        .iter()
        .fold((0.0, 0.0), |(sx, sxx), x| (sx + x, sxx + x * x));
    let mean = sx / n;
    let sd = ((sxx - sx * mean) / n).sqrt();
    let sd = if sd == 0.0 || !sd.is_finite() { 1.0 } else { sd };

    data.iter_mut().for_each(|x| *x = (*x - mean) / sd);
}

fn over_threshold(
    data: &[f64],
    index: usize,
    width: usize,
    threshold: f64,
    relative: bool,
    av: f64,
) -> bool {
    if data[index] < av {
        return false;
    }
    if relative {
        let start = index.saturating_sub(PRE * width);
        let stop = (index + POST * width).min(data.len());
        // No local mean to compare with.
        if start >= stop {
            return false;
        }
        data[index] > math::mean(&data[start..stop]) + threshold
    } else {
        data[index] > threshold
    }
}

/// Finds the indices of local maxima in `data`.
///
/// A sample is a peak if it is the largest in the window `[i - width, i + width]`, is not below
/// an exponentially decaying average of the data (which jumps up to every new maximum, decaying
/// by `decay_rate` per sample), and exceeds `threshold`. With `relative` set, the threshold is
/// taken above the local mean rather than as an absolute value.
pub fn find_peaks(
    data: &[f64],
    width: usize,
    threshold: f64,
    decay_rate: f64,
    relative: bool,
) -> Vec<usize> {
    let mut peaks = Vec::new();
    let Some(&first) = data.first() else {
        return peaks;
    };

    let mut av = first;
    for mid in 0..data.len() {
        av = (decay_rate * av + (1.0 - decay_rate) * data[mid]).max(data[mid]);

        let start = mid.saturating_sub(width);
        let stop = (mid + width + 1).min(data.len());
        // The first of equal maxima wins, so a plateau yields a single peak.
        let maxp = (start + 1..stop).fold(start, |maxp, i| {
            if data[i] > data[maxp] {
                i
            } else {
                maxp
            }
        });

        if maxp == mid && over_threshold(data, maxp, width, threshold, relative, av) {
            peaks.push(maxp);
        }
    }

    peaks
}

/// Picks onsets from a detection function sampled every `hop_time` seconds.
///
/// Saliences are measured from the minimum of the normalised function, so they are never
/// negative.
pub fn onsets_from_features(features: &[f64], hop_time: f64) -> EventList {
    let mut features = features.to_vec();
    normalise(&mut features);

    let width = math::round_to_count(ONSET_SPACING / hop_time)
        .and_then(|w| usize::try_from(w).ok())
        .unwrap_or(0);
    let min_salience = math::min(&features).map_or(0.0, |(_, x)| x);

    find_peaks(&features, width, ONSET_THRESHOLD, ONSET_DECAY_RATE, true)
        .into_iter()
        .map(|i| Event::onset(i as f64 * hop_time, features[i] - min_salience))
        .collect()
}
