use num_traits::ToPrimitive;

/// Rounds to the nearest integer, ties to even. This matters for beat counting: an onset that
/// falls exactly half way between two predicted beats must not be rounded up by default.
pub fn nearbyint(x: f64) -> f64 {
    x.round_ties_even()
}

/// `nearbyint` as an integer count, or `None` if `x` is NaN or out of range.
pub fn round_to_count(x: f64) -> Option<i64> {
    nearbyint(x).to_i64()
}

pub fn threshold(value: f64, min: f64, max: f64) -> f64 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

pub fn min(data: &[f64]) -> Option<(usize, f64)> {
    data.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, x)| (i, *x))
}

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(nearbyint(0.5), 0.0);
        assert_eq!(nearbyint(1.5), 2.0);
        assert_eq!(nearbyint(2.5), 2.0);
        assert_eq!(nearbyint(-0.4), -0.0);
        assert_eq!(round_to_count(2.6), Some(3));
        assert_eq!(round_to_count(f64::NAN), None);
    }

    #[test]
    fn extremes() {
        let data = [3.0, -1.0, 7.0, 7.0, 2.0];
        assert_eq!(min(&data), Some((1, -1.0)));
        assert_eq!(min(&[]), None);
        assert_eq!(threshold(12.0, 1.0, 10.0), 10.0);
        assert_eq!(threshold(0.0, 1.0, 10.0), 1.0);
        assert_ulps_eq!(mean(&data), 3.6);
    }
}
