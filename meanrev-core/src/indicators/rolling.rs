//! Rolling mean, sample standard deviation and percentage returns.

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator). NaN with fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Rolling mean over `window` values. The first `window - 1` entries are NaN.
///
/// Each window is summed from scratch rather than with a running sum, so two
/// windows holding identical values always produce bit-identical means. The
/// z-score relies on this to return exactly zero for a flat series.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    assert!(window >= 1, "rolling window must be >= 1");
    let mut out = vec![f64::NAN; values.len()];
    if values.len() < window {
        return out;
    }
    for (i, w) in values.windows(window).enumerate() {
        out[i + window - 1] = mean(w);
    }
    out
}

/// One-period percentage change. The first entry is NaN.
pub fn pct_returns(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(f64::NAN);
    for pair in values.windows(2) {
        out.push(pair[1] / pair[0] - 1.0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn mean_and_std_basic() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_approx(mean(&v), 5.0, DEFAULT_EPSILON);
        // population std is 2.0, sample std is sqrt(32/7)
        assert_approx(sample_std(&v), (32.0_f64 / 7.0).sqrt(), DEFAULT_EPSILON);
    }

    #[test]
    fn std_needs_two_values() {
        assert!(sample_std(&[1.0]).is_nan());
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn rolling_mean_basic() {
        let result = rolling_mean(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0], 5);
        assert_eq!(result.len(), 7);
        for (i, v) in result.iter().enumerate().take(4) {
            assert!(v.is_nan(), "expected NaN at index {i}");
        }
        assert_approx(result[4], 12.0, DEFAULT_EPSILON);
        assert_approx(result[5], 13.0, DEFAULT_EPSILON);
        assert_approx(result[6], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rolling_mean_identical_windows_are_bit_identical() {
        let v = vec![100.1; 50];
        let r = rolling_mean(&v, 20);
        let first = r[19];
        assert!(r[19..].iter().all(|x| x.to_bits() == first.to_bits()));
    }

    #[test]
    fn rolling_mean_too_few_values() {
        assert!(rolling_mean(&[1.0, 2.0], 5).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn pct_returns_basic() {
        let r = pct_returns(&[100.0, 110.0, 99.0]);
        assert!(r[0].is_nan());
        assert_approx(r[1], 0.1, DEFAULT_EPSILON);
        assert_approx(r[2], -0.1, DEFAULT_EPSILON);
    }
}
