//! C5 — Windowed Statistics Kernel: weighted mean and sample variance over
//! grouped value-bags ("revision buckets" — all values sampled at one
//! push).

use statrs::statistics::Statistics;

/// One push's worth of raw measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub values: Vec<f64>,
}

impl Bucket {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }
}

/// Result of `analyze`: the weighted mean, total value count, and the
/// unweighted sample variance across every value in the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub avg: f64,
    pub n: usize,
    pub variance: f64,
}

/// A window function: `(index, window_width) -> weight`. Index 0 is the
/// most recent end of the window.
pub type WeightFn = fn(usize, usize) -> f64;

/// Weights every bucket equally.
pub fn uniform_weights(_i: usize, _n: usize) -> f64 {
    1.0
}

/// Falls off arithmetically toward the far edge of the window, giving more
/// weight to points near the candidate change point (used by the Student
/// confidence function — see `detector::student_confidence`).
pub fn linear_weights(i: usize, n: usize) -> f64 {
    if i >= n {
        0.0
    } else {
        (n - i) as f64 / n as f64
    }
}

/// `analyze(buckets, weight_fn)` from §4.5.
///
/// Each value within a bucket receives that bucket's weight, so buckets
/// with more values contribute proportionally more to the weighted mean.
/// Sample variance is computed over the *flat*, unweighted sequence of all
/// values in the window.
pub fn analyze(buckets: &[Bucket], weight_fn: WeightFn) -> Stats {
    if buckets.is_empty() {
        return Stats {
            avg: 0.0,
            n: 0,
            variance: 0.0,
        };
    }

    let num_buckets = buckets.len();
    let weights: Vec<f64> = (0..num_buckets).map(|i| weight_fn(i, num_buckets)).collect();

    let mut weighted_sum = 0.0;
    let mut sum_of_weights = 0.0;
    for (i, bucket) in buckets.iter().enumerate() {
        let bucket_sum: f64 = bucket.values.iter().sum();
        weighted_sum += bucket_sum * weights[i];
        sum_of_weights += weights[i] * bucket.values.len() as f64;
    }
    let avg = if sum_of_weights != 0.0 {
        weighted_sum / sum_of_weights
    } else {
        0.0
    };

    let all_values: Vec<f64> = buckets
        .iter()
        .flat_map(|b| b.values.iter().copied())
        .collect();
    let m = all_values.len();
    let variance = sample_variance_around(&all_values, avg);

    Stats { avg, n: m, variance }
}

/// Sample variance of `values` around a precomputed mean `avg`. `avg` may
/// be a weighted mean (as `analyze` computes), which is why this doesn't
/// delegate to `statrs`'s `Statistics::variance` — that always centers on
/// the slice's own unweighted mean. When the caller's mean *is* the plain
/// mean (the unweighted, uniform-weight case), the two agree; `plain_variance`
/// below is the direct `statrs` path for that case, used by the CLI's
/// `detect` subcommand.
fn sample_variance_around(values: &[f64], avg: f64) -> f64 {
    let m = values.len();
    if m <= 1 {
        return 0.0;
    }
    values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (m as f64 - 1.0)
}

/// Plain (unweighted) sample variance via `statrs`, printed by the CLI's
/// `detect` subcommand alongside the flagged change points.
pub fn plain_variance(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    (&values[..]).variance()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_returns_zeros() {
        let stats = analyze(&[], uniform_weights);
        assert_eq!(stats, Stats { avg: 0.0, n: 0, variance: 0.0 });
    }

    #[test]
    fn single_value_has_zero_variance() {
        let stats = analyze(&[Bucket::new(vec![5.0])], uniform_weights);
        assert_eq!(stats.avg, 5.0);
        assert_eq!(stats.n, 1);
        assert_eq!(stats.variance, 0.0);
    }

    #[test]
    fn uniform_weighted_mean_matches_plain_average_of_equal_sized_buckets() {
        let buckets = vec![
            Bucket::new(vec![10.0]),
            Bucket::new(vec![20.0]),
            Bucket::new(vec![30.0]),
        ];
        let stats = analyze(&buckets, uniform_weights);
        assert_eq!(stats.avg, 20.0);
        assert_eq!(stats.n, 3);
    }

    #[test]
    fn buckets_with_more_values_contribute_proportionally_more() {
        // Bucket 0 has two values at 0.0, bucket 1 has one value at 100.0.
        // Uniform per-bucket weight, but more raw values in bucket 0 pull
        // the average toward it.
        let buckets = vec![Bucket::new(vec![0.0, 0.0]), Bucket::new(vec![100.0])];
        let stats = analyze(&buckets, uniform_weights);
        assert!((stats.avg - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn linear_weights_favor_index_zero() {
        assert_eq!(linear_weights(0, 4), 1.0);
        assert_eq!(linear_weights(2, 4), 0.5);
        assert_eq!(linear_weights(4, 4), 0.0);
    }

    #[test]
    fn plain_variance_matches_manual_computation_for_small_sample() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let expected = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
            / (values.len() as f64 - 1.0);
        assert!((plain_variance(&values) - expected).abs() < 1e-9);
    }

    #[test]
    fn plain_variance_of_singleton_is_zero() {
        assert_eq!(plain_variance(&[42.0]), 0.0);
    }
}
