//! Aggregate-level mechanism contracts (spec.md section 4.1's table).
//!
//! Each function here takes a true statistic (or the raw clipped values it's
//! computed from) plus a sensitivity and local epsilon, and returns a
//! [`MechanismOutcome`] carrying the noised result and the bookkeeping an
//! audit record needs. All inputs are clipped to column bounds before the
//! true statistic is computed — this is what makes the declared sensitivity
//! correct.

use crate::{config::ColumnDescriptor, error::MechanismError};

use super::{
    exponential::{candidate_grid, exponential_mechanism},
    laplace::add_laplace_noise,
    rng::NoiseSource,
};

/// Which mechanism produced a [`MechanismOutcome`], for audit purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanismName {
    Laplace,
    LaplaceComposition,
    Exponential,
}

impl MechanismName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MechanismName::Laplace => "Laplace",
            MechanismName::LaplaceComposition => "Laplace (Composition)",
            MechanismName::Exponential => "Exponential",
        }
    }
}

/// Result of one mechanism invocation, enough to both answer the caller and
/// populate an [`crate::gate::audit::AuditRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct MechanismOutcome {
    pub noisy_result: f64,
    pub true_result: f64,
    pub epsilon_used: f64,
    pub mechanism: MechanismName,
    pub sensitivity: f64,
}

impl MechanismOutcome {
    pub fn noise_added(&self) -> f64 {
        self.noisy_result - self.true_result
    }
}

fn require_nonempty(n: usize) -> Result<(), MechanismError> {
    if n == 0 {
        Err(MechanismError::EmptyInput)
    } else {
        Ok(())
    }
}

fn require_finite(x: f64) -> Result<f64, MechanismError> {
    if x.is_finite() {
        Ok(x)
    } else {
        Err(MechanismError::NonFinite)
    }
}

/// `Count(n)`: sensitivity 1, Laplace, clamp to >= 0, round to integer.
pub fn noisy_count(
    true_count: u64,
    epsilon: f64,
    source: &mut impl NoiseSource,
) -> Result<MechanismOutcome, MechanismError> {
    let sensitivity = 1.0;
    let noisy = add_laplace_noise(true_count as f64, sensitivity, epsilon, source);
    let noisy = require_finite(noisy)?.max(0.0).round();
    Ok(MechanismOutcome {
        noisy_result: noisy,
        true_result: true_count as f64,
        epsilon_used: epsilon,
        mechanism: MechanismName::Laplace,
        sensitivity,
    })
}

/// `Sum(x, [lo, hi])`: sensitivity `hi - lo` over clipped values, Laplace.
///
/// Row-level sensitivity of a bounded sum is `hi - lo`: a single row
/// changes the sum by at most the width of the column's range. This
/// deliberately does NOT scale by `n` (see DESIGN.md for why).
pub fn noisy_sum(
    values: &[f64],
    bounds: &ColumnDescriptor,
    epsilon: f64,
    source: &mut impl NoiseSource,
) -> Result<MechanismOutcome, MechanismError> {
    require_nonempty(values.len())?;
    let true_sum: f64 = values.iter().map(|v| bounds.clip(*v)).sum();
    let sensitivity = bounds.range();
    let noisy = require_finite(add_laplace_noise(true_sum, sensitivity, epsilon, source))?;
    Ok(MechanismOutcome {
        noisy_result: noisy,
        true_result: true_sum,
        epsilon_used: epsilon,
        mechanism: MechanismName::Laplace,
        sensitivity,
    })
}

/// `Mean(x, [lo, hi], n)`: split epsilon in halves, Laplace-compose a noisy
/// count (sensitivity 1) and a noisy sum (sensitivity `hi - lo`), divide,
/// then clamp into `[lo, hi]`.
pub fn noisy_mean(
    values: &[f64],
    bounds: &ColumnDescriptor,
    epsilon: f64,
    source: &mut impl NoiseSource,
) -> Result<MechanismOutcome, MechanismError> {
    require_nonempty(values.len())?;
    let true_sum: f64 = values.iter().map(|v| bounds.clip(*v)).sum();
    let n = values.len() as f64;
    let true_mean = true_sum / n;

    let eps_half = epsilon / 2.0;
    let noisy_count = add_laplace_noise(n, 1.0, eps_half, source).max(1.0);
    let noisy_sum = add_laplace_noise(true_sum, bounds.range(), eps_half, source);

    let noisy_mean = require_finite(noisy_sum / noisy_count)?.clamp(bounds.lower, bounds.upper);
    Ok(MechanismOutcome {
        noisy_result: noisy_mean,
        true_result: true_mean,
        epsilon_used: epsilon,
        mechanism: MechanismName::LaplaceComposition,
        sensitivity: bounds.range(),
    })
}

/// `Median(values, [lo, hi])`: exponential mechanism over a 100-point (by
/// default) grid, score `-sum(|v - c|)` with sensitivity `hi - lo`.
pub fn noisy_median(
    values: &[f64],
    bounds: &ColumnDescriptor,
    epsilon: f64,
    num_candidates: usize,
    source: &mut impl NoiseSource,
) -> Result<MechanismOutcome, MechanismError> {
    require_nonempty(values.len())?;
    let clipped: Vec<f64> = values.iter().map(|v| bounds.clip(*v)).collect();
    let mut sorted = clipped.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let true_median = median_of_sorted(&sorted);

    let candidates = candidate_grid(bounds.lower, bounds.upper, num_candidates);
    let sensitivity = bounds.range();
    let scores: Vec<f64> = candidates
        .iter()
        .map(|c| -clipped.iter().map(|v| (v - c).abs()).sum::<f64>())
        .collect();

    let picked = exponential_mechanism(&candidates, &scores, sensitivity, epsilon, source)?;
    let noisy = picked.clamp(bounds.lower, bounds.upper);
    Ok(MechanismOutcome {
        noisy_result: noisy,
        true_result: true_median,
        epsilon_used: epsilon,
        mechanism: MechanismName::Exponential,
        sensitivity,
    })
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// `Histogram(bins[], k)`: sensitivity 1 per bin (one row contributes to
/// exactly one bin), Laplace independently on each bin, clamp each bin to
/// >= 0 and round to integer.
pub fn noisy_histogram(
    bin_counts: &[u64],
    epsilon: f64,
    source: &mut impl NoiseSource,
) -> Result<Vec<MechanismOutcome>, MechanismError> {
    let sensitivity = 1.0;
    bin_counts
        .iter()
        .map(|&count| {
            let noisy = add_laplace_noise(count as f64, sensitivity, epsilon, source);
            let noisy = require_finite(noisy)?.max(0.0).round();
            Ok(MechanismOutcome {
                noisy_result: noisy,
                true_result: count as f64,
                epsilon_used: epsilon,
                mechanism: MechanismName::Laplace,
                sensitivity,
            })
        })
        .collect()
}

/// `Variance`: epsilon/2 for a noisy mean, epsilon/2 for a noisy mean of
/// squared deviations bounded by `(hi - lo)^2`, clamp to >= 0.
pub fn noisy_variance(
    values: &[f64],
    bounds: &ColumnDescriptor,
    epsilon: f64,
    source: &mut impl NoiseSource,
) -> Result<MechanismOutcome, MechanismError> {
    require_nonempty(values.len())?;
    let clipped: Vec<f64> = values.iter().map(|v| bounds.clip(*v)).collect();
    let n = clipped.len() as f64;
    let true_mean = clipped.iter().sum::<f64>() / n;
    let true_variance = clipped.iter().map(|v| (v - true_mean).powi(2)).sum::<f64>() / n;

    let eps_half = epsilon / 2.0;
    let mean_outcome = noisy_mean(&clipped, bounds, eps_half, source)?;

    let sq_dev_bound = bounds.range().powi(2);
    let squared_deviations: Vec<f64> = clipped
        .iter()
        .map(|v| (v - mean_outcome.noisy_result).powi(2))
        .collect();
    let sq_dev_bounds = ColumnDescriptor::new(0.0, sq_dev_bound)
        .map_err(MechanismError::InvalidParameters)?;
    let variance_outcome = noisy_mean(&squared_deviations, &sq_dev_bounds, eps_half, source)?;

    let noisy_variance = require_finite(variance_outcome.noisy_result)?.max(0.0);
    Ok(MechanismOutcome {
        noisy_result: noisy_variance,
        true_result: true_variance,
        epsilon_used: epsilon,
        mechanism: MechanismName::LaplaceComposition,
        sensitivity: sq_dev_bound,
    })
}

/// `Percentile(p)`: score `-|#{v <= c} - p*n/100|`, sensitivity of score 1,
/// exponential mechanism, clamp to `[lo, hi]`.
pub fn noisy_percentile(
    values: &[f64],
    percentile: f64,
    bounds: &ColumnDescriptor,
    num_candidates: usize,
    epsilon: f64,
    source: &mut impl NoiseSource,
) -> Result<MechanismOutcome, MechanismError> {
    require_nonempty(values.len())?;
    if !(0.0..=100.0).contains(&percentile) {
        return Err(MechanismError::InvalidParameters(
            "percentile must be in [0, 100]".into(),
        ));
    }
    let clipped: Vec<f64> = values.iter().map(|v| bounds.clip(*v)).collect();
    let n = clipped.len() as f64;
    let target_count = n * (percentile / 100.0);

    let candidates = candidate_grid(bounds.lower, bounds.upper, num_candidates);
    let sensitivity = 1.0;
    let scores: Vec<f64> = candidates
        .iter()
        .map(|c| {
            let count_below = clipped.iter().filter(|v| **v <= *c).count() as f64;
            -(count_below - target_count).abs()
        })
        .collect();

    let mut sorted = clipped.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let idx = ((percentile / 100.0) * (sorted.len() as f64 - 1.0)).round() as usize;
    let true_percentile = sorted[idx.min(sorted.len() - 1)];

    let picked = exponential_mechanism(&candidates, &scores, sensitivity, epsilon, source)?;
    Ok(MechanismOutcome {
        noisy_result: picked.clamp(bounds.lower, bounds.upper),
        true_result: true_percentile,
        epsilon_used: epsilon,
        mechanism: MechanismName::Exponential,
        sensitivity,
    })
}

/// `Max`: score `#{v <= c}`, sensitivity 1, exponential mechanism.
pub fn noisy_max(
    values: &[f64],
    bounds: &ColumnDescriptor,
    num_candidates: usize,
    epsilon: f64,
    source: &mut impl NoiseSource,
) -> Result<MechanismOutcome, MechanismError> {
    require_nonempty(values.len())?;
    let clipped: Vec<f64> = values.iter().map(|v| bounds.clip(*v)).collect();
    let true_max = clipped.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let candidates = candidate_grid(bounds.lower, bounds.upper, num_candidates);
    let sensitivity = 1.0;
    let scores: Vec<f64> = candidates
        .iter()
        .map(|c| clipped.iter().filter(|v| **v <= *c).count() as f64)
        .collect();

    let picked = exponential_mechanism(&candidates, &scores, sensitivity, epsilon, source)?;
    Ok(MechanismOutcome {
        noisy_result: picked.clamp(bounds.lower, bounds.upper),
        true_result: true_max,
        epsilon_used: epsilon,
        mechanism: MechanismName::Exponential,
        sensitivity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanism::rng::SeededNoiseSource;

    fn bounds() -> ColumnDescriptor {
        ColumnDescriptor::new(0.0, 120.0).unwrap()
    }

    #[test]
    fn count_is_nonnegative_integer() {
        let mut src = SeededNoiseSource::new(1);
        for _ in 0..200 {
            let outcome = noisy_count(1000, 1.0, &mut src).unwrap();
            assert!(outcome.noisy_result >= 0.0);
            assert_eq!(outcome.noisy_result.fract(), 0.0);
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        let mut src = SeededNoiseSource::new(1);
        let err = noisy_sum(&[], &bounds(), 1.0, &mut src).unwrap_err();
        assert_eq!(err, MechanismError::EmptyInput);
    }

    #[test]
    fn mean_stays_within_bounds() {
        let values: Vec<f64> = (0..50).map(|x| x as f64).collect();
        let mut src = SeededNoiseSource::new(9);
        for _ in 0..100 {
            let outcome = noisy_mean(&values, &bounds(), 2.0, &mut src).unwrap();
            assert!(outcome.noisy_result >= bounds().lower);
            assert!(outcome.noisy_result <= bounds().upper);
        }
    }

    #[test]
    fn median_of_single_value_is_in_bounds() {
        let mut src = SeededNoiseSource::new(4);
        let outcome = noisy_median(&[42.0], &bounds(), 1.0, 100, &mut src).unwrap();
        assert!(outcome.noisy_result >= bounds().lower && outcome.noisy_result <= bounds().upper);
    }

    #[test]
    fn histogram_bins_are_nonnegative_integers_and_same_count() {
        let counts = vec![10, 0, 7, 3];
        let mut src = SeededNoiseSource::new(2);
        let outcomes = noisy_histogram(&counts, 1.0, &mut src).unwrap();
        assert_eq!(outcomes.len(), counts.len());
        for outcome in outcomes {
            assert!(outcome.noisy_result >= 0.0);
            assert_eq!(outcome.noisy_result.fract(), 0.0);
        }
    }

    #[test]
    fn variance_is_nonnegative() {
        let values: Vec<f64> = (0..30).map(|x| (x as f64) * 3.0).collect();
        let mut src = SeededNoiseSource::new(6);
        for _ in 0..50 {
            let outcome = noisy_variance(&values, &bounds(), 2.0, &mut src).unwrap();
            assert!(outcome.noisy_result >= 0.0);
        }
    }

    #[test]
    fn sum_sensitivity_is_range_not_scaled_by_n() {
        // Grounding for the DESIGN.md decision: sensitivity must not grow
        // with the number of rows.
        let mut src = SeededNoiseSource::new(1);
        let few = noisy_sum(&[1.0, 2.0], &bounds(), 1.0, &mut src).unwrap();
        let many: Vec<f64> = (0..1000).map(|_| 1.0).collect();
        let many = noisy_sum(&many, &bounds(), 1.0, &mut src).unwrap();
        assert_eq!(few.sensitivity, bounds().range());
        assert_eq!(many.sensitivity, bounds().range());
    }
}
