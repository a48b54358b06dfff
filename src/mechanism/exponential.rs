//! Exponential mechanism, used for rank-type queries: median, percentile, max.
//!
//! Given a candidate set `C` (an equally-spaced grid over `[lower, upper]`),
//! a score function `s: C -> R` with sensitivity `delta_s`, and epsilon,
//! samples `c in C` with probability proportional to
//! `exp(epsilon * s(c) / (2 * delta_s))`.

use crate::error::MechanismError;

use super::rng::NoiseSource;

/// Builds an equally-spaced grid of `num_candidates` points over
/// `[lower, upper]`, inclusive of both endpoints.
pub fn candidate_grid(lower: f64, upper: f64, num_candidates: usize) -> Vec<f64> {
    if num_candidates <= 1 {
        return vec![lower];
    }
    let step = (upper - lower) / (num_candidates as f64 - 1.0);
    (0..num_candidates).map(|i| lower + step * i as f64).collect()
}

/// Samples one candidate from `candidates` with probability proportional to
/// `exp(epsilon * scores[i] / (2 * sensitivity))`.
///
/// Implementation requirements from spec.md section 4.1: subtract the max
/// score before exponentiating (numeric stability), normalize, then sample
/// by inverse CDF on a uniform draw.
pub fn exponential_mechanism(
    candidates: &[f64],
    scores: &[f64],
    sensitivity: f64,
    epsilon: f64,
    source: &mut impl NoiseSource,
) -> Result<f64, MechanismError> {
    if candidates.is_empty() || candidates.len() != scores.len() {
        return Err(MechanismError::InvalidParameters(
            "candidates and scores must be the same non-empty length".into(),
        ));
    }
    if sensitivity <= 0.0 || epsilon <= 0.0 {
        return Err(MechanismError::InvalidParameters(
            "sensitivity and epsilon must be positive".into(),
        ));
    }

    let max_score = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let weight = epsilon / (2.0 * sensitivity);

    let mut unnormalized: Vec<f64> = scores
        .iter()
        .map(|s| ((s - max_score) * weight).exp())
        .collect();

    let total: f64 = unnormalized.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(MechanismError::NonFinite);
    }
    for w in &mut unnormalized {
        *w /= total;
    }

    // Inverse CDF sampling: walk the cumulative distribution until it
    // exceeds a uniform draw.
    let target = source.uniform_open01();
    let mut cumulative = 0.0;
    for (candidate, weight) in candidates.iter().zip(unnormalized.iter()) {
        cumulative += weight;
        if target <= cumulative {
            return Ok(*candidate);
        }
    }
    // Floating point drift may leave `cumulative` a hair under 1.0; fall
    // back to the last candidate rather than erroring.
    Ok(*candidates.last().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanism::rng::SeededNoiseSource;

    #[test]
    fn grid_spans_bounds() {
        let grid = candidate_grid(0.0, 100.0, 5);
        assert_eq!(grid, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    }

    #[test]
    fn concentrates_on_highest_scoring_candidate_at_high_epsilon() {
        let candidates = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let scores = vec![-4.0, -3.0, -2.0, -1.0, 0.0]; // candidate 4.0 is best
        let mut src = SeededNoiseSource::new(5);
        let mut hits_best = 0;
        for _ in 0..200 {
            let pick = exponential_mechanism(&candidates, &scores, 1.0, 5.0, &mut src).unwrap();
            if pick == 4.0 {
                hits_best += 1;
            }
        }
        assert!(hits_best > 150, "expected strong concentration, got {hits_best}/200");
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let mut src = SeededNoiseSource::new(1);
        let err = exponential_mechanism(&[0.0, 1.0], &[0.0], 1.0, 1.0, &mut src).unwrap_err();
        assert!(matches!(err, MechanismError::InvalidParameters(_)));
    }
}
