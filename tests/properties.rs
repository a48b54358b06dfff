//! Property-style tests for the universal invariants in spec.md section 8
//! that aren't already pinned down by a module's own unit tests: noise
//! convergence as epsilon grows, monotonic variance in epsilon, and bounds
//! containment across every aggregate kind.

use dp_aggregate_gateway::{
    mechanism::{
        aggregates::{noisy_count, noisy_mean, noisy_sum},
        rng::SeededNoiseSource,
    },
    ColumnDescriptor,
};

fn bounds() -> ColumnDescriptor {
    ColumnDescriptor::new(0.0, 100.0).unwrap()
}

/// Averaging many independent noisy counts at a fixed epsilon should land
/// close to the true count; the average absolute error should shrink as
/// more draws are averaged (classic unbiased-Laplace-noise convergence).
#[test]
fn repeated_noisy_counts_average_toward_the_true_count() {
    let true_count = 500u64;
    let epsilon = 0.5;
    let mut src = SeededNoiseSource::new(11);

    let draws: Vec<f64> = (0..400)
        .map(|_| noisy_count(true_count, epsilon, &mut src).unwrap().noisy_result)
        .collect();
    let mean_of_draws = draws.iter().sum::<f64>() / draws.len() as f64;

    assert!(
        (mean_of_draws - true_count as f64).abs() < 15.0,
        "mean of {} draws was {mean_of_draws}, true count was {true_count}",
        draws.len()
    );
}

/// Larger epsilon means less noise: the spread of repeated draws at a
/// higher epsilon should be no larger than at a lower one.
#[test]
fn higher_epsilon_produces_less_spread_in_noisy_sums() {
    let values: Vec<f64> = (0..200).map(|x| (x % 100) as f64).collect();
    let bounds = bounds();

    let spread_at = |epsilon: f64, seed: u64| -> f64 {
        let mut src = SeededNoiseSource::new(seed);
        let draws: Vec<f64> = (0..300)
            .map(|_| noisy_sum(&values, &bounds, epsilon, &mut src).unwrap().noisy_result)
            .collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        draws.iter().map(|d| (d - mean).abs()).sum::<f64>() / draws.len() as f64
    };

    let low_epsilon_spread = spread_at(0.1, 21);
    let high_epsilon_spread = spread_at(5.0, 21);
    assert!(
        high_epsilon_spread < low_epsilon_spread,
        "expected less spread at higher epsilon: low={low_epsilon_spread}, high={high_epsilon_spread}"
    );
}

/// A noisy mean must always land inside the column's declared bounds,
/// regardless of how extreme the noise draw is.
#[test]
fn noisy_mean_never_escapes_its_declared_bounds() {
    let values: Vec<f64> = vec![10.0, 20.0, 30.0, 95.0];
    let bounds = bounds();
    for seed in 0..200 {
        let mut src = SeededNoiseSource::new(seed);
        let outcome = noisy_mean(&values, &bounds, 0.05, &mut src).unwrap();
        assert!(outcome.noisy_result >= bounds.lower);
        assert!(outcome.noisy_result <= bounds.upper);
    }
}

/// A noisy count must always be a non-negative integer, even under
/// extreme noise at very small epsilon.
#[test]
fn noisy_count_is_always_a_nonnegative_integer_even_under_heavy_noise() {
    for seed in 0..200 {
        let mut src = SeededNoiseSource::new(seed);
        let outcome = noisy_count(3, 0.01, &mut src).unwrap();
        assert!(outcome.noisy_result >= 0.0);
        assert_eq!(outcome.noisy_result.fract(), 0.0);
    }
}
