//! Gaussian mechanism.
//!
//! For (epsilon, delta)-DP with delta > 0:
//! `sigma = sensitivity * sqrt(2 * ln(1.25 / delta)) / epsilon`.
//!
//! Not used by the gateway's public query surface (spec.md section 4.1: the
//! supported aggregates all go through Laplace or the exponential
//! mechanism), retained as a tool for callers building their own (epsilon,
//! delta)-DP mechanisms on top of this crate.

use super::rng::NoiseSource;

/// Standard deviation of the Gaussian mechanism for the given sensitivity,
/// epsilon and delta.
pub fn gaussian_sigma(sensitivity: f64, epsilon: f64, delta: f64) -> f64 {
    sensitivity * (2.0 * (1.25 / delta).ln()).sqrt() / epsilon
}

/// Draws a single Gaussian noise sample via Box-Muller, using two draws
/// from the same [`NoiseSource`] the Laplace mechanism uses.
pub fn gaussian_noise(sigma: f64, source: &mut impl NoiseSource) -> f64 {
    let u1 = source.uniform_open01();
    let u2 = source.uniform_open01();
    let radius = (-2.0 * u1.ln()).sqrt();
    sigma * radius * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Adds Gaussian noise calibrated to `(epsilon, delta)`-DP to `value`.
pub fn add_gaussian_noise(
    value: f64,
    sensitivity: f64,
    epsilon: f64,
    delta: f64,
    source: &mut impl NoiseSource,
) -> f64 {
    let sigma = gaussian_sigma(sensitivity, epsilon, delta);
    value + gaussian_noise(sigma, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanism::rng::SeededNoiseSource;

    #[test]
    fn sigma_shrinks_as_epsilon_grows() {
        let small_eps = gaussian_sigma(1.0, 0.5, 1e-5);
        let large_eps = gaussian_sigma(1.0, 5.0, 1e-5);
        assert!(large_eps < small_eps);
    }

    #[test]
    fn noise_is_finite() {
        let mut src = SeededNoiseSource::new(11);
        for _ in 0..500 {
            assert!(gaussian_noise(2.0, &mut src).is_finite());
        }
    }
}
