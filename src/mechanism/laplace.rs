//! Laplace mechanism.
//!
//! For a statistic with L1-sensitivity `delta`, draws noise from
//! `Lap(0, delta/epsilon)` and adds it. spec.md section 4.1 requires the
//! raw draw to be exposed so higher-level mechanisms (mean, variance) can
//! compose two independent Laplace draws under split epsilon.

use super::rng::NoiseSource;

/// Raw draw from `Lap(0, scale)` via inverse CDF:
/// `F^-1(p) = -scale * sign(p - 0.5) * ln(1 - 2|p - 0.5|)`.
pub fn laplace_noise(scale: f64, source: &mut impl NoiseSource) -> f64 {
    debug_assert!(scale >= 0.0, "laplace scale must be non-negative");
    let u = source.uniform_open01() - 0.5;
    -scale * u.signum() * (1.0 - 2.0 * u.abs()).ln()
}

/// Adds Laplace noise calibrated to sensitivity `delta` and privacy
/// parameter `epsilon` to `value`.
pub fn add_laplace_noise(value: f64, delta: f64, epsilon: f64, source: &mut impl NoiseSource) -> f64 {
    let scale = delta / epsilon;
    value + laplace_noise(scale, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanism::rng::SeededNoiseSource;

    #[test]
    fn zero_scale_adds_no_noise() {
        let mut src = SeededNoiseSource::new(1);
        assert_eq!(laplace_noise(0.0, &mut src), 0.0);
    }

    #[test]
    fn noise_grows_with_scale_on_average() {
        let mut small = SeededNoiseSource::new(3);
        let mut large = SeededNoiseSource::new(3);
        let small_abs: f64 = (0..2000)
            .map(|_| laplace_noise(1.0, &mut small).abs())
            .sum::<f64>()
            / 2000.0;
        let large_abs: f64 = (0..2000)
            .map(|_| laplace_noise(10.0, &mut large).abs())
            .sum::<f64>()
            / 2000.0;
        assert!(large_abs > small_abs);
    }
}
