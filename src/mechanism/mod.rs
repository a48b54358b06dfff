//! The mechanism engine (component C1): a pure, stateless function library
//! that maps a true statistic, a sensitivity and a local epsilon to a
//! noised value.
//!
//! Submodules mirror spec.md section 4.1 directly: [`laplace`] and
//! [`gaussian`] are the two additive mechanisms, [`exponential`] is the
//! rank-statistic sampler, and [`aggregates`] wires them up into the
//! per-aggregate contracts table (count, sum, mean, median, histogram,
//! variance, percentile, max).

pub mod aggregates;
pub mod exponential;
pub mod gaussian;
pub mod laplace;
pub mod rng;

pub use aggregates::{MechanismName, MechanismOutcome};
pub use rng::NoiseSource;
