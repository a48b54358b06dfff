//! Per-principal budget bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `consumed` is accumulated in double precision; over a long-running
/// deployment rounding may let a query with `epsilon == remaining` fail by
/// machine epsilon. Per spec.md section 9 this crate snaps `remaining` to
/// zero once it drops below this fraction of `total`, rather than comparing
/// with an ad hoc tolerance scattered across call sites.
const DRIFT_TOLERANCE_FRACTION: f64 = 1e-9;

/// One principal's running privacy budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetEntry {
    pub total: f64,
    pub consumed: f64,
    pub warning_threshold: f64,
    pub last_reset: DateTime<Utc>,
    pub reset_count: u64,
}

impl BudgetEntry {
    pub fn new(total: f64, warning_threshold: f64) -> Self {
        Self {
            total,
            consumed: 0.0,
            warning_threshold,
            last_reset: Utc::now(),
            reset_count: 0,
        }
    }

    /// `total - consumed`, snapped to zero once floating-point drift would
    /// otherwise leave a sliver of budget that's really spent.
    pub fn remaining(&self) -> f64 {
        let remaining = self.total - self.consumed;
        if remaining.abs() < DRIFT_TOLERANCE_FRACTION * self.total.max(1.0) {
            0.0
        } else {
            remaining
        }
    }

    pub fn depleted(&self) -> bool {
        self.remaining() <= 0.0
    }

    pub fn warning(&self) -> bool {
        self.remaining() <= self.warning_threshold
    }

    pub fn can_consume(&self, epsilon: f64) -> bool {
        self.remaining() >= epsilon
    }

    /// Debits `epsilon` without checking affordability; callers must call
    /// [`BudgetEntry::can_consume`] first. Kept infallible and separate so
    /// the ledger's lock-held critical section stays a single, obviously
    /// correct check-then-act.
    pub fn debit(&mut self, epsilon: f64) {
        self.consumed += epsilon;
    }

    /// Zeroes `consumed` and bumps `reset_count`. Does not grant
    /// retroactive privacy: a principal that has already spent `X` and gets
    /// reset still has a true cumulative privacy loss of `X + new spend`
    /// (spec.md section 4.3 / 9). This is an operator-intervention tool,
    /// not a DP-sound operation — the gate is responsible for role-gating
    /// and logging it, this method just does the bookkeeping.
    pub fn apply_reset(&mut self) {
        self.consumed = 0.0;
        self.last_reset = Utc::now();
        self.reset_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_has_full_remaining() {
        let entry = BudgetEntry::new(10.0, 2.0);
        assert_eq!(entry.remaining(), 10.0);
        assert!(!entry.depleted());
        assert!(!entry.warning());
    }

    #[test]
    fn debit_reduces_remaining() {
        let mut entry = BudgetEntry::new(10.0, 2.0);
        entry.debit(3.0);
        assert_eq!(entry.remaining(), 7.0);
    }

    #[test]
    fn warning_flips_once_remaining_drops_to_threshold() {
        let mut entry = BudgetEntry::new(10.0, 2.0);
        entry.debit(8.5);
        assert!(entry.warning());
        assert!(!entry.depleted());
    }

    #[test]
    fn drift_below_tolerance_snaps_to_zero() {
        let mut entry = BudgetEntry::new(10.0, 2.0);
        entry.debit(10.0 - 1e-12);
        assert_eq!(entry.remaining(), 0.0);
        assert!(entry.depleted());
    }

    #[test]
    fn reset_zeroes_consumed_and_bumps_count() {
        let mut entry = BudgetEntry::new(10.0, 2.0);
        entry.debit(5.0);
        entry.apply_reset();
        assert_eq!(entry.consumed, 0.0);
        assert_eq!(entry.reset_count, 1);
        assert_eq!(entry.remaining(), 10.0);
    }
}
