//! The budget ledger (component C3): a keyed map from principal id to
//! [`BudgetEntry`], with atomic check-and-consume and a reservation scheme
//! for the gate's "pay only after the mechanism succeeds" discipline.
//!
//! This is the corpus's `FilterStorage`/`Filter` pattern (per-principal
//! mutable state behind `can_consume`/`try_consume`), extended with the two
//! things spec.md section 4.3 asks for beyond a plain two-phase
//! dry-run/commit: a reservation that survives across the row-store call
//! and auto-releases if nobody commits or releases it in time, and a
//! role-gated reset.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
    time::{Duration, Instant},
};

use crate::{budget::entry::BudgetEntry, error::LedgerError};

/// A held-but-not-yet-committed debit. Opaque to callers beyond comparing
/// and passing back to [`BudgetLedger::commit`] / [`BudgetLedger::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    principal: String,
    id: u64,
}

impl Reservation {
    pub fn principal(&self) -> &str {
        &self.principal
    }
}

/// Outcome of [`BudgetLedger::try_consume`]: the ledger's atomic
/// check-and-add, spec.md section 4.3.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumeOutcome {
    Committed,
    InsufficientBudget { remaining: f64 },
}

/// Outcome of [`BudgetLedger::reserve`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReservationOutcome {
    Reserved(Reservation),
    InsufficientBudget { remaining: f64 },
}

/// Per-principal running total of epsilon spent, with atomic
/// check-and-consume and sequential composition (consumed debits simply
/// add up; see spec.md section 3/8).
///
/// Implementations MUST serialise mutations per principal and MUST NOT
/// block reads of other principals' entries on it (spec.md section 4.3).
pub trait BudgetLedger: Send + Sync {
    /// Pure read: is `remaining(principal) >= epsilon`, accounting for any
    /// outstanding reservations?
    fn can_consume(&self, principal: &str, epsilon: f64) -> Result<bool, LedgerError>;

    /// Atomic check-and-add: if enough budget remains, commits the debit
    /// immediately and returns [`ConsumeOutcome::Committed`].
    fn try_consume(&self, principal: &str, epsilon: f64) -> Result<ConsumeOutcome, LedgerError>;

    /// Reserves `epsilon` without debiting it yet. A concurrent caller
    /// checking `can_consume`/`reserve` sees the pessimistic remainder
    /// (current `remaining()` minus all outstanding reservations).
    /// Reservations that are never committed or released expire after the
    /// ledger's configured timeout.
    fn reserve(&self, principal: &str, epsilon: f64) -> Result<ReservationOutcome, LedgerError>;

    /// Turns a reservation into a committed debit. A no-op success if the
    /// reservation already expired would be unsound (it would silently
    /// double-spend), so an expired or unknown reservation is an error.
    fn commit(&self, reservation: &Reservation) -> Result<(), LedgerError>;

    /// Releases a reservation without debiting anything. Releasing an
    /// already-expired or already-released reservation is not an error:
    /// the caller's intent (don't spend this epsilon) is already satisfied.
    fn release(&self, reservation: &Reservation) -> Result<(), LedgerError>;

    /// Zeroes `consumed` for `principal` and bumps `reset_count`. Does not
    /// grant retroactive privacy (spec.md section 4.3) — callers (the gate)
    /// are responsible for role-gating and logging this.
    fn reset(&self, principal: &str) -> Result<(), LedgerError>;

    /// Snapshot read of a principal's entry and its derived flags.
    fn status(&self, principal: &str) -> Result<BudgetEntry, LedgerError>;
}

struct PendingReservation {
    amount: f64,
    created_at: Instant,
}

struct PrincipalState {
    entry: BudgetEntry,
    reservations: HashMap<u64, PendingReservation>,
}

impl PrincipalState {
    fn new(total: f64, warning_threshold: f64) -> Self {
        Self {
            entry: BudgetEntry::new(total, warning_threshold),
            reservations: HashMap::new(),
        }
    }

    fn sweep_expired(&mut self, timeout: Duration) {
        let now = Instant::now();
        self.reservations
            .retain(|_, r| now.duration_since(r.created_at) < timeout);
    }

    fn reserved_total(&self) -> f64 {
        self.reservations.values().map(|r| r.amount).sum()
    }

    /// Remaining budget after subtracting outstanding reservations: the
    /// pessimistic view concurrent callers must see.
    fn effective_remaining(&self) -> f64 {
        self.entry.remaining() - self.reserved_total()
    }
}

/// In-memory reference implementation of [`BudgetLedger`], one mutex per
/// principal so unrelated principals never contend, matching the corpus's
/// `HashMapFilterStorage` in-memory reference implementations.
pub struct HashMapBudgetLedger {
    principals: RwLock<HashMap<String, Arc<Mutex<PrincipalState>>>>,
    default_total: f64,
    default_warning_threshold: f64,
    reservation_timeout: Duration,
    next_reservation_id: AtomicU64,
}

impl HashMapBudgetLedger {
    pub fn new(default_total: f64, default_warning_threshold: f64, reservation_timeout: Duration) -> Self {
        Self {
            principals: RwLock::new(HashMap::new()),
            default_total,
            default_warning_threshold,
            reservation_timeout,
            next_reservation_id: AtomicU64::new(0),
        }
    }

    fn state_for(&self, principal: &str) -> Arc<Mutex<PrincipalState>> {
        if let Some(state) = self.principals.read().unwrap().get(principal) {
            return Arc::clone(state);
        }
        // Created lazily on first query by a principal (spec.md section 3).
        let mut principals = self.principals.write().unwrap();
        Arc::clone(principals.entry(principal.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(PrincipalState::new(
                self.default_total,
                self.default_warning_threshold,
            )))
        }))
    }
}

impl BudgetLedger for HashMapBudgetLedger {
    fn can_consume(&self, principal: &str, epsilon: f64) -> Result<bool, LedgerError> {
        let state = self.state_for(principal);
        let mut state = state.lock().unwrap();
        state.sweep_expired(self.reservation_timeout);
        Ok(state.effective_remaining() >= epsilon)
    }

    fn try_consume(&self, principal: &str, epsilon: f64) -> Result<ConsumeOutcome, LedgerError> {
        let state = self.state_for(principal);
        let mut state = state.lock().unwrap();
        state.sweep_expired(self.reservation_timeout);
        if state.effective_remaining() >= epsilon {
            state.entry.debit(epsilon);
            Ok(ConsumeOutcome::Committed)
        } else {
            Ok(ConsumeOutcome::InsufficientBudget {
                remaining: state.effective_remaining(),
            })
        }
    }

    fn reserve(&self, principal: &str, epsilon: f64) -> Result<ReservationOutcome, LedgerError> {
        let state = self.state_for(principal);
        let mut state = state.lock().unwrap();
        state.sweep_expired(self.reservation_timeout);
        if state.effective_remaining() >= epsilon {
            let id = self.next_reservation_id.fetch_add(1, Ordering::Relaxed);
            state.reservations.insert(
                id,
                PendingReservation {
                    amount: epsilon,
                    created_at: Instant::now(),
                },
            );
            Ok(ReservationOutcome::Reserved(Reservation {
                principal: principal.to_string(),
                id,
            }))
        } else {
            Ok(ReservationOutcome::InsufficientBudget {
                remaining: state.effective_remaining(),
            })
        }
    }

    fn commit(&self, reservation: &Reservation) -> Result<(), LedgerError> {
        let state = self.state_for(&reservation.principal);
        let mut state = state.lock().unwrap();
        state.sweep_expired(self.reservation_timeout);
        match state.reservations.remove(&reservation.id) {
            Some(pending) => {
                state.entry.debit(pending.amount);
                Ok(())
            }
            None => Err(LedgerError::UnknownReservation),
        }
    }

    fn release(&self, reservation: &Reservation) -> Result<(), LedgerError> {
        let state = self.state_for(&reservation.principal);
        let mut state = state.lock().unwrap();
        state.reservations.remove(&reservation.id);
        Ok(())
    }

    fn reset(&self, principal: &str) -> Result<(), LedgerError> {
        let state = self.state_for(principal);
        let mut state = state.lock().unwrap();
        state.entry.apply_reset();
        Ok(())
    }

    fn status(&self, principal: &str) -> Result<BudgetEntry, LedgerError> {
        let state = self.state_for(principal);
        let mut state = state.lock().unwrap();
        state.sweep_expired(self.reservation_timeout);
        Ok(state.entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Barrier, thread};

    use super::*;

    fn ledger() -> HashMapBudgetLedger {
        HashMapBudgetLedger::new(10.0, 2.0, Duration::from_secs(30))
    }

    #[test]
    fn fresh_principal_can_consume_up_to_total() {
        let ledger = ledger();
        assert!(ledger.can_consume("alice", 10.0).unwrap());
        assert!(!ledger.can_consume("alice", 10.1).unwrap());
    }

    #[test]
    fn try_consume_debits_and_refuses_overspend() {
        let ledger = ledger();
        assert_eq!(ledger.try_consume("alice", 7.0).unwrap(), ConsumeOutcome::Committed);
        assert_eq!(
            ledger.try_consume("alice", 4.0).unwrap(),
            ConsumeOutcome::InsufficientBudget { remaining: 3.0 }
        );
        assert_eq!(ledger.status("alice").unwrap().consumed, 7.0);
    }

    #[test]
    fn reserve_then_release_leaves_consumed_unchanged() {
        let ledger = ledger();
        let ReservationOutcome::Reserved(reservation) = ledger.reserve("alice", 5.0).unwrap() else {
            panic!("expected a reservation");
        };
        // A concurrent caller sees the pessimistic remainder.
        assert!(!ledger.can_consume("alice", 6.0).unwrap());
        ledger.release(&reservation).unwrap();
        assert_eq!(ledger.status("alice").unwrap().consumed, 0.0);
        assert!(ledger.can_consume("alice", 10.0).unwrap());
    }

    #[test]
    fn reserve_then_commit_debits_exactly_once() {
        let ledger = ledger();
        let ReservationOutcome::Reserved(reservation) = ledger.reserve("alice", 5.0).unwrap() else {
            panic!("expected a reservation");
        };
        ledger.commit(&reservation).unwrap();
        assert_eq!(ledger.status("alice").unwrap().consumed, 5.0);
        // Committing twice is an error, not a double debit.
        assert!(matches!(ledger.commit(&reservation), Err(LedgerError::UnknownReservation)));
        assert_eq!(ledger.status("alice").unwrap().consumed, 5.0);
    }

    #[test]
    fn reset_zeroes_consumed_and_bumps_count() {
        let ledger = ledger();
        ledger.try_consume("alice", 5.0).unwrap();
        ledger.reset("alice").unwrap();
        let status = ledger.status("alice").unwrap();
        assert_eq!(status.consumed, 0.0);
        assert_eq!(status.reset_count, 1);
    }

    /// Property 8: concurrent `try_consume` calls from N threads against a
    /// ledger with initial remaining R, each requesting epsilon', commit
    /// exactly floor(R/epsilon') of them, and the rest are refused.
    #[test]
    fn concurrent_try_consume_is_linearisable() {
        let ledger = Arc::new(HashMapBudgetLedger::new(10.0, 2.0, Duration::from_secs(30)));
        let epsilon = 2.0;
        let threads = 10;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    ledger.try_consume("bob", epsilon).unwrap()
                })
            })
            .collect();

        let committed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|outcome| *outcome == ConsumeOutcome::Committed)
            .count();

        assert_eq!(committed, 5); // floor(10.0 / 2.0)
        assert_eq!(ledger.status("bob").unwrap().consumed, 10.0);
    }

    #[test]
    fn concurrent_requests_from_distinct_principals_dont_block_each_other() {
        let ledger = ledger();
        assert_eq!(ledger.try_consume("alice", 3.0).unwrap(), ConsumeOutcome::Committed);
        assert_eq!(ledger.try_consume("bob", 3.0).unwrap(), ConsumeOutcome::Committed);
        assert_eq!(ledger.status("alice").unwrap().consumed, 3.0);
        assert_eq!(ledger.status("bob").unwrap().consumed, 3.0);
    }
}
