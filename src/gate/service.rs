//! Component C4: the gateway itself. Ties together the mechanism engine,
//! the budget ledger, the row store, the principal directory and the audit
//! sink into the single admission path spec.md section 4.4 describes:
//! validate, check the principal, reserve epsilon, run the query, then
//! commit or release the reservation — always writing an audit record
//! before returning, success or failure.

use std::{
    sync::Mutex,
    time::Instant,
};

use log::{debug, warn};

use crate::{
    budget::{entry::BudgetEntry, ledger::{BudgetLedger, ReservationOutcome}},
    config::GatewayConfig,
    error::GatewayError,
    gate::audit::{AuditRecord, AuditSink, AuditStatus},
    mechanism::rng::NoiseSource,
    principal::{PrincipalDirectory, Role},
    query::{descriptor::QueryRequest, planner, PlanResult},
    store::RowStore,
};

/// A successful query response: the planner's output plus the epsilon the
/// gateway actually debited.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub plan: PlanResult,
    pub epsilon_debited: f64,
    pub noise_added: Option<Vec<f64>>,
}

/// Parameters for [`PrivacyGateway::reset`]. A reset is destructive to the
/// privacy ledger's bookkeeping (spec.md section 4.3/9 — it does not grant
/// retroactive privacy), so it requires an explicit confirmation and a
/// reason that lands in the audit trail.
pub struct ResetRequest {
    pub requested_by: String,
    pub target_principal: String,
    pub confirm: bool,
    pub reason: String,
}

fn monotonic_request_id(counter: &std::sync::atomic::AtomicU64) -> String {
    let n = counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    format!("req-{n}")
}

/// The gateway: one shared instance fronts the protected dataset for every
/// principal. `N` is the noise source; production callers use
/// [`crate::mechanism::rng::OsNoiseSource`], tests use
/// [`crate::mechanism::rng::SeededNoiseSource`].
pub struct PrivacyGateway<L, S, A, D, N> {
    ledger: L,
    store: S,
    audit: A,
    directory: D,
    noise: Mutex<N>,
    config: GatewayConfig,
    request_counter: std::sync::atomic::AtomicU64,
}

impl<L, S, A, D, N> PrivacyGateway<L, S, A, D, N>
where
    L: BudgetLedger,
    S: RowStore,
    A: AuditSink,
    D: PrincipalDirectory,
    N: NoiseSource,
{
    pub fn new(ledger: L, store: S, audit: A, directory: D, noise: N, config: GatewayConfig) -> Self {
        Self {
            ledger,
            store,
            audit,
            directory,
            noise: Mutex::new(noise),
            config,
            request_counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// The admission path: validate the request shape, confirm the
    /// principal is active, reserve epsilon, execute the query, then
    /// commit the reservation on success or release it otherwise. An audit
    /// record is written on every path out of this function.
    pub fn query(&self, request: QueryRequest) -> Result<QueryResponse, GatewayError> {
        let request_id = monotonic_request_id(&self.request_counter);
        let started = Instant::now();

        let outcome = self.query_inner(&request);

        let (audit_status, epsilon_debited, rows_matched, error_message) = match &outcome {
            Ok(response) => (AuditStatus::Success, response.epsilon_debited, Some(response.plan.rows_matched), None),
            Err(GatewayError::NoMatch) => (AuditStatus::Blocked, 0.0, Some(0), Some(GatewayError::NoMatch.to_string())),
            Err(err @ (GatewayError::InsufficientBudget { .. }
            | GatewayError::PrincipalInactive
            | GatewayError::BadRequest(_))) => (AuditStatus::Blocked, 0.0, None, Some(err.to_string())),
            Err(other) => (AuditStatus::Error, 0.0, None, Some(other.to_string())),
        };

        let record = AuditRecord {
            request_id,
            principal_id: request.principal_id.clone(),
            query_kind: request.query.kind_name().to_string(),
            filters: request.filters.clone(),
            epsilon_requested: request.epsilon,
            epsilon_debited,
            rows_matched,
            status: audit_status,
            error_message,
            reason: None,
            execution_millis: started.elapsed().as_millis() as u64,
            timestamp: chrono::Utc::now(),
        };

        // A query whose audit record can't be written must not be
        // reported as successful: the audit trail is this gateway's only
        // external evidence of what was disclosed.
        if let Err(sink_err) = self.audit.append(record) {
            warn!("audit append failed for principal {}: {sink_err}", request.principal_id);
            return Err(sink_err.into());
        }

        outcome
    }

    fn query_inner(&self, request: &QueryRequest) -> Result<QueryResponse, GatewayError> {
        if !self.config.epsilon_in_range(request.epsilon) {
            return Err(GatewayError::BadRequest(format!(
                "epsilon {} outside admissible range (0, {}]",
                request.epsilon, self.config.epsilon_max
            )));
        }

        planner::validate_shape(
            &request.query,
            &request.filters,
            &self.config,
            request.bounds_override.as_ref(),
        )?;

        let principal = self.directory.lookup(&request.principal_id)?;
        if !principal.active {
            return Err(GatewayError::PrincipalInactive);
        }

        let status = self.ledger.status(&principal.id)?;
        self.warn_if_near_budget(&principal.id, &status);

        let reservation = match self.ledger.reserve(&principal.id, request.epsilon)? {
            ReservationOutcome::Reserved(reservation) => reservation,
            ReservationOutcome::InsufficientBudget { remaining } => {
                return Err(GatewayError::InsufficientBudget {
                    required: request.epsilon,
                    remaining,
                });
            }
        };

        let mut noise = self.noise.lock().unwrap();
        let plan = planner::execute(
            &request.query,
            &request.filters,
            request.epsilon,
            &self.config,
            request.bounds_override.as_ref(),
            &self.store,
            &mut *noise,
        );
        drop(noise);

        match plan {
            Ok(plan) => {
                self.ledger.commit(&reservation)?;
                let noise_added = self
                    .config
                    .publish_noise_added
                    .then(|| plan.columns.iter().map(|c| c.outcome.noise_added()).collect());
                Ok(QueryResponse { plan, epsilon_debited: request.epsilon, noise_added })
            }
            Err(err) => {
                // Nothing was learned (NoMatch) or nothing should have been
                // charged (a bad request caught late, a downstream hiccup):
                // release, never debit, per spec.md section 4.2's edge case.
                self.ledger.release(&reservation)?;
                Err(err)
            }
        }
    }

    fn warn_if_near_budget(&self, principal_id: &str, status: &BudgetEntry) {
        if status.warning() {
            debug!(
                "principal {principal_id} is near its privacy budget: {:.4} of {:.4} remaining",
                status.remaining(),
                status.total
            );
        }
    }

    /// Snapshot of a principal's budget.
    pub fn status(&self, principal_id: &str) -> Result<BudgetEntry, GatewayError> {
        self.directory.lookup(principal_id)?;
        Ok(self.ledger.status(principal_id)?)
    }

    /// Resets a principal's consumed budget to zero. Restricted to admins
    /// and requires an explicit confirmation (spec.md section 4.3: a reset
    /// is an operator-intervention tool, not a DP-sound operation, so it
    /// must never happen as a side effect of anything else).
    pub fn reset(&self, request: ResetRequest) -> Result<(), GatewayError> {
        let requester = self.directory.lookup(&request.requested_by)?;
        if requester.role != Role::Admin {
            return Err(GatewayError::BadRequest(
                "budget reset requires the admin role".into(),
            ));
        }
        if !request.confirm {
            return Err(GatewayError::BadRequest(
                "budget reset requires explicit confirmation".into(),
            ));
        }
        if request.reason.trim().is_empty() {
            return Err(GatewayError::BadRequest(
                "budget reset requires a reason".into(),
            ));
        }
        debug!(
            "admin {} reset budget for {}: {}",
            request.requested_by, request.target_principal, request.reason
        );
        self.ledger.reset(&request.target_principal)?;

        let record = AuditRecord {
            request_id: monotonic_request_id(&self.request_counter),
            principal_id: request.target_principal.clone(),
            query_kind: "reset".to_string(),
            filters: crate::query::descriptor::FilterSet::new(),
            epsilon_requested: 0.0,
            epsilon_debited: 0.0,
            rows_matched: None,
            status: AuditStatus::Success,
            error_message: None,
            reason: Some(format!("requested by {}: {}", request.requested_by, request.reason)),
            execution_millis: 0,
            timestamp: chrono::Utc::now(),
        };
        self.audit.append(record)?;
        Ok(())
    }

    /// Audit history for a principal. Non-admins may only see their own
    /// records (spec.md's supplemented history endpoint).
    pub fn history(&self, requester_id: &str, target_principal: &str) -> Result<Vec<AuditRecord>, GatewayError>
    where
        A: HistoryLookup,
    {
        let requester = self.directory.lookup(requester_id)?;
        if requester.role != Role::Admin && requester.id != target_principal {
            return Err(GatewayError::BadRequest(
                "only an admin may view another principal's history".into(),
            ));
        }
        Ok(self.audit.records_for(target_principal))
    }
}

/// Narrow extension trait so [`PrivacyGateway::history`] can be generic
/// over any [`AuditSink`] that also supports querying by principal,
/// without widening the base [`AuditSink`] trait every backend must
/// implement.
pub trait HistoryLookup: AuditSink {
    fn records_for(&self, principal_id: &str) -> Vec<AuditRecord>;
}

impl HistoryLookup for crate::gate::audit::VecAuditSink {
    fn records_for(&self, principal_id: &str) -> Vec<AuditRecord> {
        crate::gate::audit::VecAuditSink::records_for(self, principal_id)
    }
}
