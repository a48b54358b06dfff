//! Typed error taxonomy for the gateway.
//!
//! Kinds, not names: every variant here corresponds to one outcome a caller
//! must be able to branch on (`BadRequest` vs `InsufficientBudget` vs
//! `NoMatch`, ...), not to a particular failing function.

use thiserror::Error;

/// Errors raised while computing the true aggregate or while sampling noise.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MechanismError {
    /// The mechanism was asked to summarize zero rows.
    #[error("mechanism received empty input")]
    EmptyInput,

    /// The mechanism produced a non-finite output (e.g. overflow while
    /// normalizing the exponential mechanism's candidate weights).
    #[error("mechanism produced a non-finite result")]
    NonFinite,

    /// `lo >= hi` for a column bound, or epsilon was non-positive.
    #[error("invalid mechanism parameters: {0}")]
    InvalidParameters(String),
}

/// Errors raised by a [`crate::budget::ledger::BudgetLedger`] implementation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("no such reservation")]
    UnknownReservation,

    #[error("ledger failed to durably commit a debit: {0}")]
    CommitFailed(String),
}

/// Errors raised by a [`crate::store::RowStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row store failed: {0}")]
    Backend(String),
}

/// Errors raised by an [`crate::gate::audit::AuditSink`] implementation.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("audit sink failed to append a record: {0}")]
    Backend(String),
}

/// The outcome of an admission decision, returned to the caller of
/// [`crate::gate::service::PrivacyGateway::query`].
///
/// This is the taxonomy from spec.md section 7: callers match on the kind,
/// not on a message string.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed query shape: epsilon out of range, unknown column, unknown
    /// filter attribute, invalid bounds, bad histogram bin count, etc.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The principal issuing the request is not active.
    #[error("principal is not active")]
    PrincipalInactive,

    /// The ledger reservation failed: not enough epsilon remains.
    #[error("insufficient budget: required {required}, remaining {remaining}")]
    InsufficientBudget { required: f64, remaining: f64 },

    /// Zero rows matched the filter set. Epsilon is not debited.
    #[error("no rows matched the filter set")]
    NoMatch,

    /// The row store or audit sink failed.
    #[error("downstream failure: {0}")]
    DownstreamFailure(String),

    /// The mechanism engine produced a non-finite output, or an invariant
    /// that should be impossible was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<MechanismError> for GatewayError {
    fn from(err: MechanismError) -> Self {
        match err {
            MechanismError::EmptyInput => GatewayError::NoMatch,
            MechanismError::NonFinite => {
                GatewayError::Internal("mechanism produced non-finite output (redacted input)".into())
            }
            MechanismError::InvalidParameters(msg) => GatewayError::BadRequest(msg),
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        GatewayError::DownstreamFailure(err.to_string())
    }
}

impl From<SinkError> for GatewayError {
    fn from(err: SinkError) -> Self {
        GatewayError::DownstreamFailure(err.to_string())
    }
}

impl From<LedgerError> for GatewayError {
    fn from(err: LedgerError) -> Self {
        // A ledger that cannot durably commit is a privacy hazard: this is
        // deliberately not folded into DownstreamFailure so callers can
        // distinguish "row store hiccup" from "ledger integrity risk".
        GatewayError::Internal(err.to_string())
    }
}
