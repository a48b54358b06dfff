//! The audit trail: one [`AuditRecord`] per query the gateway decides on,
//! written before the gateway returns regardless of outcome.
//!
//! Grounded in the corpus's own accounting records (pdslib's
//! `PrivateDataService::account_for_passive_privacy_loss` trail, which
//! records every budget-affecting decision, not just successes) and in
//! `original_source`'s `log_query` (every query, blocked or not, is logged
//! with enough detail to reconstruct what happened and why).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::SinkError, query::descriptor::FilterSet};

/// The gateway's admission decision for one query, as recorded in an
/// [`AuditRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    Success,
    Blocked,
    Error,
}

/// One immutable record of a single query's lifecycle through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub request_id: String,
    pub principal_id: String,
    pub query_kind: String,
    pub filters: FilterSet,
    pub epsilon_requested: f64,
    pub epsilon_debited: f64,
    pub rows_matched: Option<u64>,
    pub status: AuditStatus,
    pub error_message: Option<String>,
    /// Operator-supplied context for an action that isn't a query — today
    /// only populated by [`crate::gate::service::PrivacyGateway::reset`],
    /// which must log who reset a principal's budget and why (spec.md
    /// section 6/9: a reset is an operator-intervention tool, not a
    /// DP-sound operation, so it needs its own audit trail).
    pub reason: Option<String>,
    pub execution_millis: u64,
    pub timestamp: DateTime<Utc>,
}

/// Sink for audit records. Implementations must not drop a record silently
/// on failure — `append` returning `Err` is the caller's signal to treat
/// the whole query as failed, per spec.md section 4.4 ("a query whose
/// audit record cannot be written MUST NOT be reported as successful").
pub trait AuditSink: Send + Sync {
    fn append(&self, record: AuditRecord) -> Result<(), SinkError>;
}

/// In-memory reference implementation, grounded in the corpus's
/// HashMap-backed storage defaults. Records accumulate behind a mutex;
/// intended for tests, not production durability.
#[derive(Default)]
pub struct VecAuditSink {
    records: std::sync::Mutex<Vec<AuditRecord>>,
}

impl VecAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn records_for(&self, principal_id: &str) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.principal_id == principal_id)
            .cloned()
            .collect()
    }
}

impl AuditSink for VecAuditSink {
    fn append(&self, record: AuditRecord) -> Result<(), SinkError> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(principal_id: &str) -> AuditRecord {
        AuditRecord {
            request_id: "req-1".into(),
            principal_id: principal_id.into(),
            query_kind: "count".into(),
            filters: FilterSet::new(),
            epsilon_requested: 1.0,
            epsilon_debited: 1.0,
            rows_matched: Some(10),
            status: AuditStatus::Success,
            error_message: None,
            reason: None,
            execution_millis: 5,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn records_filter_by_principal() {
        let sink = VecAuditSink::new();
        sink.append(sample_record("alice")).unwrap();
        sink.append(sample_record("bob")).unwrap();
        assert_eq!(sink.records().len(), 2);
        assert_eq!(sink.records_for("alice").len(), 1);
    }
}
